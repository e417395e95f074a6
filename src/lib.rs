//! MedFex: a pharmacy back end connecting customers with retailers.
//!
//! Customers track prescriptions and place medicine requests; retailers keep
//! an inventory and move requests through their lifecycle. A cron job reminds
//! customers of upcoming refills.

use std::time::{Duration, Instant};

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod services;
pub mod state;
pub mod utils;

#[cfg(test)]
mod testing;

use config::Config;
use handlers::{auth as auth_routes, medicines, notifications, prescriptions, requests, suggestions};
use services::schedule_refill_reminders;
use state::AppState;

pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// Room for the multipart framing around a maximum-size image.
const UPLOAD_BODY_LIMIT: usize = prescriptions::MAX_IMAGE_BYTES + 1024 * 1024;

/// Builds the HTTP application with every route and layer attached.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/", get(root))
        .route("/api/auth/register", post(auth_routes::register))
        .route("/api/auth/login", post(auth_routes::login))
        .route("/api/auth/me", get(auth_routes::me))
        .route("/api/medicines/search", get(medicines::search))
        .route("/api/medicines", get(medicines::list).post(medicines::create))
        .route("/api/medicines/:id", put(medicines::update).delete(medicines::delete))
        .route("/api/requests", get(requests::list_mine).post(requests::create))
        .route("/api/requests/retailer", get(requests::retailer_queue))
        .route("/api/requests/:id/status", put(requests::update_status))
        .route("/api/prescriptions", get(prescriptions::list).post(prescriptions::create))
        .route(
            "/api/prescriptions/upload",
            post(prescriptions::upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/api/prescriptions/:id",
            put(prescriptions::update).delete(prescriptions::delete),
        )
        .route(
            "/api/notifications",
            get(notifications::list).delete(notifications::clear_all),
        )
        .route("/api/notifications/:id/read", put(notifications::mark_read))
        .route("/api/suggestions", get(suggestions::list))
        .layer(middleware::from_fn(log_request))
        .layer(cors)
        .with_state(state)
}

async fn root() -> &'static str {
    "MedFex API is running..."
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    log::info!(
        "{} {} -> {} ({} ms)",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

/// Opens the database, starts the refill reminder job and serves HTTP until
/// Ctrl+C or SIGTERM.
pub async fn start_server(config: Config) -> Result<(), Error> {
    config.validate().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        e
    })?;

    let pool = db::init_db(&config.database_url).await?;

    let mut scheduler = schedule_refill_reminders(
        pool.clone(),
        &config.refill_reminder_cron,
        config.refill_reminder_window_days,
    )
    .await?;

    let address = format!("0.0.0.0:{}", config.port);
    let state = AppState::new(pool, config);

    let listener = TcpListener::bind(&address).await?;
    log::info!("Server running on {}", address);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await?;
    log::info!("Shutting down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => log::info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                log::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                log::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
