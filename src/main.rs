use dotenvy::dotenv;
use envconfig::Envconfig;
use medfex::{config::Config, start_server, Error};

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize the logger with default settings or "info" level if not specified
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    log::info!("Starting the MedFex API...");

    // Load environment variables from a .env file if present
    dotenv().ok();

    let config = Config::init_from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        e
    })?;

    start_server(config).await
}
