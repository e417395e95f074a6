use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use super::AppJson;
use crate::auth::{self, AuthUser};
use crate::db::{
    models::{Role, User},
    users::{self, NewUser},
};
use crate::error::{AppError, Validator};
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Deserialize, Debug, Default)]
pub struct RegisterInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct LoginInput {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

pub async fn register(
    State(state): State<AppState>,
    AppJson(input): AppJson<RegisterInput>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let mut v = Validator::new();
    let name = v.required("name", input.name.as_deref());
    let email = v.required("email", input.email.as_deref());
    if let Some(email) = &email {
        v.check(email.contains('@'), "email", "email must be a valid address");
    }
    let password = input.password.unwrap_or_default();
    v.check(
        password.chars().count() >= MIN_PASSWORD_LEN,
        "password",
        format!("password must be at least {} characters", MIN_PASSWORD_LEN),
    );
    let role = match input.role.as_deref() {
        None => Some(Role::Customer),
        Some(raw) => raw.parse::<Role>().map_err(|e| v.error("role", e)).ok(),
    };
    v.finish()?;
    let (Some(name), Some(email), Some(role)) = (name, email, role) else {
        return Err(AppError::Internal("validated register input incomplete".into()));
    };

    if users::find_by_email(&state.pool, &email).await?.is_some() {
        return Err(AppError::Conflict("User already exists".into()));
    }

    let cost = state.config.bcrypt_cost;
    let password_hash = tokio::task::spawn_blocking(move || auth::hash_password(&password, cost))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let user = users::insert(
        &state.pool,
        NewUser {
            name: &name,
            email: &email,
            password_hash: &password_hash,
            role,
        },
    )
    .await
    .map_err(|e| match e.as_database_error() {
        Some(db) if db.is_unique_violation() => AppError::Conflict("User already exists".into()),
        _ => AppError::Database(e),
    })?;

    log::info!("Registered {:?} user {}", user.role, user.id);
    let token = token_for(&state, &user)?;
    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

pub async fn login(
    State(state): State<AppState>,
    AppJson(input): AppJson<LoginInput>,
) -> Result<Json<AuthResponse>, AppError> {
    let mut v = Validator::new();
    let email = v.required("email", input.email.as_deref());
    let password = input.password.filter(|p| !p.is_empty());
    v.check(password.is_some(), "password", "password is required");
    v.finish()?;
    let (Some(email), Some(password)) = (email, password) else {
        return Err(AppError::Internal("validated login input incomplete".into()));
    };

    let invalid = || AppError::Unauthorized("Invalid email or password".into());
    let user = users::find_by_email(&state.pool, &email).await?.ok_or_else(invalid)?;

    let hash = user.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || auth::verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .unwrap_or_else(|e| {
            log::error!("Stored password hash for user {} is unusable: {}", user.id, e);
            false
        });
    if !matches {
        return Err(invalid());
    }

    let token = token_for(&state, &user)?;
    Ok(Json(AuthResponse { user, token }))
}

pub async fn me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

fn token_for(state: &AppState, user: &User) -> Result<String, AppError> {
    auth::issue_token(user, &state.config.jwt_secret, state.config.jwt_ttl_hours)
        .map_err(|e| AppError::Internal(e.to_string()))
}
