use axum::{
    extract::{Path, State},
    Json,
};

use super::{message, MessageResponse};
use crate::auth::AuthUser;
use crate::db::{models::Notification, notifications};
use crate::error::AppError;
use crate::state::AppState;

pub async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Notification>>, AppError> {
    Ok(Json(notifications::list_recent(&state.pool, user.id).await?))
}

pub async fn mark_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    if notifications::mark_read(&state.pool, id, user.id).await? {
        Ok(message("Notification marked as read"))
    } else {
        Err(AppError::NotFound("Notification not found".into()))
    }
}

pub async fn clear_all(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, AppError> {
    let removed = notifications::clear_all(&state.pool, user.id).await?;
    log::debug!("Cleared {} notifications for user {}", removed, user.id);
    Ok(message("All notifications cleared"))
}
