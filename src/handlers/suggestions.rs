use axum::{extract::State, Json};

use crate::auth::AuthUser;
use crate::db::models::Medicine;
use crate::error::AppError;
use crate::services::suggestions::suggestions_for;
use crate::state::AppState;

pub async fn list(
    AuthUser(customer): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Medicine>>, AppError> {
    Ok(Json(suggestions_for(&state.pool, customer.id).await?))
}
