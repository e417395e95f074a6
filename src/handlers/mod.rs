use axum::{extract::FromRequest, Json};
use serde::Serialize;

use crate::error::AppError;

pub mod auth;
pub mod medicines;
pub mod notifications;
pub mod prescriptions;
pub mod requests;
pub mod suggestions;

/// JSON request body whose rejections render through [`AppError`], so a
/// malformed or wrongly typed body gets the usual `{"message": ...}` 400.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// `{"message": "..."}` body for responses that carry no resource.
#[derive(Serialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

pub fn message(text: impl Into<String>) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: text.into(),
    })
}

/// Trims an optional text field, treating blank input as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
