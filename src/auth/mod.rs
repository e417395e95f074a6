//! Password hashing and bearer tokens.
//!
//! Tokens are HS256 JWTs carrying the user id and role. Handlers never read
//! tokens directly; they take an [`AuthUser`] or [`RetailerUser`] extractor.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::models::{Role, User};

mod extract;

pub use extract::{AuthUser, RetailerUser};

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("Password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("Token lifetime of {0} hours is out of range")]
    TtlOutOfRange(i64),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    pub sub: i64,
    pub role: Role,
    pub exp: usize,
}

pub fn issue_token(user: &User, secret: &str, ttl_hours: i64) -> Result<String, AuthError> {
    let exp = Duration::try_hours(ttl_hours)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or(AuthError::TtlOutOfRange(ttl_hours))?
        .timestamp()
        .max(0) as usize;
    let claims = Claims {
        sub: user.id,
        role: user.role,
        exp,
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    Ok(bcrypt::hash(password, cost)?)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    Ok(bcrypt::verify(password, hash)?)
}
