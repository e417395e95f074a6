//! Fixtures shared by the unit tests.

use sqlx::SqlitePool;

use crate::auth;
use crate::config::Config;
use crate::db::{
    models::{Role, User},
    test_pool, users,
};
use crate::state::AppState;

pub const TEST_PASSWORD: &str = "secret123";
const TEST_SECRET: &str = "test-secret";

/// Inserts a user whose email is derived from `name` (`ana@example.com`).
pub async fn create_user(pool: &SqlitePool, name: &str, role: Role) -> User {
    let hash = auth::hash_password(TEST_PASSWORD, 4).unwrap();
    let email = format!("{}@example.com", name.to_lowercase().replace(' ', "."));
    users::insert(
        pool,
        users::NewUser {
            name,
            email: &email,
            password_hash: &hash,
            role,
        },
    )
    .await
    .unwrap()
}

pub fn test_config(upload_dir: &str) -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        port: 0,
        jwt_secret: TEST_SECRET.to_string(),
        jwt_ttl_hours: 1,
        bcrypt_cost: 4,
        upload_dir: upload_dir.to_string(),
        refill_reminder_cron: "0 0 9 * * *".to_string(),
        refill_reminder_window_days: 3,
    }
}

pub async fn test_state(upload_dir: &str) -> AppState {
    AppState::new(test_pool().await, test_config(upload_dir))
}

pub fn token_for(user: &User) -> String {
    auth::issue_token(user, TEST_SECRET, 1).unwrap()
}
