use std::str::FromStr;

use sqlx::{
    migrate::MigrateError,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Error, SqlitePool,
};
use thiserror::Error;

pub mod medicines;
pub mod models;
pub mod notifications;
pub mod prescriptions;
pub mod requests;
pub mod users;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to parse database URL: {0}")]
    UrlParse(String),
    #[error("Database error: {0}")]
    Sqlx(#[from] Error),
    #[error("Failed to run migrations: {0}")]
    Migrate(#[from] MigrateError),
}

/// Opens (creating if needed) the SQLite database and brings its schema up to date.
pub async fn init_db(database_url: &str) -> Result<SqlitePool, DatabaseError> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| DatabaseError::UrlParse(e.to_string()))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(DatabaseError::Sqlx)?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    log::info!("Database ready at {}", database_url);
    Ok(pool)
}

/// Escapes LIKE wildcards so user input only ever matches literally.
pub(crate) fn escape_like(term: &str) -> String {
    term.chars().fold(String::with_capacity(term.len()), |mut out, c| {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
        out
    })
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    // One connection that never recycles: every connection to `:memory:` is a
    // separate database.
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_protects_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("aspirin"), "aspirin");
    }

    #[tokio::test]
    async fn init_db_creates_file_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("medfex.db");
        let pool = init_db(&format!("sqlite://{}", path.display())).await.unwrap();

        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(&pool)
                .await
                .unwrap();
        for table in ["medicines", "notifications", "prescriptions", "requests", "users"] {
            assert!(tables.iter().any(|t| t == table), "missing table {table}");
        }
        assert!(path.exists());
    }
}
