use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use super::models::{Notification, NotificationKind};

/// How many notifications a user sees at once.
pub const LIST_LIMIT: i64 = 20;

pub struct NewNotification {
    pub user_id: i64,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
}

pub async fn insert<'e>(
    db: impl SqliteExecutor<'e>,
    notification: NewNotification,
) -> Result<Notification, sqlx::Error> {
    sqlx::query_as::<_, Notification>(
        "INSERT INTO notifications (user_id, title, message, kind, is_read, created_at)
         VALUES ($1, $2, $3, $4, 0, $5) RETURNING *",
    )
    .bind(notification.user_id)
    .bind(notification.title)
    .bind(notification.message)
    .bind(notification.kind)
    .bind(Utc::now())
    .fetch_one(db)
    .await
}

pub async fn list_recent<'e>(db: impl SqliteExecutor<'e>, user_id: i64) -> Result<Vec<Notification>, sqlx::Error> {
    sqlx::query_as::<_, Notification>(
        "SELECT * FROM notifications WHERE user_id = $1 ORDER BY julianday(created_at) DESC, id DESC LIMIT $2",
    )
    .bind(user_id)
    .bind(LIST_LIMIT)
    .fetch_all(db)
    .await
}

/// Returns `false` when the notification does not exist or belongs to someone else.
pub async fn mark_read<'e>(db: impl SqliteExecutor<'e>, id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn clear_all<'e>(db: impl SqliteExecutor<'e>, user_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM notifications WHERE user_id = $1")
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}

/// Whether an identical notification reached `user_id` after `since`.
pub async fn exists_since<'e>(
    db: impl SqliteExecutor<'e>,
    user_id: i64,
    title: &str,
    message: &str,
    since: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS(
            SELECT 1 FROM notifications
            WHERE user_id = $1 AND title = $2 AND message = $3
              AND julianday(created_at) > julianday($4)
         )",
    )
    .bind(user_id)
    .bind(title)
    .bind(message)
    .bind(since)
    .fetch_one(db)
    .await
}
