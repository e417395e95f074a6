use chrono::Utc;
use sqlx::SqliteExecutor;

use super::models::{Contact, Request, RequestKind, RequestStatus};

pub struct NewRequest {
    pub medicine_name: String,
    pub kind: RequestKind,
    pub prescription_id: Option<i64>,
    pub retailer_id: Option<i64>,
}

#[derive(sqlx::FromRow, Debug)]
pub struct QueueRow {
    #[sqlx(flatten)]
    pub request: Request,
    pub customer_name: String,
    pub customer_email: String,
}

impl QueueRow {
    pub fn customer(&self) -> Contact {
        Contact {
            id: self.request.customer_id,
            name: self.customer_name.clone(),
            email: self.customer_email.clone(),
        }
    }
}

pub async fn insert<'e>(
    db: impl SqliteExecutor<'e>,
    customer_id: i64,
    request: NewRequest,
) -> Result<Request, sqlx::Error> {
    sqlx::query_as::<_, Request>(
        "INSERT INTO requests
            (customer_id, retailer_id, medicine_name, kind, status, prescription_id, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $7) RETURNING *",
    )
    .bind(customer_id)
    .bind(request.retailer_id)
    .bind(request.medicine_name)
    .bind(request.kind)
    .bind(RequestStatus::Pending)
    .bind(request.prescription_id)
    .bind(Utc::now())
    .fetch_one(db)
    .await
}

pub async fn find_by_id<'e>(db: impl SqliteExecutor<'e>, id: i64) -> Result<Option<Request>, sqlx::Error> {
    sqlx::query_as::<_, Request>("SELECT * FROM requests WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn list_for_customer<'e>(
    db: impl SqliteExecutor<'e>,
    customer_id: i64,
) -> Result<Vec<Request>, sqlx::Error> {
    sqlx::query_as::<_, Request>(
        "SELECT * FROM requests WHERE customer_id = $1 ORDER BY julianday(created_at) DESC, id DESC",
    )
    .bind(customer_id)
    .fetch_all(db)
    .await
}

/// Requests a retailer can act on: those addressed to them plus unclaimed ones.
pub async fn queue_for_retailer<'e>(
    db: impl SqliteExecutor<'e>,
    retailer_id: i64,
) -> Result<Vec<QueueRow>, sqlx::Error> {
    sqlx::query_as::<_, QueueRow>(
        "SELECT r.*, u.name AS customer_name, u.email AS customer_email
         FROM requests r
         JOIN users u ON u.id = r.customer_id
         WHERE r.retailer_id IS NULL OR r.retailer_id = $1
         ORDER BY julianday(r.created_at) DESC, r.id DESC",
    )
    .bind(retailer_id)
    .fetch_all(db)
    .await
}

/// Stores a new status and message. An unclaimed request becomes owned by
/// `retailer_id`.
pub async fn set_status<'e>(
    db: impl SqliteExecutor<'e>,
    id: i64,
    retailer_id: i64,
    status: RequestStatus,
    retailer_message: Option<&str>,
) -> Result<Request, sqlx::Error> {
    sqlx::query_as::<_, Request>(
        "UPDATE requests SET
            status = $1,
            retailer_message = $2,
            retailer_id = COALESCE(retailer_id, $3),
            updated_at = $4
         WHERE id = $5
         RETURNING *",
    )
    .bind(status)
    .bind(retailer_message)
    .bind(retailer_id)
    .bind(Utc::now())
    .bind(id)
    .fetch_one(db)
    .await
}
