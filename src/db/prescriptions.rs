use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use super::models::Prescription;

#[derive(Debug)]
pub struct NewPrescription {
    pub medicine_name: String,
    pub dosage: String,
    pub refill_days: i64,
    pub start_date: DateTime<Utc>,
    pub image_path: Option<String>,
}

#[derive(Default)]
pub struct PrescriptionChanges {
    pub medicine_name: Option<String>,
    pub dosage: Option<String>,
    pub refill_days: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
}

fn out_of_range() -> sqlx::Error {
    sqlx::Error::Encode("next refill date is out of range".into())
}

pub async fn insert<'e>(
    db: impl SqliteExecutor<'e>,
    customer_id: i64,
    prescription: NewPrescription,
) -> Result<Prescription, sqlx::Error> {
    let next_refill = Prescription::next_refill_date(prescription.start_date, prescription.refill_days)
        .ok_or_else(out_of_range)?;
    let now = Utc::now();
    sqlx::query_as::<_, Prescription>(
        "INSERT INTO prescriptions
            (customer_id, medicine_name, dosage, refill_days, start_date, next_refill_date, image_path, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8) RETURNING *",
    )
    .bind(customer_id)
    .bind(prescription.medicine_name)
    .bind(prescription.dosage)
    .bind(prescription.refill_days)
    .bind(prescription.start_date)
    .bind(next_refill)
    .bind(prescription.image_path)
    .bind(now)
    .fetch_one(db)
    .await
}

pub async fn list_for_customer<'e>(
    db: impl SqliteExecutor<'e>,
    customer_id: i64,
) -> Result<Vec<Prescription>, sqlx::Error> {
    sqlx::query_as::<_, Prescription>(
        "SELECT * FROM prescriptions WHERE customer_id = $1 ORDER BY julianday(next_refill_date), id",
    )
    .bind(customer_id)
    .fetch_all(db)
    .await
}

pub async fn find_owned<'e>(
    db: impl SqliteExecutor<'e>,
    id: i64,
    customer_id: i64,
) -> Result<Option<Prescription>, sqlx::Error> {
    sqlx::query_as::<_, Prescription>("SELECT * FROM prescriptions WHERE id = $1 AND customer_id = $2")
        .bind(id)
        .bind(customer_id)
        .fetch_optional(db)
        .await
}

/// Writes `changes` over `current`, recomputing the next refill date from the
/// resulting start date and interval.
pub async fn update<'e>(
    db: impl SqliteExecutor<'e>,
    current: &Prescription,
    changes: PrescriptionChanges,
) -> Result<Prescription, sqlx::Error> {
    let start_date = changes.start_date.unwrap_or(current.start_date);
    let refill_days = changes.refill_days.unwrap_or(current.refill_days);
    let next_refill = Prescription::next_refill_date(start_date, refill_days).ok_or_else(out_of_range)?;

    sqlx::query_as::<_, Prescription>(
        "UPDATE prescriptions SET
            medicine_name = $1, dosage = $2, refill_days = $3,
            start_date = $4, next_refill_date = $5, updated_at = $6
         WHERE id = $7
         RETURNING *",
    )
    .bind(changes.medicine_name.unwrap_or_else(|| current.medicine_name.clone()))
    .bind(changes.dosage.unwrap_or_else(|| current.dosage.clone()))
    .bind(refill_days)
    .bind(start_date)
    .bind(next_refill)
    .bind(Utc::now())
    .bind(current.id)
    .fetch_one(db)
    .await
}

pub async fn delete<'e>(db: impl SqliteExecutor<'e>, id: i64, customer_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM prescriptions WHERE id = $1 AND customer_id = $2")
        .bind(id)
        .bind(customer_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Prescriptions whose next refill falls on or before `until`, overdue ones included.
pub async fn due_before<'e>(
    db: impl SqliteExecutor<'e>,
    until: DateTime<Utc>,
) -> Result<Vec<Prescription>, sqlx::Error> {
    sqlx::query_as::<_, Prescription>(
        "SELECT * FROM prescriptions WHERE julianday(next_refill_date) <= julianday($1)
         ORDER BY julianday(next_refill_date), id",
    )
    .bind(until)
    .fetch_all(db)
    .await
}
