use chrono::Utc;
use sqlx::SqliteExecutor;

use super::escape_like;
use super::models::{Contact, Medicine};

pub struct NewMedicine {
    pub name: String,
    pub category: Option<String>,
    pub price: f64,
    pub stock: i64,
    pub description: Option<String>,
}

/// Partial update; `None` leaves the column unchanged.
#[derive(Default)]
pub struct MedicineChanges {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<i64>,
    pub description: Option<String>,
}

#[derive(sqlx::FromRow, Debug)]
pub struct AvailabilityRow {
    #[sqlx(flatten)]
    pub medicine: Medicine,
    pub retailer_name: String,
    pub retailer_email: String,
}

impl AvailabilityRow {
    pub fn retailer(&self) -> Contact {
        Contact {
            id: self.medicine.retailer_id,
            name: self.retailer_name.clone(),
            email: self.retailer_email.clone(),
        }
    }
}

pub async fn list_for_retailer<'e>(
    db: impl SqliteExecutor<'e>,
    retailer_id: i64,
) -> Result<Vec<Medicine>, sqlx::Error> {
    sqlx::query_as::<_, Medicine>("SELECT * FROM medicines WHERE retailer_id = $1 ORDER BY name, id")
        .bind(retailer_id)
        .fetch_all(db)
        .await
}

pub async fn list_all<'e>(db: impl SqliteExecutor<'e>) -> Result<Vec<Medicine>, sqlx::Error> {
    sqlx::query_as::<_, Medicine>("SELECT * FROM medicines ORDER BY id")
        .fetch_all(db)
        .await
}

pub async fn find_by_id<'e>(db: impl SqliteExecutor<'e>, id: i64) -> Result<Option<Medicine>, sqlx::Error> {
    sqlx::query_as::<_, Medicine>("SELECT * FROM medicines WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn insert<'e>(
    db: impl SqliteExecutor<'e>,
    retailer_id: i64,
    medicine: NewMedicine,
) -> Result<Medicine, sqlx::Error> {
    let now = Utc::now();
    sqlx::query_as::<_, Medicine>(
        "INSERT INTO medicines (name, category, price, stock, description, retailer_id, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $7) RETURNING *",
    )
    .bind(medicine.name)
    .bind(medicine.category)
    .bind(medicine.price)
    .bind(medicine.stock)
    .bind(medicine.description)
    .bind(retailer_id)
    .bind(now)
    .fetch_one(db)
    .await
}

/// Applies `changes` to a medicine owned by `retailer_id`. Returns `None` when
/// no such medicine exists for that retailer.
pub async fn update<'e>(
    db: impl SqliteExecutor<'e>,
    id: i64,
    retailer_id: i64,
    changes: MedicineChanges,
) -> Result<Option<Medicine>, sqlx::Error> {
    sqlx::query_as::<_, Medicine>(
        "UPDATE medicines SET
            name = COALESCE($1, name),
            category = COALESCE($2, category),
            price = COALESCE($3, price),
            stock = COALESCE($4, stock),
            description = COALESCE($5, description),
            updated_at = $6
         WHERE id = $7 AND retailer_id = $8
         RETURNING *",
    )
    .bind(changes.name)
    .bind(changes.category)
    .bind(changes.price)
    .bind(changes.stock)
    .bind(changes.description)
    .bind(Utc::now())
    .bind(id)
    .bind(retailer_id)
    .fetch_optional(db)
    .await
}

pub async fn delete<'e>(db: impl SqliteExecutor<'e>, id: i64, retailer_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM medicines WHERE id = $1 AND retailer_id = $2")
        .bind(id)
        .bind(retailer_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Builds a LIKE pattern where every whitespace-separated word of `term` must
/// appear, in order: `"para 500"` becomes `%para%500%`.
pub fn search_pattern(term: &str) -> String {
    let words: Vec<String> = term.split_whitespace().map(escape_like).collect();
    format!("%{}%", words.join("%"))
}

/// Medicines from every retailer whose name matches `term` (see [`search_pattern`]).
pub async fn search<'e>(db: impl SqliteExecutor<'e>, term: &str) -> Result<Vec<AvailabilityRow>, sqlx::Error> {
    sqlx::query_as::<_, AvailabilityRow>(
        "SELECT m.*, u.name AS retailer_name, u.email AS retailer_email
         FROM medicines m
         JOIN users u ON u.id = m.retailer_id
         WHERE m.name LIKE $1 ESCAPE '\\'
         ORDER BY m.stock > 0 DESC, m.name, m.id",
    )
    .bind(search_pattern(term))
    .fetch_all(db)
    .await
}

/// Finds the retailer's medicine for a requested name: an exact
/// (case-insensitive) match wins, otherwise a partial match in either
/// direction, preferring entries that still have stock.
pub async fn find_for_retailer_by_name<'e>(
    db: impl SqliteExecutor<'e>,
    retailer_id: i64,
    name: &str,
) -> Result<Option<Medicine>, sqlx::Error> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(None);
    }

    sqlx::query_as::<_, Medicine>(
        "SELECT * FROM medicines
         WHERE retailer_id = $1
           AND (instr(LOWER(name), LOWER($2)) > 0 OR instr(LOWER($2), LOWER(name)) > 0)
         ORDER BY LOWER(name) = LOWER($2) DESC, stock > 0 DESC, id
         LIMIT 1",
    )
    .bind(retailer_id)
    .bind(name)
    .fetch_optional(db)
    .await
}

/// Takes one unit out of stock. Returns `false` when the medicine had none left.
pub async fn decrement_stock<'e>(db: impl SqliteExecutor<'e>, id: i64) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE medicines SET stock = stock - 1, updated_at = $1 WHERE id = $2 AND stock > 0")
            .bind(Utc::now())
            .bind(id)
            .execute(db)
            .await?;
    Ok(result.rows_affected() == 1)
}
