use std::collections::HashSet;

use sqlx::SqlitePool;

use crate::db::{medicines, models::Medicine, prescriptions};

const SUGGESTION_LIMIT: usize = 4;
/// Below this many category matches the list is topped up with other stock.
const MIN_CATEGORY_MATCHES: usize = 2;

pub async fn suggestions_for(pool: &SqlitePool, customer_id: i64) -> Result<Vec<Medicine>, sqlx::Error> {
    let prescribed: Vec<String> = prescriptions::list_for_customer(pool, customer_id)
        .await?
        .into_iter()
        .map(|p| p.medicine_name)
        .collect();
    let catalogue = medicines::list_all(pool).await?;
    Ok(pick_suggestions(&prescribed, catalogue))
}

/// Chooses up to four in-stock medicines related to what the customer is
/// already prescribed.
///
/// Related means sharing a category with a medicine whose name contains one of
/// the prescribed names. Medicines matching a prescribed name are never
/// suggested. A customer with no prescriptions gets the first in-stock items.
pub fn pick_suggestions(prescribed: &[String], catalogue: Vec<Medicine>) -> Vec<Medicine> {
    let in_stock = catalogue.iter().filter(|m| m.stock > 0);

    if prescribed.is_empty() {
        return in_stock.take(SUGGESTION_LIMIT).cloned().collect();
    }

    let prescribed: Vec<String> = prescribed.iter().map(|p| p.trim().to_lowercase()).collect();
    let is_prescribed = |m: &Medicine| {
        let name = m.name.to_lowercase();
        prescribed.iter().any(|p| !p.is_empty() && name.contains(p.as_str()))
    };

    let categories: HashSet<&str> = catalogue
        .iter()
        .filter(|m| is_prescribed(*m))
        .filter_map(|m| m.category.as_deref())
        .collect();

    let candidates: Vec<&Medicine> = in_stock.filter(|m| !is_prescribed(*m)).collect();

    let mut picked: Vec<&Medicine> = candidates
        .iter()
        .copied()
        .filter(|m| m.category.as_deref().is_some_and(|c| categories.contains(c)))
        .take(SUGGESTION_LIMIT)
        .collect();

    if picked.len() < MIN_CATEGORY_MATCHES {
        let extra: Vec<&Medicine> = candidates
            .iter()
            .copied()
            .filter(|m| !picked.iter().any(|p| p.id == m.id))
            .take(SUGGESTION_LIMIT - picked.len())
            .collect();
        picked.extend(extra);
    }

    picked.into_iter().cloned().collect()
}
