use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use super::{message, non_blank, AppJson, MessageResponse};
use crate::auth::{AuthUser, RetailerUser};
use crate::db::{
    medicines::{self, MedicineChanges, NewMedicine},
    models::{Contact, Medicine},
};
use crate::error::{AppError, Validator};
use crate::state::AppState;

#[derive(Deserialize, Debug, Default)]
pub struct MedicineInput {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<i64>,
    pub description: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct SearchQuery {
    pub name: Option<String>,
}

/// A search hit: the medicine plus who stocks it.
#[derive(Serialize, Debug)]
pub struct MedicineAvailability {
    #[serde(flatten)]
    pub medicine: Medicine,
    pub retailer: Contact,
}

fn check_numbers(v: &mut Validator, price: Option<f64>, stock: Option<i64>) {
    if let Some(price) = price {
        v.check(price.is_finite() && price > 0.0, "price", "price must be greater than 0");
    }
    if let Some(stock) = stock {
        v.check(stock >= 0, "stock", "stock cannot be negative");
    }
}

pub async fn list(
    RetailerUser(retailer): RetailerUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Medicine>>, AppError> {
    Ok(Json(medicines::list_for_retailer(&state.pool, retailer.id).await?))
}

pub async fn create(
    RetailerUser(retailer): RetailerUser,
    State(state): State<AppState>,
    AppJson(input): AppJson<MedicineInput>,
) -> Result<(StatusCode, Json<Medicine>), AppError> {
    let mut v = Validator::new();
    let name = v.required("name", input.name.as_deref());
    v.check(input.price.is_some(), "price", "price is required");
    check_numbers(&mut v, input.price, input.stock);
    v.finish()?;
    let (Some(name), Some(price)) = (name, input.price) else {
        return Err(AppError::Internal("validated medicine input incomplete".into()));
    };

    let medicine = medicines::insert(
        &state.pool,
        retailer.id,
        NewMedicine {
            name,
            category: non_blank(input.category),
            price,
            stock: input.stock.unwrap_or(0),
            description: non_blank(input.description),
        },
    )
    .await?;

    log::info!("Retailer {} added medicine {} ({})", retailer.id, medicine.id, medicine.name);
    Ok((StatusCode::CREATED, Json(medicine)))
}

pub async fn update(
    RetailerUser(retailer): RetailerUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(input): AppJson<MedicineInput>,
) -> Result<Json<Medicine>, AppError> {
    let mut v = Validator::new();
    if let Some(name) = &input.name {
        v.check(!name.trim().is_empty(), "name", "name cannot be blank");
    }
    check_numbers(&mut v, input.price, input.stock);
    v.finish()?;

    let changes = MedicineChanges {
        name: non_blank(input.name),
        category: non_blank(input.category),
        price: input.price,
        stock: input.stock,
        description: non_blank(input.description),
    };

    medicines::update(&state.pool, id, retailer.id, changes)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Medicine not found or unauthorized".into()))
}

pub async fn delete(
    RetailerUser(retailer): RetailerUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    if medicines::delete(&state.pool, id, retailer.id).await? {
        Ok(message("Medicine removed"))
    } else {
        Err(AppError::NotFound("Medicine not found or unauthorized".into()))
    }
}

pub async fn search(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<MedicineAvailability>>, AppError> {
    let term = non_blank(query.name).ok_or_else(|| AppError::BadRequest("Search term is required".into()))?;

    let rows = medicines::search(&state.pool, &term).await?;
    log::debug!("Search {:?} matched {} medicines", term, rows.len());

    Ok(Json(
        rows.into_iter()
            .map(|row| {
                let retailer = row.retailer();
                MedicineAvailability {
                    medicine: row.medicine,
                    retailer,
                }
            })
            .collect(),
    ))
}
