use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use super::{non_blank, AppJson};
use crate::auth::{AuthUser, RetailerUser};
use crate::db::{
    models::{Contact, Request, RequestKind, RequestStatus, Role},
    prescriptions,
    requests::{self, NewRequest},
    users,
};
use crate::error::{AppError, Validator};
use crate::services::requests::{update_request_status, StatusUpdate};
use crate::state::AppState;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestInput {
    pub medicine_name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub prescription_id: Option<i64>,
    pub retailer_id: Option<i64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatusInput {
    pub status: Option<String>,
    pub retailer_message: Option<String>,
}

/// A request in a retailer's queue, with the customer's contact details.
#[derive(Serialize, Debug)]
pub struct QueuedRequest {
    #[serde(flatten)]
    pub request: Request,
    pub customer: Contact,
}

pub async fn create(
    AuthUser(customer): AuthUser,
    State(state): State<AppState>,
    AppJson(input): AppJson<CreateRequestInput>,
) -> Result<(StatusCode, Json<Request>), AppError> {
    let mut v = Validator::new();
    let medicine_name = v.required("medicineName", input.medicine_name.as_deref());
    let kind = match input.kind.as_deref() {
        None => {
            v.error("type", "type is required");
            None
        }
        Some(raw) => raw.parse::<RequestKind>().map_err(|e| v.error("type", e)).ok(),
    };

    if let Some(id) = input.prescription_id {
        let owned = prescriptions::find_owned(&state.pool, id, customer.id).await?;
        v.check(
            owned.is_some(),
            "prescriptionId",
            "prescriptionId does not refer to one of your prescriptions",
        );
    }
    if let Some(id) = input.retailer_id {
        let retailer = users::find_by_id(&state.pool, id).await?;
        v.check(
            retailer.is_some_and(|u| u.role == Role::Retailer),
            "retailerId",
            "retailerId does not refer to a retailer",
        );
    }
    v.finish()?;
    let (Some(medicine_name), Some(kind)) = (medicine_name, kind) else {
        return Err(AppError::Internal("validated request input incomplete".into()));
    };

    let request = requests::insert(
        &state.pool,
        customer.id,
        NewRequest {
            medicine_name,
            kind,
            prescription_id: input.prescription_id,
            retailer_id: input.retailer_id,
        },
    )
    .await?;

    log::info!("Customer {} opened request {}", customer.id, request.id);
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn list_mine(
    AuthUser(customer): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Request>>, AppError> {
    Ok(Json(requests::list_for_customer(&state.pool, customer.id).await?))
}

pub async fn retailer_queue(
    RetailerUser(retailer): RetailerUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<QueuedRequest>>, AppError> {
    let rows = requests::queue_for_retailer(&state.pool, retailer.id).await?;
    Ok(Json(
        rows.into_iter()
            .map(|row| {
                let customer = row.customer();
                QueuedRequest {
                    request: row.request,
                    customer,
                }
            })
            .collect(),
    ))
}

pub async fn update_status(
    RetailerUser(retailer): RetailerUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(input): AppJson<StatusInput>,
) -> Result<Json<Request>, AppError> {
    let mut v = Validator::new();
    let status = match input.status.as_deref() {
        None => {
            v.error("status", "status is required");
            None
        }
        Some(raw) => raw.parse::<RequestStatus>().map_err(|e| v.error("status", e)).ok(),
    };
    v.finish()?;
    let Some(status) = status else {
        return Err(AppError::Internal("validated status input incomplete".into()));
    };

    let outcome = update_request_status(
        &state.pool,
        retailer.id,
        id,
        StatusUpdate {
            status,
            retailer_message: non_blank(input.retailer_message),
        },
    )
    .await?;

    Ok(Json(outcome.request))
}
