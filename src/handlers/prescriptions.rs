use std::path::{Path as FsPath, PathBuf};

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::{message, non_blank, AppJson, MessageResponse};
use crate::auth::AuthUser;
use crate::db::{
    models::{NotificationKind, Prescription},
    notifications::{self, NewNotification},
    prescriptions::{self, NewPrescription, PrescriptionChanges},
};
use crate::error::{AppError, Validator};
use crate::state::AppState;
use crate::utils::parse_client_date;

/// Largest accepted prescription image.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "pdf"];
const DATE_FORMAT_HINT: &str = "startDate must be a date (YYYY-MM-DD) or an RFC 3339 timestamp";

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionInput {
    pub medicine_name: Option<String>,
    pub dosage: Option<String>,
    #[serde(alias = "refillDuration")]
    pub refill_days: Option<i64>,
    pub start_date: Option<String>,
}

fn check_refill_days(v: &mut Validator, days: i64) {
    v.check(days >= 1, "refillDays", "refillDays must be at least 1");
    v.check(
        days <= Prescription::MAX_REFILL_DAYS,
        "refillDays",
        format!("refillDays must be at most {}", Prescription::MAX_REFILL_DAYS),
    );
}

/// Records a `startDate` error when the next refill would fall outside the
/// representable date range.
fn check_schedule(v: &mut Validator, start_date: DateTime<Utc>, refill_days: i64) {
    v.check(
        Prescription::next_refill_date(start_date, refill_days).is_some(),
        "startDate",
        "startDate is too far in the future",
    );
}

fn validate_new(input: PrescriptionInput, image_path: Option<String>) -> Result<NewPrescription, AppError> {
    let mut v = Validator::new();
    let medicine_name = v.required("medicineName", input.medicine_name.as_deref());
    let dosage = v.required("dosage", input.dosage.as_deref());
    match input.refill_days {
        None => v.error("refillDays", "refillDays is required"),
        Some(days) => check_refill_days(&mut v, days),
    }
    let start_date = match non_blank(input.start_date) {
        None => Some(Utc::now()),
        Some(raw) => {
            let parsed = parse_client_date(&raw);
            v.check(parsed.is_some(), "startDate", DATE_FORMAT_HINT);
            parsed
        }
    };
    if let (Some(start), Some(days)) = (start_date, input.refill_days) {
        if (1..=Prescription::MAX_REFILL_DAYS).contains(&days) {
            check_schedule(&mut v, start, days);
        }
    }
    v.finish()?;

    match (medicine_name, dosage, input.refill_days, start_date) {
        (Some(medicine_name), Some(dosage), Some(refill_days), Some(start_date)) => Ok(NewPrescription {
            medicine_name,
            dosage,
            refill_days,
            start_date,
            image_path,
        }),
        _ => Err(AppError::Internal("validated prescription input incomplete".into())),
    }
}

/// Stores the prescription and the confirmation notice together.
async fn save_prescription(
    state: &AppState,
    customer_id: i64,
    new: NewPrescription,
) -> Result<Prescription, AppError> {
    let mut tx = state.pool.begin().await?;
    let prescription = prescriptions::insert(&mut *tx, customer_id, new).await?;
    notifications::insert(
        &mut *tx,
        NewNotification {
            user_id: customer_id,
            title: "New Prescription Added".to_string(),
            message: format!(
                "Your prescription for {} has been saved. Reminders will be set for every {} days.",
                prescription.medicine_name, prescription.refill_days
            ),
            kind: NotificationKind::Success,
        },
    )
    .await?;
    tx.commit().await?;

    log::info!("Customer {} added prescription {}", customer_id, prescription.id);
    Ok(prescription)
}

pub async fn create(
    AuthUser(customer): AuthUser,
    State(state): State<AppState>,
    AppJson(input): AppJson<PrescriptionInput>,
) -> Result<(StatusCode, Json<Prescription>), AppError> {
    let new = validate_new(input, None)?;
    let prescription = save_prescription(&state, customer.id, new).await?;
    Ok((StatusCode::CREATED, Json(prescription)))
}

struct UploadedImage {
    extension: String,
    bytes: Vec<u8>,
}

/// Multipart variant of [`create`]: the same fields as text parts plus an
/// optional `image` file part.
pub async fn upload(
    AuthUser(customer): AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Prescription>), AppError> {
    let mut input = PrescriptionInput::default();
    let mut image = None;
    let mut v = Validator::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" | "prescriptionImage" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|e| AppError::BadRequest(e.to_string()))?;
                if bytes.is_empty() {
                    continue;
                }
                match image_extension(&file_name) {
                    Some(extension) if bytes.len() <= MAX_IMAGE_BYTES => {
                        image = Some(UploadedImage {
                            extension,
                            bytes: bytes.to_vec(),
                        })
                    }
                    Some(_) => v.error("image", "image must be at most 5 MB"),
                    None => v.error("image", "image must be a jpg, jpeg, png, webp or pdf file"),
                }
            }
            _ => {
                let text = field.text().await.map_err(|e| AppError::BadRequest(e.to_string()))?;
                match name.as_str() {
                    "medicineName" => input.medicine_name = Some(text),
                    "dosage" => input.dosage = Some(text),
                    "refillDays" | "refillDuration" => match text.trim().parse::<i64>() {
                        Ok(days) => input.refill_days = Some(days),
                        Err(_) => v.error("refillDays", "refillDays must be a whole number"),
                    },
                    "startDate" => input.start_date = Some(text),
                    _ => {}
                }
            }
        }
    }
    v.finish()?;

    let mut new = validate_new(input, None)?;
    let stored = match image {
        Some(image) => Some(store_image(&state.config.upload_dir, image).await?),
        None => None,
    };
    new.image_path = stored.as_ref().map(|p| p.to_string_lossy().into_owned());

    match save_prescription(&state, customer.id, new).await {
        Ok(prescription) => Ok((StatusCode::CREATED, Json(prescription))),
        Err(e) => {
            if let Some(path) = stored {
                if let Err(rm) = tokio::fs::remove_file(&path).await {
                    log::warn!("Failed to remove orphaned upload {}: {}", path.display(), rm);
                }
            }
            Err(e)
        }
    }
}

fn image_extension(file_name: &str) -> Option<String> {
    let extension = FsPath::new(file_name).extension()?.to_str()?.to_lowercase();
    IMAGE_EXTENSIONS.contains(&extension.as_str()).then_some(extension)
}

async fn store_image(upload_dir: &str, image: UploadedImage) -> Result<PathBuf, AppError> {
    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| AppError::Internal(format!("creating {}: {}", upload_dir, e)))?;
    let path = FsPath::new(upload_dir).join(format!("{}.{}", Uuid::new_v4(), image.extension));
    tokio::fs::write(&path, &image.bytes)
        .await
        .map_err(|e| AppError::Internal(format!("writing {}: {}", path.display(), e)))?;
    Ok(path)
}

pub async fn list(
    AuthUser(customer): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Prescription>>, AppError> {
    Ok(Json(prescriptions::list_for_customer(&state.pool, customer.id).await?))
}

pub async fn update(
    AuthUser(customer): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(input): AppJson<PrescriptionInput>,
) -> Result<Json<Prescription>, AppError> {
    let mut v = Validator::new();
    if let Some(name) = &input.medicine_name {
        v.check(!name.trim().is_empty(), "medicineName", "medicineName cannot be blank");
    }
    if let Some(dosage) = &input.dosage {
        v.check(!dosage.trim().is_empty(), "dosage", "dosage cannot be blank");
    }
    if let Some(days) = input.refill_days {
        check_refill_days(&mut v, days);
    }
    let start_date = non_blank(input.start_date).and_then(|raw| {
        let parsed = parse_client_date(&raw);
        v.check(parsed.is_some(), "startDate", DATE_FORMAT_HINT);
        parsed
    });
    v.finish()?;

    let current = prescriptions::find_owned(&state.pool, id, customer.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Prescription not found".into()))?;

    let mut v = Validator::new();
    check_schedule(
        &mut v,
        start_date.unwrap_or(current.start_date),
        input.refill_days.unwrap_or(current.refill_days),
    );
    v.finish()?;

    let changes = PrescriptionChanges {
        medicine_name: non_blank(input.medicine_name),
        dosage: non_blank(input.dosage),
        refill_days: input.refill_days,
        start_date,
    };
    Ok(Json(prescriptions::update(&state.pool, &current, changes).await?))
}

pub async fn delete(
    AuthUser(customer): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    if prescriptions::delete(&state.pool, id, customer.id).await? {
        Ok(message("Prescription removed"))
    } else {
        Err(AppError::NotFound("Prescription not found".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_extension_is_whitelisted() {
        assert_eq!(image_extension("scan.PNG"), Some("png".to_string()));
        assert_eq!(image_extension("rx.pdf"), Some("pdf".to_string()));
        assert_eq!(image_extension("virus.exe"), None);
        assert_eq!(image_extension("noext"), None);
    }

    #[test]
    fn new_prescription_requires_fields() {
        let err = validate_new(PrescriptionInput::default(), None).unwrap_err();
        let AppError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["medicineName", "dosage", "refillDays"]);
    }

    #[test]
    fn start_date_defaults_to_now() {
        let before = Utc::now();
        let new = validate_new(
            PrescriptionInput {
                medicine_name: Some("Metformin".into()),
                dosage: Some("500mg".into()),
                refill_days: Some(30),
                start_date: None,
            },
            None,
        )
        .unwrap();
        assert!(new.start_date >= before);
    }

    #[test]
    fn refill_duration_alias_is_accepted() {
        let input: PrescriptionInput =
            serde_json::from_str(r#"{"medicineName":"X","dosage":"1","refillDuration":7}"#).unwrap();
        assert_eq!(input.refill_days, Some(7));
    }
}
