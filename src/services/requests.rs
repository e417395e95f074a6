//! Request status workflow and the stock reconciliation that rides on it.
//!
//! A status change runs in one transaction:
//! 1. Load the request and check the retailer may touch it.
//! 2. Check the move against [`RequestStatus::transition_to`].
//! 3. On completion, take one unit from the retailer's matching medicine.
//! 4. Store the new status and message.
//! 5. Notify the customer.
//!
//! Any failure rolls the whole change back, so stock, status and the
//! notification always move together.

use sqlx::SqlitePool;
use thiserror::Error;

use crate::db::{
    medicines,
    models::{Medicine, Notification, Request, RequestStatus, Transition},
    notifications::{self, NewNotification},
    requests,
};
use crate::error::AppError;

#[derive(Error, Debug)]
pub enum TransitionError {
    #[error("Request not found")]
    NotFound,
    #[error("Request is completed and locked; it can no longer be changed")]
    Locked,
    #[error("Cannot change request status from {from} to {to}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },
    #[error("{medicine} is out of stock")]
    OutOfStock { medicine: String },
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::NotFound => AppError::NotFound(err.to_string()),
            TransitionError::Locked
            | TransitionError::InvalidTransition { .. }
            | TransitionError::OutOfStock { .. } => AppError::BadRequest(err.to_string()),
            TransitionError::Database(e) => AppError::Database(e),
        }
    }
}

pub struct StatusUpdate {
    pub status: RequestStatus,
    pub retailer_message: Option<String>,
}

#[derive(Debug)]
pub struct TransitionOutcome {
    pub request: Request,
    pub notification: Notification,
    /// The medicine a unit was taken from, with its stock after the deduction.
    pub deducted_from: Option<Medicine>,
}

/// Moves request `request_id` to `update.status` on behalf of `retailer_id`.
pub async fn update_request_status(
    pool: &SqlitePool,
    retailer_id: i64,
    request_id: i64,
    update: StatusUpdate,
) -> Result<TransitionOutcome, TransitionError> {
    let message = update
        .retailer_message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty());

    let mut tx = pool.begin().await?;

    let current = requests::find_by_id(&mut *tx, request_id)
        .await?
        .ok_or(TransitionError::NotFound)?;
    if current.retailer_id.is_some_and(|owner| owner != retailer_id) {
        return Err(TransitionError::NotFound);
    }

    match current.status.transition_to(update.status) {
        Transition::Allowed => {}
        Transition::Locked => return Err(TransitionError::Locked),
        Transition::Invalid => {
            return Err(TransitionError::InvalidTransition {
                from: current.status,
                to: update.status,
            })
        }
    }

    let mut deducted_from = None;
    if update.status == RequestStatus::Completed {
        match medicines::find_for_retailer_by_name(&mut *tx, retailer_id, &current.medicine_name).await? {
            Some(medicine) => {
                if !medicines::decrement_stock(&mut *tx, medicine.id).await? {
                    log::info!(
                        "Request {} not completed: {} (medicine {}) is out of stock",
                        request_id,
                        medicine.name,
                        medicine.id
                    );
                    return Err(TransitionError::OutOfStock {
                        medicine: medicine.name,
                    });
                }
                deducted_from = Some(Medicine {
                    stock: medicine.stock - 1,
                    ..medicine
                });
            }
            None => log::warn!(
                "Request {} completed without stock deduction: no inventory match for {:?}",
                request_id,
                current.medicine_name
            ),
        }
    }

    let request = requests::set_status(&mut *tx, request_id, retailer_id, update.status, message).await?;
    let notification = notifications::insert(&mut *tx, status_notification(&request)).await?;

    tx.commit().await?;

    log::info!(
        "Request {} moved {} -> {} by retailer {}",
        request_id,
        current.status,
        request.status,
        retailer_id
    );

    Ok(TransitionOutcome {
        request,
        notification,
        deducted_from,
    })
}

/// The customer-facing notice for a request's current status.
pub fn status_notification(request: &Request) -> NewNotification {
    let status = request.status;
    let note = request
        .retailer_message
        .as_deref()
        .map(|m| format!(" Note: {}", m))
        .unwrap_or_default();

    NewNotification {
        user_id: request.customer_id,
        title: format!("Order Status: {}", status),
        message: format!(
            "Your request for {} is now {}.{}",
            request.medicine_name,
            status.as_str().to_lowercase(),
            note
        ),
        kind: status.notification_kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        medicines::NewMedicine,
        models::{NotificationKind, RequestKind, Role, User},
        requests::NewRequest,
        test_pool,
    };
    use crate::testing::create_user;
    use proptest::prelude::*;

    struct Fixture {
        pool: SqlitePool,
        customer: User,
        shop: User,
    }

    async fn fixture() -> Fixture {
        let pool = test_pool().await;
        let customer = create_user(&pool, "Ana", Role::Customer).await;
        let shop = create_user(&pool, "Shop", Role::Retailer).await;
        Fixture { pool, customer, shop }
    }

    async fn stock(pool: &SqlitePool, retailer_id: i64, name: &str, stock: i64) -> Medicine {
        medicines::insert(
            pool,
            retailer_id,
            NewMedicine {
                name: name.to_string(),
                category: None,
                price: 3.0,
                stock,
                description: None,
            },
        )
        .await
        .unwrap()
    }

    async fn open_request(f: &Fixture, name: &str) -> Request {
        requests::insert(
            &f.pool,
            f.customer.id,
            NewRequest {
                medicine_name: name.to_string(),
                kind: RequestKind::Refill,
                prescription_id: None,
                retailer_id: None,
            },
        )
        .await
        .unwrap()
    }

    fn to(status: RequestStatus) -> StatusUpdate {
        StatusUpdate {
            status,
            retailer_message: None,
        }
    }

    async fn notification_count(pool: &SqlitePool, user_id: i64) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    async fn stock_of(pool: &SqlitePool, id: i64) -> i64 {
        medicines::find_by_id(pool, id).await.unwrap().unwrap().stock
    }

    #[tokio::test]
    async fn walks_the_full_workflow() {
        let f = fixture().await;
        let m = stock(&f.pool, f.shop.id, "Amoxicillin", 2).await;
        let r = open_request(&f, "amoxicillin").await;

        for status in [
            RequestStatus::Accepted,
            RequestStatus::ReadyForPickup,
            RequestStatus::Completed,
        ] {
            let out = update_request_status(&f.pool, f.shop.id, r.id, to(status)).await.unwrap();
            assert_eq!(out.request.status, status);
        }

        assert_eq!(stock_of(&f.pool, m.id).await, 1);
        assert_eq!(notification_count(&f.pool, f.customer.id).await, 3);
    }

    #[tokio::test]
    async fn completion_deducts_one_unit() {
        let f = fixture().await;
        let m = stock(&f.pool, f.shop.id, "Aspirin", 5).await;
        let r = open_request(&f, "ASPIRIN").await;

        let out = update_request_status(&f.pool, f.shop.id, r.id, to(RequestStatus::Completed))
            .await
            .unwrap();

        assert_eq!(out.deducted_from.as_ref().map(|m| m.stock), Some(4));
        assert_eq!(stock_of(&f.pool, m.id).await, 4);
        assert_eq!(out.notification.kind, NotificationKind::Success);
        assert_eq!(out.notification.user_id, f.customer.id);
    }

    #[tokio::test]
    async fn completed_requests_are_locked() {
        let f = fixture().await;
        let m = stock(&f.pool, f.shop.id, "Aspirin", 5).await;
        let r = open_request(&f, "Aspirin").await;
        update_request_status(&f.pool, f.shop.id, r.id, to(RequestStatus::Completed))
            .await
            .unwrap();

        for status in RequestStatus::ALL {
            let err = update_request_status(&f.pool, f.shop.id, r.id, to(status))
                .await
                .unwrap_err();
            assert!(matches!(err, TransitionError::Locked));
        }

        // Still exactly one deduction and one notification.
        assert_eq!(stock_of(&f.pool, m.id).await, 4);
        assert_eq!(notification_count(&f.pool, f.customer.id).await, 1);
        let stored = requests::find_by_id(&f.pool, r.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Completed);
    }

    #[tokio::test]
    async fn out_of_stock_rejects_whole_transition() {
        let f = fixture().await;
        let m = stock(&f.pool, f.shop.id, "Insulin", 0).await;
        let r = open_request(&f, "Insulin").await;
        update_request_status(&f.pool, f.shop.id, r.id, to(RequestStatus::Accepted))
            .await
            .unwrap();

        let err = update_request_status(&f.pool, f.shop.id, r.id, to(RequestStatus::Completed))
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::OutOfStock { ref medicine } if medicine == "Insulin"));

        let stored = requests::find_by_id(&f.pool, r.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Accepted);
        assert_eq!(stock_of(&f.pool, m.id).await, 0);
        assert_eq!(notification_count(&f.pool, f.customer.id).await, 1);
    }

    #[tokio::test]
    async fn completion_without_inventory_match_still_succeeds() {
        let f = fixture().await;
        let r = open_request(&f, "Rare Compound").await;

        let out = update_request_status(&f.pool, f.shop.id, r.id, to(RequestStatus::Completed))
            .await
            .unwrap();
        assert!(out.deducted_from.is_none());
        assert_eq!(out.request.status, RequestStatus::Completed);
    }

    #[tokio::test]
    async fn only_own_inventory_is_consulted() {
        let f = fixture().await;
        let rival = create_user(&f.pool, "Rival", Role::Retailer).await;
        let theirs = stock(&f.pool, rival.id, "Aspirin", 0).await;
        let r = open_request(&f, "Aspirin").await;

        // The rival's empty shelf does not block completion by another shop.
        update_request_status(&f.pool, f.shop.id, r.id, to(RequestStatus::Completed))
            .await
            .unwrap();
        assert_eq!(stock_of(&f.pool, theirs.id).await, 0);
    }

    #[tokio::test]
    async fn partial_name_match_is_used() {
        let f = fixture().await;
        let m = stock(&f.pool, f.shop.id, "Paracetamol", 3).await;
        let r = open_request(&f, "Paracetamol 500mg").await;

        update_request_status(&f.pool, f.shop.id, r.id, to(RequestStatus::Completed))
            .await
            .unwrap();
        assert_eq!(stock_of(&f.pool, m.id).await, 2);
    }

    #[tokio::test]
    async fn requests_owned_by_another_retailer_are_not_found() {
        let f = fixture().await;
        let rival = create_user(&f.pool, "Rival", Role::Retailer).await;
        let r = open_request(&f, "Aspirin").await;
        update_request_status(&f.pool, f.shop.id, r.id, to(RequestStatus::Accepted))
            .await
            .unwrap();

        let err = update_request_status(&f.pool, rival.id, r.id, to(RequestStatus::Rejected))
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::NotFound));
    }

    #[tokio::test]
    async fn unknown_request_is_not_found() {
        let f = fixture().await;
        let err = update_request_status(&f.pool, f.shop.id, 999, to(RequestStatus::Accepted))
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::NotFound));
        assert!(matches!(AppError::from(err), AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn backward_moves_are_refused() {
        let f = fixture().await;
        let r = open_request(&f, "Aspirin").await;
        update_request_status(&f.pool, f.shop.id, r.id, to(RequestStatus::ReadyForPickup))
            .await
            .unwrap();

        let err = update_request_status(&f.pool, f.shop.id, r.id, to(RequestStatus::Pending))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransitionError::InvalidTransition {
                from: RequestStatus::ReadyForPickup,
                to: RequestStatus::Pending
            }
        ));
    }

    #[tokio::test]
    async fn rejection_notifies_with_note() {
        let f = fixture().await;
        let r = open_request(&f, "Aspirin").await;

        let out = update_request_status(
            &f.pool,
            f.shop.id,
            r.id,
            StatusUpdate {
                status: RequestStatus::Rejected,
                retailer_message: Some("  Needs a new prescription ".into()),
            },
        )
        .await
        .unwrap();

        assert_eq!(out.notification.title, "Order Status: Rejected");
        assert_eq!(
            out.notification.message,
            "Your request for Aspirin is now rejected. Note: Needs a new prescription"
        );
        assert_eq!(out.notification.kind, NotificationKind::Danger);
        assert_eq!(
            out.request.retailer_message.as_deref(),
            Some("Needs a new prescription")
        );
    }

    #[test]
    fn notification_text_without_note() {
        let request = Request {
            id: 1,
            customer_id: 7,
            retailer_id: Some(2),
            medicine_name: "Aspirin".into(),
            kind: RequestKind::New,
            status: RequestStatus::ReadyForPickup,
            retailer_message: None,
            prescription_id: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let n = status_notification(&request);
        assert_eq!(n.user_id, 7);
        assert_eq!(n.title, "Order Status: Ready for Pickup");
        assert_eq!(n.message, "Your request for Aspirin is now ready for pickup.");
        assert_eq!(n.kind, NotificationKind::Success);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// Any sequence of status updates keeps stock non-negative, never
        /// changes a completed request, and leaves one notification per
        /// accepted update.
        #[test]
        fn random_workflows_hold_invariants(
            initial_stock in 0i64..3,
            steps in prop::collection::vec(
                (0usize..3, prop::sample::select(RequestStatus::ALL.to_vec())),
                1..12,
            ),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async {
                let f = fixture().await;
                let m = stock(&f.pool, f.shop.id, "Aspirin", initial_stock).await;
                let mut reqs = Vec::new();
                for _ in 0..3 {
                    reqs.push(open_request(&f, "Aspirin").await);
                }

                let mut successes = 0i64;
                for (idx, status) in steps {
                    let id = reqs[idx].id;
                    let before = requests::find_by_id(&f.pool, id).await.unwrap().unwrap();
                    match update_request_status(&f.pool, f.shop.id, id, to(status)).await {
                        Ok(out) => {
                            assert_ne!(before.status, RequestStatus::Completed);
                            assert_eq!(out.notification.user_id, f.customer.id);
                            successes += 1;
                        }
                        Err(_) => {
                            let after = requests::find_by_id(&f.pool, id).await.unwrap().unwrap();
                            assert_eq!(after.status, before.status);
                        }
                    }
                    assert!(stock_of(&f.pool, m.id).await >= 0);
                }

                let completed: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM requests WHERE status = 'Completed'",
                )
                .fetch_one(&f.pool)
                .await
                .unwrap();
                assert!(completed <= initial_stock);
                assert_eq!(stock_of(&f.pool, m.id).await, initial_stock - completed);
                assert_eq!(notification_count(&f.pool, f.customer.id).await, successes);
            });
        }
    }
}
