use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Retailer,
}

impl FromStr for Role {
    type Err = &'static str;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "retailer" => Ok(Role::Retailer),
            _ => Err("role must be one of: customer, retailer"),
        }
    }
}

#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Medicine {
    pub id: i64,
    pub name: String,
    pub category: Option<String>,
    pub price: f64,
    pub stock: i64,
    pub description: Option<String>,
    pub retailer_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    pub id: i64,
    pub customer_id: i64,
    pub medicine_name: String,
    pub dosage: String,
    pub refill_days: i64,
    pub start_date: DateTime<Utc>,
    pub next_refill_date: DateTime<Utc>,
    pub image_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Prescription {
    /// Longest accepted refill interval, ten years.
    pub const MAX_REFILL_DAYS: i64 = 3650;

    /// The date the next refill falls due: exactly `refill_days` after
    /// `start_date`, or `None` when that lies outside the representable range.
    pub fn next_refill_date(start_date: DateTime<Utc>, refill_days: i64) -> Option<DateTime<Utc>> {
        start_date.checked_add_signed(Duration::try_days(refill_days)?)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RequestKind {
    Refill,
    New,
}

impl FromStr for RequestKind {
    type Err = &'static str;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "refill" => Ok(RequestKind::Refill),
            "new" => Ok(RequestKind::New),
            _ => Err("type must be one of: refill, new"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize, sqlx::Type)]
pub enum RequestStatus {
    Pending,
    Accepted,
    #[serde(rename = "Ready for Pickup")]
    #[sqlx(rename = "Ready for Pickup")]
    ReadyForPickup,
    Rejected,
    Completed,
}

/// Outcome of asking whether a request may move between two statuses.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Transition {
    Allowed,
    /// The request is Completed and can no longer change.
    Locked,
    Invalid,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 5] = [
        RequestStatus::Pending,
        RequestStatus::Accepted,
        RequestStatus::ReadyForPickup,
        RequestStatus::Rejected,
        RequestStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::Accepted => "Accepted",
            RequestStatus::ReadyForPickup => "Ready for Pickup",
            RequestStatus::Rejected => "Rejected",
            RequestStatus::Completed => "Completed",
        }
    }

    // Position along the fulfilment path. Rejected sits off the path.
    fn rank(self) -> Option<u8> {
        match self {
            RequestStatus::Pending => Some(0),
            RequestStatus::Accepted => Some(1),
            RequestStatus::ReadyForPickup => Some(2),
            RequestStatus::Completed => Some(3),
            RequestStatus::Rejected => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == RequestStatus::Completed
    }

    /// Requests move forward along Pending → Accepted → Ready for Pickup →
    /// Completed (steps may be skipped, and re-saving the same status is
    /// allowed so the retailer can change the message). Rejected is reachable
    /// from any open status and can only be re-saved as Rejected.
    pub fn transition_to(self, next: RequestStatus) -> Transition {
        if self.is_terminal() {
            return Transition::Locked;
        }
        match (self.rank(), next.rank()) {
            (Some(_), None) => Transition::Allowed,
            (None, None) => Transition::Allowed,
            (None, Some(_)) => Transition::Invalid,
            (Some(from), Some(to)) if to >= from => Transition::Allowed,
            (Some(_), Some(_)) => Transition::Invalid,
        }
    }

    pub fn notification_kind(self) -> NotificationKind {
        match self {
            RequestStatus::ReadyForPickup | RequestStatus::Completed => NotificationKind::Success,
            RequestStatus::Rejected => NotificationKind::Danger,
            RequestStatus::Pending | RequestStatus::Accepted => NotificationKind::Info,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = &'static str;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        RequestStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
            .ok_or("status must be one of: Pending, Accepted, Ready for Pickup, Rejected, Completed")
    }
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub id: i64,
    pub customer_id: i64,
    pub retailer_id: Option<i64>,
    pub medicine_name: String,
    #[serde(rename = "type")]
    pub kind: RequestKind,
    pub status: RequestStatus,
    pub retailer_message: Option<String>,
    pub prescription_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Danger,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Public identity attached to joined rows (`customer`, `retailer`).
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Contact {
    pub id: i64,
    pub name: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn any_status() -> impl Strategy<Value = RequestStatus> {
        prop::sample::select(RequestStatus::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn completed_never_transitions(next in any_status()) {
            prop_assert_eq!(RequestStatus::Completed.transition_to(next), Transition::Locked);
        }

        #[test]
        fn open_requests_can_always_be_rejected(from in any_status()) {
            prop_assume!(from != RequestStatus::Completed);
            prop_assert_eq!(from.transition_to(RequestStatus::Rejected), Transition::Allowed);
        }

        #[test]
        fn next_refill_is_start_plus_interval(days in 1i64..3650, secs in 0i64..4_000_000_000) {
            let start = Utc.timestamp_opt(secs, 0).unwrap();
            let next = Prescription::next_refill_date(start, days).unwrap();
            prop_assert_eq!(next - start, Duration::days(days));
        }

        #[test]
        fn next_refill_never_panics(days in any::<i64>(), secs in 0i64..4_000_000_000) {
            let start = Utc.timestamp_opt(secs, 0).unwrap();
            let _ = Prescription::next_refill_date(start, days);
        }
    }

    #[test]
    fn forward_moves_are_allowed() {
        use RequestStatus::*;
        assert_eq!(Pending.transition_to(Accepted), Transition::Allowed);
        assert_eq!(Accepted.transition_to(ReadyForPickup), Transition::Allowed);
        assert_eq!(ReadyForPickup.transition_to(Completed), Transition::Allowed);
        assert_eq!(Pending.transition_to(Completed), Transition::Allowed);
        assert_eq!(Accepted.transition_to(Accepted), Transition::Allowed);
    }

    #[test]
    fn backward_moves_are_invalid() {
        use RequestStatus::*;
        assert_eq!(ReadyForPickup.transition_to(Pending), Transition::Invalid);
        assert_eq!(Accepted.transition_to(Pending), Transition::Invalid);
        assert_eq!(Rejected.transition_to(Accepted), Transition::Invalid);
        assert_eq!(Rejected.transition_to(Completed), Transition::Invalid);
        assert_eq!(Rejected.transition_to(Rejected), Transition::Allowed);
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!(
            "ready for pickup".parse::<RequestStatus>(),
            Ok(RequestStatus::ReadyForPickup)
        );
        assert_eq!("Completed".parse::<RequestStatus>(), Ok(RequestStatus::Completed));
        assert!("Shipped".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn status_serializes_with_display_name() {
        let json = serde_json::to_string(&RequestStatus::ReadyForPickup).unwrap();
        assert_eq!(json, "\"Ready for Pickup\"");
    }

    #[test]
    fn notification_tone_follows_status() {
        assert_eq!(RequestStatus::ReadyForPickup.notification_kind(), NotificationKind::Success);
        assert_eq!(RequestStatus::Completed.notification_kind(), NotificationKind::Success);
        assert_eq!(RequestStatus::Rejected.notification_kind(), NotificationKind::Danger);
        assert_eq!(RequestStatus::Accepted.notification_kind(), NotificationKind::Info);
    }
}
