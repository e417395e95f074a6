use chrono::{DateTime, NaiveDate, Utc};

/// Helper function to format the date
///
/// Formats a `NaiveDate` as "dd-mm-yyyy", the form used in customer-facing
/// reminder messages.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

/// Parses a date supplied by a client.
///
/// Accepts either an RFC 3339 timestamp (`2024-05-01T09:30:00Z`) or a plain
/// calendar date (`2024-05-01`, read as midnight UTC).
pub fn parse_client_date(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
