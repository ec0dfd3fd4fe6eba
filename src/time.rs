//! Calendar parsing and rendering for date-typed fields.
//!
//! Dates are stored as UTC timestamps and always rendered in one normalized
//! textual form (RFC 3339, millisecond precision, `Z` suffix), so clients see
//! `1934-03-09T00:00:00.000Z` regardless of how the value was supplied.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::error::ValidationError;

/// Parses a birthday supplied by a client.
///
/// Accepts either a calendar date (`YYYY-MM-DD`, interpreted as midnight UTC)
/// or a full RFC 3339 timestamp (converted to UTC).
///
/// # Errors
///
/// Returns `ValidationError::InvalidBirthday` for anything else, and
/// `ValidationError::EmptyField` for a blank value.
///
/// # Examples
///
/// ```
/// use cosmoql::time::{format_timestamp, parse_birthday};
///
/// let birthday = parse_birthday("1934-03-09").unwrap();
/// assert_eq!(format_timestamp(&birthday), "1934-03-09T00:00:00.000Z");
/// ```
pub fn parse_birthday(raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField { field: "birthday" });
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    DateTime::parse_from_rfc3339(trimmed)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| ValidationError::InvalidBirthday {
            value: trimmed.to_string(),
        })
}

/// Renders a timestamp in the normalized textual form.
#[must_use]
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
