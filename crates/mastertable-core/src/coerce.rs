//! Value coercion for text cells handed over by the loaders.
//!
//! Every numeric or timestamp cell goes through [`parse_numeric`] or
//! [`parse_timestamp`]. Callers decide what a failure means: the table layer
//! turns a bad number into a missing value, the event extractor turns a bad
//! bound into an unresolved window.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    #[error("value is empty")]
    Empty,
    #[error("'{0}' is not a number")]
    NotNumeric(String),
    #[error("'{0}' is not a finite number")]
    NotFinite(String),
    #[error("'{0}' is not a recognised timestamp")]
    NotTimestamp(String),
}

static DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S%.f",
    "%d.%m.%Y %H:%M",
];

static DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parses a numeric cell. Empty, non-numeric and non-finite (`NaN`, `inf`)
/// inputs are errors.
pub fn parse_numeric(value: &str) -> Result<f64, CoercionError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoercionError::Empty);
    }

    match trimmed.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => Ok(parsed),
        Ok(_) => Err(CoercionError::NotFinite(trimmed.to_string())),
        Err(_) => Err(CoercionError::NotNumeric(trimmed.to_string())),
    }
}

/// Parses a timestamp cell as a naive (plant-local) instant. RFC 3339 inputs
/// keep their wall-clock time and drop the offset, matching naive telemetry.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, CoercionError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoercionError::Empty);
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(dt);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_local());
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                return Ok(dt);
            }
        }
    }

    Err(CoercionError::NotTimestamp(trimmed.to_string()))
}

pub(crate) fn to_micros(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp_micros()
}
