//! Calendar-date parsing and normalization

use chrono::{DateTime, NaiveDate};
use thiserror::Error;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
#[error("unparseable date '{raw}'")]
pub struct ParseDateError {
    raw: String,
}

/// Parse a date-only `YYYY-MM-DD` string
pub fn parse_date(raw: &str) -> Result<NaiveDate, ParseDateError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| ParseDateError {
        raw: raw.to_string(),
    })
}

/// Normalize a catalog date to date-only granularity.
///
/// Term dates arrive as localized datetimes (`2020-09-01T04:00:00.000Z`)
/// while reserve dates are stored as bare dates (`2020-09-04`). Callers
/// decide the fallback for an unparseable datetime; bare strings pass
/// through untouched.
pub fn normalize_date(raw: &str) -> Result<String, ParseDateError> {
    if raw.is_empty() || !raw.contains('T') {
        return Ok(raw.to_string());
    }

    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive().format(DATE_FORMAT).to_string())
        .map_err(|_| ParseDateError {
            raw: raw.to_string(),
        })
}
