use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid date format ({0})")]
pub struct InvalidDate(pub String);

/// Derives the `YYYYMM` billing period from a spreadsheet date cell.
///
/// Text containing `/` is taken verbatim with the slashes removed. Date and
/// date-time cells arrive as ISO 8601 strings and are formatted as `%Y%m`.
pub fn billing_period_from(cell: &Value) -> Result<String, InvalidDate> {
    let Value::String(text) = cell else {
        return Err(InvalidDate(cell.to_string()));
    };
    let text = text.trim();

    if text.contains('/') {
        return Ok(text.replace('/', ""));
    }

    parse_date(text)
        .map(|date| date.format("%Y%m").to_string())
        .ok_or_else(|| InvalidDate(text.to_string()))
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}
