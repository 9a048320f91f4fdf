//! Read-side timestamp revival.
//!
//! Rows come back from the store with temporal columns in their native
//! representation (text or epoch numbers). Revival rewrites the known
//! timestamp columns into `Value::Timestamp` and leaves every other field
//! untouched.

use crate::db::{DbError, DbResult};
use crate::model::record::Record;
use crate::model::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Columns rewritten into timestamps on read.
pub const TIMESTAMP_COLUMNS: [&str; 2] = ["created_at", "updated_at"];

const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

pub fn revive_rows(rows: Vec<Record>) -> DbResult<Vec<Record>> {
    rows.into_iter().map(revive_record).collect()
}

pub fn revive_record(record: Record) -> DbResult<Record> {
    record
        .into_iter()
        .map(|(column, value)| {
            if TIMESTAMP_COLUMNS.contains(&column.as_str()) {
                let revived = revive_timestamp(&column, value)?;
                Ok((column, revived))
            } else {
                Ok((column, value))
            }
        })
        .collect()
}

/// Parses a store-native timestamp representation.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]` (UTC), `YYYY-MM-DD`
/// (midnight UTC) and epoch milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Timestamp(value) => Some(*value),
        Value::Text(text) => parse_timestamp_text(text),
        Value::Integer(millis) => DateTime::from_timestamp_millis(*millis),
        Value::Real(millis) if millis.is_finite() => {
            DateTime::from_timestamp_millis(millis.trunc() as i64)
        }
        _ => None,
    }
}

fn revive_timestamp(column: &str, value: Value) -> DbResult<Value> {
    if value.is_null() {
        return Ok(value);
    }
    parse_timestamp(&value).map(Value::Timestamp).ok_or_else(|| {
        DbError::InvalidData(format!(
            "column `{column}` holds `{value}`, which is not a timestamp"
        ))
    })
}

fn parse_timestamp_text(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|parsed| parsed.and_utc())
}
