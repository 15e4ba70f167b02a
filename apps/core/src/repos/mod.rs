//! Domain-typed repositories over the record store.
//!
//! This layer owns everything the store is deliberately ignorant of:
//! (de)serializing nested structures to flat blobs, business-level
//! uniqueness, the interview-listing enrichment join, and identifier
//! normalization (`_id` accepted as an alias for `id`).

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::CoreError;
use crate::store::{record_id, Record};

pub mod interviews;
pub mod users;

pub use interviews::{CandidateRef, InterviewListing, InterviewRepository, NewInterview};
pub use users::UserRepository;

/// Canonical id of a stored record, tolerating the legacy `_id` spelling.
fn require_id(record: &Record) -> Result<String, CoreError> {
    record_id(record)
        .map(str::to_string)
        .ok_or_else(|| CoreError::InvalidArgument("stored record has no identifier".to_string()))
}

fn string_field(record: &Record, key: &str) -> String {
    record
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn int_field(record: &Record, key: &str) -> i64 {
    record.get(key).and_then(Value::as_i64).unwrap_or(0)
}

/// Reads a nested structure stored either as a JSON-string blob (the flat
/// representation every SQL engine uses) or as a native nested value (legal
/// in the document-style file engine). Both normalize to the same type.
fn nested_field<T>(record: &Record, key: &str) -> Result<T, CoreError>
where
    T: DeserializeOwned + Default,
{
    match record.get(key) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(Value::String(blob)) if blob.trim().is_empty() => Ok(T::default()),
        Some(Value::String(blob)) => Ok(serde_json::from_str(blob)?),
        Some(native) => Ok(serde_json::from_value(native.clone())?),
    }
}

/// Serializes a nested structure to the flat blob representation.
fn to_blob<T: serde::Serialize>(value: &T) -> Result<Value, CoreError> {
    Ok(Value::String(serde_json::to_string(value)?))
}

fn created_at_field(record: &Record) -> DateTime<Utc> {
    record
        .get("created_at")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}
