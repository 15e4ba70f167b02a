//! Resilient storage abstraction: one record-access contract, three engines.
//!
//! The rest of the crate only ever sees `Arc<dyn RecordStore>`, handed out once
//! by the backend selector at process start. Engines:
//! - `RemoteStore`: Postgres over the network (preferred)
//! - `LocalStore`: co-located embedded SQLite (first fallback)
//! - `FileStore`: one JSON array document per collection (terminal fallback)

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub mod file;
pub mod local;
pub mod remote;
pub mod selector;

pub use file::FileStore;
pub use local::LocalStore;
pub use remote::RemoteStore;
pub use selector::select_backend;

/// A single persisted entity as the store sees it: a flat map of fields.
/// Nested domain structures arrive here already serialized to JSON-string
/// blobs by the repository layer.
pub type Record = serde_json::Map<String, Value>;

/// Errors from storage operations. "Record missing" is a value
/// (`Option::None`), never an error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The two logical collections the application persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Users,
    Interviews,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
}

/// One column of a collection's flat schema.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn text(name: &'static str) -> ColumnSpec {
    ColumnSpec {
        name,
        kind: ColumnKind::Text,
    }
}

const fn integer(name: &'static str) -> ColumnSpec {
    ColumnSpec {
        name,
        kind: ColumnKind::Integer,
    }
}

const USER_COLUMNS: &[ColumnSpec] = &[
    text("id"),
    text("name"),
    text("email"),
    text("password"),
    text("role"),
    text("profile"),
    text("created_at"),
    text("updated_at"),
];

const INTERVIEW_COLUMNS: &[ColumnSpec] = &[
    text("id"),
    text("user_id"),
    text("target_role"),
    text("profile"),
    text("questions"),
    text("answers"),
    integer("score"),
    text("strengths"),
    text("improvements"),
    text("summary"),
    text("status"),
    text("created_at"),
    text("updated_at"),
];

impl Collection {
    pub fn table(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Interviews => "interviews",
        }
    }

    /// File name used by the flat-file engine.
    pub fn file_name(&self) -> &'static str {
        match self {
            Collection::Users => "users.json",
            Collection::Interviews => "interviews.json",
        }
    }

    pub fn columns(&self) -> &'static [ColumnSpec] {
        match self {
            Collection::Users => USER_COLUMNS,
            Collection::Interviews => INTERVIEW_COLUMNS,
        }
    }

    pub fn column(&self, name: &str) -> Option<&'static ColumnSpec> {
        self.columns().iter().find(|c| c.name == name)
    }

    /// Declared uniqueness rules, enforced by every engine.
    pub fn unique_columns(&self) -> &'static [&'static str] {
        match self {
            Collection::Users => &["email"],
            Collection::Interviews => &[],
        }
    }
}

/// A flat conjunction of field = value equality matches. No range or sort
/// expressiveness; ordering is a separate, named option.
#[derive(Debug, Clone, Default)]
pub struct Predicate {
    fields: Vec<(String, Value)>,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((field.into(), value.into()));
        self
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FindOptions {
    /// Newest records first, by the store-stamped `created_at`.
    pub sort_desc_by_created_at: bool,
}

/// The uniform CRUD contract implemented independently by all three engines.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short engine name for status logging ("postgres", "sqlite", "file").
    fn name(&self) -> &'static str;

    /// Persists a record, assigning a unique opaque `id` when absent and
    /// stamping `created_at`/`updated_at`. Fails with
    /// [`StoreError::Constraint`] when a declared uniqueness rule is violated.
    async fn create(&self, collection: Collection, record: Record) -> Result<Record, StoreError>;

    /// First record matching the predicate, or `None`.
    async fn find_one(
        &self,
        collection: Collection,
        predicate: &Predicate,
    ) -> Result<Option<Record>, StoreError>;

    async fn find_by_id(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Record>, StoreError>;

    /// All records matching the predicate, optionally newest-first.
    async fn find(
        &self,
        collection: Collection,
        predicate: &Predicate,
        options: FindOptions,
    ) -> Result<Vec<Record>, StoreError>;

    /// Merges the partial fields into the stored record, refreshes
    /// `updated_at`, and returns the updated record (`None` when the id is
    /// unknown).
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: Record,
    ) -> Result<Option<Record>, StoreError>;

    async fn count(&self, collection: Collection, predicate: &Predicate)
        -> Result<u64, StoreError>;

    /// Arithmetic mean of `field` over matching records where the field is
    /// present and non-zero. `0.0` when nothing contributes.
    async fn average(
        &self,
        collection: Collection,
        field: &str,
        predicate: &Predicate,
    ) -> Result<f64, StoreError>;
}

/// Assigns an id when absent and stamps creation/update timestamps.
/// Shared by all engines so created records look identical everywhere.
pub(crate) fn prepare_record(mut record: Record) -> Record {
    let has_id = record.get("id").map(|v| !v.is_null()).unwrap_or(false);
    if !has_id {
        record.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
    }
    let now = Utc::now().to_rfc3339();
    record.insert("created_at".to_string(), Value::String(now.clone()));
    record.insert("updated_at".to_string(), Value::String(now));
    record
}

/// The canonical identifier, accepting the legacy `_id` spelling.
pub fn record_id(record: &Record) -> Option<&str> {
    record
        .get("id")
        .or_else(|| record.get("_id"))
        .and_then(Value::as_str)
}

/// Typed value handed to a SQL bind site or compared in the file engine.
pub(crate) enum BindValue {
    Text(Option<String>),
    Int(i64),
}

/// Converts a record field into the column's storage representation.
/// Native nested values (a legal alternate representation) are serialized.
pub(crate) fn bind_value(spec: &ColumnSpec, value: Option<&Value>) -> BindValue {
    match spec.kind {
        ColumnKind::Text => BindValue::Text(match value {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }),
        ColumnKind::Integer => BindValue::Int(value.and_then(Value::as_i64).unwrap_or(0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_record_assigns_id_and_timestamps() {
        let record = prepare_record(Record::new());
        let id = record_id(&record).expect("id assigned");
        assert!(!id.is_empty());
        assert!(record.get("created_at").unwrap().is_string());
        assert!(record.get("updated_at").unwrap().is_string());
    }

    #[test]
    fn test_prepare_record_keeps_existing_id() {
        let mut record = Record::new();
        record.insert("id".into(), Value::String("fixed".into()));
        let record = prepare_record(record);
        assert_eq!(record_id(&record), Some("fixed"));
    }

    #[test]
    fn test_record_id_accepts_legacy_alias() {
        let mut record = Record::new();
        record.insert("_id".into(), Value::String("legacy".into()));
        assert_eq!(record_id(&record), Some("legacy"));
    }

    #[test]
    fn test_unique_columns_declared_for_users_only() {
        assert_eq!(Collection::Users.unique_columns(), &["email"]);
        assert!(Collection::Interviews.unique_columns().is_empty());
    }

    #[test]
    fn test_schema_knows_score_is_numeric() {
        let score = Collection::Interviews.column("score").unwrap();
        assert_eq!(score.kind, ColumnKind::Integer);
        assert!(Collection::Interviews.column("nope").is_none());
    }
}
