//! Flat-file fallback engine: one JSON array document per collection.
//!
//! Every operation is a whole-file read-modify-write. A per-collection
//! in-process mutex is the serialization point that keeps concurrent
//! requests from losing writes; multi-process access is out of contract.
//! Construction never fails; persistence errors surface per-operation.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::info;

use super::{
    prepare_record, record_id, Collection, FindOptions, Predicate, Record, RecordStore, StoreError,
};

pub struct FileStore {
    dir: PathBuf,
    users_lock: Mutex<()>,
    interviews_lock: Mutex<()>,
}

impl FileStore {
    /// Opens the store rooted at `dir`. Nothing is touched on disk until the
    /// first operation, so this cannot fail.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        info!(path = %dir.display(), "flat-file store opened");
        Self {
            dir,
            users_lock: Mutex::new(()),
            interviews_lock: Mutex::new(()),
        }
    }

    fn lock_for(&self, collection: Collection) -> &Mutex<()> {
        match collection {
            Collection::Users => &self.users_lock,
            Collection::Interviews => &self.interviews_lock,
        }
    }

    fn path_for(&self, collection: Collection) -> PathBuf {
        self.dir.join(collection.file_name())
    }

    async fn load(path: &Path) -> Result<Vec<Record>, StoreError> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    /// Writes to a sibling temp file and renames it over the document, so a
    /// crash mid-write cannot truncate the collection.
    async fn save(&self, path: &Path, records: &[Record]) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let raw = serde_json::to_string_pretty(records)?;
        let staged = path.with_extension("json.tmp");
        tokio::fs::write(&staged, raw).await?;
        tokio::fs::rename(&staged, path).await?;
        Ok(())
    }
}

/// Unknown fields are rejected, same as the SQL engines' WHERE builders.
fn check_predicate(collection: Collection, predicate: &Predicate) -> Result<(), StoreError> {
    for (field, _) in predicate.fields() {
        if collection.column(field).is_none() {
            return Err(StoreError::UnknownField(field.clone()));
        }
    }
    Ok(())
}

fn matches(record: &Record, predicate: &Predicate) -> bool {
    predicate
        .fields()
        .iter()
        .all(|(field, value)| record.get(field) == Some(value))
}

fn created_at_key(record: &Record) -> &str {
    record
        .get("created_at")
        .and_then(Value::as_str)
        .unwrap_or("")
}

#[async_trait::async_trait]
impl RecordStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn create(&self, collection: Collection, record: Record) -> Result<Record, StoreError> {
        let _guard = self.lock_for(collection).lock().await;
        let path = self.path_for(collection);
        let mut records = Self::load(&path).await?;

        for unique in collection.unique_columns() {
            if let Some(value) = record.get(*unique) {
                if records.iter().any(|r| r.get(*unique) == Some(value)) {
                    return Err(StoreError::Constraint(format!(
                        "duplicate value for unique field '{unique}'"
                    )));
                }
            }
        }

        // Only declared columns are persisted, as with the SQL engines.
        let record: Record = prepare_record(record)
            .into_iter()
            .filter(|(key, _)| collection.column(key).is_some())
            .collect();
        records.push(record.clone());
        self.save(&path, &records).await?;
        Ok(record)
    }

    async fn find_one(
        &self,
        collection: Collection,
        predicate: &Predicate,
    ) -> Result<Option<Record>, StoreError> {
        check_predicate(collection, predicate)?;
        let _guard = self.lock_for(collection).lock().await;
        let records = Self::load(&self.path_for(collection)).await?;
        Ok(records.into_iter().find(|r| matches(r, predicate)))
    }

    async fn find_by_id(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Record>, StoreError> {
        let _guard = self.lock_for(collection).lock().await;
        let records = Self::load(&self.path_for(collection)).await?;
        Ok(records.into_iter().find(|r| record_id(r) == Some(id)))
    }

    async fn find(
        &self,
        collection: Collection,
        predicate: &Predicate,
        options: FindOptions,
    ) -> Result<Vec<Record>, StoreError> {
        check_predicate(collection, predicate)?;
        let _guard = self.lock_for(collection).lock().await;
        let records = Self::load(&self.path_for(collection)).await?;
        let mut matching: Vec<Record> =
            records.into_iter().filter(|r| matches(r, predicate)).collect();
        if options.sort_desc_by_created_at {
            // RFC3339 timestamps order lexicographically.
            matching.sort_by(|a, b| created_at_key(b).cmp(created_at_key(a)));
        }
        Ok(matching)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: Record,
    ) -> Result<Option<Record>, StoreError> {
        for key in fields.keys() {
            if key != "id" && collection.column(key).is_none() {
                return Err(StoreError::UnknownField(key.clone()));
            }
        }
        let _guard = self.lock_for(collection).lock().await;
        let path = self.path_for(collection);
        let mut records = Self::load(&path).await?;

        let Some(index) = records.iter().position(|r| record_id(r) == Some(id)) else {
            return Ok(None);
        };

        for (key, value) in fields {
            if key == "id" {
                continue;
            }
            records[index].insert(key, value);
        }
        records[index].insert(
            "updated_at".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );

        let updated = records[index].clone();
        self.save(&path, &records).await?;
        Ok(Some(updated))
    }

    async fn count(
        &self,
        collection: Collection,
        predicate: &Predicate,
    ) -> Result<u64, StoreError> {
        check_predicate(collection, predicate)?;
        let _guard = self.lock_for(collection).lock().await;
        let records = Self::load(&self.path_for(collection)).await?;
        Ok(records.iter().filter(|r| matches(r, predicate)).count() as u64)
    }

    async fn average(
        &self,
        collection: Collection,
        field: &str,
        predicate: &Predicate,
    ) -> Result<f64, StoreError> {
        if collection.column(field).is_none() {
            return Err(StoreError::UnknownField(field.to_string()));
        }
        check_predicate(collection, predicate)?;
        let _guard = self.lock_for(collection).lock().await;
        let records = Self::load(&self.path_for(collection)).await?;
        let values: Vec<f64> = records
            .iter()
            .filter(|r| matches(r, predicate))
            .filter_map(|r| r.get(field).and_then(Value::as_f64))
            .filter(|v| *v != 0.0)
            .collect();
        if values.is_empty() {
            return Ok(0.0);
        }
        Ok(values.iter().sum::<f64>() / values.len() as f64)
    }
}
