//! Local fallback engine: embedded SQLite via sqlx.
//!
//! Same operation semantics as the remote engine; every operation is a
//! single SQL statement, so the engine's own write atomicity is enough and
//! no extra in-process locking is needed.

use std::path::Path;

use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::info;

use super::{
    bind_value, prepare_record, BindValue, Collection, ColumnKind, FindOptions, Predicate, Record,
    RecordStore, StoreError,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        name TEXT,
        email TEXT UNIQUE,
        password TEXT,
        role TEXT,
        profile TEXT,
        created_at TEXT,
        updated_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS interviews (
        id TEXT PRIMARY KEY,
        user_id TEXT,
        target_role TEXT,
        profile TEXT,
        questions TEXT,
        answers TEXT,
        score INTEGER DEFAULT 0,
        strengths TEXT,
        improvements TEXT,
        summary TEXT,
        status TEXT,
        created_at TEXT,
        updated_at TEXT
    )
    "#,
];

pub struct LocalStore {
    pool: SqlitePool,
}

impl LocalStore {
    /// Opens (creating if missing) the database file and initializes the
    /// schema idempotently.
    pub async fn connect(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        // A single connection serializes writers and sidesteps SQLITE_BUSY.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        info!(path = %path.display(), "local SQLite store ready");
        Ok(Self { pool })
    }

    fn record_from_row(collection: Collection, row: &SqliteRow) -> Result<Record, StoreError> {
        let mut record = Record::new();
        for column in collection.columns() {
            let value = match column.kind {
                ColumnKind::Text => row
                    .try_get::<Option<String>, _>(column.name)?
                    .map(Value::String)
                    .unwrap_or(Value::Null),
                ColumnKind::Integer => Value::from(row.try_get::<i64, _>(column.name)?),
            };
            record.insert(column.name.to_string(), value);
        }
        Ok(record)
    }

    fn where_clause(
        collection: Collection,
        predicate: &Predicate,
    ) -> Result<(String, Vec<BindValue>), StoreError> {
        let mut clauses = Vec::new();
        let mut binds = Vec::new();
        for (field, value) in predicate.fields() {
            let column = collection
                .column(field)
                .ok_or_else(|| StoreError::UnknownField(field.clone()))?;
            clauses.push(format!("{} = ?", column.name));
            binds.push(bind_value(column, Some(value)));
        }
        let clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        Ok((clause, binds))
    }
}

fn apply_binds<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    binds: Vec<BindValue>,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    let mut query = query;
    for bind in binds {
        query = match bind {
            BindValue::Text(text) => query.bind(text),
            BindValue::Int(int) => query.bind(int),
        };
    }
    query
}

fn map_sqlx_error(error: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db) = error {
        if db.is_unique_violation() {
            return StoreError::Constraint(format!("unique constraint violated: {db}"));
        }
    }
    StoreError::Database(error)
}

#[async_trait::async_trait]
impl RecordStore for LocalStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn create(&self, collection: Collection, record: Record) -> Result<Record, StoreError> {
        let record = prepare_record(record);
        let columns = collection.columns();
        let names: Vec<&str> = columns.iter().map(|c| c.name).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            collection.table(),
            names.join(", "),
            placeholders
        );
        let binds: Vec<BindValue> = columns
            .iter()
            .map(|c| bind_value(c, record.get(c.name)))
            .collect();
        apply_binds(sqlx::query(&sql), binds)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(record)
    }

    async fn find_one(
        &self,
        collection: Collection,
        predicate: &Predicate,
    ) -> Result<Option<Record>, StoreError> {
        let (clause, binds) = Self::where_clause(collection, predicate)?;
        let sql = format!("SELECT * FROM {}{} LIMIT 1", collection.table(), clause);
        let row = apply_binds(sqlx::query(&sql), binds)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::record_from_row(collection, &r)).transpose()
    }

    async fn find_by_id(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Record>, StoreError> {
        let sql = format!("SELECT * FROM {} WHERE id = ?", collection.table());
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::record_from_row(collection, &r)).transpose()
    }

    async fn find(
        &self,
        collection: Collection,
        predicate: &Predicate,
        options: FindOptions,
    ) -> Result<Vec<Record>, StoreError> {
        let (clause, binds) = Self::where_clause(collection, predicate)?;
        let order = if options.sort_desc_by_created_at {
            " ORDER BY created_at DESC"
        } else {
            ""
        };
        let sql = format!("SELECT * FROM {}{}{}", collection.table(), clause, order);
        let rows = apply_binds(sqlx::query(&sql), binds)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| Self::record_from_row(collection, r))
            .collect()
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: Record,
    ) -> Result<Option<Record>, StoreError> {
        let mut assignments = Vec::new();
        let mut binds = Vec::new();
        for (key, value) in &fields {
            if key == "id" {
                continue;
            }
            let Some(column) = collection.column(key) else {
                return Err(StoreError::UnknownField(key.clone()));
            };
            assignments.push(format!("{} = ?", column.name));
            binds.push(bind_value(column, Some(value)));
        }
        assignments.push("updated_at = ?".to_string());
        binds.push(BindValue::Text(Some(chrono::Utc::now().to_rfc3339())));

        let sql = format!(
            "UPDATE {} SET {} WHERE id = ? RETURNING *",
            collection.table(),
            assignments.join(", ")
        );
        let row = apply_binds(sqlx::query(&sql), binds)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.map(|r| Self::record_from_row(collection, &r)).transpose()
    }

    async fn count(
        &self,
        collection: Collection,
        predicate: &Predicate,
    ) -> Result<u64, StoreError> {
        let (clause, binds) = Self::where_clause(collection, predicate)?;
        let sql = format!("SELECT COUNT(*) FROM {}{}", collection.table(), clause);
        let row = apply_binds(sqlx::query(&sql), binds)
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.try_get(0)?;
        Ok(count as u64)
    }

    async fn average(
        &self,
        collection: Collection,
        field: &str,
        predicate: &Predicate,
    ) -> Result<f64, StoreError> {
        let column = collection
            .column(field)
            .ok_or_else(|| StoreError::UnknownField(field.to_string()))?;
        let (clause, binds) = Self::where_clause(collection, predicate)?;
        let connective = if clause.is_empty() { " WHERE" } else { " AND" };
        let sql = format!(
            "SELECT AVG(CAST({field} AS REAL)) FROM {}{}{} {field} <> 0 AND {field} IS NOT NULL",
            collection.table(),
            clause,
            connective,
            field = column.name,
        );
        let row = apply_binds(sqlx::query(&sql), binds)
            .fetch_one(&self.pool)
            .await?;
        let avg: Option<f64> = row.try_get(0)?;
        Ok(avg.unwrap_or(0.0))
    }
}
