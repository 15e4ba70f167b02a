//! Remote engine: Postgres over the network via sqlx.
//!
//! Connects once at selection time under a bounded timeout. Every operation
//! afterwards is a single SQL round-trip (updates use `RETURNING`), so a
//! timed-out call can never leak a partial multi-step write.

use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::info;

use super::{
    bind_value, prepare_record, BindValue, Collection, ColumnKind, FindOptions, Predicate, Record,
    RecordStore, StoreError,
};

const MAX_CONNECTIONS: u32 = 10;

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
        score BIGINT DEFAULT 0,
        strengths TEXT,
        improvements TEXT,
        summary TEXT,
        status TEXT,
        created_at TEXT,
        updated_at TEXT
    )
    "#,
];

pub struct RemoteStore {
    pool: PgPool,
}

impl RemoteStore {
    /// Connects and initializes the schema idempotently. The caller bounds
    /// this with the selection timeout.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        info!("remote Postgres store ready");
        Ok(Self { pool })
    }

    fn record_from_row(collection: Collection, row: &PgRow) -> Result<Record, StoreError> {
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

    /// WHERE clause with `$n` placeholders starting at `first_index`.
    fn where_clause(
        collection: Collection,
        predicate: &Predicate,
        first_index: usize,
    ) -> Result<(String, Vec<BindValue>), StoreError> {
        let mut clauses = Vec::new();
        let mut binds = Vec::new();
        for (offset, (field, value)) in predicate.fields().iter().enumerate() {
            let column = collection
                .column(field)
                .ok_or_else(|| StoreError::UnknownField(field.clone()))?;
            clauses.push(format!("{} = ${}", column.name, first_index + offset));
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
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    binds: Vec<BindValue>,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
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
impl RecordStore for RemoteStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn create(&self, collection: Collection, record: Record) -> Result<Record, StoreError> {
        let record = prepare_record(record);
        let columns = collection.columns();
        let names: Vec<&str> = columns.iter().map(|c| c.name).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|n| format!("${n}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            collection.table(),
            names.join(", "),
            placeholders.join(", ")
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
        let (clause, binds) = Self::where_clause(collection, predicate, 1)?;
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
        let sql = format!("SELECT * FROM {} WHERE id = $1", collection.table());
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
        let (clause, binds) = Self::where_clause(collection, predicate, 1)?;
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
        let mut index = 1;
        for (key, value) in &fields {
            if key == "id" {
                continue;
            }
            let Some(column) = collection.column(key) else {
                return Err(StoreError::UnknownField(key.clone()));
            };
            assignments.push(format!("{} = ${index}", column.name));
            binds.push(bind_value(column, Some(value)));
            index += 1;
        }
        assignments.push(format!("updated_at = ${index}"));
        binds.push(BindValue::Text(Some(chrono::Utc::now().to_rfc3339())));
        index += 1;

        let sql = format!(
            "UPDATE {} SET {} WHERE id = ${index} RETURNING *",
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
        let (clause, binds) = Self::where_clause(collection, predicate, 1)?;
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
        let (clause, binds) = Self::where_clause(collection, predicate, 1)?;
        let connective = if clause.is_empty() { " WHERE" } else { " AND" };
        let sql = format!(
            "SELECT AVG(CAST({field} AS DOUBLE PRECISION)) FROM {}{}{} {field} <> 0 AND {field} IS NOT NULL",
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
