//! Connection scopes: the transactional unit of work every operation runs in.
//!
//! A [`ScopeFactory`] hands out one [`ConnectionScope`] per logical operation.
//! Work done through the scope is kept only if [`ConnectionScope::commit`] is
//! called; dropping the scope (for example on an early `?` return) rolls it
//! back and returns the connection to the pool.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use sqlx::error::ErrorKind;
use sqlx::postgres::{PgArguments, PgPool, PgRow};
use sqlx::query::Query;
use sqlx::{Acquire, Column, Postgres, Row, Transaction, TypeInfo};
use thiserror::Error;

use crate::query::{SqlParam, SqlQuery};

// ---

pub type StoreResult<T> = Result<T, StoreError>;

/// Shared handle to the scope factory, as held by the HTTP layer.
pub type Scopes = Arc<dyn ScopeFactory>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("failed to decode row: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        // ---
        let violation = err
            .as_database_error()
            .map(|db| (db.kind(), db.message().to_string()));

        match violation {
            Some((ErrorKind::UniqueViolation, message)) => StoreError::UniqueViolation(message),
            Some((ErrorKind::ForeignKeyViolation, message)) => {
                StoreError::ForeignKeyViolation(message)
            }
            _ => StoreError::Database(err),
        }
    }
}

/// One transactional handle to the store.
#[async_trait]
pub trait ConnectionScope: Send {
    /// Run a statement and return the number of affected rows.
    async fn execute(&mut self, query: &SqlQuery) -> StoreResult<u64>;

    /// Like [`execute`](Self::execute), but a failure only undoes this
    /// statement and leaves the scope usable.
    async fn execute_isolated(&mut self, query: &SqlQuery) -> StoreResult<u64>;

    /// Run a row-returning statement, one JSON object per row.
    async fn fetch_json(&mut self, query: &SqlQuery) -> StoreResult<Vec<Value>>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

#[async_trait]
pub trait ScopeFactory: Send + Sync {
    async fn acquire(&self) -> StoreResult<Box<dyn ConnectionScope>>;
}

// ---

/// Scopes backed by transactions on a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgScopeFactory {
    pool: PgPool,
}

impl PgScopeFactory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScopeFactory for PgScopeFactory {
    async fn acquire(&self) -> StoreResult<Box<dyn ConnectionScope>> {
        // ---
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgScope { tx }))
    }
}

struct PgScope {
    tx: Transaction<'static, Postgres>,
}

/// Bind every [`SqlParam`] onto `text`, in order.
fn bind_params<'q>(text: &'q str, params: &[SqlParam]) -> Query<'q, Postgres, PgArguments> {
    params
        .iter()
        .fold(sqlx::query(text), |q, param| match param {
            SqlParam::Int(v) => q.bind(*v),
            SqlParam::BigInt(v) => q.bind(*v),
            SqlParam::Float(v) => q.bind(*v),
            SqlParam::Text(v) => q.bind(v.clone()),
            SqlParam::Date(v) => q.bind(*v),
            SqlParam::Timestamp(v) => q.bind(*v),
        })
}

/// Turn a row into a JSON object keyed by column name.
///
/// Decoding goes by the column's PostgreSQL type; anything not listed is read
/// as text.
fn row_to_json(row: &PgRow) -> StoreResult<Value> {
    // ---
    let mut object = Map::with_capacity(row.columns().len());

    for column in row.columns() {
        let idx = column.ordinal();
        let value = match column.type_info().name() {
            "BOOL" => serde_json::to_value(row.try_get::<Option<bool>, _>(idx)?)?,
            "INT2" => serde_json::to_value(row.try_get::<Option<i16>, _>(idx)?)?,
            "INT4" => serde_json::to_value(row.try_get::<Option<i32>, _>(idx)?)?,
            "INT8" => serde_json::to_value(row.try_get::<Option<i64>, _>(idx)?)?,
            "FLOAT4" => serde_json::to_value(row.try_get::<Option<f32>, _>(idx)?)?,
            "FLOAT8" => serde_json::to_value(row.try_get::<Option<f64>, _>(idx)?)?,
            "DATE" => serde_json::to_value(row.try_get::<Option<NaiveDate>, _>(idx)?)?,
            "TIMESTAMPTZ" => {
                serde_json::to_value(row.try_get::<Option<DateTime<Utc>>, _>(idx)?)?
            }
            _ => serde_json::to_value(row.try_get::<Option<String>, _>(idx)?)?,
        };
        object.insert(column.name().to_string(), value);
    }

    Ok(Value::Object(object))
}

#[async_trait]
impl ConnectionScope for PgScope {
    async fn execute(&mut self, query: &SqlQuery) -> StoreResult<u64> {
        // ---
        let result = bind_params(&query.text, &query.params)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn execute_isolated(&mut self, query: &SqlQuery) -> StoreResult<u64> {
        // ---
        // Nested transaction = SAVEPOINT; dropping it on error rolls back to it.
        let mut savepoint = Acquire::begin(&mut self.tx).await?;
        let result = bind_params(&query.text, &query.params)
            .execute(&mut *savepoint)
            .await?;
        savepoint.commit().await?;
        Ok(result.rows_affected())
    }

    async fn fetch_json(&mut self, query: &SqlQuery) -> StoreResult<Vec<Value>> {
        // ---
        // Rows are decoded as they arrive, so the builder's ORDER BY is the
        // order callers see.
        let rows = bind_params(&query.text, &query.params)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.iter().map(row_to_json).collect()
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

// ---
