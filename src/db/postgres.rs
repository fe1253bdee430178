//! PostgreSQL-backed [`ReadStore`].
//!
//! Each call borrows one pooled connection, opens a `READ ONLY` transaction
//! and always rolls it back. Rows are serialized server-side with
//! `row_to_json` so numeric, date and text columns all arrive as JSON.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row as _;

use super::{close_line_comment, ReadStore, Row, StoreError};
use crate::core::config::DatabaseSettings;

pub struct PgReadStore {
    pool: PgPool,
}

impl PgReadStore {
    /// Creates a lazily connecting pool; the first query opens the connection.
    pub fn connect_lazy(settings: &DatabaseSettings) -> Result<Self, StoreError> {
        let url = settings
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| StoreError::Connection("database.url is not configured".to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
            .connect_lazy(url)
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self { pool })
    }
}

fn json_envelope(sql: &str) -> String {
    format!(
        "SELECT row_to_json(q) AS row FROM ({}) AS q",
        close_line_comment(sql)
    )
}

fn query_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db) => StoreError::Query(db.message().to_string()),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Connection(err.to_string())
        }
        other => StoreError::Query(other.to_string()),
    }
}

#[async_trait]
impl ReadStore for PgReadStore {
    async fn fetch_rows(&self, sql: &str, params: &[String]) -> Result<Vec<Row>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(query_error)?;

        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;

        let wrapped = json_envelope(sql);
        let mut query = sqlx::query(&wrapped);
        for param in params {
            query = query.bind(param);
        }
        let result = query.fetch_all(&mut *tx).await;

        if let Err(err) = tx.rollback().await {
            tracing::debug!("Rollback of read-only transaction failed: {}", err);
        }

        let rows = result.map_err(query_error)?;
        rows.iter()
            .map(|row| {
                let value: Value = row.try_get("row").map_err(query_error)?;
                match value {
                    Value::Object(map) => Ok(map),
                    other => Err(StoreError::Query(format!(
                        "unexpected row shape: {}",
                        other
                    ))),
                }
            })
            .collect()
    }
}
