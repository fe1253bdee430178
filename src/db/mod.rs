//! Read-only access to the relational store.
//!
//! The pipeline only ever reads: catalog introspection and the guarded
//! statements produced by the model.

mod postgres;

use std::borrow::Cow;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub use postgres::PgReadStore;

/// One result row, column name to JSON value.
pub type Row = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database connection failed: {0}")]
    Connection(String),
    #[error("{0}")]
    Query(String),
}

/// Ends the statement with a newline when its last line holds a `--`
/// comment, so text appended after it is not commented out.
pub fn close_line_comment(sql: &str) -> Cow<'_, str> {
    let last_line = sql.rsplit('\n').next().unwrap_or(sql);
    if last_line.contains("--") {
        Cow::Owned(format!("{}\n", sql))
    } else {
        Cow::Borrowed(sql)
    }
}

#[async_trait]
pub trait ReadStore: Send + Sync {
    /// Runs one read statement with positional text parameters (`$1`, `$2`, ...).
    async fn fetch_rows(&self, sql: &str, params: &[String]) -> Result<Vec<Row>, StoreError>;
}
