use std::sync::Arc;

use super::guard::{guard_direct, guard_retrieval, mutating_verb, wrap_subquery};
use super::types::QueryOutcome;
use crate::db::{ReadStore, Row, StoreError};

/// Runs guarded candidates against the store. Execution failures never
/// become errors; they are folded into the [`QueryOutcome`].
pub struct QueryExecutor {
    store: Arc<dyn ReadStore>,
    row_limit: usize,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn ReadStore>, row_limit: usize) -> Self {
        Self { store, row_limit }
    }

    /// Direct mode: one wrapped attempt, failure reported in `error`.
    pub async fn run_direct(&self, sql: &str) -> QueryOutcome {
        if let Some(verb) = mutating_verb(sql) {
            tracing::warn!("Rejected non-read statement ({}) in direct mode", verb);
            return QueryOutcome::failed(format!("statement '{}' is not allowed", verb));
        }

        match self.fetch(&guard_direct(sql)).await {
            Ok(rows) => QueryOutcome::rows(rows),
            Err(err) => {
                tracing::warn!("Direct query failed: {}", err);
                QueryOutcome::failed(err.to_string())
            }
        }
    }

    /// Retrieval mode: guarded attempt, then one subquery-wrapped retry of
    /// the unguarded statement. Both failing yields empty rows and no error.
    pub async fn run_retrieval(&self, sql: &str) -> QueryOutcome {
        if let Some(verb) = mutating_verb(sql) {
            tracing::warn!("Rejected non-read statement ({}) in retrieval mode", verb);
            return QueryOutcome::default();
        }

        let first_err = match self.fetch(&guard_retrieval(sql)).await {
            Ok(rows) => return QueryOutcome::rows(rows),
            Err(err) => err,
        };

        tracing::debug!("Guarded query failed, retrying wrapped: {}", first_err);
        match self.fetch(&wrap_subquery(sql)).await {
            Ok(rows) => QueryOutcome::rows(rows),
            Err(err) => {
                tracing::warn!(
                    "Retrieval query failed twice, continuing without rows: {} / {}",
                    first_err,
                    err
                );
                QueryOutcome::default()
            }
        }
    }

    async fn fetch(&self, sql: &str) -> Result<Vec<Row>, StoreError> {
        let mut rows = self.store.fetch_rows(sql, &[]).await?;
        rows.truncate(self.row_limit);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_support::{row, FakeStore};

    fn executor(store: Arc<FakeStore>) -> QueryExecutor {
        QueryExecutor::new(store, 50)
    }

    #[tokio::test]
    async fn direct_wraps_and_returns_rows() {
        let store = Arc::new(FakeStore::new(vec![], |_, _| {
            Ok(vec![row(&[("total", json!(7))])])
        }));
        let outcome = executor(store.clone()).run_direct("select count(*) as total from pessoas").await;

        assert_eq!(outcome.rows, vec![row(&[("total", json!(7))])]);
        assert_eq!(outcome.error, None);
        assert_eq!(
            store.data_calls(),
            vec!["select * from (select count(*) as total from pessoas) as q limit 50"]
        );
    }

    #[tokio::test]
    async fn direct_failure_populates_error_without_retry() {
        let store = Arc::new(FakeStore::new(vec![], |_, _| {
            Err(StoreError::Query("column \"x\" does not exist".into()))
        }));
        let outcome = executor(store.clone()).run_direct("select x from pessoas").await;

        assert!(outcome.rows.is_empty());
        assert!(outcome.error.unwrap().contains("column \"x\" does not exist"));
        assert_eq!(store.data_calls().len(), 1);
    }

    #[tokio::test]
    async fn retrieval_retries_once_with_wrapped_raw_statement() {
        let store = Arc::new(FakeStore::new(vec![], |sql, _| {
            if sql.starts_with("select * from (") {
                Ok(vec![row(&[("tipo", json!("CLIENTE"))])])
            } else {
                Err(StoreError::Query("syntax error".into()))
            }
        }));
        let outcome = executor(store.clone()).run_retrieval("select tipo from pessoas").await;

        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(
            store.data_calls(),
            vec![
                "select tipo from pessoas limit 50",
                "select * from (select tipo from pessoas) as q limit 50",
            ]
        );
    }

    #[tokio::test]
    async fn retrieval_double_failure_is_swallowed() {
        let store = Arc::new(FakeStore::new(vec![], |_, _| {
            Err(StoreError::Query("relation does not exist".into()))
        }));
        let outcome = executor(store.clone()).run_retrieval("select * from nada").await;

        assert_eq!(outcome, QueryOutcome::default());
        assert_eq!(store.data_calls().len(), 2);
    }

    #[tokio::test]
    async fn mutating_statements_never_reach_the_store() {
        let store = Arc::new(FakeStore::new(vec![], |_, _| Ok(vec![])));
        let exec = executor(store.clone());

        let direct = exec.run_direct("DELETE FROM pessoas").await;
        assert_eq!(direct.error.as_deref(), Some("statement 'delete' is not allowed"));

        let retrieval = exec.run_retrieval("drop table pessoas").await;
        assert_eq!(retrieval, QueryOutcome::default());

        assert!(store.data_calls().is_empty());
    }

    #[tokio::test]
    async fn rows_are_capped() {
        let store = Arc::new(FakeStore::new(vec![], |_, _| {
            Ok((0..80).map(|i| row(&[("n", json!(i))])).collect())
        }));
        let outcome = QueryExecutor::new(store, 50)
            .run_retrieval("select tipo, count(*) from pessoas group by tipo")
            .await;

        assert_eq!(outcome.rows.len(), 50);
        assert_eq!(outcome.rows[49], row(&[("n", json!(49))]));
    }
}
