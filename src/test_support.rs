//! In-process fakes for the store and model collaborators.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::db::{ReadStore, Row, StoreError};
use crate::llm::{EmbeddingBackend, GenerationBackend, LlmError};

pub type ColumnSpec = (&'static str, &'static str, bool);
pub type TableSpec = (&'static str, Vec<ColumnSpec>);

type Handler = Box<dyn Fn(&str, &[String]) -> Result<Vec<Row>, StoreError> + Send + Sync>;

pub fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// The accounts schema used across tests.
pub fn contas_tables() -> Vec<TableSpec> {
    vec![
        (
            "classificacao",
            vec![
                ("idclassificacao", "integer", false),
                ("tipo", "character varying", false),
                ("descricao", "character varying", false),
                ("status", "character varying", false),
            ],
        ),
        (
            "pessoas",
            vec![
                ("idpessoas", "integer", false),
                ("tipo", "character varying", false),
                ("razaosocial", "character varying", false),
                ("documento", "character varying", true),
                ("status", "character varying", false),
            ],
        ),
    ]
}

/// Store that answers catalog queries from `tables` and everything else from `handler`.
pub struct FakeStore {
    tables: Vec<TableSpec>,
    handler: Handler,
    catalog_failure: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeStore {
    pub fn new<F>(tables: Vec<TableSpec>, handler: F) -> Self
    where
        F: Fn(&str, &[String]) -> Result<Vec<Row>, StoreError> + Send + Sync + 'static,
    {
        Self {
            tables,
            handler: Box::new(handler),
            catalog_failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_catalog_failure(mut self, message: &str) -> Self {
        self.catalog_failure = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Statements issued outside the catalog.
    pub fn data_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|sql| !sql.contains("information_schema"))
            .collect()
    }

    pub fn catalog_call_count(&self) -> usize {
        self.calls().len() - self.data_calls().len()
    }
}

#[async_trait]
impl ReadStore for FakeStore {
    async fn fetch_rows(&self, sql: &str, params: &[String]) -> Result<Vec<Row>, StoreError> {
        self.calls.lock().unwrap().push(sql.to_string());

        if sql.contains("information_schema") {
            if let Some(message) = &self.catalog_failure {
                return Err(StoreError::Query(message.clone()));
            }
        }

        if sql.contains("information_schema.tables") {
            return Ok(self
                .tables
                .iter()
                .map(|(name, _)| row(&[("table_name", Value::from(*name))]))
                .collect());
        }

        if sql.contains("information_schema.columns") {
            let table = params.get(1).cloned().unwrap_or_default();
            let columns = self
                .tables
                .iter()
                .find(|(name, _)| *name == table)
                .map(|(_, cols)| cols.clone())
                .unwrap_or_default();
            return Ok(columns
                .into_iter()
                .map(|(name, data_type, nullable)| {
                    row(&[
                        ("column_name", Value::from(name)),
                        ("data_type", Value::from(data_type)),
                        ("is_nullable", Value::from(if nullable { "YES" } else { "NO" })),
                    ])
                })
                .collect());
        }

        (self.handler)(sql, params)
    }
}

/// Generator that replays canned replies in order.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn replying(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::malformed("scripted", "script exhausted")))
    }
}

/// Embedder that maps each text through a pure function.
pub struct FakeEmbedder {
    embed_fn: Box<dyn Fn(&str) -> Vec<f32> + Send + Sync>,
    batch_sizes: Mutex<Vec<usize>>,
}

impl FakeEmbedder {
    pub fn new<F>(embed_fn: F) -> Self
    where
        F: Fn(&str) -> Vec<f32> + Send + Sync + 'static,
    {
        Self {
            embed_fn: Box::new(embed_fn),
            batch_sizes: Mutex::new(Vec::new()),
        }
    }

    /// Vector with a 1.0 on each axis whose keyword appears in the text.
    pub fn keyword_axes(keywords: &'static [&'static str]) -> Self {
        Self::new(move |text| {
            let lower = text.to_lowercase();
            keywords
                .iter()
                .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
                .collect()
        })
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingBackend for FakeEmbedder {
    fn name(&self) -> &str {
        "fake"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.batch_sizes.lock().unwrap().push(texts.len());
        Ok(texts.iter().map(|t| (self.embed_fn)(t)).collect())
    }
}
