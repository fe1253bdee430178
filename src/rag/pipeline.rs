//! Direct and Retrieval orchestration over the pipeline stages.
//!
//! ```text
//! gate -> synthesize sql -> refusal? -> guard -> execute
//!      -> (retrieval, no rows) direct fallback -> synthesize answer
//! ```

use std::sync::Arc;

use tracing::Instrument;
use uuid::Uuid;

use super::answer::AnswerSynthesizer;
use super::catalog::SchemaCatalog;
use super::executor::QueryExecutor;
use super::index::EmbeddingIndex;
use super::ranker::rank;
use super::scope::DomainScopeGate;
use super::synthesizer::{SqlCandidate, SqlSynthesizer};
use super::types::{
    AnswerResult, AskMode, Fallback, RagError, MODEL_REFUSAL_SENTENCE, SCOPE_REFUSAL_ANSWER,
};
use crate::core::config::RagSettings;
use crate::db::ReadStore;
use crate::llm::{EmbeddingBackend, GenerationBackend, ResilientInvoker, RetryPolicy};

pub struct RagPipeline {
    gate: DomainScopeGate,
    catalog: Arc<SchemaCatalog>,
    index: EmbeddingIndex,
    sql: SqlSynthesizer,
    executor: QueryExecutor,
    answers: AnswerSynthesizer,
    default_top_k: usize,
}

impl RagPipeline {
    pub fn new(
        store: Arc<dyn ReadStore>,
        generator: Arc<dyn GenerationBackend>,
        embedder: Option<Arc<dyn EmbeddingBackend>>,
        settings: &RagSettings,
        schema_name: &str,
    ) -> Self {
        let catalog = Arc::new(SchemaCatalog::new(store.clone(), schema_name));
        Self::with_catalog(catalog, store, generator, embedder, settings)
    }

    /// Builds the pipeline over an existing catalog so its cache can be
    /// shared with callers that only need the schema.
    pub fn with_catalog(
        catalog: Arc<SchemaCatalog>,
        store: Arc<dyn ReadStore>,
        generator: Arc<dyn GenerationBackend>,
        embedder: Option<Arc<dyn EmbeddingBackend>>,
        settings: &RagSettings,
    ) -> Self {
        let invoker = ResilientInvoker::new(RetryPolicy::from(settings));

        Self {
            gate: DomainScopeGate::new(&settings.extra_vocabulary),
            index: EmbeddingIndex::new(
                catalog.clone(),
                embedder,
                invoker.clone(),
                settings.embed_batch_size,
            ),
            catalog,
            sql: SqlSynthesizer::new(generator.clone(), invoker.clone()),
            executor: QueryExecutor::new(store, settings.row_limit),
            answers: AnswerSynthesizer::new(
                generator,
                invoker,
                settings.row_limit,
                settings.context_char_budget,
            ),
            default_top_k: settings.top_k,
        }
    }

    /// Fills the schema and embedding caches ahead of the first request.
    pub async fn warm_up(&self) -> Result<(), RagError> {
        self.catalog.load().await?;
        let entries = self.index.entries().await?;
        tracing::info!("RAG caches warmed up ({} index entries)", entries.len());
        Ok(())
    }

    /// Answers from the full schema text.
    pub async fn ask_direct(&self, question: &str) -> Result<AnswerResult, RagError> {
        self.direct(question).instrument(ask_span(AskMode::Direct)).await
    }

    /// Answers from the schema text plus the `top_k` closest column
    /// descriptors, falling back to Direct mode when no rows come back.
    pub async fn ask_retrieval(
        &self,
        question: &str,
        top_k: Option<usize>,
    ) -> Result<AnswerResult, RagError> {
        let top_k = top_k.unwrap_or(self.default_top_k);
        self.retrieval(question, top_k)
            .instrument(ask_span(AskMode::Retrieval))
            .await
    }

    async fn direct(&self, question: &str) -> Result<AnswerResult, RagError> {
        if !self.gate.is_in_scope(question) {
            tracing::info!("Question refused by scope gate");
            return Ok(AnswerResult::refusal(SCOPE_REFUSAL_ANSWER));
        }

        let schema_text = self.catalog.schema_text().await?;
        let sql = match self.sql.synthesize(question, schema_text, None).await? {
            SqlCandidate::Statement(sql) => sql,
            SqlCandidate::Refusal => {
                tracing::info!("Question refused by the model");
                return Ok(AnswerResult::refusal(MODEL_REFUSAL_SENTENCE));
            }
        };

        let outcome = self.executor.run_direct(&sql).await;
        let answer = self.answers.synthesize(question, &outcome.rows, None).await?;

        Ok(AnswerResult {
            answer,
            sql: Some(sql),
            rows: outcome.rows,
            sql_error: outcome.error,
            refused: false,
            fallback: None,
            context: Vec::new(),
        })
    }

    async fn retrieval(&self, question: &str, top_k: usize) -> Result<AnswerResult, RagError> {
        if !self.gate.is_in_scope(question) {
            tracing::info!("Question refused by scope gate");
            return Ok(AnswerResult::refusal(SCOPE_REFUSAL_ANSWER));
        }

        let schema_text = self.catalog.schema_text().await?;
        let entries = self.index.entries().await?;
        let question_vector = self.index.embed_question(question).await?;
        let selected = rank(&question_vector, entries, top_k);

        let candidate = self
            .sql
            .synthesize(question, schema_text, Some(selected.as_slice()))
            .await?;
        let sql = match candidate {
            SqlCandidate::Statement(sql) => sql,
            SqlCandidate::Refusal => {
                tracing::info!("Question refused by the model");
                return Ok(AnswerResult::refusal(MODEL_REFUSAL_SENTENCE).with_context(selected));
            }
        };

        let outcome = self.executor.run_retrieval(&sql).await;

        if outcome.rows.is_empty() {
            tracing::info!("Retrieval query returned no rows, falling back to direct mode");
            match self.direct(question).await {
                Ok(direct) => {
                    return Ok(AnswerResult {
                        fallback: Some(Fallback::Simple),
                        ..direct
                    }
                    .with_context(selected));
                }
                Err(err @ (RagError::Overloaded(_) | RagError::Catalog(_))) => return Err(err),
                Err(err) => {
                    tracing::warn!(
                        "Direct-mode fallback failed, answering from retrieval: {}",
                        err
                    );
                }
            }
        }

        let answer = self
            .answers
            .synthesize(question, &outcome.rows, Some(selected.as_slice()))
            .await?;

        Ok(AnswerResult {
            answer,
            sql: Some(sql),
            rows: outcome.rows,
            sql_error: None,
            refused: false,
            fallback: None,
            context: selected,
        })
    }
}

fn ask_span(mode: AskMode) -> tracing::Span {
    tracing::info_span!("rag_ask", mode = mode.as_str(), request_id = %Uuid::new_v4())
}
