use serde::Serialize;
use thiserror::Error;

use crate::db::{Row, StoreError};
use crate::llm::{is_transient_overload, LlmError};

/// Answer returned for questions outside the dataset's domain.
pub const SCOPE_REFUSAL_ANSWER: &str = "Pergunta fora do escopo do sistema. Faça perguntas sobre Pessoas, Classificações, Movimentos e Parcelas.";

/// Sentence the SQL model must emit verbatim to decline a question.
pub const MODEL_REFUSAL_SENTENCE: &str = "Pergunta fora do escopo do sistema.";

/// Sentence the answer model must use when there are no rows.
pub const NO_RECORDS_SENTENCE: &str = "Não encontrei registros.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskMode {
    /// Schema text only.
    Direct,
    /// Schema text plus retrieved column descriptors.
    Retrieval,
}

impl AskMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AskMode::Direct => "direct",
            AskMode::Retrieval => "retrieval",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Fallback {
    /// Retrieval mode found no rows and the Direct-mode answer was used.
    Simple,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutcome {
    pub rows: Vec<Row>,
    pub error: Option<String>,
}

impl QueryOutcome {
    pub fn rows(rows: Vec<Row>) -> Self {
        Self { rows, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            rows: Vec::new(),
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResult {
    pub answer: String,
    pub sql: Option<String>,
    pub rows: Vec<Row>,
    pub sql_error: Option<String>,
    pub refused: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Fallback>,
    /// Column descriptors that grounded a Retrieval-mode answer.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

impl AnswerResult {
    pub fn refusal(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            sql: None,
            rows: Vec::new(),
            sql_error: None,
            refused: true,
            fallback: None,
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: Vec<String>) -> Self {
        self.context = context;
        self
    }
}

#[derive(Debug, Error)]
pub enum RagError {
    #[error("schema catalog unavailable: {0}")]
    Catalog(#[source] StoreError),
    #[error("model service overloaded: {0}")]
    Overloaded(#[source] LlmError),
    #[error("model call failed: {0}")]
    Upstream(#[source] LlmError),
}

impl From<LlmError> for RagError {
    fn from(err: LlmError) -> Self {
        if is_transient_overload(&err) {
            RagError::Overloaded(err)
        } else {
            RagError::Upstream(err)
        }
    }
}

impl From<StoreError> for RagError {
    fn from(err: StoreError) -> Self {
        RagError::Catalog(err)
    }
}
