//! Natural-language questions to read-only SQL and back.
//!
//! - `SchemaCatalog` / `EmbeddingIndex`: process-wide caches over the schema
//! - `SqlSynthesizer` / `AnswerSynthesizer`: the two model calls
//! - `guard` / `QueryExecutor`: bounded, read-only execution
//! - `RagPipeline`: Direct and Retrieval orchestration

mod answer;
mod catalog;
mod executor;
pub mod guard;
mod index;
mod pipeline;
pub mod ranker;
mod scope;
mod synthesizer;
mod types;

pub use answer::AnswerSynthesizer;
pub use catalog::{ColumnSchema, LoadedSchema, SchemaCatalog, SchemaDescriptor, TableSchema};
pub use executor::QueryExecutor;
pub use index::{EmbeddingIndex, IndexEntry};
pub use pipeline::RagPipeline;
pub use ranker::{cosine_similarity, RetrievalResult};
pub use scope::DomainScopeGate;
pub use synthesizer::{sanitize, SqlCandidate, SqlSynthesizer};
pub use types::{
    AnswerResult, AskMode, Fallback, QueryOutcome, RagError, MODEL_REFUSAL_SENTENCE,
    NO_RECORDS_SENTENCE, SCOPE_REFUSAL_ANSWER,
};
