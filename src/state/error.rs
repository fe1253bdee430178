use thiserror::Error;

use crate::core::errors::ApiError;
use crate::db::StoreError;
use crate::llm::LlmError;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[source] ApiError),

    #[error("Failed to set up the database pool: {0}")]
    Database(#[source] StoreError),

    #[error("Failed to build a model backend: {0}")]
    Backend(#[source] LlmError),
}
