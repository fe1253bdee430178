use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Failure of a call to a model provider.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{provider} returned HTTP {status}: {message}")]
    Status {
        provider: String,
        status: u16,
        /// Symbolic status reported in the error body, e.g. `UNAVAILABLE`.
        code: Option<String>,
        message: String,
    },
    #[error("{provider} request failed: {message}")]
    Transport { provider: String, message: String },
    #[error("{provider} returned an unexpected response: {message}")]
    Malformed { provider: String, message: String },
}

impl LlmError {
    pub fn status(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            provider: provider.into(),
            status,
            code: None,
            message: message.into(),
        }
    }

    pub fn transport(provider: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: err.to_string(),
        }
    }

    pub fn malformed(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Builds a status error from a non-success response body.
    ///
    /// Both Google and OpenAI-style APIs wrap failures as
    /// `{"error": {"code": .., "status": .., "message": ..}}`; anything else
    /// is kept verbatim as the message.
    pub fn from_response(provider: &str, status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<Value>(body).ok();
        let error = parsed.as_ref().and_then(|v| v.get("error"));

        let code = error
            .and_then(|e| e.get("status"))
            .and_then(|s| s.as_str())
            .map(str::to_string);
        let message = error
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| body.trim().to_string());

        Self::Status {
            provider: provider.to_string(),
            status,
            code,
            message,
        }
    }
}

/// Structured hints a retry policy can inspect on an error.
pub trait UpstreamError: std::fmt::Display {
    fn status_code(&self) -> Option<u16> {
        None
    }

    fn status_text(&self) -> Option<&str> {
        None
    }
}

impl UpstreamError for LlmError {
    fn status_code(&self) -> Option<u16> {
        match self {
            LlmError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn status_text(&self) -> Option<&str> {
        match self {
            LlmError::Status { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}
