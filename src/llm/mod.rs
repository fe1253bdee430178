pub mod gemini;
pub mod openai;
pub mod provider;
pub mod resilient;
pub mod types;

use std::sync::Arc;

use crate::core::config::{EmbeddingSettings, LlmSettings, ProviderKind};

pub use gemini::GeminiBackend;
pub use openai::OpenAiCompatBackend;
pub use provider::{EmbeddingBackend, GenerationBackend};
pub use resilient::{is_transient_overload, ResilientInvoker, RetryPolicy};
pub use types::{ChatMessage, LlmError, UpstreamError};

/// Builds the generation backend, or `None` when no credentials are available.
///
/// OpenAI-compatible servers (LM Studio, Ollama) are accepted without a key.
/// Fails only when the HTTP client cannot be constructed.
pub fn build_generation_backend(
    settings: &LlmSettings,
) -> Result<Option<Arc<dyn GenerationBackend>>, LlmError> {
    let backend: Arc<dyn GenerationBackend> = match settings.provider {
        ProviderKind::Gemini => {
            let Some(api_key) = settings.api_key.clone().filter(|k| !k.trim().is_empty()) else {
                return Ok(None);
            };
            Arc::new(GeminiBackend::new(
                settings.base_url.clone(),
                api_key,
                settings.model.clone(),
                settings.timeout_secs,
            )?)
        }
        ProviderKind::Openai => Arc::new(OpenAiCompatBackend::new(
            settings.base_url.clone(),
            settings.api_key.clone(),
            settings.model.clone(),
            settings.timeout_secs,
        )?),
    };
    Ok(Some(backend))
}

/// Builds the embedding backend. Absence degrades retrieval to zero scores.
pub fn build_embedding_backend(
    settings: &EmbeddingSettings,
    timeout_secs: u64,
) -> Result<Option<Arc<dyn EmbeddingBackend>>, LlmError> {
    if !settings.enabled {
        return Ok(None);
    }
    let backend: Arc<dyn EmbeddingBackend> = match settings.provider {
        ProviderKind::Gemini => {
            let Some(api_key) = settings.api_key.clone().filter(|k| !k.trim().is_empty()) else {
                return Ok(None);
            };
            Arc::new(GeminiBackend::new(
                settings.base_url.clone(),
                api_key,
                settings.model.clone(),
                timeout_secs,
            )?)
        }
        ProviderKind::Openai => Arc::new(OpenAiCompatBackend::new(
            settings.base_url.clone(),
            settings.api_key.clone(),
            settings.model.clone(),
            timeout_secs,
        )?),
    };
    Ok(Some(backend))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_requires_api_key() {
        let settings = LlmSettings::default();
        assert!(build_generation_backend(&settings).unwrap().is_none());

        let settings = LlmSettings {
            api_key: Some("key".into()),
            ..LlmSettings::default()
        };
        let backend = build_generation_backend(&settings).unwrap().expect("backend");
        assert_eq!(backend.name(), "gemini");
    }

    #[test]
    fn openai_compatible_works_without_key() {
        let settings = LlmSettings {
            provider: ProviderKind::Openai,
            base_url: Some("http://localhost:1234".into()),
            ..LlmSettings::default()
        };
        let backend = build_generation_backend(&settings).unwrap().expect("backend");
        assert_eq!(backend.name(), "openai");
    }

    #[test]
    fn enabled_embeddings_build_a_backend() {
        let settings = EmbeddingSettings {
            enabled: true,
            provider: ProviderKind::Openai,
            base_url: Some("http://localhost:1234".into()),
            ..EmbeddingSettings::default()
        };
        let backend = build_embedding_backend(&settings, 30)
            .unwrap()
            .expect("backend");
        assert_eq!(backend.name(), "openai");
    }

    #[test]
    fn disabled_embeddings_yield_none() {
        let settings = EmbeddingSettings {
            enabled: false,
            api_key: Some("key".into()),
            ..EmbeddingSettings::default()
        };
        assert!(build_embedding_backend(&settings, 30).unwrap().is_none());
    }
}
