//! Typed view over the merged YAML configuration.
//!
//! Every field has a default so an empty config file yields a usable
//! (if unconnected) service.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub rag: RagSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    /// Catalog schema whose tables are exposed to the model.
    pub schema: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            schema: "public".to_string(),
            max_connections: 5,
            acquire_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Gemini,
    #[serde(alias = "lmstudio", alias = "ollama")]
    Openai,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: ProviderKind,
    pub base_url: Option<String>,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            base_url: None,
            model: "gemini-2.5-flash".to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub enabled: bool,
    pub provider: ProviderKind,
    pub base_url: Option<String>,
    pub model: String,
    pub api_key: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: ProviderKind::Gemini,
            base_url: None,
            model: "text-embedding-004".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub top_k: usize,
    pub row_limit: usize,
    pub context_char_budget: usize,
    pub embed_batch_size: usize,
    pub retries: u32,
    pub base_delay_ms: u64,
    pub max_jitter_ms: u64,
    /// Terms accepted by the scope gate on top of the built-in vocabulary.
    pub extra_vocabulary: Vec<String>,
    pub warm_up_on_start: bool,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            top_k: 12,
            row_limit: 50,
            context_char_budget: 4000,
            embed_batch_size: 100,
            retries: 3,
            base_delay_ms: 600,
            max_jitter_ms: 200,
            extra_vocabulary: Vec::new(),
            warm_up_on_start: false,
        }
    }
}
