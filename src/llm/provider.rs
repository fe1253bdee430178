use async_trait::async_trait;

use super::types::LlmError;

/// Single-shot text generation, whatever the backend's native call shape.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// provider name (e.g. "gemini", "openai")
    fn name(&self) -> &str;

    /// generate a completion for one user prompt
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    fn name(&self) -> &str;

    /// one vector per input, in input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;
}
