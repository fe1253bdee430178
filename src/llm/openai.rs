//! OpenAI-compatible adapter (OpenAI, LM Studio, Ollama's `/v1` endpoints).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::provider::{EmbeddingBackend, GenerationBackend};
use super::types::{ChatMessage, LlmError};

const PROVIDER: &str = "openai";
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

#[derive(Clone)]
pub struct OpenAiCompatBackend {
    base_url: String,
    api_key: Option<String>,
    model: String,
    client: Client,
}

impl OpenAiCompatBackend {
    pub fn new(
        base_url: Option<String>,
        api_key: Option<String>,
        model: String,
        timeout_secs: u64,
    ) -> Result<Self, LlmError> {
        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .trim_end_matches("/v1")
            .to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LlmError::transport(PROVIDER, e))?;

        Ok(Self {
            base_url,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model,
            client,
        })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, LlmError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request
            .send()
            .await
            .map_err(|e| LlmError::transport(PROVIDER, e))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(LlmError::from_response(PROVIDER, status.as_u16(), &text));
        }

        res.json::<Value>()
            .await
            .map_err(|e| LlmError::malformed(PROVIDER, e.to_string()))
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

fn ordered_embeddings(payload: Value, expected: usize) -> Result<Vec<Vec<f32>>, LlmError> {
    let mut response: EmbeddingResponse =
        serde_json::from_value(payload).map_err(|e| LlmError::malformed(PROVIDER, e.to_string()))?;

    if response.data.len() != expected {
        return Err(LlmError::malformed(
            PROVIDER,
            format!("expected {} embeddings, got {}", expected, response.data.len()),
        ));
    }

    // Servers may return items out of order; `index` is authoritative when present.
    response
        .data
        .sort_by_key(|item| item.index.unwrap_or(usize::MAX));
    Ok(response.data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl GenerationBackend for OpenAiCompatBackend {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let body = json!({
            "model": self.model,
            "messages": [ChatMessage::user(prompt)],
            "stream": false,
        });

        let payload = self.post("/v1/chat/completions", &body).await?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .trim()
            .to_string();

        Ok(content)
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAiCompatBackend {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = json!({
            "model": self.model,
            "input": texts,
        });

        let payload = self.post("/v1/embeddings", &body).await?;
        ordered_embeddings(payload, texts.len())
    }
}
