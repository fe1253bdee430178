//! Google Generative Language API adapter (Gemini models).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::provider::{EmbeddingBackend, GenerationBackend};
use super::types::LlmError;

const PROVIDER: &str = "gemini";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Clone)]
pub struct GeminiBackend {
    base_url: String,
    api_key: String,
    model: String,
    client: Client,
}

impl GeminiBackend {
    pub fn new(
        base_url: Option<String>,
        api_key: String,
        model: String,
        timeout_secs: u64,
    ) -> Result<Self, LlmError> {
        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LlmError::transport(PROVIDER, e))?;

        Ok(Self {
            base_url,
            api_key,
            model,
            client,
        })
    }

    fn model_url(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, self.model, method)
    }

    async fn post<T: DeserializeOwned>(&self, url: &str, body: &Value) -> Result<T, LlmError> {
        let res = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::transport(PROVIDER, e))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(LlmError::from_response(PROVIDER, status.as_u16(), &text));
        }

        res.json::<T>()
            .await
            .map_err(|e| LlmError::malformed(PROVIDER, e.to_string()))
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

fn candidate_text(response: GenerateResponse) -> String {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        });
        let response: GenerateResponse = self.post(&self.model_url("generateContent"), &body).await?;
        Ok(candidate_text(response))
    }
}

#[async_trait]
impl EmbeddingBackend for GeminiBackend {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model_ref = format!("models/{}", self.model);
        let requests: Vec<Value> = texts
            .iter()
            .map(|text| json!({ "model": model_ref, "content": { "parts": [{ "text": text }] } }))
            .collect();
        let body = json!({ "requests": requests });

        let response: BatchEmbedResponse =
            self.post(&self.model_url("batchEmbedContents"), &body).await?;
        if response.embeddings.len() != texts.len() {
            return Err(LlmError::malformed(
                PROVIDER,
                format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    response.embeddings.len()
                ),
            ));
        }

        Ok(response.embeddings.into_iter().map(|e| e.values).collect())
    }
}
