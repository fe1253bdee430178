use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::rag::{RagError, RagPipeline};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub question: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskEmbedRequest {
    #[serde(default)]
    pub question: String,
    pub top_k: Option<usize>,
}

fn pipeline(state: &AppState) -> Result<&Arc<RagPipeline>, ApiError> {
    state
        .pipeline
        .as_ref()
        .ok_or_else(|| ApiError::BadRequest("generation backend not configured".to_string()))
}

pub async fn ask_simple(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let pipeline = pipeline(&state)?;
    let result = pipeline.ask_direct(&payload.question).await?;
    Ok(Json(result))
}

pub async fn ask_embed(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AskEmbedRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let pipeline = pipeline(&state)?;
    if payload.top_k == Some(0) {
        return Err(ApiError::BadRequest("topK must be at least 1".to_string()));
    }
    let result = pipeline
        .ask_retrieval(&payload.question, payload.top_k)
        .await?;
    Ok(Json(result))
}

/// Introspected schema as served from the catalog cache.
pub async fn get_schema(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let schema = state.catalog.load().await.map_err(RagError::from)?;
    Ok(Json(json!({
        "tables": schema.descriptor.tables,
        "text": schema.text,
    })))
}
