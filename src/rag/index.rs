//! Embedding index over `table.column (type)` descriptors.

use std::sync::Arc;

use tokio::sync::OnceCell;

use super::catalog::SchemaCatalog;
use super::types::RagError;
use crate::llm::{EmbeddingBackend, ResilientInvoker};

#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub text: String,
    /// Empty when no embedding backend is configured.
    pub vector: Vec<f32>,
}

pub struct EmbeddingIndex {
    catalog: Arc<SchemaCatalog>,
    embedder: Option<Arc<dyn EmbeddingBackend>>,
    invoker: ResilientInvoker,
    batch_size: usize,
    entries: OnceCell<Vec<IndexEntry>>,
}

impl EmbeddingIndex {
    pub fn new(
        catalog: Arc<SchemaCatalog>,
        embedder: Option<Arc<dyn EmbeddingBackend>>,
        invoker: ResilientInvoker,
        batch_size: usize,
    ) -> Self {
        Self {
            catalog,
            embedder,
            invoker,
            batch_size: batch_size.max(1),
            entries: OnceCell::new(),
        }
    }

    /// Returns the cached index, building it on first use.
    pub async fn entries(&self) -> Result<&[IndexEntry], RagError> {
        let entries = self.entries.get_or_try_init(|| self.build()).await?;
        Ok(entries.as_slice())
    }

    async fn build(&self) -> Result<Vec<IndexEntry>, RagError> {
        let schema = self.catalog.load().await?;
        let texts = schema.descriptor.column_descriptors();

        let Some(embedder) = &self.embedder else {
            tracing::info!(
                "Embedding index built without an embedder: {} descriptors, empty vectors",
                texts.len()
            );
            return Ok(texts
                .into_iter()
                .map(|text| IndexEntry {
                    text,
                    vector: Vec::new(),
                })
                .collect());
        };

        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            let batch = self
                .invoker
                .invoke("embed", || embedder.embed(chunk))
                .await?;
            vectors.extend(batch);
        }

        tracing::info!(
            "Embedding index built with {}: {} descriptors",
            embedder.name(),
            texts.len()
        );

        Ok(texts
            .into_iter()
            .zip(vectors)
            .map(|(text, vector)| IndexEntry { text, vector })
            .collect())
    }

    /// Embeds a single question. Empty when no embedder is configured.
    pub async fn embed_question(&self, question: &str) -> Result<Vec<f32>, RagError> {
        let Some(embedder) = &self.embedder else {
            return Ok(Vec::new());
        };

        let input = [question.to_string()];
        let mut vectors = self
            .invoker
            .invoke("embed", || embedder.embed(&input))
            .await?;
        Ok(vectors.pop().unwrap_or_default())
    }
}
