use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::core::config::{AppPaths, ConfigService, Settings};
use crate::db::{PgReadStore, ReadStore};
use crate::llm::{
    build_embedding_backend, build_generation_backend, EmbeddingBackend, GenerationBackend,
};
use crate::rag::{RagPipeline, SchemaCatalog};

pub mod error;

use error::InitializationError;

/// Application state shared across all routes and background tasks.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: Arc<Settings>,
    pub catalog: Arc<SchemaCatalog>,
    /// `None` when no generation backend is configured.
    pub pipeline: Option<Arc<RagPipeline>>,
    pub generation_backend: Option<String>,
    pub embedding_backend: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Loads configuration, opens the (lazy) database pool and builds the
    /// model backends.
    ///
    /// A missing database URL is fatal. A missing model key is not: the
    /// server starts and the ask endpoints answer 400 until it is configured.
    /// Logging should already be initialized from `paths` so the warnings
    /// emitted here reach the log.
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let settings = config.settings().map_err(InitializationError::Config)?;

        let store: Arc<dyn ReadStore> = Arc::new(
            PgReadStore::connect_lazy(&settings.database).map_err(InitializationError::Database)?,
        );

        let generator =
            build_generation_backend(&settings.llm).map_err(InitializationError::Backend)?;
        if generator.is_none() {
            tracing::warn!("No generation backend configured; set GEMINI_API_KEY or llm.api_key");
        }

        let embedder = build_embedding_backend(&settings.embedding, settings.llm.timeout_secs)
            .map_err(InitializationError::Backend)?;
        if embedder.is_none() {
            tracing::info!("No embedding backend configured; retrieval ranks all columns equally");
        }

        Ok(Arc::new(Self::assemble(
            paths, config, settings, store, generator, embedder,
        )))
    }

    pub fn assemble(
        paths: Arc<AppPaths>,
        config: ConfigService,
        settings: Settings,
        store: Arc<dyn ReadStore>,
        generator: Option<Arc<dyn GenerationBackend>>,
        embedder: Option<Arc<dyn EmbeddingBackend>>,
    ) -> Self {
        let generation_backend = generator.as_ref().map(|g| g.name().to_string());
        let embedding_backend = embedder.as_ref().map(|e| e.name().to_string());

        let catalog = Arc::new(SchemaCatalog::new(store.clone(), settings.database.schema.clone()));
        let pipeline = generator.map(|generator| {
            Arc::new(RagPipeline::with_catalog(
                catalog.clone(),
                store,
                generator,
                embedder,
                &settings.rag,
            ))
        });

        Self {
            paths,
            config,
            settings: Arc::new(settings),
            catalog,
            pipeline,
            generation_backend,
            embedding_backend,
            started_at: Utc::now(),
        }
    }
}
