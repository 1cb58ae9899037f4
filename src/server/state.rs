use std::sync::Arc;

use crate::config::SearchOptions;
use crate::embed::Embedder;
use crate::fusion::{FuseParams, SearchFusionEngine};
use crate::store::VectorStore;

/// Long-lived collaborator handles, created once at startup and shared by
/// every request.
pub struct AppState {
    pub store: Arc<dyn VectorStore>,
    pub embedder: Arc<dyn Embedder>,
    pub engine: SearchFusionEngine,
    pub search: SearchOptions,
    /// Collection name, echoed in info responses
    pub collection: String,
}

impl AppState {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        search: SearchOptions,
        collection: String,
    ) -> Arc<Self> {
        let engine = SearchFusionEngine::new(store.clone());
        Arc::new(AppState { store, embedder, engine, search, collection })
    }

    /// Folds request overrides over the configured search defaults.
    pub fn fuse_params(
        &self,
        limit: Option<usize>,
        score_threshold: Option<f32>,
        label_filters: Option<Vec<String>>,
    ) -> FuseParams {
        FuseParams {
            limit: limit.unwrap_or(self.search.limit),
            score_threshold: score_threshold.unwrap_or(self.search.score_threshold),
            label_filters: label_filters.filter(|labels| !labels.is_empty()),
        }
    }
}
