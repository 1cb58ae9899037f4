//! Vector index abstraction.
//!
//! [`VectorStore`] is the seam between the engine and whichever index backs
//! it: the Qdrant REST backend in production, the brute-force in-memory
//! backend in tests. Handles are constructed explicitly at startup and passed
//! down; there are no process-wide singletons.

mod memory;
mod qdrant;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use qdrant::QdrantStore;

use crate::dataset::Detection;

/// Payload stored next to each vector, carrying everything the search path
/// needs for display, dedup and grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PointPayload {
    /// Stable keyframe identity (`{video_id}_{keyframe_index:03}`), dedup key
    pub original_id: String,
    pub video_id: String,
    pub keyframe_index: u32,
    pub timestamp_seconds: f64,
    pub frame_index: i64,
    pub fps: f32,
    pub image_path: String,
    #[serde(default)]
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub high_confidence_labels: Vec<String>,
}

/// One point to upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointRecord {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

/// One hit from a single-vector search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// Index-internal point id
    pub id: String,
    pub score: f32,
    pub payload: PointPayload,
}

/// Collection statistics passthrough.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CollectionStats {
    pub points_count: u64,
    pub status: String,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Creates the collection if absent; verifies dimensionality and metric if
    /// present. A mismatch with an existing collection is a fatal
    /// configuration error.
    async fn ensure_collection(&self) -> Result<()>;

    /// Upserts one batch of points. The call either lands the whole batch or
    /// fails it; the caller decides what a failure means for its unit of work.
    async fn upsert(&self, points: &[PointRecord]) -> Result<()>;

    /// Single-vector similarity search, best hits first. `label_filters`
    /// matches points whose label set intersects the given one.
    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        score_threshold: f32,
        label_filters: Option<&[String]>,
    ) -> Result<Vec<SearchHit>>;

    async fn collection_info(&self) -> Result<CollectionStats>;

    /// Cheap reachability probe for health reporting.
    async fn healthy(&self) -> bool;
}
