use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::fusion::{FusedResult, FusionOutcome, GroupedVideoResult};
use crate::store::CollectionStats;

/// Text search request: the queries are fused into one result set.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TextSearchRequest {
    /// One or more text queries, in fusion priority order
    pub queries: Vec<String>,
    /// Only return keyframes whose detections match any of these labels
    #[serde(default)]
    pub object_filters: Option<Vec<String>>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub score_threshold: Option<f32>,
}

/// Image search request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ImageSearchRequest {
    /// Base64-encoded query image
    pub image_base64: String,
    #[serde(default)]
    pub object_filters: Option<Vec<String>>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub score_threshold: Option<f32>,
}

/// Fused and grouped search response.
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    pub total_results: usize,
    pub query_time_ms: f64,
    pub results: Vec<FusedResult>,
    pub grouped_by_video: Vec<GroupedVideoResult>,
}

impl SearchResponse {
    pub fn new(outcome: FusionOutcome, elapsed: Duration) -> Self {
        Self {
            total_results: outcome.total_results,
            query_time_ms: elapsed.as_secs_f64() * 1000.0,
            results: outcome.results,
            grouped_by_video: outcome.grouped_by_video,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CollectionInfoResponse {
    pub collection: String,
    pub points_count: u64,
    pub status: String,
}

impl CollectionInfoResponse {
    pub fn new(collection: &str, stats: CollectionStats) -> Self {
        Self {
            collection: collection.to_string(),
            points_count: stats.points_count,
            status: stats.status,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}
