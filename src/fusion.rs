//! Multi-query search fusion.
//!
//! One search request may carry several query vectors (multiple text queries,
//! or one image). Each vector is searched independently, then the result sets
//! are fused:
//!
//! 1. Search per vector, concurrently; any search error fails the whole fuse.
//! 2. Merge by dedup key (`original_id`), keeping the strictly better score;
//!    ties keep the hit seen first, i.e. from the earliest query vector.
//! 3. Sort by score descending, assign dense 1-based ranks.
//! 4. Group by video, frames score-descending, groups by best score.
//!
//! Order always comes from the explicit sorts; map iteration order is never
//! relied on.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use anyhow::{Result, ensure};
use futures::future::try_join_all;
use serde::Serialize;
use utoipa::ToSchema;

use crate::store::{PointPayload, SearchHit, VectorStore};

/// Per-request fusion parameters.
#[derive(Debug, Clone)]
pub struct FuseParams {
    /// Hits requested per query vector
    pub limit: usize,
    pub score_threshold: f32,
    /// Match-any filter over detection labels
    pub label_filters: Option<Vec<String>>,
}

/// A merged hit with its final rank.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FusedResult {
    /// Dense 1-based position after fusion
    pub rank: usize,
    pub id: String,
    pub score: f32,
    pub payload: PointPayload,
}

/// All fused frames of one video.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GroupedVideoResult {
    pub video_id: String,
    pub total_frames: usize,
    pub best_score: f32,
    /// Frames sorted by score descending
    pub frames: Vec<FusedResult>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FusionOutcome {
    /// Merged hit count, independent of how many vectors were fused
    pub total_results: usize,
    pub results: Vec<FusedResult>,
    pub grouped_by_video: Vec<GroupedVideoResult>,
}

/// Fuses the result sets of several query vectors into one deduplicated,
/// ranked, video-grouped response.
pub struct SearchFusionEngine {
    store: Arc<dyn VectorStore>,
}

impl SearchFusionEngine {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    /// Runs one fused search.
    ///
    /// The per-vector searches run concurrently; the first error cancels the
    /// rest and fails the call, and dropping the returned future cancels all
    /// of them. Either a complete response is produced or none, never a
    /// partial one.
    pub async fn fuse(&self, query_vectors: &[Vec<f32>], params: &FuseParams) -> Result<FusionOutcome> {
        ensure!(!query_vectors.is_empty(), "at least one query vector is required");

        let label_filters = params.label_filters.as_deref();
        let searches = query_vectors.iter().map(|vector| {
            self.store.search(vector, params.limit, params.score_threshold, label_filters)
        });
        let result_sets = try_join_all(searches).await?;

        let results = rank(merge_hits(result_sets));
        let grouped_by_video = group_by_video(&results);
        Ok(FusionOutcome { total_results: results.len(), results, grouped_by_video })
    }
}

/// Merges result sets by dedup key, keeping the best-scoring hit per key.
///
/// Sets must be given in query-vector order: on a score tie the earlier hit
/// wins, which makes the merge deterministic.
fn merge_hits(result_sets: Vec<Vec<SearchHit>>) -> Vec<SearchHit> {
    let mut best: HashMap<String, SearchHit> = HashMap::new();
    for hit in result_sets.into_iter().flatten() {
        match best.entry(hit.payload.original_id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(hit);
            }
            Entry::Occupied(mut slot) => {
                if hit.score > slot.get().score {
                    slot.insert(hit);
                }
            }
        }
    }

    let mut merged: Vec<SearchHit> = best.into_values().collect();
    merged.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.payload.original_id.cmp(&b.payload.original_id))
    });
    merged
}

/// Assigns dense 1-based ranks to hits already sorted by score.
fn rank(merged: Vec<SearchHit>) -> Vec<FusedResult> {
    merged
        .into_iter()
        .enumerate()
        .map(|(i, hit)| FusedResult { rank: i + 1, id: hit.id, score: hit.score, payload: hit.payload })
        .collect()
}

/// Groups ranked results by video, best groups first.
fn group_by_video(results: &[FusedResult]) -> Vec<GroupedVideoResult> {
    let mut by_video: HashMap<String, Vec<FusedResult>> = HashMap::new();
    for result in results {
        by_video.entry(result.payload.video_id.clone()).or_default().push(result.clone());
    }

    let mut groups: Vec<GroupedVideoResult> = by_video
        .into_iter()
        .map(|(video_id, mut frames)| {
            frames.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.rank.cmp(&b.rank)));
            let best_score = frames.iter().map(|f| f.score).fold(f32::MIN, f32::max);
            GroupedVideoResult { video_id, total_frames: frames.len(), best_score, frames }
        })
        .collect();

    groups.sort_by(|a, b| {
        b.best_score.total_cmp(&a.best_score).then_with(|| a.video_id.cmp(&b.video_id))
    });
    groups
}
