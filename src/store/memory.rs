use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{Result, ensure};
use async_trait::async_trait;

use super::{CollectionStats, PointRecord, SearchHit, VectorStore};

/// In-memory [`VectorStore`] with brute-force cosine search.
///
/// Backs the test suite and small offline experiments; not meant for real
/// corpus sizes.
pub struct MemoryStore {
    vector_dim: usize,
    points: RwLock<HashMap<String, PointRecord>>,
}

impl MemoryStore {
    pub fn new(vector_dim: usize) -> Self {
        Self { vector_dim, points: RwLock::new(HashMap::new()) }
    }

    pub fn len(&self) -> usize {
        self.points.read().expect("points lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON { 0.0 } else { dot / (mag_a * mag_b) }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn ensure_collection(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, points: &[PointRecord]) -> Result<()> {
        for point in points {
            ensure!(
                point.vector.len() == self.vector_dim,
                "point {} has {} dims, collection expects {}",
                point.id,
                point.vector.len(),
                self.vector_dim
            );
        }
        let mut stored = self.points.write().expect("points lock poisoned");
        for point in points {
            stored.insert(point.id.to_string(), point.clone());
        }
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        score_threshold: f32,
        label_filters: Option<&[String]>,
    ) -> Result<Vec<SearchHit>> {
        let stored = self.points.read().expect("points lock poisoned");
        let mut hits: Vec<SearchHit> = stored
            .values()
            .filter(|point| match label_filters {
                Some(labels) if !labels.is_empty() => {
                    point.payload.labels.iter().any(|l| labels.contains(l))
                }
                _ => true,
            })
            .map(|point| SearchHit {
                id: point.id.to_string(),
                score: cosine_sim(vector, &point.vector),
                payload: point.payload.clone(),
            })
            .filter(|hit| hit.score >= score_threshold)
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn collection_info(&self) -> Result<CollectionStats> {
        Ok(CollectionStats { points_count: self.len() as u64, status: "green".to_string() })
    }

    async fn healthy(&self) -> bool {
        true
    }
}
