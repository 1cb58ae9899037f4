use std::time::Duration;

use anyhow::{Context, Result, bail, ensure};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{CollectionStats, PointRecord, SearchHit, VectorStore};
use crate::config::StoreOptions;

const DISTANCE: &str = "Cosine";

/// Qdrant REST backend.
///
/// Upserts wait for index-side completion (`wait=true`) so a successful call
/// means the sub-batch is durable; concurrent callers are safe, the index owns
/// its own write coordination.
pub struct QdrantStore {
    http: reqwest::Client,
    base_url: String,
    collection: String,
    vector_dim: usize,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Debug, Serialize, Deserialize)]
struct VectorParams {
    size: usize,
    distance: String,
}

#[derive(Debug, Deserialize)]
struct CollectionParams {
    vectors: VectorParams,
}

#[derive(Debug, Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Debug, Deserialize)]
struct CollectionDescription {
    status: String,
    #[serde(default)]
    points_count: Option<u64>,
    config: CollectionConfig,
}

#[derive(Serialize)]
struct CreateCollectionBody {
    vectors: VectorParams,
}

#[derive(Serialize)]
struct UpsertBody<'a> {
    points: &'a [PointRecord],
}

#[derive(Serialize)]
struct SearchBody<'a> {
    vector: &'a [f32],
    limit: usize,
    score_threshold: f32,
    with_payload: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Filter>,
}

#[derive(Serialize)]
struct Filter {
    must: Vec<FieldCondition>,
}

#[derive(Serialize)]
struct FieldCondition {
    key: String,
    r#match: MatchAny,
}

#[derive(Serialize)]
struct MatchAny {
    any: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    id: PointId,
    score: f32,
    payload: super::PointPayload,
}

/// Qdrant point ids are either unsigned integers or UUID strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PointId {
    Num(u64),
    Text(String),
}

impl PointId {
    fn into_string(self) -> String {
        match self {
            PointId::Num(n) => n.to_string(),
            PointId::Text(s) => s,
        }
    }
}

impl QdrantStore {
    pub fn new(opts: &StoreOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("building http client")?;
        Ok(Self {
            http,
            base_url: opts.qdrant_url.trim_end_matches('/').to_string(),
            collection: opts.collection.clone(),
            vector_dim: opts.vector_dim,
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    async fn read_error(resp: reqwest::Response) -> anyhow::Error {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::anyhow!("qdrant returned {status}: {body}")
    }

    async fn get_description(&self) -> Result<Option<CollectionDescription>> {
        let resp = self.http.get(self.collection_url()).send().await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let envelope: Envelope<CollectionDescription> = resp.json().await?;
                Ok(Some(envelope.result))
            }
            _ => Err(Self::read_error(resp).await),
        }
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self) -> Result<()> {
        if let Some(description) = self.get_description().await? {
            let params = &description.config.params.vectors;
            ensure!(
                params.size == self.vector_dim && params.distance == DISTANCE,
                "collection '{}' exists with {} {}-d vectors, expected {DISTANCE} {}-d",
                self.collection,
                params.distance,
                params.size,
                self.vector_dim,
            );
            info!("collection '{}' already exists", self.collection);
            return Ok(());
        }

        let body = CreateCollectionBody {
            vectors: VectorParams { size: self.vector_dim, distance: DISTANCE.to_string() },
        };
        let resp = self.http.put(self.collection_url()).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(Self::read_error(resp).await.context("creating collection"));
        }
        info!("created collection '{}' ({DISTANCE}, {}-d)", self.collection, self.vector_dim);
        Ok(())
    }

    async fn upsert(&self, points: &[PointRecord]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let url = format!("{}/points?wait=true", self.collection_url());
        let resp = self.http.put(url).json(&UpsertBody { points }).send().await?;
        if !resp.status().is_success() {
            return Err(Self::read_error(resp).await.context("upserting points"));
        }
        debug!("upserted {} points into '{}'", points.len(), self.collection);
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        score_threshold: f32,
        label_filters: Option<&[String]>,
    ) -> Result<Vec<SearchHit>> {
        let filter = match label_filters {
            Some(labels) if !labels.is_empty() => Some(Filter {
                must: vec![FieldCondition {
                    key: "labels".to_string(),
                    r#match: MatchAny { any: labels.to_vec() },
                }],
            }),
            _ => None,
        };
        let body = SearchBody { vector, limit, score_threshold, with_payload: true, filter };

        let url = format!("{}/points/search", self.collection_url());
        let resp = self.http.post(url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(Self::read_error(resp).await.context("searching points"));
        }
        let envelope: Envelope<Vec<ScoredPoint>> = resp.json().await?;
        Ok(envelope
            .result
            .into_iter()
            .map(|point| SearchHit {
                id: point.id.into_string(),
                score: point.score,
                payload: point.payload,
            })
            .collect())
    }

    async fn collection_info(&self) -> Result<CollectionStats> {
        match self.get_description().await? {
            Some(description) => Ok(CollectionStats {
                points_count: description.points_count.unwrap_or(0),
                status: description.status,
            }),
            None => bail!("collection '{}' does not exist", self.collection),
        }
    }

    async fn healthy(&self) -> bool {
        let url = format!("{}/healthz", self.base_url);
        match self.http.get(url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}
