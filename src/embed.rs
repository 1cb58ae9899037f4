use std::time::Duration;

use anyhow::{Context, Result, ensure};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::config::EmbedOptions;

/// Text/image encoder consumed as an external capability.
///
/// Both encoders must share one embedding space: same dimensionality,
/// L2-normalized outputs, so either kind of query can search the same index.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input text, order-preserving.
    async fn encode_text(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// One vector for raw image bytes.
    async fn encode_image(&self, image: &[u8]) -> Result<Vec<f32>>;
}

/// HTTP client for a CLIP embedding service.
pub struct ClipHttpEmbedder {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct EncodeTextBody<'a> {
    texts: &'a [String],
}

#[derive(Deserialize)]
struct EncodeTextResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct EncodeImageBody {
    image_base64: String,
}

#[derive(Deserialize)]
struct EncodeImageResponse {
    embedding: Vec<f32>,
}

impl ClipHttpEmbedder {
    pub fn new(opts: &EmbedOptions) -> Result<Self> {
        // model inference can be slow on first call while weights load
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("building http client")?;
        Ok(Self { http, base_url: opts.embed_url.trim_end_matches('/').to_string() })
    }
}

#[async_trait]
impl Embedder for ClipHttpEmbedder {
    async fn encode_text(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        ensure!(!texts.is_empty(), "at least one text is required");

        let url = format!("{}/encode/text", self.base_url);
        let resp = self
            .http
            .post(url)
            .json(&EncodeTextBody { texts })
            .send()
            .await?
            .error_for_status()
            .context("encoding texts")?;
        let parsed: EncodeTextResponse = resp.json().await?;
        ensure!(
            parsed.embeddings.len() == texts.len(),
            "embedding service returned {} vectors for {} texts",
            parsed.embeddings.len(),
            texts.len()
        );
        Ok(parsed.embeddings)
    }

    async fn encode_image(&self, image: &[u8]) -> Result<Vec<f32>> {
        let url = format!("{}/encode/image", self.base_url);
        let body = EncodeImageBody { image_base64: BASE64.encode(image) };
        let resp = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await?
            .error_for_status()
            .context("encoding image")?;
        let parsed: EncodeImageResponse = resp.json().await?;
        Ok(parsed.embedding)
    }
}
