use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::*;

/// Points per upsert sub-batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;
/// Concurrent per-video build tasks.
pub const DEFAULT_MAX_WORKERS: usize = 4;
/// Minimum detection confidence kept in a record.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
/// Confidence floor for the high-confidence label subset.
pub const DEFAULT_HIGH_CONFIDENCE_THRESHOLD: f32 = 0.7;

#[derive(Parser, Debug, Clone)]
#[command(name = "framesearch", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    #[command(flatten)]
    pub store: StoreOptions,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// Validate a keyframe dataset without touching the index
    Validate(ValidateCommand),
    /// Ingest a keyframe dataset into the vector index
    Ingest(IngestCommand),
    /// Search the index with one or more text queries
    Search(SearchCommand),
    /// Start the HTTP search service
    Server(ServerCommand),
}

/// Vector index connection options, shared by every subcommand.
#[derive(Parser, Debug, Clone)]
pub struct StoreOptions {
    /// Base URL of the Qdrant REST API
    #[arg(long, value_name = "URL", env = "FRAMESEARCH_QDRANT_URL", default_value = "http://localhost:6333", global = true)]
    pub qdrant_url: String,
    /// Collection holding the keyframe points
    #[arg(long, value_name = "NAME", default_value = "video_keyframes", global = true)]
    pub collection: String,
    /// Embedding dimensionality of the collection
    #[arg(long, value_name = "N", default_value_t = 512, global = true)]
    pub vector_dim: usize,
}

/// Filesystem layout of a keyframe dataset.
#[derive(Parser, Debug, Clone)]
pub struct DatasetOptions {
    /// Root directory of the dataset
    #[arg(long, value_name = "DIR", env = "FRAMESEARCH_DATA_ROOT")]
    pub data_root: PathBuf,
    /// Directory of per-video feature matrices (.npy), relative to the root
    #[arg(long, value_name = "DIR", default_value = "clip-features-32")]
    pub features_dir: String,
    /// Directory of per-video metadata tables (.csv), relative to the root
    #[arg(long, value_name = "DIR", default_value = "map-keyframes")]
    pub metadata_dir: String,
    /// Directory of per-video detection files, relative to the root
    #[arg(long, value_name = "DIR", default_value = "objects")]
    pub objects_dir: String,
    /// Keyframe image directory pattern; `{batch}` expands to the video id prefix
    #[arg(long, value_name = "PATTERN", default_value = "Keyframes_{batch}/keyframes")]
    pub keyframes_pattern: String,
}

/// Embedding service connection options.
#[derive(Parser, Debug, Clone)]
pub struct EmbedOptions {
    /// Base URL of the CLIP embedding service
    #[arg(long, value_name = "URL", env = "FRAMESEARCH_EMBED_URL", default_value = "http://localhost:8100")]
    pub embed_url: String,
}

/// Search tuning options.
#[derive(Parser, Debug, Clone)]
pub struct SearchOptions {
    /// Maximum hits requested per query vector
    #[arg(long, value_name = "N", default_value_t = 100)]
    pub limit: usize,
    /// Minimum similarity score for a hit
    #[arg(long, value_name = "SCORE", default_value_t = 0.0)]
    pub score_threshold: f32,
}

/// Ingestion tuning options.
#[derive(Parser, Debug, Clone)]
pub struct IngestOptions {
    /// Points per upsert sub-batch
    #[arg(long, value_name = "N", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
    /// Concurrent per-video build tasks
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_WORKERS)]
    pub max_workers: usize,
    /// Minimum detection confidence kept in a record
    #[arg(long, value_name = "SCORE", default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
    pub confidence_threshold: f32,
    /// Confidence floor for the high-confidence label subset
    #[arg(long, value_name = "SCORE", default_value_t = DEFAULT_HIGH_CONFIDENCE_THRESHOLD)]
    pub high_confidence_threshold: f32,
    /// Skip dataset validation and ingest every video found
    #[arg(long)]
    pub no_validate: bool,
}
