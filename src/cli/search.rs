use std::sync::Arc;

use clap::{Parser, ValueEnum};
use log::debug;

use crate::cli::SubCommandExtend;
use crate::config::{EmbedOptions, Opts, SearchOptions};
use crate::embed::{ClipHttpEmbedder, Embedder};
use crate::fusion::{FuseParams, FusionOutcome, SearchFusionEngine};
use crate::store::QdrantStore;

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    #[command(flatten)]
    pub embed: EmbedOptions,
    #[command(flatten)]
    pub search: SearchOptions,
    /// Text queries, fused into one result set
    #[arg(required = true, num_args = 1..)]
    pub queries: Vec<String>,
    /// Only return keyframes whose detections match any of these labels
    #[arg(short = 'f', long = "filter", value_name = "LABEL")]
    pub object_filters: Vec<String>,
    /// Displayed result count
    #[arg(long, value_name = "COUNT", default_value_t = 10)]
    pub count: usize,
    /// Output format
    #[arg(long, value_enum, value_name = "FORMAT", default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Table,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let store = Arc::new(QdrantStore::new(&opts.store)?);
        let embedder = ClipHttpEmbedder::new(&self.embed)?;

        debug!("embedding {} queries", self.queries.len());
        let vectors = embedder.encode_text(&self.queries).await?;

        let engine = SearchFusionEngine::new(store);
        let params = FuseParams {
            limit: self.search.limit,
            score_threshold: self.search.score_threshold,
            label_filters: (!self.object_filters.is_empty()).then(|| self.object_filters.clone()),
        };
        let outcome = engine.fuse(&vectors, &params).await?;

        print_result(&outcome, self)
    }
}

fn print_result(outcome: &FusionOutcome, opts: &SearchCommand) -> anyhow::Result<()> {
    match opts.output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
        OutputFormat::Table => {
            println!("{} results across {} videos", outcome.total_results, outcome.grouped_by_video.len());
            for result in outcome.results.iter().take(opts.count) {
                println!(
                    "{:<4} {:>6.3}  {:<16} {}",
                    result.rank, result.score, result.payload.original_id, result.payload.image_path
                );
            }
        }
    }
    Ok(())
}
