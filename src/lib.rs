pub mod cli;
pub mod config;
pub mod dataset;
pub mod embed;
pub mod fusion;
pub mod ingest;
mod metrics;
pub mod server;
pub mod store;
pub mod utils;

pub use config::{Opts, SubCommand};
pub use fusion::SearchFusionEngine;
pub use ingest::IngestionPipeline;
