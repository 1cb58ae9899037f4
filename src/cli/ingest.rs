use std::sync::Arc;

use clap::Parser;

use crate::IngestionPipeline;
use crate::cli::SubCommandExtend;
use crate::config::{DatasetOptions, IngestOptions, Opts};
use crate::dataset::DatasetLayout;
use crate::store::QdrantStore;

#[derive(Parser, Debug, Clone)]
pub struct IngestCommand {
    #[command(flatten)]
    pub dataset: DatasetOptions,
    #[command(flatten)]
    pub ingest: IngestOptions,
}

impl SubCommandExtend for IngestCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let layout = DatasetLayout::new(&self.dataset)?;
        let store = Arc::new(QdrantStore::new(&opts.store)?);

        let pipeline =
            IngestionPipeline::new(store, self.ingest.clone(), opts.store.vector_dim);
        let summary = pipeline.run(&layout).await?;
        summary.log();
        Ok(())
    }
}
