use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::config::{DatasetOptions, Opts};
use crate::dataset::{DatasetLayout, DatasetValidator};

#[derive(Parser, Debug, Clone)]
pub struct ValidateCommand {
    #[command(flatten)]
    pub dataset: DatasetOptions,
    /// Print the full report as JSON instead of a summary
    #[arg(long)]
    pub json: bool,
}

impl SubCommandExtend for ValidateCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let layout = DatasetLayout::new(&self.dataset)?;
        let report = DatasetValidator::new(&layout, opts.store.vector_dim).validate()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        println!("total videos:    {}", report.total_videos);
        println!("valid videos:    {}", report.valid_videos);
        println!("invalid videos:  {}", report.invalid_videos());
        println!("total keyframes: {}", report.total_keyframes);
        for entry in &report.missing_files {
            println!("missing: {entry}");
        }
        for entry in &report.shape_mismatches {
            println!("mismatch: {entry}");
        }
        Ok(())
    }
}
