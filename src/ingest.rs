use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, ensure};
use futures::StreamExt;
use indicatif::ProgressBar;
use log::{info, warn};

use crate::config::IngestOptions;
use crate::dataset::{BuilderOptions, DatasetLayout, DatasetValidator, RecordBuilder};
use crate::store::{PointRecord, VectorStore};
use crate::utils::pb_style;

/// Final pipeline accounting, reported whether or not every video made it.
#[derive(Debug, Clone, Default)]
pub struct IngestSummary {
    pub videos_succeeded: usize,
    pub videos_failed: usize,
    pub points_uploaded: usize,
    pub duration: Duration,
}

impl IngestSummary {
    pub fn log(&self) {
        info!("ingestion finished in {:.2}s", self.duration.as_secs_f64());
        info!("videos succeeded: {}", self.videos_succeeded);
        info!("videos failed:    {}", self.videos_failed);
        info!("points uploaded:  {}", self.points_uploaded);
    }
}

/// Shared accumulator for the worker tasks; the only mutable state they touch.
#[derive(Default)]
struct IngestCounters {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    points: AtomicUsize,
}

/// Builds and uploads every valid video of a dataset.
///
/// One task per video runs on a bounded pool; tasks share nothing but the
/// counters and the index handle, so a failing video never disturbs its
/// siblings.
pub struct IngestionPipeline {
    store: Arc<dyn VectorStore>,
    opts: IngestOptions,
    vector_dim: usize,
}

impl IngestionPipeline {
    pub fn new(store: Arc<dyn VectorStore>, opts: IngestOptions, vector_dim: usize) -> Self {
        Self { store, opts, vector_dim }
    }

    pub async fn run(&self, layout: &DatasetLayout) -> Result<IngestSummary> {
        let started = Instant::now();

        let videos = if self.opts.no_validate {
            layout.list_videos()?
        } else {
            let report = DatasetValidator::new(layout, self.vector_dim).validate()?;
            report.log_summary();
            ensure!(report.valid_videos > 0, "no valid videos to ingest");
            report.valid_ids
        };

        self.store.ensure_collection().await.context("preparing collection")?;

        info!("ingesting {} videos with {} workers", videos.len(), self.opts.max_workers);
        let counters = IngestCounters::default();
        let pb = ProgressBar::new(videos.len() as u64).with_style(pb_style());

        futures::stream::iter(videos)
            .for_each_concurrent(self.opts.max_workers, |video_id| {
                let counters = &counters;
                let pb = &pb;
                async move {
                    match self.ingest_video(layout, &video_id).await {
                        Ok(points) => {
                            counters.succeeded.fetch_add(1, Ordering::Relaxed);
                            counters.points.fetch_add(points, Ordering::Relaxed);
                            pb.set_message(video_id);
                        }
                        Err(e) => {
                            warn!("{video_id}: {e:#}");
                            counters.failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    pb.inc(1);
                }
            })
            .await;
        pb.finish_and_clear();

        let summary = IngestSummary {
            videos_succeeded: counters.succeeded.load(Ordering::Relaxed),
            videos_failed: counters.failed.load(Ordering::Relaxed),
            points_uploaded: counters.points.load(Ordering::Relaxed),
            duration: started.elapsed(),
        };

        match self.store.collection_info().await {
            Ok(stats) => {
                info!("collection now holds {} points ({})", stats.points_count, stats.status)
            }
            Err(e) => warn!("could not read collection info: {e:#}"),
        }
        Ok(summary)
    }

    /// Builds one video's records and uploads them in sequential sub-batches.
    ///
    /// At most one sub-batch per video is in flight, bounding peak memory on
    /// the upload path. Any error fails this video only; sub-batches already
    /// uploaded stay in the index (no rollback).
    async fn ingest_video(&self, layout: &DatasetLayout, video_id: &str) -> Result<usize> {
        let builder = RecordBuilder::new(
            layout.clone(),
            BuilderOptions {
                confidence_threshold: self.opts.confidence_threshold,
                high_confidence_threshold: self.opts.high_confidence_threshold,
            },
        );
        let id = video_id.to_string();
        let records = tokio::task::spawn_blocking(move || builder.build(&id))
            .await
            .context("build task panicked")??;

        let total = records.len();
        let mut batch: Vec<PointRecord> = Vec::with_capacity(self.opts.batch_size.min(total));
        for record in records {
            batch.push(record.into_point());
            if batch.len() == self.opts.batch_size {
                self.store.upsert(&batch).await.context("uploading sub-batch")?;
                batch.clear();
            }
        }
        if !batch.is_empty() {
            self.store.upsert(&batch).await.context("uploading sub-batch")?;
        }

        info!("{video_id}: uploaded {total} points");
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use async_trait::async_trait;
    use ndarray::Array2;
    use ndarray_npy::write_npy;
    use tempfile::TempDir;

    use super::*;
    use crate::config::DatasetOptions;
    use crate::store::{CollectionStats, MemoryStore, SearchHit};

    const DIM: usize = 4;

    fn write_video(root: &Path, video_id: &str, rows: usize) {
        let features = Array2::from_shape_fn((rows, DIM), |(r, c)| (r + c) as f32 + 1.0);
        fs::create_dir_all(root.join("clip-features-32")).unwrap();
        write_npy(root.join("clip-features-32").join(format!("{video_id}.npy")), &features)
            .unwrap();

        let mut csv = String::from("n,pts_time,fps,frame_idx\n");
        for i in 0..rows {
            csv.push_str(&format!("{},{:.1},25.0,{}\n", i + 1, i as f64, i * 30));
        }
        fs::create_dir_all(root.join("map-keyframes")).unwrap();
        fs::write(root.join("map-keyframes").join(format!("{video_id}.csv")), csv).unwrap();

        fs::create_dir_all(root.join("objects").join(video_id)).unwrap();
        let batch = video_id.split('_').next().unwrap();
        fs::create_dir_all(root.join(format!("Keyframes_{batch}/keyframes")).join(video_id))
            .unwrap();
    }

    fn layout(root: &Path) -> DatasetLayout {
        DatasetLayout::new(&DatasetOptions {
            data_root: root.to_path_buf(),
            features_dir: "clip-features-32".to_string(),
            metadata_dir: "map-keyframes".to_string(),
            objects_dir: "objects".to_string(),
            keyframes_pattern: "Keyframes_{batch}/keyframes".to_string(),
        })
        .unwrap()
    }

    fn options() -> IngestOptions {
        IngestOptions {
            batch_size: 2,
            max_workers: 2,
            confidence_threshold: 0.5,
            high_confidence_threshold: 0.7,
            no_validate: false,
        }
    }

    /// Delegates to a `MemoryStore` but fails every upsert containing a
    /// marked video, to exercise upload-failure isolation.
    struct FailingUploads {
        inner: MemoryStore,
        poison: String,
    }

    #[async_trait]
    impl VectorStore for FailingUploads {
        async fn ensure_collection(&self) -> Result<()> {
            self.inner.ensure_collection().await
        }

        async fn upsert(&self, points: &[PointRecord]) -> Result<()> {
            if points.iter().any(|p| p.payload.video_id == self.poison) {
                anyhow::bail!("injected upload failure");
            }
            self.inner.upsert(points).await
        }

        async fn search(
            &self,
            vector: &[f32],
            limit: usize,
            score_threshold: f32,
            label_filters: Option<&[String]>,
        ) -> Result<Vec<SearchHit>> {
            self.inner.search(vector, limit, score_threshold, label_filters).await
        }

        async fn collection_info(&self) -> Result<CollectionStats> {
            self.inner.collection_info().await
        }

        async fn healthy(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn ingests_all_valid_videos() -> Result<()> {
        let tmp = TempDir::new()?;
        write_video(tmp.path(), "L01_V001", 3);
        write_video(tmp.path(), "L01_V002", 5);

        let store = Arc::new(MemoryStore::new(DIM));
        let pipeline = IngestionPipeline::new(store.clone(), options(), DIM);
        let summary = pipeline.run(&layout(tmp.path())).await?;

        assert_eq!(summary.videos_succeeded, 2);
        assert_eq!(summary.videos_failed, 0);
        assert_eq!(summary.points_uploaded, 8);
        assert_eq!(store.len(), 8);
        Ok(())
    }

    #[tokio::test]
    async fn build_failure_isolates_one_video() -> Result<()> {
        let tmp = TempDir::new()?;
        write_video(tmp.path(), "L01_V001", 3);
        write_video(tmp.path(), "L01_V002", 2);
        // corrupt one feature matrix after validation would have passed
        fs::write(tmp.path().join("clip-features-32/L01_V002.npy"), b"garbage")?;

        let store = Arc::new(MemoryStore::new(DIM));
        let mut opts = options();
        opts.no_validate = true;
        let pipeline = IngestionPipeline::new(store.clone(), opts, DIM);
        let summary = pipeline.run(&layout(tmp.path())).await?;

        assert_eq!(summary.videos_succeeded, 1);
        assert_eq!(summary.videos_failed, 1);
        assert_eq!(summary.points_uploaded, 3);
        assert_eq!(store.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn upload_failure_isolates_one_video() -> Result<()> {
        let tmp = TempDir::new()?;
        write_video(tmp.path(), "L01_V001", 3);
        write_video(tmp.path(), "L01_V002", 2);
        write_video(tmp.path(), "L01_V003", 4);

        let store = Arc::new(FailingUploads {
            inner: MemoryStore::new(DIM),
            poison: "L01_V002".to_string(),
        });
        let pipeline = IngestionPipeline::new(store.clone(), options(), DIM);
        let summary = pipeline.run(&layout(tmp.path())).await?;

        assert_eq!(summary.videos_succeeded, 2);
        assert_eq!(summary.videos_failed, 1);
        assert_eq!(summary.points_uploaded, 7);
        assert_eq!(store.inner.len(), 7);
        Ok(())
    }

    #[tokio::test]
    async fn empty_dataset_aborts() -> Result<()> {
        let tmp = TempDir::new()?;
        fs::create_dir_all(tmp.path().join("clip-features-32"))?;

        let store = Arc::new(MemoryStore::new(DIM));
        let pipeline = IngestionPipeline::new(store, options(), DIM);
        assert!(pipeline.run(&layout(tmp.path())).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn reingestion_overwrites_instead_of_duplicating() -> Result<()> {
        let tmp = TempDir::new()?;
        write_video(tmp.path(), "L01_V001", 3);

        let store = Arc::new(MemoryStore::new(DIM));
        let pipeline = IngestionPipeline::new(store.clone(), options(), DIM);
        pipeline.run(&layout(tmp.path())).await?;
        pipeline.run(&layout(tmp.path())).await?;

        assert_eq!(store.len(), 3);
        Ok(())
    }
}
