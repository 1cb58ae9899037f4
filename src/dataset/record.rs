use anyhow::{Context, Result, ensure};
use log::warn;
use ndarray::Array2;
use ndarray_npy::read_npy;
use serde::Deserialize;
use uuid::Uuid;

use super::detections::{self, Detection, DetectionSummary};
use super::layout::DatasetLayout;
use crate::config::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_HIGH_CONFIDENCE_THRESHOLD};
use crate::store::{PointPayload, PointRecord};

/// One ingestible keyframe, joined from the feature matrix, the metadata
/// table and the detection files of its video. Immutable once built.
#[derive(Debug, Clone)]
pub struct KeyframeRecord {
    pub point_id: Uuid,
    pub video_id: String,
    /// 1-based position within the video
    pub keyframe_index: u32,
    pub vector: Vec<f32>,
    pub timestamp_seconds: f64,
    pub frame_index: i64,
    pub fps: f32,
    pub detections: Vec<Detection>,
    pub labels: Vec<String>,
    pub high_confidence_labels: Vec<String>,
    /// Resolved keyframe image path, display-only
    pub image_path: String,
}

impl KeyframeRecord {
    /// Stable content identity of the keyframe, used as dedup key at search
    /// time. Distinct from `point_id`, which satisfies the index's id rules.
    pub fn original_id(&self) -> String {
        format!("{}_{:03}", self.video_id, self.keyframe_index)
    }

    pub fn into_point(self) -> PointRecord {
        let original_id = self.original_id();
        PointRecord {
            id: self.point_id,
            vector: self.vector,
            payload: PointPayload {
                original_id,
                video_id: self.video_id,
                keyframe_index: self.keyframe_index,
                timestamp_seconds: self.timestamp_seconds,
                frame_index: self.frame_index,
                fps: self.fps,
                image_path: self.image_path,
                detections: self.detections,
                labels: self.labels,
                high_confidence_labels: self.high_confidence_labels,
            },
        }
    }
}

/// Derives the point id from the keyframe identity.
///
/// Deterministic on purpose: re-running ingestion over unchanged data upserts
/// the same points instead of appending duplicates, while the UUID form keeps
/// the index's id constraints satisfied.
pub fn point_id_for(video_id: &str, keyframe_index: u32) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{video_id}/{keyframe_index}").as_bytes())
}

#[derive(Debug, Clone, Copy)]
pub struct BuilderOptions {
    pub confidence_threshold: f32,
    pub high_confidence_threshold: f32,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            high_confidence_threshold: DEFAULT_HIGH_CONFIDENCE_THRESHOLD,
        }
    }
}

/// Builds the ordered record sequence of one video.
///
/// Owns its layout so a build can run on a blocking worker thread.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    layout: DatasetLayout,
    opts: BuilderOptions,
}

/// Metadata table row; the table may carry extra columns (row counter etc.)
/// which are ignored.
#[derive(Debug, Deserialize)]
struct MetadataRow {
    pts_time: f64,
    frame_idx: i64,
    fps: f32,
}

impl RecordBuilder {
    pub fn new(layout: DatasetLayout, opts: BuilderOptions) -> Self {
        Self { layout, opts }
    }

    /// Builds every keyframe record of `video_id`, in metadata row order.
    ///
    /// A malformed row or an unreadable detection file skips that single
    /// record; an unreadable feature matrix or metadata table fails the whole
    /// video. The produced count is therefore at most the metadata row count.
    pub fn build(&self, video_id: &str) -> Result<Vec<KeyframeRecord>> {
        let features_file = self.layout.features_file(video_id);
        let features: Array2<f32> = read_npy(&features_file)
            .with_context(|| format!("reading features {}", features_file.display()))?;

        let metadata_file = self.layout.metadata_file(video_id);
        let mut reader = csv::Reader::from_path(&metadata_file)
            .with_context(|| format!("reading metadata {}", metadata_file.display()))?;

        let mut records = vec![];
        for (idx, row) in reader.deserialize::<MetadataRow>().enumerate() {
            let keyframe_index = (idx + 1) as u32;
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    warn!("{video_id}: skipping malformed metadata row {keyframe_index}: {e}");
                    continue;
                }
            };
            match self.build_record(video_id, keyframe_index, &row, &features) {
                Ok(record) => records.push(record),
                Err(e) => warn!("{video_id}: skipping keyframe {keyframe_index}: {e:#}"),
            }
        }
        Ok(records)
    }

    fn build_record(
        &self,
        video_id: &str,
        keyframe_index: u32,
        row: &MetadataRow,
        features: &Array2<f32>,
    ) -> Result<KeyframeRecord> {
        let idx = (keyframe_index - 1) as usize;
        ensure!(
            idx < features.nrows(),
            "metadata row {keyframe_index} has no matching feature row ({} available)",
            features.nrows()
        );

        let summary = self.load_detections(video_id, keyframe_index)?;
        Ok(KeyframeRecord {
            point_id: point_id_for(video_id, keyframe_index),
            video_id: video_id.to_string(),
            keyframe_index,
            vector: features.row(idx).to_vec(),
            timestamp_seconds: row.pts_time,
            frame_index: row.frame_idx,
            fps: row.fps,
            detections: summary.detections,
            labels: summary.labels,
            high_confidence_labels: summary.high_confidence_labels,
            image_path: self.layout.keyframe_image(video_id, keyframe_index).display().to_string(),
        })
    }

    /// A keyframe without a detection file is normal and yields an empty
    /// summary; a detection file that exists but fails to parse is an error.
    fn load_detections(&self, video_id: &str, keyframe_index: u32) -> Result<DetectionSummary> {
        for candidate in self.layout.detection_candidates(video_id, keyframe_index) {
            if candidate.is_file() {
                return detections::load_detections(
                    &candidate,
                    self.opts.confidence_threshold,
                    self.opts.high_confidence_threshold,
                );
            }
        }
        Ok(DetectionSummary::default())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use ndarray_npy::write_npy;
    use tempfile::TempDir;

    use super::*;
    use crate::config::DatasetOptions;

    const DIM: usize = 4;

    fn dataset_options(root: &Path) -> DatasetOptions {
        DatasetOptions {
            data_root: root.to_path_buf(),
            features_dir: "clip-features-32".to_string(),
            metadata_dir: "map-keyframes".to_string(),
            objects_dir: "objects".to_string(),
            keyframes_pattern: "Keyframes_{batch}/keyframes".to_string(),
        }
    }

    fn write_video(root: &Path, video_id: &str, rows: usize) -> Result<()> {
        let features = Array2::from_shape_fn((rows, DIM), |(r, c)| (r * DIM + c) as f32);
        fs::create_dir_all(root.join("clip-features-32"))?;
        write_npy(root.join("clip-features-32").join(format!("{video_id}.npy")), &features)?;

        let mut csv = String::from("n,pts_time,fps,frame_idx\n");
        for i in 0..rows {
            csv.push_str(&format!("{},{:.1},25.0,{}\n", i + 1, i as f64 * 1.2, i * 30));
        }
        fs::create_dir_all(root.join("map-keyframes"))?;
        fs::write(root.join("map-keyframes").join(format!("{video_id}.csv")), csv)?;

        fs::create_dir_all(root.join("objects").join(video_id))?;
        Ok(())
    }

    fn builder(root: &Path) -> Result<RecordBuilder> {
        let layout = DatasetLayout::new(&dataset_options(root))?;
        Ok(RecordBuilder::new(layout, BuilderOptions::default()))
    }

    #[test]
    fn builds_records_in_metadata_order() -> Result<()> {
        let tmp = TempDir::new()?;
        write_video(tmp.path(), "L01_V001", 3)?;

        let records = builder(tmp.path())?.build("L01_V001")?;
        assert_eq!(records.len(), 3);
        assert_eq!(
            records.iter().map(|r| r.keyframe_index).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(records[1].vector, vec![4.0, 5.0, 6.0, 7.0]);
        assert_eq!(records[1].original_id(), "L01_V001_002");
        assert!((records[2].timestamp_seconds - 2.4).abs() < 1e-9);
        assert_eq!(records[2].frame_index, 60);
        Ok(())
    }

    #[test]
    fn detection_padding_fallback() -> Result<()> {
        let tmp = TempDir::new()?;
        write_video(tmp.path(), "L01_V001", 2)?;
        let objects = tmp.path().join("objects/L01_V001");
        let body = r#"{
            "detection_scores": [0.9],
            "detection_class_entities": ["Cat"],
            "detection_class_names": ["/m/01yrx"],
            "detection_boxes": [[0.1, 0.2, 0.3, 0.4]]
        }"#;
        // keyframe 1 uses the 4-digit convention, keyframe 2 the 3-digit one
        fs::write(objects.join("0001.json"), body)?;
        fs::write(objects.join("002.json"), body.replace("Cat", "Dog"))?;

        let records = builder(tmp.path())?.build("L01_V001")?;
        assert_eq!(records[0].labels, vec!["Cat"]);
        assert_eq!(records[1].labels, vec!["Dog"]);
        Ok(())
    }

    #[test]
    fn missing_detection_file_yields_empty_labels() -> Result<()> {
        let tmp = TempDir::new()?;
        write_video(tmp.path(), "L01_V001", 1)?;

        let records = builder(tmp.path())?.build("L01_V001")?;
        assert_eq!(records.len(), 1);
        assert!(records[0].detections.is_empty());
        assert!(records[0].labels.is_empty());
        Ok(())
    }

    #[test]
    fn corrupt_detection_file_skips_only_that_record() -> Result<()> {
        let tmp = TempDir::new()?;
        write_video(tmp.path(), "L01_V001", 3)?;
        fs::write(tmp.path().join("objects/L01_V001/002.json"), "not json")?;

        let records = builder(tmp.path())?.build("L01_V001")?;
        assert_eq!(
            records.iter().map(|r| r.keyframe_index).collect::<Vec<_>>(),
            vec![1, 3]
        );
        Ok(())
    }

    #[test]
    fn rebuild_is_stable() -> Result<()> {
        let tmp = TempDir::new()?;
        write_video(tmp.path(), "L01_V001", 2)?;

        let builder = builder(tmp.path())?;
        let first = builder.build("L01_V001")?;
        let second = builder.build("L01_V001")?;
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.point_id, b.point_id);
            assert_eq!(a.labels, b.labels);
            assert_eq!(a.high_confidence_labels, b.high_confidence_labels);
        }
        Ok(())
    }

    #[test]
    fn point_ids_are_distinct_per_keyframe() {
        assert_ne!(point_id_for("L01_V001", 1), point_id_for("L01_V001", 2));
        assert_ne!(point_id_for("L01_V001", 1), point_id_for("L01_V002", 1));
    }
}
