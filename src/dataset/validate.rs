use anyhow::Result;
use log::{info, warn};
use ndarray::Array2;
use ndarray_npy::read_npy;
use serde::Serialize;

use super::layout::DatasetLayout;

/// Outcome of one validation run. Built once, immutable afterwards.
#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub total_videos: usize,
    pub valid_videos: usize,
    /// Keyframes across valid videos only
    pub total_keyframes: usize,
    pub missing_files: Vec<String>,
    pub shape_mismatches: Vec<String>,
    /// Ids of the videos that passed every check, sorted
    pub valid_ids: Vec<String>,
}

impl ValidationReport {
    pub fn invalid_videos(&self) -> usize {
        self.total_videos - self.valid_videos
    }

    pub fn log_summary(&self) {
        info!("validated {} videos: {} valid, {} invalid, {} keyframes",
            self.total_videos, self.valid_videos, self.invalid_videos(), self.total_keyframes);
        if !self.missing_files.is_empty() {
            warn!("missing files: {}", self.missing_files.len());
            for entry in self.missing_files.iter().take(5) {
                warn!("  - {entry}");
            }
            if self.missing_files.len() > 5 {
                warn!("  ... and {} more", self.missing_files.len() - 5);
            }
        }
        if !self.shape_mismatches.is_empty() {
            warn!("shape mismatches: {}", self.shape_mismatches.len());
            for entry in &self.shape_mismatches {
                warn!("  - {entry}");
            }
        }
    }
}

/// Walks the layout and checks that every video has a consistent feature
/// matrix, metadata table, detections directory and keyframe image directory.
///
/// A failed check marks the video invalid and records a diagnostic entry; it
/// never aborts the run. Nothing is mutated.
pub struct DatasetValidator<'a> {
    layout: &'a DatasetLayout,
    vector_dim: usize,
}

impl<'a> DatasetValidator<'a> {
    pub fn new(layout: &'a DatasetLayout, vector_dim: usize) -> Self {
        Self { layout, vector_dim }
    }

    /// Validates every video found in the feature directory.
    ///
    /// Only a missing feature directory is an error; per-video problems end
    /// up in the report.
    pub fn validate(&self) -> Result<ValidationReport> {
        let videos = self.layout.list_videos()?;
        let mut report = ValidationReport { total_videos: videos.len(), ..Default::default() };

        for video_id in videos {
            if let Some(keyframes) = self.validate_video(&video_id, &mut report) {
                report.valid_videos += 1;
                report.total_keyframes += keyframes;
                report.valid_ids.push(video_id);
            }
        }
        Ok(report)
    }

    /// Returns the keyframe count when the video passes every check.
    fn validate_video(&self, video_id: &str, report: &mut ValidationReport) -> Option<usize> {
        let features_file = self.layout.features_file(video_id);
        let features: Array2<f32> = match read_npy(&features_file) {
            Ok(features) => features,
            Err(e) => {
                report
                    .missing_files
                    .push(format!("features unreadable: {} ({e})", features_file.display()));
                return None;
            }
        };
        if features.ncols() != self.vector_dim {
            report.shape_mismatches.push(format!(
                "{video_id}: expected (N, {}), got ({}, {})",
                self.vector_dim,
                features.nrows(),
                features.ncols()
            ));
            return None;
        }

        let metadata_file = self.layout.metadata_file(video_id);
        if !metadata_file.is_file() {
            report.missing_files.push(format!("metadata: {}", metadata_file.display()));
            return None;
        }
        let rows = match csv::Reader::from_path(&metadata_file) {
            Ok(mut reader) => reader.records().count(),
            Err(e) => {
                report
                    .missing_files
                    .push(format!("metadata unreadable: {} ({e})", metadata_file.display()));
                return None;
            }
        };
        if rows != features.nrows() {
            report.shape_mismatches.push(format!(
                "{video_id}: metadata rows ({rows}) != feature rows ({})",
                features.nrows()
            ));
            return None;
        }

        let objects_dir = self.layout.objects_dir(video_id);
        if !objects_dir.is_dir() {
            report.missing_files.push(format!("objects dir: {}", objects_dir.display()));
            return None;
        }

        let image_dir = self.layout.keyframe_image_dir(video_id);
        if !image_dir.is_dir() {
            report.missing_files.push(format!("keyframes dir: {}", image_dir.display()));
            return None;
        }

        Some(features.nrows())
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

    fn write_video(root: &Path, video_id: &str, feature_rows: usize, csv_rows: usize) {
        let features = Array2::<f32>::zeros((feature_rows, DIM));
        fs::create_dir_all(root.join("clip-features-32")).unwrap();
        write_npy(root.join("clip-features-32").join(format!("{video_id}.npy")), &features)
            .unwrap();

        let mut csv = String::from("n,pts_time,fps,frame_idx\n");
        for i in 0..csv_rows {
            csv.push_str(&format!("{},{:.1},25.0,{}\n", i + 1, i as f64, i * 30));
        }
        fs::create_dir_all(root.join("map-keyframes")).unwrap();
        fs::write(root.join("map-keyframes").join(format!("{video_id}.csv")), csv).unwrap();

        fs::create_dir_all(root.join("objects").join(video_id)).unwrap();
        let batch = video_id.split('_').next().unwrap();
        fs::create_dir_all(root.join(format!("Keyframes_{batch}/keyframes")).join(video_id))
            .unwrap();
    }

    fn validate(root: &Path) -> ValidationReport {
        let opts = DatasetOptions {
            data_root: root.to_path_buf(),
            features_dir: "clip-features-32".to_string(),
            metadata_dir: "map-keyframes".to_string(),
            objects_dir: "objects".to_string(),
            keyframes_pattern: "Keyframes_{batch}/keyframes".to_string(),
        };
        let layout = DatasetLayout::new(&opts).unwrap();
        DatasetValidator::new(&layout, DIM).validate().unwrap()
    }

    #[test]
    fn counts_valid_videos() {
        let tmp = TempDir::new().unwrap();
        write_video(tmp.path(), "L01_V001", 3, 3);
        write_video(tmp.path(), "L01_V002", 2, 2);

        let report = validate(tmp.path());
        assert_eq!(report.total_videos, 2);
        assert_eq!(report.valid_videos, 2);
        assert_eq!(report.total_keyframes, 5);
        assert_eq!(report.valid_ids, vec!["L01_V001", "L01_V002"]);
    }

    #[test]
    fn row_count_mismatch_marks_video_invalid() {
        let tmp = TempDir::new().unwrap();
        // metadata says 50 rows, features say 48
        write_video(tmp.path(), "L01_V001", 48, 50);

        let report = validate(tmp.path());
        assert_eq!(report.valid_videos, 0);
        assert_eq!(report.total_keyframes, 0);
        assert_eq!(report.shape_mismatches.len(), 1);
        assert!(report.shape_mismatches[0].contains("50"));
        assert!(report.shape_mismatches[0].contains("48"));
    }

    #[test]
    fn wrong_vector_width_is_a_shape_mismatch() {
        let tmp = TempDir::new().unwrap();
        write_video(tmp.path(), "L01_V001", 3, 3);
        let features = Array2::<f32>::zeros((3, DIM + 1));
        write_npy(tmp.path().join("clip-features-32/L01_V001.npy"), &features).unwrap();

        let report = validate(tmp.path());
        assert_eq!(report.valid_videos, 0);
        assert_eq!(report.shape_mismatches.len(), 1);
    }

    #[test]
    fn missing_objects_dir_is_reported() {
        let tmp = TempDir::new().unwrap();
        write_video(tmp.path(), "L01_V001", 2, 2);
        fs::remove_dir_all(tmp.path().join("objects/L01_V001")).unwrap();

        let report = validate(tmp.path());
        assert_eq!(report.valid_videos, 0);
        assert_eq!(report.missing_files.len(), 1);
        assert!(report.missing_files[0].contains("objects"));
    }

    #[test]
    fn one_bad_video_does_not_hide_the_others() {
        let tmp = TempDir::new().unwrap();
        write_video(tmp.path(), "L01_V001", 3, 3);
        write_video(tmp.path(), "L01_V002", 2, 4);

        let report = validate(tmp.path());
        assert_eq!(report.total_videos, 2);
        assert_eq!(report.valid_videos, 1);
        assert_eq!(report.valid_ids, vec!["L01_V001"]);
    }
}
