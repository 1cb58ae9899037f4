use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use walkdir::WalkDir;

use crate::config::DatasetOptions;

/// Path and naming resolution for a dataset root.
///
/// Performs no I/O beyond existence checks; every accessor is a pure path
/// computation so the same layout can describe a dataset that is still being
/// assembled.
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    root: PathBuf,
    features_dir: String,
    metadata_dir: String,
    objects_dir: String,
    keyframes_pattern: String,
}

impl DatasetLayout {
    pub fn new(opts: &DatasetOptions) -> Result<Self> {
        ensure!(opts.data_root.is_dir(), "dataset root not found: {}", opts.data_root.display());
        Ok(Self {
            root: opts.data_root.clone(),
            features_dir: opts.features_dir.clone(),
            metadata_dir: opts.metadata_dir.clone(),
            objects_dir: opts.objects_dir.clone(),
            keyframes_pattern: opts.keyframes_pattern.clone(),
        })
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    /// Returns the feature matrix file for a video.
    pub fn features_file(&self, video_id: &str) -> PathBuf {
        self.root.join(&self.features_dir).join(format!("{video_id}.npy"))
    }

    /// Returns the metadata table for a video.
    pub fn metadata_file(&self, video_id: &str) -> PathBuf {
        self.root.join(&self.metadata_dir).join(format!("{video_id}.csv"))
    }

    /// Returns the detection file directory for a video.
    pub fn objects_dir(&self, video_id: &str) -> PathBuf {
        self.root.join(&self.objects_dir).join(video_id)
    }

    /// Returns the detection file candidates for a 1-based keyframe number.
    ///
    /// Both zero-padding conventions are in circulation; the 4-digit name is
    /// tried first, then the 3-digit name. First existing candidate wins.
    pub fn detection_candidates(&self, video_id: &str, keyframe: u32) -> [PathBuf; 2] {
        let dir = self.objects_dir(video_id);
        [dir.join(format!("{keyframe:04}.json")), dir.join(format!("{keyframe:03}.json"))]
    }

    /// Returns the keyframe image directory for a video.
    ///
    /// The `{batch}` placeholder in the pattern expands to the video id prefix
    /// before the first underscore (`L21_V001` lives under batch `L21`).
    pub fn keyframe_image_dir(&self, video_id: &str) -> PathBuf {
        let batch = video_id.split('_').next().unwrap_or(video_id);
        self.root.join(self.keyframes_pattern.replace("{batch}", batch)).join(video_id)
    }

    /// Returns the image path for a 1-based keyframe number.
    pub fn keyframe_image(&self, video_id: &str, keyframe: u32) -> PathBuf {
        self.keyframe_image_dir(video_id).join(format!("{keyframe:03}.jpg"))
    }

    /// Enumerates video ids from the feature-file directory, sorted.
    pub fn list_videos(&self) -> Result<Vec<String>> {
        let dir = self.root.join(&self.features_dir);
        ensure!(dir.is_dir(), "feature directory not found: {}", dir.display());

        let mut videos = vec![];
        for entry in WalkDir::new(&dir).max_depth(1) {
            let entry = entry.with_context(|| format!("scanning {}", dir.display()))?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "npy") {
                if let Some(stem) = path.file_stem() {
                    videos.push(stem.to_string_lossy().to_string());
                }
            }
        }
        videos.sort();
        Ok(videos)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn layout(root: &Path) -> DatasetLayout {
        DatasetLayout {
            root: root.to_path_buf(),
            features_dir: "clip-features-32".to_string(),
            metadata_dir: "map-keyframes".to_string(),
            objects_dir: "objects".to_string(),
            keyframes_pattern: "Keyframes_{batch}/keyframes".to_string(),
        }
    }

    #[test]
    fn resolves_batch_pattern() {
        let layout = layout(Path::new("/data"));
        assert_eq!(
            layout.keyframe_image("L21_V001", 3),
            Path::new("/data/Keyframes_L21/keyframes/L21_V001/003.jpg")
        );
    }

    #[test]
    fn detection_candidates_prefer_four_digits() {
        let layout = layout(Path::new("/data"));
        let [first, second] = layout.detection_candidates("L21_V001", 37);
        assert_eq!(first, Path::new("/data/objects/L21_V001/0037.json"));
        assert_eq!(second, Path::new("/data/objects/L21_V001/037.json"));
    }

    #[test]
    fn lists_videos_sorted() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let features = tmp.path().join("clip-features-32");
        fs::create_dir_all(&features)?;
        for name in ["L02_V001.npy", "L01_V001.npy", "notes.txt"] {
            fs::write(features.join(name), b"")?;
        }

        let layout = layout(tmp.path());
        assert_eq!(layout.list_videos()?, vec!["L01_V001", "L02_V001"]);
        Ok(())
    }
}
