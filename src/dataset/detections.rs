use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One object detection kept for a keyframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Detection {
    /// Human-readable label, e.g. `Cat`
    pub label: String,
    /// Detector class identifier, e.g. `/m/01yrx`
    pub class_name: String,
    pub confidence: f32,
    /// Normalized `[ymin, xmin, ymax, xmax]`; empty when the file omits it
    pub bounding_box: Vec<f32>,
}

/// Detections of one keyframe together with the label lists derived from them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionSummary {
    pub detections: Vec<Detection>,
    /// Deduplicated labels in first-seen order
    pub labels: Vec<String>,
    /// Subset of `labels` above the high-confidence floor, first-seen order
    pub high_confidence_labels: Vec<String>,
}

/// On-disk detection file: parallel arrays, one entry per detection.
/// Numeric fields appear both as JSON numbers and as quoted strings in the
/// wild, so they are parsed leniently.
#[derive(Debug, Deserialize)]
struct DetectionFile {
    #[serde(default)]
    detection_scores: Vec<LenientNumber>,
    #[serde(default)]
    detection_class_entities: Vec<String>,
    #[serde(default)]
    detection_class_names: Vec<String>,
    #[serde(default)]
    detection_boxes: Vec<Vec<LenientNumber>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LenientNumber {
    Num(f32),
    Text(String),
}

impl LenientNumber {
    fn value(&self) -> Option<f32> {
        match self {
            LenientNumber::Num(v) => Some(*v),
            LenientNumber::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Reads a detection file and summarizes it with the given confidence floors.
pub fn load_detections(
    path: &Path,
    confidence_threshold: f32,
    high_confidence_threshold: f32,
) -> Result<DetectionSummary> {
    let file =
        File::open(path).with_context(|| format!("opening detection file {}", path.display()))?;
    let parsed: DetectionFile = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing detection file {}", path.display()))?;

    let mut detections = vec![];
    let entries = parsed
        .detection_scores
        .len()
        .min(parsed.detection_class_entities.len())
        .min(parsed.detection_class_names.len())
        .min(parsed.detection_boxes.len());

    for i in 0..entries {
        let Some(confidence) = parsed.detection_scores[i].value() else {
            continue;
        };
        let bounding_box: Vec<f32> =
            parsed.detection_boxes[i].iter().take(4).filter_map(LenientNumber::value).collect();
        detections.push(Detection {
            label: parsed.detection_class_entities[i].clone(),
            class_name: parsed.detection_class_names[i].clone(),
            confidence,
            bounding_box: if bounding_box.len() == 4 { bounding_box } else { vec![] },
        });
    }

    Ok(summarize_detections(detections, confidence_threshold, high_confidence_threshold))
}

/// Filters detections to the confidence floor and derives the label lists.
pub fn summarize_detections(
    detections: Vec<Detection>,
    confidence_threshold: f32,
    high_confidence_threshold: f32,
) -> DetectionSummary {
    let detections: Vec<Detection> =
        detections.into_iter().filter(|d| d.confidence >= confidence_threshold).collect();

    let mut labels = vec![];
    let mut seen = HashSet::new();
    let mut high_confidence_labels = vec![];
    let mut seen_high = HashSet::new();

    for detection in &detections {
        if seen.insert(detection.label.clone()) {
            labels.push(detection.label.clone());
        }
        if detection.confidence >= high_confidence_threshold
            && seen_high.insert(detection.label.clone())
        {
            high_confidence_labels.push(detection.label.clone());
        }
    }

    DetectionSummary { detections, labels, high_confidence_labels }
}
