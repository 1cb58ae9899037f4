mod detections;
mod layout;
mod record;
mod validate;

pub use detections::{Detection, DetectionSummary, load_detections, summarize_detections};
pub use layout::DatasetLayout;
pub use record::{BuilderOptions, KeyframeRecord, RecordBuilder, point_id_for};
pub use validate::{DatasetValidator, ValidationReport};
