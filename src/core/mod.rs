//! Core heatmap post-processing.
//!
//! This module contains:
//! - Heatmap decoding into one keypoint per channel
//! - Heatmap aggregation into a clamped intensity field
//! - Temporal smoothing of keypoints
//! - Rolling latency / FPS measurement
//! - Keypoint labels and JSON reports

pub mod aggregator;
pub mod decoder;
pub mod keypoints;
pub mod measure;
pub mod point;
pub mod report;
pub mod smoothing;
pub mod tensor;

// Re-export commonly used types
pub use aggregator::{HeatmapAggregator, IntensityField};
pub use decoder::HeatmapDecoder;
pub use keypoints::{default_labels, describe_points, KeypointRow, CPM_LABELS};
pub use measure::{
    Clock, ManualClock, MeasurementObserver, MeasurementReport, MonotonicClock,
    PerformanceMeasurement, PerformanceSummary, MEASUREMENT_SLOTS,
};
pub use point::PredictedPoint;
pub use report::{FrameReport, HeatmapReport, ReportBuilder, PRODUCER_NAME, REPORT_VERSION};
pub use smoothing::{KeypointSmoother, MovingAverageFilter};
pub use tensor::{ConfidenceTensor, HeatmapError, TensorDims};
