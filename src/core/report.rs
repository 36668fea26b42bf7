//! JSON snapshots of pipeline output.
//!
//! A [`FrameReport`] captures the smoothed keypoints of one frame together
//! with its timing metrics; a [`HeatmapReport`] captures one intensity field.
//! Both carry producer metadata so exported files can be traced back to the
//! agent instance that wrote them.

use crate::core::aggregator::IntensityField;
use crate::core::keypoints::label_for;
use crate::core::measure::MeasurementReport;
use crate::core::point::PredictedPoint;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The current report format version.
pub const REPORT_VERSION: &str = "1.0";

/// The name of this producer.
pub const PRODUCER_NAME: &str = "synheart-pose-agent";

/// Producer metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    /// Name of the producing software
    pub name: String,
    /// Version of the producing software
    pub version: String,
    /// Unique instance identifier (UUID)
    pub instance_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// One labelled keypoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeypointEntry {
    pub channel: usize,
    pub label: String,
    /// `None` when the channel had no positive confidence in the window
    pub point: Option<PredictedPoint>,
}

/// Keypoints of one processed frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameReport {
    pub report_version: String,
    /// When this payload was computed (RFC3339)
    pub computed_at_utc: String,
    pub producer: ReportProducer,
    /// Zero-based position of the frame in its stream
    pub frame_index: u64,
    pub keypoints: Vec<KeypointEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement: Option<MeasurementReport>,
}

impl FrameReport {
    /// Number of channels with a detection.
    pub fn detected_count(&self) -> usize {
        self.keypoints.iter().filter(|k| k.point.is_some()).count()
    }
}

/// Aggregated heatmap of one processed frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatmapReport {
    pub report_version: String,
    pub computed_at_utc: String,
    pub producer: ReportProducer,
    pub frame_index: u64,
    pub width: usize,
    pub height: usize,
    /// Row-major intensities, `height` rows of `width` values
    pub cells: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement: Option<MeasurementReport>,
}

/// Builds reports stamped with a stable instance identifier.
pub struct ReportBuilder {
    instance_id: Uuid,
    session_id: Option<String>,
    labels: Vec<String>,
}

impl ReportBuilder {
    /// Create a builder labelling channels with `labels`.
    pub fn new(labels: Vec<String>) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            session_id: None,
            labels,
        }
    }

    /// Set the session ID for generated reports.
    pub fn with_session_id(mut self, session_id: String) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    fn producer(&self) -> ReportProducer {
        ReportProducer {
            name: PRODUCER_NAME.to_string(),
            version: crate::VERSION.to_string(),
            instance_id: self.instance_id.to_string(),
            session_id: self.session_id.clone(),
        }
    }

    pub fn frame(
        &self,
        frame_index: u64,
        points: &[Option<PredictedPoint>],
        measurement: Option<MeasurementReport>,
    ) -> FrameReport {
        let keypoints = points
            .iter()
            .enumerate()
            .map(|(channel, point)| KeypointEntry {
                channel,
                label: label_for(&self.labels, channel),
                point: *point,
            })
            .collect();

        FrameReport {
            report_version: REPORT_VERSION.to_string(),
            computed_at_utc: Utc::now().to_rfc3339(),
            producer: self.producer(),
            frame_index,
            keypoints,
            measurement,
        }
    }

    pub fn heatmap(
        &self,
        frame_index: u64,
        field: &IntensityField,
        measurement: Option<MeasurementReport>,
    ) -> HeatmapReport {
        HeatmapReport {
            report_version: REPORT_VERSION.to_string(),
            computed_at_utc: Utc::now().to_rfc3339(),
            producer: self.producer(),
            frame_index,
            width: field.width,
            height: field.height,
            cells: field.cells().to_vec(),
            measurement,
        }
    }
}
