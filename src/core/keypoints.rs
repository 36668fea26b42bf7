//! Keypoint labels and tabular descriptions.

use crate::core::point::{describe_optional, PredictedPoint};
use serde::{Deserialize, Serialize};

/// Joint names of the 14-channel convolutional pose machine model, in channel order.
pub const CPM_LABELS: [&str; 14] = [
    "top",
    "neck",
    "R shoulder",
    "R elbow",
    "R wrist",
    "L shoulder",
    "L elbow",
    "L wrist",
    "R hip",
    "R knee",
    "R ankle",
    "L hip",
    "L knee",
    "L ankle",
];

/// Default label set as owned strings (for configuration).
pub fn default_labels() -> Vec<String> {
    CPM_LABELS.iter().map(|s| s.to_string()).collect()
}

/// Label for `channel`, falling back to `kp{channel}` past the end of the table.
pub fn label_for(labels: &[String], channel: usize) -> String {
    labels
        .get(channel)
        .cloned()
        .unwrap_or_else(|| format!("kp{channel}"))
}

/// One row of the keypoint table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeypointRow {
    pub channel: usize,
    pub label: String,
    /// `(x, y), [confidence]` or `N/A`
    pub description: String,
}

/// Describe every channel of a decoded frame.
pub fn describe_points(
    labels: &[String],
    points: &[Option<PredictedPoint>],
    precision: usize,
) -> Vec<KeypointRow> {
    points
        .iter()
        .enumerate()
        .map(|(channel, point)| KeypointRow {
            channel,
            label: label_for(labels, channel),
            description: describe_optional(point.as_ref(), precision),
        })
        .collect()
}
