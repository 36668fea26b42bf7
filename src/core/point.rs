//! Decoded keypoint value type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single decoded keypoint.
///
/// Once produced by the decoder, `x` and `y` are normalized into `[0, 1]`
/// (pixel center of the winning grid cell). The same shape carries raw grid
/// coordinates before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictedPoint {
    /// Horizontal position
    pub x: f64,
    /// Vertical position
    pub y: f64,
    /// Heatmap confidence of the winning cell
    pub confidence: f64,
}

impl PredictedPoint {
    pub fn new(x: f64, y: f64, confidence: f64) -> Self {
        Self { x, y, confidence }
    }

    /// Format the point for tabular display with the given number of decimals.
    ///
    /// Renders as `(x, y), [confidence]`.
    pub fn describe(&self, precision: usize) -> String {
        format!(
            "({:.p$}, {:.p$}), [{:.p$}]",
            self.x,
            self.y,
            self.confidence,
            p = precision
        )
    }
}

impl fmt::Display for PredictedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe(3))
    }
}

/// Format an optional point, using `N/A` for an absent detection.
pub fn describe_optional(point: Option<&PredictedPoint>, precision: usize) -> String {
    match point {
        Some(p) => p.describe(precision),
        None => "N/A".to_string(),
    }
}
