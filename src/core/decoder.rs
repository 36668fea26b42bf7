//! Heatmap-to-keypoint decoding.
//!
//! Each channel of the confidence tensor is reduced to its single strongest
//! cell. Axis convention: the outer scan index `i` runs over the width `W`
//! and becomes `x`; the inner index `j` runs over the height `H` and becomes
//! `y`. Coordinates are then moved to the cell center and normalized:
//! `x = (i + 0.5) / W`, `y = (j + 0.5) / H`.

use crate::core::point::PredictedPoint;
use crate::core::tensor::{ConfidenceTensor, HeatmapError, TensorDims};

/// Decodes a `[K][W][H]` confidence tensor into one optional point per channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeatmapDecoder;

impl HeatmapDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode every channel of the tensor.
    ///
    /// The result has exactly `K` entries, index-aligned with the channels.
    /// A channel with no finite positive cell decodes to `None`.
    pub fn decode(
        &self,
        tensor: &ConfidenceTensor,
    ) -> Result<Vec<Option<PredictedPoint>>, HeatmapError> {
        let dims = tensor.dims()?;

        let points = (0..dims.channels)
            .map(|k| find_peak(tensor.channel(&dims, k), &dims).map(|raw| normalize(raw, &dims)))
            .collect();

        Ok(points)
    }
}

/// Locate the strongest positive cell of one channel, in raw grid coordinates.
///
/// Ties keep the first maximal cell in scan order.
fn find_peak(plane: &[f64], dims: &TensorDims) -> Option<PredictedPoint> {
    let mut best: Option<PredictedPoint> = None;

    for i in 0..dims.width {
        for j in 0..dims.height {
            let confidence = plane[i * dims.height + j];
            if !is_positive(confidence) {
                continue;
            }
            // Strict comparison: an equal later cell never replaces the winner
            let replace = match best {
                Some(ref current) => confidence > current.confidence,
                None => true,
            };
            if replace {
                best = Some(PredictedPoint::new(i as f64, j as f64, confidence));
            }
        }
    }

    best
}

/// Move a raw grid location to its cell center in unit range.
/// Finite and strictly positive; NaN and infinities never count as a peak.
pub(crate) fn is_positive(confidence: f64) -> bool {
    confidence.is_finite() && confidence > 0.0
}

fn normalize(raw: PredictedPoint, dims: &TensorDims) -> PredictedPoint {
    PredictedPoint::new(
        (raw.x + 0.5) / dims.width as f64,
        (raw.y + 0.5) / dims.height as f64,
        raw.confidence,
    )
}
