//! Confidence tensor supplied by the inference step.
//!
//! The tensor is a flat, row-major buffer with a declared shape. The first
//! three dimensions are interpreted as `[K][W][H]`: keypoint channels, then
//! the two spatial extents of the heatmap grid.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Spatial layout of a confidence tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorDims {
    /// Number of keypoint channels (K)
    pub channels: usize,
    /// Heatmap width (W), scanned by the outer spatial loop
    pub width: usize,
    /// Heatmap height (H), scanned by the inner spatial loop
    pub height: usize,
}

impl TensorDims {
    /// Number of grid cells in a single channel.
    pub fn plane_len(&self) -> usize {
        self.width * self.height
    }
}

/// Read-only `[K][W][H]` confidence tensor.
///
/// Deserialization goes through [`ConfidenceTensor::new`], so a decoded
/// tensor always has a buffer matching its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTensor")]
pub struct ConfidenceTensor {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl ConfidenceTensor {
    /// Wrap a flat buffer with its declared shape.
    ///
    /// Only the buffer length is checked here; rank is validated when the
    /// tensor is decoded or aggregated.
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self, HeatmapError> {
        let expected = element_count(&shape)?;
        if expected != data.len() {
            return Err(HeatmapError::DataLengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// Build a tensor from nested `[K][W][H]` vectors.
    ///
    /// Ragged input is rejected with a length mismatch.
    pub fn from_nested(channels: Vec<Vec<Vec<f64>>>) -> Result<Self, HeatmapError> {
        let k = channels.len();
        let w = channels.first().map(|c| c.len()).unwrap_or(0);
        let h = channels
            .first()
            .and_then(|c| c.first())
            .map(|r| r.len())
            .unwrap_or(0);

        let actual: usize = channels.iter().flatten().map(|row| row.len()).sum();
        let ragged = channels
            .iter()
            .any(|c| c.len() != w || c.iter().any(|row| row.len() != h));
        if ragged {
            return Err(HeatmapError::DataLengthMismatch {
                expected: k * w * h,
                actual,
            });
        }

        let data: Vec<f64> = channels.into_iter().flatten().flatten().collect();
        Self::new(vec![k, w, h], data)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Interpret the first three dimensions as `[K][W][H]`.
    pub fn dims(&self) -> Result<TensorDims, HeatmapError> {
        if self.shape.len() < 3 {
            return Err(HeatmapError::InvalidRank {
                shape: self.shape.clone(),
            });
        }
        Ok(TensorDims {
            channels: self.shape[0],
            width: self.shape[1],
            height: self.shape[2],
        })
    }

    /// The `W * H` confidence plane of channel `k`, laid out as `i * H + j`.
    pub fn channel(&self, dims: &TensorDims, k: usize) -> &[f64] {
        let plane = dims.plane_len();
        &self.data[k * plane..(k + 1) * plane]
    }
}

/// Errors raised when a tensor cannot be interpreted as `[K][W][H]`.
#[derive(Deserialize)]
struct RawTensor {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl TryFrom<RawTensor> for ConfidenceTensor {
    type Error = HeatmapError;

    fn try_from(raw: RawTensor) -> Result<Self, Self::Error> {
        Self::new(raw.shape, raw.data)
    }
}

/// Number of values a buffer of `shape` holds.
///
/// The product of the non-zero dimensions must also fit in `usize`; the
/// spatial plane is allocated even when there are no channels.
fn element_count(shape: &[usize]) -> Result<usize, HeatmapError> {
    let overflow = || HeatmapError::ShapeOverflow {
        shape: shape.to_vec(),
    };
    shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d.max(1)))
        .ok_or_else(overflow)?;
    shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(overflow)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeatmapError {
    /// Fewer than three dimensions were declared
    InvalidRank { shape: Vec<usize> },
    /// The buffer does not hold `product(shape)` values
    DataLengthMismatch { expected: usize, actual: usize },
    /// The element count of the shape does not fit in usize
    ShapeOverflow { shape: Vec<usize> },
}

impl fmt::Display for HeatmapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeatmapError::InvalidRank { shape } => {
                write!(f, "heatmap's shape is invalid: {shape:?} (need at least 3 dimensions)")
            }
            HeatmapError::DataLengthMismatch { expected, actual } => {
                write!(f, "heatmap data length {actual} does not match shape ({expected} values)")
            }
            HeatmapError::ShapeOverflow { shape } => {
                write!(f, "heatmap's shape is too large: {shape:?}")
            }
        }
    }
}

impl std::error::Error for HeatmapError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_mismatch_rejected() {
        let err = ConfidenceTensor::new(vec![1, 2, 2], vec![0.0; 3]).unwrap_err();
        assert_eq!(
            err,
            HeatmapError::DataLengthMismatch {
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn test_deserialize_checks_length() {
        let result = serde_json::from_str::<ConfidenceTensor>(r#"{"shape":[1,2,2],"data":[0.5]}"#);
        assert!(result.is_err());

        let tensor: ConfidenceTensor =
            serde_json::from_str(r#"{"shape":[1,2,2],"data":[0.0,0.9,0.2,0.0]}"#).unwrap();
        assert_eq!(tensor.dims().unwrap().plane_len(), 4);
    }

    #[test]
    fn test_overflowing_shape_rejected() {
        let huge = 1usize << 32;
        let err = ConfidenceTensor::new(vec![huge, huge, 2], Vec::new()).unwrap_err();
        assert!(matches!(err, HeatmapError::ShapeOverflow { .. }));

        // An empty channel axis must not hide an oversized plane
        let err = ConfidenceTensor::new(vec![0, huge, huge], Vec::new()).unwrap_err();
        assert!(matches!(err, HeatmapError::ShapeOverflow { .. }));
    }

    #[test]
    fn test_rank_checked_on_dims() {
        let tensor = ConfidenceTensor::new(vec![2, 2], vec![0.0; 4]).unwrap();
        assert!(matches!(tensor.dims(), Err(HeatmapError::InvalidRank { .. })));
    }

    #[test]
    fn test_from_nested_layout() {
        let tensor = ConfidenceTensor::from_nested(vec![
            vec![vec![0.0, 0.9], vec![0.2, 0.0]],
            vec![vec![0.1, 0.0], vec![0.0, 0.3]],
        ])
        .unwrap();

        let dims = tensor.dims().unwrap();
        assert_eq!(
            dims,
            TensorDims {
                channels: 2,
                width: 2,
                height: 2
            }
        );
        assert_eq!(tensor.channel(&dims, 0), &[0.0, 0.9, 0.2, 0.0]);
        assert_eq!(tensor.channel(&dims, 1), &[0.1, 0.0, 0.0, 0.3]);
    }

    #[test]
    fn test_higher_rank_uses_leading_dims() {
        let tensor = ConfidenceTensor::new(vec![1, 2, 3, 1], vec![0.0; 6]).unwrap();
        let dims = tensor.dims().unwrap();
        assert_eq!(dims.channels, 1);
        assert_eq!(dims.width, 2);
        assert_eq!(dims.height, 3);
    }
}
