//! Serialized tensor frames.

use crate::core::tensor::{ConfidenceTensor, HeatmapError};
use serde::{Deserialize, Serialize};

/// One inference output as written by the producing process.
///
/// `data` is the flat row-major buffer of a tensor with the given `shape`,
/// normally `[K, W, H]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorFrame {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
    /// Capture time in seconds, when the producer recorded one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl TensorFrame {
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Self {
        Self {
            shape,
            data,
            timestamp: None,
        }
    }

    /// Validate the buffer length and wrap it as a tensor.
    pub fn into_tensor(self) -> Result<ConfidenceTensor, HeatmapError> {
        ConfidenceTensor::new(self.shape, self.data)
    }
}
