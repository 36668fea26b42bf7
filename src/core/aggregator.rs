//! Channel-summed intensity field for heatmap overlays.

use crate::core::decoder::is_positive;
use crate::core::tensor::{ConfidenceTensor, HeatmapError};
use serde::{Deserialize, Serialize};

/// Clamped `[0, 1]` intensity per grid cell.
///
/// The field is `width` columns (the tensor's `W` axis, `x`) by `height` rows
/// (the tensor's `H` axis, `y`), stored row-major. A point decoded from the
/// same tensor lands inside the cell that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntensityField {
    pub width: usize,
    pub height: usize,
    cells: Vec<f64>,
}

impl IntensityField {
    /// A zero-filled field.
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![0.0; width * height],
        }
    }

    /// Field with no cells, used when a tensor is rejected.
    pub fn empty() -> Self {
        Self::zeros(0, 0)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Intensity at column `x`, row `y`.
    pub fn get(&self, x: usize, y: usize) -> Option<f64> {
        if x < self.width && y < self.height {
            Some(self.cells[y * self.width + x])
        } else {
            None
        }
    }

    /// Row-major cell values.
    pub fn cells(&self) -> &[f64] {
        &self.cells
    }

    /// Iterate over rows, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks(0) panics, an empty field simply has no rows
        self.cells.chunks(self.width.max(1))
    }

    /// Largest intensity in the field (0 for an empty field).
    pub fn peak(&self) -> f64 {
        self.cells.iter().fold(0.0_f64, |acc, &v| acc.max(v))
    }

    fn accumulate(&mut self, x: usize, y: usize, value: f64) {
        self.cells[y * self.width + x] += value;
    }

    fn clamp_unit(&mut self) {
        for cell in &mut self.cells {
            *cell = cell.clamp(0.0, 1.0);
        }
    }
}

/// Sums all channels of a confidence tensor into one [`IntensityField`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HeatmapAggregator;

impl HeatmapAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Sum finite positive confidences across channels, then clamp every cell to `[0, 1]`.
    pub fn aggregate(&self, tensor: &ConfidenceTensor) -> Result<IntensityField, HeatmapError> {
        let dims = tensor.dims()?;
        let mut field = IntensityField::zeros(dims.width, dims.height);

        for k in 0..dims.channels {
            let plane = tensor.channel(&dims, k);
            for i in 0..dims.width {
                for j in 0..dims.height {
                    let confidence = plane[i * dims.height + j];
                    if !is_positive(confidence) {
                        continue;
                    }
                    field.accumulate(i, j, confidence);
                }
            }
        }

        field.clamp_unit();
        Ok(field)
    }
}
