//! Per-frame processing pipelines.
//!
//! ```text
//! capture ──▶ begin_frame()            (measurement "start")
//! inference (external)
//! tensor  ──▶ process()                ("endInference")
//!              ├─ JointPipeline:   decode ──▶ smooth
//!              └─ HeatmapPipeline: aggregate
//!                                      ("end", metrics to observer)
//! ```
//!
//! Both pipelines are single-owner and synchronous. A rejected tensor is
//! logged, counted, and turned into an empty result; the frame's
//! measurement is still closed.

use crate::core::aggregator::{HeatmapAggregator, IntensityField};
use crate::core::decoder::HeatmapDecoder;
use crate::core::measure::{
    Clock, MeasurementObserver, MeasurementReport, MonotonicClock, PerformanceMeasurement,
    PerformanceSummary,
};
use crate::core::point::PredictedPoint;
use crate::core::smoothing::KeypointSmoother;
use crate::core::tensor::ConfidenceTensor;
use crate::stats::{create_shared_log, SharedPipelineLog};

/// Smoothed keypoints for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct JointFrame {
    /// One entry per channel; empty if the tensor was rejected
    pub points: Vec<Option<PredictedPoint>>,
    pub measurement: Option<MeasurementReport>,
}

/// Intensity field for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapFrame {
    /// Empty if the tensor was rejected
    pub field: IntensityField,
    pub measurement: Option<MeasurementReport>,
}

/// Decode ─▶ smooth, with per-frame measurement.
pub struct JointPipeline<C: Clock = MonotonicClock> {
    decoder: HeatmapDecoder,
    smoother: KeypointSmoother,
    measurement: PerformanceMeasurement<C>,
    log: SharedPipelineLog,
}

impl JointPipeline<MonotonicClock> {
    /// # Panics
    ///
    /// Panics if `window` is zero.
    pub fn new(window: usize) -> Self {
        Self::with_parts(window, MonotonicClock::new(), create_shared_log())
    }
}

impl<C: Clock> JointPipeline<C> {
    /// # Panics
    ///
    /// Panics if `window` is zero.
    pub fn with_parts(window: usize, clock: C, log: SharedPipelineLog) -> Self {
        Self {
            decoder: HeatmapDecoder::new(),
            smoother: KeypointSmoother::new(window),
            measurement: PerformanceMeasurement::with_clock(clock),
            log,
        }
    }

    pub fn set_observer<O: MeasurementObserver + 'static>(&mut self, observer: O) {
        self.measurement.set_observer(observer);
    }

    /// Mark frame capture.
    pub fn begin_frame(&mut self) {
        self.measurement.start();
    }

    /// Handle an inference result for the frame opened by [`Self::begin_frame`].
    pub fn process(&mut self, tensor: &ConfidenceTensor) -> JointFrame {
        self.measurement.mark_inference_end();

        let points = match self.decoder.decode(tensor) {
            Ok(decoded) => {
                let absent = decoded.iter().filter(|p| p.is_none()).count() as u64;
                self.log.record_frame_decoded(absent);
                self.smoother.smooth(&decoded)
            }
            Err(e) => {
                tracing::warn!("Rejected tensor: {e}");
                self.log.record_invalid_tensor();
                Vec::new()
            }
        };

        let measurement = self.measurement.stop();
        JointFrame {
            points,
            measurement,
        }
    }

    /// Capture and process in one step, for frames that arrive already inferred.
    pub fn run(&mut self, tensor: &ConfidenceTensor) -> JointFrame {
        self.begin_frame();
        self.process(tensor)
    }

    pub fn summary(&self) -> Option<PerformanceSummary> {
        self.measurement.summary()
    }

    pub fn smoother(&self) -> &KeypointSmoother {
        &self.smoother
    }

    pub fn log(&self) -> &SharedPipelineLog {
        &self.log
    }
}

/// Aggregate, with per-frame measurement.
pub struct HeatmapPipeline<C: Clock = MonotonicClock> {
    aggregator: HeatmapAggregator,
    measurement: PerformanceMeasurement<C>,
    log: SharedPipelineLog,
}

impl HeatmapPipeline<MonotonicClock> {
    pub fn new() -> Self {
        Self::with_parts(MonotonicClock::new(), create_shared_log())
    }
}

impl Default for HeatmapPipeline<MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> HeatmapPipeline<C> {
    pub fn with_parts(clock: C, log: SharedPipelineLog) -> Self {
        Self {
            aggregator: HeatmapAggregator::new(),
            measurement: PerformanceMeasurement::with_clock(clock),
            log,
        }
    }

    pub fn set_observer<O: MeasurementObserver + 'static>(&mut self, observer: O) {
        self.measurement.set_observer(observer);
    }

    pub fn begin_frame(&mut self) {
        self.measurement.start();
    }

    pub fn process(&mut self, tensor: &ConfidenceTensor) -> HeatmapFrame {
        self.measurement.mark_inference_end();

        let field = match self.aggregator.aggregate(tensor) {
            Ok(field) => {
                self.log.record_heatmap_aggregated();
                field
            }
            Err(e) => {
                tracing::warn!("Rejected tensor: {e}");
                self.log.record_invalid_tensor();
                IntensityField::empty()
            }
        };

        let measurement = self.measurement.stop();
        HeatmapFrame { field, measurement }
    }

    pub fn run(&mut self, tensor: &ConfidenceTensor) -> HeatmapFrame {
        self.begin_frame();
        self.process(tensor)
    }

    pub fn summary(&self) -> Option<PerformanceSummary> {
        self.measurement.summary()
    }

    pub fn log(&self) -> &SharedPipelineLog {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::measure::ManualClock;

    fn peak_tensor(i: usize, j: usize, confidence: f64) -> ConfidenceTensor {
        let mut plane = vec![vec![0.0; 4]; 4];
        plane[i][j] = confidence;
        ConfidenceTensor::from_nested(vec![plane]).unwrap()
    }

    #[test]
    fn test_joint_pipeline_smooths_and_measures() {
        let clock = ManualClock::new(0.0);
        let mut pipeline = JointPipeline::with_parts(3, clock.clone(), create_shared_log());

        clock.set(1.0);
        pipeline.begin_frame();
        clock.set(1.01);
        let first = pipeline.process(&peak_tensor(0, 0, 0.5));
        assert_eq!(first.points.len(), 1);
        let metrics = first.measurement.unwrap();
        assert!((metrics.inference_time - 0.01).abs() < 1e-9);

        clock.set(1.1);
        pipeline.begin_frame();
        let second = pipeline.process(&peak_tensor(2, 0, 0.5));
        let point = second.points[0].unwrap();
        // Mean of x = 0.125 and x = 0.625
        assert!((point.x - 0.375).abs() < 1e-9);
        assert!((point.confidence - 1.0).abs() < 1e-9);
        assert_eq!(second.measurement.unwrap().fps, Some(10));

        assert_eq!(pipeline.log().stats().frames_decoded, 2);
    }

    #[test]
    fn test_rejected_tensor_gives_empty_frame() {
        let mut pipeline = JointPipeline::new(3);
        let tensor = ConfidenceTensor::new(vec![2, 2], vec![0.1; 4]).unwrap();

        let frame = pipeline.run(&tensor);
        assert!(frame.points.is_empty());
        assert_eq!(pipeline.log().stats().invalid_tensors, 1);
        assert_eq!(pipeline.log().stats().frames_decoded, 0);
    }

    #[test]
    fn test_heatmap_pipeline() {
        let mut pipeline = HeatmapPipeline::new();

        let frame = pipeline.run(&peak_tensor(1, 2, 0.4));
        assert_eq!(frame.field.get(1, 2), Some(0.4));
        assert_eq!(pipeline.log().stats().heatmaps_aggregated, 1);

        let bad = ConfidenceTensor::new(vec![1], vec![0.5]).unwrap();
        let frame = pipeline.run(&bad);
        assert!(frame.field.is_empty());
        assert_eq!(pipeline.log().stats().invalid_tensors, 1);
    }
}
