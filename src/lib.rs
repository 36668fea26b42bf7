//! Synheart Pose Agent - heatmap post-processing for on-device pose estimation.
//!
//! A pose model emits one confidence heatmap per body joint each frame. This
//! library turns those heatmaps into joint coordinates, smooths them over
//! time, renders a combined intensity field for overlays, and meters the
//! latency of every frame.
//!
//! Model loading, inference, camera capture and drawing stay with the host
//! application; the crate only sees tensors in and points out.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Synheart Pose Agent                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │   Tensor    │──▶│   Decoder   │──▶│  Smoother   │──▶ points
//! │  │  [K][W][H]  │   │ (argmax/ch) │   │ (window 3)  │        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! │         │                                                    │
//! │         ▼                                                    │
//! │  ┌─────────────┐                     ┌─────────────┐        │
//! │  │ Aggregator  │──▶ field            │ Performance │──▶ ms / FPS
//! │  │ (sum/clamp) │                     │ Measurement │        │
//! │  └─────────────┘                     └─────────────┘        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use synheart_pose_agent::core::ConfidenceTensor;
//! use synheart_pose_agent::pipeline::JointPipeline;
//!
//! let tensor = ConfidenceTensor::from_nested(vec![vec![
//!     vec![0.0, 0.9],
//!     vec![0.2, 0.0],
//! ]])
//! .unwrap();
//!
//! let mut pipeline = JointPipeline::new(3);
//! let frame = pipeline.run(&tensor);
//!
//! let point = frame.points[0].unwrap();
//! assert_eq!((point.x, point.y), (0.25, 0.75));
//! ```

pub mod config;
pub mod core;
pub mod pipeline;
pub mod source;
pub mod stats;

// Re-export key types at crate root for convenience
pub use crate::core::{
    ConfidenceTensor, HeatmapAggregator, HeatmapDecoder, HeatmapError, IntensityField,
    KeypointSmoother, MeasurementReport, MovingAverageFilter, PerformanceMeasurement,
    PredictedPoint,
};
pub use config::{Config, ConfigError};
pub use pipeline::{HeatmapFrame, HeatmapPipeline, JointFrame, JointPipeline};
pub use source::{FrameSource, FrameSourceConfig, SourceError, TensorFrame};
pub use stats::{PipelineLog, PipelineStats, SharedPipelineLog};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
