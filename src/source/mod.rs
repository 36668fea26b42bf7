//! Tensor input for the pipeline.
//!
//! Model inference happens outside this crate. Its output reaches the
//! pipeline as [`TensorFrame`]s, either one JSON document per file or a JSON
//! Lines stream replayed on a background thread.

pub mod reader;
pub mod types;

// Re-export commonly used types
pub use reader::{load_frame, FrameSource, FrameSourceConfig, SourceError};
pub use types::TensorFrame;
