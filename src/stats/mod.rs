//! Pipeline statistics.
//!
//! Counts what the pipeline processed and rejected so a session can be
//! audited after the fact.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, PipelineLog, PipelineStats,
    SharedPipelineLog,
};
