//! Session counters for the post-processing pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Running statistics for the current session.
#[derive(Debug)]
pub struct PipelineLog {
    /// Number of tensors decoded into keypoints
    frames_decoded: AtomicU64,
    /// Number of tensors aggregated into intensity fields
    heatmaps_aggregated: AtomicU64,
    /// Number of tensors rejected for their shape
    invalid_tensors: AtomicU64,
    /// Number of channels that decoded to no point
    absent_keypoints: AtomicU64,
    /// Number of reports written to disk
    reports_exported: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl PipelineLog {
    pub fn new() -> Self {
        Self {
            frames_decoded: AtomicU64::new(0),
            heatmaps_aggregated: AtomicU64::new(0),
            invalid_tensors: AtomicU64::new(0),
            absent_keypoints: AtomicU64::new(0),
            reports_exported: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log that accumulates on top of previously saved totals.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!("Could not load previous pipeline stats: {e}");
        }

        log
    }

    /// Record a decoded frame and how many of its channels were absent.
    pub fn record_frame_decoded(&self, absent: u64) {
        self.frames_decoded.fetch_add(1, Ordering::Relaxed);
        self.absent_keypoints.fetch_add(absent, Ordering::Relaxed);
    }

    pub fn record_heatmap_aggregated(&self) {
        self.heatmaps_aggregated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalid_tensor(&self) {
        self.invalid_tensors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reports_exported(&self, count: u64) {
        self.reports_exported.fetch_add(count, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            heatmaps_aggregated: self.heatmaps_aggregated.load(Ordering::Relaxed),
            invalid_tensors: self.invalid_tensors.load(Ordering::Relaxed),
            absent_keypoints: self.absent_keypoints.load(Ordering::Relaxed),
            reports_exported: self.reports_exported.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Frames decoded: {}\n\
             - Heatmaps aggregated: {}\n\
             - Invalid tensors rejected: {}\n\
             - Absent keypoints: {}\n\
             - Reports exported: {}\n\
             - Session duration: {} seconds",
            stats.frames_decoded,
            stats.heatmaps_aggregated,
            stats.invalid_tensors,
            stats.absent_keypoints,
            stats.reports_exported,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                frames_decoded: stats.frames_decoded,
                heatmaps_aggregated: stats.heatmaps_aggregated,
                invalid_tensors: stats.invalid_tensors,
                absent_keypoints: stats.absent_keypoints,
                reports_exported: stats.reports_exported,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.frames_decoded
                    .store(persisted.frames_decoded, Ordering::Relaxed);
                self.heatmaps_aggregated
                    .store(persisted.heatmaps_aggregated, Ordering::Relaxed);
                self.invalid_tensors
                    .store(persisted.invalid_tensors, Ordering::Relaxed);
                self.absent_keypoints
                    .store(persisted.absent_keypoints, Ordering::Relaxed);
                self.reports_exported
                    .store(persisted.reports_exported, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.frames_decoded.store(0, Ordering::Relaxed);
        self.heatmaps_aggregated.store(0, Ordering::Relaxed);
        self.invalid_tensors.store(0, Ordering::Relaxed);
        self.absent_keypoints.store(0, Ordering::Relaxed);
        self.reports_exported.store(0, Ordering::Relaxed);
    }
}

impl Default for PipelineLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of pipeline statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStats {
    pub frames_decoded: u64,
    pub heatmaps_aggregated: u64,
    pub invalid_tensors: u64,
    pub absent_keypoints: u64,
    pub reports_exported: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    frames_decoded: u64,
    heatmaps_aggregated: u64,
    invalid_tensors: u64,
    absent_keypoints: u64,
    reports_exported: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared pipeline log.
pub type SharedPipelineLog = Arc<PipelineLog>;

pub fn create_shared_log() -> SharedPipelineLog {
    Arc::new(PipelineLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedPipelineLog {
    Arc::new(PipelineLog::with_persistence(path))
}
