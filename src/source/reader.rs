//! File-backed frame sources.

use crate::source::types::TensorFrame;
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Configuration for a JSON Lines replay.
#[derive(Debug, Clone)]
pub struct FrameSourceConfig {
    /// File with one [`TensorFrame`] JSON object per line
    pub path: PathBuf,
    /// Bound of the frame channel
    pub channel_capacity: usize,
}

impl FrameSourceConfig {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            channel_capacity: 64,
        }
    }
}

/// Errors that can occur while reading frames.
#[derive(Debug)]
pub enum SourceError {
    AlreadyRunning,
    Io(String),
    Parse { line: usize, message: String },
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::AlreadyRunning => write!(f, "Frame source is already running"),
            SourceError::Io(e) => write!(f, "IO error: {e}"),
            SourceError::Parse { line, message } => {
                write!(f, "Parse error on line {line}: {message}")
            }
        }
    }
}

impl std::error::Error for SourceError {}

/// Load a single frame from a JSON file.
pub fn load_frame(path: &Path) -> Result<TensorFrame, SourceError> {
    let content = std::fs::read_to_string(path).map_err(|e| SourceError::Io(e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| SourceError::Parse {
        line: e.line(),
        message: e.to_string(),
    })
}

type FrameResult = Result<TensorFrame, SourceError>;

/// Replays a JSON Lines file of frames on a background thread.
///
/// Frames arrive on a bounded channel in file order. Malformed lines are
/// delivered as errors and reading continues. The channel disconnects once
/// the file is exhausted or the source is stopped.
pub struct FrameSource {
    config: FrameSourceConfig,
    sender: Option<Sender<FrameResult>>,
    receiver: Receiver<FrameResult>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FrameSource {
    pub fn new(config: FrameSourceConfig) -> Self {
        let (sender, receiver) = bounded(config.channel_capacity.max(1));
        Self {
            config,
            sender: Some(sender),
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Open the file and start the reader thread.
    ///
    /// A source replays its file once; starting it again is an error.
    pub fn start(&mut self) -> Result<(), SourceError> {
        let sender = self.sender.take().ok_or(SourceError::AlreadyRunning)?;
        let file = File::open(&self.config.path).map_err(|e| SourceError::Io(e.to_string()))?;

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let path = self.config.path.clone();

        let handle = thread::Builder::new()
            .name("frame-source".to_string())
            .spawn(move || {
                tracing::info!(path = %path.display(), "Frame source started");
                read_lines(BufReader::new(file), &sender, &running);
                running.store(false, Ordering::SeqCst);
                tracing::info!("Frame source finished");
            })
            .map_err(|e| SourceError::Io(e.to_string()))?;

        self.handle = Some(handle);
        Ok(())
    }

    /// Stop reading and wait for the reader thread.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Frame source thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the receiver for frames.
    pub fn receiver(&self) -> &Receiver<FrameResult> {
        &self.receiver
    }

    /// Try to receive a frame without blocking.
    pub fn try_recv(&self) -> Option<FrameResult> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn read_lines<R: BufRead>(reader: R, sender: &Sender<FrameResult>, running: &AtomicBool) {
    for (number, line) in reader.lines().enumerate() {
        if !running.load(Ordering::SeqCst) {
            return;
        }

        let item = match line {
            Ok(text) if text.trim().is_empty() => continue,
            Ok(text) => serde_json::from_str::<TensorFrame>(&text).map_err(|e| {
                SourceError::Parse {
                    line: number + 1,
                    message: e.to_string(),
                }
            }),
            Err(e) => Err(SourceError::Io(e.to_string())),
        };

        if !send_while_running(sender, item, running) {
            return;
        }
    }
}

/// Block on a full channel, giving up once stopped or disconnected.
fn send_while_running(
    sender: &Sender<FrameResult>,
    mut item: FrameResult,
    running: &AtomicBool,
) -> bool {
    loop {
        match sender.send_timeout(item, Duration::from_millis(100)) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(returned)) => {
                if !running.load(Ordering::SeqCst) {
                    return false;
                }
                item = returned;
            }
            Err(SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}
