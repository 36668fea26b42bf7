//! Rolling performance measurement.
//!
//! A fixed ring of [`MEASUREMENT_SLOTS`] slots records phase timestamps for
//! the most recent frames. Each frame is bracketed by [`PerformanceMeasurement::start`]
//! and [`PerformanceMeasurement::stop`], with an `endInference` marker in
//! between. `stop` derives inference time, execution time and instantaneous
//! FPS and pushes them to the registered observer.
//!
//! Every slot is seeded at construction with `start` and `end` set to the
//! construction time, so the very first complete frame already reports; its
//! FPS is measured against the construction time.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Number of frames kept in the measurement ring.
pub const MEASUREMENT_SLOTS: usize = 30;

/// Label recorded by `start()`.
pub const LABEL_START: &str = "start";
/// Label recorded when inference completes.
pub const LABEL_END_INFERENCE: &str = "endInference";
/// Label recorded by `stop()`.
pub const LABEL_END: &str = "end";

/// Source of monotonic timestamps, in seconds.
pub trait Clock {
    fn now(&self) -> f64;
}

/// Wall-independent clock measuring seconds since its creation.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Clock whose time is set explicitly.
///
/// Clones share the same time, so a caller can keep one handle and advance
/// the clock seen by a meter (replaying recorded timestamps, tests).
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        let clock = Self::default();
        clock.set(start);
        clock
    }

    pub fn set(&self, seconds: f64) {
        self.bits.store(seconds.to_bits(), Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: f64) {
        self.set(self.now() + seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}

/// Phase timestamps for a single frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementSlot {
    pub start: Option<f64>,
    pub end_inference: Option<f64>,
    pub end: Option<f64>,
    /// Any other labels, in recording order
    pub custom: Vec<(String, f64)>,
}

impl MeasurementSlot {
    fn seeded(time: f64) -> Self {
        Self {
            start: Some(time),
            end: Some(time),
            ..Self::default()
        }
    }

    fn record(&mut self, label: &str, time: f64) {
        match label {
            LABEL_START => self.start = Some(time),
            LABEL_END_INFERENCE => self.end_inference = Some(time),
            LABEL_END => self.end = Some(time),
            other => match self.custom.iter_mut().find(|(name, _)| name == other) {
                Some(entry) => entry.1 = time,
                None => self.custom.push((other.to_string(), time)),
            },
        }
    }

    /// Timestamp recorded under `label`, if any.
    pub fn get(&self, label: &str) -> Option<f64> {
        match label {
            LABEL_START => self.start,
            LABEL_END_INFERENCE => self.end_inference,
            LABEL_END => self.end,
            other => self
                .custom
                .iter()
                .find(|(name, _)| name == other)
                .map(|(_, t)| *t),
        }
    }

    fn clear(&mut self) {
        *self = Self::default();
    }

    fn timings(&self) -> Option<(f64, f64)> {
        let start = self.start?;
        Some((self.end_inference? - start, self.end? - start))
    }
}

/// Metrics derived for one completed frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementReport {
    /// `endInference - start`, in seconds
    pub inference_time: f64,
    /// `end - start`, in seconds
    pub execution_time: f64,
    /// Rounded `1 / (start - previous start)`; `None` when the delta is not positive
    pub fps: Option<u32>,
}

impl MeasurementReport {
    /// Inference time in whole milliseconds.
    pub fn inference_ms(&self) -> u64 {
        (self.inference_time * 1000.0) as u64
    }

    /// Execution time in whole milliseconds.
    pub fn execution_ms(&self) -> u64 {
        (self.execution_time * 1000.0) as u64
    }
}

impl fmt::Display for MeasurementReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Inference: {} ms | Execution: {} ms | FPS: ",
            self.inference_ms(),
            self.execution_ms()
        )?;
        match self.fps {
            Some(fps) => write!(f, "{fps}"),
            None => write!(f, "-"),
        }
    }
}

/// Receives metrics each time a frame completes.
pub trait MeasurementObserver: Send {
    fn update_measure(&mut self, report: &MeasurementReport);
}

impl<F> MeasurementObserver for F
where
    F: FnMut(&MeasurementReport) + Send,
{
    fn update_measure(&mut self, report: &MeasurementReport) {
        self(report)
    }
}

/// Aggregate view over the frames currently held in the ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    /// Number of complete frames in the ring
    pub cycles: usize,
    pub mean_inference_ms: f64,
    pub std_inference_ms: f64,
    pub mean_execution_ms: f64,
    pub std_execution_ms: f64,
    /// Mean instantaneous FPS over frames with a usable start delta
    pub mean_fps: Option<f64>,
}

/// Fixed-size ring of per-frame phase timestamps.
///
/// Not synchronized: `start`/`label`/`stop` must come from one producer.
pub struct PerformanceMeasurement<C: Clock = MonotonicClock> {
    clock: C,
    index: usize,
    slots: Vec<MeasurementSlot>,
    observer: Option<Box<dyn MeasurementObserver>>,
}

impl PerformanceMeasurement<MonotonicClock> {
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock::new())
    }
}

impl Default for PerformanceMeasurement<MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> PerformanceMeasurement<C> {
    /// Create a meter reading time from `clock`.
    pub fn with_clock(clock: C) -> Self {
        let now = clock.now();
        Self {
            clock,
            // First start() lands on slot 0
            index: MEASUREMENT_SLOTS - 1,
            slots: vec![MeasurementSlot::seeded(now); MEASUREMENT_SLOTS],
            observer: None,
        }
    }

    /// Register the observer notified on every completed frame.
    pub fn set_observer<O: MeasurementObserver + 'static>(&mut self, observer: O) {
        self.observer = Some(Box::new(observer));
    }

    /// Stop notifying; `stop` still returns the report.
    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    /// Begin a new frame: advance the ring, clear the slot and record `start`.
    pub fn start(&mut self) {
        self.index = (self.index + 1) % MEASUREMENT_SLOTS;
        self.slots[self.index].clear();
        self.label(LABEL_START);
    }

    /// Record the current time under `label` for the current frame.
    pub fn label(&mut self, label: &str) {
        let now = self.clock.now();
        self.slots[self.index].record(label, now);
    }

    /// Shorthand for `label("endInference")`.
    pub fn mark_inference_end(&mut self) {
        self.label(LABEL_END_INFERENCE);
    }

    /// Record `end` and, if the frame is complete, emit its metrics.
    ///
    /// Returns `None` without notifying when the current frame lacks a label
    /// or the previous slot has no `start`.
    pub fn stop(&mut self) -> Option<MeasurementReport> {
        self.label(LABEL_END);

        let current = &self.slots[self.index];
        let previous = &self.slots[previous_index(self.index)];

        let start = current.start?;
        let (inference_time, execution_time) = current.timings()?;
        let before_start = previous.start?;

        let report = MeasurementReport {
            inference_time,
            execution_time,
            fps: instantaneous_fps(start - before_start),
        };

        if let Some(observer) = self.observer.as_mut() {
            observer.update_measure(&report);
        }
        Some(report)
    }

    /// Seconds between `start` and `label` in the current frame.
    pub fn elapsed(&self, label: &str) -> Option<f64> {
        let slot = &self.slots[self.index];
        Some(slot.get(label)? - slot.start?)
    }

    /// Ring position of the current frame, always in `0..MEASUREMENT_SLOTS`.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The slot of the current frame.
    pub fn current(&self) -> &MeasurementSlot {
        &self.slots[self.index]
    }

    /// Summarize every complete frame still held in the ring.
    pub fn summary(&self) -> Option<PerformanceSummary> {
        let mut inference_ms = Vec::new();
        let mut execution_ms = Vec::new();
        let mut fps = Vec::new();

        for (i, slot) in self.slots.iter().enumerate() {
            let Some((inference, execution)) = slot.timings() else {
                continue;
            };
            inference_ms.push(inference * 1000.0);
            execution_ms.push(execution * 1000.0);

            let delta = slot
                .start
                .zip(self.slots[previous_index(i)].start)
                .map(|(start, before)| start - before);
            if let Some(value) = delta.and_then(instantaneous_fps) {
                fps.push(value as f64);
            }
        }

        if inference_ms.is_empty() {
            return None;
        }

        Some(PerformanceSummary {
            cycles: inference_ms.len(),
            mean_inference_ms: inference_ms.iter().mean(),
            std_inference_ms: spread(&inference_ms),
            mean_execution_ms: execution_ms.iter().mean(),
            std_execution_ms: spread(&execution_ms),
            mean_fps: if fps.is_empty() {
                None
            } else {
                Some(fps.iter().mean())
            },
        })
    }
}

fn previous_index(index: usize) -> usize {
    (index + MEASUREMENT_SLOTS - 1) % MEASUREMENT_SLOTS
}

/// Rounded frames per second for a start-to-start delta.
fn instantaneous_fps(delta: f64) -> Option<u32> {
    if delta > 0.0 && delta.is_finite() {
        Some((1.0 / delta).round() as u32)
    } else {
        None
    }
}

/// Sample standard deviation, 0 for fewer than two values.
fn spread(values: &[f64]) -> f64 {
    if values.len() < 2 {
        0.0
    } else {
        values.iter().std_dev()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    fn run_frame(
        meter: &mut PerformanceMeasurement<ManualClock>,
        clock: &ManualClock,
        start: f64,
        end_inference: f64,
        end: f64,
    ) -> Option<MeasurementReport> {
        clock.set(start);
        meter.start();
        clock.set(end_inference);
        meter.mark_inference_end();
        clock.set(end);
        meter.stop()
    }

    #[test]
    fn test_inference_and_execution_times() {
        let clock = ManualClock::new(0.0);
        let mut meter = PerformanceMeasurement::with_clock(clock.clone());

        let report = run_frame(&mut meter, &clock, 1.0, 1.02, 1.05).unwrap();
        assert_close(report.inference_time, 0.02);
        assert_close(report.execution_time, 0.05);
        // Measured against construction at t = 0
        assert_eq!(report.fps, Some(1));
    }

    #[test]
    fn test_fps_from_consecutive_starts() {
        let clock = ManualClock::new(0.0);
        let mut meter = PerformanceMeasurement::with_clock(clock.clone());

        run_frame(&mut meter, &clock, 1.0, 1.01, 1.02);
        let report = run_frame(&mut meter, &clock, 1.04, 1.05, 1.06).unwrap();
        assert_eq!(report.fps, Some(25));
    }

    #[test]
    fn test_zero_delta_has_no_fps() {
        let clock = ManualClock::new(5.0);
        let mut meter = PerformanceMeasurement::with_clock(clock.clone());

        // First start at construction time
        let report = run_frame(&mut meter, &clock, 5.0, 5.01, 5.02).unwrap();
        assert_eq!(report.fps, None);
        assert!(report.to_string().ends_with("FPS: -"));
    }

    #[test]
    fn test_missing_inference_label_is_silent() {
        let clock = ManualClock::new(0.0);
        let mut meter = PerformanceMeasurement::with_clock(clock.clone());

        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        meter.set_observer(move |_: &MeasurementReport| {
            *counter.lock().unwrap() += 1;
        });

        clock.set(1.0);
        meter.start();
        clock.set(1.1);
        assert!(meter.stop().is_none());
        assert_eq!(*calls.lock().unwrap(), 0);

        run_frame(&mut meter, &clock, 2.0, 2.1, 2.2);
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_observer_receives_report() {
        let clock = ManualClock::new(0.0);
        let mut meter = PerformanceMeasurement::with_clock(clock.clone());

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        meter.set_observer(move |report: &MeasurementReport| {
            sink.lock().unwrap().push(*report);
        });

        let returned = run_frame(&mut meter, &clock, 0.5, 0.6, 0.7).unwrap();
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0], returned);
        assert_eq!(returned.fps, Some(2));
    }

    #[test]
    fn test_cleared_observer_not_notified() {
        let clock = ManualClock::new(0.0);
        let mut meter = PerformanceMeasurement::with_clock(clock.clone());

        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        meter.set_observer(move |_: &MeasurementReport| {
            *counter.lock().unwrap() += 1;
        });

        run_frame(&mut meter, &clock, 1.0, 1.1, 1.2);
        meter.clear_observer();
        let report = run_frame(&mut meter, &clock, 2.0, 2.1, 2.2);

        assert!(report.is_some());
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_index_wraps_around_ring() {
        let clock = ManualClock::new(0.0);
        let mut meter = PerformanceMeasurement::with_clock(clock.clone());

        for frame in 0..MEASUREMENT_SLOTS {
            clock.advance(0.1);
            meter.start();
            assert_eq!(meter.index(), frame);
        }

        clock.advance(0.1);
        meter.start();
        assert_eq!(meter.index(), 0);
        clock.advance(0.02);
        meter.mark_inference_end();
        clock.advance(0.01);

        // Previous slot is 29, started 0.1 s earlier
        let report = meter.stop().unwrap();
        assert_eq!(report.fps, Some(10));
    }

    #[test]
    fn test_custom_labels() {
        let clock = ManualClock::new(0.0);
        let mut meter = PerformanceMeasurement::with_clock(clock.clone());

        clock.set(1.0);
        meter.start();
        clock.set(1.25);
        meter.label("decoded");

        assert_close(meter.elapsed("decoded").unwrap(), 0.25);
        assert!(meter.elapsed("smoothed").is_none());
        assert_eq!(meter.current().custom.len(), 1);

        // A new frame clears custom labels
        meter.start();
        assert!(meter.current().custom.is_empty());
    }

    #[test]
    fn test_summary_over_ring() {
        let clock = ManualClock::new(0.0);
        let mut meter = PerformanceMeasurement::with_clock(clock.clone());
        assert!(meter.summary().is_none());

        run_frame(&mut meter, &clock, 0.1, 0.11, 0.12);
        run_frame(&mut meter, &clock, 0.2, 0.23, 0.24);

        let summary = meter.summary().unwrap();
        assert_eq!(summary.cycles, 2);
        assert_close(summary.mean_inference_ms, 20.0);
        assert_close(summary.mean_execution_ms, 30.0);
        assert_eq!(summary.mean_fps, Some(10.0));
        assert!(summary.std_inference_ms > 0.0);
    }
}
