//! Temporal smoothing of decoded keypoints.
//!
//! Each keypoint channel keeps a bounded FIFO of its most recent
//! observations (present or absent). The smoothed value averages the
//! coordinates of the present observations.
//!
//! Note: confidence is accumulated as a **sum** over the present
//! observations, not a mean. A joint seen in every frame of the window
//! scores higher than one seen once. Keep it a sum.

use crate::core::point::PredictedPoint;
use std::collections::VecDeque;

/// Default number of frames in a smoothing window.
pub const DEFAULT_WINDOW: usize = 3;

/// Moving-average filter over one keypoint channel.
#[derive(Debug, Clone)]
pub struct MovingAverageFilter {
    elements: VecDeque<Option<PredictedPoint>>,
    limit: usize,
}

impl MovingAverageFilter {
    /// Create a filter holding at most `limit` observations.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is zero. A zero-length window is a programming
    /// error and must surface before any frame is processed.
    pub fn new(limit: usize) -> Self {
        assert!(limit > 0, "MovingAverageFilter limit must be greater than 0");
        Self {
            elements: VecDeque::with_capacity(limit + 1),
            limit,
        }
    }

    /// Append an observation, evicting the oldest beyond the limit.
    pub fn add(&mut self, element: Option<PredictedPoint>) {
        self.elements.push_back(element);
        while self.elements.len() > self.limit {
            self.elements.pop_front();
        }
    }

    /// Windowed average of the present observations.
    ///
    /// `x` and `y` are the coordinate-wise mean; `confidence` is the sum.
    /// Returns `None` when every observation in the window is absent.
    pub fn averaged_value(&self) -> Option<PredictedPoint> {
        let present: Vec<&PredictedPoint> = self.elements.iter().flatten().collect();
        if present.is_empty() {
            return None;
        }

        let count = present.len() as f64;
        let (sum_x, sum_y, sum_confidence) = present
            .iter()
            .fold((0.0, 0.0, 0.0), |(x, y, c), p| (x + p.x, y + p.y, c + p.confidence));

        Some(PredictedPoint::new(sum_x / count, sum_y / count, sum_confidence))
    }

    /// Observations currently in the window, oldest first.
    pub fn elements(&self) -> impl Iterator<Item = &Option<PredictedPoint>> {
        self.elements.iter()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Drop all observations, keeping the limit.
    pub fn reset(&mut self) {
        self.elements.clear();
    }
}

/// One [`MovingAverageFilter`] per keypoint channel.
///
/// The bank is rebuilt from scratch whenever a frame reports a different
/// number of channels than the previous one.
#[derive(Debug, Clone)]
pub struct KeypointSmoother {
    filters: Vec<MovingAverageFilter>,
    limit: usize,
}

impl KeypointSmoother {
    /// # Panics
    ///
    /// Panics if `limit` is zero, as [`MovingAverageFilter::new`] does.
    pub fn new(limit: usize) -> Self {
        assert!(limit > 0, "KeypointSmoother limit must be greater than 0");
        Self {
            filters: Vec::new(),
            limit,
        }
    }

    /// Feed one frame of decoded points and return the smoothed frame.
    pub fn smooth(&mut self, points: &[Option<PredictedPoint>]) -> Vec<Option<PredictedPoint>> {
        if points.len() != self.filters.len() {
            tracing::debug!(
                previous = self.filters.len(),
                current = points.len(),
                "Keypoint channel count changed, rebuilding smoothing filters"
            );
            self.filters = points
                .iter()
                .map(|_| MovingAverageFilter::new(self.limit))
                .collect();
        }

        for (point, filter) in points.iter().zip(self.filters.iter_mut()) {
            filter.add(*point);
        }

        self.filters.iter().map(|f| f.averaged_value()).collect()
    }

    /// Number of channels currently tracked.
    pub fn channel_count(&self) -> usize {
        self.filters.len()
    }

    pub fn filter(&self, channel: usize) -> Option<&MovingAverageFilter> {
        self.filters.get(channel)
    }

    pub fn reset(&mut self) {
        self.filters.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, c: f64) -> Option<PredictedPoint> {
        Some(PredictedPoint::new(x, y, c))
    }

    #[test]
    #[should_panic(expected = "greater than 0")]
    fn test_zero_limit_panics() {
        let _ = MovingAverageFilter::new(0);
    }

    #[test]
    fn test_window_grows_then_evicts_oldest() {
        let mut filter = MovingAverageFilter::new(3);

        filter.add(p(1.0, 0.0, 0.1));
        assert_eq!(filter.len(), 1);
        filter.add(None);
        assert_eq!(filter.len(), 2);
        filter.add(p(3.0, 0.0, 0.3));
        assert_eq!(filter.len(), 3);

        filter.add(p(4.0, 0.0, 0.4));
        filter.add(p(5.0, 0.0, 0.5));
        assert_eq!(filter.len(), 3);

        let xs: Vec<f64> = filter.elements().flatten().map(|p| p.x).collect();
        assert_eq!(xs, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_mean_coordinates_sum_confidence() {
        let mut filter = MovingAverageFilter::new(3);
        filter.add(p(0.0, 0.0, 0.5));
        filter.add(None);
        filter.add(p(2.0, 0.0, 0.7));

        let avg = filter.averaged_value().unwrap();
        assert!((avg.x - 1.0).abs() < 1e-9);
        assert!((avg.y - 0.0).abs() < 1e-9);
        assert!((avg.confidence - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_all_absent_window() {
        let mut filter = MovingAverageFilter::new(2);
        assert!(filter.averaged_value().is_none());

        filter.add(None);
        filter.add(None);
        assert!(filter.averaged_value().is_none());
    }

    #[test]
    fn test_absent_entries_age_out() {
        let mut filter = MovingAverageFilter::new(2);
        filter.add(p(0.2, 0.4, 0.9));
        filter.add(None);
        filter.add(None);
        assert!(filter.averaged_value().is_none());
    }

    #[test]
    fn test_smoother_rebuilds_on_channel_change() {
        let mut smoother = KeypointSmoother::new(3);

        let out = smoother.smooth(&[p(0.0, 0.0, 0.5), None]);
        assert_eq!(out.len(), 2);
        assert_eq!(smoother.channel_count(), 2);

        smoother.smooth(&[p(1.0, 1.0, 0.5), None]);
        assert_eq!(smoother.filter(0).unwrap().len(), 2);

        // Different channel count discards history
        let out = smoother.smooth(&[p(0.5, 0.5, 0.2), None, None]);
        assert_eq!(out.len(), 3);
        assert_eq!(smoother.filter(0).unwrap().len(), 1);
        assert_eq!(out[0], p(0.5, 0.5, 0.2));
    }

    #[test]
    fn test_smoother_per_channel_average() {
        let mut smoother = KeypointSmoother::new(2);
        smoother.smooth(&[p(0.2, 0.2, 0.4), p(0.8, 0.8, 0.1)]);
        let out = smoother.smooth(&[p(0.4, 0.6, 0.4), None]);

        let first = out[0].unwrap();
        assert!((first.x - 0.3).abs() < 1e-9);
        assert!((first.y - 0.4).abs() < 1e-9);
        assert!((first.confidence - 0.8).abs() < 1e-9);

        let second = out[1].unwrap();
        assert!((second.x - 0.8).abs() < 1e-9);
        assert!((second.confidence - 0.1).abs() < 1e-9);
    }
}
