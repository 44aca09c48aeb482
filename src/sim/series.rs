//! Piecewise time series for availability, cost and baseline profiles.

use super::clock::{TimePeriod, TimeStamp};

/// A time series of values at sorted time stamps.
///
/// Lookups outside the covered range return the nearest boundary value.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    points: Vec<(TimeStamp, f64)>,
}

impl TimeSeries {
    /// Creates a series holding `value` at all times.
    pub fn constant(value: f64) -> Self {
        Self {
            points: vec![(TimeStamp(0), value)],
        }
    }

    /// Creates a series from arbitrary points; points are sorted by time.
    ///
    /// # Panics
    ///
    /// Panics if `points` is empty.
    pub fn from_points(mut points: Vec<(TimeStamp, f64)>) -> Self {
        assert!(!points.is_empty(), "time series needs at least one point");
        points.sort_by_key(|(time, _)| *time);
        Self { points }
    }

    /// Creates a series with one value per period, starting at `first`.
    ///
    /// An empty `values` slice yields a constant zero series.
    pub fn from_periods(first: TimePeriod, values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::constant(0.0);
        }
        let points = values
            .iter()
            .enumerate()
            .map(|(i, v)| (first.shift_by(i as i64).start(), *v))
            .collect();
        Self { points }
    }

    /// Value of the last point at or before `time`.
    pub fn value_earlier_equal(&self, time: TimeStamp) -> f64 {
        let idx = self.points.partition_point(|(t, _)| *t <= time);
        if idx == 0 {
            self.points[0].1
        } else {
            self.points[idx - 1].1
        }
    }

    /// Linearly interpolated value at `time`.
    pub fn value_linear(&self, time: TimeStamp) -> f64 {
        let idx = self.points.partition_point(|(t, _)| *t <= time);
        if idx == 0 {
            return self.points[0].1;
        }
        if idx == self.points.len() {
            return self.points[idx - 1].1;
        }
        let (t0, v0) = self.points[idx - 1];
        let (t1, v1) = self.points[idx];
        let share = (time.0 - t0.0) as f64 / (t1.0 - t0.0) as f64;
        v0 + (v1 - v0) * share
    }
}
