//! Error types raised while planning dispatch.

use thiserror::Error;

/// Failures of a planning cycle.
///
/// Missing forecasts are not errors; planning degrades to zero-valued periods instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanningError {
    /// Backward induction found no admissible final state. Indicates a broken state space.
    #[error("no feasible transition found for state {state} in period {period}")]
    NoFeasibleTransition { period: usize, state: String },

    /// Schedule arrays do not match the schedule duration.
    #[error("schedule array `{array}` has {actual} entries, expected {expected}")]
    ScheduleLength {
        array: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The execution window is longer than the optimisation horizon.
    #[error("schedule of {schedule} periods exceeds forecast horizon of {horizon} periods")]
    WindowExceedsHorizon { schedule: usize, horizon: usize },
}
