//! Discretised state spaces shared by the dynamic-programming planners.

use std::fmt::Debug;

use crate::sim::clock::TimePeriod;

/// Load-shifting grid of shift time and energy state.
pub mod load_shift;
/// Single energy-level index for storage devices.
pub mod storage;

pub use load_shift::{LoadShiftState, LoadShiftStateSpace};
pub use storage::StorageStateSpace;

/// A bounded, discretised state representation of one asset class.
///
/// Implementations are built once from fixed asset parameters; only the per-period
/// transition bounds may depend on time.
pub trait StateSpace {
    /// Discrete state type.
    type State: Copy + Eq + Debug;

    /// Number of slots needed to index every state of the grid.
    fn state_count(&self) -> usize;

    /// Dense index of `state` in `0..state_count()`.
    fn index_of(&self, state: Self::State) -> usize;

    /// Clears `states` and fills it with every admissible initial state in ascending index order.
    fn initial_states(&self, states: &mut Vec<Self::State>);

    /// Clears `next` and fills it with the candidate final states of a transition starting in
    /// `initial` during `period`, each paired with a fixed cost of choosing it.
    ///
    /// Candidates are listed in ascending index order. The list is never empty.
    fn next_states(
        &self,
        initial: Self::State,
        period: &TimePeriod,
        is_last_period: bool,
        next: &mut Vec<(Self::State, f64)>,
    );

    /// Signed change of the energy index from `initial` to `target`.
    fn state_delta(&self, initial: Self::State, target: Self::State) -> i64;

    /// Returns true if the transition respects the power limits of `period`.
    fn is_feasible(&self, initial: Self::State, target: Self::State, period: &TimePeriod) -> bool;

    /// Variable cost charged for moving from `initial` to `target` in `period`.
    fn transition_cost(&self, _initial: Self::State, _target: Self::State, _period: &TimePeriod) -> f64 {
        0.0
    }
}
