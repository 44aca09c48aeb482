use super::StateSpace;
use crate::devices::LoadShiftPortfolio;
use crate::sim::clock::TimePeriod;
use crate::sim::series::TimeSeries;

/// A load-shifting state: how long load has been shifted and by how much.
///
/// States order by shift time first, then by energy state, matching their dense index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadShiftState {
    /// Periods the portfolio has been away from balance.
    pub shift_time: usize,
    /// Index of the shifted energy level.
    pub energy_state: usize,
}

impl LoadShiftState {
    pub const fn new(shift_time: usize, energy_state: usize) -> Self {
        Self {
            shift_time,
            energy_state,
        }
    }

    /// Energy state change from `initial` to `self`.
    pub fn delta_from(&self, initial: &LoadShiftState) -> i64 {
        self.energy_state as i64 - initial.energy_state as i64
    }

    /// A state is sensible iff it is balanced exactly when its shift time is zero.
    pub fn is_sensible(&self, zero_energy_index: usize) -> bool {
        (self.shift_time == 0) == (self.energy_state == zero_energy_index)
    }
}

/// Grid of `(shift_time, energy_state)` pairs with time-varying power-step limits.
#[derive(Debug, Clone)]
pub struct LoadShiftStateSpace {
    maximum_shift_time: usize,
    power_states: usize,
    energy_states: usize,
    zero_energy_index: usize,
    power_mw: f64,
    energy_resolution_mwh: f64,
    power_up_availability: TimeSeries,
    power_down_availability: TimeSeries,
    variable_shift_cost: TimeSeries,
}

impl LoadShiftStateSpace {
    /// Derives the grid from the fixed parameters of `portfolio`.
    pub fn new(portfolio: &LoadShiftPortfolio) -> Self {
        let res = portfolio.energy_resolution_mwh;
        let states_up = (portfolio.energy_limit_up_mwh / res).floor() as usize;
        let states_down = (portfolio.energy_limit_down_mwh / res).floor() as usize;
        Self {
            maximum_shift_time: portfolio.maximum_shift_time,
            power_states: (portfolio.power_mw / res).floor() as usize * 2 + 1,
            energy_states: states_up + states_down + 1,
            zero_energy_index: states_down,
            power_mw: portfolio.power_mw,
            energy_resolution_mwh: res,
            power_up_availability: portfolio.power_up_availability.clone(),
            power_down_availability: portfolio.power_down_availability.clone(),
            variable_shift_cost: portfolio.variable_shift_cost.clone(),
        }
    }

    pub fn maximum_shift_time(&self) -> usize {
        self.maximum_shift_time
    }

    pub fn number_of_power_states(&self) -> usize {
        self.power_states
    }

    pub fn number_of_energy_states(&self) -> usize {
        self.energy_states
    }

    /// Energy index of the balanced portfolio.
    pub fn zero_energy_index(&self) -> usize {
        self.zero_energy_index
    }

    /// Index of the transition that leaves the energy unchanged.
    pub fn zero_power_index(&self) -> usize {
        (self.power_states - 1) / 2
    }

    pub fn energy_resolution_mwh(&self) -> f64 {
        self.energy_resolution_mwh
    }

    /// Maximum state steps down and up within `period`.
    pub fn power_step_limits(&self, period: &TimePeriod) -> (usize, usize) {
        let time = period.start();
        let down = self.power_down_availability.value_earlier_equal(time) * self.power_mw;
        let up = self.power_up_availability.value_earlier_equal(time) * self.power_mw;
        (
            (down / self.energy_resolution_mwh).floor().max(0.0) as usize,
            (up / self.energy_resolution_mwh).floor().max(0.0) as usize,
        )
    }

    /// Inclusive range of energy states reachable from `initial` within `period`.
    pub fn final_state_bounds(&self, initial: &LoadShiftState, period: &TimePeriod) -> (usize, usize) {
        let (down, up) = self.power_step_limits(period);
        let lower = initial.energy_state.saturating_sub(down);
        let upper = (initial.energy_state + up).min(self.energy_states - 1);
        (lower, upper)
    }

    /// Nearest sensible grid state for a continuous energy level and shift time.
    ///
    /// Without room for an off-balance state (maximum shift time 1) this is the balanced state.
    pub fn nearest_state(&self, energy_level_mwh: f64, shift_time: usize) -> LoadShiftState {
        let balanced = LoadShiftState::new(0, self.zero_energy_index);
        let offset = (energy_level_mwh / self.energy_resolution_mwh).round();
        let energy_state = (offset + self.zero_energy_index as f64).clamp(0.0, (self.energy_states - 1) as f64) as usize;
        if energy_state == self.zero_energy_index || self.maximum_shift_time < 2 {
            return balanced;
        }
        LoadShiftState::new(shift_time.clamp(1, self.maximum_shift_time - 1), energy_state)
    }

    /// Shifted energy represented by `energy_state` (MWh).
    pub fn energy_of(&self, energy_state: usize) -> f64 {
        (energy_state as f64 - self.zero_energy_index as f64) * self.energy_resolution_mwh
    }

    fn next_shift_time(&self, initial: &LoadShiftState, final_energy: usize) -> usize {
        let zero = self.zero_energy_index;
        if final_energy == zero {
            0
        } else if (final_energy > zero && initial.energy_state < zero)
            || (final_energy < zero && initial.energy_state > zero)
        {
            1
        } else {
            initial.shift_time + 1
        }
    }

    /// Adds the options to reset the shift time to 1 by compensating the shifted load while
    /// shifting the same amount again, at variable cost for the compensated energy.
    fn insert_prolonging_states(
        &self,
        initial: &LoadShiftState,
        limits: (usize, usize),
        period: &TimePeriod,
        next: &mut Vec<(LoadShiftState, f64)>,
    ) {
        let difference = initial.energy_state.abs_diff(self.zero_energy_index);
        if difference == 0 {
            return;
        }
        let Some(remainder) = limits.0.min(limits.1).checked_sub(2 * difference) else {
            return;
        };
        let shifted_energy = 2.0 * difference as f64 * self.energy_resolution_mwh;
        let cost = self.variable_shift_cost.value_linear(period.start()) * shifted_energy;
        for additional in 0..=remainder {
            let energy_state = if initial.energy_state < self.zero_energy_index {
                initial.energy_state.saturating_sub(additional)
            } else {
                (initial.energy_state + additional).min(self.energy_states - 1)
            };
            insert_sorted(next, LoadShiftState::new(1, energy_state), cost);
        }
    }
}

/// Inserts or replaces `state` keeping `next` sorted by state.
fn insert_sorted(next: &mut Vec<(LoadShiftState, f64)>, state: LoadShiftState, cost: f64) {
    match next.binary_search_by(|(candidate, _)| candidate.cmp(&state)) {
        Ok(pos) => next[pos].1 = cost,
        Err(pos) => next.insert(pos, (state, cost)),
    }
}

impl StateSpace for LoadShiftStateSpace {
    type State = LoadShiftState;

    fn state_count(&self) -> usize {
        self.maximum_shift_time * self.energy_states
    }

    fn index_of(&self, state: LoadShiftState) -> usize {
        state.shift_time * self.energy_states + state.energy_state
    }

    fn initial_states(&self, states: &mut Vec<LoadShiftState>) {
        states.clear();
        for shift_time in 0..self.maximum_shift_time {
            for energy_state in 0..self.energy_states {
                let state = LoadShiftState::new(shift_time, energy_state);
                if state.is_sensible(self.zero_energy_index) {
                    states.push(state);
                }
            }
        }
    }

    fn next_states(
        &self,
        initial: LoadShiftState,
        period: &TimePeriod,
        is_last_period: bool,
        next: &mut Vec<(LoadShiftState, f64)>,
    ) {
        next.clear();
        if !is_last_period {
            let limits = self.power_step_limits(period);
            let (lower, upper) = self.final_state_bounds(&initial, period);
            for energy_state in lower..=upper {
                let shift_time = self.next_shift_time(&initial, energy_state);
                if shift_time < self.maximum_shift_time {
                    insert_sorted(next, LoadShiftState::new(shift_time, energy_state), 0.0);
                }
            }
            if initial.shift_time + 1 == self.maximum_shift_time {
                self.insert_prolonging_states(&initial, limits, period, next);
            }
        }
        let balanced = LoadShiftState::new(0, self.zero_energy_index);
        if next.binary_search_by(|(candidate, _)| candidate.cmp(&balanced)).is_err() {
            insert_sorted(next, balanced, 0.0);
        }
    }

    fn state_delta(&self, initial: LoadShiftState, target: LoadShiftState) -> i64 {
        target.delta_from(&initial)
    }

    fn is_feasible(&self, initial: LoadShiftState, target: LoadShiftState, period: &TimePeriod) -> bool {
        let (down, up) = self.power_step_limits(period);
        let delta = target.delta_from(&initial);
        delta >= -(down as i64) && delta <= up as i64
    }

    fn transition_cost(&self, initial: LoadShiftState, target: LoadShiftState, period: &TimePeriod) -> f64 {
        let energy = target.delta_from(&initial).unsigned_abs() as f64 * self.energy_resolution_mwh;
        self.variable_shift_cost.value_linear(period.start()) * energy
    }
}
