use tracing::warn;

use super::StateSpace;
use crate::devices::StorageDevice;
use crate::sim::clock::TimePeriod;
use crate::sim::series::TimeSeries;

/// Relative capacity deviation above which the discretisation error is reported.
const DISCRETISATION_TOLERANCE: f64 = 1e-6;
/// Slack for availability shares that land just below a whole number of steps.
const STEP_TOLERANCE: f64 = 1e-9;

/// Storage states: internal energy levels `0..N` spaced by the energy of one charging step.
///
/// One period at full internal power moves the storage by `transition_steps` states. Reduced
/// charge or discharge availability in a period shrinks the reachable range on that side only.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageStateSpace {
    transition_steps: usize,
    energy_states: usize,
    energy_per_state_mwh: f64,
    capacity_mwh: f64,
    charge_availability: TimeSeries,
    discharge_availability: TimeSeries,
}

impl StorageStateSpace {
    /// Discretises `device` with `transition_steps` states per period at full power.
    ///
    /// The state count is rounded to the nearest integer; if the modelled capacity deviates from
    /// the device capacity the error is logged.
    ///
    /// # Panics
    ///
    /// Panics if `transition_steps` is zero.
    pub fn new(device: &StorageDevice, transition_steps: usize) -> Self {
        assert!(transition_steps > 0, "transition steps must be > 0");
        let energy_states = number_of_energy_states(device.energy_to_power_ratio, transition_steps);
        let energy_per_state_mwh = device.internal_power_mw / transition_steps as f64;
        let capacity_mwh = device.capacity_mwh();

        let modelled = (energy_states - 1) as f64 * energy_per_state_mwh;
        let deviation = modelled - capacity_mwh;
        if deviation.abs() > DISCRETISATION_TOLERANCE * capacity_mwh.max(1.0) {
            warn!(
                energy_states,
                modelled_capacity_mwh = modelled,
                capacity_mwh,
                deviation_mwh = deviation,
                "storage discretisation deviates from configured capacity"
            );
        }

        Self {
            transition_steps,
            energy_states,
            energy_per_state_mwh,
            capacity_mwh,
            charge_availability: device.charge_availability.clone(),
            discharge_availability: device.discharge_availability.clone(),
        }
    }

    pub fn transition_steps(&self) -> usize {
        self.transition_steps
    }

    pub fn energy_states(&self) -> usize {
        self.energy_states
    }

    /// Internal energy represented by one state step (MWh).
    pub fn energy_per_state_mwh(&self) -> f64 {
        self.energy_per_state_mwh
    }

    pub fn capacity_mwh(&self) -> f64 {
        self.capacity_mwh
    }

    /// Nearest discrete state of an internal energy level, clamped to the grid.
    pub fn nearest_state(&self, energy_mwh: f64) -> usize {
        if self.energy_per_state_mwh <= 0.0 {
            return 0;
        }
        let rounded = (energy_mwh / self.energy_per_state_mwh).round();
        rounded.clamp(0.0, (self.energy_states - 1) as f64) as usize
    }

    /// Energy of `energy_mwh` not represented by `state`.
    pub fn deviation_mwh(&self, energy_mwh: f64, state: usize) -> f64 {
        energy_mwh - state as f64 * self.energy_per_state_mwh
    }

    /// Maximum number of state steps `(down, up)` the storage can move during `period`.
    pub fn power_step_limits(&self, period: &TimePeriod) -> (usize, usize) {
        let start = period.start();
        (
            self.steps_at(self.discharge_availability.value_earlier_equal(start)),
            self.steps_at(self.charge_availability.value_earlier_equal(start)),
        )
    }

    fn steps_at(&self, availability: f64) -> usize {
        let steps = (availability.clamp(0.0, 1.0) * self.transition_steps as f64 + STEP_TOLERANCE).floor();
        (steps as usize).min(self.transition_steps)
    }

    /// Inclusive range of states reachable from `initial` within `period`.
    pub fn final_state_bounds(&self, initial: usize, period: &TimePeriod) -> (usize, usize) {
        let (down, up) = self.power_step_limits(period);
        let lower = initial.saturating_sub(down);
        let upper = (initial + up).min(self.energy_states - 1);
        (lower, upper)
    }
}

/// `transition_steps * energy_to_power_ratio + 1`, rounded to the nearest integer.
fn number_of_energy_states(energy_to_power_ratio: f64, transition_steps: usize) -> usize {
    (transition_steps as f64 * energy_to_power_ratio).round().max(0.0) as usize + 1
}

impl StateSpace for StorageStateSpace {
    type State = usize;

    fn state_count(&self) -> usize {
        self.energy_states
    }

    fn index_of(&self, state: usize) -> usize {
        state
    }

    fn initial_states(&self, states: &mut Vec<usize>) {
        states.clear();
        states.extend(0..self.energy_states);
    }

    fn next_states(&self, initial: usize, period: &TimePeriod, _is_last_period: bool, next: &mut Vec<(usize, f64)>) {
        next.clear();
        let (lower, upper) = self.final_state_bounds(initial, period);
        next.extend((lower..=upper).map(|state| (state, 0.0)));
    }

    fn state_delta(&self, initial: usize, target: usize) -> i64 {
        target as i64 - initial as i64
    }

    fn is_feasible(&self, initial: usize, target: usize, period: &TimePeriod) -> bool {
        let (lower, upper) = self.final_state_bounds(initial, period);
        (lower..=upper).contains(&target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::clock::TimeStamp;

    fn device(ratio: f64, power: f64) -> StorageDevice {
        StorageDevice::new(ratio, power, 0.0, 1.0, 1.0, 0.0)
    }

    #[test]
    fn state_count_follows_ratio_and_steps() {
        let space = StorageStateSpace::new(&device(4.0, 1.0), 1);
        assert_eq!(space.energy_states(), 5);
        assert_eq!(space.energy_per_state_mwh(), 1.0);

        let fine = StorageStateSpace::new(&device(4.0, 2.0), 4);
        assert_eq!(fine.energy_states(), 17);
        assert_eq!(fine.energy_per_state_mwh(), 0.5);
    }

    #[test]
    fn state_count_rounds_to_nearest() {
        let space = StorageStateSpace::new(&device(2.3, 1.0), 2);
        assert_eq!(space.energy_states(), 6);
    }

    #[test]
    fn zero_ratio_gives_single_state() {
        let space = StorageStateSpace::new(&device(0.0, 1.0), 3);
        assert_eq!(space.energy_states(), 1);
        assert_eq!(space.final_state_bounds(0, &TimePeriod::hourly(TimeStamp(0))), (0, 0));
    }

    #[test]
    fn bounds_are_clipped_to_grid() {
        let space = StorageStateSpace::new(&device(4.0, 1.0), 2);
        let period = TimePeriod::hourly(TimeStamp(0));
        assert_eq!(space.final_state_bounds(0, &period), (0, 2));
        assert_eq!(space.final_state_bounds(4, &period), (2, 6));
        assert_eq!(space.final_state_bounds(8, &period), (6, 8));
    }

    #[test]
    fn reduced_charge_availability_narrows_upper_bound_in_that_period() {
        let first = TimePeriod::hourly(TimeStamp(0));
        let charge = TimeSeries::from_periods(first, &[1.0, 0.5, 0.0]);
        let storage = device(4.0, 1.0).with_availability(charge, TimeSeries::constant(1.0));
        let space = StorageStateSpace::new(&storage, 2);

        assert_eq!(space.power_step_limits(&first), (2, 2));
        assert_eq!(space.final_state_bounds(4, &first.shift_by(1)), (2, 5));
        assert_eq!(space.final_state_bounds(4, &first.shift_by(2)), (2, 4));
        assert!(!space.is_feasible(4, 6, &first.shift_by(1)));
        assert!(space.is_feasible(4, 2, &first.shift_by(1)));

        let mut next = Vec::new();
        space.next_states(4, &first.shift_by(2), false, &mut next);
        assert_eq!(next, vec![(2, 0.0), (3, 0.0), (4, 0.0)]);
    }

    #[test]
    fn nearest_state_is_clamped() {
        let space = StorageStateSpace::new(&device(4.0, 1.0), 1);
        assert_eq!(space.nearest_state(2.4), 2);
        assert_eq!(space.nearest_state(2.6), 3);
        assert_eq!(space.nearest_state(-1.0), 0);
        assert_eq!(space.nearest_state(100.0), 4);
        assert!((space.deviation_mwh(2.4, 2) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn next_states_cover_bounds_in_order() {
        let space = StorageStateSpace::new(&device(4.0, 1.0), 1);
        let mut next = Vec::new();
        let period = TimePeriod::hourly(TimeStamp(0));
        space.next_states(2, &period, false, &mut next);
        assert_eq!(next, vec![(1, 0.0), (2, 0.0), (3, 0.0)]);
        assert!(space.is_feasible(2, 3, &period));
        assert!(!space.is_feasible(2, 4, &period));
    }
}
