use tracing::debug;

use super::{Assessment, Optimiser, Planner, PlanningSettings, apply_bid_tolerance};
use crate::devices::{Device, StorageDevice};
use crate::error::PlanningError;
use crate::forecast::{ForecastCache, ForecastUpdateType};
use crate::sim::clock::TimePeriod;
use crate::sim::schedule::Schedule;
use crate::state::StorageStateSpace;

/// Plans storage dispatch by backward induction over discretised energy levels.
///
/// Self discharge is ignored during optimisation but tracked while building the schedule.
#[derive(Debug, Clone)]
pub struct StorageStrategist<A: Assessment> {
    settings: PlanningSettings,
    space: StorageStateSpace,
    optimiser: Optimiser<StorageStateSpace>,
    assessment: A,
    forecasts: ForecastCache,
}

impl<A: Assessment> StorageStrategist<A> {
    /// Creates a strategist for `device` with `transition_steps` states per full-power period.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError::WindowExceedsHorizon`] if the schedule is longer than the horizon.
    pub fn new(
        settings: PlanningSettings,
        device: &StorageDevice,
        transition_steps: usize,
        assessment: A,
        update_type: ForecastUpdateType,
    ) -> Result<Self, PlanningError> {
        settings.check()?;
        let space = StorageStateSpace::new(device, transition_steps);
        let optimiser = Optimiser::new(&space, settings.forecast_periods);
        Ok(Self {
            settings,
            space,
            optimiser,
            assessment,
            forecasts: ForecastCache::new(update_type),
        })
    }

    pub fn state_space(&self) -> &StorageStateSpace {
        &self.space
    }

    pub fn optimiser(&self) -> &Optimiser<StorageStateSpace> {
        &self.optimiser
    }

    /// Walks the policy from the device's actual energy and returns
    /// `(energy deltas, planned prices, expected energies)`.
    fn walk_policy(
        &mut self,
        first: TimePeriod,
        device: &StorageDevice,
    ) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>), PlanningError> {
        let periods = self.settings.schedule_periods;
        let eps = self.space.energy_per_state_mwh();
        let mut demand = Vec::with_capacity(periods);
        let mut prices = Vec::with_capacity(periods);
        let mut expected = Vec::with_capacity(periods);

        let energy = device.energy_level_mwh();
        let mut state = self.space.nearest_state(energy);
        let mut surplus = self.space.deviation_mwh(energy, state);

        for period in 0..periods {
            let initial_energy = device.within_energy_bounds(eps * state as f64 + surplus);
            expected.push(initial_energy);

            let next = self
                .optimiser
                .best_next_state(&self.space, period, state)
                .ok_or_else(|| PlanningError::NoFeasibleTransition {
                    period,
                    state: state.to_string(),
                })?;
            let self_discharge = device.self_discharge_mwh(initial_energy);
            let next_energy = device.within_energy_bounds(next as f64 * eps + surplus - self_discharge);
            let external = device.internal_to_external(next_energy - initial_energy + self_discharge);

            let time_period = first.shift_by(period as i64);
            self.assessment
                .prepare_for(&time_period, self.forecasts.get(&time_period));
            prices.push(self.assessment.bid_price(next as i64 - state as i64, external));
            demand.push(external);

            state = self.space.nearest_state(next_energy);
            surplus = self.space.deviation_mwh(next_energy, state);
        }
        Ok((demand, prices, expected))
    }
}

/// Re-derives energies along the planned path, clamping each step to the capacity.
fn correct_for_rounding_errors(device: &StorageDevice, initial_energy: f64, demand: &mut [f64], expected: &mut [f64]) {
    let mut energy = initial_energy;
    for (delta, expected) in demand.iter_mut().zip(expected.iter_mut()) {
        *expected = energy;
        let self_discharge = device.self_discharge_mwh(energy);
        let next = device.within_energy_bounds(energy - self_discharge + device.external_to_internal(*delta));
        *delta = device.internal_to_external(next - energy + self_discharge);
        energy = next;
    }
}

impl<A: Assessment> Planner for StorageStrategist<A> {
    type Asset = StorageDevice;

    fn settings(&self) -> &PlanningSettings {
        &self.settings
    }

    fn forecasts(&self) -> &ForecastCache {
        &self.forecasts
    }

    fn forecasts_mut(&mut self) -> &mut ForecastCache {
        &mut self.forecasts
    }

    fn create_schedule(&mut self, first: TimePeriod, device: &StorageDevice) -> Result<Schedule, PlanningError> {
        self.optimiser
            .optimise(&self.space, &mut self.assessment, first, &self.forecasts)?;
        let (mut demand, prices, mut expected) = self.walk_policy(first, device)?;
        correct_for_rounding_errors(device, device.energy_level_mwh(), &mut demand, &mut expected);
        let bids = apply_bid_tolerance(&demand, &prices, self.settings.bid_tolerance);
        debug!(
            start = first.start().0,
            periods = demand.len(),
            net_energy_mwh = demand.iter().sum::<f64>(),
            "storage schedule created"
        );
        Schedule::new(first, demand, bids, expected)
    }
}
