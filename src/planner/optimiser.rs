//! Backward induction over a discretised state space.

use tracing::debug;

use super::{Assessment, PENALTY};
use crate::error::PlanningError;
use crate::forecast::ForecastCache;
use crate::sim::clock::TimePeriod;
use crate::state::StateSpace;

/// Value and policy tables of one state space over a fixed horizon.
///
/// Tables are allocated once and refilled on every call to [`Optimiser::optimise`].
#[derive(Debug, Clone)]
pub struct Optimiser<S: StateSpace> {
    horizon: usize,
    state_count: usize,
    values: Vec<f64>,
    policy: Vec<Option<S::State>>,
    initial_states: Vec<S::State>,
    candidates: Vec<(S::State, f64)>,
}

impl<S: StateSpace> Optimiser<S> {
    /// Allocates tables for `horizon` periods of `space`.
    pub fn new(space: &S, horizon: usize) -> Self {
        let state_count = space.state_count();
        Self {
            horizon,
            state_count,
            values: vec![0.0; horizon * state_count],
            policy: vec![None; horizon * state_count],
            initial_states: Vec::with_capacity(state_count),
            candidates: Vec::new(),
        }
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Runs backward induction from the last horizon period down to `first`.
    ///
    /// # Arguments
    ///
    /// * `space` - State space the tables were allocated for
    /// * `assessment` - Objective valuing each transition
    /// * `first` - First period of the horizon
    /// * `forecasts` - Sensitivities per period; missing ones are valued as zero
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError::NoFeasibleTransition`] if some initial state has no candidate.
    pub fn optimise<A: Assessment + ?Sized>(
        &mut self,
        space: &S,
        assessment: &mut A,
        first: TimePeriod,
        forecasts: &ForecastCache,
    ) -> Result<(), PlanningError> {
        self.values.fill(0.0);
        self.policy.fill(None);
        let target = assessment.target();

        for period in (0..self.horizon).rev() {
            let time_period = first.shift_by(period as i64);
            assessment.prepare_for(&time_period, forecasts.get(&time_period));
            let is_last_period = period + 1 == self.horizon;
            space.initial_states(&mut self.initial_states);

            for &initial in &self.initial_states {
                space.next_states(initial, &time_period, is_last_period, &mut self.candidates);
                let mut best: Option<(f64, S::State)> = None;
                for &(candidate_state, fixed_cost) in &self.candidates {
                    let candidate = if space.is_feasible(initial, candidate_state, &time_period) {
                        let transition = assessment.value_of(space.state_delta(initial, candidate_state));
                        if transition.is_nan() {
                            target.penalty()
                        } else {
                            let cost = space.transition_cost(initial, candidate_state, &time_period) + fixed_cost;
                            let future = if is_last_period {
                                0.0
                            } else {
                                self.values[(period + 1) * self.state_count + space.index_of(candidate_state)]
                            };
                            bounded(bounded(transition + target.charge(cost)) + future)
                        }
                    } else {
                        target.penalty()
                    };
                    if best.is_none_or(|(value, _)| target.is_better(candidate, value)) {
                        best = Some((candidate, candidate_state));
                    }
                }
                let Some((value, state)) = best else {
                    return Err(PlanningError::NoFeasibleTransition {
                        period,
                        state: format!("{initial:?}"),
                    });
                };
                let slot = period * self.state_count + space.index_of(initial);
                self.values[slot] = value;
                self.policy[slot] = Some(state);
            }
        }

        debug!(
            horizon = self.horizon,
            states = self.state_count,
            "backward induction finished"
        );
        Ok(())
    }

    /// State chosen by the policy in `period` when in `state`.
    pub fn best_next_state(&self, space: &S, period: usize, state: S::State) -> Option<S::State> {
        self.slot(space, period, state).and_then(|slot| self.policy[slot])
    }

    /// Best cumulative objective from `state` in `period` to the horizon end.
    pub fn best_value(&self, space: &S, period: usize, state: S::State) -> Option<f64> {
        self.slot(space, period, state).map(|slot| self.values[slot])
    }

    fn slot(&self, space: &S, period: usize, state: S::State) -> Option<usize> {
        let index = space.index_of(state);
        (period < self.horizon && index < self.state_count).then(|| period * self.state_count + index)
    }
}

/// Clamps accumulated objective values so sentinel penalties never overflow.
fn bounded(value: f64) -> f64 {
    value.clamp(-PENALTY, PENALTY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::StorageDevice;
    use crate::planner::Target;
    use crate::sensitivity::Sensitivity;
    use crate::sim::clock::TimeStamp;
    use crate::state::StorageStateSpace;

    /// Values a step at minus the point price per state step.
    struct UnitPrice {
        target: Target,
        price: f64,
    }

    impl Assessment for UnitPrice {
        fn target(&self) -> Target {
            self.target
        }

        fn prepare_for(&mut self, _period: &TimePeriod, sensitivity: Option<&Sensitivity>) {
            self.price = sensitivity.map_or(0.0, Sensitivity::point_price);
        }

        fn value_of(&self, state_delta: i64) -> f64 {
            match self.target {
                Target::Maximise => -(state_delta as f64) * self.price,
                Target::Minimise => state_delta as f64 * self.price,
            }
        }

        fn bid_price(&self, _state_delta: i64, _external_energy_mwh: f64) -> f64 {
            self.price
        }
    }

    fn setup(prices: &[f64]) -> (StorageStateSpace, ForecastCache, TimePeriod) {
        let device = StorageDevice::new(2.0, 1.0, 0.0, 1.0, 1.0, 0.0);
        let space = StorageStateSpace::new(&device, 1);
        let first = TimePeriod::hourly(TimeStamp(0));
        let mut cache = ForecastCache::default();
        for (i, price) in prices.iter().enumerate() {
            cache.store(first.shift_by(i as i64), Sensitivity::PricePoint(*price));
        }
        (space, cache, first)
    }

    #[test]
    fn buys_low_sells_high() {
        let (space, cache, first) = setup(&[10.0, 50.0]);
        let mut optimiser = Optimiser::new(&space, 2);
        let mut assessment = UnitPrice {
            target: Target::Maximise,
            price: 0.0,
        };
        optimiser.optimise(&space, &mut assessment, first, &cache).unwrap();
        assert_eq!(optimiser.best_next_state(&space, 0, 0), Some(1));
        assert_eq!(optimiser.best_next_state(&space, 1, 1), Some(0));
        assert_eq!(optimiser.best_value(&space, 0, 0), Some(40.0));
    }

    #[test]
    fn ties_keep_lowest_state() {
        let (space, cache, first) = setup(&[0.0, 0.0]);
        let mut optimiser = Optimiser::new(&space, 2);
        let mut assessment = UnitPrice {
            target: Target::Maximise,
            price: 0.0,
        };
        optimiser.optimise(&space, &mut assessment, first, &cache).unwrap();
        assert_eq!(optimiser.best_next_state(&space, 0, 1), Some(0));
    }

    #[test]
    fn minimise_mirrors_maximise() {
        let (space, cache, first) = setup(&[10.0, 50.0]);
        let mut optimiser = Optimiser::new(&space, 2);
        let mut assessment = UnitPrice {
            target: Target::Minimise,
            price: 0.0,
        };
        optimiser.optimise(&space, &mut assessment, first, &cache).unwrap();
        assert_eq!(optimiser.best_next_state(&space, 0, 0), Some(1));
        assert_eq!(optimiser.best_value(&space, 0, 0), Some(-40.0));
    }

    #[test]
    fn missing_forecasts_plan_idle() {
        let (space, _, first) = setup(&[]);
        let mut optimiser = Optimiser::new(&space, 3);
        let mut assessment = UnitPrice {
            target: Target::Maximise,
            price: 0.0,
        };
        optimiser
            .optimise(&space, &mut assessment, first, &ForecastCache::default())
            .unwrap();
        assert_eq!(optimiser.best_value(&space, 0, 2), Some(0.0));
        assert_eq!(optimiser.best_next_state(&space, 3, 0), None);
    }
}
