//! Dispatch planners: objective functions, the backward-induction core and the strategists
//! turning its policy into schedules.

use serde::Deserialize;

use crate::devices::Device;
use crate::error::PlanningError;
use crate::forecast::ForecastCache;
use crate::sensitivity::Sensitivity;
use crate::sim::clock::TimePeriod;
use crate::sim::schedule::Schedule;

/// Storage objective functions.
pub mod assessment;
/// Price-median heuristic without dynamic programming.
pub mod heuristic;
/// Load-shifting strategist and its objective functions.
pub mod load_shift;
pub mod optimiser;
/// Storage strategist.
pub mod storage;

pub use assessment::{MaxProfit, MaxProfitPriceTaker, MinSystemCost};
pub use heuristic::{HeuristicMedian, Polynomial};
pub use load_shift::{LoadShiftStrategist, ShiftMaxProfit, ShiftMaxProfitTariff, ShiftMinSystemCost};
pub use optimiser::Optimiser;
pub use storage::StorageStrategist;

/// Highest admissible market price (EUR/MWh).
pub const SCARCITY_PRICE: f64 = 3000.0;
/// Lowest admissible market price (EUR/MWh).
pub const MINIMAL_PRICE: f64 = -500.0;
/// Objective value of an infeasible transition.
///
/// Every objective value is clamped to `[-PENALTY, PENALTY]` before it is accumulated.
pub const PENALTY: f64 = 1e200;

/// Direction of an objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Maximise,
    Minimise,
}

impl Target {
    /// Returns true if `candidate` strictly improves on `best`.
    pub fn is_better(self, candidate: f64, best: f64) -> bool {
        match self {
            Self::Maximise => candidate > best,
            Self::Minimise => candidate < best,
        }
    }

    /// Objective value assigned to infeasible transitions.
    pub fn penalty(self) -> f64 {
        match self {
            Self::Maximise => -PENALTY,
            Self::Minimise => PENALTY,
        }
    }

    /// Signs a cost so that it worsens the objective.
    pub fn charge(self, cost: f64) -> f64 {
        match self {
            Self::Maximise => -cost,
            Self::Minimise => cost,
        }
    }
}

/// Values a single transition of a discretised asset.
///
/// Implementations cache per-period data in [`Assessment::prepare_for`] and then answer
/// queries for every transition of that period.
pub trait Assessment {
    fn target(&self) -> Target;

    /// Loads the forecast of `period`; a missing sensitivity yields zero values.
    fn prepare_for(&mut self, period: &TimePeriod, sensitivity: Option<&Sensitivity>);

    /// Objective value of changing the energy state by `state_delta` in the prepared period.
    fn value_of(&self, state_delta: i64) -> f64;

    /// Price to bid for a transition in the prepared period.
    ///
    /// NaN signals that no price preference exists.
    fn bid_price(&self, state_delta: i64, external_energy_mwh: f64) -> f64;
}

/// Settings shared by all planners.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlanningSettings {
    /// Periods covered by the optimisation.
    pub forecast_periods: usize,
    /// Periods committed per schedule.
    pub schedule_periods: usize,
    /// Safety margin added to charging and subtracted from discharging bids (EUR/MWh).
    pub bid_tolerance: f64,
}

impl Default for PlanningSettings {
    fn default() -> Self {
        Self {
            forecast_periods: 24,
            schedule_periods: 12,
            bid_tolerance: 1e-3,
        }
    }
}

impl PlanningSettings {
    /// Ensures the execution window fits into the horizon.
    pub fn check(&self) -> Result<(), PlanningError> {
        if self.schedule_periods == 0 || self.schedule_periods > self.forecast_periods {
            return Err(PlanningError::WindowExceedsHorizon {
                schedule: self.schedule_periods,
                horizon: self.forecast_periods,
            });
        }
        Ok(())
    }
}

/// A strategist owning forecasts that plans schedules for one asset.
pub trait Planner {
    type Asset: Device;

    fn settings(&self) -> &PlanningSettings;

    fn forecasts(&self) -> &ForecastCache;

    fn forecasts_mut(&mut self) -> &mut ForecastCache;

    /// Plans a new schedule starting at `first` from the asset's current state.
    fn create_schedule(&mut self, first: TimePeriod, asset: &Self::Asset) -> Result<Schedule, PlanningError>;
}

/// Turns planned prices into bids with a safety margin within the market price limits.
///
/// Charging bids rise by `tolerance`, discharging bids fall by it, and periods without demand
/// bid zero.
pub fn apply_bid_tolerance(demand_mwh: &[f64], prices: &[f64], tolerance: f64) -> Vec<f64> {
    demand_mwh
        .iter()
        .zip(prices)
        .map(|(demand, price)| {
            if *demand > 0.0 {
                SCARCITY_PRICE.min(price + tolerance)
            } else if *demand < 0.0 {
                MINIMAL_PRICE.max(price - tolerance)
            } else {
                0.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bids_respect_limits() {
        let bids = apply_bid_tolerance(&[1.0, -1.0, 0.0, 1.0, -1.0], &[50.0, 50.0, 50.0, 5000.0, -900.0], 0.5);
        assert_eq!(bids, vec![50.5, 49.5, 0.0, SCARCITY_PRICE, MINIMAL_PRICE]);
    }

    #[test]
    fn nan_prices_fall_back_to_limits() {
        let bids = apply_bid_tolerance(&[1.0, -1.0, 0.0], &[f64::NAN, f64::NAN, f64::NAN], 0.0);
        assert_eq!(bids, vec![SCARCITY_PRICE, MINIMAL_PRICE, 0.0]);
    }

    #[test]
    fn target_orders_candidates() {
        assert!(Target::Maximise.is_better(2.0, 1.0));
        assert!(!Target::Maximise.is_better(1.0, 1.0));
        assert!(Target::Minimise.is_better(1.0, 2.0));
        assert_eq!(Target::Minimise.charge(3.0), 3.0);
        assert_eq!(Target::Maximise.penalty(), -PENALTY);
    }

    #[test]
    fn window_must_fit_horizon() {
        let settings = PlanningSettings {
            forecast_periods: 4,
            schedule_periods: 5,
            bid_tolerance: 0.0,
        };
        assert!(settings.check().is_err());
        assert!(PlanningSettings::default().check().is_ok());
    }
}
