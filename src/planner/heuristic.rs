use std::ops::Range;

use serde::Deserialize;
use tracing::debug;

use super::{Planner, PlanningSettings};
use crate::devices::{Device, StorageDevice};
use crate::error::PlanningError;
use crate::forecast::{ForecastCache, ForecastUpdateType};
use crate::sensitivity::Sensitivity;
use crate::sim::clock::TimePeriod;
use crate::sim::schedule::Schedule;

/// Energy below which a distribution is considered complete (MWh).
const DISTRIBUTION_TOLERANCE: f64 = 1e-9;

/// A polynomial with coefficients in ascending order of degree.
///
/// # Examples
///
/// ```
/// use flex_dispatch::planner::Polynomial;
///
/// let p = Polynomial::new(vec![1.0, 0.0, 2.0]);
/// assert_eq!(p.evaluate_at(3.0), 19.0);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Polynomial {
    coefficients: Vec<f64>,
}

impl Polynomial {
    pub fn new(coefficients: Vec<f64>) -> Self {
        Self { coefficients }
    }

    pub fn evaluate_at(&self, x: f64) -> f64 {
        let mut value = 0.0;
        let mut power = 1.0;
        for coefficient in &self.coefficients {
            value += coefficient * power;
            power *= x;
        }
        value
    }
}

impl Default for Polynomial {
    /// Weight proportional to the price distance.
    fn default() -> Self {
        Self::new(vec![0.0, 1.0])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Charge,
    Discharge,
    Idle,
}

impl Action {
    /// Returns true if moving from `self` to `next` closes the current interval.
    fn is_finalised_by(self, next: Action) -> bool {
        match self {
            Self::Idle => next != Self::Idle,
            Self::Charge => next == Self::Discharge,
            Self::Discharge => next == Self::Charge,
        }
    }
}

/// Storage dispatch heuristic around the forecast price median.
///
/// Charges where prices fall below the median minus a loss margin and discharges where they
/// exceed the median plus that margin. Within each contiguous interval, energy is distributed
/// proportionally to a polynomial of the price distance to the margin.
#[derive(Debug, Clone)]
pub struct HeuristicMedian {
    settings: PlanningSettings,
    assessment_function: Polynomial,
    forecasts: ForecastCache,
    forecast_prices: Vec<f64>,
    assessment_values: Vec<f64>,
    internal_energy_mwh: Vec<f64>,
    power_limits: Vec<f64>,
    price_median: f64,
    max_charge_price: f64,
    min_discharge_price: f64,
}

impl HeuristicMedian {
    /// # Errors
    ///
    /// Returns [`PlanningError::WindowExceedsHorizon`] if the schedule is longer than the horizon.
    pub fn new(
        settings: PlanningSettings,
        assessment_function: Polynomial,
        update_type: ForecastUpdateType,
    ) -> Result<Self, PlanningError> {
        settings.check()?;
        let horizon = settings.forecast_periods;
        Ok(Self {
            settings,
            assessment_function,
            forecasts: ForecastCache::new(update_type),
            forecast_prices: vec![0.0; horizon],
            assessment_values: vec![0.0; horizon],
            internal_energy_mwh: vec![0.0; horizon],
            power_limits: vec![0.0; horizon],
            price_median: 0.0,
            max_charge_price: 0.0,
            min_discharge_price: 0.0,
        })
    }

    pub fn price_median(&self) -> f64 {
        self.price_median
    }

    /// Highest price at which charging is planned.
    pub fn max_charge_price(&self) -> f64 {
        self.max_charge_price
    }

    /// Lowest price at which discharging is planned.
    pub fn min_discharge_price(&self) -> f64 {
        self.min_discharge_price
    }

    fn update_price_forecast(&mut self, first: TimePeriod) {
        for (period, price) in self.forecast_prices.iter_mut().enumerate() {
            let time_period = first.shift_by(period as i64);
            *price = self
                .forecasts
                .get(&time_period)
                .map_or(0.0, Sensitivity::point_price);
        }
    }

    fn update_price_limits(&mut self, round_trip_efficiency: f64) {
        self.price_median = median(&self.forecast_prices);
        let loss_margin = self.price_median * (1.0 - round_trip_efficiency) / (1.0 + round_trip_efficiency);
        self.max_charge_price = self.price_median - loss_margin;
        self.min_discharge_price = self.price_median + loss_margin;
    }

    fn update_assessment_values(&mut self) {
        for (price, value) in self.forecast_prices.iter().zip(self.assessment_values.iter_mut()) {
            let raw = if *price < self.max_charge_price {
                self.assessment_function.evaluate_at(self.max_charge_price - price)
            } else if *price > self.min_discharge_price {
                self.assessment_function.evaluate_at(price - self.min_discharge_price)
            } else {
                0.0
            };
            *value = raw.max(0.0);
        }
    }

    fn action_in(&self, period: usize) -> Action {
        let price = self.forecast_prices[period];
        let value = self.assessment_values[period];
        if price < self.price_median && value > 0.0 {
            Action::Charge
        } else if price > self.price_median && value > 0.0 {
            Action::Discharge
        } else {
            Action::Idle
        }
    }

    fn optimise_dispatch(&mut self, first: TimePeriod, device: &StorageDevice) {
        self.internal_energy_mwh.fill(0.0);
        let horizon = self.settings.forecast_periods;
        let mut energy = device.energy_level_mwh();
        let mut begin = 0;
        let mut previous = self.action_in(0);
        for period in 1..horizon {
            let action = self.action_in(period);
            if previous.is_finalised_by(action) {
                energy += self.close_interval(first, device, previous, begin..period, energy);
                previous = action;
                begin = period;
            }
        }
        self.close_interval(first, device, previous, begin..horizon, energy);
    }

    /// Places the energy `action` calls for within `interval`; returns the energy placed.
    fn close_interval(
        &mut self,
        first: TimePeriod,
        device: &StorageDevice,
        action: Action,
        interval: Range<usize>,
        energy: f64,
    ) -> f64 {
        let target = match action {
            Action::Charge => device.capacity_mwh() - energy,
            Action::Discharge => -energy,
            Action::Idle => return 0.0,
        };
        if target == 0.0 {
            return 0.0;
        }
        for period in interval.clone() {
            let time_period = first.shift_by(period as i64);
            self.power_limits[period] = match action {
                Action::Charge => device.max_charging_power_mw(&time_period),
                _ => device.max_discharging_power_mw(&time_period),
            };
        }
        distribute(
            target,
            &self.power_limits[interval.clone()],
            &self.assessment_values[interval.clone()],
            &mut self.internal_energy_mwh[interval],
        )
    }
}

/// Spreads `energy` over `powers` proportionally to `weights`, capping each entry at its
/// entry in `limits`.
///
/// Repeats until the energy is placed or every weighted entry is saturated. Returns the total
/// energy of the slice afterwards.
fn distribute(energy: f64, limits: &[f64], weights: &[f64], powers: &mut [f64]) -> f64 {
    let mut remaining = energy;
    let open = |power: f64, limit: f64| power.abs() < limit - DISTRIBUTION_TOLERANCE;
    while remaining * energy > 0.0 && remaining.abs() > DISTRIBUTION_TOLERANCE {
        let sum_of_weights: f64 = weights
            .iter()
            .zip(limits)
            .zip(powers.iter())
            .filter(|((_, limit), power)| open(**power, **limit))
            .map(|((weight, _), _)| weight)
            .sum();
        if sum_of_weights <= 0.0 {
            break;
        }
        let energy_per_weight = remaining / sum_of_weights;
        for ((weight, limit), power) in weights.iter().zip(limits).zip(powers.iter_mut()) {
            if open(*power, *limit) {
                let updated = (*power + energy_per_weight * weight).clamp(-limit, *limit);
                remaining -= updated - *power;
                *power = updated;
            }
        }
    }
    powers.iter().sum()
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

impl Planner for HeuristicMedian {
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
        self.update_price_forecast(first);
        self.update_price_limits(device.round_trip_efficiency());
        self.update_assessment_values();
        self.optimise_dispatch(first, device);

        let periods = self.settings.schedule_periods;
        let mut demand = Vec::with_capacity(periods);
        let mut bids = Vec::with_capacity(periods);
        let mut expected = Vec::with_capacity(periods);
        let mut energy = device.energy_level_mwh();
        for period in 0..periods {
            let next = device.within_energy_bounds(energy + self.internal_energy_mwh[period]);
            let external = device.internal_to_external(next - energy);
            bids.push(if external < 0.0 {
                self.min_discharge_price
            } else if external > 0.0 {
                self.max_charge_price
            } else {
                self.forecast_prices[period]
            });
            demand.push(external);
            expected.push(energy);
            energy = next;
        }
        debug!(
            start = first.start().0,
            median = self.price_median,
            max_charge_price = self.max_charge_price,
            min_discharge_price = self.min_discharge_price,
            "heuristic schedule created"
        );
        Schedule::new(first, demand, bids, expected)
    }
}
