//! Forecast storage and provision for the dispatch planners.

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Deserialize;

use crate::sensitivity::{MeritOrderSensitivity, Sensitivity, SensitivityItem, SensitivityKind};
use crate::sim::clock::{TimePeriod, TimeStamp};

/// Which horizon periods are requested before a planning cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastUpdateType {
    /// Request only periods without a stored forecast.
    #[default]
    Incremental,
    /// Request every period of the horizon again.
    All,
}

/// Time-indexed store of per-period sensitivities.
///
/// Entries are keyed by the start of their period and kept in time order.
#[derive(Debug, Clone, Default)]
pub struct ForecastCache {
    entries: BTreeMap<TimeStamp, (TimePeriod, Sensitivity)>,
    update_type: ForecastUpdateType,
}

impl ForecastCache {
    pub fn new(update_type: ForecastUpdateType) -> Self {
        Self {
            entries: BTreeMap::new(),
            update_type,
        }
    }

    /// Stores (or replaces) the sensitivity for `period`.
    pub fn store(&mut self, period: TimePeriod, sensitivity: Sensitivity) {
        self.entries.insert(period.start(), (period, sensitivity));
    }

    /// Returns the sensitivity stored for `period`, if any.
    pub fn get(&self, period: &TimePeriod) -> Option<&Sensitivity> {
        self.entries.get(&period.start()).map(|(_, s)| s)
    }

    /// Lists the periods of the horizon starting at `first` that must be requested.
    ///
    /// # Arguments
    ///
    /// * `first` - First period of the planning horizon
    /// * `horizon` - Number of periods in the horizon
    ///
    /// # Returns
    ///
    /// Periods lacking a forecast (incremental updates) or all horizon periods.
    pub fn missing_periods(&self, first: TimePeriod, horizon: usize) -> Vec<TimePeriod> {
        (0..horizon as i64)
            .map(|shift| first.shift_by(shift))
            .filter(|period| match self.update_type {
                ForecastUpdateType::Incremental => !self.entries.contains_key(&period.start()),
                ForecastUpdateType::All => true,
            })
            .collect()
    }

    /// Drops every entry whose period ended before `time`.
    pub fn clear_before(&mut self, time: TimeStamp) {
        self.entries.retain(|_, (period, _)| period.last_time() >= time);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Source of forecasts and realised prices for the periods of a run.
pub trait ForecastProvider {
    /// Forecast sensitivity for `period`, or `None` if none can be provided.
    fn sensitivity_for(&mut self, period: &TimePeriod) -> Option<Sensitivity>;

    /// Price actually realised in `period`, used for settlement.
    fn realised_price(&self, period: &TimePeriod) -> f64;
}

/// Which kind of sensitivity a [`ProfileForecaster`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastKind {
    /// Stepped price curve.
    Price,
    /// Stepped marginal-cost curve.
    MarginalCost,
    /// Single-point price.
    Point,
}

/// Forecaster built from a periodic hourly price profile.
///
/// The profile is repeated over the run. Each forecast is a stepped curve around the profile
/// price whose blocks rise (charging side) or fall (discharging side) by `slope_per_mw`.
#[derive(Debug, Clone)]
pub struct ProfileForecaster {
    first: TimePeriod,
    prices: Vec<f64>,
    kind: ForecastKind,
    slope_per_mw: f64,
    depth_mw: f64,
    blocks: usize,
    error_std: f64,
    rng: StdRng,
}

impl ProfileForecaster {
    /// Creates a forecaster.
    ///
    /// # Arguments
    ///
    /// * `first` - Period aligned with the first profile value
    /// * `profile` - Hourly prices (EUR/MWh), repeated over the run
    /// * `kind` - Sensitivity type to produce
    /// * `slope_per_mw` - Price change per MW of added demand or supply
    /// * `depth_mw` - Power covered by each side of the curve
    /// * `blocks` - Number of blocks per side (at least 1)
    /// * `error_std` - Standard deviation of Gaussian forecast error (EUR/MWh)
    /// * `seed` - Seed for the forecast error generator
    ///
    /// # Panics
    ///
    /// Panics if the profile is empty.
    #[expect(clippy::too_many_arguments)]
    pub fn new(
        first: TimePeriod,
        profile: &[f64],
        kind: ForecastKind,
        slope_per_mw: f64,
        depth_mw: f64,
        blocks: usize,
        error_std: f64,
        seed: u64,
    ) -> Self {
        assert!(!profile.is_empty(), "price profile must not be empty");
        Self {
            first,
            prices: profile.to_vec(),
            kind,
            slope_per_mw,
            depth_mw,
            blocks: blocks.max(1),
            error_std,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Profile price for `period`; periods before the first one wrap around.
    pub fn profile_price(&self, period: &TimePeriod) -> f64 {
        let offset = (period.start().0 - self.first.start().0) / period.duration().0;
        let len = self.prices.len() as i64;
        self.prices[offset.rem_euclid(len) as usize]
    }

    fn build_curve(&self, kind: SensitivityKind, price: f64) -> MeritOrderSensitivity {
        let block_mw = self.depth_mw / self.blocks as f64;
        let mut charging = Vec::with_capacity(self.blocks);
        let mut discharging = Vec::with_capacity(self.blocks);
        for block in 0..self.blocks {
            let shift = self.slope_per_mw * block_mw * (block as f64 + 0.5);
            charging.push(SensitivityItem::new(block_mw, price + shift, price + shift));
            discharging.push(SensitivityItem::new(block_mw, price - shift, price - shift));
        }
        MeritOrderSensitivity::new(kind, charging, discharging)
    }
}

impl ForecastProvider for ProfileForecaster {
    fn sensitivity_for(&mut self, period: &TimePeriod) -> Option<Sensitivity> {
        let price = self.profile_price(period) + gaussian_noise(&mut self.rng, self.error_std);
        let sensitivity = match self.kind {
            ForecastKind::Point => Sensitivity::PricePoint(price),
            ForecastKind::Price => {
                Sensitivity::MeritOrder(self.build_curve(SensitivityKind::Price, price))
            }
            ForecastKind::MarginalCost => {
                Sensitivity::MeritOrder(self.build_curve(SensitivityKind::MarginalCost, price))
            }
        };
        Some(sensitivity)
    }

    fn realised_price(&self, period: &TimePeriod) -> f64 {
        self.profile_price(period)
    }
}

/// Gaussian noise via the Box-Muller transform.
fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}
