//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use flex_dispatch::devices::{LoadShiftPortfolio, StorageDevice};
use flex_dispatch::forecast::{ForecastCache, ForecastKind, ForecastUpdateType, ProfileForecaster};
use flex_dispatch::planner::PlanningSettings;
use flex_dispatch::sensitivity::Sensitivity;
use flex_dispatch::sim::clock::{TimePeriod, TimeStamp};
use flex_dispatch::sim::series::TimeSeries;

/// First hourly period of every fixture run.
pub fn first_period() -> TimePeriod {
    TimePeriod::hourly(TimeStamp(0))
}

/// Lossless storage without self discharge, starting empty.
pub fn lossless_storage(energy_to_power_ratio: f64, power_mw: f64) -> StorageDevice {
    StorageDevice::new(energy_to_power_ratio, power_mw, 0.0, 1.0, 1.0, 0.0)
}

/// Settings with a zero bid tolerance.
pub fn settings(forecast_periods: usize, schedule_periods: usize) -> PlanningSettings {
    PlanningSettings {
        forecast_periods,
        schedule_periods,
        bid_tolerance: 0.0,
    }
}

/// Balanced portfolio with constant availability and shift cost and no baseline load.
///
/// Energy resolution is 1 MWh and both energy limits equal `limit_mwh`.
pub fn portfolio(power_mw: f64, limit_mwh: f64, maximum_shift_time: usize, availability: f64) -> LoadShiftPortfolio {
    LoadShiftPortfolio::new(
        power_mw,
        TimeSeries::constant(availability),
        TimeSeries::constant(availability),
        1.0,
        limit_mwh,
        limit_mwh,
        maximum_shift_time,
        TimeSeries::constant(0.0),
        TimeSeries::constant(0.0),
        0.0,
        0.0,
        0,
    )
}

/// Stores one price point per period, starting at the first fixture period.
pub fn fill_price_points(cache: &mut ForecastCache, prices: &[f64]) {
    for (i, price) in prices.iter().enumerate() {
        cache.store(first_period().shift_by(i as i64), Sensitivity::PricePoint(*price));
    }
}

/// Noise-free point forecaster repeating `prices`.
pub fn point_forecaster(prices: &[f64]) -> ProfileForecaster {
    ProfileForecaster::new(first_period(), prices, ForecastKind::Point, 0.0, 0.0, 1, 0.0, 7)
}

/// Empty incremental forecast cache.
pub fn empty_cache() -> ForecastCache {
    ForecastCache::new(ForecastUpdateType::Incremental)
}
