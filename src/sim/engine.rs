//! Rolling-horizon engine: replans, dispatches and settles one asset period by period.

use tracing::{info, warn};

use crate::devices::{Device, DeviceContext};
use crate::error::PlanningError;
use crate::forecast::ForecastProvider;
use crate::planner::Planner;

use super::clock::{Clock, TimePeriod};
use super::schedule::Schedule;
use super::types::StepResult;

/// Simulation engine owning a planner, its asset and a forecast provider.
///
/// Generic over the planner and the provider for static dispatch. A schedule is kept until it
/// runs out or the asset's energy deviates from the planned path, then a new one is created.
pub struct Engine<P: Planner, F: ForecastProvider> {
    planner: P,
    provider: F,
    asset: P::Asset,
    clock: Clock,
    schedule: Option<Schedule>,
    replans: usize,
}

impl<P: Planner, F: ForecastProvider> Engine<P, F> {
    /// Creates a new engine.
    ///
    /// # Arguments
    ///
    /// * `planner` - Strategist creating schedules for the asset
    /// * `provider` - Source of forecasts and realised prices
    /// * `asset` - Asset to dispatch
    /// * `first` - First period of the run
    /// * `periods` - Number of periods to run
    pub fn new(planner: P, provider: F, asset: P::Asset, first: TimePeriod, periods: usize) -> Self {
        Self {
            planner,
            provider,
            asset,
            clock: Clock::new(first, periods),
            schedule: None,
            replans: 0,
        }
    }

    /// Executes one period and returns its result.
    ///
    /// # Errors
    ///
    /// Propagates planning failures of a required replan.
    pub fn step(&mut self, index: usize, period: TimePeriod) -> Result<StepResult, PlanningError> {
        let time = period.start();
        let level = self.asset.energy_level_mwh();

        // 1. Keep or renew the schedule
        let (schedule, replanned) = match self.schedule.take() {
            Some(schedule) if schedule.is_applicable(time, level) => (schedule, false),
            _ => (self.replan(period)?, true),
        };
        let requested_mwh = schedule.power_delta_at(time).unwrap_or(0.0);
        let bid_price = schedule.bid_price_at(time).unwrap_or(f64::NAN);
        self.schedule = Some(schedule);

        // 2. Dispatch and settle
        let realised_mwh = self
            .asset
            .dispatch(&DeviceContext::with_request(period, requested_mwh));
        let realised_price = self.provider.realised_price(&period);

        Ok(StepResult {
            index,
            period_start: time.0,
            requested_mwh,
            realised_mwh,
            bid_price,
            realised_price,
            revenue_eur: -realised_mwh * realised_price,
            energy_level_mwh: self.asset.energy_level_mwh(),
            replanned,
        })
    }

    /// Executes all remaining periods and returns the complete step record vector.
    ///
    /// # Errors
    ///
    /// Stops at the first period whose replan fails.
    pub fn run(&mut self) -> Result<Vec<StepResult>, PlanningError> {
        let mut results = Vec::new();
        while let Some(period) = self.clock.tick() {
            let index = self.clock.elapsed() - 1;
            results.push(self.step(index, period)?);
        }
        Ok(results)
    }

    fn replan(&mut self, first: TimePeriod) -> Result<Schedule, PlanningError> {
        let horizon = self.planner.settings().forecast_periods;
        for period in self.planner.forecasts().missing_periods(first, horizon) {
            match self.provider.sensitivity_for(&period) {
                Some(sensitivity) => self.planner.forecasts_mut().store(period, sensitivity),
                None => warn!(start = period.start().0, "no forecast available, planning with zero values"),
            }
        }
        let schedule = self.planner.create_schedule(first, &self.asset)?;
        self.planner.forecasts_mut().clear_before(first.start());
        self.replans += 1;
        info!(
            start = first.start().0,
            periods = schedule.duration(),
            energy_level_mwh = self.asset.energy_level_mwh(),
            "schedule replanned"
        );
        Ok(schedule)
    }

    /// Returns a reference to the dispatched asset.
    pub fn asset(&self) -> &P::Asset {
        &self.asset
    }

    pub fn planner(&self) -> &P {
        &self.planner
    }

    /// Schedule currently held, if any.
    pub fn schedule(&self) -> Option<&Schedule> {
        self.schedule.as_ref()
    }

    /// Number of schedules created so far.
    pub fn replan_count(&self) -> usize {
        self.replans
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::StorageDevice;
    use crate::forecast::{ForecastKind, ForecastUpdateType, ProfileForecaster};
    use crate::planner::{MaxProfitPriceTaker, PlanningSettings, StorageStrategist};
    use crate::sensitivity::Sensitivity;
    use crate::sim::clock::TimeStamp;

    fn first() -> TimePeriod {
        TimePeriod::hourly(TimeStamp(0))
    }

    fn engine(
        prices: &[f64],
        schedule_periods: usize,
    ) -> Engine<StorageStrategist<MaxProfitPriceTaker>, ProfileForecaster> {
        let device = StorageDevice::new(2.0, 1.0, 0.0, 1.0, 1.0, 0.0);
        let settings = PlanningSettings {
            forecast_periods: 4,
            schedule_periods,
            bid_tolerance: 1e-3,
        };
        let planner = StorageStrategist::new(
            settings,
            &device,
            1,
            MaxProfitPriceTaker::new(&device, 1),
            ForecastUpdateType::Incremental,
        )
        .unwrap();
        let provider = ProfileForecaster::new(
            first(),
            prices,
            ForecastKind::Point,
            0.0,
            0.0,
            1,
            0.0,
            1,
        );
        Engine::new(planner, provider, device, first(), 8)
    }

    #[test]
    fn replans_when_schedule_runs_out() {
        let mut e = engine(&[10.0, 10.0, 90.0, 90.0], 2);
        let results = e.run().unwrap();
        assert_eq!(results.len(), 8);
        assert_eq!(e.replan_count(), 4);
        assert!(results[0].replanned);
        assert!(!results[1].replanned);
    }

    #[test]
    fn arbitrage_earns_price_spread() {
        let mut e = engine(&[10.0, 10.0, 90.0, 90.0], 4);
        let results = e.run().unwrap();
        let revenue: f64 = results.iter().map(|r| r.revenue_eur).sum();
        assert!(revenue > 0.0);
        assert!(results.iter().all(|r| (0.0..=2.0 + 1e-9).contains(&r.energy_level_mwh)));
    }

    #[test]
    fn stale_forecasts_are_cleared() {
        let mut e = engine(&[10.0, 10.0, 90.0, 90.0], 2);
        e.run().unwrap();
        let oldest = first().shift_by(6);
        assert!(e.planner().forecasts().get(&first()).is_none());
        assert_eq!(
            e.planner().forecasts().get(&oldest),
            Some(&Sensitivity::PricePoint(90.0))
        );
    }
}
