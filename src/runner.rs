//! Builds assets, forecasters and planners from a scenario and runs them.

use tracing::info;

use crate::config::{ForecastConfig, LoadShiftConfig, PlannerKind, ScenarioConfig, StorageConfig};
use crate::devices::{LoadShiftPortfolio, StorageDevice};
use crate::error::PlanningError;
use crate::forecast::ProfileForecaster;
use crate::planner::{
    Assessment, HeuristicMedian, LoadShiftStrategist, MaxProfit, MaxProfitPriceTaker, MinSystemCost, Planner,
    PlanningSettings, ShiftMaxProfit, ShiftMaxProfitTariff, ShiftMinSystemCost, StorageStrategist,
};
use crate::sim::clock::{TimePeriod, TimeStamp};
use crate::sim::engine::Engine;
use crate::sim::kpi::KpiReport;
use crate::sim::schedule::Schedule;
use crate::sim::series::TimeSeries;
use crate::sim::types::StepResult;

/// Outcome of a complete run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub results: Vec<StepResult>,
    pub kpi: KpiReport,
    /// Schedule held when the run ended.
    pub last_schedule: Option<Schedule>,
}

/// First period of every run.
pub fn first_period() -> TimePeriod {
    TimePeriod::hourly(TimeStamp(0))
}

/// Repeats an hourly profile over `periods`; an empty profile is a constant `fallback`.
fn tiled(profile: &[f64], periods: usize, fallback: f64) -> TimeSeries {
    if profile.is_empty() {
        return TimeSeries::constant(fallback);
    }
    let values: Vec<f64> = profile.iter().copied().cycle().take(periods).collect();
    TimeSeries::from_periods(first_period(), &values)
}

/// Builds the storage with its availability profiles tiled over `periods`.
pub fn build_storage(cfg: &StorageConfig, periods: usize) -> StorageDevice {
    StorageDevice::new(
        cfg.energy_to_power_ratio,
        cfg.internal_power_mw,
        cfg.self_discharge_rate_per_hour,
        cfg.eta_charge,
        cfg.eta_discharge,
        cfg.initial_energy_mwh,
    )
    .with_availability(
        tiled(&cfg.charge_availability_profile, periods, 1.0),
        tiled(&cfg.discharge_availability_profile, periods, 1.0),
    )
}

/// Builds the portfolio with its baseline profile tiled over `periods`.
pub fn build_portfolio(cfg: &LoadShiftConfig, periods: usize) -> LoadShiftPortfolio {
    LoadShiftPortfolio::new(
        cfg.power_mw,
        TimeSeries::constant(cfg.availability_up),
        TimeSeries::constant(cfg.availability_down),
        cfg.energy_resolution_mwh,
        cfg.energy_limit_up_mwh,
        cfg.energy_limit_down_mwh,
        cfg.maximum_shift_time,
        TimeSeries::constant(cfg.variable_shift_cost_eur_per_mwh),
        tiled(&cfg.baseline_profile, periods, 0.0),
        cfg.baseline_peak_load_mw,
        cfg.initial_energy_mwh,
        cfg.initial_shift_time,
    )
}

pub fn build_forecaster(cfg: &ForecastConfig, seed: u64) -> ProfileForecaster {
    ProfileForecaster::new(
        first_period(),
        &cfg.price_profile,
        cfg.kind,
        cfg.slope_eur_per_mw,
        cfg.depth_mw,
        cfg.blocks,
        cfg.error_std,
        seed,
    )
}

/// Runs a validated scenario with its configured planner.
///
/// # Errors
///
/// Returns the first planning failure of the run.
pub fn run_scenario(cfg: &ScenarioConfig) -> Result<RunOutput, PlanningError> {
    let settings = cfg.planning;
    let strategy = &cfg.strategy;
    let update = strategy.forecast_update;
    let steps = strategy.transition_steps;
    let provider = build_forecaster(&cfg.forecast, cfg.simulation.seed);
    let periods = cfg.simulation.periods;

    let horizon = periods + settings.forecast_periods;

    info!(planner = ?strategy.planner, periods, "starting run");
    match strategy.planner {
        PlannerKind::MaxProfit => {
            let device = build_storage(&cfg.storage, horizon);
            let assessment = MaxProfit::new(&device, steps);
            run_storage(StorageStrategist::new(settings, &device, steps, assessment, update)?, provider, device, periods)
        }
        PlannerKind::MaxProfitPriceTaker => {
            let device = build_storage(&cfg.storage, horizon);
            let assessment = MaxProfitPriceTaker::new(&device, steps);
            run_storage(StorageStrategist::new(settings, &device, steps, assessment, update)?, provider, device, periods)
        }
        PlannerKind::MinSystemCost => {
            let device = build_storage(&cfg.storage, horizon);
            let assessment = MinSystemCost::new(&device, steps);
            run_storage(StorageStrategist::new(settings, &device, steps, assessment, update)?, provider, device, periods)
        }
        PlannerKind::HeuristicMedian => {
            let device = build_storage(&cfg.storage, horizon);
            let planner = HeuristicMedian::new(settings, strategy.assessment_polynomial.clone(), update)?;
            run_storage(planner, provider, device, periods)
        }
        PlannerKind::ShiftMaxProfit => {
            let portfolio = build_portfolio(&cfg.load_shift, horizon);
            let assessment = ShiftMaxProfit::new(&portfolio, strategy.purchase_levies_eur_per_mwh);
            run_load_shift(settings, portfolio, assessment, cfg, provider)
        }
        PlannerKind::ShiftMinSystemCost => {
            let portfolio = build_portfolio(&cfg.load_shift, horizon);
            let assessment = ShiftMinSystemCost::new(&portfolio);
            run_load_shift(settings, portfolio, assessment, cfg, provider)
        }
        PlannerKind::ShiftMaxProfitTariff => {
            let portfolio = build_portfolio(&cfg.load_shift, horizon);
            let assessment = ShiftMaxProfitTariff::new(&portfolio, cfg.tariff.clone());
            run_load_shift(settings, portfolio, assessment, cfg, provider)
        }
    }
}

fn run_storage<P: Planner<Asset = StorageDevice>>(
    planner: P,
    provider: ProfileForecaster,
    device: StorageDevice,
    periods: usize,
) -> Result<RunOutput, PlanningError> {
    let capacity = device.capacity_mwh();
    execute(Engine::new(planner, provider, device, first_period(), periods), capacity)
}

fn run_load_shift<A: Assessment>(
    settings: PlanningSettings,
    portfolio: LoadShiftPortfolio,
    assessment: A,
    cfg: &ScenarioConfig,
    provider: ProfileForecaster,
) -> Result<RunOutput, PlanningError> {
    let planner = LoadShiftStrategist::new(settings, &portfolio, assessment, cfg.strategy.forecast_update)?;
    let capacity = portfolio.energy_limit_up_mwh + portfolio.energy_limit_down_mwh;
    let engine = Engine::new(planner, provider, portfolio, first_period(), cfg.simulation.periods);
    execute(engine, capacity)
}

fn execute<P: Planner>(mut engine: Engine<P, ProfileForecaster>, capacity_mwh: f64) -> Result<RunOutput, PlanningError> {
    let results = engine.run()?;
    let kpi = KpiReport::from_results(&results, capacity_mwh);
    info!(
        revenue_eur = kpi.revenue_eur,
        replans = engine.replan_count(),
        "run finished"
    );
    Ok(RunOutput {
        results,
        kpi,
        last_schedule: engine.schedule().cloned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_is_tiled_over_run() {
        let cfg = LoadShiftConfig {
            baseline_profile: vec![0.2, 0.4],
            ..LoadShiftConfig::default()
        };
        let p = build_portfolio(&cfg, 5);
        let t = |i: i64| first_period().shift_by(i).start();
        assert_eq!(p.baseline_load.value_earlier_equal(t(3)), 0.4);
        assert_eq!(p.baseline_load.value_earlier_equal(t(4)), 0.2);
    }

    #[test]
    fn storage_availability_is_tiled_over_run() {
        let cfg = StorageConfig {
            charge_availability_profile: vec![1.0, 0.5],
            ..StorageConfig::default()
        };
        let device = build_storage(&cfg, 4);
        let period = |i: i64| first_period().shift_by(i);
        assert_eq!(device.max_charging_power_mw(&period(3)), 0.5 * cfg.internal_power_mw);
        assert_eq!(device.max_charging_power_mw(&period(2)), cfg.internal_power_mw);
        assert_eq!(device.max_discharging_power_mw(&period(3)), cfg.internal_power_mw);
    }

    #[test]
    fn every_preset_runs() {
        for name in ScenarioConfig::PRESETS {
            let mut cfg = ScenarioConfig::from_preset(name).unwrap();
            cfg.simulation.periods = 24;
            let out = run_scenario(&cfg).unwrap();
            assert_eq!(out.results.len(), 24, "preset {name}");
            assert!(out.kpi.revenue_eur.is_finite(), "preset {name}");
            assert!(out.last_schedule.is_some());
        }
    }
}
