//! TOML-based dispatch scenario configuration and preset definitions.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::devices::EndUserTariff;
use crate::forecast::{ForecastKind, ForecastUpdateType};
use crate::planner::{PlanningSettings, Polynomial};

/// Top-level scenario configuration parsed from TOML.
///
/// All sections have defaults matching the `arbitrage` preset. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or start from a preset with
/// [`ScenarioConfig::from_preset`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Run length and seed.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Horizon, execution window and bid tolerance.
    #[serde(default)]
    pub planning: PlanningSettings,
    /// Planner selection and planner specific parameters.
    #[serde(default)]
    pub strategy: StrategyConfig,
    /// Storage parameters, used by storage planners.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Load-shifting portfolio parameters, used by load-shift planners.
    #[serde(default)]
    pub load_shift: LoadShiftConfig,
    /// Price profile and forecast shape.
    #[serde(default)]
    pub forecast: ForecastConfig,
    /// End-user tariff, used by the tariff-aware load-shift planner.
    #[serde(default)]
    pub tariff: EndUserTariff,
}

/// Run length and seed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Number of hourly periods to simulate (must be > 0).
    pub periods: usize,
    /// Seed for the forecast error generator.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { periods: 48, seed: 42 }
    }
}

/// Available planners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannerKind {
    /// Storage, profit against a price curve.
    MaxProfit,
    /// Storage, profit against a point price.
    MaxProfitPriceTaker,
    /// Storage, system cost against a marginal-cost curve.
    MinSystemCost,
    /// Storage, price-median heuristic.
    HeuristicMedian,
    /// Load shifting, profit with purchase levies.
    ShiftMaxProfit,
    /// Load shifting, system cost.
    ShiftMinSystemCost,
    /// Load shifting, consumer savings under an end-user tariff.
    ShiftMaxProfitTariff,
}

impl PlannerKind {
    /// Returns true if the planner dispatches a load-shifting portfolio.
    pub fn is_load_shift(self) -> bool {
        matches!(
            self,
            Self::ShiftMaxProfit | Self::ShiftMinSystemCost | Self::ShiftMaxProfitTariff
        )
    }

    /// Returns true if the planner minimises a marginal-cost objective.
    pub fn needs_marginal_cost(self) -> bool {
        matches!(self, Self::MinSystemCost | Self::ShiftMinSystemCost)
    }
}

/// Planner selection and planner specific parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrategyConfig {
    pub planner: PlannerKind,
    /// Energy states per full-power transition of a storage (must be > 0).
    pub transition_steps: usize,
    /// Which forecasts are requested before each replan.
    pub forecast_update: ForecastUpdateType,
    /// Levies paid on additional purchases by `shift_max_profit` (EUR/MWh).
    pub purchase_levies_eur_per_mwh: f64,
    /// Assessment polynomial of `heuristic_median`, ascending coefficients.
    pub assessment_polynomial: Polynomial,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            planner: PlannerKind::MaxProfit,
            transition_steps: 4,
            forecast_update: ForecastUpdateType::Incremental,
            purchase_levies_eur_per_mwh: 0.0,
            assessment_polynomial: Polynomial::default(),
        }
    }
}

/// Storage parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Capacity divided by internal power (hours).
    pub energy_to_power_ratio: f64,
    /// Internal charge and discharge power (MW).
    pub internal_power_mw: f64,
    /// Share of stored energy lost per hour (0.0–1.0).
    pub self_discharge_rate_per_hour: f64,
    /// Charge efficiency (0.0–1.0).
    pub eta_charge: f64,
    /// Discharge efficiency (0.0–1.0).
    pub eta_discharge: f64,
    /// Initial internal energy (MWh).
    pub initial_energy_mwh: f64,
    /// Hourly share of the internal power available for charging, repeated over the run.
    /// Empty means always fully available.
    pub charge_availability_profile: Vec<f64>,
    /// Hourly share of the internal power available for discharging; see above.
    pub discharge_availability_profile: Vec<f64>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            energy_to_power_ratio: 4.0,
            internal_power_mw: 10.0,
            self_discharge_rate_per_hour: 0.0,
            eta_charge: 0.95,
            eta_discharge: 0.95,
            initial_energy_mwh: 0.0,
            charge_availability_profile: Vec::new(),
            discharge_availability_profile: Vec::new(),
        }
    }
}

impl StorageConfig {
    pub fn capacity_mwh(&self) -> f64 {
        self.energy_to_power_ratio * self.internal_power_mw
    }
}

/// Load-shifting portfolio parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadShiftConfig {
    /// Maximum shiftable power (MW).
    pub power_mw: f64,
    /// Share of the power available for shifting up (0.0–1.0).
    pub availability_up: f64,
    /// Share of the power available for shifting down (0.0–1.0).
    pub availability_down: f64,
    /// Energy per discrete state (MWh, must be > 0).
    pub energy_resolution_mwh: f64,
    /// Upper limit of the shifted energy (MWh).
    pub energy_limit_up_mwh: f64,
    /// Lower limit of the shifted energy (MWh, positive magnitude).
    pub energy_limit_down_mwh: f64,
    /// Periods a shift may last (must be > 0).
    pub maximum_shift_time: usize,
    /// Variable cost of shifted energy (EUR/MWh).
    pub variable_shift_cost_eur_per_mwh: f64,
    /// Hourly baseline load relative to the peak, repeated over the run.
    pub baseline_profile: Vec<f64>,
    /// Peak of the baseline load (MW).
    pub baseline_peak_load_mw: f64,
    /// Initial shifted energy (MWh).
    pub initial_energy_mwh: f64,
    /// Initial shift time (periods).
    pub initial_shift_time: usize,
}

impl Default for LoadShiftConfig {
    fn default() -> Self {
        Self {
            power_mw: 2.0,
            availability_up: 1.0,
            availability_down: 1.0,
            energy_resolution_mwh: 1.0,
            energy_limit_up_mwh: 4.0,
            energy_limit_down_mwh: 4.0,
            maximum_shift_time: 4,
            variable_shift_cost_eur_per_mwh: 2.0,
            baseline_profile: vec![
                0.55, 0.5, 0.48, 0.47, 0.5, 0.6, 0.75, 0.9, 0.95, 0.9, 0.85, 0.85, //
                0.8, 0.8, 0.82, 0.85, 0.9, 1.0, 0.98, 0.9, 0.8, 0.7, 0.62, 0.58,
            ],
            baseline_peak_load_mw: 10.0,
            initial_energy_mwh: 0.0,
            initial_shift_time: 0,
        }
    }
}

/// Price profile and forecast shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForecastConfig {
    /// Hourly prices (EUR/MWh), repeated over the run.
    pub price_profile: Vec<f64>,
    /// Sensitivity type handed to the planner.
    pub kind: ForecastKind,
    /// Price change per MW of added demand or supply (EUR/MWh per MW).
    pub slope_eur_per_mw: f64,
    /// Power covered by each curve side (MW).
    pub depth_mw: f64,
    /// Blocks per curve side (must be > 0).
    pub blocks: usize,
    /// Standard deviation of forecast error (EUR/MWh).
    pub error_std: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            price_profile: vec![
                42.0, 38.0, 35.0, 33.0, 34.0, 40.0, 55.0, 70.0, 68.0, 60.0, 52.0, 45.0, //
                40.0, 38.0, 42.0, 50.0, 62.0, 80.0, 95.0, 88.0, 72.0, 60.0, 52.0, 46.0,
            ],
            kind: ForecastKind::Price,
            slope_eur_per_mw: 0.5,
            depth_mw: 50.0,
            blocks: 10,
            error_std: 0.0,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"planning.schedule_periods"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// False for NaN.
fn is_non_negative(value: f64) -> bool {
    value >= 0.0
}

/// False for NaN.
fn is_positive(value: f64) -> bool {
    value > 0.0
}

impl ScenarioConfig {
    /// Storage arbitrage against a price curve including own price impact.
    pub fn arbitrage() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            planning: PlanningSettings::default(),
            strategy: StrategyConfig::default(),
            storage: StorageConfig::default(),
            load_shift: LoadShiftConfig::default(),
            forecast: ForecastConfig::default(),
            tariff: EndUserTariff::default(),
        }
    }

    /// Storage operated to minimise system cost.
    pub fn system_cost() -> Self {
        Self {
            strategy: StrategyConfig {
                planner: PlannerKind::MinSystemCost,
                ..StrategyConfig::default()
            },
            forecast: ForecastConfig {
                kind: ForecastKind::MarginalCost,
                ..ForecastConfig::default()
            },
            ..Self::arbitrage()
        }
    }

    /// Storage trading on noisy point forecasts without price impact.
    pub fn price_taker() -> Self {
        Self {
            strategy: StrategyConfig {
                planner: PlannerKind::MaxProfitPriceTaker,
                transition_steps: 2,
                ..StrategyConfig::default()
            },
            forecast: ForecastConfig {
                kind: ForecastKind::Point,
                error_std: 3.0,
                ..ForecastConfig::default()
            },
            ..Self::arbitrage()
        }
    }

    /// Storage dispatched by the price-median heuristic.
    pub fn heuristic() -> Self {
        Self {
            strategy: StrategyConfig {
                planner: PlannerKind::HeuristicMedian,
                assessment_polynomial: Polynomial::new(vec![0.0, 1.0, 0.05]),
                ..StrategyConfig::default()
            },
            forecast: ForecastConfig {
                kind: ForecastKind::Point,
                ..ForecastConfig::default()
            },
            ..Self::arbitrage()
        }
    }

    /// Consumer load shifting under an end-user tariff with capacity charges.
    pub fn load_shift() -> Self {
        Self {
            strategy: StrategyConfig {
                planner: PlannerKind::ShiftMaxProfitTariff,
                ..StrategyConfig::default()
            },
            tariff: EndUserTariff {
                surcharges_eur_per_mwh: 120.0,
                vat: 0.19,
                capacity_charge_eur_per_mw: 50.0,
                static_power_price: None,
            },
            ..Self::arbitrage()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["arbitrage", "system_cost", "price_taker", "heuristic", "load_shift"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "arbitrage" => Ok(Self::arbitrage()),
            "system_cost" => Ok(Self::system_cost()),
            "price_taker" => Ok(Self::price_taker()),
            "heuristic" => Ok(Self::heuristic()),
            "load_shift" => Ok(Self::load_shift()),
            _ => Err(ConfigError::new(
                "preset",
                format!("unknown preset \"{name}\", available: {}", Self::PRESETS.join(", ")),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.simulation.periods == 0 {
            errors.push(ConfigError::new("simulation.periods", "must be > 0"));
        }

        let p = &self.planning;
        if p.forecast_periods == 0 {
            errors.push(ConfigError::new("planning.forecast_periods", "must be > 0"));
        }
        if p.schedule_periods == 0 || p.schedule_periods > p.forecast_periods {
            errors.push(ConfigError::new(
                "planning.schedule_periods",
                "must be in [1, planning.forecast_periods]",
            ));
        }
        if !is_non_negative(p.bid_tolerance) {
            errors.push(ConfigError::new("planning.bid_tolerance", "must be >= 0"));
        }

        let planner = self.strategy.planner;
        if self.strategy.transition_steps == 0 {
            errors.push(ConfigError::new("strategy.transition_steps", "must be > 0"));
        }
        if planner.needs_marginal_cost() != (self.forecast.kind == ForecastKind::MarginalCost) {
            errors.push(ConfigError::new(
                "forecast.kind",
                if planner.needs_marginal_cost() {
                    "system cost planners need a \"marginal_cost\" forecast"
                } else {
                    "\"marginal_cost\" forecasts are only valid for system cost planners"
                },
            ));
        }

        if planner.is_load_shift() {
            self.validate_load_shift(&mut errors);
        } else {
            self.validate_storage(&mut errors);
        }

        let f = &self.forecast;
        if f.price_profile.is_empty() {
            errors.push(ConfigError::new("forecast.price_profile", "must not be empty"));
        }
        if f.blocks == 0 {
            errors.push(ConfigError::new("forecast.blocks", "must be > 0"));
        }
        if f.kind != ForecastKind::Point && !is_positive(f.depth_mw) {
            errors.push(ConfigError::new("forecast.depth_mw", "must be > 0 for curve forecasts"));
        }
        if !is_non_negative(f.error_std) {
            errors.push(ConfigError::new("forecast.error_std", "must be >= 0"));
        }

        errors
    }

    fn validate_storage(&self, errors: &mut Vec<ConfigError>) {
        let s = &self.storage;
        if !is_non_negative(s.energy_to_power_ratio) {
            errors.push(ConfigError::new("storage.energy_to_power_ratio", "must be >= 0"));
        }
        if !is_non_negative(s.internal_power_mw) {
            errors.push(ConfigError::new("storage.internal_power_mw", "must be >= 0"));
        }
        if !(0.0..1.0).contains(&s.self_discharge_rate_per_hour) {
            errors.push(ConfigError::new("storage.self_discharge_rate_per_hour", "must be in [0.0, 1.0)"));
        }
        for (field, eta) in [("storage.eta_charge", s.eta_charge), ("storage.eta_discharge", s.eta_discharge)] {
            if !(is_positive(eta) && eta <= 1.0) {
                errors.push(ConfigError::new(field, "must be in (0.0, 1.0]"));
            }
        }
        if !(0.0..=s.capacity_mwh()).contains(&s.initial_energy_mwh) {
            errors.push(ConfigError::new("storage.initial_energy_mwh", "must be in [0, capacity]"));
        }
        for (field, profile) in [
            ("storage.charge_availability_profile", &s.charge_availability_profile),
            ("storage.discharge_availability_profile", &s.discharge_availability_profile),
        ] {
            if profile.iter().any(|share| !(0.0..=1.0).contains(share)) {
                errors.push(ConfigError::new(field, "values must be in [0.0, 1.0]"));
            }
        }
    }

    fn validate_load_shift(&self, errors: &mut Vec<ConfigError>) {
        let l = &self.load_shift;
        if !is_positive(l.energy_resolution_mwh) {
            errors.push(ConfigError::new("load_shift.energy_resolution_mwh", "must be > 0"));
        }
        if !is_non_negative(l.power_mw) {
            errors.push(ConfigError::new("load_shift.power_mw", "must be >= 0"));
        }
        for (field, share) in [
            ("load_shift.availability_up", l.availability_up),
            ("load_shift.availability_down", l.availability_down),
        ] {
            if !(0.0..=1.0).contains(&share) {
                errors.push(ConfigError::new(field, "must be in [0.0, 1.0]"));
            }
        }
        if !is_non_negative(l.energy_limit_up_mwh) || !is_non_negative(l.energy_limit_down_mwh) {
            errors.push(ConfigError::new("load_shift.energy_limit_up_mwh", "energy limits must be >= 0"));
        }
        if l.maximum_shift_time == 0 {
            errors.push(ConfigError::new("load_shift.maximum_shift_time", "must be > 0"));
        } else if l.initial_shift_time >= l.maximum_shift_time {
            errors.push(ConfigError::new(
                "load_shift.initial_shift_time",
                "must be < load_shift.maximum_shift_time",
            ));
        }
        if l.maximum_shift_time == 1 && l.initial_energy_mwh != 0.0 {
            errors.push(ConfigError::new(
                "load_shift.initial_energy_mwh",
                "must be 0 when load_shift.maximum_shift_time is 1",
            ));
        }
        if !(-l.energy_limit_down_mwh..=l.energy_limit_up_mwh).contains(&l.initial_energy_mwh) {
            errors.push(ConfigError::new(
                "load_shift.initial_energy_mwh",
                "must be within the energy limits",
            ));
        }
        if self.strategy.planner == PlannerKind::ShiftMaxProfitTariff && l.baseline_profile.is_empty() {
            errors.push(ConfigError::new("load_shift.baseline_profile", "must not be empty"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_presets_are_valid() {
        for name in ScenarioConfig::PRESETS {
            let cfg = ScenarioConfig::from_preset(name);
            assert!(cfg.is_ok(), "preset \"{name}\" should load");
            let errors = cfg.as_ref().map(|c| c.validate()).unwrap_or_default();
            assert!(errors.is_empty(), "preset \"{name}\" should be valid: {errors:?}");
        }
    }

    #[test]
    fn from_preset_unknown() {
        let err = ScenarioConfig::from_preset("nonexistent").unwrap_err();
        assert_eq!(err.field, "preset");
        assert!(err.message.contains("unknown preset"));
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[simulation]
periods = 72
seed = 7

[planning]
forecast_periods = 36
schedule_periods = 6
bid_tolerance = 0.01

[strategy]
planner = "heuristic_median"
forecast_update = "all"
assessment_polynomial = [0.0, 2.0]

[storage]
energy_to_power_ratio = 2.0
internal_power_mw = 5.0
initial_energy_mwh = 5.0

[forecast]
kind = "point"
price_profile = [30.0, 60.0]
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.simulation.periods, 72);
        assert_eq!(cfg.planning.schedule_periods, 6);
        assert_eq!(cfg.strategy.planner, PlannerKind::HeuristicMedian);
        assert_eq!(cfg.strategy.forecast_update, ForecastUpdateType::All);
        assert_eq!(cfg.strategy.assessment_polynomial, Polynomial::new(vec![0.0, 2.0]));
        assert_eq!(cfg.storage.capacity_mwh(), 10.0);
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn tariff_section_parses() {
        let toml = r#"
[strategy]
planner = "shift_max_profit_tariff"

[tariff]
surcharges_eur_per_mwh = 100.0
static_power_price = 80.0
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.tariff.static_power_price, Some(80.0));
        assert_eq!(cfg.tariff.vat, 0.0);
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[planning]
forecast_periods = 24
bogus_field = true
"#;
        assert!(ScenarioConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let cfg = ScenarioConfig::from_toml_str("[simulation]\nseed = 99\n").unwrap();
        assert_eq!(cfg.simulation.seed, 99);
        assert_eq!(cfg.simulation.periods, 48);
        assert_eq!(cfg.planning, PlanningSettings::default());
        assert_eq!(cfg.strategy.planner, PlannerKind::MaxProfit);
    }

    #[test]
    fn validation_catches_window_beyond_horizon() {
        let mut cfg = ScenarioConfig::arbitrage();
        cfg.planning.schedule_periods = 30;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "planning.schedule_periods"));
    }

    #[test]
    fn validation_catches_forecast_mismatch() {
        let mut cfg = ScenarioConfig::system_cost();
        cfg.forecast.kind = ForecastKind::Price;
        assert!(cfg.validate().iter().any(|e| e.field == "forecast.kind"));
    }

    #[test]
    fn validation_catches_bad_efficiency() {
        let mut cfg = ScenarioConfig::arbitrage();
        cfg.storage.eta_discharge = 1.2;
        assert!(cfg.validate().iter().any(|e| e.field == "storage.eta_discharge"));
    }

    #[test]
    fn validation_checks_only_the_dispatched_asset() {
        let mut cfg = ScenarioConfig::load_shift();
        cfg.storage.eta_charge = 0.0;
        assert!(cfg.validate().is_empty());
        cfg.load_shift.energy_resolution_mwh = 0.0;
        assert!(cfg
            .validate()
            .iter()
            .any(|e| e.field == "load_shift.energy_resolution_mwh"));
    }

    #[test]
    fn storage_availability_profiles_are_shares() {
        let mut cfg = ScenarioConfig::arbitrage();
        cfg.storage.charge_availability_profile = vec![1.0, 0.5, 0.0];
        assert!(cfg.validate().is_empty());

        cfg.storage.discharge_availability_profile = vec![1.2];
        let errors = cfg.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "storage.discharge_availability_profile");
    }

    #[test]
    fn single_period_shift_must_start_balanced() {
        let mut cfg = ScenarioConfig::load_shift();
        cfg.load_shift.maximum_shift_time = 1;
        cfg.load_shift.initial_shift_time = 0;
        assert!(cfg.validate().is_empty());
        cfg.load_shift.initial_energy_mwh = 1.0;
        assert!(cfg
            .validate()
            .iter()
            .any(|e| e.field == "load_shift.initial_energy_mwh"));
    }

    #[test]
    fn config_error_display() {
        let e = ConfigError::new("simulation.periods", "must be > 0");
        assert_eq!(e.to_string(), "config error: simulation.periods: must be > 0");
    }
}
