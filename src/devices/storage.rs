use crate::devices::types::{Device, DeviceContext};
use crate::sim::clock::TimePeriod;
use crate::sim::series::TimeSeries;

/// An energy storage system trading its charge and discharge on the market.
///
/// Internal quantities refer to energy inside the storage; external quantities refer to
/// energy exchanged with the market, i.e. including conversion losses.
///
/// # Energy Convention
/// - Positive: Charging (buying energy)
/// - Negative: Discharging (selling energy)
#[derive(Debug, Clone)]
pub struct StorageDevice {
    /// Ratio of capacity to internal power (hours).
    pub energy_to_power_ratio: f64,

    /// Internal charging and discharging power in MW.
    pub internal_power_mw: f64,

    /// Share of the stored energy lost per hour (0..1).
    pub self_discharge_rate_per_hour: f64,

    /// Charging efficiency (0..1.0).
    pub eta_c: f64,

    /// Discharging efficiency (0..1.0).
    pub eta_d: f64,

    /// Share of the internal power available for charging over time (0..1).
    pub charge_availability: TimeSeries,

    /// Share of the internal power available for discharging over time (0..1).
    pub discharge_availability: TimeSeries,

    /// Current internal energy in MWh.
    energy_mwh: f64,

    /// Net internal energy moved since the last accounting reset.
    accounted_energy_flows_mwh: f64,

    /// Equivalent full cycles since the last accounting reset.
    accounted_full_cycles: f64,
}

impl StorageDevice {
    /// Creates a new storage device.
    ///
    /// # Arguments
    ///
    /// * `energy_to_power_ratio` - Capacity divided by internal power (must be >= 0)
    /// * `internal_power_mw` - Internal power in MW (must be >= 0)
    /// * `self_discharge_rate_per_hour` - Fractional self discharge per hour (0..1)
    /// * `eta_c` - Charging efficiency (0..1.0)
    /// * `eta_d` - Discharging efficiency (0..1.0)
    /// * `initial_energy_mwh` - Initial energy, clamped to the capacity
    ///
    /// # Panics
    ///
    /// Panics on negative sizing, invalid efficiencies or self discharge out of range.
    pub fn new(
        energy_to_power_ratio: f64,
        internal_power_mw: f64,
        self_discharge_rate_per_hour: f64,
        eta_c: f64,
        eta_d: f64,
        initial_energy_mwh: f64,
    ) -> Self {
        assert!(energy_to_power_ratio >= 0.0);
        assert!(internal_power_mw >= 0.0);
        assert!((0.0..1.0).contains(&self_discharge_rate_per_hour));
        assert!(eta_c > 0.0 && eta_c <= 1.0);
        assert!(eta_d > 0.0 && eta_d <= 1.0);

        let capacity = energy_to_power_ratio * internal_power_mw;
        Self {
            energy_to_power_ratio,
            internal_power_mw,
            self_discharge_rate_per_hour,
            eta_c,
            eta_d,
            charge_availability: TimeSeries::constant(1.0),
            discharge_availability: TimeSeries::constant(1.0),
            energy_mwh: initial_energy_mwh.clamp(0.0, capacity),
            accounted_energy_flows_mwh: 0.0,
            accounted_full_cycles: 0.0,
        }
    }

    /// Replaces the full-power availability with time-varying shares of the internal power.
    pub fn with_availability(mut self, charge: TimeSeries, discharge: TimeSeries) -> Self {
        self.charge_availability = charge;
        self.discharge_availability = discharge;
        self
    }

    /// Internal charging power available in `period` (MW).
    pub fn max_charging_power_mw(&self, period: &TimePeriod) -> f64 {
        self.charge_availability.value_earlier_equal(period.start()).clamp(0.0, 1.0) * self.internal_power_mw
    }

    /// Internal discharging power available in `period` (MW).
    pub fn max_discharging_power_mw(&self, period: &TimePeriod) -> f64 {
        self.discharge_availability.value_earlier_equal(period.start()).clamp(0.0, 1.0) * self.internal_power_mw
    }

    /// Storage capacity in MWh.
    pub fn capacity_mwh(&self) -> f64 {
        self.energy_to_power_ratio * self.internal_power_mw
    }

    /// External power drawn at full internal charging power.
    pub fn external_charging_power_mw(&self) -> f64 {
        self.internal_power_mw / self.eta_c
    }

    /// External power delivered at full internal discharging power.
    pub fn external_discharging_power_mw(&self) -> f64 {
        self.internal_power_mw * self.eta_d
    }

    pub fn round_trip_efficiency(&self) -> f64 {
        self.eta_c * self.eta_d
    }

    /// Converts an internal energy change to the external energy exchanged with the market.
    pub fn internal_to_external(&self, internal_delta_mwh: f64) -> f64 {
        if internal_delta_mwh > 0.0 {
            internal_delta_mwh / self.eta_c
        } else {
            internal_delta_mwh * self.eta_d
        }
    }

    /// Converts an external energy exchange to the resulting internal energy change.
    pub fn external_to_internal(&self, external_delta_mwh: f64) -> f64 {
        if external_delta_mwh > 0.0 {
            external_delta_mwh * self.eta_c
        } else {
            external_delta_mwh / self.eta_d
        }
    }

    /// Internal energy lost to self discharge within one period at the given level.
    pub fn self_discharge_mwh(&self, energy_mwh: f64) -> f64 {
        energy_mwh * self.self_discharge_rate_per_hour
    }

    /// Clamps an energy level to `[0, capacity]`.
    pub fn within_energy_bounds(&self, energy_mwh: f64) -> f64 {
        energy_mwh.clamp(0.0, self.capacity_mwh())
    }

    pub fn accounted_energy_flows_mwh(&self) -> f64 {
        self.accounted_energy_flows_mwh
    }

    pub fn accounted_full_cycles(&self) -> f64 {
        self.accounted_full_cycles
    }

    /// Resets energy flow and cycle accounting.
    pub fn reset_accounting(&mut self) {
        self.accounted_energy_flows_mwh = 0.0;
        self.accounted_full_cycles = 0.0;
    }
}

impl Device for StorageDevice {
    /// Charges or discharges by the requested external energy for one period.
    ///
    /// Enforces the period's internal power limits, self discharge and capacity bounds.
    fn dispatch(&mut self, context: &DeviceContext) -> f64 {
        let requested = context.requested_mwh.unwrap_or(0.0);

        let internal_request = self.external_to_internal(requested).clamp(
            -self.max_discharging_power_mw(&context.period),
            self.max_charging_power_mw(&context.period),
        );
        let self_discharge = self.self_discharge_mwh(self.energy_mwh);
        let next_energy = self.within_energy_bounds(self.energy_mwh + internal_request - self_discharge);

        let internal_delta = next_energy - self.energy_mwh;
        self.energy_mwh = next_energy;

        self.accounted_energy_flows_mwh += internal_delta;
        let capacity = self.capacity_mwh();
        if capacity > 0.0 {
            self.accounted_full_cycles += internal_delta.abs() / (2.0 * capacity);
        }
        self.internal_to_external(internal_delta + self_discharge)
    }

    fn energy_level_mwh(&self) -> f64 {
        self.energy_mwh
    }

    fn device_type(&self) -> &'static str {
        "Storage"
    }
}
