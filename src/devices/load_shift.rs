use crate::devices::types::{Device, DeviceContext};
use crate::sim::clock::{TimePeriod, TimeStamp};
use crate::sim::series::TimeSeries;

/// Energy levels within this band around zero count as balanced.
const STORAGE_TOLERANCE: f64 = 1e-3;

/// A portfolio of loads that can be shifted up or down in time.
///
/// The shifted energy behaves like a fictitious storage: shifting load up raises the level,
/// shifting it down lowers it. A non-zero level must be balanced within the maximum shift time.
#[derive(Debug, Clone)]
pub struct LoadShiftPortfolio {
    /// Maximum shiftable power in MW.
    pub power_mw: f64,
    /// Share of `power_mw` available for shifting up, per time.
    pub power_up_availability: TimeSeries,
    /// Share of `power_mw` available for shifting down, per time.
    pub power_down_availability: TimeSeries,
    /// Energy represented by one discrete energy state (MWh).
    pub energy_resolution_mwh: f64,
    /// Upper bound of the shifted energy level (MWh, positive).
    pub energy_limit_up_mwh: f64,
    /// Lower bound of the shifted energy level (MWh, positive magnitude).
    pub energy_limit_down_mwh: f64,
    /// Number of periods a shift may last, counting the balanced period.
    pub maximum_shift_time: usize,
    /// Variable cost of shifting in EUR/MWh, interpolated linearly.
    pub variable_shift_cost: TimeSeries,
    /// Baseline load relative to `baseline_peak_load_mw`.
    pub baseline_load: TimeSeries,
    /// Peak of the baseline load in MW.
    pub baseline_peak_load_mw: f64,
    energy_level_mwh: f64,
    shift_time: usize,
    accounted_prolonging_cost: f64,
}

impl LoadShiftPortfolio {
    /// Creates a new load-shifting portfolio.
    ///
    /// The initial energy is clamped to the energy limits, the initial shift time to
    /// `[0, maximum_shift_time - 1]`.
    ///
    /// # Panics
    ///
    /// Panics if the resolution is not positive or the maximum shift time is zero.
    #[expect(clippy::too_many_arguments)]
    pub fn new(
        power_mw: f64,
        power_up_availability: TimeSeries,
        power_down_availability: TimeSeries,
        energy_resolution_mwh: f64,
        energy_limit_up_mwh: f64,
        energy_limit_down_mwh: f64,
        maximum_shift_time: usize,
        variable_shift_cost: TimeSeries,
        baseline_load: TimeSeries,
        baseline_peak_load_mw: f64,
        initial_energy_mwh: f64,
        initial_shift_time: usize,
    ) -> Self {
        assert!(energy_resolution_mwh > 0.0, "energy resolution must be > 0");
        assert!(maximum_shift_time > 0, "maximum shift time must be > 0");

        let mut portfolio = Self {
            power_mw,
            power_up_availability,
            power_down_availability,
            energy_resolution_mwh,
            energy_limit_up_mwh,
            energy_limit_down_mwh,
            maximum_shift_time,
            variable_shift_cost,
            baseline_load,
            baseline_peak_load_mw,
            energy_level_mwh: 0.0,
            shift_time: 0,
            accounted_prolonging_cost: 0.0,
        };
        portfolio.set_energy_level(initial_energy_mwh);
        portfolio.set_shift_time(initial_shift_time);
        portfolio
    }

    pub fn shift_time(&self) -> usize {
        self.shift_time
    }

    /// Power available for shifting up in `period` (MW).
    pub fn max_power_up_mw(&self, period: &TimePeriod) -> f64 {
        self.power_up_availability.value_earlier_equal(period.start()) * self.power_mw
    }

    /// Power available for shifting down in `period` (MW).
    pub fn max_power_down_mw(&self, period: &TimePeriod) -> f64 {
        self.power_down_availability.value_earlier_equal(period.start()) * self.power_mw
    }

    pub fn variable_shift_cost_at(&self, time: TimeStamp) -> f64 {
        self.variable_shift_cost.value_linear(time)
    }

    /// Cost of prolonging the current shift by applying `energy_mwh` at `time`.
    ///
    /// Non-zero only if the shift has reached its last allowed period and is continued.
    pub fn prolonging_cost(&self, energy_mwh: f64, time: TimeStamp) -> f64 {
        if self.is_prolonged_shift(energy_mwh) {
            self.energy_level_mwh.abs() * self.variable_shift_cost_at(time)
        } else {
            0.0
        }
    }

    /// Prolonging costs accumulated over all dispatched periods.
    pub fn accounted_prolonging_cost(&self) -> f64 {
        self.accounted_prolonging_cost
    }

    fn is_prolonged_shift(&self, energy_mwh: f64) -> bool {
        let level = self.energy_level_mwh;
        if self.shift_time + 1 != self.maximum_shift_time || is_zero_level(level) {
            return false;
        }
        energy_mwh == 0.0
            || (energy_mwh > 0.0 && level > -STORAGE_TOLERANCE)
            || (energy_mwh < 0.0 && level < STORAGE_TOLERANCE)
    }

    fn set_energy_level(&mut self, energy_mwh: f64) {
        self.energy_level_mwh = energy_mwh.clamp(-self.energy_limit_down_mwh, self.energy_limit_up_mwh);
    }

    fn set_shift_time(&mut self, shift_time: usize) {
        self.shift_time = shift_time.min(self.maximum_shift_time - 1);
    }
}

fn is_zero_level(energy_mwh: f64) -> bool {
    (-STORAGE_TOLERANCE..=STORAGE_TOLERANCE).contains(&energy_mwh)
}

fn is_change_of_sign(initial: f64, last: f64) -> bool {
    !is_zero_level(initial) && !is_zero_level(last) && initial.signum() != last.signum()
}

impl Device for LoadShiftPortfolio {
    /// Shifts load by the requested energy and advances the shift time.
    fn dispatch(&mut self, context: &DeviceContext) -> f64 {
        let requested = context.requested_mwh.unwrap_or(0.0).clamp(
            -self.max_power_down_mw(&context.period),
            self.max_power_up_mw(&context.period),
        );
        let initial = self.energy_level_mwh;
        let target = initial + requested;

        let time = context.period.start();
        self.accounted_prolonging_cost += self.prolonging_cost(requested, time);

        let next_shift_time = if self.is_prolonged_shift(requested) {
            1
        } else if is_zero_level(target) {
            0
        } else if is_change_of_sign(initial, target) {
            1
        } else {
            self.shift_time + 1
        };
        self.set_shift_time(next_shift_time);
        self.set_energy_level(target);
        self.energy_level_mwh - initial
    }

    fn energy_level_mwh(&self) -> f64 {
        self.energy_level_mwh
    }

    fn device_type(&self) -> &'static str {
        "LoadShift"
    }
}
