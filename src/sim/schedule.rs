//! Committable dispatch schedules produced by the planners.

use crate::error::PlanningError;
use crate::sim::clock::{TimePeriod, TimeStamp};

/// Maximum deviation between actual and expected energy for a schedule to stay valid (MWh).
pub const ENERGY_TOLERANCE_MWH: f64 = 1e-3;

/// Near-term dispatch plan: per period the requested external energy, the bid price and the
/// internal energy the asset is expected to hold at the period start.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    first: TimePeriod,
    energy_delta_mwh: Vec<f64>,
    bid_prices: Vec<f64>,
    expected_energy_mwh: Vec<f64>,
}

impl Schedule {
    /// Creates a schedule starting at `first`; all arrays must have the same non-zero length.
    pub fn new(
        first: TimePeriod,
        energy_delta_mwh: Vec<f64>,
        bid_prices: Vec<f64>,
        expected_energy_mwh: Vec<f64>,
    ) -> Result<Self, PlanningError> {
        let expected = energy_delta_mwh.len();
        if expected == 0 {
            return Err(PlanningError::ScheduleLength {
                array: "energy_delta",
                expected: 1,
                actual: 0,
            });
        }
        for (array, actual) in [("bid_prices", bid_prices.len()), ("expected_energy", expected_energy_mwh.len())] {
            if actual != expected {
                return Err(PlanningError::ScheduleLength {
                    array,
                    expected,
                    actual,
                });
            }
        }
        Ok(Self {
            first,
            energy_delta_mwh,
            bid_prices,
            expected_energy_mwh,
        })
    }

    pub fn first_period(&self) -> TimePeriod {
        self.first
    }

    /// Number of periods covered.
    pub fn duration(&self) -> usize {
        self.energy_delta_mwh.len()
    }

    /// Schedule element for `time`, if `time` is the start of a covered period.
    pub fn period_index(&self, time: TimeStamp) -> Option<usize> {
        let span = self.first.duration().0;
        let offset = time.0 - self.first.start().0;
        if offset < 0 || offset % span != 0 {
            return None;
        }
        let index = (offset / span) as usize;
        (index < self.duration()).then_some(index)
    }

    /// Returns true if `time` is a covered period start and `energy_mwh` matches the
    /// expected energy of that period within [`ENERGY_TOLERANCE_MWH`].
    pub fn is_applicable(&self, time: TimeStamp, energy_mwh: f64) -> bool {
        self.period_index(time)
            .is_some_and(|index| (self.expected_energy_mwh[index] - energy_mwh).abs() < ENERGY_TOLERANCE_MWH)
    }

    /// Requested external energy at `time` (positive = charging).
    pub fn power_delta_at(&self, time: TimeStamp) -> Option<f64> {
        self.period_index(time).map(|index| self.energy_delta_mwh[index])
    }

    pub fn bid_price_at(&self, time: TimeStamp) -> Option<f64> {
        self.period_index(time).map(|index| self.bid_prices[index])
    }

    /// Energy to buy at `time`; zero when discharging.
    pub fn purchase_at(&self, time: TimeStamp) -> Option<f64> {
        self.power_delta_at(time).map(|delta| delta.max(0.0))
    }

    /// Energy to sell at `time`; zero when charging.
    pub fn sales_at(&self, time: TimeStamp) -> Option<f64> {
        self.power_delta_at(time).map(|delta| (-delta).max(0.0))
    }

    pub fn energy_deltas(&self) -> &[f64] {
        &self.energy_delta_mwh
    }

    pub fn bid_prices(&self) -> &[f64] {
        &self.bid_prices
    }

    pub fn expected_energies(&self) -> &[f64] {
        &self.expected_energy_mwh
    }
}
