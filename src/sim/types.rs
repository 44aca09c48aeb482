//! Per-period records of a dispatch run.

use std::fmt;

/// Complete record of one dispatched operation period.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// Index of the period within the run.
    pub index: usize,
    /// Start of the period in ticks.
    pub period_start: i64,
    /// External energy requested by the schedule (MWh; positive = purchase).
    pub requested_mwh: f64,
    /// External energy the asset actually exchanged (MWh).
    pub realised_mwh: f64,
    /// Bid price of the schedule for this period (EUR/MWh).
    pub bid_price: f64,
    /// Price the period settled at (EUR/MWh).
    pub realised_price: f64,
    /// Revenue of the period: sales minus purchases (EUR).
    pub revenue_eur: f64,
    /// Asset energy level after dispatch (MWh).
    pub energy_level_mwh: f64,
    /// Whether a new schedule was created at the start of this period.
    pub replanned: bool,
}

impl StepResult {
    /// Energy bought in this period (MWh, >= 0).
    pub fn purchased_mwh(&self) -> f64 {
        self.realised_mwh.max(0.0)
    }

    /// Energy sold in this period (MWh, >= 0).
    pub fn sold_mwh(&self) -> f64 {
        (-self.realised_mwh).max(0.0)
    }
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:>3} | req={:>7.3} MWh  real={:>7.3} MWh | bid={:>9.3}  price={:>8.2} \
             rev={:>9.2} EUR | level={:>7.3} MWh{}",
            self.index,
            self.requested_mwh,
            self.realised_mwh,
            self.bid_price,
            self.realised_price,
            self.revenue_eur,
            self.energy_level_mwh,
            if self.replanned { "  [replan]" } else { "" },
        )
    }
}
