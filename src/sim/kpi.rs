//! Post-hoc KPI computation from dispatch results.

use std::fmt;

use super::types::StepResult;

/// Aggregate key performance indicators derived from a complete run.
///
/// Computed post-hoc from `Vec<StepResult>` to ensure consistency between
/// step data and reported metrics.
#[derive(Debug, Clone)]
pub struct KpiReport {
    /// Sum of sales minus purchases at realised prices (EUR).
    pub revenue_eur: f64,
    /// Energy bought from the market (MWh).
    pub purchased_mwh: f64,
    /// Energy sold to the market (MWh).
    pub sold_mwh: f64,
    /// Total external energy throughput (MWh, sum of |energy|).
    pub throughput_mwh: f64,
    /// Equivalent full cycles (throughput / 2*capacity).
    pub equivalent_full_cycles: f64,
    /// Number of schedules created during the run.
    pub replan_count: usize,
    /// Sum of |requested - realised| over all periods (MWh).
    pub dispatch_deviation_mwh: f64,
}

impl KpiReport {
    /// Computes all KPIs from the complete step record vector.
    ///
    /// # Arguments
    ///
    /// * `results` - Complete step results
    /// * `capacity_mwh` - Energy capacity for the cycle calculation; 0 disables it
    pub fn from_results(results: &[StepResult], capacity_mwh: f64) -> Self {
        let mut revenue = 0.0;
        let mut purchased = 0.0;
        let mut sold = 0.0;
        let mut deviation = 0.0;
        let mut replans = 0;

        for r in results {
            revenue += r.revenue_eur;
            purchased += r.purchased_mwh();
            sold += r.sold_mwh();
            deviation += (r.requested_mwh - r.realised_mwh).abs();
            if r.replanned {
                replans += 1;
            }
        }

        let throughput = purchased + sold;
        let cycles = if capacity_mwh > 0.0 {
            throughput / (2.0 * capacity_mwh)
        } else {
            0.0
        };

        Self {
            revenue_eur: revenue,
            purchased_mwh: purchased,
            sold_mwh: sold,
            throughput_mwh: throughput,
            equivalent_full_cycles: cycles,
            replan_count: replans,
            dispatch_deviation_mwh: deviation,
        }
    }
}

impl fmt::Display for KpiReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- KPI Report ---")?;
        writeln!(f, "Revenue:               {:.2} EUR", self.revenue_eur)?;
        writeln!(f, "Purchased:             {:.3} MWh", self.purchased_mwh)?;
        writeln!(f, "Sold:                  {:.3} MWh", self.sold_mwh)?;
        writeln!(
            f,
            "Throughput:            {:.3} MWh ({:.2} equiv. cycles)",
            self.throughput_mwh, self.equivalent_full_cycles
        )?;
        writeln!(f, "Dispatch deviation:    {:.3} MWh", self.dispatch_deviation_mwh)?;
        write!(f, "Replans:               {}", self.replan_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_result(realised_mwh: f64, price: f64, replanned: bool) -> StepResult {
        StepResult {
            index: 0,
            period_start: 0,
            requested_mwh: realised_mwh,
            realised_mwh,
            bid_price: price,
            realised_price: price,
            revenue_eur: -realised_mwh * price,
            energy_level_mwh: 0.0,
            replanned,
        }
    }

    #[test]
    fn revenue_and_volumes() {
        let results = vec![
            make_result(2.0, 10.0, true),
            make_result(-1.0, 50.0, false),
            make_result(-1.0, 60.0, true),
        ];
        let kpi = KpiReport::from_results(&results, 2.0);
        assert!((kpi.revenue_eur - 90.0).abs() < 1e-9);
        assert_eq!(kpi.purchased_mwh, 2.0);
        assert_eq!(kpi.sold_mwh, 2.0);
        assert_eq!(kpi.throughput_mwh, 4.0);
        assert_eq!(kpi.equivalent_full_cycles, 1.0);
        assert_eq!(kpi.replan_count, 2);
    }

    #[test]
    fn deviation_counts_unrealised_requests() {
        let mut r = make_result(1.0, 10.0, false);
        r.requested_mwh = 1.5;
        let kpi = KpiReport::from_results(&[r], 0.0);
        assert_eq!(kpi.dispatch_deviation_mwh, 0.5);
        assert_eq!(kpi.equivalent_full_cycles, 0.0);
    }

    #[test]
    fn empty_results() {
        let kpi = KpiReport::from_results(&[], 1.0);
        assert_eq!(kpi.revenue_eur, 0.0);
        assert_eq!(kpi.replan_count, 0);
        assert!(format!("{kpi}").starts_with("--- KPI Report ---"));
    }
}
