//! Forecast sensitivities: per-period price or marginal-cost response to a change in demand.

use std::cmp::Ordering;

/// One block of a merit-order sensitivity curve.
#[derive(Debug, Clone, PartialEq)]
pub struct SensitivityItem {
    /// Block power (MW).
    pub power_mw: f64,
    /// Offer price of the block (EUR/MWh).
    pub price: f64,
    /// Marginal cost of the block (EUR/MWh).
    pub marginal: f64,
    cumulated_lower_power_mw: f64,
    monetary_offset: f64,
}

impl SensitivityItem {
    pub fn new(power_mw: f64, price: f64, marginal: f64) -> Self {
        Self {
            power_mw,
            price,
            marginal,
            cumulated_lower_power_mw: 0.0,
            monetary_offset: 0.0,
        }
    }

    /// Power of all blocks preceding this one on its side of the curve.
    pub fn cumulated_lower_power_mw(&self) -> f64 {
        self.cumulated_lower_power_mw
    }

    pub fn cumulated_upper_power_mw(&self) -> f64 {
        self.cumulated_lower_power_mw + self.power_mw
    }

    /// Accumulated marginal cost of all preceding blocks.
    pub fn monetary_offset(&self) -> f64 {
        self.monetary_offset
    }
}

/// What a merit-order sensitivity returns for a demand change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensitivityKind {
    /// Market clearing price after the change.
    Price,
    /// Change of total system marginal cost.
    MarginalCost,
}

/// A price or cost response curve split into a charging and a discharging side.
///
/// Charging items are sorted by ascending price (ties by power for marginal-cost curves);
/// discharging items by descending price.
#[derive(Debug, Clone, PartialEq)]
pub struct MeritOrderSensitivity {
    kind: SensitivityKind,
    charging: Vec<SensitivityItem>,
    discharging: Vec<SensitivityItem>,
}

impl MeritOrderSensitivity {
    /// Builds a sensitivity curve from unsorted charging and discharging blocks.
    ///
    /// # Arguments
    ///
    /// * `kind` - Whether the curve yields prices or marginal costs
    /// * `charging` - Blocks that additional demand would move along
    /// * `discharging` - Blocks that additional supply would displace
    pub fn new(
        kind: SensitivityKind,
        mut charging: Vec<SensitivityItem>,
        mut discharging: Vec<SensitivityItem>,
    ) -> Self {
        charging.retain(|item| item.power_mw > 0.0);
        discharging.retain(|item| item.power_mw > 0.0);
        charging.sort_by(|a, b| compare_items(kind, a, b));
        discharging.sort_by(|a, b| compare_items(kind, b, a));
        set_cumulative_values(&mut charging);
        set_cumulative_values(&mut discharging);
        Self {
            kind,
            charging,
            discharging,
        }
    }

    pub fn kind(&self) -> SensitivityKind {
        self.kind
    }

    pub fn charging_items(&self) -> &[SensitivityItem] {
        &self.charging
    }

    pub fn discharging_items(&self) -> &[SensitivityItem] {
        &self.discharging
    }

    /// Returns true if neither side holds any block.
    pub fn is_empty(&self) -> bool {
        self.charging.is_empty() && self.discharging.is_empty()
    }

    /// Curve value for an external energy change.
    ///
    /// Positive deltas charge, negative deltas discharge. Returns 0 at zero delta and NaN
    /// if the curve does not reach the requested energy.
    pub fn value_at(&self, energy_delta_mwh: f64) -> f64 {
        if energy_delta_mwh > 0.0 {
            self.charging
                .iter()
                .find(|item| item.cumulated_upper_power_mw() >= energy_delta_mwh)
                .map_or(f64::NAN, |item| self.item_value(item, energy_delta_mwh))
        } else if energy_delta_mwh < 0.0 {
            self.discharging
                .iter()
                .find(|item| item.cumulated_upper_power_mw() >= -energy_delta_mwh)
                .map_or(f64::NAN, |item| self.item_value(item, energy_delta_mwh))
        } else {
            0.0
        }
    }

    fn item_value(&self, item: &SensitivityItem, power: f64) -> f64 {
        match self.kind {
            SensitivityKind::Price => item.price,
            SensitivityKind::MarginalCost => {
                if power > 0.0 {
                    item.monetary_offset + (power - item.cumulated_lower_power_mw) * item.marginal
                } else {
                    -item.monetary_offset + (power + item.cumulated_lower_power_mw) * item.marginal
                }
            }
        }
    }

    /// Price of the cheapest charging block, i.e. the price without any added demand.
    pub fn price_without_charging(&self) -> f64 {
        self.charging.first().map_or(0.0, |item| item.price)
    }
}

fn compare_items(kind: SensitivityKind, a: &SensitivityItem, b: &SensitivityItem) -> Ordering {
    let by_price = a.price.total_cmp(&b.price);
    match kind {
        SensitivityKind::Price => by_price,
        SensitivityKind::MarginalCost => by_price.then(a.power_mw.total_cmp(&b.power_mw)),
    }
}

fn set_cumulative_values(items: &mut [SensitivityItem]) {
    let mut cumulated = 0.0;
    let mut offset = 0.0;
    for item in items {
        item.cumulated_lower_power_mw = cumulated;
        item.monetary_offset = offset;
        cumulated += item.power_mw;
        offset += item.power_mw * item.marginal;
    }
}

/// Forecast object stored per planning period.
#[derive(Debug, Clone, PartialEq)]
pub enum Sensitivity {
    /// Full response curve capturing the asset's own market impact.
    MeritOrder(MeritOrderSensitivity),
    /// Single-point price forecast without self impact.
    PricePoint(f64),
}

impl Sensitivity {
    /// Returns `2 * steps + 1` values for evenly spaced power steps, from full discharge
    /// (index 0) over no change (index `steps`, always 0) to full charge.
    ///
    /// # Arguments
    ///
    /// * `charge_power_mw` - External power reached at `+steps`
    /// * `discharge_power_mw` - External power reached at `-steps`
    /// * `steps` - Number of steps per direction
    pub fn values_in_steps(&self, charge_power_mw: f64, discharge_power_mw: f64, steps: usize) -> Vec<f64> {
        let mut values = vec![0.0; 2 * steps + 1];
        if steps == 0 {
            return values;
        }
        match self {
            Self::PricePoint(price) => {
                for (i, value) in values.iter_mut().enumerate() {
                    if i != steps {
                        *value = *price;
                    }
                }
            }
            Self::MeritOrder(curve) => {
                let charge_per_step = charge_power_mw / steps as f64;
                let discharge_per_step = discharge_power_mw / steps as f64;
                for step in 1..=steps {
                    values[steps + step] = curve.value_at(charge_per_step * step as f64);
                    values[steps - step] = curve.value_at(-discharge_per_step * step as f64);
                }
            }
        }
        values
    }

    /// Scalar price forecast of this sensitivity.
    pub fn point_price(&self) -> f64 {
        match self {
            Self::PricePoint(price) => *price,
            Self::MeritOrder(curve) => curve.price_without_charging(),
        }
    }

    /// Curve value at an energy change; a point forecast returns its price for any non-zero change.
    pub fn value_at(&self, energy_delta_mwh: f64) -> f64 {
        match self {
            Self::PricePoint(price) if energy_delta_mwh != 0.0 => *price,
            Self::PricePoint(_) => 0.0,
            Self::MeritOrder(curve) => curve.value_at(energy_delta_mwh),
        }
    }
}

/// External energy associated with each discrete step of a transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepPower {
    charging_step_mw: f64,
    discharging_step_mw: f64,
    steps: usize,
}

impl StepPower {
    /// Splits the external charge and discharge power into `steps` equal steps.
    pub fn new(charge_power_mw: f64, discharge_power_mw: f64, steps: usize) -> Self {
        let divisor = steps.max(1) as f64;
        Self {
            charging_step_mw: charge_power_mw / divisor,
            discharging_step_mw: discharge_power_mw / divisor,
            steps,
        }
    }

    /// External energy for a signed step delta; deltas beyond `steps` saturate.
    pub fn power(&self, step_delta: i64) -> f64 {
        let limit = self.steps as i64;
        let delta = step_delta.clamp(-limit, limit) as f64;
        if delta >= 0.0 {
            delta * self.charging_step_mw
        } else {
            delta * self.discharging_step_mw
        }
    }

    pub fn steps(&self) -> usize {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price_curve() -> MeritOrderSensitivity {
        MeritOrderSensitivity::new(
            SensitivityKind::Price,
            vec![
                SensitivityItem::new(10.0, 60.0, 55.0),
                SensitivityItem::new(10.0, 50.0, 45.0),
            ],
            vec![
                SensitivityItem::new(10.0, 30.0, 25.0),
                SensitivityItem::new(10.0, 40.0, 35.0),
            ],
        )
    }

    #[test]
    fn items_are_sorted_and_cumulated() {
        let curve = price_curve();
        let charging: Vec<f64> = curve.charging_items().iter().map(|i| i.price).collect();
        let discharging: Vec<f64> = curve.discharging_items().iter().map(|i| i.price).collect();
        assert_eq!(charging, vec![50.0, 60.0]);
        assert_eq!(discharging, vec![40.0, 30.0]);
        assert_eq!(curve.charging_items()[1].cumulated_lower_power_mw(), 10.0);
        assert_eq!(curve.charging_items()[1].monetary_offset(), 450.0);
    }

    #[test]
    fn price_value_follows_blocks() {
        let curve = price_curve();
        assert_eq!(curve.value_at(0.0), 0.0);
        assert_eq!(curve.value_at(5.0), 50.0);
        assert_eq!(curve.value_at(15.0), 60.0);
        assert_eq!(curve.value_at(-5.0), 40.0);
        assert_eq!(curve.value_at(-20.0), 30.0);
        assert!(curve.value_at(25.0).is_nan());
    }

    #[test]
    fn marginal_cost_value_accumulates_offset() {
        let curve = MeritOrderSensitivity::new(
            SensitivityKind::MarginalCost,
            vec![SensitivityItem::new(10.0, 50.0, 40.0), SensitivityItem::new(10.0, 70.0, 60.0)],
            vec![SensitivityItem::new(10.0, 30.0, 20.0)],
        );
        // 10 MW at 40 plus 5 MW at 60
        assert!((curve.value_at(15.0) - 700.0).abs() < 1e-9);
        assert!((curve.value_at(-5.0) - (-100.0)).abs() < 1e-9);
    }

    #[test]
    fn values_in_steps_has_zero_middle() {
        let sens = Sensitivity::MeritOrder(price_curve());
        let values = sens.values_in_steps(20.0, 20.0, 2);
        assert_eq!(values, vec![30.0, 40.0, 0.0, 50.0, 60.0]);
    }

    #[test]
    fn point_price_fills_all_but_middle() {
        let sens = Sensitivity::PricePoint(42.0);
        assert_eq!(sens.values_in_steps(1.0, 1.0, 1), vec![42.0, 0.0, 42.0]);
        assert_eq!(sens.point_price(), 42.0);
    }

    #[test]
    fn step_power_uses_side_specific_step() {
        let sp = StepPower::new(4.0, 2.0, 2);
        assert_eq!(sp.power(2), 4.0);
        assert_eq!(sp.power(1), 2.0);
        assert_eq!(sp.power(-1), -1.0);
        assert_eq!(sp.power(-5), -2.0);
    }
}
