use super::{Assessment, MINIMAL_PRICE, SCARCITY_PRICE, Target};
use crate::devices::StorageDevice;
use crate::sensitivity::{Sensitivity, StepPower};
use crate::sim::clock::TimePeriod;

/// Index into a `2 * steps + 1` value array, saturating at both ends.
pub(super) fn step_index(steps: usize, state_delta: i64) -> usize {
    (steps as i64 + state_delta).clamp(0, 2 * steps as i64) as usize
}

/// Values of a sensitivity at each power step; zero if no forecast is available.
pub(super) fn values_in_steps(sensitivity: Option<&Sensitivity>, step_power: &StepPower, buffer: &mut Vec<f64>) {
    let steps = step_power.steps();
    buffer.clear();
    match sensitivity {
        Some(sensitivity) => buffer.extend(sensitivity.values_in_steps(
            step_power.power(steps as i64),
            -step_power.power(-(steps as i64)),
            steps,
        )),
        None => buffer.resize(2 * steps + 1, 0.0),
    }
}

fn storage_step_power(device: &StorageDevice, steps: usize) -> StepPower {
    StepPower::new(
        device.external_charging_power_mw(),
        device.external_discharging_power_mw(),
        steps,
    )
}

/// Maximises profits against a price curve, including the asset's own price impact.
#[derive(Debug, Clone)]
pub struct MaxProfit {
    step_power: StepPower,
    prices: Vec<f64>,
}

impl MaxProfit {
    pub fn new(device: &StorageDevice, transition_steps: usize) -> Self {
        Self {
            step_power: storage_step_power(device, transition_steps),
            prices: vec![0.0; 2 * transition_steps + 1],
        }
    }
}

impl Assessment for MaxProfit {
    fn target(&self) -> Target {
        Target::Maximise
    }

    fn prepare_for(&mut self, _period: &TimePeriod, sensitivity: Option<&Sensitivity>) {
        values_in_steps(sensitivity, &self.step_power, &mut self.prices);
    }

    fn value_of(&self, state_delta: i64) -> f64 {
        let price = self.prices[step_index(self.step_power.steps(), state_delta)];
        -self.step_power.power(state_delta) * price
    }

    fn bid_price(&self, state_delta: i64, _external_energy_mwh: f64) -> f64 {
        if state_delta == 0 {
            f64::NAN
        } else {
            self.prices[step_index(self.step_power.steps(), state_delta)]
        }
    }
}

/// Maximises profits against a single price forecast, ignoring own price impact.
///
/// Bids at the price limits so that planned dispatch is always awarded.
#[derive(Debug, Clone)]
pub struct MaxProfitPriceTaker {
    step_power: StepPower,
    price: f64,
}

impl MaxProfitPriceTaker {
    pub fn new(device: &StorageDevice, transition_steps: usize) -> Self {
        Self {
            step_power: storage_step_power(device, transition_steps),
            price: 0.0,
        }
    }
}

impl Assessment for MaxProfitPriceTaker {
    fn target(&self) -> Target {
        Target::Maximise
    }

    fn prepare_for(&mut self, _period: &TimePeriod, sensitivity: Option<&Sensitivity>) {
        self.price = sensitivity.map_or(0.0, Sensitivity::point_price);
    }

    fn value_of(&self, state_delta: i64) -> f64 {
        -self.step_power.power(state_delta) * self.price
    }

    fn bid_price(&self, _state_delta: i64, external_energy_mwh: f64) -> f64 {
        if external_energy_mwh == 0.0 {
            f64::NAN
        } else if external_energy_mwh < 0.0 {
            MINIMAL_PRICE
        } else {
            SCARCITY_PRICE
        }
    }
}

/// Minimises total system cost using a marginal-cost curve.
#[derive(Debug, Clone)]
pub struct MinSystemCost {
    step_power: StepPower,
    costs: Vec<f64>,
}

impl MinSystemCost {
    pub fn new(device: &StorageDevice, transition_steps: usize) -> Self {
        Self {
            step_power: storage_step_power(device, transition_steps),
            costs: vec![0.0; 2 * transition_steps + 1],
        }
    }
}

impl Assessment for MinSystemCost {
    fn target(&self) -> Target {
        Target::Minimise
    }

    fn prepare_for(&mut self, _period: &TimePeriod, sensitivity: Option<&Sensitivity>) {
        values_in_steps(sensitivity, &self.step_power, &mut self.costs);
    }

    fn value_of(&self, state_delta: i64) -> f64 {
        self.costs[step_index(self.step_power.steps(), state_delta)]
    }

    fn bid_price(&self, _state_delta: i64, external_energy_mwh: f64) -> f64 {
        if external_energy_mwh == 0.0 {
            f64::NAN
        } else if external_energy_mwh > 0.0 {
            f64::MAX
        } else {
            -f64::MAX
        }
    }
}
