use tracing::debug;

use super::assessment::{step_index, values_in_steps};
use super::{Assessment, Optimiser, Planner, PlanningSettings, Target, apply_bid_tolerance};
use crate::devices::{Device, EndUserTariff, LoadShiftPortfolio};
use crate::error::PlanningError;
use crate::forecast::{ForecastCache, ForecastUpdateType};
use crate::sensitivity::{Sensitivity, StepPower};
use crate::sim::clock::TimePeriod;
use crate::sim::schedule::Schedule;
use crate::sim::series::TimeSeries;
use crate::state::{LoadShiftStateSpace, StateSpace};

/// Energy per discrete power step of a portfolio; the full power spread over the power states.
fn portfolio_step_power(portfolio: &LoadShiftPortfolio) -> StepPower {
    let steps = (portfolio.power_mw / portfolio.energy_resolution_mwh).floor() as usize;
    StepPower::new(portfolio.power_mw, portfolio.power_mw, steps)
}

/// Maximises load-shifting profits against a price curve, paying levies on added purchases.
#[derive(Debug, Clone)]
pub struct ShiftMaxProfit {
    step_power: StepPower,
    prices: Vec<f64>,
    purchase_levies: f64,
}

impl ShiftMaxProfit {
    pub fn new(portfolio: &LoadShiftPortfolio, purchase_levies_eur_per_mwh: f64) -> Self {
        let step_power = portfolio_step_power(portfolio);
        Self {
            prices: vec![0.0; 2 * step_power.steps() + 1],
            step_power,
            purchase_levies: purchase_levies_eur_per_mwh,
        }
    }
}

impl Assessment for ShiftMaxProfit {
    fn target(&self) -> Target {
        Target::Maximise
    }

    fn prepare_for(&mut self, _period: &TimePeriod, sensitivity: Option<&Sensitivity>) {
        values_in_steps(sensitivity, &self.step_power, &mut self.prices);
    }

    fn value_of(&self, state_delta: i64) -> f64 {
        let energy = self.step_power.power(state_delta);
        let price = self.prices[step_index(self.step_power.steps(), state_delta)];
        let levies = if energy > 0.0 { energy * self.purchase_levies } else { 0.0 };
        -energy * price - levies
    }

    fn bid_price(&self, state_delta: i64, _external_energy_mwh: f64) -> f64 {
        if state_delta == 0 {
            f64::NAN
        } else {
            self.prices[step_index(self.step_power.steps(), state_delta)]
        }
    }
}

/// Minimises system cost of load shifting using a marginal-cost curve.
#[derive(Debug, Clone)]
pub struct ShiftMinSystemCost {
    step_power: StepPower,
    costs: Vec<f64>,
}

impl ShiftMinSystemCost {
    pub fn new(portfolio: &LoadShiftPortfolio) -> Self {
        let step_power = portfolio_step_power(portfolio);
        Self {
            costs: vec![0.0; 2 * step_power.steps() + 1],
            step_power,
        }
    }
}

impl Assessment for ShiftMinSystemCost {
    fn target(&self) -> Target {
        Target::Minimise
    }

    fn prepare_for(&mut self, _period: &TimePeriod, sensitivity: Option<&Sensitivity>) {
        values_in_steps(sensitivity, &self.step_power, &mut self.costs);
    }

    fn value_of(&self, state_delta: i64) -> f64 {
        self.costs[step_index(self.step_power.steps(), state_delta)]
    }

    fn bid_price(&self, state_delta: i64, _external_energy_mwh: f64) -> f64 {
        match state_delta {
            0 => f64::NAN,
            d if d > 0 => f64::MAX,
            _ => -f64::MAX,
        }
    }
}

/// Maximises the consumer's savings under an end-user tariff.
///
/// Values avoided consumer payments of the baseline plus shifted load and charges capacity
/// payments whenever shifting raises the load above the baseline peak.
#[derive(Debug, Clone)]
pub struct ShiftMaxProfitTariff {
    step_power: StepPower,
    tariff: EndUserTariff,
    baseline_load: TimeSeries,
    baseline_peak_mw: f64,
    prices: Vec<f64>,
    bid_prices: Vec<f64>,
    additions: Vec<f64>,
    baseline_mw: f64,
}

impl ShiftMaxProfitTariff {
    pub fn new(portfolio: &LoadShiftPortfolio, tariff: EndUserTariff) -> Self {
        let step_power = portfolio_step_power(portfolio);
        let size = 2 * step_power.steps() + 1;
        Self {
            step_power,
            tariff,
            baseline_load: portfolio.baseline_load.clone(),
            baseline_peak_mw: portfolio.baseline_peak_load_mw,
            prices: vec![0.0; size],
            bid_prices: vec![0.0; size],
            additions: vec![0.0; size],
            baseline_mw: 0.0,
        }
    }

    fn capacity_payment_increase(&self, energy: f64) -> f64 {
        let load = self.baseline_mw + energy;
        if load <= self.baseline_peak_mw {
            0.0
        } else {
            (load - self.baseline_peak_mw) * self.tariff.capacity_charge_eur_per_mw
        }
    }
}

impl Assessment for ShiftMaxProfitTariff {
    fn target(&self) -> Target {
        Target::Maximise
    }

    fn prepare_for(&mut self, period: &TimePeriod, sensitivity: Option<&Sensitivity>) {
        values_in_steps(sensitivity, &self.step_power, &mut self.bid_prices);
        self.prices.clone_from(&self.bid_prices);
        if let Some(sensitivity) = sensitivity {
            self.prices[self.step_power.steps()] = sensitivity.point_price();
        }
        self.additions.clear();
        self.additions
            .extend(self.prices.iter().map(|price| self.tariff.price_addition(*price)));
        self.baseline_mw = self.baseline_load.value_earlier_equal(period.start()) * self.baseline_peak_mw;
    }

    fn value_of(&self, state_delta: i64) -> f64 {
        let index = step_index(self.step_power.steps(), state_delta);
        let energy = self.step_power.power(state_delta);
        let power_price = self.tariff.power_price(self.prices[index]);
        (-energy - self.baseline_mw) * (power_price + self.additions[index]) - self.capacity_payment_increase(energy)
    }

    fn bid_price(&self, state_delta: i64, _external_energy_mwh: f64) -> f64 {
        if state_delta == 0 {
            f64::NAN
        } else {
            self.bid_prices[step_index(self.step_power.steps(), state_delta)]
        }
    }
}

/// Plans load shifting by backward induction over shift time and shifted energy.
#[derive(Debug, Clone)]
pub struct LoadShiftStrategist<A: Assessment> {
    settings: PlanningSettings,
    space: LoadShiftStateSpace,
    optimiser: Optimiser<LoadShiftStateSpace>,
    assessment: A,
    forecasts: ForecastCache,
}

impl<A: Assessment> LoadShiftStrategist<A> {
    /// # Errors
    ///
    /// Returns [`PlanningError::WindowExceedsHorizon`] if the schedule is longer than the horizon.
    pub fn new(
        settings: PlanningSettings,
        portfolio: &LoadShiftPortfolio,
        assessment: A,
        update_type: ForecastUpdateType,
    ) -> Result<Self, PlanningError> {
        settings.check()?;
        let space = LoadShiftStateSpace::new(portfolio);
        let optimiser = Optimiser::new(&space, settings.forecast_periods);
        Ok(Self {
            settings,
            space,
            optimiser,
            assessment,
            forecasts: ForecastCache::new(update_type),
        })
    }

    pub fn state_space(&self) -> &LoadShiftStateSpace {
        &self.space
    }

    pub fn optimiser(&self) -> &Optimiser<LoadShiftStateSpace> {
        &self.optimiser
    }
}

impl<A: Assessment> Planner for LoadShiftStrategist<A> {
    type Asset = LoadShiftPortfolio;

    fn settings(&self) -> &PlanningSettings {
        &self.settings
    }

    fn forecasts(&self) -> &ForecastCache {
        &self.forecasts
    }

    fn forecasts_mut(&mut self) -> &mut ForecastCache {
        &mut self.forecasts
    }

    fn create_schedule(
        &mut self,
        first: TimePeriod,
        portfolio: &LoadShiftPortfolio,
    ) -> Result<Schedule, PlanningError> {
        self.optimiser
            .optimise(&self.space, &mut self.assessment, first, &self.forecasts)?;

        let periods = self.settings.schedule_periods;
        let resolution = self.space.energy_resolution_mwh();
        let mut demand = Vec::with_capacity(periods);
        let mut prices = Vec::with_capacity(periods);
        let mut expected = Vec::with_capacity(periods);
        let mut state = self
            .space
            .nearest_state(portfolio.energy_level_mwh(), portfolio.shift_time());

        for period in 0..periods {
            expected.push(self.space.energy_of(state.energy_state));
            let next = self
                .optimiser
                .best_next_state(&self.space, period, state)
                .ok_or_else(|| PlanningError::NoFeasibleTransition {
                    period,
                    state: format!("{state:?}"),
                })?;
            let delta = self.space.state_delta(state, next);
            let energy = delta as f64 * resolution;

            let time_period = first.shift_by(period as i64);
            self.assessment
                .prepare_for(&time_period, self.forecasts.get(&time_period));
            prices.push(self.assessment.bid_price(delta, energy));
            demand.push(energy);
            state = next;
        }

        let bids = apply_bid_tolerance(&demand, &prices, self.settings.bid_tolerance);
        debug!(
            start = first.start().0,
            periods,
            final_shift_time = state.shift_time,
            "load shift schedule created"
        );
        Schedule::new(first, demand, bids, expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::clock::TimeStamp;
    use crate::state::LoadShiftState;

    fn portfolio(max_shift: usize) -> LoadShiftPortfolio {
        LoadShiftPortfolio::new(
            1.0,
            TimeSeries::constant(1.0),
            TimeSeries::constant(1.0),
            1.0,
            2.0,
            2.0,
            max_shift,
            TimeSeries::constant(0.0),
            TimeSeries::constant(0.5),
            2.0,
            0.0,
            0,
        )
    }

    fn period() -> TimePeriod {
        TimePeriod::hourly(TimeStamp(0))
    }

    fn settings(horizon: usize) -> PlanningSettings {
        PlanningSettings {
            forecast_periods: horizon,
            schedule_periods: horizon,
            bid_tolerance: 0.0,
        }
    }

    #[test]
    fn levies_apply_to_purchases_only() {
        let mut a = ShiftMaxProfit::new(&portfolio(3), 10.0);
        a.prepare_for(&period(), Some(&Sensitivity::PricePoint(40.0)));
        assert_eq!(a.value_of(1), -50.0);
        assert_eq!(a.value_of(-1), 40.0);
        assert_eq!(a.value_of(0), 0.0);
    }

    #[test]
    fn tariff_charges_new_peaks() {
        let tariff = EndUserTariff {
            capacity_charge_eur_per_mw: 100.0,
            ..Default::default()
        };
        let mut a = ShiftMaxProfitTariff::new(&portfolio(3), tariff);
        a.prepare_for(&period(), Some(&Sensitivity::PricePoint(40.0)));
        // baseline 1 MW, peak 2 MW: shifting 1 MWh up stays within the peak
        assert_eq!(a.value_of(1), -80.0);
        assert_eq!(a.value_of(0), -40.0);
        assert_eq!(a.value_of(-1), 0.0);
    }

    #[test]
    fn shifts_load_to_cheap_period() {
        let p = portfolio(3);
        let mut s = LoadShiftStrategist::new(settings(2), &p, ShiftMaxProfit::new(&p, 0.0), ForecastUpdateType::Incremental)
            .unwrap();
        s.forecasts_mut().store(period(), Sensitivity::PricePoint(80.0));
        s.forecasts_mut().store(period().shift_by(1), Sensitivity::PricePoint(20.0));
        let schedule = s.create_schedule(period(), &p).unwrap();
        assert_eq!(schedule.energy_deltas(), &[-1.0, 1.0]);
        assert_eq!(schedule.expected_energies(), &[0.0, -1.0]);
        assert_eq!(schedule.bid_prices(), &[80.0, 20.0]);
    }

    #[test]
    fn horizon_ends_balanced() {
        let p = portfolio(3);
        let mut s = LoadShiftStrategist::new(
            settings(3),
            &p,
            ShiftMinSystemCost::new(&p),
            ForecastUpdateType::Incremental,
        )
        .unwrap();
        let schedule = s.create_schedule(period(), &p).unwrap();
        let net: f64 = schedule.energy_deltas().iter().sum();
        assert_eq!(net, 0.0);
        let zero = s.state_space().zero_energy_index();
        let last = s
            .optimiser()
            .best_next_state(s.state_space(), 2, LoadShiftState::new(0, zero));
        assert_eq!(last, Some(LoadShiftState::new(0, zero)));
    }

    #[test]
    fn shifted_start_without_shift_room_plans_from_balance() {
        let p = LoadShiftPortfolio::new(
            1.0,
            TimeSeries::constant(1.0),
            TimeSeries::constant(1.0),
            1.0,
            2.0,
            2.0,
            1,
            TimeSeries::constant(0.0),
            TimeSeries::constant(0.0),
            0.0,
            1.0,
            0,
        );
        let mut s = LoadShiftStrategist::new(settings(2), &p, ShiftMaxProfit::new(&p, 0.0), ForecastUpdateType::Incremental)
            .unwrap();
        s.forecasts_mut().store(period(), Sensitivity::PricePoint(80.0));
        s.forecasts_mut().store(period().shift_by(1), Sensitivity::PricePoint(20.0));
        let schedule = s.create_schedule(period(), &p).unwrap();
        assert_eq!(schedule.energy_deltas(), &[0.0, 0.0]);
        assert_eq!(schedule.expected_energies(), &[0.0, 0.0]);
    }
}
