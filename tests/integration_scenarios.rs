//! End-to-end planning scenarios for storage, load shifting and the median heuristic.

mod common;

use flex_dispatch::devices::{Device, StorageDevice};
use flex_dispatch::forecast::ForecastUpdateType;
use flex_dispatch::planner::{
    HeuristicMedian, LoadShiftStrategist, MaxProfitPriceTaker, Planner, Polynomial, SCARCITY_PRICE, ShiftMaxProfit,
    StorageStrategist,
};
use flex_dispatch::sim::engine::Engine;
use flex_dispatch::sim::series::TimeSeries;
use flex_dispatch::state::{LoadShiftState, LoadShiftStateSpace, StateSpace};

fn price_taker(
    device: &StorageDevice,
    horizon: usize,
    schedule: usize,
) -> StorageStrategist<MaxProfitPriceTaker> {
    StorageStrategist::new(
        common::settings(horizon, schedule),
        device,
        1,
        MaxProfitPriceTaker::new(device, 1),
        ForecastUpdateType::Incremental,
    )
    .unwrap()
}

#[test]
fn inflexible_storage_plans_no_dispatch() {
    let device = common::lossless_storage(0.0, 1.0);
    let mut planner = price_taker(&device, 3, 3);
    common::fill_price_points(planner.forecasts_mut(), &[80.0, -20.0, 400.0]);

    let schedule = planner.create_schedule(common::first_period(), &device).unwrap();

    assert_eq!(planner.state_space().energy_states(), 1);
    assert_eq!(schedule.energy_deltas(), &[0.0, 0.0, 0.0]);
    assert_eq!(schedule.expected_energies(), &[0.0, 0.0, 0.0]);
}

#[test]
fn storage_charges_cheap_and_discharges_expensive() {
    // 5 states, one state per period
    let device = common::lossless_storage(4.0, 1.0);
    let mut planner = price_taker(&device, 6, 6);
    common::fill_price_points(planner.forecasts_mut(), &[10.0, 20.0, 30.0, 90.0, 80.0, 70.0]);

    let schedule = planner.create_schedule(common::first_period(), &device).unwrap();

    assert_eq!(planner.state_space().energy_states(), 5);
    assert_eq!(schedule.energy_deltas(), &[1.0, 1.0, 1.0, -1.0, -1.0, -1.0]);
    assert_eq!(schedule.expected_energies(), &[0.0, 1.0, 2.0, 3.0, 2.0, 1.0]);
    let net: f64 = schedule.energy_deltas().iter().sum();
    assert!(net.abs() <= 1.0);
    assert_eq!(schedule.bid_prices()[0], SCARCITY_PRICE);
}

#[test]
fn storage_skips_charging_while_charging_is_unavailable() {
    let charge = TimeSeries::from_periods(common::first_period(), &[1.0, 0.0, 1.0, 1.0, 1.0, 1.0]);
    let device = common::lossless_storage(4.0, 1.0).with_availability(charge, TimeSeries::constant(1.0));
    let mut planner = price_taker(&device, 6, 6);
    common::fill_price_points(planner.forecasts_mut(), &[10.0, 20.0, 30.0, 90.0, 80.0, 70.0]);

    let schedule = planner.create_schedule(common::first_period(), &device).unwrap();

    assert_eq!(schedule.energy_deltas(), &[1.0, 0.0, 1.0, -1.0, -1.0, 0.0]);
    assert_eq!(schedule.expected_energies(), &[0.0, 1.0, 1.0, 2.0, 1.0, 0.0]);
}

#[test]
fn balanced_load_shift_state_moves_one_step_either_way() {
    let portfolio = common::portfolio(1.0, 2.0, 3, 1.0);
    let space = LoadShiftStateSpace::new(&portfolio);
    assert_eq!(space.zero_energy_index(), 2);

    let mut next = Vec::new();
    space.next_states(LoadShiftState::new(0, 2), &common::first_period(), false, &mut next);
    let states: Vec<LoadShiftState> = next.iter().map(|(state, _)| *state).collect();

    assert_eq!(
        states,
        vec![LoadShiftState::new(0, 2), LoadShiftState::new(1, 1), LoadShiftState::new(1, 3)]
    );
}

#[test]
fn heuristic_charges_only_in_price_dip() {
    let device = common::lossless_storage(4.0, 1.0);
    for dip in 0..6 {
        let mut planner = HeuristicMedian::new(
            common::settings(6, 6),
            Polynomial::default(),
            ForecastUpdateType::Incremental,
        )
        .unwrap();
        let mut prices = [50.0; 6];
        prices[dip] = 10.0;
        common::fill_price_points(planner.forecasts_mut(), &prices);

        let schedule = planner.create_schedule(common::first_period(), &device).unwrap();

        let mut expected = [0.0; 6];
        expected[dip] = device.external_charging_power_mw();
        assert_eq!(schedule.energy_deltas(), &expected, "dip in period {dip}");
    }
}

#[test]
fn load_shift_run_returns_to_balance() {
    let portfolio = common::portfolio(1.0, 2.0, 3, 1.0);
    let planner = LoadShiftStrategist::new(
        common::settings(4, 4),
        &portfolio,
        ShiftMaxProfit::new(&portfolio, 0.0),
        ForecastUpdateType::Incremental,
    )
    .unwrap();
    let provider = common::point_forecaster(&[20.0, 80.0, 20.0, 80.0]);
    let mut engine = Engine::new(planner, provider, portfolio, common::first_period(), 8);

    let results = engine.run().unwrap();

    assert_eq!(results.len(), 8);
    let revenue: f64 = results.iter().map(|r| r.revenue_eur).sum();
    assert!(revenue > 0.0);
    assert!(results.iter().all(|r| r.energy_level_mwh.abs() <= 2.0 + 1e-9));
    assert!(engine.asset().energy_level_mwh().abs() < 1e-9);
    assert_eq!(engine.asset().shift_time(), 0);
}

#[test]
fn self_discharging_storage_stays_within_capacity() {
    let device = StorageDevice::new(2.0, 1.0, 0.05, 1.0, 1.0, 0.0);
    let planner = price_taker(&device, 4, 4);
    let provider = common::point_forecaster(&[10.0, 10.0, 90.0, 90.0]);
    let mut engine = Engine::new(planner, provider, device, common::first_period(), 8);

    let results = engine.run().unwrap();

    assert!(results[0].replanned);
    assert_eq!(
        engine.replan_count(),
        results.iter().filter(|r| r.replanned).count()
    );
    assert!(
        results
            .iter()
            .all(|r| (0.0..=engine.asset().capacity_mwh() + 1e-9).contains(&r.energy_level_mwh))
    );
}
