//! Rolling-horizon dispatch planning for flexible assets.
//!
//! Storage devices and load-shifting portfolios are planned by backward induction over a
//! discretised state space (or a price-median heuristic) against per-period forecast
//! sensitivities, then dispatched and settled period by period.

pub mod config;
pub mod devices;
pub mod error;
pub mod forecast;
pub mod io;
pub mod planner;
pub mod runner;
pub mod sensitivity;
/// Simulation clock, engine, schedules and KPI modules.
pub mod sim;
pub mod state;
