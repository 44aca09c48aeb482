/// CSV export of step results and schedules.
pub mod export;
