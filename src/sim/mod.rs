pub mod clock;
pub mod engine;
pub mod kpi;
pub mod schedule;
pub mod series;
pub mod types;
