//! CSV export for step results and schedules.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::schedule::Schedule;
use crate::sim::types::StepResult;

/// Column header for step result export.
const STEP_HEADER: &str = "index,period_start,requested_mwh,realised_mwh,bid_price,\
                           realised_price,revenue_eur,energy_level_mwh,replanned";

/// Column header for schedule export.
const SCHEDULE_HEADER: &str = "period_start,energy_delta_mwh,bid_price,expected_energy_mwh";

/// Exports step results to a CSV file at the given path.
///
/// Produces deterministic output for identical inputs.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(results: &[StepResult], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(results, buf)
}

/// Writes step results as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(results: &[StepResult], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(STEP_HEADER.split(',').map(str::trim))?;

    for r in results {
        wtr.write_record(&[
            r.index.to_string(),
            r.period_start.to_string(),
            format!("{:.6}", r.requested_mwh),
            format!("{:.6}", r.realised_mwh),
            format!("{:.4}", r.bid_price),
            format!("{:.4}", r.realised_price),
            format!("{:.4}", r.revenue_eur),
            format!("{:.6}", r.energy_level_mwh),
            r.replanned.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Writes one row per schedule period as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_schedule_csv(schedule: &Schedule, writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(SCHEDULE_HEADER.split(','))?;

    let first = schedule.first_period();
    let rows = schedule
        .energy_deltas()
        .iter()
        .zip(schedule.bid_prices())
        .zip(schedule.expected_energies());
    for (period, ((delta, bid), expected)) in rows.enumerate() {
        wtr.write_record(&[
            first.shift_by(period as i64).start().0.to_string(),
            format!("{delta:.6}"),
            format!("{bid:.4}"),
            format!("{expected:.6}"),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
