//! Output formatting for one-shot CLI runs.
//!
//! Supports pretty JSON and CSV with a header row.

use std::io::Write;

use anyhow::Result;
use csv::WriterBuilder;
use serde::Serialize;
use tracing::debug;

/// Writes `records` as a pretty-printed JSON array.
pub fn write_json<W: Write, T: Serialize>(mut writer: W, records: &[T]) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, records)?;
    writeln!(writer)?;
    Ok(())
}

/// Writes `records` as CSV, one row per record, with a header row.
///
/// Absent values become empty cells.
pub fn write_csv<W: Write, T: Serialize>(writer: W, records: &[T]) -> Result<()> {
    debug!(rows = records.len(), "Writing CSV");
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(writer);

    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}
