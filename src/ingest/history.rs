//! Append-to-history mode.
//!
//! Daily snapshots accumulate into one growing table so the smoother has a
//! multi-day series to work with. Existing rows are never dropped or
//! reordered; columns that only the snapshot carries are added and left
//! null for older rows.

use std::path::Path;

use crate::ingest::table::RawTable;
use crate::model::HeatRiskError;

/// Merges `snapshot` onto the end of `history`.
///
/// The result keeps every history column in its original position, then
/// any snapshot-only columns in snapshot order. Snapshot rows are mapped by
/// column name; history columns the snapshot lacks are null in new rows.
pub fn append_snapshot(history: &RawTable, snapshot: &RawTable) -> RawTable {
    let mut headers = history.headers.clone();
    for h in &snapshot.headers {
        if !headers.contains(h) {
            headers.push(h.clone());
        }
    }

    let mut merged = RawTable::new(headers);

    for row in &history.rows {
        merged.push_row(row.clone());
    }

    let positions: Vec<Option<usize>> = merged
        .headers
        .iter()
        .map(|h| snapshot.column_index(h))
        .collect();

    for row in &snapshot.rows {
        let mapped = positions
            .iter()
            .map(|pos| pos.and_then(|i| row.get(i).cloned().flatten()))
            .collect();
        merged.push_row(mapped);
    }

    merged
}

/// Appends `snapshot` to the CSV at `path`, creating it if absent.
///
/// Existing cells are written back as stored, whitespace included. Cells
/// past the header width have no column name and are dropped.
///
/// Returns the number of rows appended.
pub fn append_to_file(path: &Path, snapshot: &RawTable) -> Result<usize, HeatRiskError> {
    let merged = if path.exists() {
        let history = RawTable::read_csv_untrimmed(path)?;
        append_snapshot(&history, snapshot)
    } else {
        snapshot.clone()
    };
    merged.write_csv(path)?;
    Ok(snapshot.len())
}
