/// Untyped CSV tables.
///
/// Input snapshots vary in which optional columns they carry, so they are
/// read into a `RawTable` of optional string cells first. Schema
/// normalization turns that into typed observations; history appends work
/// on the raw form directly so unknown columns survive untouched.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::model::{HeatRiskError, ReportRow, REPORT_COLUMNS};

// ---------------------------------------------------------------------------
// Raw table
// ---------------------------------------------------------------------------

/// A header row plus data rows. Empty CSV cells are stored as `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Index of a column by exact header name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell value, or `None` if the cell is empty or the row is short.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .and_then(|c| c.as_deref())
    }

    /// Appends a row, padding or truncating it to the header width.
    pub fn push_row(&mut self, mut row: Vec<Option<String>>) {
        row.resize(self.headers.len(), None);
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    // --- Reading ------------------------------------------------------------

    pub fn read_csv(path: &Path) -> Result<Self, HeatRiskError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Reads a table with cells exactly as stored. Headers are still
    /// trimmed so columns match by name.
    pub fn read_csv_untrimmed(path: &Path) -> Result<Self, HeatRiskError> {
        let file = File::open(path)?;
        Self::read_with(file, csv::Trim::Headers)
    }

    /// Reads a table, trimming whitespace from headers and cells.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, HeatRiskError> {
        Self::read_with(reader, csv::Trim::All)
    }

    fn read_with<R: Read>(reader: R, trim: csv::Trim) -> Result<Self, HeatRiskError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(trim)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let mut table = RawTable::new(headers);

        for record in rdr.records() {
            let record = record?;
            let row = record
                .iter()
                .map(|cell| {
                    if cell.is_empty() {
                        None
                    } else {
                        Some(cell.to_string())
                    }
                })
                .collect();
            table.push_row(row);
        }

        Ok(table)
    }

    // --- Writing ------------------------------------------------------------

    pub fn write_csv(&self, path: &Path) -> Result<(), HeatRiskError> {
        let file = File::create(path)?;
        self.to_writer(file)
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), HeatRiskError> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(|c| c.as_deref().unwrap_or("")))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Report output
// ---------------------------------------------------------------------------

/// Writes the latest-date report as `barangay_id,risk_level,cluster`.
pub fn write_report(path: &Path, rows: &[ReportRow]) -> Result<(), HeatRiskError> {
    let file = File::create(path)?;
    write_report_to(file, rows)
}

pub fn write_report_to<W: Write>(writer: W, rows: &[ReportRow]) -> Result<(), HeatRiskError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(REPORT_COLUMNS)?;
    for row in rows {
        wtr.write_record([
            row.unit_id.clone(),
            row.risk_level.to_string(),
            row.cluster.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cells_are_read_as_none() {
        let csv = "barangay_id,date,temperature\nB1,2024-05-01,\nB2,2024-05-01,31.5\n";
        let table = RawTable::from_reader(csv.as_bytes()).expect("valid csv");
        assert_eq!(table.headers, vec!["barangay_id", "date", "temperature"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 2), None);
        assert_eq!(table.cell(1, 2), Some("31.5"));
    }

    #[test]
    fn test_short_rows_are_padded_to_header_width() {
        let csv = "a,b,c\n1,2\n";
        let table = RawTable::from_reader(csv.as_bytes()).expect("flexible csv");
        assert_eq!(table.rows[0].len(), 3);
        assert_eq!(table.cell(0, 2), None);
    }

    #[test]
    fn test_untrimmed_read_keeps_cell_whitespace() {
        let text = " a ,b\n  x , y\n";
        let table = RawTable::read_with(text.as_bytes(), csv::Trim::Headers).expect("valid csv");
        assert_eq!(table.headers, vec!["a", "b"]);
        assert_eq!(table.cell(0, 0), Some("  x "));
        assert_eq!(table.cell(0, 1), Some(" y"));
    }

    #[test]
    fn test_write_then_read_preserves_nulls() {
        let mut table = RawTable::new(vec!["a".to_string(), "b".to_string()]);
        table.push_row(vec![Some("x".to_string()), None]);

        let mut buf = Vec::new();
        table.to_writer(&mut buf).expect("write");
        assert_eq!(String::from_utf8(buf.clone()).unwrap(), "a,b\nx,\n");

        let reread = RawTable::from_reader(buf.as_slice()).expect("read");
        assert_eq!(reread, table);
    }

    #[test]
    fn test_report_header_and_rows() {
        let rows = vec![
            ReportRow { unit_id: "B1".to_string(), risk_level: 2, cluster: 0 },
            ReportRow { unit_id: "B2".to_string(), risk_level: 1, cluster: 1 },
        ];
        let mut buf = Vec::new();
        write_report_to(&mut buf, &rows).expect("write report");
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "barangay_id,risk_level,cluster\nB1,2,0\nB2,1,1\n"
        );
    }
}
