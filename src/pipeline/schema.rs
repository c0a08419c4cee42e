/// Schema normalization: raw table in, canonical observations out.
///
/// Required columns are checked before any row is touched. Optional
/// columns are synthesized as zero; numeric coercion failures in the
/// optional columns become zero, and in the feature columns become missing
/// values for later imputation. None of those fail the run.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::ingest::table::RawTable;
use crate::model::{
    HeatRiskError, Observation, COL_DATE, COL_DENSITY, COL_FACILITY_DISTANCE,
    COL_FACILITY_SCORE, COL_POPULATION, COL_TEMPERATURE, COL_UNIT_ID,
};

/// Column positions resolved once per table.
struct Columns {
    unit_id: usize,
    date: usize,
    temperature: usize,
    facility_distance: usize,
    population: Option<usize>,
    density: Option<usize>,
}

fn resolve_columns(table: &RawTable) -> Result<Columns, HeatRiskError> {
    let require = |name: &str| {
        table
            .column_index(name)
            .ok_or_else(|| HeatRiskError::MissingColumn(name.to_string()))
    };

    let unit_id = require(COL_UNIT_ID)?;
    let date = require(COL_DATE)?;
    let temperature = require(COL_TEMPERATURE)?;
    let facility_distance = table
        .column_index(COL_FACILITY_DISTANCE)
        .or_else(|| table.column_index(COL_FACILITY_SCORE))
        .ok_or_else(|| {
            HeatRiskError::MissingColumn(format!(
                "{} or {}",
                COL_FACILITY_DISTANCE, COL_FACILITY_SCORE
            ))
        })?;

    Ok(Columns {
        unit_id,
        date,
        temperature,
        facility_distance,
        population: table.column_index(COL_POPULATION),
        density: table.column_index(COL_DENSITY),
    })
}

/// Converts a raw table into canonical observations, in input row order.
pub fn normalize(table: &RawTable) -> Result<Vec<Observation>, HeatRiskError> {
    let cols = resolve_columns(table)?;

    if table.is_empty() {
        return Err(HeatRiskError::NoObservations);
    }

    let mut observations = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let unit_id = match table.cell(row, cols.unit_id) {
            Some(id) => id.to_string(),
            None => {
                return Err(HeatRiskError::InvalidValue {
                    column: COL_UNIT_ID.to_string(),
                    row,
                    value: String::new(),
                });
            }
        };

        let raw_date = table.cell(row, cols.date).unwrap_or("");
        let date = parse_date(raw_date).ok_or_else(|| HeatRiskError::InvalidValue {
            column: COL_DATE.to_string(),
            row,
            value: raw_date.to_string(),
        })?;

        observations.push(Observation {
            unit_id,
            date,
            temperature: parse_number(table.cell(row, cols.temperature)),
            facility_distance: parse_number(table.cell(row, cols.facility_distance)),
            population: cols
                .population
                .and_then(|c| parse_number(table.cell(row, c)))
                .filter(|p| *p > 0.0)
                .map(|p| p.round() as u64)
                .unwrap_or(0),
            density: cols
                .density
                .and_then(|c| parse_number(table.cell(row, c)))
                .unwrap_or(0.0),
        });
    }

    Ok(observations)
}

/// Parses an ISO calendar date, or the date part of an ISO timestamp.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
                .ok()
                .map(|dt| dt.date())
        })
}

/// Finite number or `None`. "NaN", "inf" and text all count as missing.
fn parse_number(cell: Option<&str>) -> Option<f64> {
    cell.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
