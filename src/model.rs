/// Core data types for the barangay heat risk service.
///
/// This module defines the shared domain model imported by all other modules:
/// canonical observations, the feature-set variants, report rows and the
/// error taxonomy. It contains no logic beyond small accessors and no I/O.

use chrono::NaiveDate;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Column names
// ---------------------------------------------------------------------------

/// Unit identifier column, as it appears in CSV headers.
pub const COL_UNIT_ID: &str = "barangay_id";
pub const COL_DATE: &str = "date";
pub const COL_TEMPERATURE: &str = "temperature";
pub const COL_FACILITY_DISTANCE: &str = "facility_distance";
/// Accepted alias for `facility_distance` in older snapshots.
pub const COL_FACILITY_SCORE: &str = "facility_score";
pub const COL_POPULATION: &str = "population";
pub const COL_DENSITY: &str = "density";
pub const COL_RISK_LEVEL: &str = "risk_level";
pub const COL_CLUSTER: &str = "cluster";

/// Header of the daily snapshot table written by the backend fetcher.
pub const SNAPSHOT_COLUMNS: [&str; 6] = [
    COL_UNIT_ID,
    COL_DATE,
    COL_TEMPERATURE,
    COL_FACILITY_DISTANCE,
    COL_POPULATION,
    COL_DENSITY,
];

/// Header of the latest-date risk report.
pub const REPORT_COLUMNS: [&str; 3] = [COL_UNIT_ID, COL_RISK_LEVEL, COL_CLUSTER];

// ---------------------------------------------------------------------------
// Observation types
// ---------------------------------------------------------------------------

/// One canonical row of input, after schema normalization.
///
/// `temperature` and `facility_distance` are optional because a partially
/// failed upstream fetch can leave cells empty; they are imputed during
/// feature scaling rather than rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub unit_id: String,
    pub date: NaiveDate,
    pub temperature: Option<f64>,     // °C, heat index or air temperature
    pub facility_distance: Option<f64>, // 1 / (1 + facility count)
    pub population: u64,
    pub density: f64,
}

/// An observation carrying its smoothed temperature signal.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothedObservation {
    pub observation: Observation,
    pub temperature_rolling: Option<f64>,
}

// ---------------------------------------------------------------------------
// Feature set variants
// ---------------------------------------------------------------------------

/// The feature set applied to every row of a run.
///
/// Chosen once per run: `WithDensity` iff any observation has `density > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureSet {
    TemperatureFacility,
    WithDensity,
}

impl FeatureSet {
    /// Ordered feature names, aligned with `weights()`.
    pub fn names(&self) -> &'static [&'static str] {
        match self {
            FeatureSet::TemperatureFacility => &["temperature_rolling", "facility_distance"],
            FeatureSet::WithDensity => &["temperature_rolling", "facility_distance", "density"],
        }
    }

    /// Equal weights over the selected features.
    pub fn weights(&self) -> Vec<f64> {
        let n = self.names().len();
        vec![1.0 / n as f64; n]
    }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// A scored observation: cluster label plus the derived risk level.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssignment {
    pub unit_id: String,
    pub date: NaiveDate,
    pub cluster: usize,
    pub risk_level: usize,
}

/// One row of the externally consumed latest-date report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub unit_id: String,
    pub risk_level: usize,
    pub cluster: usize,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that abort a pipeline run or a backend fetch.
#[derive(Debug, Error)]
pub enum HeatRiskError {
    /// A required column is absent from the input table.
    #[error("Missing required column: {0}")]
    MissingColumn(String),
    /// A cell could not be interpreted (unparseable date, empty unit id).
    #[error("Invalid value {value:?} in column '{column}' at row {row}")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },
    /// The input table has no data rows.
    #[error("Input contains no observations")]
    NoObservations,
    /// The upstream backend returned nothing usable and no fallback remains.
    #[error("No data available: {0}")]
    DataUnavailable(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(String),
}

/// Failure to deliver the report to the publishing sink.
///
/// Never fatal: the report has already been written locally by then.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Publishing not configured: {0}")]
    NotConfigured(String),
    #[error("Report file unreadable: {0}")]
    ReportUnreadable(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    HttpStatus(u16),
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_feature_weights_are_exactly_half() {
        let set = FeatureSet::TemperatureFacility;
        assert_eq!(set.weights(), vec![0.5, 0.5]);
        assert_eq!(set.names().len(), set.weights().len());
    }

    #[test]
    fn test_three_feature_weights_are_thirds_and_sum_to_one() {
        let weights = FeatureSet::WithDensity.weights();
        assert_eq!(weights, vec![1.0 / 3.0; 3]);
        assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_column_message_names_column() {
        let err = HeatRiskError::MissingColumn("temperature".to_string());
        assert_eq!(err.to_string(), "Missing required column: temperature");
    }
}
