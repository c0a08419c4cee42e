/// The heat risk scoring pipeline.
///
/// Data flows strictly left to right through the submodules:
/// - `schema`: raw table → canonical observations.
/// - `smoothing`: per-unit trailing rolling temperature.
/// - `features`: feature-set choice, imputation, min-max scaling.
/// - `cluster`: seeded k-means and per-cluster severity.
/// - `risk`: severity ranking and the latest-date report.
///
/// The whole run is synchronous and in-memory; independent runs share no
/// state and may execute in parallel.

pub mod cluster;
pub mod features;
pub mod risk;
pub mod schema;
pub mod smoothing;

use std::path::Path;

use chrono::NaiveDate;

use crate::ingest::table::{self, RawTable};
use crate::logging::{self, Stage};
use crate::model::{FeatureSet, HeatRiskError, ReportRow, RiskAssignment};
use cluster::{ClusterSummary, KMeansParams};

// ---------------------------------------------------------------------------
// Options and output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub smoothing: bool,
    pub window: usize,
    pub kmeans: KMeansParams,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            smoothing: true,
            window: 7,
            kmeans: KMeansParams::default(),
        }
    }
}

/// Everything a run produces. Only `report` is consumed externally.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub feature_set: FeatureSet,
    pub feature_names: Vec<&'static str>,
    pub weights: Vec<f64>,
    /// Temperature signal actually fed to the scaler, in canonical order.
    pub temperature_rolling: Vec<Option<f64>>,
    pub clusters: Vec<ClusterSummary>,
    pub assignments: Vec<RiskAssignment>,
    pub latest_date: NaiveDate,
    pub report: Vec<ReportRow>,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Runs the full pipeline on an in-memory raw table.
pub fn run(table: &RawTable, options: &PipelineOptions) -> Result<PipelineOutput, HeatRiskError> {
    let observations = schema::normalize(table)?;
    logging::info(
        Stage::Load,
        None,
        &format!("{} observations normalized", observations.len()),
    );

    let smoothed = smoothing::smooth(observations, options.smoothing, options.window);
    logging::debug(
        Stage::Smooth,
        None,
        &format!(
            "Rolling temperature over {} rows (enabled: {}, window: {})",
            smoothed.len(),
            options.smoothing,
            options.window
        ),
    );

    let features = features::build_features(&smoothed);
    logging::info(
        Stage::Features,
        None,
        &format!("Feature set: {}", features.names.join(", ")),
    );

    let clustering = cluster::assign_clusters(&features.rows, &features.weights, options.kmeans);
    logging::info(
        Stage::Cluster,
        None,
        &format!(
            "{} of {} clusters realized after {} iterations",
            clustering.clusters.len(),
            options.kmeans.clusters,
            clustering.iterations
        ),
    );
    if clustering.clusters.len() < options.kmeans.clusters {
        logging::warn(
            Stage::Cluster,
            None,
            "Fewer distinct feature vectors than requested clusters; emitting fewer risk levels",
        );
    }

    let assignments = risk::assign_levels(&smoothed, &clustering);
    for summary in &clustering.clusters {
        logging::debug(
            Stage::Rank,
            None,
            &format!(
                "cluster {}: {} rows, severity {:.4}",
                summary.label, summary.size, summary.severity
            ),
        );
    }

    let report = risk::latest_report(&assignments);
    let latest_date = assignments
        .iter()
        .map(|a| a.date)
        .max()
        .ok_or(HeatRiskError::NoObservations)?;

    Ok(PipelineOutput {
        feature_set: features.feature_set,
        feature_names: features.names,
        weights: features.weights,
        temperature_rolling: smoothed.iter().map(|s| s.temperature_rolling).collect(),
        clusters: clustering.clusters,
        assignments,
        latest_date,
        report,
    })
}

/// Reads `input`, runs the pipeline and writes the latest-date report.
pub fn run_csv(
    input: &Path,
    output: &Path,
    options: &PipelineOptions,
) -> Result<PipelineOutput, HeatRiskError> {
    logging::info(
        Stage::Load,
        None,
        &format!("Loading {} and running pipeline...", input.display()),
    );
    let raw = RawTable::read_csv(input)?;
    let result = run(&raw, options)?;

    table::write_report(output, &result.report)?;
    logging::info(
        Stage::Report,
        None,
        &format!(
            "Latest date: {}; wrote {} rows to {}",
            result.latest_date,
            result.report.len(),
            output.display()
        ),
    );
    Ok(result)
}
