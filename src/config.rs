//! Service configuration.
//!
//! Settings come from three layers, later ones winning:
//! 1. Built-in defaults.
//! 2. An optional TOML file (`heatrisk.toml` by default). Every key is
//!    optional, and a missing file means defaults.
//! 3. Environment (`.env` is loaded first): `BACKEND_URL` and
//!    `PIPELINE_REPORT_WRITER_KEY`.
//!
//! Command line flags are applied on top of this by the binary.
//!
//! ```toml
//! [pipeline]
//! smoothing = true
//! window = 7
//! clusters = 5
//! seed = 42
//!
//! [io]
//! input = "barangay_data.csv"
//! output = "barangay_heat_risk_today.csv"
//!
//! [backend]
//! url = "http://localhost:3000"
//! workers = 20
//!
//! [publish]
//! enabled = false
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::logging::LogLevel;
use crate::model::HeatRiskError;
use crate::pipeline::cluster::KMeansParams;
use crate::pipeline::PipelineOptions;

pub const DEFAULT_CONFIG_PATH: &str = "heatrisk.toml";
pub const ENV_BACKEND_URL: &str = "BACKEND_URL";
pub const ENV_REPORT_WRITER_KEY: &str = "PIPELINE_REPORT_WRITER_KEY";
/// Backend assumed by `fetch` when no URL is configured. Publishing has no
/// such default.
pub const DEFAULT_FETCH_BACKEND_URL: &str = "http://localhost:3000";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub smoothing: bool,
    pub window: usize,
    pub clusters: usize,
    pub seed: u64,
    pub max_iterations: usize,
}

impl Default for PipelineSection {
    fn default() -> Self {
        let kmeans = KMeansParams::default();
        Self {
            smoothing: true,
            window: 7,
            clusters: kmeans.clusters,
            seed: kmeans.seed,
            max_iterations: kmeans.max_iterations,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IoSection {
    /// Observation history read by `run`.
    pub input: PathBuf,
    /// Latest-date report written by `run`.
    pub output: PathBuf,
    /// Daily snapshot written by `fetch` when not appending.
    pub snapshot: PathBuf,
    /// When set, `fetch` appends to this history table instead.
    pub append_history: Option<PathBuf>,
}

impl Default for IoSection {
    fn default() -> Self {
        Self {
            input: PathBuf::from("barangay_data.csv"),
            output: PathBuf::from("barangay_heat_risk_today.csv"),
            snapshot: PathBuf::from("barangay_data_today.csv"),
            append_history: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    pub url: Option<String>,
    /// Heat endpoints can take minutes when the backend calls its weather
    /// provider once per barangay.
    pub heat_timeout_secs: u64,
    pub population_timeout_secs: u64,
    pub batch_timeout_secs: u64,
    pub unit_timeout_secs: u64,
    /// Concurrent per-barangay facility requests.
    pub workers: usize,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            url: None,
            heat_timeout_secs: 120,
            population_timeout_secs: 60,
            batch_timeout_secs: 60,
            unit_timeout_secs: 15,
            workers: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PublishSection {
    pub enabled: bool,
    pub report_path: String,
    pub timeout_secs: u64,
    /// Shared secret sent as `x-pipeline-report-key`. Usually from the env.
    pub writer_key: Option<String>,
}

impl Default for PublishSection {
    fn default() -> Self {
        Self {
            enabled: false,
            report_path: "/api/heat/davao/pipeline-report".to_string(),
            timeout_secs: 30,
            writer_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub file: Option<String>,
    pub timestamps: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            timestamps: false,
        }
    }
}

impl LoggingSection {
    pub fn min_level(&self) -> LogLevel {
        LogLevel::parse(&self.level).unwrap_or(LogLevel::Info)
    }
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineSection,
    pub io: IoSection,
    pub backend: BackendSection,
    pub publish: PublishSection,
    pub logging: LoggingSection,
}

impl Config {
    /// Parses a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, HeatRiskError> {
        toml::from_str(s).map_err(|e| HeatRiskError::Config(e.to_string()))
    }

    /// Loads the TOML file at `path`, or defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self, HeatRiskError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Loads `path`, then applies `.env` and process environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, HeatRiskError> {
        dotenv::dotenv().ok();
        let mut config = Self::load(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies environment overrides through `lookup`. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(ENV_BACKEND_URL) {
            self.backend.url = Some(url);
        }
        if let Some(key) = non_empty(ENV_REPORT_WRITER_KEY) {
            self.publish.writer_key = Some(key);
        }
    }

    /// Backend base URL without a trailing slash.
    pub fn backend_url(&self) -> Option<String> {
        self.backend
            .url
            .as_deref()
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
    }

    /// Backend URL for fetching snapshots, defaulting to a local backend.
    pub fn fetch_backend_url(&self) -> String {
        self.backend_url()
            .unwrap_or_else(|| DEFAULT_FETCH_BACKEND_URL.to_string())
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            smoothing: self.pipeline.smoothing,
            window: self.pipeline.window,
            kmeans: KMeansParams {
                clusters: self.pipeline.clusters,
                seed: self.pipeline.seed,
                max_iterations: self.pipeline.max_iterations,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
