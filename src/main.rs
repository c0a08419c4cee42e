//! `heatrisk` command line entry point.
//!
//! - `heatrisk fetch` pulls today's snapshot from the backend and writes it,
//!   or appends it to a history table.
//! - `heatrisk run` scores the history table and writes the latest-date
//!   report, optionally uploading it.
//!
//! Flags override `heatrisk.toml`, which overrides built-in defaults.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use heatrisk_service::config::{Config, DEFAULT_CONFIG_PATH};
use heatrisk_service::ingest::backend::BackendClient;
use heatrisk_service::ingest::history;
use heatrisk_service::logging::{self, Stage};
use heatrisk_service::model::HeatRiskError;
use heatrisk_service::pipeline;
use heatrisk_service::publish::{self, PublishTarget};

#[derive(Parser)]
#[command(name = "heatrisk")]
#[command(about = "Weighted heat risk pipeline for barangays (k-means + risk levels)")]
struct Cli {
    /// TOML config file; missing file means defaults
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Also append log lines to this file
    #[arg(long)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score the observation history and write the latest-date report
    Run(RunArgs),
    /// Fetch today's snapshot from the backend
    Fetch(FetchArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Input CSV (barangay_id, date, temperature, facility_distance, optional population/density)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Output CSV with barangay_id, risk_level, cluster
    #[arg(long)]
    output: Option<PathBuf>,

    /// Use raw values instead of the rolling average (e.g. single-day data)
    #[arg(long)]
    no_rolling: bool,

    /// Rolling window size
    #[arg(long)]
    window: Option<usize>,

    /// Number of k-means clusters
    #[arg(long)]
    clusters: Option<usize>,

    /// Seed for cluster initialisation
    #[arg(long)]
    seed: Option<u64>,

    /// Upload the report to the backend (BACKEND_URL, optional PIPELINE_REPORT_WRITER_KEY)
    #[arg(long)]
    upload: bool,
}

#[derive(Args)]
struct FetchArgs {
    /// Output CSV path for today's snapshot
    #[arg(long)]
    output: Option<PathBuf>,

    /// Append today's rows to this history CSV instead
    #[arg(long, value_name = "CSV")]
    append: Option<PathBuf>,

    /// Backend base URL (default: BACKEND_URL, else http://localhost:3000)
    #[arg(long)]
    backend: Option<String>,

    /// Timeout in seconds for the heat API
    #[arg(long)]
    timeout: Option<u64>,

    /// Concurrent requests for facility counts
    #[arg(long)]
    workers: Option<usize>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = Config::load_with_env(&cli.config)?;
    if cli.log_file.is_some() {
        config.logging.file = cli.log_file.clone();
    }

    logging::init_logger(
        config.logging.min_level(),
        config.logging.file.as_deref(),
        config.logging.timestamps,
    );

    let result = match cli.command {
        Command::Run(args) => run(config, args),
        Command::Fetch(args) => fetch(config, args),
    };

    if let Err(e) = &result {
        logging::error(Stage::System, None, &e.to_string());
    }
    Ok(result?)
}

impl RunArgs {
    fn apply(self, config: &mut Config) {
        if let Some(input) = self.input {
            config.io.input = input;
        }
        if let Some(output) = self.output {
            config.io.output = output;
        }
        if self.no_rolling {
            config.pipeline.smoothing = false;
        }
        if let Some(window) = self.window {
            config.pipeline.window = window;
        }
        if let Some(clusters) = self.clusters {
            config.pipeline.clusters = clusters;
        }
        if let Some(seed) = self.seed {
            config.pipeline.seed = seed;
        }
        if self.upload {
            config.publish.enabled = true;
        }
    }
}

fn run(mut config: Config, args: RunArgs) -> Result<(), HeatRiskError> {
    args.apply(&mut config);

    if !config.io.input.exists() {
        return Err(HeatRiskError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("input file not found: {}", config.io.input.display()),
        )));
    }

    pipeline::run_csv(&config.io.input, &config.io.output, &config.pipeline_options())?;

    if config.publish.enabled {
        upload(&config);
    }
    Ok(())
}

/// Best-effort upload; failures are logged and never fail the run.
fn upload(config: &Config) {
    let result = PublishTarget::from_config(config).and_then(|target| {
        let client = reqwest::blocking::Client::new();
        publish::publish_report(&client, &target, &config.io.output)
    });

    match result {
        Ok(()) => logging::info(
            Stage::Publish,
            None,
            "Uploaded report to backend; users can download it from the frontend.",
        ),
        Err(e) => logging::log_failure(
            Stage::Publish,
            None,
            &format!("Upload (report is still in {})", config.io.output.display()),
            &e,
        ),
    }
}

impl FetchArgs {
    fn apply(self, config: &mut Config) {
        if let Some(backend) = self.backend {
            config.backend.url = Some(backend);
        }
        if let Some(timeout) = self.timeout {
            config.backend.heat_timeout_secs = timeout;
        }
        if let Some(workers) = self.workers {
            config.backend.workers = workers;
        }
        if let Some(output) = self.output {
            config.io.snapshot = output;
        }
        if self.append.is_some() {
            config.io.append_history = self.append;
        }
    }
}

fn fetch(mut config: Config, args: FetchArgs) -> Result<(), HeatRiskError> {
    args.apply(&mut config);

    let base_url = config.fetch_backend_url();
    let client = BackendClient::new(&base_url, config.backend.clone())?;

    let today = chrono::Utc::now().date_naive();
    let snapshot = client.fetch_snapshot(today)?;

    match &config.io.append_history {
        Some(path) => {
            let appended = history::append_to_file(path, &snapshot)?;
            logging::info(
                Stage::Report,
                None,
                &format!("Appended {} rows to {}", appended, path.display()),
            );
        }
        None => {
            snapshot.write_csv(&config.io.snapshot)?;
            logging::info(
                Stage::Report,
                None,
                &format!("Wrote {} rows to {}", snapshot.len(), config.io.snapshot.display()),
            );
        }
    }
    Ok(())
}
