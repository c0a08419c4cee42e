/// Backend data client for daily barangay snapshots.
///
/// Builds one row per barangay for today from three backend sources:
/// - heat: per-barangay heat index or air temperature
/// - facilities: facility counts, turned into `facility_distance`
/// - population: population and density
///
/// Each source degrades independently. Heat falls back to the plain
/// temperature endpoint, facility counts fall back from one batch request
/// to parallel per-barangay requests, and population falls back to zeros.
/// Only a complete absence of temperatures is fatal.
///
/// Endpoints (relative to `BACKEND_URL`):
///   GET  /api/heat/davao/barangay-heat-risk
///   GET  /api/heat/davao/barangay-temperatures
///   POST /api/facilities/counts-by-barangays
///   GET  /api/facilities/by-barangay/{id}
///   GET  /api/heat/davao/barangay-population

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde_json::{json, Value};

use crate::config::BackendSection;
use crate::ingest::table::RawTable;
use crate::logging::{self, Stage};
use crate::model::{HeatRiskError, SNAPSHOT_COLUMNS};

const HEAT_RISK_PATH: &str = "/api/heat/davao/barangay-heat-risk";
const TEMPERATURES_PATH: &str = "/api/heat/davao/barangay-temperatures";
const FACILITY_BATCH_PATH: &str = "/api/facilities/counts-by-barangays";
const FACILITY_UNIT_PATH: &str = "/api/facilities/by-barangay";
const POPULATION_PATH: &str = "/api/heat/davao/barangay-population";

// ============================================================================
// Upstream values
// ============================================================================

/// Where the temperature values came from. Informational only: the
/// pipeline uses whatever number it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureProvenance {
    /// Heat index computed by the backend from temperature and humidity.
    ValidatedHeatIndex,
    /// Plain air temperature per barangay.
    RawAirTemperature,
    /// One city-wide average copied to every barangay.
    CityWideFallback,
}

impl TemperatureProvenance {
    pub fn describe(&self) -> &'static str {
        match self {
            TemperatureProvenance::ValidatedHeatIndex => "validated heat index",
            TemperatureProvenance::RawAirTemperature => "raw air temperature",
            TemperatureProvenance::CityWideFallback => {
                "city-wide fallback average applied to all units"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeatReadings {
    pub temperatures: BTreeMap<String, f64>,
    pub provenance: TemperatureProvenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PopulationDensity {
    pub population: u64,
    pub density: f64,
}

// ============================================================================
// Response parsing
// ============================================================================

/// A JSON number, or a string holding one.
fn number(v: &Value) -> Option<f64> {
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
        .filter(|x: &f64| x.is_finite())
}

/// Parses `{risks: {id: {heat_index_c?, temp_c?}}, meta: {temperaturesSource}}`.
///
/// `heat_index_c` wins over `temp_c` per barangay; entries with neither are
/// dropped.
pub fn parse_heat_risk(body: &Value) -> HeatReadings {
    let mut temperatures = BTreeMap::new();
    let mut used_heat_index = false;

    if let Some(risks) = body.get("risks").and_then(Value::as_object) {
        for (id, risk) in risks {
            if !risk.is_object() {
                continue;
            }
            if let Some(hi) = risk.get("heat_index_c").and_then(Value::as_f64) {
                temperatures.insert(id.clone(), hi);
                used_heat_index = true;
            } else if let Some(t) = risk.get("temp_c").and_then(Value::as_f64) {
                temperatures.insert(id.clone(), t);
            }
        }
    }

    let source = body
        .get("meta")
        .and_then(|m| m.get("temperaturesSource"))
        .and_then(Value::as_str)
        .unwrap_or("");

    let provenance = if source == "weatherapi" {
        TemperatureProvenance::CityWideFallback
    } else if used_heat_index {
        TemperatureProvenance::ValidatedHeatIndex
    } else {
        TemperatureProvenance::RawAirTemperature
    };

    HeatReadings {
        temperatures,
        provenance,
    }
}

/// Parses `{temperatures: {id: number|null}}`, dropping nulls.
pub fn parse_temperatures(body: &Value) -> BTreeMap<String, f64> {
    body.get("temperatures")
        .and_then(Value::as_object)
        .map(|temps| {
            temps
                .iter()
                .filter_map(|(id, v)| number(v).map(|t| (id.clone(), t)))
                .collect()
        })
        .unwrap_or_default()
}

/// Parses `{counts: {id: n}}`.
pub fn parse_facility_counts(body: &Value) -> BTreeMap<String, u64> {
    body.get("counts")
        .and_then(Value::as_object)
        .map(|counts| {
            counts
                .iter()
                .filter_map(|(id, v)| number(v).map(|n| (id.clone(), n.max(0.0) as u64)))
                .collect()
        })
        .unwrap_or_default()
}

/// Parses `{id: {population, density}}`. Malformed entries become zeros.
pub fn parse_population(body: &Value) -> BTreeMap<String, PopulationDensity> {
    let Some(entries) = body.as_object() else {
        return BTreeMap::new();
    };

    entries
        .iter()
        .map(|(id, v)| {
            let population = v
                .get("population")
                .and_then(number)
                .map_or(0, |p| p.max(0.0) as u64);
            let density = v.get("density").and_then(number).unwrap_or(0.0).max(0.0);
            (id.clone(), PopulationDensity { population, density })
        })
        .collect()
}

/// Fewer facilities means a higher value, like a distance.
pub fn facility_count_to_distance(facility_count: u64) -> f64 {
    1.0 / (1.0 + facility_count as f64)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Assembles the snapshot table, one row per barangay with a temperature.
pub fn build_snapshot(
    date: NaiveDate,
    temperatures: &BTreeMap<String, f64>,
    facility_counts: &BTreeMap<String, u64>,
    population: &BTreeMap<String, PopulationDensity>,
) -> RawTable {
    let mut table = RawTable::new(SNAPSHOT_COLUMNS.iter().map(|c| c.to_string()).collect());
    let date = date.format("%Y-%m-%d").to_string();

    for (id, temp) in temperatures {
        let count = facility_counts.get(id).copied().unwrap_or(0);
        let pd = population.get(id).copied().unwrap_or_default();
        table.push_row(vec![
            Some(id.clone()),
            Some(date.clone()),
            Some(round_to(*temp, 2).to_string()),
            Some(round_to(facility_count_to_distance(count), 6).to_string()),
            Some(pd.population.to_string()),
            Some(round_to(pd.density, 4).to_string()),
        ]);
    }

    table
}

// ============================================================================
// API Client
// ============================================================================

pub struct BackendClient {
    client: reqwest::blocking::Client,
    base_url: String,
    settings: BackendSection,
}

impl BackendClient {
    pub fn new(base_url: &str, settings: BackendSection) -> Result<Self, HeatRiskError> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| HeatRiskError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            settings,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get_json(&self, path: &str, timeout_secs: u64) -> Result<Value, reqwest::Error> {
        self.client
            .get(self.url(path))
            .timeout(Duration::from_secs(timeout_secs))
            .send()?
            .error_for_status()?
            .json()
    }

    pub fn fetch_heat_risk(&self) -> Result<HeatReadings, reqwest::Error> {
        let body = self.get_json(HEAT_RISK_PATH, self.settings.heat_timeout_secs)?;
        Ok(parse_heat_risk(&body))
    }

    pub fn fetch_temperatures(&self) -> Result<BTreeMap<String, f64>, reqwest::Error> {
        let body = self.get_json(TEMPERATURES_PATH, self.settings.heat_timeout_secs)?;
        Ok(parse_temperatures(&body))
    }

    pub fn fetch_population(&self) -> Result<BTreeMap<String, PopulationDensity>, reqwest::Error> {
        let timeout = self
            .settings
            .population_timeout_secs
            .min(self.settings.heat_timeout_secs);
        let body = self.get_json(POPULATION_PATH, timeout)?;
        Ok(parse_population(&body))
    }

    pub fn fetch_facility_counts_batch(
        &self,
        ids: &[String],
    ) -> Result<BTreeMap<String, u64>, reqwest::Error> {
        let body: Value = self
            .client
            .post(self.url(FACILITY_BATCH_PATH))
            .timeout(Duration::from_secs(self.settings.batch_timeout_secs))
            .json(&json!({ "barangayIds": ids }))
            .send()?
            .error_for_status()?
            .json()?;
        Ok(parse_facility_counts(&body))
    }

    /// Facility count for one barangay. A 404 means no facilities.
    pub fn fetch_facility_count(&self, id: &str) -> Result<u64, reqwest::Error> {
        let response = self
            .client
            .get(self.url(&format!("{}/{}", FACILITY_UNIT_PATH, id)))
            .timeout(Duration::from_secs(self.settings.unit_timeout_secs))
            .send()?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(0);
        }
        let body: Value = response.error_for_status()?.json()?;
        Ok(body.get("total").and_then(number).map_or(0, |n| n.max(0.0) as u64))
    }

    /// Per-barangay requests on a pool of `workers` threads. Failures count 0.
    fn fetch_facility_counts_parallel(&self, ids: &[String]) -> BTreeMap<String, u64> {
        let fetch_one = |id: &String| match self.fetch_facility_count(id) {
            Ok(n) => (id.clone(), Some(n)),
            Err(e) => {
                logging::log_failure(Stage::Fetch, Some(id.as_str()), "Facility count", &e);
                (id.clone(), None)
            }
        };

        let results: Vec<(String, Option<u64>)> = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.workers.max(1))
            .build()
        {
            Ok(pool) => pool.install(|| ids.par_iter().map(fetch_one).collect()),
            Err(e) => {
                logging::warn(
                    Stage::Fetch,
                    None,
                    &format!("Worker pool unavailable ({}), fetching sequentially", e),
                );
                ids.iter().map(fetch_one).collect()
            }
        };

        let failed = results.iter().filter(|(_, n)| n.is_none()).count();
        logging::log_fetch_summary("Facility counts", ids.len(), ids.len() - failed, failed);

        results
            .into_iter()
            .map(|(id, n)| (id, n.unwrap_or(0)))
            .collect()
    }

    /// Facility counts for every id: batch first, per-barangay on failure.
    pub fn fetch_facility_counts(&self, ids: &[String]) -> BTreeMap<String, u64> {
        match self.fetch_facility_counts_batch(ids) {
            Ok(mut counts) => {
                for id in ids {
                    counts.entry(id.clone()).or_insert(0);
                }
                counts
            }
            Err(e) => {
                logging::info(
                    Stage::Fetch,
                    None,
                    &format!(
                        "Batch not available ({}), using {} parallel requests...",
                        e, self.settings.workers
                    ),
                );
                self.fetch_facility_counts_parallel(ids)
            }
        }
    }

    /// Heat readings with the temperature-endpoint fallback.
    fn fetch_heat_with_fallback(
        &self,
        heat: Result<HeatReadings, reqwest::Error>,
    ) -> Result<HeatReadings, HeatRiskError> {
        match heat {
            Ok(readings) if !readings.temperatures.is_empty() => return Ok(readings),
            Ok(_) => logging::warn(Stage::Fetch, None, "Heat risk returned no barangays"),
            Err(e) => logging::log_failure(Stage::Fetch, None, "Heat risk", &e),
        }

        match self.fetch_temperatures() {
            Ok(temperatures) if !temperatures.is_empty() => {
                logging::info(
                    Stage::Fetch,
                    None,
                    "Using temperatures from barangay-temperatures (source unknown).",
                );
                Ok(HeatReadings {
                    temperatures,
                    provenance: TemperatureProvenance::RawAirTemperature,
                })
            }
            Ok(_) => Err(HeatRiskError::DataUnavailable(
                "No barangay temperatures returned from API".to_string(),
            )),
            Err(e) => Err(HeatRiskError::DataUnavailable(format!(
                "Error fetching temperatures: {}",
                e
            ))),
        }
    }

    /// Fetches today's snapshot. Heat and population are requested
    /// concurrently since heat is the long pole.
    pub fn fetch_snapshot(&self, date: NaiveDate) -> Result<RawTable, HeatRiskError> {
        logging::info(
            Stage::Fetch,
            None,
            &format!(
                "Requesting heat and population from {} (timeout={}s) ...",
                self.base_url, self.settings.heat_timeout_secs
            ),
        );

        let (heat, population) = std::thread::scope(|s| {
            let pop = s.spawn(|| self.fetch_population());
            let heat = self.fetch_heat_risk();
            (heat, pop.join())
        });

        let readings = self.fetch_heat_with_fallback(heat)?;
        logging::info(
            Stage::Fetch,
            None,
            &format!("Temperatures: {}", readings.provenance.describe()),
        );

        let population = match population {
            Ok(Ok(p)) if !p.is_empty() => p,
            Ok(Err(e)) => {
                logging::log_failure(Stage::Fetch, None, "Population", &e);
                BTreeMap::new()
            }
            _ => {
                logging::info(Stage::Fetch, None, "Population/density not available, using 0 for pipeline.");
                BTreeMap::new()
            }
        };

        let ids: Vec<String> = readings.temperatures.keys().cloned().collect();
        logging::info(
            Stage::Fetch,
            None,
            &format!("Fetched temperatures for {} barangays. Fetching facility counts...", ids.len()),
        );
        let facility_counts = self.fetch_facility_counts(&ids);

        Ok(build_snapshot(date, &readings.temperatures, &facility_counts, &population))
    }
}

// ============================================================================
// Tests
// ============================================================================
