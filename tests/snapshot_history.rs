/// Snapshot → history → report flow, without a live backend
///
/// Tests verify:
/// 1. Daily snapshots built from backend payloads append into one history
/// 2. The accumulated history scores with a real rolling window
/// 3. A failed upload leaves the written report untouched
///
/// Run with: cargo test --test snapshot_history

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::json;

use heatrisk_service::ingest::backend::{self, PopulationDensity};
use heatrisk_service::ingest::history;
use heatrisk_service::ingest::table::RawTable;
use heatrisk_service::model::{PublishError, SNAPSHOT_COLUMNS};
use heatrisk_service::pipeline::{self, PipelineOptions};
use heatrisk_service::publish::{self, PublishTarget};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("heatrisk_{}_{}.csv", name, std::process::id()))
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
}

fn snapshot_for(date: NaiveDate, offset: f64) -> RawTable {
    let heat = backend::parse_heat_risk(&json!({
        "risks": {
            "B1": { "heat_index_c": 30.0 + offset },
            "B2": { "temp_c": 33.5 + offset },
            "B3": { "heat_index_c": 27.25 + offset, "temp_c": 26.0 }
        },
        "meta": { "temperaturesSource": "open-meteo" }
    }));
    assert_eq!(heat.temperatures.len(), 3);
    let counts = BTreeMap::from([("B1".to_string(), 3u64), ("B3".to_string(), 0u64)]);
    let population = BTreeMap::from([(
        "B2".to_string(),
        PopulationDensity {
            population: 1200,
            density: 5.2,
        },
    )]);
    backend::build_snapshot(date, &heat.temperatures, &counts, &population)
}

// ---------------------------------------------------------------------------
// History accumulation
// ---------------------------------------------------------------------------

#[test]
fn daily_snapshots_accumulate_into_scorable_history() {
    let path = temp_path("history");
    let _ = std::fs::remove_file(&path);

    for (i, d) in (1..=3).enumerate() {
        let appended = history::append_to_file(&path, &snapshot_for(day(d), i as f64))
            .expect("append should succeed");
        assert_eq!(appended, 3, "three barangays per snapshot");
    }

    let table = RawTable::read_csv(&path).unwrap();
    assert_eq!(table.len(), 9);
    assert_eq!(table.headers, SNAPSHOT_COLUMNS.to_vec());

    let out = pipeline::run(&table, &PipelineOptions::default()).expect("history scores");
    assert_eq!(out.latest_date, day(3));
    assert_eq!(out.report.len(), 3);

    // B1 readings are 30, 31, 32 on consecutive days.
    let b1_rolling: Vec<f64> = out.temperature_rolling[..3].iter().map(|t| t.unwrap()).collect();
    assert_eq!(b1_rolling, vec![30.0, 30.5, 31.0]);

    let _ = std::fs::remove_file(&path);
}

// ---------------------------------------------------------------------------
// Publishing
// ---------------------------------------------------------------------------

#[test]
fn failed_upload_keeps_local_report() {
    let input = temp_path("upload_input");
    let output = temp_path("upload_report");
    snapshot_for(day(1), 0.0).write_csv(&input).unwrap();

    pipeline::run_csv(&input, &output, &PipelineOptions::default()).unwrap();
    let before = std::fs::read_to_string(&output).unwrap();

    let target = PublishTarget {
        url: "http://127.0.0.1:9/api/heat/davao/pipeline-report".to_string(),
        writer_key: Some("test-key".to_string()),
        timeout: Duration::from_secs(2),
    };
    let client = reqwest::blocking::Client::new();
    let result = publish::publish_report(&client, &target, &output);
    assert!(
        matches!(result, Err(PublishError::Request(_)) | Err(PublishError::HttpStatus(_))),
        "nothing listens on the discard port"
    );

    let after = std::fs::read_to_string(&output).unwrap();
    assert_eq!(before, after, "report must survive a failed upload");

    let _ = std::fs::remove_file(&input);
    let _ = std::fs::remove_file(&output);
}
