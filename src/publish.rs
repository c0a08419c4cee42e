/// Report publishing sink.
///
/// Uploads the already-written report CSV to the backend so the frontend
/// can offer it for download. Publishing is best-effort: the caller logs a
/// `PublishError` and carries on, and the local report is never modified.

use std::path::Path;
use std::time::Duration;

use crate::config::Config;
use crate::model::PublishError;

/// Header carrying the optional shared secret.
pub const REPORT_KEY_HEADER: &str = "x-pipeline-report-key";

/// Where and how to publish.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishTarget {
    pub url: String,
    pub writer_key: Option<String>,
    pub timeout: Duration,
}

impl PublishTarget {
    /// Builds the target from config. Fails if no backend URL is configured.
    pub fn from_config(config: &Config) -> Result<Self, PublishError> {
        let base = config
            .backend_url()
            .ok_or_else(|| PublishError::NotConfigured("BACKEND_URL is not set".to_string()))?;
        Ok(Self {
            url: report_url(&base, &config.publish.report_path),
            writer_key: config.publish.writer_key.clone(),
            timeout: Duration::from_secs(config.publish.timeout_secs),
        })
    }
}

/// Joins base URL and path with exactly one slash between them.
pub fn report_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Posts the report file at `report` as `text/csv`.
pub fn publish_report(
    client: &reqwest::blocking::Client,
    target: &PublishTarget,
    report: &Path,
) -> Result<(), PublishError> {
    let body = std::fs::read_to_string(report)?;

    let mut request = client
        .post(&target.url)
        .header("Content-Type", "text/csv")
        .timeout(target.timeout)
        .body(body);
    if let Some(key) = &target.writer_key {
        request = request.header(REPORT_KEY_HEADER, key);
    }

    let response = request.send()?;
    if !response.status().is_success() {
        return Err(PublishError::HttpStatus(response.status().as_u16()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_url_joins_with_single_slash() {
        assert_eq!(
            report_url("http://localhost:3000/", "/api/heat/davao/pipeline-report"),
            "http://localhost:3000/api/heat/davao/pipeline-report"
        );
        assert_eq!(report_url("http://h", "x"), "http://h/x");
    }

    #[test]
    fn test_target_requires_backend_url() {
        let config = Config::default();
        let err = PublishTarget::from_config(&config).expect_err("no backend configured");
        assert!(matches!(err, PublishError::NotConfigured(_)));
    }

    #[test]
    fn test_target_carries_key_and_timeout() {
        let mut config = Config::default();
        config.backend.url = Some("http://localhost:3000".to_string());
        config.publish.writer_key = Some("k".to_string());
        let target = PublishTarget::from_config(&config).unwrap();
        assert_eq!(target.url, "http://localhost:3000/api/heat/davao/pipeline-report");
        assert_eq!(target.writer_key.as_deref(), Some("k"));
        assert_eq!(target.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_missing_report_file_is_publish_error_not_panic() {
        let client = reqwest::blocking::Client::new();
        let target = PublishTarget {
            url: "http://127.0.0.1:9/unused".to_string(),
            writer_key: None,
            timeout: Duration::from_secs(1),
        };
        let result = publish_report(&client, &target, Path::new("/nonexistent/report.csv"));
        assert!(matches!(result, Err(PublishError::ReportUnreadable(_))));
    }
}
