/// Structured logging for the heat risk service
///
/// Every line carries the pipeline stage that emitted it and, where it
/// applies, the barangay id. Supports console output and an optional
/// append-only log file for scheduled daily runs.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl LogLevel {
    /// Parses a level name as used in the config file. Unknown names are `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Smooth,
    Features,
    Cluster,
    Rank,
    Report,
    Fetch,
    Publish,
    System,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Load => write!(f, "LOAD"),
            Stage::Smooth => write!(f, "SMOOTH"),
            Stage::Features => write!(f, "FEATURES"),
            Stage::Cluster => write!(f, "CLUSTER"),
            Stage::Rank => write!(f, "RANK"),
            Stage::Report => write!(f, "REPORT"),
            Stage::Fetch => write!(f, "FETCH"),
            Stage::Publish => write!(f, "PUBLISH"),
            Stage::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - endpoint not deployed or sink not configured
    Expected,
    /// Unexpected failure - backend degraded, rejected the request, or timed out
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut slot) = LOGGER.lock() {
            *slot = Some(logger);
        }
    }

    fn format_entry(level: LogLevel, stage: Stage, unit_id: Option<&str>, message: &str) -> String {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let unit_part = unit_id.map(|s| format!(" [{}]", s)).unwrap_or_default();
        format!("{} {} {}{}: {}", timestamp, level, stage, unit_part, message)
    }

    fn log(&self, level: LogLevel, stage: Stage, unit_id: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let log_entry = Self::format_entry(level, stage, unit_id, message);
        let unit_part = unit_id.map(|s| format!(" [{}]", s)).unwrap_or_default();

        if self.console_timestamps {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", log_entry),
                LogLevel::Info | LogLevel::Debug => println!("{}", log_entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", stage, unit_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", stage, unit_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}{}: {}", stage, unit_part, message),
            }
        }

        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn emit(level: LogLevel, stage: Stage, unit_id: Option<&str>, message: &str) {
    // Uninitialized logger means logging is off (library use, unit tests).
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, stage, unit_id, message);
        }
    }
}

pub fn info(stage: Stage, unit_id: Option<&str>, message: &str) {
    emit(LogLevel::Info, stage, unit_id, message);
}

pub fn warn(stage: Stage, unit_id: Option<&str>, message: &str) {
    emit(LogLevel::Warning, stage, unit_id, message);
}

pub fn error(stage: Stage, unit_id: Option<&str>, message: &str) {
    emit(LogLevel::Error, stage, unit_id, message);
}

pub fn debug(stage: Stage, unit_id: Option<&str>, message: &str) {
    emit(LogLevel::Debug, stage, unit_id, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a backend or sink failure from its error text
pub fn classify_failure(error_message: &str) -> FailureType {
    if error_message.contains("not configured") || error_message.contains("HTTP error: 404") {
        FailureType::Expected
    } else if error_message.contains("HTTP error")
        || error_message.contains("timed out")
        || error_message.contains("Request failed")
    {
        FailureType::Unexpected
    } else {
        FailureType::Unknown
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a failure with automatic classification
pub fn log_failure(stage: Stage, unit_id: Option<&str>, operation: &str, err: &dyn std::error::Error) {
    let error_msg = err.to_string();
    let failure_type = classify_failure(&error_msg);

    let message = format!("{} failed [{}]: {}", operation, failure_type, error_msg);

    match failure_type {
        FailureType::Expected => debug(stage, unit_id, &message),
        FailureType::Unexpected => error(stage, unit_id, &message),
        FailureType::Unknown => warn(stage, unit_id, &message),
    }
}

// ---------------------------------------------------------------------------
// Fetch Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of per-unit fetch operations
pub fn log_fetch_summary(what: &str, total: usize, successful: usize, failed: usize) {
    let message = format!(
        "{} complete: {}/{} successful, {} defaulted",
        what, successful, total, failed
    );

    if failed == 0 {
        info(Stage::Fetch, None, &message);
    } else if successful == 0 {
        error(Stage::Fetch, None, &message);
    } else {
        warn(Stage::Fetch, None, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("warn"), Some(LogLevel::Warning));
        assert_eq!(LogLevel::parse(" DEBUG "), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("verbose"), None);
    }

    #[test]
    fn test_failure_classification() {
        assert_eq!(classify_failure("HTTP error: 500"), FailureType::Unexpected);
        assert_eq!(classify_failure("HTTP error: 404"), FailureType::Expected);
        assert_eq!(
            classify_failure("Publishing not configured: BACKEND_URL is not set"),
            FailureType::Expected
        );
        assert_eq!(classify_failure("something odd"), FailureType::Unknown);
    }

    #[test]
    fn test_entry_includes_stage_and_unit() {
        let entry = Logger::format_entry(LogLevel::Warning, Stage::Fetch, Some("1130700001"), "defaulted to 0");
        assert!(entry.contains("WARN FETCH [1130700001]: defaulted to 0"), "got {}", entry);
    }
}
