/// Structured logging for the air-quality service
///
/// Every line carries the upstream/subsystem it concerns and an optional
/// context tag (city, region, prediction date). Output goes to stderr and,
/// when configured, is appended to a log file for scheduled runs.

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
    /// Parses `debug|info|warn|warning|error`, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    AirVisual,
    Firms,
    Usgs,
    Database,
    Archive,
    Model,
    System,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::AirVisual => write!(f, "AIRVISUAL"),
            DataSource::Firms => write!(f, "FIRMS"),
            DataSource::Usgs => write!(f, "USGS"),
            DataSource::Database => write!(f, "DB"),
            DataSource::Archive => write!(f, "ARCHIVE"),
            DataSource::Model => write!(f, "MODEL"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - feed had nothing new for the window
    Expected,
    /// Unexpected failure - service degradation, bad key or schema drift
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
    fn format_entry(level: LogLevel, source: &DataSource, context: Option<&str>, message: &str) -> String {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let context_part = context.map(|c| format!(" [{}]", c)).unwrap_or_default();
        format!("{} {} {}{}: {}", timestamp, level, source, context_part, message)
    }

    fn log(&self, level: LogLevel, source: &DataSource, context: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let log_entry = Self::format_entry(level, source, context, message);
        let context_part = context.map(|c| format!(" [{}]", c)).unwrap_or_default();

        // Console output; stdout is reserved for the job outcome
        if self.console_timestamps {
            eprintln!("{}", log_entry);
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", source, context_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", source, context_part, message),
                LogLevel::Info => eprintln!("   {}", message),
                LogLevel::Debug => eprintln!("   [DEBUG] {}{}: {}", source, context_part, message),
            }
        }

        // File output
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

/// Initialize the global logger. Calling it again replaces the settings.
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    let logger = Logger {
        min_level,
        log_file: log_file.map(String::from),
        console_timestamps,
    };
    // A poisoned lock only means another thread panicked mid-log.
    let mut guard = LOGGER.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = Some(logger);
}

fn dispatch(level: LogLevel, source: DataSource, context: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, &source, context, message);
        }
    }
}

/// Log a general informational message
pub fn info(source: DataSource, context: Option<&str>, message: &str) {
    dispatch(LogLevel::Info, source, context, message);
}

/// Log a warning message
pub fn warn(source: DataSource, context: Option<&str>, message: &str) {
    dispatch(LogLevel::Warning, source, context, message);
}

/// Log an error message
pub fn error(source: DataSource, context: Option<&str>, message: &str) {
    dispatch(LogLevel::Error, source, context, message);
}

/// Log a debug message
pub fn debug(source: DataSource, context: Option<&str>, message: &str) {
    dispatch(LogLevel::Debug, source, context, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify an upstream fetch failure from its error message.
pub fn classify_fetch_failure(error_message: &str) -> FailureType {
    if error_message.contains("No data") || error_message.contains("no events") {
        // Quiet days produce empty feeds; nothing is wrong upstream.
        FailureType::Expected
    } else if error_message.contains("HTTP error: 401")
        || error_message.contains("HTTP error: 403")
        || error_message.contains("HTTP error: 5")
    {
        FailureType::Unexpected
    } else if error_message.contains("Parse error") {
        // Payload shape changed under us
        FailureType::Unexpected
    } else {
        FailureType::Unknown
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log an upstream failure with automatic classification
pub fn log_fetch_failure(source: DataSource, context: &str, operation: &str, err: &dyn std::error::Error) {
    let error_msg = err.to_string();
    let failure_type = classify_fetch_failure(&error_msg);

    let message = format!("{} failed [{}]: {}", operation, failure_type, error_msg);

    match failure_type {
        FailureType::Expected => debug(source, Some(context), &message),
        FailureType::Unexpected => error(source, Some(context), &message),
        FailureType::Unknown => warn(source, Some(context), &message),
    }
}

// ---------------------------------------------------------------------------
// Job Summary Logging
// ---------------------------------------------------------------------------

/// Log the row counts of a finished job
pub fn log_job_summary(source: DataSource, job: &str, total: usize, written: usize, skipped: usize) {
    let message = format!(
        "{} complete: {}/{} written, {} skipped",
        job, written, total, skipped
    );

    if total == 0 || written > 0 {
        info(source, None, &message);
    } else {
        warn(source, None, &message);
    }
}
