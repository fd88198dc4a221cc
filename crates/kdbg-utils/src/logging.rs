//! # Logging Utilities
//!
//! Structured logging for kdbg using `tracing`.
//!
//! Log records go to stderr so that command output on stdout (memory dumps,
//! register dumps, thread lists) stays clean for piping. Optionally every
//! record is also written to a file.
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: filter directives (e.g. `debug`, `kdbg_core=trace`)
//! - `KDBG_LOG_FORMAT`: `pretty` (default) or `json`
//! - `KDBG_LOG_FILE`: log file path; a directory gets a dated file name
//!
//! ## Example
//!
//! ```rust,no_run
//! use kdbg_utils::init_logging;
//!
//! // Keep the guard alive until exit or file output is lost.
//! let _guard = init_logging().expect("Failed to initialize logging");
//! tracing::info!("kdbg started");
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, io};

use chrono::{NaiveDate, Utc};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the output format
pub const LOG_FORMAT_ENV: &str = "KDBG_LOG_FORMAT";

/// Environment variable naming the log file
pub const LOG_FILE_ENV: &str = "KDBG_LOG_FILE";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per record
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    /// Link failures only
    Error,
    /// Plus framing errors and rejected input
    Warn,
    /// Plus trap entry and debugger attach (default)
    Info,
    /// Plus every command and event
    Debug,
    /// Plus codec resynchronization
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(s.to_string())),
        }
    }
}

/// Keeps the background file writer running
///
/// Dropping it flushes and stops file output. Console output is unaffected.
#[must_use = "file logging stops when the guard is dropped"]
#[derive(Debug)]
pub struct LoggingGuard
{
    _file: Option<WorkerGuard>,
}

/// Initialize logging from the environment.
///
/// ## Errors
///
/// - `InvalidFormat` if `KDBG_LOG_FORMAT` is set to something unknown
/// - `FileError` if the log file directory cannot be created
/// - `InitializationFailed` if a global subscriber is already installed
pub fn init_logging() -> Result<LoggingGuard, LoggingError>
{
    let format = match env::var(LOG_FORMAT_ENV) {
        Ok(value) => value.parse()?,
        Err(_) => LogFormat::default(),
    };
    init_logging_with_level(None, format)
}

/// Initialize logging with an explicit level, overriding `RUST_LOG`.
///
/// With `level == None` the filter comes from `RUST_LOG`, falling back to
/// `info`. `KDBG_LOG_FILE` is honored either way.
///
/// ## Errors
///
/// As for [`init_logging`], minus the format check.
pub fn init_logging_with_level(level: Option<LogLevel>, format: LogFormat) -> Result<LoggingGuard, LoggingError>
{
    let rust_log = env::var("RUST_LOG").ok();
    let filter = build_filter(level, rust_log.as_deref());

    let mut layers: Vec<BoxedLayer> = vec![console_layer(format, filter.clone())];

    let mut file_guard = None;
    if let Some(path) = env::var_os(LOG_FILE_ENV).map(PathBuf::from) {
        let path = resolve_log_file(&path, Utc::now().date_naive());
        let (layer, guard) = file_layer(&path, format, filter)?;
        layers.push(layer);
        file_guard = Some(guard);
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;

    Ok(LoggingGuard { _file: file_guard })
}

/// Filter precedence: explicit level, then `RUST_LOG`, then `info`.
fn build_filter(level: Option<LogLevel>, rust_log: Option<&str>) -> EnvFilter
{
    let default = || EnvFilter::new(Level::INFO.to_string());
    match (level, rust_log) {
        (Some(level), _) => EnvFilter::new(Level::from(level).to_string()),
        (None, Some(directives)) => EnvFilter::try_new(directives).unwrap_or_else(|_| default()),
        (None, None) => default(),
    }
}

/// A directory gets `YYYY-MM-DD-kdbg.log` inside it; anything else is used as is.
fn resolve_log_file(path: &Path, today: NaiveDate) -> PathBuf
{
    if path.is_dir() {
        path.join(format!("{}-kdbg.log", today.format("%Y-%m-%d")))
    } else {
        path.to_path_buf()
    }
}

fn console_layer(format: LogFormat, filter: EnvFilter) -> BoxedLayer
{
    let layer = fmt::layer()
        .with_target(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(io::stderr);
    match format {
        LogFormat::Pretty => layer.with_ansi(true).with_filter(filter).boxed(),
        LogFormat::Json => layer.json().with_current_span(true).with_filter(filter).boxed(),
    }
}

fn file_layer(path: &Path, format: LogFormat, filter: EnvFilter) -> Result<(BoxedLayer, WorkerGuard), LoggingError>
{
    let dir = path.parent().filter(|dir| !dir.as_os_str().is_empty()).unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;
    let name = path
        .file_name()
        .ok_or_else(|| LoggingError::InvalidFile(path.display().to_string()))?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
    let layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(writer);
    let layer = match format {
        LogFormat::Pretty => layer.with_ansi(false).with_filter(filter).boxed(),
        LogFormat::Json => layer.json().with_current_span(true).with_filter(filter).boxed(),
    };
    Ok((layer, guard))
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Unknown log format name
    #[error("Unknown log format: {0}. Use 'pretty' or 'json'")]
    InvalidFormat(String),

    /// Unknown log level name
    #[error("Unknown log level: {0}. Use 'error', 'warn', 'info', 'debug', or 'trace'")]
    InvalidLevel(String),

    /// Log file path has no file name
    #[error("Invalid log file path: {0}")]
    InvalidFile(String),

    /// A global subscriber is already installed
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// Log file could not be prepared
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}

#[cfg(test)]
mod tests
{
    use tracing::level_filters::LevelFilter;

    use super::*;

    #[test]
    fn test_log_format_from_str()
    {
        assert_eq!(LogFormat::from_str("pretty").unwrap(), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("JSON").unwrap(), LogFormat::Json);
        assert!(matches!(LogFormat::from_str("xml"), Err(LoggingError::InvalidFormat(_))));
    }

    #[test]
    fn test_log_level_from_str()
    {
        assert_eq!(LogLevel::from_str("warning").unwrap(), LogLevel::Warn);
        assert_eq!(LogLevel::from_str("Trace").unwrap(), LogLevel::Trace);
        assert!(matches!(LogLevel::from_str("loud"), Err(LoggingError::InvalidLevel(_))));
        assert_eq!(Level::from(LogLevel::Debug), Level::DEBUG);
    }

    #[test]
    fn test_explicit_level_beats_rust_log()
    {
        let hint = |filter: EnvFilter| <EnvFilter as Layer<Registry>>::max_level_hint(&filter);
        assert_eq!(hint(build_filter(Some(LogLevel::Debug), Some("trace"))), Some(LevelFilter::DEBUG));
        assert_eq!(hint(build_filter(None, Some("kdbg_core=trace"))), Some(LevelFilter::TRACE));
        assert_eq!(hint(build_filter(None, None)), Some(LevelFilter::INFO));
    }

    #[test]
    fn test_directory_gets_dated_file_name()
    {
        let dir = env::temp_dir();
        let day = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(resolve_log_file(&dir, day), dir.join("2024-03-09-kdbg.log"));

        let file = dir.join("no-such-dir").join("kdbg.log");
        assert_eq!(resolve_log_file(&file, day), file);
    }
}
