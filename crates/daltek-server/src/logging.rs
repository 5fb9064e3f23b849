//! Structured logging for the daltek server
//!
//! Features:
//! - Structured JSON logging for production
//! - Human-readable console logging for development
//! - File rotation with daily log files
//! - Configurable log levels per module

use std::str::FromStr;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

const LOG_FILE: &str = "daltek-server.log";

/// Third-party crates kept quiet unless asked for explicitly
const QUIET_DIRECTIVES: [&str; 4] = ["hyper=warn", "tokio=warn", "tower=warn", "h2=warn"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format for development
    Pretty,
    /// JSON format for production
    Json,
    Compact,
}

impl FromStr for LogFormat {
    type Err = std::convert::Infallible;

    /// Unknown names fall back to `Pretty`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    File,
    /// Both stdout and file
    Both,
}

impl FromStr for LogOutput {
    type Err = std::convert::Infallible;

    /// Unknown names fall back to `Stdout`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "file" => LogOutput::File,
            "both" => LogOutput::Both,
            _ => LogOutput::Stdout,
        })
    }
}

fn env_filter(level: &str) -> EnvFilter {
    let mut filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    for directive in QUIET_DIRECTIVES {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

fn stdout_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    match format {
        LogFormat::Pretty => fmt::layer().pretty().with_target(true).boxed(),
        LogFormat::Json => fmt::layer().json().with_current_span(true).boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    }
}

fn file_layer<S>(directory: &str) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    std::fs::create_dir_all(directory).ok();
    let appender = RollingFileAppender::new(Rotation::DAILY, directory, LOG_FILE);
    fmt::layer().with_writer(appender).with_ansi(false).boxed()
}

/// Install the global subscriber described by `config`.
///
/// Examples:
/// ```bash
/// # Development: pretty console output at debug level
/// RUST_LOG=debug LOG_FORMAT=pretty daltek-server
///
/// # Production: JSON to a daily-rotated file
/// RUST_LOG=info LOG_FORMAT=json LOG_OUTPUT=file LOG_DIR=/var/log/daltek daltek-server
/// ```
pub fn init(config: &LoggingConfig) -> Result<(), TryInitError> {
    let format: LogFormat = config.format.parse().unwrap_or(LogFormat::Pretty);
    let output: LogOutput = config.output.parse().unwrap_or(LogOutput::Stdout);
    let filter = env_filter(&config.level);

    match output {
        LogOutput::Stdout => tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer(format))
            .try_init()?,
        LogOutput::File => tracing_subscriber::registry()
            .with(filter)
            .with(file_layer(&config.directory))
            .try_init()?,
        LogOutput::Both => tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer(format))
            .with(file_layer(&config.directory))
            .try_init()?,
    }

    tracing::info!(format = ?format, output = ?output, level = %config.level, "logging initialized");
    if output != LogOutput::Stdout {
        tracing::debug!(directory = %config.directory, "writing logs to file");
    }
    Ok(())
}

/// Helper macro for logging with structured fields
///
/// Usage:
/// ```ignore
/// log_event!(
///     level: tracing::Level::INFO,
///     event: "transform_completed",
///     widget: "echart",
///     rows: 100
/// );
/// ```
#[macro_export]
macro_rules! log_event {
    (level: $level:expr, event: $event:expr $(, $key:ident: $value:expr)* $(,)?) => {
        tracing::event!(
            $level,
            event = $event
            $(, $key = ?$value)*
        );
    };
}
