//! Logging setup for hosts of the interop layer.
//!
//! # Design
//! - One entry point installs the global subscriber (pretty or JSON).
//! - Callback diagnostics can be raised to `trace` without touching `RUST_LOG`.
//! - The build SHA is recorded once and stamped on the startup event.

use once_cell::sync::OnceCell;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Result, TelemetryError};

/// Level used when neither `RUST_LOG` nor the configuration name one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Filter directive enabling adapter and trampoline diagnostics.
pub const CALLBACK_TRACE_DIRECTIVE: &str = "esent_interop::callback=trace";

static BUILD_SHA: OnceCell<String> = OnceCell::new();

/// Output format for the subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Structured JSON lines.
    Json,
    /// Human-readable output.
    Pretty,
}

impl LogFormat {
    /// Pretty for debug builds, JSON otherwise.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }

    fn parse(name: &str) -> Self {
        match name {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            _ => Self::infer(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Level or filter directives used when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Build identifier recorded on startup.
    pub build_sha: String,
    /// Raise status callback diagnostics to `trace`.
    pub callback_trace: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: LogFormat::infer(),
            build_sha: build_sha().to_string(),
            callback_trace: false,
        }
    }
}

impl LoggingConfig {
    /// Read `log_level`, `log_format` and `callback_trace` from a JSON
    /// document; absent keys keep their defaults.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        let mut config = Self::default();
        if let Some(level) = value.get("log_level").and_then(Value::as_str) {
            config.level = level.to_string();
        }
        if let Some(format) = log_format_from_config(Some(value)) {
            config.format = format;
        }
        if let Some(trace) = value.get("callback_trace").and_then(Value::as_bool) {
            config.callback_trace = trace;
        }
        config
    }
}

/// Read `log_format` from a configuration document.
#[must_use]
pub fn log_format_from_config(config: Option<&Value>) -> Option<LogFormat> {
    config
        .and_then(|value| value.get("log_format"))
        .and_then(Value::as_str)
        .map(LogFormat::parse)
}

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if the callback directive cannot be parsed or a global
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let _ = BUILD_SHA.set(config.build_sha.clone());
    let filter = build_env_filter(config)?;

    let installed = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(false).with_thread_ids(true))
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_thread_ids(true))
            .try_init(),
    };
    installed.map_err(|source| TelemetryError::SubscriberInstall { source })?;

    info!(build_sha = build_sha(), format = ?config.format, "logging initialised");
    Ok(())
}

/// Build SHA recorded by [`init_logging`], or `dev`.
#[must_use]
pub fn build_sha() -> &'static str {
    BUILD_SHA.get().map_or("dev", String::as_str)
}

fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    if !config.callback_trace {
        return Ok(filter);
    }
    let directive = CALLBACK_TRACE_DIRECTIVE
        .parse::<Directive>()
        .map_err(|source| TelemetryError::FilterDirective {
            directive: CALLBACK_TRACE_DIRECTIVE,
            source,
        })?;
    Ok(filter.add_directive(directive))
}
