#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Telemetry primitives shared across the interop workspace.
//!
//! This crate centralises logging setup and the metrics registry so the native
//! boundary layer and its hosts report through one consistent observability story.

pub mod error;
pub mod init;
pub mod metrics;

pub use error::{Result, TelemetryError};
pub use init::{
    CALLBACK_TRACE_DIRECTIVE, DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging,
    log_format_from_config,
};
pub use metrics::{CALLBACK_FAILURE_KINDS, Metrics, MetricsSnapshot};
