//! Structured logging and optional OpenTelemetry span export.
//!
//! # Telemetry invariants
//!
//! - **No secrets** (API key, API secret, session cookies) may appear in any
//!   span attribute or log field.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`); `RUST_LOG`
//!   takes precedence when set.
//! - Spans are exported only when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.

pub mod init;

pub use init::{init_telemetry, shutdown_telemetry};
