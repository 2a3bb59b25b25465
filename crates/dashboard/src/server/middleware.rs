//! Axum middleware layers applied to the router.
//!
//! Includes request tracing, timeout enforcement, and response compression.

use std::time::Duration;

use super::mode::CONNECTION_TIMEOUT;

/// Per-request timeout covering handler execution; matches the connection
/// deadlines. Socket reads and writes are bounded separately by the listener.
pub const REQUEST_TIMEOUT: Duration = CONNECTION_TIMEOUT;
