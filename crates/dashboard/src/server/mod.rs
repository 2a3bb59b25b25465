//! HTTP listener, routing, and request handling.
//!
//! # Responsibilities
//! - Pick the listener mode from the certificate files in the data directory.
//! - Bind a plaintext or hardened TLS listener speaking HTTP/1.1 only.
//! - Define the Axum router with all routes and shared middleware.
//! - Inject shared application state (`AppState`) into handlers.

pub mod handlers;
pub mod listener;
pub mod middleware;
pub mod mode;
pub mod router;
pub mod state;
pub mod tls;
