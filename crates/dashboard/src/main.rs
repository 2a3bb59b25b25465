//! `pulseboard`: status dashboard gateway entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline (tracing + optional OTLP).
//! 3. Choose the listener mode from the certificate files in `DATA_DIR`.
//! 4. Load the template and script asset stores.
//! 5. Seed the application snapshot from configuration and `core.json`, and
//!    spawn its refresh task.
//! 6. Build the session store and the authorizer.
//! 7. Build the Axum router and run the listener.

mod auth;
mod config;
mod render;
mod server;
mod snapshot;
mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use common::CoreSnapshot;
use tracing::{info, warn};

use auth::{Authorizer, SessionStore, SignedCookieStore};
use config::Config;
use render::{Composer, Dispatcher, MemoryAssets, RenderPolicy};
use server::mode::ServerMode;
use server::state::AppState;
use snapshot::CoreStore;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_ip = %cfg.bind_ip,
        port = cfg.port,
        "pulseboard starting"
    );

    // -----------------------------------------------------------------------
    // 3. Server mode
    // -----------------------------------------------------------------------
    let mode = ServerMode::detect(&cfg.data_dir);

    // -----------------------------------------------------------------------
    // 4. Assets
    // -----------------------------------------------------------------------
    let templates = MemoryAssets::from_dir(&cfg.assets_dir.join("templates"))
        .context("failed to load templates")?;
    let scripts =
        MemoryAssets::from_dir(&cfg.assets_dir.join("js")).context("failed to load scripts")?;
    if templates.is_empty() {
        warn!(dir = %cfg.assets_dir.display(), "no templates found; every page will render empty");
    }
    let policy = if cfg.render_strict {
        RenderPolicy::Strict
    } else {
        RenderPolicy::BestEffort
    };
    let composer = Composer::new(Arc::new(templates), Arc::new(scripts));
    let dispatcher = Dispatcher::new(composer, mode, policy);

    // -----------------------------------------------------------------------
    // 5. Application snapshot
    // -----------------------------------------------------------------------
    let defaults = CoreSnapshot {
        name: "Pulseboard".into(),
        domain: cfg.domain.clone(),
        version: env!("CARGO_PKG_VERSION").into(),
        ..Default::default()
    };
    let core = CoreStore::new(snapshot::load(&cfg.data_dir, defaults.clone())?);
    info!(
        name = %core.current().name,
        services = core.current().services.len(),
        "application snapshot ready"
    );
    let _snapshot_refresh = (cfg.snapshot_refresh_secs > 0).then(|| {
        snapshot::refresh_task(
            cfg.data_dir.clone(),
            defaults,
            core.clone(),
            Duration::from_secs(cfg.snapshot_refresh_secs),
        )
    });

    // -----------------------------------------------------------------------
    // 6. Authorization
    // -----------------------------------------------------------------------
    let secrets = cfg.server_secrets();
    let sessions = match &secrets {
        Some(s) => {
            let store = SignedCookieStore::new(&s.api_secret)
                .map_err(|e| anyhow::anyhow!("invalid session signing key: {e}"))?;
            Some(Arc::new(store) as Arc<dyn SessionStore>)
        }
        None => None,
    };
    let authorizer = Authorizer::new(secrets, sessions, cfg.test_mode);
    if cfg.test_mode {
        warn!("TEST_MODE is on; every caller is treated as an authenticated user");
    } else if authorizer.is_fail_open() {
        warn!("API_KEY and API_SECRET are not configured; full access is open to every caller");
    }

    // -----------------------------------------------------------------------
    // 7. HTTP server
    // -----------------------------------------------------------------------
    let state = AppState::new(authorizer, dispatcher, core, cfg.use_cdn);
    let router = server::router::build(state);

    let result = server::listener::run(
        mode,
        cfg.bind_addr()?,
        cfg.port,
        &cfg.data_dir,
        router,
    )
    .await;

    telemetry::shutdown_telemetry();
    result
}
