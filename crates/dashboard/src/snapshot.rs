//! Shared application snapshot exposed to templates as `CoreApp`.
//!
//! Seeded at startup and optionally re-read by [`refresh_task`]. Readers take an `Arc` of the current snapshot, so a
//! later [`CoreStore::replace`] never disturbs a render already in progress.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use common::CoreSnapshot;
use tokio::{task, time};
use tracing::{debug, warn};

/// File in the data directory holding the persisted snapshot.
pub const CORE_FILE: &str = "core.json";

/// Lock-free holder of the current [`CoreSnapshot`].
#[derive(Clone, Debug)]
pub struct CoreStore {
    inner: Arc<ArcSwap<CoreSnapshot>>,
}

impl CoreStore {
    pub fn new(snapshot: CoreSnapshot) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(snapshot)),
        }
    }

    /// The snapshot as of this call.
    pub fn current(&self) -> Arc<CoreSnapshot> {
        self.inner.load_full()
    }

    /// Atomically swap in a new snapshot.
    pub fn replace(&self, snapshot: CoreSnapshot) {
        self.inner.store(Arc::new(snapshot));
    }
}

impl Default for CoreStore {
    fn default() -> Self {
        Self::new(CoreSnapshot::default())
    }
}

/// Build the startup snapshot.
///
/// Starts from `defaults` and, if `data_dir` holds [`CORE_FILE`], replaces it
/// with the file's contents. Empty `domain` and `version` in the file fall
/// back to the defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load(data_dir: &Path, defaults: CoreSnapshot) -> Result<CoreSnapshot> {
    let path = data_dir.join(CORE_FILE);
    if !path.exists() {
        debug!(path = %path.display(), "no snapshot file; using defaults");
        return Ok(defaults);
    }

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut snapshot: CoreSnapshot = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    if snapshot.domain.is_empty() {
        snapshot.domain = defaults.domain;
    }
    if snapshot.version.is_empty() {
        snapshot.version = defaults.version;
    }
    debug!(
        path = %path.display(),
        services = snapshot.services.len(),
        "snapshot loaded"
    );
    Ok(snapshot)
}

/// Spawn a background task that re-reads the snapshot file every `interval`.
///
/// The file is read on the blocking pool. A failed reload keeps the previous
/// snapshot.
pub fn refresh_task(
    data_dir: PathBuf,
    defaults: CoreSnapshot,
    store: CoreStore,
    interval: Duration,
) -> task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        // The first tick fires immediately and startup has already loaded.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let dir = data_dir.clone();
            let seed = defaults.clone();
            match task::spawn_blocking(move || load(&dir, seed)).await {
                Ok(Ok(snapshot)) => {
                    store.replace(snapshot);
                    debug!("snapshot refreshed");
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "snapshot refresh failed; retaining previous snapshot")
                }
                Err(e) => warn!(error = %e, "snapshot reload task did not complete"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Service;

    fn defaults() -> CoreSnapshot {
        CoreSnapshot {
            name: "Pulseboard".into(),
            domain: "http://localhost:8080".into(),
            version: "0.1.0".into(),
            ..Default::default()
        }
    }

    #[test]
    fn replace_is_visible_to_new_readers_only() {
        let store = CoreStore::new(defaults());
        let before = store.current();

        store.replace(CoreSnapshot {
            name: "Acme".into(),
            ..Default::default()
        });

        assert_eq!(before.name, "Pulseboard");
        assert_eq!(store.current().name, "Acme");
    }

    #[test]
    fn clones_share_the_snapshot() {
        let store = CoreStore::default();
        let other = store.clone();
        store.replace(defaults());
        assert_eq!(other.current().name, "Pulseboard");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let snap = load(dir.path(), defaults()).unwrap();
        assert_eq!(snap, defaults());
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CORE_FILE),
            r#"{"name":"Acme Status","services":[{"name":"api","public":true}]}"#,
        )
        .unwrap();

        let snap = load(dir.path(), defaults()).unwrap();
        assert_eq!(snap.name, "Acme Status");
        assert_eq!(snap.domain, "http://localhost:8080");
        assert_eq!(snap.version, "0.1.0");
        assert_eq!(
            snap.services,
            vec![Service {
                name: "api".into(),
                public: true,
                ..Default::default()
            }]
        );
    }

    async fn wait_for_name(store: &CoreStore, name: &str) -> bool {
        for _ in 0..100 {
            if store.current().name == name {
                return true;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn refresh_task_picks_up_file_changes() {
        let dir = tempfile::tempdir().unwrap();
        let store = CoreStore::new(defaults());
        let handle = refresh_task(
            dir.path().to_path_buf(),
            defaults(),
            store.clone(),
            Duration::from_millis(10),
        );

        std::fs::write(dir.path().join(CORE_FILE), r#"{"name":"Reloaded"}"#).unwrap();
        assert!(wait_for_name(&store, "Reloaded").await);

        // A broken file leaves the last good snapshot in place.
        std::fs::write(dir.path().join(CORE_FILE), "{broken").unwrap();
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.current().name, "Reloaded");

        handle.abort();
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CORE_FILE), "{not json").unwrap();
        let err = load(dir.path(), defaults()).unwrap_err();
        assert!(err.to_string().contains(CORE_FILE));
    }
}
