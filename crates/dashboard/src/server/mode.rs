//! Plaintext vs. TLS listener selection.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

/// Certificate chain file looked up in the data directory.
pub const CERT_FILE: &str = "server.crt";
/// Private key file looked up in the data directory.
pub const KEY_FILE: &str = "server.key";

/// Port the TLS listener binds regardless of the configured plaintext port.
pub const TLS_PORT: u16 = 443;

/// Read, write and idle deadline applied to every connection in both modes.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(60);

/// `Strict-Transport-Security` value sent on every response in TLS mode.
pub const HSTS_VALUE: &str = "max-age=63072000; includeSubDomains";

/// Listener mode, decided once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    Plaintext,
    TlsHardened,
}

impl ServerMode {
    /// Choose the mode from the presence of [`CERT_FILE`] and [`KEY_FILE`]
    /// in `data_dir`. File contents are not inspected here; unreadable or
    /// malformed material fails later when the listener loads it.
    pub fn detect(data_dir: &Path) -> Self {
        let files = TlsFiles::in_dir(data_dir);
        let cert = files.cert.exists();
        let key = files.key.exists();

        if cert && key {
            info!(
                cert = %files.cert.display(),
                key = %files.key.display(),
                "certificate and key found; starting in TLS mode"
            );
            ServerMode::TlsHardened
        } else {
            info!(cert_found = cert, key_found = key, "starting in plaintext mode");
            ServerMode::Plaintext
        }
    }

    pub fn is_hardened(self) -> bool {
        self == ServerMode::TlsHardened
    }

    /// Label used in logs and the health response.
    pub fn as_str(self) -> &'static str {
        match self {
            ServerMode::Plaintext => "plaintext",
            ServerMode::TlsHardened => "tls",
        }
    }
}

/// Paths of the certificate chain and private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl TlsFiles {
    pub fn in_dir(data_dir: &Path) -> Self {
        Self {
            cert: data_dir.join(CERT_FILE),
            key: data_dir.join(KEY_FILE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn both_files_select_tls() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CERT_FILE), "cert").unwrap();
        fs::write(dir.path().join(KEY_FILE), "key").unwrap();
        assert_eq!(ServerMode::detect(dir.path()), ServerMode::TlsHardened);
    }

    #[test]
    fn cert_only_selects_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CERT_FILE), "cert").unwrap();
        assert_eq!(ServerMode::detect(dir.path()), ServerMode::Plaintext);
    }

    #[test]
    fn key_only_selects_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(KEY_FILE), "key").unwrap();
        assert_eq!(ServerMode::detect(dir.path()), ServerMode::Plaintext);
    }

    #[test]
    fn empty_dir_selects_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(ServerMode::detect(dir.path()), ServerMode::Plaintext);
    }

    #[test]
    fn missing_dir_selects_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("does-not-exist");
        assert_eq!(ServerMode::detect(&gone), ServerMode::Plaintext);
    }

    #[test]
    fn labels() {
        assert_eq!(ServerMode::Plaintext.as_str(), "plaintext");
        assert_eq!(ServerMode::TlsHardened.as_str(), "tls");
        assert!(ServerMode::TlsHardened.is_hardened());
        assert!(!ServerMode::Plaintext.is_hardened());
    }
}
