//! TLS listener configuration using rustls with a restricted cipher policy.
//!
//! The policy is fixed: TLS 1.2 minimum, ECDHE key exchange over P-384 or
//! P-256 only, AEAD suites with 256-bit AES or ChaCha20, and `http/1.1` as the
//! only ALPN protocol so clients never negotiate HTTP/2.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rustls::crypto::{ring, CryptoProvider};
use rustls::ServerConfig;

use super::mode::TlsFiles;

/// ALPN protocols offered to clients.
pub const ALPN_HTTP1: &[u8] = b"http/1.1";

/// Crypto provider limited to the hardened suite and group list.
pub fn hardened_provider() -> CryptoProvider {
    CryptoProvider {
        cipher_suites: vec![
            ring::cipher_suite::TLS13_AES_256_GCM_SHA384,
            ring::cipher_suite::TLS13_CHACHA20_POLY1305_SHA256,
            ring::cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
            ring::cipher_suite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
            ring::cipher_suite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
        ],
        kx_groups: vec![ring::kx_group::SECP384R1, ring::kx_group::SECP256R1],
        ..ring::default_provider()
    }
}

/// Build a [`rustls::ServerConfig`] from PEM-encoded certificate and private key bytes.
///
/// # Errors
///
/// Returns an error if the certificate or key cannot be parsed, or if rustls
/// rejects the configuration.
pub fn build_server_config(cert_pem: &[u8], key_pem: &[u8]) -> Result<Arc<ServerConfig>> {
    let certs = rustls_pemfile::certs(&mut std::io::BufReader::new(cert_pem))
        .collect::<Result<Vec<_>, _>>()
        .context("failed to parse TLS certificate chain")?;
    if certs.is_empty() {
        anyhow::bail!("no certificates found in PEM data");
    }

    let key = rustls_pemfile::private_key(&mut std::io::BufReader::new(key_pem))
        .context("failed to read TLS private key")?
        .context("no private key found in PEM data")?;

    let mut config = ServerConfig::builder_with_provider(Arc::new(hardened_provider()))
        .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])
        .context("hardened provider does not support the requested TLS versions")?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("failed to build rustls ServerConfig")?;

    config.ignore_client_order = true;
    config.alpn_protocols = vec![ALPN_HTTP1.to_vec()];

    Ok(Arc::new(config))
}

/// Read the certificate and key from disk and build the server config.
///
/// # Errors
///
/// Returns an error if either file cannot be read or parsed; startup treats
/// this as fatal.
pub fn load_server_config(data_dir: &Path) -> Result<Arc<ServerConfig>> {
    let files = TlsFiles::in_dir(data_dir);
    let cert_pem = std::fs::read(&files.cert)
        .with_context(|| format!("failed to read {}", files.cert.display()))?;
    let key_pem = std::fs::read(&files.key)
        .with_context(|| format!("failed to read {}", files.key.display()))?;
    build_server_config(&cert_pem, &key_pem)
}

/// Self-signed `localhost` pair under `testdata/`.
#[cfg(test)]
pub(crate) mod fixtures {
    pub const CERT_PEM: &[u8] = include_bytes!("../../testdata/server.crt");
    pub const KEY_PEM: &[u8] = include_bytes!("../../testdata/server.key");

    /// Root store that trusts the fixture certificate.
    pub fn trust_fixture() -> rustls::RootCertStore {
        let mut roots = rustls::RootCertStore::empty();
        for cert in rustls_pemfile::certs(&mut &CERT_PEM[..]) {
            roots.add(cert.unwrap()).unwrap();
        }
        roots
    }
}
