//! Configuration loading and validation for the dashboard gateway.
//!
//! All values are read from environment variables once at startup. The
//! resulting [`Config`] is immutable; the pieces the request path needs
//! (secrets, flags) are split out and carried in the application state.

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::auth::ServerSecrets;

/// Validated gateway configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// Address the listener binds to.
    #[serde(default = "default_bind_ip")]
    pub bind_ip: String,

    /// Port for the plaintext listener. The TLS listener always uses 443.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory searched for `server.crt` / `server.key` and `core.json`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory holding the `templates/` and `js/` asset trees.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,

    /// Public read-only API key.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Private API secret; also keys the session cookie signature.
    #[serde(default)]
    pub api_secret: Option<String>,

    /// Public URL of the dashboard, embedded in the setup deep link.
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Display timezone as an offset in hours from UTC.
    #[serde(default)]
    pub timezone: f32,

    /// Serve static vendor assets from a CDN instead of locally.
    #[serde(default)]
    pub use_cdn: bool,

    /// Force full and user authentication to succeed. Test harnesses only.
    #[serde(default)]
    pub test_mode: bool,

    /// Fail the request when any template fragment fails to load or parse.
    #[serde(default)]
    pub render_strict: bool,

    /// Seconds between reloads of `core.json`; `0` disables reloading.
    #[serde(default = "default_snapshot_refresh_secs")]
    pub snapshot_refresh_secs: u64,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional OTLP endpoint; spans are exported only when set.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,
}

fn default_bind_ip() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}
fn default_domain() -> String {
    "http://localhost:8080".into()
}
fn default_snapshot_refresh_secs() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Parsed listener address.
    pub fn bind_addr(&self) -> Result<IpAddr> {
        self.bind_ip
            .parse()
            .with_context(|| format!("BIND_IP {:?} is not an IP address", self.bind_ip))
    }

    /// The API key pair plus display settings, or `None` when no key pair is
    /// configured. `None` puts the authorizer into its fail-open setup mode.
    pub fn server_secrets(&self) -> Option<ServerSecrets> {
        let api_key = non_empty(self.api_key.as_deref())?;
        let api_secret = non_empty(self.api_secret.as_deref())?;
        Some(ServerSecrets {
            api_key: api_key.to_owned(),
            api_secret: api_secret.to_owned(),
            domain: self.domain.clone(),
            timezone: self.timezone,
        })
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("PORT must be > 0");
        }
        self.bind_addr()?;

        let key = non_empty(self.api_key.as_deref()).is_some();
        let secret = non_empty(self.api_secret.as_deref()).is_some();
        if key != secret {
            anyhow::bail!("API_KEY and API_SECRET must be set together");
        }

        if !(-14.0..=14.0).contains(&self.timezone) {
            anyhow::bail!("TIMEZONE must be an hour offset between -14 and 14");
        }
        Ok(())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_ip", &self.bind_ip)
            .field("port", &self.port)
            .field("data_dir", &self.data_dir)
            .field("assets_dir", &self.assets_dir)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_secret", &self.api_secret.as_ref().map(|_| "[REDACTED]"))
            .field("domain", &self.domain)
            .field("timezone", &self.timezone)
            .field("use_cdn", &self.use_cdn)
            .field("test_mode", &self.test_mode)
            .field("render_strict", &self.render_strict)
            .field("snapshot_refresh_secs", &self.snapshot_refresh_secs)
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            bind_ip: default_bind_ip(),
            port: default_port(),
            data_dir: default_data_dir(),
            assets_dir: default_assets_dir(),
            api_key: Some("pub-key".into()),
            api_secret: Some("priv-secret".into()),
            domain: default_domain(),
            timezone: 0.0,
            use_cdn: false,
            test_mode: false,
            render_strict: false,
            snapshot_refresh_secs: default_snapshot_refresh_secs(),
            log_level: default_log_level(),
            otel_exporter_otlp_endpoint: None,
        }
    }

    #[test]
    fn defaults_are_correct() {
        assert_eq!(default_bind_ip(), "0.0.0.0");
        assert_eq!(default_port(), 8080);
        assert_eq!(default_data_dir(), PathBuf::from("."));
        assert_eq!(default_assets_dir(), PathBuf::from("assets"));
        assert_eq!(default_snapshot_refresh_secs(), 30);
        assert_eq!(default_log_level(), "info");
    }

    #[test]
    fn validate_accepts_valid_config() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_port() {
        let cfg = Config { port: 0, ..base() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_bind_ip() {
        let cfg = Config { bind_ip: "localhost:80".into(), ..base() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_half_a_key_pair() {
        let cfg = Config { api_secret: Some("  ".into()), ..base() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_timezone() {
        let cfg = Config { timezone: 15.5, ..base() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn secrets_absent_without_key_pair() {
        let cfg = Config { api_key: None, api_secret: None, ..base() };
        assert!(cfg.validate().is_ok());
        assert!(cfg.server_secrets().is_none());
    }

    #[test]
    fn secrets_carry_domain_and_timezone() {
        let cfg = Config { timezone: -8.0, ..base() };
        let secrets = cfg.server_secrets().unwrap();
        assert_eq!(secrets.api_key, "pub-key");
        assert_eq!(secrets.api_secret, "priv-secret");
        assert_eq!(secrets.domain, "http://localhost:8080");
        assert_eq!(secrets.timezone, -8.0);
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let out = format!("{:?}", base());
        assert!(!out.contains("priv-secret"));
        assert!(!out.contains("pub-key"));
        assert!(out.contains("REDACTED"));
    }
}
