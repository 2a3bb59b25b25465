//! Trust-tier predicates over a request.
//!
//! Routes pick the exact predicate they need; the [`Authorizer`] does not
//! rank tiers on their behalf. Every predicate is a pure function of the
//! request, the configured secrets and the session lookup, so a single
//! `Authorizer` is shared by all in-flight requests without locking.

use std::sync::Arc;

use axum::http::{HeaderMap, Uri};
use tracing::debug;

use super::credentials::Credentials;
use super::session::{SessionStore, COOKIE_NAME, KEY_ADMIN, KEY_AUTHENTICATED};

/// API key pair and display settings from the server configuration.
#[derive(Clone, PartialEq)]
pub struct ServerSecrets {
    /// Public key granting read-only API access.
    pub api_key: String,
    /// Private secret granting full API access.
    pub api_secret: String,
    pub domain: String,
    /// Display offset in hours from UTC.
    pub timezone: f32,
}

impl std::fmt::Debug for ServerSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSecrets")
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("timezone", &self.timezone)
            .finish()
    }
}

/// Caller trust tiers, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrustLevel {
    Anonymous,
    ReadOnly,
    User,
    Admin,
}

/// Evaluates the four trust predicates.
#[derive(Clone)]
pub struct Authorizer {
    secrets: Option<Arc<ServerSecrets>>,
    sessions: Option<Arc<dyn SessionStore>>,
    test_mode: bool,
}

impl Authorizer {
    /// Build an authorizer.
    ///
    /// `None` for either `secrets` or `sessions` puts full authentication into
    /// fail-open mode, which is how a fresh install is reachable before it is
    /// configured. `test_mode` makes [`Self::full_authenticated`] and
    /// [`Self::is_user`] succeed unconditionally.
    pub fn new(
        secrets: Option<ServerSecrets>,
        sessions: Option<Arc<dyn SessionStore>>,
        test_mode: bool,
    ) -> Self {
        Self {
            secrets: secrets.map(Arc::new),
            sessions,
            test_mode,
        }
    }

    pub fn secrets(&self) -> Option<&ServerSecrets> {
        self.secrets.as_deref()
    }

    /// `true` when full authentication is granted to every caller because a
    /// collaborator is missing or test mode is on.
    pub fn is_fail_open(&self) -> bool {
        self.test_mode || self.secrets.is_none() || self.sessions.is_none()
    }

    /// Read-only API access: public key in the query or bearer token, or full
    /// authentication.
    pub fn read_authenticated(&self, uri: &Uri, headers: &HeaderMap) -> bool {
        let creds = Credentials::extract(uri, headers);
        if let Some(secrets) = self.secrets.as_deref() {
            if creds.query_matches(&secrets.api_key) || creds.bearer_matches(&secrets.api_key) {
                return true;
            }
        }
        self.full_authenticated(headers)
    }

    /// Full access: test mode, fail-open setup, the private secret as bearer
    /// token, or an administrator session.
    pub fn full_authenticated(&self, headers: &HeaderMap) -> bool {
        if self.test_mode {
            return true;
        }
        let Some(secrets) = self.secrets.as_deref() else {
            return true;
        };
        if self.sessions.is_none() {
            return true;
        }
        // The query parameter only ever carries the public key.
        let creds = Credentials::from_headers(headers);
        if creds.bearer_matches(&secrets.api_secret) {
            return true;
        }
        self.is_admin(headers)
    }

    /// Administrator session.
    pub fn is_admin(&self, headers: &HeaderMap) -> bool {
        self.session_flag(headers, KEY_ADMIN)
    }

    /// Logged-in dashboard user.
    pub fn is_user(&self, headers: &HeaderMap) -> bool {
        if self.test_mode {
            return true;
        }
        self.session_flag(headers, KEY_AUTHENTICATED)
    }

    /// Snapshot of every predicate for one request.
    pub fn access(&self, uri: &Uri, headers: &HeaderMap) -> Access {
        Access {
            read: self.read_authenticated(uri, headers),
            full: self.full_authenticated(headers),
            admin: self.is_admin(headers),
            user: self.is_user(headers),
        }
    }

    fn session_flag(&self, headers: &HeaderMap, key: &str) -> bool {
        let Some(sessions) = self.sessions.as_deref() else {
            return false;
        };
        match sessions.get(headers, COOKIE_NAME) {
            Ok(session) => session.flag(key),
            Err(e) => {
                debug!(error = %e, "session lookup failed; treating as unauthenticated");
                false
            }
        }
    }
}

/// Results of the four predicates for a single request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Access {
    pub read: bool,
    pub full: bool,
    pub admin: bool,
    pub user: bool,
}

impl Access {
    /// Highest tier the caller holds.
    pub fn level(&self) -> TrustLevel {
        if self.admin {
            TrustLevel::Admin
        } else if self.user {
            TrustLevel::User
        } else if self.read {
            TrustLevel::ReadOnly
        } else {
            TrustLevel::Anonymous
        }
    }
}
