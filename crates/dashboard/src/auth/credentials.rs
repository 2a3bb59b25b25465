//! Credential extraction from the query string and `Authorization` header.

use axum::http::{header::AUTHORIZATION, HeaderMap, Uri};
use sha2::{Digest, Sha256};

/// Query parameter carrying the public API key.
pub const API_QUERY_PARAM: &str = "api";

const BEARER_PREFIX: &str = "Bearer ";

/// Tokens presented by a single request. Lives only for that request.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// The first `api` query parameter value, or `None` when that value is
    /// empty. Later `api` parameters are ignored.
    pub query: Option<String>,
    /// First `Authorization` header value with any `Bearer ` prefix stripped.
    pub bearer: Option<String>,
}

impl Credentials {
    /// Pull both token sources out of the request. Absence is not an error.
    pub fn extract(uri: &Uri, headers: &HeaderMap) -> Self {
        Self {
            query: query_token(uri),
            bearer: bearer_token(headers),
        }
    }

    /// Header-only extraction, for checks that never accept a query token.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            query: None,
            bearer: bearer_token(headers),
        }
    }

    /// `true` if the query token matches `expected`.
    pub fn query_matches(&self, expected: &str) -> bool {
        self.query.as_deref().is_some_and(|t| tokens_match(t, expected))
    }

    /// `true` if the bearer token matches `expected`.
    pub fn bearer_matches(&self, expected: &str) -> bool {
        self.bearer.as_deref().is_some_and(|t| tokens_match(t, expected))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("query", &self.query.as_ref().map(|_| "[REDACTED]"))
            .field("bearer", &self.bearer.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

fn query_token(uri: &Uri) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == API_QUERY_PARAM)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    // Only the first header instance is consulted.
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = raw.strip_prefix(BEARER_PREFIX).unwrap_or(raw);
    if token.is_empty() {
        return None;
    }
    Some(token.to_owned())
}

/// Compare a presented token with a configured secret.
///
/// Empty values never match. Digests are compared so the comparison time
/// does not depend on where the first differing byte is.
pub fn tokens_match(presented: &str, expected: &str) -> bool {
    if presented.is_empty() || expected.is_empty() {
        return false;
    }
    Sha256::digest(presented.as_bytes()) == Sha256::digest(expected.as_bytes())
}
