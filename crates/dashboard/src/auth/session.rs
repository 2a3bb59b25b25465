//! Session lookup behind a signed cookie.
//!
//! The session bag itself belongs to whatever issued the cookie; the gateway
//! only reads boolean flags out of it. [`SignedCookieStore`] is the concrete
//! mechanism used by the binary: a JSON object, base64url-encoded, followed
//! by an HMAC-SHA256 tag keyed by the API secret.

use axum::http::{header::COOKIE, HeaderMap};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{digest::InvalidLength, Hmac, Mac};
use serde_json::{Map, Value};
use sha2::Sha256;
use thiserror::Error;

/// Name of the cookie carrying the dashboard session.
pub const COOKIE_NAME: &str = "pulseboard_auth";

/// Session key set for any logged-in dashboard user.
pub const KEY_AUTHENTICATED: &str = "authenticated";
/// Session key set for administrators.
pub const KEY_ADMIN: &str = "admin";

type HmacSha256 = Hmac<Sha256>;

/// Errors from a session lookup. Callers treat every variant as "not
/// authenticated".
#[derive(Debug, Error)]
pub enum SessionError {
    /// The cookie is not of the form `<payload>.<tag>` or is not base64url.
    #[error("malformed session cookie")]
    Malformed,

    /// The tag does not match the payload.
    #[error("session cookie signature mismatch")]
    BadSignature,

    /// The payload is not a JSON object.
    #[error("session payload is not a JSON object: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Key/value bag attached to a browser session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    values: Map<String, Value>,
}

impl Session {
    /// An empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`, returning the session for chaining.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.values.insert(key.to_owned(), value.into());
        self
    }

    /// Boolean lookup; absent or non-boolean values read as `false`.
    pub fn flag(&self, key: &str) -> bool {
        self.values.get(key).and_then(Value::as_bool).unwrap_or(false)
    }
}

/// Lookup of the session attached to a request.
#[cfg_attr(test, mockall::automock)]
pub trait SessionStore: Send + Sync {
    /// Return the session stored under `cookie_name`.
    ///
    /// A request without the cookie yields an empty session, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the cookie is present but cannot be
    /// trusted or decoded.
    fn get(&self, headers: &HeaderMap, cookie_name: &str) -> Result<Session, SessionError>;
}

/// HMAC-signed, client-side cookie sessions.
#[derive(Clone)]
pub struct SignedCookieStore {
    mac: HmacSha256,
}

impl SignedCookieStore {
    /// Create a store whose cookies are signed with `key`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidLength`] if the MAC rejects the key.
    pub fn new(key: impl AsRef<[u8]>) -> Result<Self, InvalidLength> {
        Ok(Self {
            mac: <HmacSha256 as Mac>::new_from_slice(key.as_ref())?,
        })
    }

    /// Encode and sign `session` into a cookie value.
    pub fn issue(&self, session: &Session) -> String {
        // Serialising a map of JSON values cannot fail.
        let json = serde_json::to_vec(&session.values).unwrap_or_default();
        let payload = URL_SAFE_NO_PAD.encode(json);
        let tag = URL_SAFE_NO_PAD.encode(self.mac(payload.as_bytes()).finalize().into_bytes());
        format!("{payload}.{tag}")
    }

    /// Verify and decode a cookie value produced by [`Self::issue`].
    ///
    /// # Errors
    ///
    /// See [`SessionError`].
    pub fn decode(&self, cookie: &str) -> Result<Session, SessionError> {
        let (payload, tag) = cookie.split_once('.').ok_or(SessionError::Malformed)?;
        let tag = URL_SAFE_NO_PAD
            .decode(tag)
            .map_err(|_| SessionError::Malformed)?;
        self.mac(payload.as_bytes())
            .verify_slice(&tag)
            .map_err(|_| SessionError::BadSignature)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| SessionError::Malformed)?;
        let values: Map<String, Value> = serde_json::from_slice(&json)?;
        Ok(Session { values })
    }

    fn mac(&self, data: &[u8]) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(data);
        mac
    }
}

impl std::fmt::Debug for SignedCookieStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SignedCookieStore([REDACTED])")
    }
}

impl SessionStore for SignedCookieStore {
    fn get(&self, headers: &HeaderMap, cookie_name: &str) -> Result<Session, SessionError> {
        match find_cookie(headers, cookie_name) {
            Some(value) => self.decode(value),
            None => Ok(Session::new()),
        }
    }
}

/// First cookie named `name` across all `Cookie` headers.
fn find_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim_matches('"'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn cookie_headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(COOKIE, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn flag_defaults_to_false() {
        let s = Session::new().with("admin", "yes");
        assert!(!s.flag("admin"));
        assert!(!s.flag("authenticated"));
        assert!(Session::new().with("admin", true).flag("admin"));
    }

    #[test]
    fn issue_then_get() {
        let store = SignedCookieStore::new("secret").unwrap();
        let cookie = store.issue(&Session::new().with(KEY_AUTHENTICATED, true));
        let headers = cookie_headers(&format!("theme=dark; {COOKIE_NAME}={cookie}"));
        let session = store.get(&headers, COOKIE_NAME).unwrap();
        assert!(session.flag(KEY_AUTHENTICATED));
        assert!(!session.flag(KEY_ADMIN));
    }

    #[test]
    fn missing_cookie_is_empty_session() {
        let store = SignedCookieStore::new("secret").unwrap();
        let session = store.get(&cookie_headers("theme=dark"), COOKIE_NAME).unwrap();
        assert_eq!(session, Session::new());
    }

    #[test]
    fn other_key_fails_signature() {
        let issuer = SignedCookieStore::new("secret-a").unwrap();
        let verifier = SignedCookieStore::new("secret-b").unwrap();
        let cookie = issuer.issue(&Session::new().with(KEY_ADMIN, true));
        let err = verifier.decode(&cookie).unwrap_err();
        assert!(matches!(err, SessionError::BadSignature));
    }

    #[test]
    fn tampered_payload_fails_signature() {
        let store = SignedCookieStore::new("secret").unwrap();
        let cookie = store.issue(&Session::new().with(KEY_ADMIN, false));
        let (_, tag) = cookie.split_once('.').unwrap();
        let forged_payload = URL_SAFE_NO_PAD.encode(br#"{"admin":true}"#);
        let err = store.decode(&format!("{forged_payload}.{tag}")).unwrap_err();
        assert!(matches!(err, SessionError::BadSignature));
    }

    #[test]
    fn garbage_is_malformed() {
        let store = SignedCookieStore::new("secret").unwrap();
        assert!(matches!(store.decode("no-dot-here"), Err(SessionError::Malformed)));
        assert!(matches!(store.decode("abc.!!!"), Err(SessionError::Malformed)));
    }

    #[test]
    fn signed_non_object_payload_is_rejected() {
        let store = SignedCookieStore::new("secret").unwrap();
        let payload = URL_SAFE_NO_PAD.encode(b"[1,2,3]");
        let tag = URL_SAFE_NO_PAD.encode(store.mac(payload.as_bytes()).finalize().into_bytes());
        let err = store.decode(&format!("{payload}.{tag}")).unwrap_err();
        assert!(matches!(err, SessionError::Payload(_)));
    }
}
