//! Request authentication: credential extraction, session lookup, and the
//! trust-tier predicates routes gate on.

pub mod credentials;
pub mod evaluator;
pub mod session;

pub use evaluator::{Access, Authorizer, ServerSecrets, TrustLevel};
pub use session::{SessionStore, SignedCookieStore};
