//! Common types, domain records, and errors shared across `pulseboard` crates.

pub mod error;
pub mod protocol;
pub mod records;

pub use error::ServiceError;
pub use records::{Checkin, CoreSnapshot, Message, Service, User};
