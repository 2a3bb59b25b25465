//! Domain records exposed to templates and the JSON API.
//!
//! These mirror the monitored-service model owned by the storage layer. The
//! gateway only reads them; `Default` values back the empty-record helpers
//! used by the form templates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A monitored endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub domain: String,
    /// Check type, e.g. `"http"`, `"tcp"`, `"icmp"`.
    pub check_type: String,
    pub method: String,
    pub port: u16,
    pub expected_status: u16,
    /// Seconds between checks.
    pub interval: u64,
    /// Seconds before a check is considered failed.
    pub timeout: u64,
    pub order: i64,
    pub public: bool,
    pub online: bool,
    /// Latency of the most recent check, in seconds.
    pub latency: f64,
    pub last_success: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A dashboard account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub admin: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// A passive check-in expectation attached to a service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Checkin {
    pub id: i64,
    pub service_id: i64,
    pub name: String,
    /// Seconds between expected pings.
    pub interval: u64,
    /// Grace period in seconds.
    pub grace: u64,
    pub api_key: String,
    pub last_hit: Option<DateTime<Utc>>,
}

/// A scheduled announcement shown on the status page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub service_id: Option<i64>,
    pub start_on: Option<DateTime<Utc>>,
    pub end_on: Option<DateTime<Utc>>,
    pub notify_users: bool,
}

/// Read-only snapshot of the application as templates see it.
///
/// Carries no secrets; the API key pair lives in the server configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreSnapshot {
    pub name: String,
    pub description: String,
    pub domain: String,
    pub version: String,
    pub footer: String,
    pub services: Vec<Service>,
    pub messages: Vec<Message>,
}

impl CoreSnapshot {
    /// Services flagged public, in display order.
    pub fn public_services(&self) -> Vec<&Service> {
        let mut services: Vec<&Service> = self.services.iter().filter(|s| s.public).collect();
        services.sort_by_key(|s| s.order);
        services
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_tolerates_partial_json() {
        let snap: CoreSnapshot =
            serde_json::from_str(r#"{"name":"Acme Status","services":[{"name":"api"}]}"#).unwrap();
        assert_eq!(snap.name, "Acme Status");
        assert_eq!(snap.services.len(), 1);
        assert_eq!(snap.services[0].name, "api");
        assert!(snap.services[0].last_success.is_none());
    }

    #[test]
    fn public_services_are_filtered_and_ordered() {
        let snap = CoreSnapshot {
            services: vec![
                Service { name: "b".into(), public: true, order: 2, ..Default::default() },
                Service { name: "hidden".into(), public: false, order: 0, ..Default::default() },
                Service { name: "a".into(), public: true, order: 1, ..Default::default() },
            ],
            ..Default::default()
        };
        let names: Vec<&str> = snap.public_services().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn timestamps_serialize_as_rfc3339() {
        let when = DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let svc = Service { last_success: Some(when), ..Default::default() };
        let json = serde_json::to_value(&svc).unwrap();
        assert_eq!(json["last_success"], "2024-03-01T12:00:00Z");
    }
}
