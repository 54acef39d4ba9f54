//! Health domain module.
//!
//! Types describing the reachability of the remote RAG API, and the traits
//! through which the health monitor talks to the outside world.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Body of `GET <base>/health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Overall status; only `"healthy"` counts as healthy.
    pub status: String,
    /// Per-dependency status strings reported by the service.
    #[serde(default)]
    pub services: HashMap<String, String>,
    /// ISO-8601 timestamp from the service.
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Observable state of the health monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthState {
    /// `None` until the first check completes.
    pub is_healthy: Option<bool>,
    /// True while a visible (first or forced) check is in flight.
    pub is_checking: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    /// Interval of the repeating schedule.
    pub current_interval: Duration,
    /// Number of checks that changed `is_healthy`.
    pub check_count: u64,
}

impl HealthState {
    /// Initial state at process start.
    pub fn initial(interval: Duration) -> Self {
        Self {
            is_healthy: None,
            is_checking: true,
            last_checked_at: None,
            consecutive_failures: 0,
            current_interval: interval,
            check_count: 0,
        }
    }
}

/// Conceptual state of the monitor, derived from [`HealthState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum HealthStatus {
    Unknown,
    Healthy,
    /// Unhealthy, probing at the short recovering interval.
    Recovering { failures: u32 },
    /// Unhealthy, polling at a backoff interval.
    Failed { failures: u32 },
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// Whether the host UI is currently shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Remote health endpoint.
#[async_trait]
pub trait HealthApi: Send + Sync {
    /// Performs one health request. Non-2xx responses are errors.
    async fn check(&self) -> Result<HealthReport>;
}

/// Receives reachability signals from components other than the monitor.
///
/// The conversation store holds one of these so a failed query can flip the
/// health indicator without waiting for the next poll.
pub trait HealthSink: Send + Sync {
    fn mark_external_failure(&self);
}

/// A sink that ignores every signal.
pub struct NoOpHealthSink;

impl HealthSink for NoOpHealthSink {
    fn mark_external_failure(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_parses_wire_shape() {
        let json = r#"{"status":"healthy","services":{"vector_db":"up","llm":"up"},"timestamp":"2025-01-01T00:00:00Z"}"#;
        let report: HealthReport = serde_json::from_str(json).unwrap();
        assert!(report.is_healthy());
        assert_eq!(report.services.get("llm").map(String::as_str), Some("up"));
    }

    #[test]
    fn test_only_healthy_status_counts() {
        let report = HealthReport {
            status: "degraded".into(),
            services: HashMap::new(),
            timestamp: None,
        };
        assert!(!report.is_healthy());
    }

    #[test]
    fn test_initial_state_is_unknown_and_checking() {
        let state = HealthState::initial(Duration::from_secs(30));
        assert_eq!(state.is_healthy, None);
        assert!(state.is_checking);
        assert_eq!(state.consecutive_failures, 0);
    }
}
