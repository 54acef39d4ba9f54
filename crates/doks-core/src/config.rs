use crate::error::{DoksError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

/// Root of `config.toml`. Every section is optional.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct DoksConfig {
    pub api: ApiConfig,
    pub health: HealthConfig,
    pub query: QueryConfig,
    pub upload: UploadConfig,
}

impl DoksConfig {
    /// Rejects values that would break the monitor or the API contract.
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(DoksError::config("api.base_url must not be empty"));
        }
        if self.api.request_timeout_secs == 0 || self.api.health_timeout_secs == 0 {
            return Err(DoksError::config("api timeouts must be positive"));
        }
        self.health.validate()?;
        if let Some(min_score) = self.query.min_score {
            if !(0.0..=1.0).contains(&min_score) {
                return Err(DoksError::config(format!(
                    "query.min_score must be within [0, 1], got {}",
                    min_score
                )));
            }
        }
        if self.query.top_k == Some(0) {
            return Err(DoksError::config("query.top_k must be positive"));
        }
        if self.upload.max_upload_bytes == 0 {
            return Err(DoksError::config("upload.max_upload_bytes must be positive"));
        }
        Ok(())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL; `/health`, `/query` and `/upload` are appended.
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub health_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: 60,
            health_timeout_secs: 5,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }
}

/// Polling intervals of the health monitor.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct HealthConfig {
    /// Interval while the service is healthy.
    pub healthy_interval_secs: u64,
    /// Short probe interval right after the service turned unhealthy.
    pub recovering_interval_secs: u64,
    /// Backoff base after a failed check.
    pub failed_base_interval_secs: u64,
    /// Backoff ceiling.
    pub max_backoff_interval_secs: u64,
    pub backoff_multiplier: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            healthy_interval_secs: 30,
            recovering_interval_secs: 15,
            failed_base_interval_secs: 60,
            max_backoff_interval_secs: 300,
            backoff_multiplier: 1.5,
        }
    }
}

impl HealthConfig {
    pub fn healthy_interval(&self) -> Duration {
        Duration::from_secs(self.healthy_interval_secs)
    }

    pub fn recovering_interval(&self) -> Duration {
        Duration::from_secs(self.recovering_interval_secs)
    }

    pub fn failed_base_interval(&self) -> Duration {
        Duration::from_secs(self.failed_base_interval_secs)
    }

    pub fn max_backoff_interval(&self) -> Duration {
        Duration::from_secs(self.max_backoff_interval_secs)
    }

    /// `min(failed_base * multiplier^(failures - 1), max_backoff)`.
    ///
    /// `failures` below 1 is treated as 1.
    pub fn backoff_interval(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.backoff_multiplier.powi(exponent);
        let max = self.max_backoff_interval();
        let scaled = self.failed_base_interval().as_secs_f64() * factor;
        if !scaled.is_finite() || scaled >= max.as_secs_f64() {
            max
        } else {
            Duration::from_secs_f64(scaled)
        }
    }

    pub fn validate(&self) -> Result<()> {
        let intervals = [
            self.healthy_interval_secs,
            self.recovering_interval_secs,
            self.failed_base_interval_secs,
            self.max_backoff_interval_secs,
        ];
        if intervals.contains(&0) {
            return Err(DoksError::config("health intervals must be positive"));
        }
        // Unhealthy states at or below the recovering interval read as recovering
        if self.recovering_interval_secs >= self.failed_base_interval_secs {
            return Err(DoksError::config(format!(
                "health.recovering_interval_secs ({}) must be shorter than health.failed_base_interval_secs ({})",
                self.recovering_interval_secs, self.failed_base_interval_secs
            )));
        }
        if !(self.backoff_multiplier >= 1.0) {
            return Err(DoksError::config(format!(
                "health.backoff_multiplier must be >= 1, got {}",
                self.backoff_multiplier
            )));
        }
        Ok(())
    }
}

/// Retrieval parameters sent with every question, and reveal pacing.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct QueryConfig {
    pub top_k: Option<u32>,
    pub min_score: Option<f64>,
    pub word_delay_ms: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: Some(5),
            min_score: None,
            word_delay_ms: 30,
        }
    }
}

impl QueryConfig {
    pub fn word_delay(&self) -> Duration {
        Duration::from_millis(self.word_delay_ms)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    pub max_upload_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(DoksConfig::default().validate().is_ok());
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let health = HealthConfig::default();
        assert_eq!(health.backoff_interval(1), Duration::from_secs(60));
        assert_eq!(health.backoff_interval(2), Duration::from_secs(90));
        assert_eq!(health.backoff_interval(3), Duration::from_secs(135));
        assert_eq!(health.backoff_interval(5), Duration::from_secs(300));
        assert_eq!(health.backoff_interval(u32::MAX), Duration::from_secs(300));
    }

    #[test]
    fn test_backoff_treats_zero_failures_as_one() {
        let health = HealthConfig::default();
        assert_eq!(health.backoff_interval(0), health.failed_base_interval());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: DoksConfig = toml::from_str(
            r#"
            [api]
            base_url = "https://doks.example.com/api"

            [health]
            healthy_interval_secs = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.api.base_url, "https://doks.example.com/api");
        assert_eq!(config.api.request_timeout_secs, 60);
        assert_eq!(config.health.healthy_interval_secs, 10);
        assert_eq!(config.health.recovering_interval_secs, 15);
        assert_eq!(config.query.word_delay_ms, 30);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = DoksConfig::default();
        config.query.min_score = Some(1.5);
        assert!(config.validate().is_err());

        let mut config = DoksConfig::default();
        config.health.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());

        let mut config = DoksConfig::default();
        config.health.recovering_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = DoksConfig::default();
        config.api.base_url = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_recovering_below_backoff_base() {
        let mut health = HealthConfig {
            recovering_interval_secs: 60,
            ..HealthConfig::default()
        };
        assert!(health.validate().is_err());

        health.recovering_interval_secs = 90;
        assert!(health.validate().is_err());

        health.recovering_interval_secs = 59;
        assert!(health.validate().is_ok());
    }
}
