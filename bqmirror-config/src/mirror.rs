use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors raised while validating a [`MirrorConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("the number of agents must be greater than zero")]
    AgentsZero,

    #[error("the table limit must be greater than zero")]
    LimitZero,

    #[error("the staging bucket must not be empty")]
    StagingBucketEmpty,
}

/// Configuration for a dataset mirroring run.
///
/// Describes which tables to copy, where to copy them, and how the copy is
/// executed (parallelism, polling cadence, staging area).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// GCP project that owns the source dataset.
    pub source_project: String,
    /// Dataset to copy tables from.
    pub source_dataset: String,
    /// GCP project that owns the destination dataset.
    pub destination_project: String,
    /// Dataset to copy tables into. Defaults to the source dataset name when
    /// not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_dataset: Option<String>,
    /// Optional regex that table names must fully match to be considered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_filter: Option<String>,
    /// GCS bucket (with optional path) used to stage exported table data,
    /// e.g. `gs://my-bucket` or `gs://my-bucket/staging`.
    pub staging_bucket: String,
    /// Maximum number of tables to copy per run.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Number of tables copied concurrently.
    #[serde(default = "default_agents")]
    pub agents: u16,
    /// Delay between consecutive status polls of a remote job.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

const fn default_limit() -> usize {
    100
}

const fn default_agents() -> u16 {
    4
}

const fn default_poll_interval_ms() -> u64 {
    30_000
}

impl MirrorConfig {
    /// Validates the configuration, returning the first violation found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.agents == 0 {
            return Err(ValidationError::AgentsZero);
        }

        if self.limit == 0 {
            return Err(ValidationError::LimitZero);
        }

        if self.staging_bucket.trim().is_empty() {
            return Err(ValidationError::StagingBucketEmpty);
        }

        Ok(())
    }

    /// Returns the destination dataset name, falling back to the source
    /// dataset when none was configured.
    pub fn destination_dataset(&self) -> &str {
        self.destination_dataset
            .as_deref()
            .unwrap_or(&self.source_dataset)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json() -> &'static str {
        r#"{
            "source_project": "src-proj",
            "source_dataset": "events",
            "destination_project": "dst-proj",
            "staging_bucket": "gs://staging"
        }"#
    }

    #[test]
    fn deserialize_applies_defaults() {
        let config: MirrorConfig = serde_json::from_str(minimal_json()).unwrap();

        assert_eq!(config.limit, 100);
        assert_eq!(config.agents, 4);
        assert_eq!(config.poll_interval_ms, 30_000);
        assert_eq!(config.destination_dataset(), "events");
        assert!(config.table_filter.is_none());
    }

    #[test]
    fn validate_accepts_defaults() {
        let config: MirrorConfig = serde_json::from_str(minimal_json()).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_agents() {
        let mut config: MirrorConfig = serde_json::from_str(minimal_json()).unwrap();
        config.agents = 0;
        assert!(matches!(config.validate(), Err(ValidationError::AgentsZero)));
    }

    #[test]
    fn validate_rejects_zero_limit() {
        let mut config: MirrorConfig = serde_json::from_str(minimal_json()).unwrap();
        config.limit = 0;
        assert!(matches!(config.validate(), Err(ValidationError::LimitZero)));
    }

    #[test]
    fn validate_rejects_empty_staging_bucket() {
        let mut config: MirrorConfig = serde_json::from_str(minimal_json()).unwrap();
        config.staging_bucket = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::StagingBucketEmpty)
        ));
    }

    #[test]
    fn explicit_destination_dataset_wins() {
        let mut config: MirrorConfig = serde_json::from_str(minimal_json()).unwrap();
        config.destination_dataset = Some("events_copy".to_string());
        assert_eq!(config.destination_dataset(), "events_copy");
    }
}
