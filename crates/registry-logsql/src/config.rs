// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Storage engine configuration

use crate::error::{Result, StorageError};
use crate::sql::DialectKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Storage engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQL dialect identifier ("embedded", "postgres", "sqlserver").
    /// Resolved once at startup; unknown values abort startup.
    pub dialect: String,

    /// Snapshot database path (None = in-memory, for tests and tooling).
    pub db_path: Option<String>,

    /// Number of log partitions. Must match the commit log's partition
    /// count for the lifetime of the topic.
    pub partitions: u32,

    /// How long a producer waits for its own message to be applied locally
    /// before returning a retryable ack-timeout error.
    pub ack_timeout_ms: u64,

    /// Instance name, used in logs only.
    pub node_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dialect: "embedded".to_string(),
            db_path: None,
            partitions: 8,
            ack_timeout_ms: 5_000,
            node_name: "registry-node".to_string(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Producer ack wait bound.
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    /// Resolve and validate the configured dialect.
    pub fn dialect_kind(&self) -> Result<DialectKind> {
        self.dialect.parse()
    }

    /// Validate startup invariants.
    pub fn validate(&self) -> Result<()> {
        self.dialect_kind()?;
        if self.partitions == 0 {
            return Err(StorageError::Config(
                "partition count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Config builder for fluent API
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    dialect: Option<String>,
    db_path: Option<String>,
    partitions: Option<u32>,
    ack_timeout_ms: Option<u64>,
    node_name: Option<String>,
}

impl ConfigBuilder {
    /// Set the SQL dialect identifier
    pub fn dialect(mut self, dialect: impl Into<String>) -> Self {
        self.dialect = Some(dialect.into());
        self
    }

    /// Set the snapshot database path (file-backed)
    pub fn db_path(mut self, path: impl Into<String>) -> Self {
        self.db_path = Some(path.into());
        self
    }

    /// Set the log partition count
    pub fn partitions(mut self, partitions: u32) -> Self {
        self.partitions = Some(partitions);
        self
    }

    /// Set the producer ack timeout in milliseconds
    pub fn ack_timeout_ms(mut self, ms: u64) -> Self {
        self.ack_timeout_ms = Some(ms);
        self
    }

    /// Set the instance name used in logs
    pub fn node_name(mut self, name: impl Into<String>) -> Self {
        self.node_name = Some(name.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> Config {
        let defaults = Config::default();

        Config {
            dialect: self.dialect.unwrap_or(defaults.dialect),
            db_path: self.db_path,
            partitions: self.partitions.unwrap_or(defaults.partitions),
            ack_timeout_ms: self.ack_timeout_ms.unwrap_or(defaults.ack_timeout_ms),
            node_name: self.node_name.unwrap_or(defaults.node_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = Config::builder()
            .dialect("postgres")
            .db_path("/tmp/registry.db")
            .partitions(16)
            .ack_timeout_ms(2500)
            .node_name("node-a")
            .build();

        assert_eq!(config.dialect, "postgres");
        assert_eq!(config.db_path.as_deref(), Some("/tmp/registry.db"));
        assert_eq!(config.partitions, 16);
        assert_eq!(config.ack_timeout(), Duration::from_millis(2500));
        assert_eq!(config.node_name, "node-a");
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::default();

        assert_eq!(config.dialect, "embedded");
        assert!(config.db_path.is_none());
        assert_eq!(config.partitions, 8);
        assert_eq!(config.ack_timeout_ms, 5_000);
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_dialect_fails_validation() {
        let config = Config::builder().dialect("oracle").build();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }

    #[test]
    fn test_zero_partitions_fails_validation() {
        let config = Config::builder().partitions(0).build();
        assert!(config.validate().is_err());
    }
}
