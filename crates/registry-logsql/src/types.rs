// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registry entity types
//!
//! Metadata rows materialized into the snapshot store. Content is addressed
//! by a SHA-256 hash of its bytes, so two instances replaying the same log
//! agree on content identity without coordination.

use crate::error::{Result, StorageError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

// ---------------------------------------------------------------------------
// Content hashing
// ---------------------------------------------------------------------------

/// Hex-encoded SHA-256 of raw content bytes.
///
/// Deterministic across instances and restarts; independent of the random
/// correlation ids used by the id sequencers.
pub fn content_hash(content: &[u8]) -> String {
    use fmt::Write;

    let mut hasher = Sha256::new();
    hasher.update(content);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

// ---------------------------------------------------------------------------
// Version lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle state of an artifact version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionState {
    Enabled,
    Disabled,
    Deprecated,
}

impl VersionState {
    /// Stable storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            VersionState::Enabled => "ENABLED",
            VersionState::Disabled => "DISABLED",
            VersionState::Deprecated => "DEPRECATED",
        }
    }

    /// Parse the storage representation.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "ENABLED" => Ok(VersionState::Enabled),
            "DISABLED" => Ok(VersionState::Disabled),
            "DEPRECATED" => Ok(VersionState::Deprecated),
            other => Err(StorageError::Protocol(format!(
                "unknown version state: {other}"
            ))),
        }
    }
}

impl fmt::Display for VersionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Rule kinds configurable per artifact or globally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleType {
    Validity,
    Compatibility,
    Integrity,
}

impl RuleType {
    /// Stable storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            RuleType::Validity => "VALIDITY",
            RuleType::Compatibility => "COMPATIBILITY",
            RuleType::Integrity => "INTEGRITY",
        }
    }

    /// Parse the storage representation.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "VALIDITY" => Ok(RuleType::Validity),
            "COMPATIBILITY" => Ok(RuleType::Compatibility),
            "INTEGRITY" => Ok(RuleType::Integrity),
            other => Err(StorageError::Protocol(format!("unknown rule type: {other}"))),
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Entity metadata
// ---------------------------------------------------------------------------

/// A registry group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMeta {
    pub group_id: String,
    pub description: Option<String>,
    /// Creation time, producer-assigned (carried in the log message so all
    /// replicas store the same value).
    pub created_epoch_ms: i64,
}

/// An artifact within a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub group_id: String,
    pub artifact_id: String,
    /// Payload kind as declared by the caller (e.g. "AVRO", "PROTOBUF").
    /// Opaque to the storage engine.
    pub artifact_type: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub created_epoch_ms: i64,
}

/// One version of an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionMeta {
    pub group_id: String,
    pub artifact_id: String,
    /// Version number, assigned by the apply loop (max + 1 per artifact).
    pub version: u32,
    /// Registry-wide identifier allocated through the global-id sequencer.
    pub global_id: i64,
    pub content_hash: String,
    pub state: VersionState,
    pub name: Option<String>,
    pub description: Option<String>,
    pub created_epoch_ms: i64,
}

/// Content-addressed payload bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredContent {
    /// Identifier allocated through the content-id sequencer.
    pub content_id: i64,
    pub content_hash: String,
    pub content: Vec<u8>,
}

/// A configured rule (artifact-level or global).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub rule: RuleType,
    pub config: String,
}

/// A dynamic configuration property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigProperty {
    pub name: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_deterministic() {
        let a = content_hash(b"{\"type\":\"record\"}");
        let b = content_hash(b"{\"type\":\"record\"}");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, content_hash(b"{\"type\":\"enum\"}"));
    }

    #[test]
    fn test_content_hash_known_vector() {
        // SHA-256 of the empty input
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_version_state_round_trip() {
        for state in [
            VersionState::Enabled,
            VersionState::Disabled,
            VersionState::Deprecated,
        ] {
            assert_eq!(VersionState::parse(state.as_str()).unwrap(), state);
        }
        assert!(VersionState::parse("RETIRED").is_err());
    }

    #[test]
    fn test_rule_type_round_trip() {
        for rule in [
            RuleType::Validity,
            RuleType::Compatibility,
            RuleType::Integrity,
        ] {
            assert_eq!(RuleType::parse(rule.as_str()).unwrap(), rule);
        }
        assert!(RuleType::parse("STYLE").is_err());
    }
}
