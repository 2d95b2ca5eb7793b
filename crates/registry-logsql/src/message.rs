// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Key/message model
//!
//! Every mutation travels the log as a `(MessageKey, MessageValue)` pair.
//! The key decides routing: `partition_key()` selects the log partition, so
//! mutations that need relative ordering share one partition. The key's type
//! tag is the decode discriminator; a tag the consumer does not know is a
//! protocol fault, never a skippable message.
//!
//! Both enums are closed sets. Serde's internally/adjacently tagged
//! representations give exhaustive dispatch on the `"type"` field with
//! unknown tags failing decode.

use crate::error::{Result, StorageError};
use crate::types::{RuleType, VersionState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// All content-id allocations share this partition, making the log a strict
/// global order of allocation requests.
pub const CONTENT_ID_PARTITION_KEY: &str = "__registry_content_id__";

/// Sentinel partition key for global-id allocations.
pub const GLOBAL_ID_PARTITION_KEY: &str = "__registry_global_id__";

/// Sentinel partition key for global rule changes.
pub const GLOBAL_RULE_PARTITION_KEY: &str = "__registry_global_rule__";

// ---------------------------------------------------------------------------
// MessageKey
// ---------------------------------------------------------------------------

/// Routing key for a logged mutation.
///
/// Value equality; no object identity. `partition_key()` is stable for the
/// lifetime of the topic: same key string, same partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MessageKey {
    /// All mutations of one group (including its artifacts and versions)
    /// are totally ordered relative to each other.
    Group { group_id: String },
    Artifact {
        group_id: String,
        artifact_id: String,
    },
    /// `version` is 0 for creation (number assigned at apply time).
    ArtifactVersion {
        group_id: String,
        artifact_id: String,
        version: u32,
    },
    ArtifactRule {
        group_id: String,
        artifact_id: String,
        rule: RuleType,
    },
    /// Content rows are keyed by hash; unrelated content parallelizes.
    Content { content_hash: String },
    /// Allocation request. `correlation` is unique per attempt and only
    /// joins the producer's wait to the applied message; it is not the
    /// allocated id.
    ContentId { correlation: Uuid },
    GlobalId { correlation: Uuid },
    GlobalRule { rule: RuleType },
    ConfigProperty { name: String },
}

impl MessageKey {
    /// Stable type tag, used as the payload decode discriminator.
    pub fn type_name(&self) -> &'static str {
        match self {
            MessageKey::Group { .. } => "Group",
            MessageKey::Artifact { .. } => "Artifact",
            MessageKey::ArtifactVersion { .. } => "ArtifactVersion",
            MessageKey::ArtifactRule { .. } => "ArtifactRule",
            MessageKey::Content { .. } => "Content",
            MessageKey::ContentId { .. } => "ContentId",
            MessageKey::GlobalId { .. } => "GlobalId",
            MessageKey::GlobalRule { .. } => "GlobalRule",
            MessageKey::ConfigProperty { .. } => "ConfigProperty",
        }
    }

    /// String the log's partitioner hashes to pick a partition.
    pub fn partition_key(&self) -> &str {
        match self {
            MessageKey::Group { group_id } => group_id,
            MessageKey::Artifact { group_id, .. } => group_id,
            MessageKey::ArtifactVersion { group_id, .. } => group_id,
            MessageKey::ArtifactRule { group_id, .. } => group_id,
            MessageKey::Content { content_hash } => content_hash,
            MessageKey::ContentId { .. } => CONTENT_ID_PARTITION_KEY,
            MessageKey::GlobalId { .. } => GLOBAL_ID_PARTITION_KEY,
            MessageKey::GlobalRule { .. } => GLOBAL_RULE_PARTITION_KEY,
            MessageKey::ConfigProperty { name } => name,
        }
    }

    /// Correlation id for allocation keys, None otherwise.
    pub fn correlation(&self) -> Option<Uuid> {
        match self {
            MessageKey::ContentId { correlation } | MessageKey::GlobalId { correlation } => {
                Some(*correlation)
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// MessageValue
// ---------------------------------------------------------------------------

/// Operation payload paired with a key of the same type tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "action")]
pub enum MessageValue {
    Group(GroupAction),
    Artifact(ArtifactAction),
    ArtifactVersion(VersionAction),
    ArtifactRule(RuleAction),
    Content(ContentAction),
    ContentId(AllocateAction),
    GlobalId(AllocateAction),
    GlobalRule(RuleAction),
    ConfigProperty(ConfigAction),
}

impl MessageValue {
    /// Stable type tag; must match the paired key's tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            MessageValue::Group(_) => "Group",
            MessageValue::Artifact(_) => "Artifact",
            MessageValue::ArtifactVersion(_) => "ArtifactVersion",
            MessageValue::ArtifactRule(_) => "ArtifactRule",
            MessageValue::Content(_) => "Content",
            MessageValue::ContentId(_) => "ContentId",
            MessageValue::GlobalId(_) => "GlobalId",
            MessageValue::GlobalRule(_) => "GlobalRule",
            MessageValue::ConfigProperty(_) => "ConfigProperty",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GroupAction {
    Create {
        description: Option<String>,
        created_epoch_ms: i64,
    },
    Update {
        description: Option<String>,
    },
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArtifactAction {
    Create {
        artifact_type: String,
        name: Option<String>,
        description: Option<String>,
        created_epoch_ms: i64,
    },
    Update {
        name: Option<String>,
        description: Option<String>,
    },
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VersionAction {
    /// Version number is assigned during apply (max + 1 per artifact) so
    /// concurrent creators serialize through the log, not through locks.
    Create {
        global_id: i64,
        content_hash: String,
        name: Option<String>,
        description: Option<String>,
        created_epoch_ms: i64,
    },
    SetState {
        state: VersionState,
    },
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ContentAction {
    /// Insert-if-absent by hash; re-creating existing content is a no-op,
    /// leaving a harmless gap in the content-id space.
    Create { content_id: i64, content: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AllocateAction {
    Allocate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RuleAction {
    Configure { config: String },
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigAction {
    Set { value: String },
    Delete,
}

// ---------------------------------------------------------------------------
// Wire encoding
// ---------------------------------------------------------------------------

/// Serialize a key for the log.
pub fn encode_key(key: &MessageKey) -> Result<Vec<u8>> {
    serde_json::to_vec(key).map_err(|e| StorageError::Protocol(format!("key encode: {e}")))
}

/// Serialize a value for the log.
pub fn encode_value(value: &MessageValue) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StorageError::Protocol(format!("value encode: {e}")))
}

/// Decode a key from log bytes. Unknown type tags fail here.
pub fn decode_key(bytes: &[u8]) -> Result<MessageKey> {
    serde_json::from_slice(bytes).map_err(|e| StorageError::Protocol(format!("key decode: {e}")))
}

/// Decode a value from log bytes. Unknown type tags fail here.
pub fn decode_value(bytes: &[u8]) -> Result<MessageValue> {
    serde_json::from_slice(bytes).map_err(|e| StorageError::Protocol(format!("value decode: {e}")))
}

/// A key and value must carry the same type tag; a mismatch means the log
/// entry was produced incorrectly and cannot be applied safely.
pub fn check_pair(key: &MessageKey, value: &MessageValue) -> Result<()> {
    if key.type_name() != value.type_name() {
        return Err(StorageError::Protocol(format!(
            "key type {} paired with value type {}",
            key.type_name(),
            value.type_name()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_keys() {
        let group = MessageKey::Group {
            group_id: "my-group".to_string(),
        };
        assert_eq!(group.partition_key(), "my-group");

        // Artifact and version mutations ride the group's partition so they
        // stay ordered relative to group-level changes.
        let version = MessageKey::ArtifactVersion {
            group_id: "my-group".to_string(),
            artifact_id: "a1".to_string(),
            version: 3,
        };
        assert_eq!(version.partition_key(), "my-group");

        let alloc = MessageKey::ContentId {
            correlation: Uuid::new_v4(),
        };
        assert_eq!(alloc.partition_key(), CONTENT_ID_PARTITION_KEY);

        let prop = MessageKey::ConfigProperty {
            name: "registry.limit".to_string(),
        };
        assert_eq!(prop.partition_key(), "registry.limit");
    }

    #[test]
    fn test_key_round_trip() {
        let key = MessageKey::Artifact {
            group_id: "g".to_string(),
            artifact_id: "a".to_string(),
        };
        let decoded = decode_key(&encode_key(&key).unwrap()).unwrap();
        assert_eq!(decoded, key);
        assert_eq!(decoded.type_name(), "Artifact");
    }

    #[test]
    fn test_correlation_survives_encoding() {
        let correlation = Uuid::new_v4();
        let key = MessageKey::GlobalId { correlation };
        let decoded = decode_key(&encode_key(&key).unwrap()).unwrap();
        assert_eq!(decoded.correlation(), Some(correlation));
    }

    #[test]
    fn test_unknown_type_tag_is_protocol_error() {
        let err = decode_key(br#"{"type":"Tenant","tenant_id":"t1"}"#).unwrap_err();
        assert!(matches!(err, StorageError::Protocol(_)));

        let err = decode_value(br#"{"type":"Tenant","action":"Delete"}"#).unwrap_err();
        assert!(matches!(err, StorageError::Protocol(_)));
    }

    #[test]
    fn test_malformed_payload_is_protocol_error() {
        let err = decode_value(b"not json at all").unwrap_err();
        assert!(matches!(err, StorageError::Protocol(_)));
    }

    #[test]
    fn test_pair_check() {
        let key = MessageKey::Group {
            group_id: "g".to_string(),
        };
        let ok = MessageValue::Group(GroupAction::Delete);
        let bad = MessageValue::ConfigProperty(ConfigAction::Delete);

        assert!(check_pair(&key, &ok).is_ok());
        assert!(matches!(
            check_pair(&key, &bad),
            Err(StorageError::Protocol(_))
        ));
    }

    #[test]
    fn test_value_round_trip() {
        let value = MessageValue::ArtifactVersion(VersionAction::Create {
            global_id: 42,
            content_hash: "abc".to_string(),
            name: Some("first".to_string()),
            description: None,
            created_epoch_ms: 1_700_000_000_000,
        });
        let decoded = decode_value(&encode_value(&value).unwrap()).unwrap();
        assert_eq!(decoded, value);
    }
}
