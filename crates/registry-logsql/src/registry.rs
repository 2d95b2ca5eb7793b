// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registry storage facade and engine wiring
//!
//! `Registry` is the write/read surface callers use. Every mutation follows
//! the same shape: validate against the local snapshot, append to the log,
//! wait for local apply, read the result back. Validation is best-effort
//! (two nodes can race past it); the apply path is what actually converges,
//! so every mutation is written to be idempotent under replay.
//!
//! `RegistryEngine` owns the wiring: one snapshot store, one producer, one
//! apply loop per partition.

use crate::config::Config;
use crate::consumer::{ApplyLoop, PartitionHealth};
use crate::error::{Result, StorageError};
use crate::log::CommitLog;
use crate::message::{
    ArtifactAction, ConfigAction, ContentAction, GroupAction, MessageKey, MessageValue,
    RuleAction, VersionAction,
};
use crate::producer::{AckRegistry, LogProducer};
use crate::sequencer::IdSequencer;
use crate::snapshot::SnapshotStore;
use crate::types::{
    content_hash, ArtifactMeta, ConfigProperty, GroupMeta, RuleConfig, RuleType, StoredContent,
    VersionMeta, VersionState,
};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

const MAX_ID_LEN: usize = 512;

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn check_id(what: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(StorageError::Rejected(format!("{what} must not be empty")));
    }
    if id.len() > MAX_ID_LEN {
        return Err(StorageError::Rejected(format!(
            "{what} exceeds {MAX_ID_LEN} characters"
        )));
    }
    Ok(())
}

/// The storage surface of the registry.
pub struct Registry {
    producer: Arc<LogProducer>,
    sequencer: IdSequencer,
    store: Arc<SnapshotStore>,
}

impl Registry {
    pub fn new(
        producer: Arc<LogProducer>,
        sequencer: IdSequencer,
        store: Arc<SnapshotStore>,
    ) -> Self {
        Self {
            producer,
            sequencer,
            store,
        }
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    pub async fn create_group(
        &self,
        group_id: &str,
        description: Option<String>,
    ) -> Result<GroupMeta> {
        check_id("group id", group_id)?;
        if self.store.get_group(group_id)?.is_some() {
            return Err(StorageError::Rejected(format!(
                "group {group_id} already exists"
            )));
        }

        let key = MessageKey::Group {
            group_id: group_id.to_string(),
        };
        let value = MessageValue::Group(GroupAction::Create {
            description,
            created_epoch_ms: now_epoch_ms(),
        });
        self.producer.send(&key, &value).await?;
        self.read_back_group(group_id)
    }

    pub async fn update_group(&self, group_id: &str, description: Option<String>) -> Result<GroupMeta> {
        self.require_group(group_id)?;
        let key = MessageKey::Group {
            group_id: group_id.to_string(),
        };
        self.producer
            .send(&key, &MessageValue::Group(GroupAction::Update { description }))
            .await?;
        self.read_back_group(group_id)
    }

    /// Delete a group and everything under it: artifacts, versions, rules.
    pub async fn delete_group(&self, group_id: &str) -> Result<()> {
        self.require_group(group_id)?;
        let key = MessageKey::Group {
            group_id: group_id.to_string(),
        };
        self.producer
            .send(&key, &MessageValue::Group(GroupAction::Delete))
            .await?;
        Ok(())
    }

    pub fn get_group(&self, group_id: &str) -> Result<Option<GroupMeta>> {
        self.store.get_group(group_id)
    }

    pub fn list_groups(&self) -> Result<Vec<GroupMeta>> {
        self.store.list_groups()
    }

    // -----------------------------------------------------------------------
    // Artifacts
    // -----------------------------------------------------------------------

    pub async fn create_artifact(
        &self,
        group_id: &str,
        artifact_id: &str,
        artifact_type: &str,
        name: Option<String>,
        description: Option<String>,
    ) -> Result<ArtifactMeta> {
        check_id("artifact id", artifact_id)?;
        check_id("artifact type", artifact_type)?;
        self.require_group(group_id)?;
        if self.store.get_artifact(group_id, artifact_id)?.is_some() {
            return Err(StorageError::Rejected(format!(
                "artifact {group_id}/{artifact_id} already exists"
            )));
        }

        let key = MessageKey::Artifact {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
        };
        let value = MessageValue::Artifact(ArtifactAction::Create {
            artifact_type: artifact_type.to_string(),
            name,
            description,
            created_epoch_ms: now_epoch_ms(),
        });
        self.producer.send(&key, &value).await?;
        self.read_back_artifact(group_id, artifact_id)
    }

    pub async fn update_artifact(
        &self,
        group_id: &str,
        artifact_id: &str,
        name: Option<String>,
        description: Option<String>,
    ) -> Result<ArtifactMeta> {
        self.require_artifact(group_id, artifact_id)?;
        let key = MessageKey::Artifact {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
        };
        self.producer
            .send(
                &key,
                &MessageValue::Artifact(ArtifactAction::Update { name, description }),
            )
            .await?;
        self.read_back_artifact(group_id, artifact_id)
    }

    /// Delete an artifact with its versions and rules.
    pub async fn delete_artifact(&self, group_id: &str, artifact_id: &str) -> Result<()> {
        self.require_artifact(group_id, artifact_id)?;
        let key = MessageKey::Artifact {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
        };
        self.producer
            .send(&key, &MessageValue::Artifact(ArtifactAction::Delete))
            .await?;
        Ok(())
    }

    pub fn get_artifact(&self, group_id: &str, artifact_id: &str) -> Result<Option<ArtifactMeta>> {
        self.store.get_artifact(group_id, artifact_id)
    }

    pub fn list_artifacts(&self, group_id: &str) -> Result<Vec<ArtifactMeta>> {
        self.store.list_artifacts(group_id)
    }

    // -----------------------------------------------------------------------
    // Versions and content
    // -----------------------------------------------------------------------

    /// Store a new version of an artifact.
    ///
    /// Content is deduplicated by hash: if these exact bytes were stored
    /// before, the existing content row is reused and no new content id is
    /// spent. The version number is assigned during apply, so two nodes
    /// creating versions concurrently get distinct, dense numbers.
    pub async fn create_version(
        &self,
        group_id: &str,
        artifact_id: &str,
        content: &[u8],
        name: Option<String>,
        description: Option<String>,
    ) -> Result<VersionMeta> {
        self.require_artifact(group_id, artifact_id)?;
        if content.is_empty() {
            return Err(StorageError::Rejected(
                "version content must not be empty".to_string(),
            ));
        }

        let hash = content_hash(content);
        if self.store.get_content_by_hash(&hash)?.is_none() {
            let content_id = self.sequencer.next_content_id().await?;
            let key = MessageKey::Content {
                content_hash: hash.clone(),
            };
            let value = MessageValue::Content(ContentAction::Create {
                content_id,
                content: content.to_vec(),
            });
            self.producer.send(&key, &value).await?;
        }

        let global_id = self.sequencer.next_global_id().await?;
        let key = MessageKey::ArtifactVersion {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: 0,
        };
        let value = MessageValue::ArtifactVersion(VersionAction::Create {
            global_id,
            content_hash: hash,
            name,
            description,
            created_epoch_ms: now_epoch_ms(),
        });
        self.producer.send(&key, &value).await?;

        // The assigned version number only exists in the snapshot; the
        // global id is the unique handle to find it.
        self.store
            .get_version_by_global_id(global_id)?
            .ok_or_else(|| {
                StorageError::Protocol(format!(
                    "version with global id {global_id} missing after apply"
                ))
            })
    }

    pub async fn set_version_state(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: u32,
        state: VersionState,
    ) -> Result<VersionMeta> {
        self.require_version(group_id, artifact_id, version)?;
        let key = MessageKey::ArtifactVersion {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version,
        };
        self.producer
            .send(
                &key,
                &MessageValue::ArtifactVersion(VersionAction::SetState { state }),
            )
            .await?;
        self.store
            .get_version(group_id, artifact_id, version)?
            .ok_or_else(|| {
                StorageError::NotFound(format!(
                    "version {group_id}/{artifact_id}/{version} disappeared during update"
                ))
            })
    }

    pub async fn delete_version(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: u32,
    ) -> Result<()> {
        self.require_version(group_id, artifact_id, version)?;
        let key = MessageKey::ArtifactVersion {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version,
        };
        self.producer
            .send(&key, &MessageValue::ArtifactVersion(VersionAction::Delete))
            .await?;
        Ok(())
    }

    pub fn get_version(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: u32,
    ) -> Result<Option<VersionMeta>> {
        self.store.get_version(group_id, artifact_id, version)
    }

    pub fn get_latest_version(
        &self,
        group_id: &str,
        artifact_id: &str,
    ) -> Result<Option<VersionMeta>> {
        self.store.get_latest_version(group_id, artifact_id)
    }

    pub fn get_version_by_global_id(&self, global_id: i64) -> Result<Option<VersionMeta>> {
        self.store.get_version_by_global_id(global_id)
    }

    pub fn list_versions(&self, group_id: &str, artifact_id: &str) -> Result<Vec<VersionMeta>> {
        self.store.list_versions(group_id, artifact_id)
    }

    /// Content bytes for a stored version.
    ///
    /// On a replica, content and version ride different partitions; a
    /// version can be visible moments before its content. Callers treat
    /// None as a retryable miss.
    pub fn get_version_content(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: u32,
    ) -> Result<Option<StoredContent>> {
        let Some(meta) = self.store.get_version(group_id, artifact_id, version)? else {
            return Ok(None);
        };
        self.store.get_content_by_hash(&meta.content_hash)
    }

    pub fn get_content_by_hash(&self, content_hash: &str) -> Result<Option<StoredContent>> {
        self.store.get_content_by_hash(content_hash)
    }

    pub fn get_content_by_id(&self, content_id: i64) -> Result<Option<StoredContent>> {
        self.store.get_content_by_id(content_id)
    }

    // -----------------------------------------------------------------------
    // Rules
    // -----------------------------------------------------------------------

    pub async fn configure_artifact_rule(
        &self,
        group_id: &str,
        artifact_id: &str,
        rule: RuleType,
        config: &str,
    ) -> Result<()> {
        check_id("rule configuration", config)?;
        self.require_artifact(group_id, artifact_id)?;
        let key = MessageKey::ArtifactRule {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            rule,
        };
        self.producer
            .send(
                &key,
                &MessageValue::ArtifactRule(RuleAction::Configure {
                    config: config.to_string(),
                }),
            )
            .await?;
        Ok(())
    }

    pub async fn delete_artifact_rule(
        &self,
        group_id: &str,
        artifact_id: &str,
        rule: RuleType,
    ) -> Result<()> {
        if self
            .store
            .get_artifact_rule(group_id, artifact_id, rule)?
            .is_none()
        {
            return Err(StorageError::NotFound(format!(
                "rule {rule} not configured on {group_id}/{artifact_id}"
            )));
        }
        let key = MessageKey::ArtifactRule {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            rule,
        };
        self.producer
            .send(&key, &MessageValue::ArtifactRule(RuleAction::Delete))
            .await?;
        Ok(())
    }

    pub fn get_artifact_rule(
        &self,
        group_id: &str,
        artifact_id: &str,
        rule: RuleType,
    ) -> Result<Option<RuleConfig>> {
        self.store.get_artifact_rule(group_id, artifact_id, rule)
    }

    pub fn list_artifact_rules(
        &self,
        group_id: &str,
        artifact_id: &str,
    ) -> Result<Vec<RuleConfig>> {
        self.store.list_artifact_rules(group_id, artifact_id)
    }

    pub async fn configure_global_rule(&self, rule: RuleType, config: &str) -> Result<()> {
        check_id("rule configuration", config)?;
        let key = MessageKey::GlobalRule { rule };
        self.producer
            .send(
                &key,
                &MessageValue::GlobalRule(RuleAction::Configure {
                    config: config.to_string(),
                }),
            )
            .await?;
        Ok(())
    }

    pub async fn delete_global_rule(&self, rule: RuleType) -> Result<()> {
        if self.store.get_global_rule(rule)?.is_none() {
            return Err(StorageError::NotFound(format!(
                "global rule {rule} not configured"
            )));
        }
        self.producer
            .send(
                &MessageKey::GlobalRule { rule },
                &MessageValue::GlobalRule(RuleAction::Delete),
            )
            .await?;
        Ok(())
    }

    pub fn get_global_rule(&self, rule: RuleType) -> Result<Option<RuleConfig>> {
        self.store.get_global_rule(rule)
    }

    pub fn list_global_rules(&self) -> Result<Vec<RuleConfig>> {
        self.store.list_global_rules()
    }

    // -----------------------------------------------------------------------
    // Config properties
    // -----------------------------------------------------------------------

    pub async fn set_config_property(&self, name: &str, value: &str) -> Result<()> {
        check_id("property name", name)?;
        let key = MessageKey::ConfigProperty {
            name: name.to_string(),
        };
        self.producer
            .send(
                &key,
                &MessageValue::ConfigProperty(ConfigAction::Set {
                    value: value.to_string(),
                }),
            )
            .await?;
        Ok(())
    }

    pub async fn delete_config_property(&self, name: &str) -> Result<()> {
        if self.store.get_config_property(name)?.is_none() {
            return Err(StorageError::NotFound(format!("property {name} not set")));
        }
        let key = MessageKey::ConfigProperty {
            name: name.to_string(),
        };
        self.producer
            .send(&key, &MessageValue::ConfigProperty(ConfigAction::Delete))
            .await?;
        Ok(())
    }

    pub fn get_config_property(&self, name: &str) -> Result<Option<ConfigProperty>> {
        self.store.get_config_property(name)
    }

    pub fn list_config_properties(&self) -> Result<Vec<ConfigProperty>> {
        self.store.list_config_properties()
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn require_group(&self, group_id: &str) -> Result<()> {
        check_id("group id", group_id)?;
        if self.store.get_group(group_id)?.is_none() {
            return Err(StorageError::NotFound(format!("group {group_id}")));
        }
        Ok(())
    }

    fn require_artifact(&self, group_id: &str, artifact_id: &str) -> Result<()> {
        self.require_group(group_id)?;
        check_id("artifact id", artifact_id)?;
        if self.store.get_artifact(group_id, artifact_id)?.is_none() {
            return Err(StorageError::NotFound(format!(
                "artifact {group_id}/{artifact_id}"
            )));
        }
        Ok(())
    }

    fn require_version(&self, group_id: &str, artifact_id: &str, version: u32) -> Result<()> {
        self.require_artifact(group_id, artifact_id)?;
        if self.store.get_version(group_id, artifact_id, version)?.is_none() {
            return Err(StorageError::NotFound(format!(
                "version {group_id}/{artifact_id}/{version}"
            )));
        }
        Ok(())
    }

    fn read_back_group(&self, group_id: &str) -> Result<GroupMeta> {
        self.store.get_group(group_id)?.ok_or_else(|| {
            StorageError::Protocol(format!("group {group_id} missing after apply"))
        })
    }

    fn read_back_artifact(&self, group_id: &str, artifact_id: &str) -> Result<ArtifactMeta> {
        self.store.get_artifact(group_id, artifact_id)?.ok_or_else(|| {
            StorageError::Protocol(format!(
                "artifact {group_id}/{artifact_id} missing after apply"
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// One node's storage engine: snapshot, producer, and apply loops.
///
/// Must be started inside a tokio runtime; the apply loops are spawned
/// tasks and are aborted on drop.
pub struct RegistryEngine {
    registry: Arc<Registry>,
    store: Arc<SnapshotStore>,
    health: PartitionHealth,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl std::fmt::Debug for RegistryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEngine")
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl RegistryEngine {
    pub fn start(config: &Config, log: Arc<dyn CommitLog>) -> Result<Self> {
        config.validate()?;
        if log.partitions() != config.partitions {
            return Err(StorageError::Config(format!(
                "configured for {} partitions but the log has {}",
                config.partitions,
                log.partitions()
            )));
        }

        let dialect = config.dialect_kind()?;
        let store = Arc::new(match &config.db_path {
            Some(path) => SnapshotStore::open(dialect, path)?,
            None => SnapshotStore::open_in_memory(dialect)?,
        });

        let acks = Arc::new(AckRegistry::new());
        let producer = Arc::new(LogProducer::new(
            Arc::clone(&log),
            Arc::clone(&acks),
            config.ack_timeout(),
        ));
        let health = PartitionHealth::new();

        let tasks = (0..config.partitions)
            .map(|partition| {
                let apply_loop = ApplyLoop::new(
                    partition,
                    Arc::clone(&log),
                    Arc::clone(&store),
                    Arc::clone(&acks),
                    health.clone(),
                );
                tokio::spawn(apply_loop.run())
            })
            .collect();

        tracing::info!(
            node = %config.node_name,
            %dialect,
            partitions = config.partitions,
            "storage engine started"
        );

        let sequencer = IdSequencer::new(Arc::clone(&producer));
        let registry = Arc::new(Registry::new(producer, sequencer, Arc::clone(&store)));

        Ok(Self {
            registry,
            store,
            health,
            tasks,
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Direct snapshot access for tooling and tests.
    pub fn snapshot(&self) -> Arc<SnapshotStore> {
        Arc::clone(&self.store)
    }

    pub fn health(&self) -> &PartitionHealth {
        &self.health
    }

    pub fn shutdown(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl Drop for RegistryEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MemoryLog;

    fn test_config() -> Config {
        Config::builder()
            .partitions(4)
            .ack_timeout_ms(2_000)
            .node_name("test-node")
            .build()
    }

    fn engine() -> RegistryEngine {
        let log = Arc::new(MemoryLog::new(4));
        RegistryEngine::start(&test_config(), log).unwrap()
    }

    #[tokio::test]
    async fn test_group_lifecycle() {
        let engine = engine();
        let registry = engine.registry();

        let group = registry
            .create_group("g1", Some("demo".to_string()))
            .await
            .unwrap();
        assert_eq!(group.group_id, "g1");
        assert_eq!(group.description.as_deref(), Some("demo"));

        // Read-your-own-write: visible immediately, no polling.
        assert!(registry.get_group("g1").unwrap().is_some());

        let err = registry.create_group("g1", None).await.unwrap_err();
        assert!(matches!(err, StorageError::Rejected(_)));

        registry.delete_group("g1").await.unwrap();
        assert!(registry.get_group("g1").unwrap().is_none());

        let err = registry.delete_group("g1").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_ids_rejected_without_touching_the_log() {
        let log = Arc::new(MemoryLog::new(4));
        let engine = RegistryEngine::start(&test_config(), Arc::clone(&log) as Arc<dyn CommitLog>)
            .unwrap();
        let registry = engine.registry();

        let err = registry.create_group("", None).await.unwrap_err();
        assert!(matches!(err, StorageError::Rejected(_)));
        assert!((0..4).all(|p| log.is_empty(p)));
    }

    #[tokio::test]
    async fn test_version_flow_with_content_dedup() {
        let engine = engine();
        let registry = engine.registry();

        registry.create_group("g1", None).await.unwrap();
        registry
            .create_artifact("g1", "a1", "AVRO", None, None)
            .await
            .unwrap();

        let schema = br#"{"type":"record","name":"r"}"#;
        let v1 = registry
            .create_version("g1", "a1", schema, None, None)
            .await
            .unwrap();
        assert_eq!(v1.version, 1);
        assert_eq!(v1.state, VersionState::Enabled);

        // Same bytes again: new version, same content row.
        let v2 = registry
            .create_version("g1", "a1", schema, None, None)
            .await
            .unwrap();
        assert_eq!(v2.version, 2);
        assert_eq!(v2.content_hash, v1.content_hash);
        assert_ne!(v2.global_id, v1.global_id);

        let stored = registry
            .get_version_content("g1", "a1", 2)
            .unwrap()
            .unwrap();
        assert_eq!(stored.content, schema.to_vec());

        let latest = registry.get_latest_version("g1", "a1").unwrap().unwrap();
        assert_eq!(latest.version, 2);
    }

    #[tokio::test]
    async fn test_version_state_and_delete() {
        let engine = engine();
        let registry = engine.registry();
        registry.create_group("g1", None).await.unwrap();
        registry
            .create_artifact("g1", "a1", "JSON", None, None)
            .await
            .unwrap();
        registry
            .create_version("g1", "a1", b"{}", None, None)
            .await
            .unwrap();

        let updated = registry
            .set_version_state("g1", "a1", 1, VersionState::Disabled)
            .await
            .unwrap();
        assert_eq!(updated.state, VersionState::Disabled);

        registry.delete_version("g1", "a1", 1).await.unwrap();
        assert!(registry.get_version("g1", "a1", 1).unwrap().is_none());

        let err = registry
            .set_version_state("g1", "a1", 1, VersionState::Enabled)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rules_and_config_properties() {
        let engine = engine();
        let registry = engine.registry();
        registry.create_group("g1", None).await.unwrap();
        registry
            .create_artifact("g1", "a1", "AVRO", None, None)
            .await
            .unwrap();

        registry
            .configure_artifact_rule("g1", "a1", RuleType::Validity, "FULL")
            .await
            .unwrap();
        let rule = registry
            .get_artifact_rule("g1", "a1", RuleType::Validity)
            .unwrap()
            .unwrap();
        assert_eq!(rule.config, "FULL");

        registry
            .configure_global_rule(RuleType::Compatibility, "BACKWARD")
            .await
            .unwrap();
        assert_eq!(registry.list_global_rules().unwrap().len(), 1);

        registry
            .set_config_property("registry.ui.readonly", "true")
            .await
            .unwrap();
        let prop = registry
            .get_config_property("registry.ui.readonly")
            .unwrap()
            .unwrap();
        assert_eq!(prop.value, "true");

        registry
            .delete_config_property("registry.ui.readonly")
            .await
            .unwrap();
        let err = registry
            .delete_config_property("registry.ui.readonly")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_partition_count_mismatch_fails_startup() {
        let log = Arc::new(MemoryLog::new(2));
        let err = RegistryEngine::start(&test_config(), log).unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }
}
