// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Snapshot store
//!
//! The local relational materialization of registry state, built purely by
//! replaying log messages. It is a disposable cache of the log: deleting the
//! database and replaying from offset 0 reproduces it exactly.
//!
//! # Apply contract
//!
//! `apply()` runs one log message in one transaction: the entity write and
//! the partition watermark advance commit atomically, so crash recovery can
//! neither re-apply nor skip a message. A message at or below the persisted
//! watermark is a no-op (at-least-once delivery upstream).
//!
//! Thread-safe via internal Mutex (SQLite Connection is not Sync); the apply
//! loop for a partition holds the connection exclusively for the duration of
//! its transaction, readers observe committed state in between.

use crate::error::{Result, StorageError};
use crate::message::{
    AllocateAction, ArtifactAction, ConfigAction, ContentAction, GroupAction, MessageKey,
    MessageValue, RuleAction, VersionAction,
};
use crate::sql::{statements_for, DialectKind, SqlStatements};
use crate::types::{
    ArtifactMeta, ConfigProperty, GroupMeta, RuleConfig, RuleType, StoredContent, VersionMeta,
    VersionState,
};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::sync::Mutex;

/// Counter name for the content-id sequencer.
pub const CONTENT_ID_SEQUENCER: &str = "content_id";

/// Counter name for the global-id sequencer.
pub const GLOBAL_ID_SEQUENCER: &str = "global_id";

/// Result of applying one log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Entity write committed.
    Applied,
    /// Offset at or below the watermark; nothing changed.
    Skipped,
    /// Allocation message committed; carries the assigned identifier.
    Allocated(i64),
}

/// Relational snapshot of registry state.
pub struct SnapshotStore {
    conn: Mutex<Connection>,
    stmts: &'static dyn SqlStatements,
}

impl SnapshotStore {
    /// Open a file-backed snapshot for the given dialect.
    pub fn open(dialect: DialectKind, path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(dialect, conn)
    }

    /// Open an in-memory snapshot (tests, tooling).
    pub fn open_in_memory(dialect: DialectKind) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(dialect, conn)
    }

    fn with_connection(dialect: DialectKind, conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
            stmts: statements_for(dialect),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        for ddl in self.stmts.ddl() {
            conn.execute(ddl, [])?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Apply path
    // -----------------------------------------------------------------------

    /// Apply one decoded log message at `(partition, offset)`.
    pub fn apply(
        &self,
        partition: u32,
        offset: u64,
        key: &MessageKey,
        value: &MessageValue,
    ) -> Result<ApplyOutcome> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let watermark: Option<i64> = tx
            .query_row(self.stmts.select_watermark(), params![partition], |row| {
                row.get(0)
            })
            .optional()?;
        if let Some(applied) = watermark {
            if offset as i64 <= applied {
                tracing::trace!(partition, offset, "skipping already-applied message");
                return Ok(ApplyOutcome::Skipped);
            }
        }

        let outcome = Self::apply_message(&tx, self.stmts, key, value)?;
        tx.execute(
            self.stmts.upsert_watermark(),
            params![partition, offset as i64],
        )?;
        tx.commit()?;
        Ok(outcome)
    }

    fn apply_message(
        tx: &Transaction<'_>,
        stmts: &dyn SqlStatements,
        key: &MessageKey,
        value: &MessageValue,
    ) -> Result<ApplyOutcome> {
        match (key, value) {
            (MessageKey::Group { group_id }, MessageValue::Group(action)) => {
                match action {
                    GroupAction::Create {
                        description,
                        created_epoch_ms,
                    } => {
                        tx.execute(
                            stmts.upsert_group(),
                            params![group_id, description, created_epoch_ms],
                        )?;
                    }
                    GroupAction::Update { description } => {
                        tx.execute(stmts.update_group(), params![description, group_id])?;
                    }
                    GroupAction::Delete => {
                        tx.execute(stmts.delete_group_rules(), params![group_id])?;
                        tx.execute(stmts.delete_group_versions(), params![group_id])?;
                        tx.execute(stmts.delete_group_artifacts(), params![group_id])?;
                        tx.execute(stmts.delete_group(), params![group_id])?;
                    }
                }
                Ok(ApplyOutcome::Applied)
            }

            (
                MessageKey::Artifact {
                    group_id,
                    artifact_id,
                },
                MessageValue::Artifact(action),
            ) => {
                match action {
                    ArtifactAction::Create {
                        artifact_type,
                        name,
                        description,
                        created_epoch_ms,
                    } => {
                        tx.execute(
                            stmts.upsert_artifact(),
                            params![
                                group_id,
                                artifact_id,
                                artifact_type,
                                name,
                                description,
                                created_epoch_ms
                            ],
                        )?;
                    }
                    ArtifactAction::Update { name, description } => {
                        tx.execute(
                            stmts.update_artifact(),
                            params![name, description, group_id, artifact_id],
                        )?;
                    }
                    ArtifactAction::Delete => {
                        tx.execute(
                            stmts.delete_artifact_rules(),
                            params![group_id, artifact_id],
                        )?;
                        tx.execute(
                            stmts.delete_artifact_versions(),
                            params![group_id, artifact_id],
                        )?;
                        tx.execute(stmts.delete_artifact(), params![group_id, artifact_id])?;
                    }
                }
                Ok(ApplyOutcome::Applied)
            }

            (
                MessageKey::ArtifactVersion {
                    group_id,
                    artifact_id,
                    version,
                },
                MessageValue::ArtifactVersion(action),
            ) => {
                match action {
                    VersionAction::Create {
                        global_id,
                        content_hash,
                        name,
                        description,
                        created_epoch_ms,
                    } => {
                        // Version number assigned here, under the partition's
                        // exclusive apply context: every replica computes the
                        // same value from the same log prefix.
                        let next: i64 = tx.query_row(
                            stmts.next_version(),
                            params![group_id, artifact_id],
                            |row| row.get(0),
                        )?;
                        tx.execute(
                            stmts.insert_version(),
                            params![
                                group_id,
                                artifact_id,
                                next,
                                global_id,
                                content_hash,
                                VersionState::Enabled.as_str(),
                                name,
                                description,
                                created_epoch_ms
                            ],
                        )?;
                    }
                    VersionAction::SetState { state } => {
                        tx.execute(
                            stmts.update_version_state(),
                            params![state.as_str(), group_id, artifact_id, *version as i64],
                        )?;
                    }
                    VersionAction::Delete => {
                        tx.execute(
                            stmts.delete_version(),
                            params![group_id, artifact_id, *version as i64],
                        )?;
                    }
                }
                Ok(ApplyOutcome::Applied)
            }

            (MessageKey::Content { content_hash }, MessageValue::Content(action)) => {
                let ContentAction::Create {
                    content_id,
                    content,
                } = action;
                // Dedup by hash: re-creating existing content is a no-op and
                // the allocated id goes unused, which is an acceptable gap.
                tx.execute(
                    stmts.insert_content_if_absent(),
                    params![content_hash, content_id, content],
                )?;
                Ok(ApplyOutcome::Applied)
            }

            (MessageKey::ContentId { .. }, MessageValue::ContentId(AllocateAction::Allocate)) => {
                let id = Self::next_sequencer(tx, stmts, CONTENT_ID_SEQUENCER)?;
                Ok(ApplyOutcome::Allocated(id))
            }

            (MessageKey::GlobalId { .. }, MessageValue::GlobalId(AllocateAction::Allocate)) => {
                let id = Self::next_sequencer(tx, stmts, GLOBAL_ID_SEQUENCER)?;
                Ok(ApplyOutcome::Allocated(id))
            }

            (
                MessageKey::ArtifactRule {
                    group_id,
                    artifact_id,
                    rule,
                },
                MessageValue::ArtifactRule(action),
            ) => {
                match action {
                    RuleAction::Configure { config } => {
                        tx.execute(
                            stmts.upsert_artifact_rule(),
                            params![group_id, artifact_id, rule.as_str(), config],
                        )?;
                    }
                    RuleAction::Delete => {
                        tx.execute(
                            stmts.delete_artifact_rule(),
                            params![group_id, artifact_id, rule.as_str()],
                        )?;
                    }
                }
                Ok(ApplyOutcome::Applied)
            }

            (MessageKey::GlobalRule { rule }, MessageValue::GlobalRule(action)) => {
                match action {
                    RuleAction::Configure { config } => {
                        tx.execute(stmts.upsert_global_rule(), params![rule.as_str(), config])?;
                    }
                    RuleAction::Delete => {
                        tx.execute(stmts.delete_global_rule(), params![rule.as_str()])?;
                    }
                }
                Ok(ApplyOutcome::Applied)
            }

            (MessageKey::ConfigProperty { name }, MessageValue::ConfigProperty(action)) => {
                match action {
                    ConfigAction::Set { value } => {
                        tx.execute(stmts.upsert_config_property(), params![name, value])?;
                    }
                    ConfigAction::Delete => {
                        tx.execute(stmts.delete_config_property(), params![name])?;
                    }
                }
                Ok(ApplyOutcome::Applied)
            }

            (key, value) => Err(StorageError::Protocol(format!(
                "key type {} paired with value type {} during apply",
                key.type_name(),
                value.type_name()
            ))),
        }
    }

    fn next_sequencer(
        tx: &Transaction<'_>,
        stmts: &dyn SqlStatements,
        name: &str,
    ) -> Result<i64> {
        let current: Option<i64> = tx
            .query_row(stmts.select_sequencer(), params![name], |row| row.get(0))
            .optional()?;
        match current {
            Some(value) => {
                tx.execute(stmts.update_sequencer(), params![value + 1, name])?;
                Ok(value + 1)
            }
            None => {
                tx.execute(stmts.insert_sequencer(), params![name, 1i64])?;
                Ok(1)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Watermarks
    // -----------------------------------------------------------------------

    /// Last applied offset for a partition, if any message was applied.
    pub fn watermark(&self, partition: u32) -> Result<Option<u64>> {
        let conn = self.conn.lock().unwrap();
        let value: Option<i64> = conn
            .query_row(self.stmts.select_watermark(), params![partition], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value.map(|v| v as u64))
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn get_group(&self, group_id: &str) -> Result<Option<GroupMeta>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(self.stmts.select_group(), params![group_id], row_to_group)
            .optional()?)
    }

    pub fn list_groups(&self) -> Result<Vec<GroupMeta>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(self.stmts.select_groups())?;
        let groups = stmt
            .query_map([], row_to_group)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(groups)
    }

    pub fn get_artifact(&self, group_id: &str, artifact_id: &str) -> Result<Option<ArtifactMeta>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                self.stmts.select_artifact(),
                params![group_id, artifact_id],
                row_to_artifact,
            )
            .optional()?)
    }

    pub fn list_artifacts(&self, group_id: &str) -> Result<Vec<ArtifactMeta>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(self.stmts.select_artifacts())?;
        let artifacts = stmt
            .query_map(params![group_id], row_to_artifact)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(artifacts)
    }

    pub fn get_version(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: u32,
    ) -> Result<Option<VersionMeta>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                self.stmts.select_version(),
                params![group_id, artifact_id, version as i64],
                row_to_version,
            )
            .optional()?)
    }

    pub fn get_latest_version(
        &self,
        group_id: &str,
        artifact_id: &str,
    ) -> Result<Option<VersionMeta>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                self.stmts.select_latest_version(),
                params![group_id, artifact_id],
                row_to_version,
            )
            .optional()?)
    }

    pub fn get_version_by_global_id(&self, global_id: i64) -> Result<Option<VersionMeta>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                self.stmts.select_version_by_global_id(),
                params![global_id],
                row_to_version,
            )
            .optional()?)
    }

    pub fn list_versions(&self, group_id: &str, artifact_id: &str) -> Result<Vec<VersionMeta>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(self.stmts.select_versions())?;
        let versions = stmt
            .query_map(params![group_id, artifact_id], row_to_version)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(versions)
    }

    pub fn get_content_by_hash(&self, content_hash: &str) -> Result<Option<StoredContent>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                self.stmts.select_content_by_hash(),
                params![content_hash],
                row_to_content,
            )
            .optional()?)
    }

    pub fn get_content_by_id(&self, content_id: i64) -> Result<Option<StoredContent>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                self.stmts.select_content_by_id(),
                params![content_id],
                row_to_content,
            )
            .optional()?)
    }

    pub fn get_artifact_rule(
        &self,
        group_id: &str,
        artifact_id: &str,
        rule: RuleType,
    ) -> Result<Option<RuleConfig>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                self.stmts.select_artifact_rule(),
                params![group_id, artifact_id, rule.as_str()],
                row_to_rule,
            )
            .optional()?)
    }

    pub fn list_artifact_rules(
        &self,
        group_id: &str,
        artifact_id: &str,
    ) -> Result<Vec<RuleConfig>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(self.stmts.select_artifact_rules())?;
        let rules = stmt
            .query_map(params![group_id, artifact_id], row_to_rule)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rules)
    }

    pub fn get_global_rule(&self, rule: RuleType) -> Result<Option<RuleConfig>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                self.stmts.select_global_rule(),
                params![rule.as_str()],
                row_to_rule,
            )
            .optional()?)
    }

    pub fn list_global_rules(&self) -> Result<Vec<RuleConfig>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(self.stmts.select_global_rules())?;
        let rules = stmt
            .query_map([], row_to_rule)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rules)
    }

    pub fn get_config_property(&self, name: &str) -> Result<Option<ConfigProperty>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                self.stmts.select_config_property(),
                params![name],
                row_to_config_property,
            )
            .optional()?)
    }

    pub fn list_config_properties(&self) -> Result<Vec<ConfigProperty>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(self.stmts.select_config_properties())?;
        let props = stmt
            .query_map([], row_to_config_property)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(props)
    }
}

// ---------------------------------------------------------------------------
// Row mappers
// ---------------------------------------------------------------------------

fn row_to_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<GroupMeta> {
    Ok(GroupMeta {
        group_id: row.get(0)?,
        description: row.get(1)?,
        created_epoch_ms: row.get(2)?,
    })
}

fn row_to_artifact(row: &rusqlite::Row<'_>) -> rusqlite::Result<ArtifactMeta> {
    Ok(ArtifactMeta {
        group_id: row.get(0)?,
        artifact_id: row.get(1)?,
        artifact_type: row.get(2)?,
        name: row.get(3)?,
        description: row.get(4)?,
        created_epoch_ms: row.get(5)?,
    })
}

fn row_to_version(row: &rusqlite::Row<'_>) -> rusqlite::Result<VersionMeta> {
    let state_raw: String = row.get(5)?;
    let state = VersionState::parse(&state_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(VersionMeta {
        group_id: row.get(0)?,
        artifact_id: row.get(1)?,
        version: row.get::<_, i64>(2)? as u32,
        global_id: row.get(3)?,
        content_hash: row.get(4)?,
        state,
        name: row.get(6)?,
        description: row.get(7)?,
        created_epoch_ms: row.get(8)?,
    })
}

fn row_to_content(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredContent> {
    Ok(StoredContent {
        content_hash: row.get(0)?,
        content_id: row.get(1)?,
        content: row.get(2)?,
    })
}

fn row_to_rule(row: &rusqlite::Row<'_>) -> rusqlite::Result<RuleConfig> {
    let rule_raw: String = row.get(0)?;
    let rule = RuleType::parse(&rule_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(RuleConfig {
        rule,
        config: row.get(1)?,
    })
}

fn row_to_config_property(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConfigProperty> {
    Ok(ConfigProperty {
        name: row.get(0)?,
        value: row.get(1)?,
    })
}
