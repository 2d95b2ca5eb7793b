// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Embedded (SQLite) statement set

use super::SqlStatements;

/// Statement set for the bundled SQLite engine.
pub struct SqliteStatements;

impl SqlStatements for SqliteStatements {
    fn ddl(&self) -> &'static [&'static str] {
        &[
            "CREATE TABLE IF NOT EXISTS groups (
                group_id TEXT NOT NULL PRIMARY KEY,
                description TEXT,
                created_epoch_ms INTEGER NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS artifacts (
                group_id TEXT NOT NULL,
                artifact_id TEXT NOT NULL,
                artifact_type TEXT NOT NULL,
                name TEXT,
                description TEXT,
                created_epoch_ms INTEGER NOT NULL,
                PRIMARY KEY (group_id, artifact_id)
            )",
            "CREATE TABLE IF NOT EXISTS versions (
                group_id TEXT NOT NULL,
                artifact_id TEXT NOT NULL,
                version INTEGER NOT NULL,
                global_id INTEGER NOT NULL,
                content_hash TEXT NOT NULL,
                state TEXT NOT NULL,
                name TEXT,
                description TEXT,
                created_epoch_ms INTEGER NOT NULL,
                PRIMARY KEY (group_id, artifact_id, version)
            )",
            "CREATE INDEX IF NOT EXISTS idx_versions_global_id ON versions (global_id)",
            "CREATE TABLE IF NOT EXISTS content (
                content_hash TEXT NOT NULL PRIMARY KEY,
                content_id INTEGER NOT NULL,
                content BLOB NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_content_id ON content (content_id)",
            "CREATE TABLE IF NOT EXISTS artifact_rules (
                group_id TEXT NOT NULL,
                artifact_id TEXT NOT NULL,
                rule TEXT NOT NULL,
                config TEXT NOT NULL,
                PRIMARY KEY (group_id, artifact_id, rule)
            )",
            "CREATE TABLE IF NOT EXISTS global_rules (
                rule TEXT NOT NULL PRIMARY KEY,
                config TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS config_properties (
                name TEXT NOT NULL PRIMARY KEY,
                value TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS sequencers (
                name TEXT NOT NULL PRIMARY KEY,
                value INTEGER NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS partition_watermarks (
                partition_id INTEGER NOT NULL PRIMARY KEY,
                last_offset INTEGER NOT NULL
            )",
        ]
    }

    fn upsert_group(&self) -> &'static str {
        "INSERT INTO groups (group_id, description, created_epoch_ms) VALUES (?1, ?2, ?3)
         ON CONFLICT (group_id) DO UPDATE SET description = excluded.description"
    }

    fn update_group(&self) -> &'static str {
        "UPDATE groups SET description = ?1 WHERE group_id = ?2"
    }

    fn delete_group(&self) -> &'static str {
        "DELETE FROM groups WHERE group_id = ?1"
    }

    fn select_group(&self) -> &'static str {
        "SELECT group_id, description, created_epoch_ms FROM groups WHERE group_id = ?1"
    }

    fn select_groups(&self) -> &'static str {
        "SELECT group_id, description, created_epoch_ms FROM groups ORDER BY group_id"
    }

    fn upsert_artifact(&self) -> &'static str {
        "INSERT INTO artifacts (group_id, artifact_id, artifact_type, name, description, created_epoch_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (group_id, artifact_id) DO UPDATE
         SET artifact_type = excluded.artifact_type, name = excluded.name,
             description = excluded.description"
    }

    fn update_artifact(&self) -> &'static str {
        "UPDATE artifacts SET name = ?1, description = ?2 WHERE group_id = ?3 AND artifact_id = ?4"
    }

    fn delete_artifact(&self) -> &'static str {
        "DELETE FROM artifacts WHERE group_id = ?1 AND artifact_id = ?2"
    }

    fn select_artifact(&self) -> &'static str {
        "SELECT group_id, artifact_id, artifact_type, name, description, created_epoch_ms
         FROM artifacts WHERE group_id = ?1 AND artifact_id = ?2"
    }

    fn select_artifacts(&self) -> &'static str {
        "SELECT group_id, artifact_id, artifact_type, name, description, created_epoch_ms
         FROM artifacts WHERE group_id = ?1 ORDER BY artifact_id"
    }

    fn delete_group_artifacts(&self) -> &'static str {
        "DELETE FROM artifacts WHERE group_id = ?1"
    }

    fn insert_version(&self) -> &'static str {
        "INSERT INTO versions (group_id, artifact_id, version, global_id, content_hash, state,
                               name, description, created_epoch_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
    }

    fn next_version(&self) -> &'static str {
        "SELECT COALESCE(MAX(version), 0) + 1 FROM versions WHERE group_id = ?1 AND artifact_id = ?2"
    }

    fn select_version(&self) -> &'static str {
        "SELECT group_id, artifact_id, version, global_id, content_hash, state, name, description,
                created_epoch_ms
         FROM versions WHERE group_id = ?1 AND artifact_id = ?2 AND version = ?3"
    }

    fn select_latest_version(&self) -> &'static str {
        "SELECT group_id, artifact_id, version, global_id, content_hash, state, name, description,
                created_epoch_ms
         FROM versions WHERE group_id = ?1 AND artifact_id = ?2 ORDER BY version DESC LIMIT 1"
    }

    fn select_version_by_global_id(&self) -> &'static str {
        "SELECT group_id, artifact_id, version, global_id, content_hash, state, name, description,
                created_epoch_ms
         FROM versions WHERE global_id = ?1"
    }

    fn select_versions(&self) -> &'static str {
        "SELECT group_id, artifact_id, version, global_id, content_hash, state, name, description,
                created_epoch_ms
         FROM versions WHERE group_id = ?1 AND artifact_id = ?2 ORDER BY version"
    }

    fn update_version_state(&self) -> &'static str {
        "UPDATE versions SET state = ?1 WHERE group_id = ?2 AND artifact_id = ?3 AND version = ?4"
    }

    fn delete_version(&self) -> &'static str {
        "DELETE FROM versions WHERE group_id = ?1 AND artifact_id = ?2 AND version = ?3"
    }

    fn delete_artifact_versions(&self) -> &'static str {
        "DELETE FROM versions WHERE group_id = ?1 AND artifact_id = ?2"
    }

    fn delete_group_versions(&self) -> &'static str {
        "DELETE FROM versions WHERE group_id = ?1"
    }

    fn insert_content_if_absent(&self) -> &'static str {
        "INSERT INTO content (content_hash, content_id, content) VALUES (?1, ?2, ?3)
         ON CONFLICT (content_hash) DO NOTHING"
    }

    fn select_content_by_hash(&self) -> &'static str {
        "SELECT content_hash, content_id, content FROM content WHERE content_hash = ?1"
    }

    fn select_content_by_id(&self) -> &'static str {
        "SELECT content_hash, content_id, content FROM content WHERE content_id = ?1"
    }

    fn upsert_artifact_rule(&self) -> &'static str {
        "INSERT INTO artifact_rules (group_id, artifact_id, rule, config) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (group_id, artifact_id, rule) DO UPDATE SET config = excluded.config"
    }

    fn delete_artifact_rule(&self) -> &'static str {
        "DELETE FROM artifact_rules WHERE group_id = ?1 AND artifact_id = ?2 AND rule = ?3"
    }

    fn select_artifact_rule(&self) -> &'static str {
        "SELECT rule, config FROM artifact_rules WHERE group_id = ?1 AND artifact_id = ?2 AND rule = ?3"
    }

    fn select_artifact_rules(&self) -> &'static str {
        "SELECT rule, config FROM artifact_rules WHERE group_id = ?1 AND artifact_id = ?2 ORDER BY rule"
    }

    fn delete_artifact_rules(&self) -> &'static str {
        "DELETE FROM artifact_rules WHERE group_id = ?1 AND artifact_id = ?2"
    }

    fn delete_group_rules(&self) -> &'static str {
        "DELETE FROM artifact_rules WHERE group_id = ?1"
    }

    fn upsert_global_rule(&self) -> &'static str {
        "INSERT INTO global_rules (rule, config) VALUES (?1, ?2)
         ON CONFLICT (rule) DO UPDATE SET config = excluded.config"
    }

    fn delete_global_rule(&self) -> &'static str {
        "DELETE FROM global_rules WHERE rule = ?1"
    }

    fn select_global_rule(&self) -> &'static str {
        "SELECT rule, config FROM global_rules WHERE rule = ?1"
    }

    fn select_global_rules(&self) -> &'static str {
        "SELECT rule, config FROM global_rules ORDER BY rule"
    }

    fn upsert_config_property(&self) -> &'static str {
        "INSERT INTO config_properties (name, value) VALUES (?1, ?2)
         ON CONFLICT (name) DO UPDATE SET value = excluded.value"
    }

    fn delete_config_property(&self) -> &'static str {
        "DELETE FROM config_properties WHERE name = ?1"
    }

    fn select_config_property(&self) -> &'static str {
        "SELECT name, value FROM config_properties WHERE name = ?1"
    }

    fn select_config_properties(&self) -> &'static str {
        "SELECT name, value FROM config_properties ORDER BY name"
    }

    fn select_sequencer(&self) -> &'static str {
        "SELECT value FROM sequencers WHERE name = ?1"
    }

    fn insert_sequencer(&self) -> &'static str {
        "INSERT INTO sequencers (name, value) VALUES (?1, ?2)"
    }

    fn update_sequencer(&self) -> &'static str {
        "UPDATE sequencers SET value = ?1 WHERE name = ?2"
    }

    fn select_watermark(&self) -> &'static str {
        "SELECT last_offset FROM partition_watermarks WHERE partition_id = ?1"
    }

    fn upsert_watermark(&self) -> &'static str {
        "INSERT INTO partition_watermarks (partition_id, last_offset) VALUES (?1, ?2)
         ON CONFLICT (partition_id) DO UPDATE SET last_offset = excluded.last_offset"
    }
}
