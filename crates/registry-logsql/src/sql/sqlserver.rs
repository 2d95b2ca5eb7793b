// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SQL Server-compatible statement set
//!
//! Upserts use MERGE, result limiting uses TOP, and DDL is guarded with
//! OBJECT_ID checks since SQL Server has no CREATE TABLE IF NOT EXISTS.

use super::SqlStatements;

/// Statement set for SQL Server-compatible servers.
pub struct SqlServerStatements;

impl SqlStatements for SqlServerStatements {
    fn ddl(&self) -> &'static [&'static str] {
        &[
            "IF OBJECT_ID('groups', 'U') IS NULL CREATE TABLE groups (
                group_id NVARCHAR(512) NOT NULL PRIMARY KEY,
                description NVARCHAR(1024),
                created_epoch_ms BIGINT NOT NULL
            )",
            "IF OBJECT_ID('artifacts', 'U') IS NULL CREATE TABLE artifacts (
                group_id NVARCHAR(512) NOT NULL,
                artifact_id NVARCHAR(512) NOT NULL,
                artifact_type NVARCHAR(64) NOT NULL,
                name NVARCHAR(512),
                description NVARCHAR(1024),
                created_epoch_ms BIGINT NOT NULL,
                PRIMARY KEY (group_id, artifact_id)
            )",
            "IF OBJECT_ID('versions', 'U') IS NULL CREATE TABLE versions (
                group_id NVARCHAR(512) NOT NULL,
                artifact_id NVARCHAR(512) NOT NULL,
                version INT NOT NULL,
                global_id BIGINT NOT NULL,
                content_hash NVARCHAR(64) NOT NULL,
                state NVARCHAR(16) NOT NULL,
                name NVARCHAR(512),
                description NVARCHAR(1024),
                created_epoch_ms BIGINT NOT NULL,
                PRIMARY KEY (group_id, artifact_id, version)
            )",
            "IF NOT EXISTS (SELECT 1 FROM sys.indexes WHERE name = 'idx_versions_global_id')
             CREATE INDEX idx_versions_global_id ON versions (global_id)",
            "IF OBJECT_ID('content', 'U') IS NULL CREATE TABLE content (
                content_hash NVARCHAR(64) NOT NULL PRIMARY KEY,
                content_id BIGINT NOT NULL,
                content VARBINARY(MAX) NOT NULL
            )",
            "IF NOT EXISTS (SELECT 1 FROM sys.indexes WHERE name = 'idx_content_id')
             CREATE INDEX idx_content_id ON content (content_id)",
            "IF OBJECT_ID('artifact_rules', 'U') IS NULL CREATE TABLE artifact_rules (
                group_id NVARCHAR(512) NOT NULL,
                artifact_id NVARCHAR(512) NOT NULL,
                rule NVARCHAR(32) NOT NULL,
                config NVARCHAR(1024) NOT NULL,
                PRIMARY KEY (group_id, artifact_id, rule)
            )",
            "IF OBJECT_ID('global_rules', 'U') IS NULL CREATE TABLE global_rules (
                rule NVARCHAR(32) NOT NULL PRIMARY KEY,
                config NVARCHAR(1024) NOT NULL
            )",
            "IF OBJECT_ID('config_properties', 'U') IS NULL CREATE TABLE config_properties (
                name NVARCHAR(512) NOT NULL PRIMARY KEY,
                value NVARCHAR(1024) NOT NULL
            )",
            "IF OBJECT_ID('sequencers', 'U') IS NULL CREATE TABLE sequencers (
                name NVARCHAR(64) NOT NULL PRIMARY KEY,
                value BIGINT NOT NULL
            )",
            "IF OBJECT_ID('partition_watermarks', 'U') IS NULL CREATE TABLE partition_watermarks (
                partition_id INT NOT NULL PRIMARY KEY,
                last_offset BIGINT NOT NULL
            )",
        ]
    }

    fn upsert_group(&self) -> &'static str {
        "MERGE INTO groups AS t
         USING (SELECT @p1 AS group_id, @p2 AS description, @p3 AS created_epoch_ms) AS s
         ON t.group_id = s.group_id
         WHEN MATCHED THEN UPDATE SET description = s.description
         WHEN NOT MATCHED THEN INSERT (group_id, description, created_epoch_ms)
             VALUES (s.group_id, s.description, s.created_epoch_ms);"
    }

    fn update_group(&self) -> &'static str {
        "UPDATE groups SET description = @p1 WHERE group_id = @p2"
    }

    fn delete_group(&self) -> &'static str {
        "DELETE FROM groups WHERE group_id = @p1"
    }

    fn select_group(&self) -> &'static str {
        "SELECT group_id, description, created_epoch_ms FROM groups WHERE group_id = @p1"
    }

    fn select_groups(&self) -> &'static str {
        "SELECT group_id, description, created_epoch_ms FROM groups ORDER BY group_id"
    }

    fn upsert_artifact(&self) -> &'static str {
        "MERGE INTO artifacts AS t
         USING (SELECT @p1 AS group_id, @p2 AS artifact_id, @p3 AS artifact_type,
                       @p4 AS name, @p5 AS description, @p6 AS created_epoch_ms) AS s
         ON t.group_id = s.group_id AND t.artifact_id = s.artifact_id
         WHEN MATCHED THEN UPDATE SET artifact_type = s.artifact_type, name = s.name,
             description = s.description
         WHEN NOT MATCHED THEN INSERT (group_id, artifact_id, artifact_type, name, description,
             created_epoch_ms)
             VALUES (s.group_id, s.artifact_id, s.artifact_type, s.name, s.description,
                 s.created_epoch_ms);"
    }

    fn update_artifact(&self) -> &'static str {
        "UPDATE artifacts SET name = @p1, description = @p2 WHERE group_id = @p3 AND artifact_id = @p4"
    }

    fn delete_artifact(&self) -> &'static str {
        "DELETE FROM artifacts WHERE group_id = @p1 AND artifact_id = @p2"
    }

    fn select_artifact(&self) -> &'static str {
        "SELECT group_id, artifact_id, artifact_type, name, description, created_epoch_ms
         FROM artifacts WHERE group_id = @p1 AND artifact_id = @p2"
    }

    fn select_artifacts(&self) -> &'static str {
        "SELECT group_id, artifact_id, artifact_type, name, description, created_epoch_ms
         FROM artifacts WHERE group_id = @p1 ORDER BY artifact_id"
    }

    fn delete_group_artifacts(&self) -> &'static str {
        "DELETE FROM artifacts WHERE group_id = @p1"
    }

    fn insert_version(&self) -> &'static str {
        "INSERT INTO versions (group_id, artifact_id, version, global_id, content_hash, state,
                               name, description, created_epoch_ms)
         VALUES (@p1, @p2, @p3, @p4, @p5, @p6, @p7, @p8, @p9)"
    }

    fn next_version(&self) -> &'static str {
        "SELECT COALESCE(MAX(version), 0) + 1 FROM versions WHERE group_id = @p1 AND artifact_id = @p2"
    }

    fn select_version(&self) -> &'static str {
        "SELECT group_id, artifact_id, version, global_id, content_hash, state, name, description,
                created_epoch_ms
         FROM versions WHERE group_id = @p1 AND artifact_id = @p2 AND version = @p3"
    }

    fn select_latest_version(&self) -> &'static str {
        "SELECT TOP 1 group_id, artifact_id, version, global_id, content_hash, state, name,
                description, created_epoch_ms
         FROM versions WHERE group_id = @p1 AND artifact_id = @p2 ORDER BY version DESC"
    }

    fn select_version_by_global_id(&self) -> &'static str {
        "SELECT group_id, artifact_id, version, global_id, content_hash, state, name, description,
                created_epoch_ms
         FROM versions WHERE global_id = @p1"
    }

    fn select_versions(&self) -> &'static str {
        "SELECT group_id, artifact_id, version, global_id, content_hash, state, name, description,
                created_epoch_ms
         FROM versions WHERE group_id = @p1 AND artifact_id = @p2 ORDER BY version"
    }

    fn update_version_state(&self) -> &'static str {
        "UPDATE versions SET state = @p1 WHERE group_id = @p2 AND artifact_id = @p3 AND version = @p4"
    }

    fn delete_version(&self) -> &'static str {
        "DELETE FROM versions WHERE group_id = @p1 AND artifact_id = @p2 AND version = @p3"
    }

    fn delete_artifact_versions(&self) -> &'static str {
        "DELETE FROM versions WHERE group_id = @p1 AND artifact_id = @p2"
    }

    fn delete_group_versions(&self) -> &'static str {
        "DELETE FROM versions WHERE group_id = @p1"
    }

    fn insert_content_if_absent(&self) -> &'static str {
        "IF NOT EXISTS (SELECT 1 FROM content WHERE content_hash = @p1)
         INSERT INTO content (content_hash, content_id, content) VALUES (@p1, @p2, @p3)"
    }

    fn select_content_by_hash(&self) -> &'static str {
        "SELECT content_hash, content_id, content FROM content WHERE content_hash = @p1"
    }

    fn select_content_by_id(&self) -> &'static str {
        "SELECT content_hash, content_id, content FROM content WHERE content_id = @p1"
    }

    fn upsert_artifact_rule(&self) -> &'static str {
        "MERGE INTO artifact_rules AS t
         USING (SELECT @p1 AS group_id, @p2 AS artifact_id, @p3 AS rule, @p4 AS config) AS s
         ON t.group_id = s.group_id AND t.artifact_id = s.artifact_id AND t.rule = s.rule
         WHEN MATCHED THEN UPDATE SET config = s.config
         WHEN NOT MATCHED THEN INSERT (group_id, artifact_id, rule, config)
             VALUES (s.group_id, s.artifact_id, s.rule, s.config);"
    }

    fn delete_artifact_rule(&self) -> &'static str {
        "DELETE FROM artifact_rules WHERE group_id = @p1 AND artifact_id = @p2 AND rule = @p3"
    }

    fn select_artifact_rule(&self) -> &'static str {
        "SELECT rule, config FROM artifact_rules WHERE group_id = @p1 AND artifact_id = @p2 AND rule = @p3"
    }

    fn select_artifact_rules(&self) -> &'static str {
        "SELECT rule, config FROM artifact_rules WHERE group_id = @p1 AND artifact_id = @p2 ORDER BY rule"
    }

    fn delete_artifact_rules(&self) -> &'static str {
        "DELETE FROM artifact_rules WHERE group_id = @p1 AND artifact_id = @p2"
    }

    fn delete_group_rules(&self) -> &'static str {
        "DELETE FROM artifact_rules WHERE group_id = @p1"
    }

    fn upsert_global_rule(&self) -> &'static str {
        "MERGE INTO global_rules AS t
         USING (SELECT @p1 AS rule, @p2 AS config) AS s
         ON t.rule = s.rule
         WHEN MATCHED THEN UPDATE SET config = s.config
         WHEN NOT MATCHED THEN INSERT (rule, config) VALUES (s.rule, s.config);"
    }

    fn delete_global_rule(&self) -> &'static str {
        "DELETE FROM global_rules WHERE rule = @p1"
    }

    fn select_global_rule(&self) -> &'static str {
        "SELECT rule, config FROM global_rules WHERE rule = @p1"
    }

    fn select_global_rules(&self) -> &'static str {
        "SELECT rule, config FROM global_rules ORDER BY rule"
    }

    fn upsert_config_property(&self) -> &'static str {
        "MERGE INTO config_properties AS t
         USING (SELECT @p1 AS name, @p2 AS value) AS s
         ON t.name = s.name
         WHEN MATCHED THEN UPDATE SET value = s.value
         WHEN NOT MATCHED THEN INSERT (name, value) VALUES (s.name, s.value);"
    }

    fn delete_config_property(&self) -> &'static str {
        "DELETE FROM config_properties WHERE name = @p1"
    }

    fn select_config_property(&self) -> &'static str {
        "SELECT name, value FROM config_properties WHERE name = @p1"
    }

    fn select_config_properties(&self) -> &'static str {
        "SELECT name, value FROM config_properties ORDER BY name"
    }

    fn select_sequencer(&self) -> &'static str {
        "SELECT value FROM sequencers WHERE name = @p1"
    }

    fn insert_sequencer(&self) -> &'static str {
        "INSERT INTO sequencers (name, value) VALUES (@p1, @p2)"
    }

    fn update_sequencer(&self) -> &'static str {
        "UPDATE sequencers SET value = @p1 WHERE name = @p2"
    }

    fn select_watermark(&self) -> &'static str {
        "SELECT last_offset FROM partition_watermarks WHERE partition_id = @p1"
    }

    fn upsert_watermark(&self) -> &'static str {
        "MERGE INTO partition_watermarks AS t
         USING (SELECT @p1 AS partition_id, @p2 AS last_offset) AS s
         ON t.partition_id = s.partition_id
         WHEN MATCHED THEN UPDATE SET last_offset = s.last_offset
         WHEN NOT MATCHED THEN INSERT (partition_id, last_offset)
             VALUES (s.partition_id, s.last_offset);"
    }
}
