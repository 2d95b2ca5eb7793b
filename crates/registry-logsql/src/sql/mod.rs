// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dialect-abstracted SQL statement provider
//!
//! Exactly one statement set is selected at startup from the configured
//! dialect identifier; higher layers issue logical operations and never see
//! dialect-specific SQL. The three dialects are peers implementing the same
//! operation contract -- they differ only in syntax (placeholders, upsert
//! form, result limiting, DDL guards), never in observable behavior.
//!
//! An unknown identifier is a fatal startup error: the process must not come
//! up against a dialect it does not understand.

mod postgres;
mod sqlite;
mod sqlserver;

use crate::error::{Result, StorageError};
use std::fmt;
use std::str::FromStr;

pub use postgres::PostgresStatements;
pub use sqlite::SqliteStatements;
pub use sqlserver::SqlServerStatements;

/// Supported relational engines. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialectKind {
    /// Bundled SQLite, the default and the engine exercised by tests.
    Embedded,
    /// PostgreSQL-compatible servers.
    Postgres,
    /// SQL Server-compatible servers.
    SqlServer,
}

impl DialectKind {
    /// Canonical identifier as written in configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            DialectKind::Embedded => "embedded",
            DialectKind::Postgres => "postgres",
            DialectKind::SqlServer => "sqlserver",
        }
    }
}

impl FromStr for DialectKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "embedded" | "sqlite" => Ok(DialectKind::Embedded),
            "postgres" | "postgresql" => Ok(DialectKind::Postgres),
            "sqlserver" | "mssql" => Ok(DialectKind::SqlServer),
            other => Err(StorageError::Config(format!(
                "unsupported sql dialect: {other} (expected embedded, postgres, or sqlserver)"
            ))),
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Select the statement set for a dialect. Called once at startup.
pub fn statements_for(kind: DialectKind) -> &'static dyn SqlStatements {
    match kind {
        DialectKind::Embedded => &SqliteStatements,
        DialectKind::Postgres => &PostgresStatements,
        DialectKind::SqlServer => &SqlServerStatements,
    }
}

/// One coherent, fully-parameterized statement set.
///
/// Parameter positions are part of the contract: every dialect binds the
/// same logical arguments at the same indices.
pub trait SqlStatements: Send + Sync {
    /// Schema DDL, executed in order at startup. Idempotent.
    fn ddl(&self) -> &'static [&'static str];

    // -- groups: (group_id, description, created_epoch_ms)
    fn upsert_group(&self) -> &'static str;
    /// (description, group_id)
    fn update_group(&self) -> &'static str;
    fn delete_group(&self) -> &'static str;
    fn select_group(&self) -> &'static str;
    fn select_groups(&self) -> &'static str;

    // -- artifacts: (group_id, artifact_id, artifact_type, name, description, created_epoch_ms)
    fn upsert_artifact(&self) -> &'static str;
    /// (name, description, group_id, artifact_id)
    fn update_artifact(&self) -> &'static str;
    fn delete_artifact(&self) -> &'static str;
    fn select_artifact(&self) -> &'static str;
    fn select_artifacts(&self) -> &'static str;
    fn delete_group_artifacts(&self) -> &'static str;

    // -- versions: (group_id, artifact_id, version, global_id, content_hash,
    //               state, name, description, created_epoch_ms)
    fn insert_version(&self) -> &'static str;
    /// (group_id, artifact_id) -> next free version number
    fn next_version(&self) -> &'static str;
    fn select_version(&self) -> &'static str;
    fn select_latest_version(&self) -> &'static str;
    fn select_version_by_global_id(&self) -> &'static str;
    fn select_versions(&self) -> &'static str;
    /// (state, group_id, artifact_id, version)
    fn update_version_state(&self) -> &'static str;
    fn delete_version(&self) -> &'static str;
    fn delete_artifact_versions(&self) -> &'static str;
    fn delete_group_versions(&self) -> &'static str;

    // -- content: (content_hash, content_id, content)
    fn insert_content_if_absent(&self) -> &'static str;
    fn select_content_by_hash(&self) -> &'static str;
    fn select_content_by_id(&self) -> &'static str;

    // -- artifact rules: (group_id, artifact_id, rule, config)
    fn upsert_artifact_rule(&self) -> &'static str;
    fn delete_artifact_rule(&self) -> &'static str;
    fn select_artifact_rule(&self) -> &'static str;
    fn select_artifact_rules(&self) -> &'static str;
    fn delete_artifact_rules(&self) -> &'static str;
    fn delete_group_rules(&self) -> &'static str;

    // -- global rules: (rule, config)
    fn upsert_global_rule(&self) -> &'static str;
    fn delete_global_rule(&self) -> &'static str;
    fn select_global_rule(&self) -> &'static str;
    fn select_global_rules(&self) -> &'static str;

    // -- config properties: (name, value)
    fn upsert_config_property(&self) -> &'static str;
    fn delete_config_property(&self) -> &'static str;
    fn select_config_property(&self) -> &'static str;
    fn select_config_properties(&self) -> &'static str;

    // -- sequencer counters: (name) / (name, value) / (value, name)
    fn select_sequencer(&self) -> &'static str;
    fn insert_sequencer(&self) -> &'static str;
    fn update_sequencer(&self) -> &'static str;

    // -- watermarks: (partition_id) / (partition_id, last_offset)
    fn select_watermark(&self) -> &'static str;
    fn upsert_watermark(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn catalog(s: &dyn SqlStatements) -> Vec<(&'static str, &'static str)> {
        vec![
            ("upsert_group", s.upsert_group()),
            ("update_group", s.update_group()),
            ("delete_group", s.delete_group()),
            ("select_group", s.select_group()),
            ("select_groups", s.select_groups()),
            ("upsert_artifact", s.upsert_artifact()),
            ("update_artifact", s.update_artifact()),
            ("delete_artifact", s.delete_artifact()),
            ("select_artifact", s.select_artifact()),
            ("select_artifacts", s.select_artifacts()),
            ("delete_group_artifacts", s.delete_group_artifacts()),
            ("insert_version", s.insert_version()),
            ("next_version", s.next_version()),
            ("select_version", s.select_version()),
            ("select_latest_version", s.select_latest_version()),
            ("select_version_by_global_id", s.select_version_by_global_id()),
            ("select_versions", s.select_versions()),
            ("update_version_state", s.update_version_state()),
            ("delete_version", s.delete_version()),
            ("delete_artifact_versions", s.delete_artifact_versions()),
            ("delete_group_versions", s.delete_group_versions()),
            ("insert_content_if_absent", s.insert_content_if_absent()),
            ("select_content_by_hash", s.select_content_by_hash()),
            ("select_content_by_id", s.select_content_by_id()),
            ("upsert_artifact_rule", s.upsert_artifact_rule()),
            ("delete_artifact_rule", s.delete_artifact_rule()),
            ("select_artifact_rule", s.select_artifact_rule()),
            ("select_artifact_rules", s.select_artifact_rules()),
            ("delete_artifact_rules", s.delete_artifact_rules()),
            ("delete_group_rules", s.delete_group_rules()),
            ("upsert_global_rule", s.upsert_global_rule()),
            ("delete_global_rule", s.delete_global_rule()),
            ("select_global_rule", s.select_global_rule()),
            ("select_global_rules", s.select_global_rules()),
            ("upsert_config_property", s.upsert_config_property()),
            ("delete_config_property", s.delete_config_property()),
            ("select_config_property", s.select_config_property()),
            ("select_config_properties", s.select_config_properties()),
            ("select_sequencer", s.select_sequencer()),
            ("insert_sequencer", s.insert_sequencer()),
            ("update_sequencer", s.update_sequencer()),
            ("select_watermark", s.select_watermark()),
            ("upsert_watermark", s.upsert_watermark()),
        ]
    }

    /// Distinct placeholder indices referenced by a statement, regardless of
    /// dialect syntax (?N, $N, @pN).
    fn placeholder_indices(sql: &str) -> BTreeSet<u32> {
        let bytes = sql.as_bytes();
        let mut out = BTreeSet::new();
        let mut i = 0;
        while i < bytes.len() {
            let start = match bytes[i] {
                b'?' | b'$' => i + 1,
                b'@' if bytes.get(i + 1) == Some(&b'p') => i + 2,
                _ => {
                    i += 1;
                    continue;
                }
            };
            let mut end = start;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            if end > start {
                out.insert(sql[start..end].parse().unwrap());
            }
            i = end.max(i + 1);
        }
        out
    }

    #[test]
    fn test_dialect_parsing() {
        assert_eq!("embedded".parse::<DialectKind>().unwrap(), DialectKind::Embedded);
        assert_eq!("sqlite".parse::<DialectKind>().unwrap(), DialectKind::Embedded);
        assert_eq!("postgresql".parse::<DialectKind>().unwrap(), DialectKind::Postgres);
        assert_eq!("mssql".parse::<DialectKind>().unwrap(), DialectKind::SqlServer);

        let err = "db2".parse::<DialectKind>().unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }

    #[test]
    fn test_selection_is_exhaustive() {
        for kind in [
            DialectKind::Embedded,
            DialectKind::Postgres,
            DialectKind::SqlServer,
        ] {
            let stmts = statements_for(kind);
            assert!(!stmts.ddl().is_empty());
        }
    }

    #[test]
    fn test_dialects_share_one_statement_surface() {
        let embedded = catalog(statements_for(DialectKind::Embedded));
        let postgres = catalog(statements_for(DialectKind::Postgres));
        let sqlserver = catalog(statements_for(DialectKind::SqlServer));

        assert_eq!(embedded.len(), postgres.len());
        assert_eq!(embedded.len(), sqlserver.len());

        for ((name, e), ((_, p), (_, m))) in embedded
            .iter()
            .zip(postgres.iter().zip(sqlserver.iter()))
        {
            let e_params = placeholder_indices(e);
            assert_eq!(
                e_params,
                placeholder_indices(p),
                "parameter mismatch between embedded and postgres in {name}"
            );
            assert_eq!(
                e_params,
                placeholder_indices(m),
                "parameter mismatch between embedded and sqlserver in {name}"
            );
            // Dense indices starting at 1, matching positional binding.
            for (expected, got) in (1..).zip(e_params.iter()) {
                assert_eq!(expected, *got, "non-dense parameters in {name}");
            }
        }
    }

    #[test]
    fn test_ddl_covers_same_tables() {
        let embedded = statements_for(DialectKind::Embedded).ddl();
        let postgres = statements_for(DialectKind::Postgres).ddl();
        let sqlserver = statements_for(DialectKind::SqlServer).ddl();
        assert_eq!(embedded.len(), postgres.len());
        assert_eq!(embedded.len(), sqlserver.len());
    }
}
