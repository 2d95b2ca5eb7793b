// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Storage error taxonomy
//!
//! Errors are grouped by how callers must react:
//!
//! - `Config` -- fatal at startup, the process must not come up
//! - `Log` / `Sql` -- transient infrastructure, retried by the consumer
//! - `Protocol` -- fatal for the affected partition, never skipped
//! - `Rejected` / `NotFound` -- caller errors, raised before anything is
//!   appended to the log
//! - `AckTimeout` -- the mutation was appended but local apply did not catch
//!   up in time; it may still become visible

use thiserror::Error;

/// Errors produced by the storage engine.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Invalid startup configuration (unknown dialect, bad partition count).
    #[error("configuration error: {0}")]
    Config(String),

    /// Commit log unavailable or misbehaving.
    #[error("commit log error: {0}")]
    Log(String),

    /// Snapshot store failure (connection, constraint, I/O).
    #[error("sql error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// Undecodable or inconsistent log message. Skipping would let this
    /// instance diverge from its peers, so the partition halts instead.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Mutation rejected before being appended to the log.
    #[error("rejected: {0}")]
    Rejected(String),

    /// Referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The local consumer did not apply the appended message within the
    /// configured bound. Distinct from `Rejected`: the mutation is durable
    /// in the log and may still become visible.
    #[error("ack timeout waiting for partition {partition} offset {offset}")]
    AckTimeout { partition: u32, offset: u64 },
}

impl StorageError {
    /// Returns true if the caller may safely retry the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::Log(_) | StorageError::Sql(_) | StorageError::AckTimeout { .. }
        )
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, StorageError>;
