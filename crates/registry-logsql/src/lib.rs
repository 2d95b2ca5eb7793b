// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Log-replicated registry storage
//!
//! A storage engine for schema-registry data that replicates through an
//! ordered, partitioned commit log instead of a shared database. Every
//! mutation is appended to the log as a `(MessageKey, MessageValue)` pair;
//! each node runs one apply loop per partition that materializes messages
//! into a local SQL snapshot. Nodes never talk to each other, only to the
//! log, and any node's snapshot can be rebuilt from scratch by replaying.
//!
//! # Quick start
//!
//! ```no_run
//! use registry_logsql::{Config, MemoryLog, RegistryEngine};
//! use std::sync::Arc;
//!
//! # async fn demo() -> registry_logsql::Result<()> {
//! let config = Config::builder().partitions(8).build();
//! let log = Arc::new(MemoryLog::new(8));
//! let engine = RegistryEngine::start(&config, log)?;
//!
//! let registry = engine.registry();
//! registry.create_group("default", None).await?;
//! registry
//!     .create_artifact("default", "invoice", "AVRO", None, None)
//!     .await?;
//! registry
//!     .create_version("default", "invoice", b"{\"type\":\"record\"}", None, None)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod consumer;
pub mod error;
pub mod log;
pub mod message;
pub mod producer;
pub mod registry;
pub mod sequencer;
pub mod snapshot;
pub mod sql;
pub mod types;

pub use config::Config;
pub use consumer::PartitionHealth;
pub use error::{Result, StorageError};
pub use log::{CommitLog, LogRecord, LogSubscription, MemoryLog};
pub use message::{MessageKey, MessageValue};
pub use registry::{Registry, RegistryEngine};
pub use snapshot::{ApplyOutcome, SnapshotStore};
pub use sql::DialectKind;
pub use types::{
    ArtifactMeta, ConfigProperty, GroupMeta, RuleConfig, RuleType, StoredContent, VersionMeta,
    VersionState,
};
