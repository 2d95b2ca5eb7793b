// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cluster-wide id allocation
//!
//! Content ids and global ids must be unique across every node, so
//! allocation is itself a logged mutation: each request rides a sentinel
//! partition key, serializing all requests of one kind through a single
//! partition, and the apply loop advances the counter row. Every replica
//! replays the same allocation order and lands on the same counter value.
//!
//! A fresh correlation id per attempt joins this producer's wait to the
//! applied message. A timed-out attempt is abandoned, never re-waited: its
//! counter value may still be consumed by the apply, leaving a gap, which
//! is harmless because ids only need uniqueness, not density.

use crate::error::Result;
use crate::message::{AllocateAction, MessageKey, MessageValue};
use crate::producer::LogProducer;
use std::sync::Arc;
use uuid::Uuid;

/// Allocates cluster-unique identifiers through the log.
pub struct IdSequencer {
    producer: Arc<LogProducer>,
}

impl IdSequencer {
    pub fn new(producer: Arc<LogProducer>) -> Self {
        Self { producer }
    }

    /// Next content id, unique across all nodes.
    pub async fn next_content_id(&self) -> Result<i64> {
        let key = MessageKey::ContentId {
            correlation: Uuid::new_v4(),
        };
        self.producer
            .send_allocation(&key, &MessageValue::ContentId(AllocateAction::Allocate))
            .await
    }

    /// Next global id, unique across all nodes.
    pub async fn next_global_id(&self) -> Result<i64> {
        let key = MessageKey::GlobalId {
            correlation: Uuid::new_v4(),
        };
        self.producer
            .send_allocation(&key, &MessageValue::GlobalId(AllocateAction::Allocate))
            .await
    }
}
