// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Log producer and apply acknowledgements
//!
//! Writes never touch the snapshot directly: the producer appends to the log
//! and then blocks until the local apply loop has materialized that exact
//! message, which is what gives a caller read-your-own-write on its node.
//!
//! Two waiter kinds exist. Ordinary mutations wait on `(partition, offset)`,
//! known only after the append returns; the registry keeps the highest
//! applied offset per partition so a waiter that registers after its message
//! was already applied resolves immediately instead of hanging. Allocations
//! wait on the attempt's correlation id, registered before the append, and
//! resolve to the assigned identifier.

use crate::error::{Result, StorageError};
use crate::log::CommitLog;
use crate::message::{check_pair, encode_key, encode_value, MessageKey, MessageValue};
use crate::snapshot::ApplyOutcome;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

type AckResult<T> = std::result::Result<T, String>;

#[derive(Default)]
struct AckState {
    /// Highest offset each partition's apply loop has completed.
    applied: HashMap<u32, u64>,
    offset_waiters: HashMap<(u32, u64), oneshot::Sender<AckResult<ApplyOutcome>>>,
    correlation_waiters: HashMap<Uuid, (u32, oneshot::Sender<AckResult<i64>>)>,
}

/// Rendezvous between producers awaiting local apply and the per-partition
/// apply loops. Shared across all producers and consumers of one node.
#[derive(Default)]
pub struct AckRegistry {
    state: Mutex<AckState>,
}

impl AckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for `(partition, offset)` to be applied locally. Returns None if
    /// it already was; the applied-offset check and waiter insertion happen
    /// under one lock, closing the race with a concurrent `complete()`.
    fn register_offset(
        &self,
        partition: u32,
        offset: u64,
    ) -> Option<oneshot::Receiver<AckResult<ApplyOutcome>>> {
        let mut state = self.state.lock().unwrap();
        if let Some(applied) = state.applied.get(&partition) {
            if *applied >= offset {
                return None;
            }
        }
        let (tx, rx) = oneshot::channel();
        state.offset_waiters.insert((partition, offset), tx);
        Some(rx)
    }

    /// Wait for the allocation message carrying `correlation` to be applied.
    /// Registered before the append, so it cannot miss the ack.
    fn register_correlation(
        &self,
        partition: u32,
        correlation: Uuid,
    ) -> oneshot::Receiver<AckResult<i64>> {
        let (tx, rx) = oneshot::channel();
        self.state
            .lock()
            .unwrap()
            .correlation_waiters
            .insert(correlation, (partition, tx));
        rx
    }

    fn forget_correlation(&self, correlation: Uuid) {
        self.state
            .lock()
            .unwrap()
            .correlation_waiters
            .remove(&correlation);
    }

    /// Called by an apply loop after each successfully applied message.
    pub fn complete(
        &self,
        partition: u32,
        offset: u64,
        correlation: Option<Uuid>,
        outcome: ApplyOutcome,
    ) {
        let mut state = self.state.lock().unwrap();
        let applied = state.applied.entry(partition).or_insert(offset);
        if *applied < offset {
            *applied = offset;
        }

        if let Some(waiter) = state.offset_waiters.remove(&(partition, offset)) {
            // Receiver may have timed out and gone away; nothing to do then.
            let _ = waiter.send(Ok(outcome));
        }

        if let Some(correlation) = correlation {
            if let Some((_, waiter)) = state.correlation_waiters.remove(&correlation) {
                let result = match outcome {
                    ApplyOutcome::Allocated(id) => Ok(id),
                    other => Err(format!(
                        "allocation message resolved to non-allocation outcome {other:?}"
                    )),
                };
                let _ = waiter.send(result);
            }
        }
    }

    /// Called by an apply loop when its partition halts. Every waiter parked
    /// on that partition fails now rather than timing out one by one.
    pub fn fail_partition(&self, partition: u32, reason: &str) {
        let mut state = self.state.lock().unwrap();

        let keys: Vec<(u32, u64)> = state
            .offset_waiters
            .keys()
            .filter(|(p, _)| *p == partition)
            .copied()
            .collect();
        for key in keys {
            if let Some(waiter) = state.offset_waiters.remove(&key) {
                let _ = waiter.send(Err(reason.to_string()));
            }
        }

        let correlations: Vec<Uuid> = state
            .correlation_waiters
            .iter()
            .filter(|(_, (p, _))| *p == partition)
            .map(|(c, _)| *c)
            .collect();
        for correlation in correlations {
            if let Some((_, waiter)) = state.correlation_waiters.remove(&correlation) {
                let _ = waiter.send(Err(reason.to_string()));
            }
        }
    }
}

/// Appends mutations to the log and waits for local apply.
pub struct LogProducer {
    log: Arc<dyn CommitLog>,
    acks: Arc<AckRegistry>,
    ack_timeout: Duration,
}

impl LogProducer {
    pub fn new(log: Arc<dyn CommitLog>, acks: Arc<AckRegistry>, ack_timeout: Duration) -> Self {
        Self {
            log,
            acks,
            ack_timeout,
        }
    }

    /// Append a mutation and block until the local snapshot reflects it.
    /// Returns the log offset the mutation landed at.
    pub async fn send(&self, key: &MessageKey, value: &MessageValue) -> Result<u64> {
        check_pair(key, value)?;
        let partition = self.log.partition_for(key.partition_key());
        let key_bytes = encode_key(key)?;
        let value_bytes = encode_value(value)?;

        let offset = self.log.append(partition, key_bytes, value_bytes).await?;
        tracing::debug!(partition, offset, key_type = key.type_name(), "appended mutation");

        let Some(rx) = self.acks.register_offset(partition, offset) else {
            return Ok(offset);
        };
        let ack = tokio::time::timeout(self.ack_timeout, rx)
            .await
            .map_err(|_| StorageError::AckTimeout { partition, offset })?
            .map_err(|_| {
                StorageError::Log(format!("apply loop for partition {partition} went away"))
            })?;
        ack.map_err(StorageError::Protocol)?;
        Ok(offset)
    }

    /// Append an allocation request and block for the assigned identifier.
    pub async fn send_allocation(&self, key: &MessageKey, value: &MessageValue) -> Result<i64> {
        check_pair(key, value)?;
        let correlation = key.correlation().ok_or_else(|| {
            StorageError::Rejected("allocation message without a correlation id".to_string())
        })?;
        let partition = self.log.partition_for(key.partition_key());
        let key_bytes = encode_key(key)?;
        let value_bytes = encode_value(value)?;

        let rx = self.acks.register_correlation(partition, correlation);
        let offset = match self.log.append(partition, key_bytes, value_bytes).await {
            Ok(offset) => offset,
            Err(err) => {
                self.acks.forget_correlation(correlation);
                return Err(err);
            }
        };
        tracing::debug!(partition, offset, %correlation, "appended allocation request");

        let ack = tokio::time::timeout(self.ack_timeout, rx)
            .await
            .map_err(|_| {
                self.acks.forget_correlation(correlation);
                StorageError::AckTimeout { partition, offset }
            })?
            .map_err(|_| {
                StorageError::Log(format!("apply loop for partition {partition} went away"))
            })?;
        ack.map_err(StorageError::Protocol)
    }
}
