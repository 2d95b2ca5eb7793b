// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-partition apply loops
//!
//! Each partition gets one loop: subscribe at the persisted watermark plus
//! one, decode, apply, acknowledge, forever. One loop per partition is the
//! whole concurrency story on the consume side; partitions never contend
//! with each other and messages within a partition apply strictly in offset
//! order.
//!
//! Failure handling splits by kind. Transient faults (log hiccups, busy
//! database) retry the same offset with capped exponential backoff, which
//! is safe because the watermark only advances on commit. Protocol faults
//! (undecodable message, key/value tag mismatch) halt the partition: the
//! message would fail identically on every replay, and applying past it
//! would fork this replica from the others.

use crate::error::{Result, StorageError};
use crate::log::CommitLog;
use crate::message::{decode_key, decode_value};
use crate::producer::AckRegistry;
use crate::snapshot::SnapshotStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const BACKOFF_INITIAL: Duration = Duration::from_millis(50);
const BACKOFF_MAX: Duration = Duration::from_secs(5);

/// Halted-partition bookkeeping, shared with the engine for health checks.
#[derive(Default, Clone)]
pub struct PartitionHealth {
    faults: Arc<Mutex<HashMap<u32, String>>>,
}

impl PartitionHealth {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, partition: u32, reason: String) {
        self.faults.lock().unwrap().insert(partition, reason);
    }

    /// Why a partition halted, if it did.
    pub fn halted(&self, partition: u32) -> Option<String> {
        self.faults.lock().unwrap().get(&partition).cloned()
    }

    /// All halted partitions with reasons.
    pub fn halted_partitions(&self) -> Vec<(u32, String)> {
        let mut out: Vec<_> = self
            .faults
            .lock()
            .unwrap()
            .iter()
            .map(|(p, r)| (*p, r.clone()))
            .collect();
        out.sort_by_key(|(p, _)| *p);
        out
    }

    pub fn is_healthy(&self) -> bool {
        self.faults.lock().unwrap().is_empty()
    }
}

/// One partition's consume-and-apply loop.
pub struct ApplyLoop {
    partition: u32,
    log: Arc<dyn CommitLog>,
    store: Arc<SnapshotStore>,
    acks: Arc<AckRegistry>,
    health: PartitionHealth,
}

impl ApplyLoop {
    pub fn new(
        partition: u32,
        log: Arc<dyn CommitLog>,
        store: Arc<SnapshotStore>,
        acks: Arc<AckRegistry>,
        health: PartitionHealth,
    ) -> Self {
        Self {
            partition,
            log,
            store,
            acks,
            health,
        }
    }

    /// Run until the partition halts on a protocol fault. Intended to be
    /// spawned as a task; transient errors never return.
    pub async fn run(self) {
        if let Err(err) = self.consume().await {
            tracing::error!(
                partition = self.partition,
                error = %err,
                "partition halted"
            );
            self.health.record(self.partition, err.to_string());
            self.acks.fail_partition(self.partition, &err.to_string());
        }
    }

    async fn consume(&self) -> Result<()> {
        let mut backoff = BACKOFF_INITIAL;
        loop {
            let start = self.start_offset().await?;
            let mut sub = match self.log.subscribe(self.partition, start).await {
                Ok(sub) => sub,
                Err(err) if err.is_retryable() => {
                    tracing::warn!(
                        partition = self.partition,
                        error = %err,
                        "subscribe failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(BACKOFF_MAX);
                    continue;
                }
                Err(err) => return Err(err),
            };
            backoff = BACKOFF_INITIAL;
            tracing::info!(partition = self.partition, from_offset = start, "apply loop started");

            loop {
                let record = match sub.next().await {
                    Ok(record) => record,
                    Err(err) if err.is_retryable() => {
                        tracing::warn!(
                            partition = self.partition,
                            error = %err,
                            "subscription lost, resubscribing"
                        );
                        break;
                    }
                    Err(err) => return Err(err),
                };
                self.apply_record(record.offset, &record.key, &record.value)
                    .await?;
            }
        }
    }

    async fn start_offset(&self) -> Result<u64> {
        let store = Arc::clone(&self.store);
        let partition = self.partition;
        let watermark = tokio::task::spawn_blocking(move || store.watermark(partition))
            .await
            .map_err(|e| StorageError::Log(format!("watermark read task failed: {e}")))??;
        Ok(watermark.map_or(0, |w| w + 1))
    }

    async fn apply_record(&self, offset: u64, key_bytes: &[u8], value_bytes: &[u8]) -> Result<()> {
        // Decode failures are protocol faults: a tag this build does not
        // know means a newer producer wrote the log, and skipping would
        // silently diverge this snapshot.
        let key = decode_key(key_bytes)?;
        let value = decode_value(value_bytes)?;

        let mut backoff = BACKOFF_INITIAL;
        let outcome = loop {
            match self.store.apply(self.partition, offset, &key, &value) {
                Ok(outcome) => break outcome,
                Err(err) if err.is_retryable() => {
                    tracing::warn!(
                        partition = self.partition,
                        offset,
                        error = %err,
                        "apply failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(BACKOFF_MAX);
                }
                Err(err) => return Err(err),
            }
        };

        tracing::trace!(
            partition = self.partition,
            offset,
            key_type = key.type_name(),
            ?outcome,
            "applied"
        );
        self.acks.complete(self.partition, offset, key.correlation(), outcome);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MemoryLog;
    use crate::message::{encode_key, encode_value, GroupAction, MessageKey, MessageValue};
    use crate::sql::DialectKind;

    fn fixture() -> (Arc<MemoryLog>, Arc<SnapshotStore>, Arc<AckRegistry>, PartitionHealth) {
        let log = Arc::new(MemoryLog::new(1));
        let store = Arc::new(SnapshotStore::open_in_memory(DialectKind::Embedded).unwrap());
        let acks = Arc::new(AckRegistry::new());
        let health = PartitionHealth::new();
        (log, store, acks, health)
    }

    fn spawn_loop(
        log: &Arc<MemoryLog>,
        store: &Arc<SnapshotStore>,
        acks: &Arc<AckRegistry>,
        health: &PartitionHealth,
    ) -> tokio::task::JoinHandle<()> {
        let apply_loop = ApplyLoop::new(
            0,
            Arc::clone(log) as Arc<dyn CommitLog>,
            Arc::clone(store),
            Arc::clone(acks),
            health.clone(),
        );
        tokio::spawn(apply_loop.run())
    }

    async fn append_group_create(log: &MemoryLog, group_id: &str) -> u64 {
        let key = MessageKey::Group {
            group_id: group_id.to_string(),
        };
        let value = MessageValue::Group(GroupAction::Create {
            description: None,
            created_epoch_ms: 1,
        });
        log.append(0, encode_key(&key).unwrap(), encode_value(&value).unwrap())
            .await
            .unwrap()
    }

    async fn wait_until<F: Fn() -> bool>(cond: F) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_applies_appended_records() {
        let (log, store, acks, health) = fixture();
        let handle = spawn_loop(&log, &store, &acks, &health);

        append_group_create(&log, "g1").await;
        append_group_create(&log, "g2").await;

        let probe = Arc::clone(&store);
        wait_until(move || probe.get_group("g2").unwrap().is_some()).await;
        assert!(store.get_group("g1").unwrap().is_some());
        assert_eq!(store.watermark(0).unwrap(), Some(1));
        assert!(health.is_healthy());
        handle.abort();
    }

    #[tokio::test]
    async fn test_resumes_from_watermark_without_reapplying() {
        let (log, store, acks, health) = fixture();

        let handle = spawn_loop(&log, &store, &acks, &health);
        append_group_create(&log, "g1").await;
        let probe = Arc::clone(&store);
        wait_until(move || probe.get_group("g1").unwrap().is_some()).await;
        handle.abort();

        // Simulate state drift while the loop is down, then restart. The
        // replayed create at offset 0 must be skipped, not re-applied.
        let key = MessageKey::Group {
            group_id: "g1".to_string(),
        };
        let update = MessageValue::Group(GroupAction::Update {
            description: Some("kept".to_string()),
        });
        log.append(0, encode_key(&key).unwrap(), encode_value(&update).unwrap())
            .await
            .unwrap();

        let handle = spawn_loop(&log, &store, &acks, &health);
        let probe = Arc::clone(&store);
        wait_until(move || {
            probe
                .get_group("g1")
                .unwrap()
                .is_some_and(|g| g.description.as_deref() == Some("kept"))
        })
        .await;
        assert_eq!(store.watermark(0).unwrap(), Some(1));
        handle.abort();
    }

    #[tokio::test]
    async fn test_poison_message_halts_partition_and_fails_waiters() {
        let (log, store, acks, health) = fixture();
        let handle = spawn_loop(&log, &store, &acks, &health);

        append_group_create(&log, "g1").await;
        let probe = Arc::clone(&store);
        wait_until(move || probe.get_group("g1").unwrap().is_some()).await;

        log.append(0, b"garbage".to_vec(), b"garbage".to_vec())
            .await
            .unwrap();
        let health_probe = health.clone();
        wait_until(move || !health_probe.is_healthy()).await;

        assert!(health.halted(0).is_some());
        // The halt must leave the watermark at the last good message so a
        // fixed build can replay from the poison record.
        assert_eq!(store.watermark(0).unwrap(), Some(0));

        // Messages behind the poison record are never applied.
        append_group_create(&log, "g2").await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.get_group("g2").unwrap().is_none());
        assert!(handle.await.is_ok());
    }
}
