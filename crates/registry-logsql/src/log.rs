// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Commit log boundary
//!
//! The engine assumes an external durable, partitioned, ordered-per-partition
//! append log. This module defines the trait the engine consumes plus the
//! in-process `MemoryLog` used by tests, the CLI, and single-node setups.
//!
//! Delivery is at-least-once; the apply loop's watermark makes re-delivery
//! harmless.

use crate::error::{Result, StorageError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// One appended log entry as seen by a subscriber.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub partition: u32,
    /// Per-partition offset, dense from 0.
    pub offset: u64,
    /// Serialized `MessageKey`.
    pub key: Vec<u8>,
    /// Serialized `MessageValue`.
    pub value: Vec<u8>,
}

/// Stable partition routing: same key string, same partition, across
/// restarts and across all instances.
pub fn partition_for(partition_key: &str, partitions: u32) -> u32 {
    debug_assert!(partitions > 0);
    crc32fast::hash(partition_key.as_bytes()) % partitions
}

/// Ordered stream of one partition's records.
#[async_trait]
pub trait LogSubscription: Send {
    /// Next record in offset order. Waits if the partition tail has been
    /// reached.
    async fn next(&mut self) -> Result<LogRecord>;
}

/// External append-log boundary.
///
/// Implementations must be durable and ordered per partition. `MemoryLog`
/// below is the in-process stand-in; a broker-backed implementation plugs in
/// behind the same trait.
#[async_trait]
pub trait CommitLog: Send + Sync {
    /// Partition count, fixed for the lifetime of the topic.
    fn partitions(&self) -> u32;

    /// Route a partition key to its partition.
    fn partition_for(&self, partition_key: &str) -> u32 {
        partition_for(partition_key, self.partitions())
    }

    /// Append a record; returns its offset within the partition.
    async fn append(&self, partition: u32, key: Vec<u8>, value: Vec<u8>) -> Result<u64>;

    /// Subscribe to a partition starting at `from_offset` (inclusive).
    async fn subscribe(&self, partition: u32, from_offset: u64)
        -> Result<Box<dyn LogSubscription>>;
}

// ---------------------------------------------------------------------------
// MemoryLog
// ---------------------------------------------------------------------------

struct PartitionInner {
    records: Mutex<Vec<(Vec<u8>, Vec<u8>)>>,
    appended: Notify,
}

/// In-process commit log, shareable between engine instances.
///
/// Tests hand one `MemoryLog` to several engines to simulate a replicated
/// deployment; every subscriber sees the same per-partition order.
pub struct MemoryLog {
    inner: Arc<Vec<PartitionInner>>,
}

impl MemoryLog {
    /// Create a log with the given partition count.
    pub fn new(partitions: u32) -> Self {
        let inner = (0..partitions)
            .map(|_| PartitionInner {
                records: Mutex::new(Vec::new()),
                appended: Notify::new(),
            })
            .collect();
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Number of records currently in a partition.
    pub fn len(&self, partition: u32) -> usize {
        self.inner[partition as usize].records.lock().unwrap().len()
    }

    /// True if the partition holds no records.
    pub fn is_empty(&self, partition: u32) -> bool {
        self.len(partition) == 0
    }

    fn check_partition(&self, partition: u32) -> Result<()> {
        if (partition as usize) < self.inner.len() {
            Ok(())
        } else {
            Err(StorageError::Log(format!(
                "partition {partition} out of range (log has {})",
                self.inner.len()
            )))
        }
    }
}

#[async_trait]
impl CommitLog for MemoryLog {
    fn partitions(&self) -> u32 {
        self.inner.len() as u32
    }

    async fn append(&self, partition: u32, key: Vec<u8>, value: Vec<u8>) -> Result<u64> {
        self.check_partition(partition)?;
        let part = &self.inner[partition as usize];
        let offset = {
            let mut records = part.records.lock().unwrap();
            records.push((key, value));
            (records.len() - 1) as u64
        };
        part.appended.notify_waiters();
        Ok(offset)
    }

    async fn subscribe(
        &self,
        partition: u32,
        from_offset: u64,
    ) -> Result<Box<dyn LogSubscription>> {
        self.check_partition(partition)?;
        Ok(Box::new(MemorySubscription {
            inner: Arc::clone(&self.inner),
            partition,
            next_offset: from_offset,
        }))
    }
}

struct MemorySubscription {
    inner: Arc<Vec<PartitionInner>>,
    partition: u32,
    next_offset: u64,
}

#[async_trait]
impl LogSubscription for MemorySubscription {
    async fn next(&mut self) -> Result<LogRecord> {
        let part = &self.inner[self.partition as usize];
        loop {
            // Arm the notification before the check so an append between
            // check and await is not lost.
            let appended = part.appended.notified();
            {
                let records = part.records.lock().unwrap();
                if (self.next_offset as usize) < records.len() {
                    let (key, value) = records[self.next_offset as usize].clone();
                    let record = LogRecord {
                        partition: self.partition,
                        offset: self.next_offset,
                        key,
                        value,
                    };
                    self.next_offset += 1;
                    return Ok(record);
                }
            }
            appended.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partitioner_is_stable() {
        // Pinned values: these must never change, or existing topics would
        // re-route keys to different partitions after an upgrade.
        assert_eq!(partition_for("default", 8), 7);
        assert_eq!(partition_for("my-group", 8), 3);
        assert_eq!(partition_for("g1", 8), 5);
        assert_eq!(partition_for("__registry_content_id__", 8), 6);
        assert_eq!(partition_for("__registry_global_id__", 8), 2);
    }

    #[test]
    fn test_partitioner_same_key_same_partition() {
        for key in ["a", "b", "group-42", ""] {
            assert_eq!(partition_for(key, 4), partition_for(key, 4));
            assert!(partition_for(key, 4) < 4);
        }
    }

    #[tokio::test]
    async fn test_append_and_subscribe() {
        let log = MemoryLog::new(2);

        let o0 = log.append(0, b"k0".to_vec(), b"v0".to_vec()).await.unwrap();
        let o1 = log.append(0, b"k1".to_vec(), b"v1".to_vec()).await.unwrap();
        assert_eq!((o0, o1), (0, 1));

        let mut sub = log.subscribe(0, 0).await.unwrap();
        let r0 = sub.next().await.unwrap();
        let r1 = sub.next().await.unwrap();
        assert_eq!(r0.offset, 0);
        assert_eq!(r0.value, b"v0");
        assert_eq!(r1.offset, 1);
        assert_eq!(r1.key, b"k1");
    }

    #[tokio::test]
    async fn test_subscribe_from_offset_replays_suffix() {
        let log = MemoryLog::new(1);
        for i in 0..5u8 {
            log.append(0, vec![i], vec![i]).await.unwrap();
        }

        let mut sub = log.subscribe(0, 3).await.unwrap();
        assert_eq!(sub.next().await.unwrap().offset, 3);
        assert_eq!(sub.next().await.unwrap().offset, 4);
    }

    #[tokio::test]
    async fn test_subscriber_wakes_on_append() {
        let log = Arc::new(MemoryLog::new(1));
        let mut sub = log.subscribe(0, 0).await.unwrap();

        let appender = Arc::clone(&log);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            appender.append(0, b"k".to_vec(), b"v".to_vec()).await.unwrap();
        });

        let record = tokio::time::timeout(std::time::Duration::from_secs(1), sub.next())
            .await
            .expect("subscriber did not wake")
            .unwrap();
        assert_eq!(record.offset, 0);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_partition_out_of_range() {
        let log = MemoryLog::new(2);
        let err = log.append(5, vec![], vec![]).await.unwrap_err();
        assert!(matches!(err, StorageError::Log(_)));
    }

    #[tokio::test]
    async fn test_two_subscribers_see_same_order() {
        let log = MemoryLog::new(1);
        for i in 0..10u8 {
            log.append(0, vec![i], vec![i]).await.unwrap();
        }

        let mut a = log.subscribe(0, 0).await.unwrap();
        let mut b = log.subscribe(0, 0).await.unwrap();
        for i in 0..10u8 {
            assert_eq!(a.next().await.unwrap().value, vec![i]);
            assert_eq!(b.next().await.unwrap().value, vec![i]);
        }
    }
}
