// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multi-node replication tests
//!
//! Several engines share one in-process log, which is exactly the deployed
//! topology with the broker swapped for `MemoryLog`. Nodes converge only by
//! replaying the log; nothing here lets them talk directly.

use registry_logsql::{
    CommitLog, Config, MemoryLog, RegistryEngine, StorageError, VersionState,
};
use std::sync::Arc;
use std::time::Duration;

const PARTITIONS: u32 = 8;

fn shared_log() -> Arc<MemoryLog> {
    Arc::new(MemoryLog::new(PARTITIONS))
}

fn node(log: &Arc<MemoryLog>, name: &str) -> RegistryEngine {
    let config = Config::builder()
        .partitions(PARTITIONS)
        .ack_timeout_ms(2_000)
        .node_name(name)
        .build();
    RegistryEngine::start(&config, Arc::clone(log) as Arc<dyn CommitLog>).unwrap()
}

async fn converged<F: Fn() -> bool>(cond: F) -> bool {
    for _ in 0..400 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

#[tokio::test]
async fn mutation_on_one_node_is_visible_on_the_other() {
    let log = shared_log();
    let a = node(&log, "node-a");
    let b = node(&log, "node-b");

    let registry = a.registry();
    registry
        .create_group("orders", Some("order schemas".to_string()))
        .await
        .unwrap();
    registry
        .create_artifact("orders", "order-placed", "AVRO", None, None)
        .await
        .unwrap();
    let created = registry
        .create_version("orders", "order-placed", b"{\"type\":\"record\"}", None, None)
        .await
        .unwrap();

    let replica = b.registry();
    assert!(
        converged(|| {
            replica
                .get_version("orders", "order-placed", created.version)
                .unwrap()
                .is_some()
        })
        .await
    );
    let replicated = replica
        .get_version("orders", "order-placed", created.version)
        .unwrap()
        .unwrap();
    assert_eq!(replicated, created);

    // Content replicates too, on its own partition.
    assert!(
        converged(|| {
            replica
                .get_version_content("orders", "order-placed", created.version)
                .unwrap()
                .is_some()
        })
        .await
    );
}

#[tokio::test]
async fn writer_sees_its_own_write_immediately() {
    let log = shared_log();
    let a = node(&log, "node-a");
    let registry = a.registry();

    registry.create_group("g", None).await.unwrap();
    // No polling here on purpose: create_group returning means the local
    // snapshot already has the row.
    assert!(registry.get_group("g").unwrap().is_some());
}

#[tokio::test]
async fn global_ids_are_unique_across_nodes() {
    let log = shared_log();
    let a = node(&log, "node-a");
    let b = node(&log, "node-b");

    let ra = a.registry();
    ra.create_group("g", None).await.unwrap();
    ra.create_artifact("g", "a", "JSON", None, None).await.unwrap();

    let rb = b.registry();
    assert!(converged(|| rb.get_artifact("g", "a").unwrap().is_some()).await);

    // Both nodes create versions concurrently; distinct content so every
    // create allocates a content id as well as a global id.
    let mut tasks = Vec::new();
    for i in 0..6u32 {
        let registry = if i % 2 == 0 { a.registry() } else { b.registry() };
        tasks.push(tokio::spawn(async move {
            registry
                .create_version("g", "a", format!("schema-{i}").as_bytes(), None, None)
                .await
                .unwrap()
        }));
    }

    let mut global_ids = Vec::new();
    let mut versions = Vec::new();
    for task in tasks {
        let meta = task.await.unwrap();
        global_ids.push(meta.global_id);
        versions.push(meta.version);
    }

    global_ids.sort_unstable();
    global_ids.dedup();
    assert_eq!(global_ids.len(), 6, "global ids collided");

    versions.sort_unstable();
    assert_eq!(versions, vec![1, 2, 3, 4, 5, 6], "version numbers not dense");
}

#[tokio::test]
async fn restarted_node_resumes_without_reapplying() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("node-a.db");
    let db_path = db_path.to_str().unwrap();
    let log = shared_log();

    let config = Config::builder()
        .partitions(PARTITIONS)
        .ack_timeout_ms(2_000)
        .db_path(db_path)
        .node_name("node-a")
        .build();

    {
        let a = RegistryEngine::start(&config, Arc::clone(&log) as Arc<dyn CommitLog>).unwrap();
        let registry = a.registry();
        registry.create_group("g", None).await.unwrap();
        registry
            .create_artifact("g", "a", "AVRO", None, None)
            .await
            .unwrap();
        registry
            .create_version("g", "a", b"v1-bytes", None, None)
            .await
            .unwrap();
    }

    // Same snapshot file, same log. Replay must skip everything already
    // applied; a re-applied version create would mint a duplicate row.
    let a = RegistryEngine::start(&config, Arc::clone(&log) as Arc<dyn CommitLog>).unwrap();
    let registry = a.registry();
    let second = registry
        .create_version("g", "a", b"v2-bytes", None, None)
        .await
        .unwrap();
    assert_eq!(second.version, 2);
    assert_eq!(registry.list_versions("g", "a").unwrap().len(), 2);
}

#[tokio::test]
async fn fresh_node_rebuilds_from_empty_snapshot() {
    let log = shared_log();
    let a = node(&log, "node-a");
    let registry = a.registry();

    registry.create_group("g", None).await.unwrap();
    registry
        .create_artifact("g", "a", "PROTOBUF", None, None)
        .await
        .unwrap();
    for i in 0..3u32 {
        registry
            .create_version("g", "a", format!("rev-{i}").as_bytes(), None, None)
            .await
            .unwrap();
    }
    registry
        .set_version_state("g", "a", 2, VersionState::Deprecated)
        .await
        .unwrap();

    // A node joining late starts from an empty snapshot and catches up by
    // replay alone.
    let late = node(&log, "node-late");
    let replica = late.registry();
    assert!(converged(|| replica.list_versions("g", "a").unwrap().len() == 3).await);
    let v2 = replica.get_version("g", "a", 2).unwrap().unwrap();
    assert_eq!(v2.state, VersionState::Deprecated);

    let expected = a.registry().list_versions("g", "a").unwrap();
    assert_eq!(replica.list_versions("g", "a").unwrap(), expected);
}

#[tokio::test]
async fn content_is_deduplicated_across_nodes() {
    let log = shared_log();
    let a = node(&log, "node-a");
    let b = node(&log, "node-b");

    let ra = a.registry();
    ra.create_group("g", None).await.unwrap();
    ra.create_artifact("g", "a", "AVRO", None, None).await.unwrap();
    ra.create_artifact("g", "b", "AVRO", None, None).await.unwrap();

    let rb = b.registry();
    assert!(converged(|| rb.get_artifact("g", "b").unwrap().is_some()).await);

    let schema = b"{\"shared\":true}";
    let va = ra.create_version("g", "a", schema, None, None).await.unwrap();
    assert!(converged(|| rb.get_version_content("g", "a", va.version).unwrap().is_some()).await);
    let vb = rb.create_version("g", "b", schema, None, None).await.unwrap();

    assert_eq!(va.content_hash, vb.content_hash);
    let ca = ra.get_version_content("g", "a", va.version).unwrap().unwrap();
    let cb = rb.get_version_content("g", "b", vb.version).unwrap().unwrap();
    assert_eq!(ca.content_id, cb.content_id);
}

#[tokio::test]
async fn poisoned_partition_halts_without_taking_down_the_node() {
    let log = shared_log();
    let a = node(&log, "node-a");
    let registry = a.registry();

    registry.create_group("g1", None).await.unwrap();

    // Inject an undecodable record on g1's partition, bypassing the
    // producer's validation.
    let partition = registry_logsql::log::partition_for("g1", PARTITIONS);
    use registry_logsql::CommitLog;
    log.append(partition, b"not-a-key".to_vec(), b"not-a-value".to_vec())
        .await
        .unwrap();

    assert!(converged(|| !a.health().is_healthy()).await);
    assert!(a.health().halted(partition).is_some());

    // Writes behind the poison record fail fast instead of applying.
    let err = registry.update_group("g1", Some("after".to_string())).await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::Protocol(_) | StorageError::AckTimeout { .. }
    ));

    // Keys on other partitions keep working; "default" maps elsewhere.
    let other = "default";
    assert_ne!(registry_logsql::log::partition_for(other, PARTITIONS), partition);
    registry.create_group(other, None).await.unwrap();
}
