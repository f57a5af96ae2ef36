//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`chain`] - [`MockChainClient`](chain::MockChainClient) with a
//!   scripted head block and log list.
//! - [`db`] - [`TempDb`](db::TempDb), a migrated throwaway SQLite file.
//! - [`config`] - Canonical test configurations.
//! - [`events`] - Builders for order-book contract logs.

pub mod chain;
pub mod config;
pub mod db;
pub mod events;

use std::sync::Arc;

use crate::kv::{KvNode, KvStore, MemoryNode};

/// Cache over in-process nodes with the given weights.
///
/// The nodes are returned too so tests can inspect where keys landed.
pub fn memory_kv(weights: &[u32]) -> (KvStore, Vec<Arc<MemoryNode>>) {
    let nodes: Vec<Arc<MemoryNode>> = (0..weights.len())
        .map(|i| Arc::new(MemoryNode::new(format!("mem-{i}"))))
        .collect();
    let kv = KvStore::from_nodes(
        nodes
            .iter()
            .zip(weights)
            .map(|(node, weight)| (Arc::clone(node) as Arc<dyn KvNode>, *weight))
            .collect(),
    )
    .expect("valid memory topology");
    (kv, nodes)
}
