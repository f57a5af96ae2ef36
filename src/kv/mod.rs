//! Distributed key-value cache.
//!
//! [`KvStore`] is one logical handle over a weighted set of cache nodes.
//! Every key is owned by exactly one node, chosen through a consistent-hash
//! ring ([`ring::HashRing`]) so a node's share of keys follows its weight.
//!
//! # Example
//!
//! ```no_run
//! use easyswap_sync::kv::{KvStore, NodeConf, NodeKind};
//!
//! # async fn demo() -> easyswap_sync::error::Result<()> {
//! let kv = KvStore::connect(&[
//!     NodeConf::new("10.0.0.1:6379", NodeKind::Node),
//!     NodeConf::new("10.0.0.2:6379", NodeKind::Node).with_weight(4),
//! ])?;
//! kv.set("cache:es:demo", "1").await?;
//! # Ok(())
//! # }
//! ```

mod memory;
mod node;
mod redis_node;
pub mod ring;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};

pub use memory::MemoryNode;
pub use node::{NodeConf, NodeKind, DEFAULT_NODE_WEIGHT, MAX_NODE_WEIGHT};
pub use redis_node::RedisNode;
use ring::HashRing;

/// A single cache backend.
#[async_trait]
pub trait KvNode: Send + Sync {
    /// Display name, free of credentials.
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Returns whether it existed.
    async fn del(&self, key: &str) -> Result<bool>;
}

/// Placement of one node in the ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTopology {
    pub name: String,
    pub weight: u32,
    pub virtual_nodes: usize,
}

struct KvInner {
    nodes: Vec<Arc<dyn KvNode>>,
    ring: HashRing,
}

/// Weighted, sharded cache handle. Cheap to clone.
#[derive(Clone)]
pub struct KvStore {
    inner: Arc<KvInner>,
}

impl KvStore {
    /// Build the cache topology from node descriptors.
    ///
    /// # Errors
    ///
    /// Fails if the list is empty, a weight is zero or above
    /// [`MAX_NODE_WEIGHT`], or a host cannot be
    /// turned into a connection URL.
    pub fn connect(nodes: &[NodeConf]) -> Result<Self> {
        let mut built: Vec<(Arc<dyn KvNode>, u32)> = Vec::with_capacity(nodes.len());
        for conf in nodes {
            let node: Arc<dyn KvNode> = match conf.kind {
                NodeKind::Memory => Arc::new(MemoryNode::new(conf.host.clone())),
                NodeKind::Node | NodeKind::Cluster => Arc::new(RedisNode::new(conf)?),
            };
            built.push((node, conf.weight));
        }
        Self::from_nodes(built)
    }

    /// Build a store over already constructed nodes.
    pub fn from_nodes(nodes: Vec<(Arc<dyn KvNode>, u32)>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(Error::construction("cache", "no cache nodes configured"));
        }
        if let Some((node, weight)) = nodes
            .iter()
            .find(|(_, weight)| !(1..=MAX_NODE_WEIGHT).contains(weight))
        {
            return Err(Error::construction(
                "cache",
                format!(
                    "node {} has weight {weight}, expected 1..={MAX_NODE_WEIGHT}",
                    node.name()
                ),
            ));
        }

        let ring = HashRing::new(nodes.iter().map(|(node, weight)| (node.name(), *weight)));
        let nodes = nodes.into_iter().map(|(node, _)| node).collect();

        Ok(Self {
            inner: Arc::new(KvInner { nodes, ring }),
        })
    }

    fn node(&self, key: &str) -> Result<&Arc<dyn KvNode>> {
        self.inner
            .ring
            .locate(key)
            .and_then(|index| self.inner.nodes.get(index))
            .ok_or_else(|| Error::Cache("cache ring is empty".into()))
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        self.node(key)?.get(key).await
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.node(key)?.set(key, value).await
    }

    pub async fn del(&self, key: &str) -> Result<bool> {
        self.node(key)?.del(key).await
    }

    /// Name of the node that owns `key`.
    #[must_use]
    pub fn node_for(&self, key: &str) -> Option<&str> {
        self.node(key).ok().map(|node| node.name())
    }

    /// All nodes with their weights and ring share.
    #[must_use]
    pub fn topology(&self) -> Vec<NodeTopology> {
        self.inner
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| NodeTopology {
                name: node.name().to_string(),
                weight: self.inner.ring.weight(index).unwrap_or_default(),
                virtual_nodes: self.inner.ring.virtual_nodes(index),
            })
            .collect()
    }
}

impl std::fmt::Debug for KvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvStore")
            .field("nodes", &self.topology())
            .finish()
    }
}
