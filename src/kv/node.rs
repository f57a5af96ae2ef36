//! Cache node descriptors.

use std::fmt;

use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};

/// Weight given to configured nodes that do not declare one.
pub const DEFAULT_NODE_WEIGHT: u32 = 2;

/// Largest accepted node weight. Each unit of weight places
/// [`VIRTUAL_NODES_PER_WEIGHT`](super::ring::VIRTUAL_NODES_PER_WEIGHT)
/// points on the ring.
pub const MAX_NODE_WEIGHT: u32 = 1_000;

fn default_weight() -> u32 {
    DEFAULT_NODE_WEIGHT
}

/// How a cache node is reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A single Redis server.
    #[default]
    #[serde(alias = "single")]
    Node,
    /// A Redis cluster reached through one seed address.
    Cluster,
    /// In-process map, for local runs without Redis.
    Memory,
}

/// One entry of the cache topology.
#[derive(Clone, Deserialize)]
pub struct NodeConf {
    /// `host:port`, or a full `redis://` URL.
    pub host: String,
    #[serde(rename = "type", default)]
    pub kind: NodeKind,
    #[serde(default)]
    pub pass: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

impl NodeConf {
    pub fn new(host: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            host: host.into(),
            kind,
            pass: String::new(),
            weight: DEFAULT_NODE_WEIGHT,
        }
    }

    #[must_use]
    pub fn with_pass(mut self, pass: impl Into<String>) -> Self {
        self.pass = pass.into();
        self
    }

    #[must_use]
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// Connection URL including the credential.
    ///
    /// The returned value carries the password; never log it.
    pub fn redis_url(&self) -> Result<Url> {
        let raw = if self.host.contains("://") {
            self.host.clone()
        } else {
            format!("redis://{}", self.host)
        };
        let mut url = Url::parse(&raw)
            .map_err(|e| Error::construction("cache", format!("invalid host {}: {e}", self.host)))?;
        if !self.pass.is_empty() && url.set_password(Some(&self.pass)).is_err() {
            return Err(Error::construction(
                "cache",
                format!("cannot attach credential to {}", self.host),
            ));
        }
        Ok(url)
    }
}

impl fmt::Debug for NodeConf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeConf")
            .field("host", &self.host)
            .field("kind", &self.kind)
            .field("pass", &if self.pass.is_empty() { "" } else { "****" })
            .field("weight", &self.weight)
            .finish()
    }
}
