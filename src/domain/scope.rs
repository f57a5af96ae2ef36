//! Deployment scope shared by every subsystem.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A (chain, project) pair.
///
/// Scopes store rows, cache keys, and the tracked-collection set so several
/// deployments can share one database and one cache cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectScope {
    chain: String,
    project: String,
}

impl ProjectScope {
    /// Create a new scope from a chain name and a project name.
    pub fn new(chain: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            chain: chain.into(),
            project: project.into(),
        }
    }

    #[must_use]
    pub fn chain(&self) -> &str {
        &self.chain
    }

    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Build a cache key inside this scope.
    ///
    /// Keys follow `cache:es:{project}:{chain}:{suffix}`.
    #[must_use]
    pub fn cache_key(&self, suffix: &str) -> String {
        format!("cache:es:{}:{}:{}", self.project, self.chain, suffix)
    }
}

impl fmt::Display for ProjectScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project, self.chain)
    }
}

/// Lowercase an address string so lookups are case-insensitive.
#[must_use]
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}
