//! In-memory set of collections the indexer cares about.

use std::collections::HashSet;

use parking_lot::RwLock;
use tracing::info;

use crate::db::OrderStore;
use crate::domain::{normalize_address, ProjectScope};
use crate::error::Result;

/// Tracked NFT collections of one (chain, project) scope.
///
/// Lookups take a read lock, so the indexer can check membership while the
/// set is being extended.
#[derive(Debug)]
pub struct CollectionFilter {
    store: OrderStore,
    scope: ProjectScope,
    collections: RwLock<HashSet<String>>,
}

impl CollectionFilter {
    #[must_use]
    pub fn new(store: OrderStore, scope: ProjectScope) -> Self {
        Self {
            store,
            scope,
            collections: RwLock::new(HashSet::new()),
        }
    }

    /// Replace the in-memory set with the collections stored for the scope.
    ///
    /// # Errors
    ///
    /// Returns the store error unchanged; the set is left as it was.
    pub async fn preload_collections(&self) -> Result<()> {
        let addresses = self.store.tracked_collections(&self.scope).await?;
        let loaded: HashSet<String> = addresses.iter().map(|a| normalize_address(a)).collect();
        let count = loaded.len();
        *self.collections.write() = loaded;
        info!(scope = %self.scope, count, "Preloaded tracked collections");
        Ok(())
    }

    #[must_use]
    pub fn is_tracked(&self, address: &str) -> bool {
        self.collections.read().contains(&normalize_address(address))
    }

    /// Start tracking `address`. Returns `false` if it was already tracked.
    pub fn add(&self, address: &str) -> bool {
        self.collections.write().insert(normalize_address(address))
    }

    pub fn remove(&self, address: &str) -> bool {
        self.collections.write().remove(&normalize_address(address))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.collections.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collections.read().is_empty()
    }

    /// Snapshot of the tracked set, sorted.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        let mut all: Vec<String> = self.collections.read().iter().cloned().collect();
        all.sort_unstable();
        all
    }

    #[must_use]
    pub fn scope(&self) -> &ProjectScope {
        &self.scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DbConfig;
    use crate::db::{create_pool, run_migrations};

    fn store() -> OrderStore {
        let pool = create_pool(&DbConfig {
            path: ":memory:".into(),
            max_connections: 1,
            connect_timeout_ms: 1_000,
        })
        .unwrap();
        run_migrations(&pool).unwrap();
        OrderStore::new(pool)
    }

    #[tokio::test]
    async fn preload_replaces_in_memory_set() {
        let store = store();
        let scope = ProjectScope::new("sepolia", "easyswap");
        store.insert_collection(&scope, "0xAAA", "a").await.unwrap();

        let filter = CollectionFilter::new(store.clone(), scope.clone());
        filter.add("0xstale");
        filter.preload_collections().await.unwrap();

        assert_eq!(filter.snapshot(), vec!["0xaaa"]);
        assert!(filter.is_tracked("0xAaA"));
        assert!(!filter.is_tracked("0xstale"));
    }

    #[test]
    fn add_and_remove_are_case_insensitive() {
        let filter = CollectionFilter::new(store(), ProjectScope::new("eth", "easyswap"));
        assert!(filter.is_empty());
        assert!(filter.add("0xABC"));
        assert!(!filter.add("0xabc"));
        assert_eq!(filter.len(), 1);
        assert!(filter.remove("0xAbc"));
        assert!(!filter.is_tracked("0xabc"));
    }
}
