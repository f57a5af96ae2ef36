//! Service composition root.
//!
//! Builds the cache, the store, the chain client and the three background
//! subsystems, then starts them in dependency order.
//!
//! # Architecture
//!
//! ```text
//! Config --> KvStore, OrderStore --> CollectionFilter, OrderManager
//!                                          |
//!              ChainClient --------> OrderBookIndexer (per chain)
//!                                          |
//!                                  (OrderEvent mpsc) --> OrderManager
//! ```
//!
//! [`Service::start`] warms the collection filter before any loop runs, so
//! the indexer never sees an empty filter.
//!
//! # Example
//!
//! ```no_run
//! use easyswap_sync::config::Config;
//! use easyswap_sync::service::Service;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> easyswap_sync::error::Result<()> {
//! let config = Config::load("config.toml")?;
//! let shutdown = CancellationToken::new();
//! let mut service = Service::new(&shutdown, config).await?;
//! service.start().await?;
//! service.cancelled().await;
//! service.shutdown(std::time::Duration::from_secs(30)).await?;
//! # Ok(())
//! # }
//! ```

pub mod collection_filter;
pub mod order_manager;
pub mod orderbook_indexer;
pub mod supervisor;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::chain::{new_chain_client, rpc_endpoint, ChainClient, ChainIdentity};
use crate::config::Config;
use crate::db::{create_pool, run_migrations, DbPool, OrderStore};
use crate::domain::ProjectScope;
use crate::error::{Error, Result};
use crate::kv::KvStore;

pub use collection_filter::CollectionFilter;
pub use order_manager::{OrderEventSender, OrderManager};
pub use orderbook_indexer::{IndexerDeps, IndexerSettings, OrderBookIndexer};
pub use supervisor::Supervisor;

/// Lifecycle state of a [`Service`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Built; no loop running.
    Constructed,
    /// Loops launched.
    Running,
}

/// Builds a [`Service`], optionally around pre-built collaborators.
pub struct ServiceBuilder {
    config: Config,
    kv: Option<KvStore>,
    pool: Option<DbPool>,
    chain_client: Option<Arc<dyn ChainClient>>,
}

impl ServiceBuilder {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            kv: None,
            pool: None,
            chain_client: None,
        }
    }

    /// Use `kv` instead of connecting to `kv.redis`.
    #[must_use]
    pub fn kv_store(mut self, kv: KvStore) -> Self {
        self.kv = Some(kv);
        self
    }

    /// Use `pool` instead of opening `db.path`. Migrations still run.
    #[must_use]
    pub fn db_pool(mut self, pool: DbPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Use `client` instead of dialing the configured RPC endpoint.
    #[must_use]
    pub fn chain_client(mut self, client: Arc<dyn ChainClient>) -> Self {
        self.chain_client = Some(client);
        self
    }

    /// Construct the whole service graph.
    ///
    /// The service's root token is a child of `parent`: cancelling `parent`
    /// stops the service, while a failing loop only cancels the service.
    ///
    /// # Errors
    ///
    /// The first failing step is returned and nothing is spawned.
    pub async fn build(self, parent: &CancellationToken) -> Result<Service> {
        let config = self.config;
        let scope = config.scope();
        let chain = config.chain();

        let kv = match self.kv {
            Some(kv) => kv,
            None => KvStore::connect(&config.kv.redis)?,
        };
        for node in kv.topology() {
            info!(node = %node.name, weight = node.weight, "Cache node configured");
        }

        let pool = match self.pool {
            Some(pool) => pool,
            None => create_pool(&config.db)?,
        };
        run_migrations(&pool)?;
        let store = OrderStore::new(pool);

        let filter = Arc::new(CollectionFilter::new(store.clone(), scope.clone()));

        let root = parent.child_token();
        let supervisor = Arc::new(Supervisor::new(root.clone()));

        let order_manager = OrderManager::new(
            root.child_token(),
            store.clone(),
            kv.clone(),
            scope.clone(),
            config.order_manager.clone(),
        );

        let client = match self.chain_client {
            Some(client) => {
                if client.chain_id() != chain.id {
                    return Err(Error::construction(
                        "chain client",
                        format!(
                            "client serves chain {}, configured chain is {}",
                            client.chain_id(),
                            chain.id
                        ),
                    ));
                }
                client
            }
            None => {
                let endpoint = rpc_endpoint(&config.ankr_cfg.https_url, &config.ankr_cfg.api_key)?;
                info!(
                    chain_id = chain.id,
                    chain_name = %chain.name,
                    host = endpoint.host(),
                    "Connecting chain client"
                );
                new_chain_client(chain.id, &endpoint).await?
            }
        };

        let indexer = orderbook_indexer::new(
            &chain,
            root.child_token(),
            IndexerSettings::from_config(&config)?,
            IndexerDeps {
                store: store.clone(),
                kv: kv.clone(),
                client,
                filter: Arc::clone(&filter),
                orders: order_manager.sender(),
            },
        );

        info!(
            scope = %scope,
            chain = %chain,
            indexer = indexer.is_some(),
            "Service constructed"
        );

        Ok(Service {
            scope,
            chain,
            state: ServiceState::Constructed,
            supervisor,
            kv,
            store,
            filter,
            order_manager,
            indexer,
        })
    }
}

/// Owns every subsystem and drives their lifecycle.
pub struct Service {
    scope: ProjectScope,
    chain: ChainIdentity,
    state: ServiceState,
    supervisor: Arc<Supervisor>,
    kv: KvStore,
    store: OrderStore,
    filter: Arc<CollectionFilter>,
    order_manager: Arc<OrderManager>,
    indexer: Option<Arc<OrderBookIndexer>>,
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("scope", &self.scope)
            .field("chain", &self.chain)
            .field("state", &self.state)
            .field("indexer", &self.indexer.is_some())
            .field("running_loops", &self.running_loops())
            .finish()
    }
}

impl Service {
    /// Build the service from configuration alone.
    pub async fn new(shutdown: &CancellationToken, config: Config) -> Result<Self> {
        ServiceBuilder::new(config).build(shutdown).await
    }

    /// Warm the collection filter, then launch the order manager and the
    /// indexer (when the chain has one). Returns once the loops are spawned.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyStarted`] if the service or its order manager is
    ///   already running; no indexer is spawned in that case.
    /// - [`Error::Preload`] if the filter could not be loaded; no loop is
    ///   spawned and `start` may be retried.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != ServiceState::Constructed {
            return Err(Error::AlreadyStarted);
        }

        if let Err(e) = self.filter.preload_collections().await {
            error!(scope = %self.scope, error = %e, "Failed on preload collection to filter");
            return Err(Error::Preload(e.to_string()));
        }

        // The order manager claims its queue first; if that fails nothing runs.
        self.order_manager.start(&self.supervisor)?;
        if let Some(indexer) = &self.indexer {
            indexer.start(&self.supervisor);
        }

        self.state = ServiceState::Running;
        info!(loops = self.running_loops(), "Service started");
        Ok(())
    }

    /// Ask every loop to stop. Does not wait.
    pub fn cancel(&self) {
        self.supervisor.token().cancel();
    }

    /// Resolves once the service is cancelled, by its parent token, by
    /// [`Service::cancel`], or by a failing loop.
    pub async fn cancelled(&self) {
        self.supervisor.token().cancelled().await;
    }

    /// Wait until every loop has exited.
    pub async fn wait(&self) {
        self.supervisor.wait().await;
    }

    /// Cancel and wait at most `timeout` for the loops to exit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShutdownTimedOut`] if loops are still running.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.cancel();
        if tokio::time::timeout(timeout, self.wait()).await.is_err() {
            return Err(Error::ShutdownTimedOut {
                outstanding: self.running_loops(),
            });
        }
        info!("Service stopped");
        Ok(())
    }

    /// Number of background loops still running.
    #[must_use]
    pub fn running_loops(&self) -> usize {
        self.supervisor.running()
    }

    /// First fatal loop error, if any.
    #[must_use]
    pub fn failure(&self) -> Option<String> {
        self.supervisor.failure()
    }

    #[must_use]
    pub fn state(&self) -> ServiceState {
        self.state
    }

    #[must_use]
    pub fn has_indexer(&self) -> bool {
        self.indexer.is_some()
    }

    #[must_use]
    pub fn indexer(&self) -> Option<&Arc<OrderBookIndexer>> {
        self.indexer.as_ref()
    }

    #[must_use]
    pub fn collection_filter(&self) -> &Arc<CollectionFilter> {
        &self.filter
    }

    #[must_use]
    pub fn order_manager(&self) -> &Arc<OrderManager> {
        &self.order_manager
    }

    #[must_use]
    pub fn kv(&self) -> &KvStore {
        &self.kv
    }

    #[must_use]
    pub fn store(&self) -> &OrderStore {
        &self.store
    }

    #[must_use]
    pub fn scope(&self) -> &ProjectScope {
        &self.scope
    }

    #[must_use]
    pub fn chain(&self) -> &ChainIdentity {
        &self.chain
    }
}
