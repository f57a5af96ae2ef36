#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use easyswap_sync::chain::ChainClient;
use easyswap_sync::config::Config;
use easyswap_sync::domain::ProjectScope;
use easyswap_sync::error::Result;
use easyswap_sync::service::{Service, ServiceBuilder};
use easyswap_sync::testkit::chain::MockChainClient;
use easyswap_sync::testkit::config;
use easyswap_sync::testkit::db::TempDb;
use tokio_util::sync::CancellationToken;

/// Generous bound for anything a 10 ms loop should do.
pub const SETTLE: Duration = Duration::from_secs(5);

/// A service wired to a temp database and a mock chain.
pub struct Harness {
    pub db: TempDb,
    pub client: Arc<MockChainClient>,
    pub shutdown: CancellationToken,
    pub config: Config,
}

impl Harness {
    pub fn new(name: &str, chain_id: u64) -> Self {
        let db = TempDb::create(name);
        let config = config::config(chain_id, db.path());
        Self {
            db,
            client: Arc::new(MockChainClient::new(chain_id)),
            shutdown: CancellationToken::new(),
            config,
        }
    }

    pub fn scope(&self) -> ProjectScope {
        self.config.scope()
    }

    pub async fn build(&self) -> Result<Service> {
        let client: Arc<dyn ChainClient> = self.client.clone();
        ServiceBuilder::new(self.config.clone())
            .db_pool(self.db.pool().clone())
            .chain_client(client)
            .build(&self.shutdown)
            .await
    }

    /// Build and start, panicking on failure.
    pub async fn start(&self) -> Service {
        let mut service = self.build().await.expect("build service");
        service.start().await.expect("start service");
        service
    }
}

/// Poll `check` every 10 ms until it holds or `timeout` passes.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
