//! Order lifecycle bookkeeping.
//!
//! The order manager consumes [`OrderEvent`]s forwarded by the indexer and
//! keeps derived state current: per-collection floor prices in the cache
//! and expiry of stale orders in the store.
//!
//! ```text
//! OrderBookIndexer --(mpsc)--> OrderManager
//!                                   |
//!                                   +-- floor price  -> cache
//!                                   +-- expiry sweep -> store
//! ```

use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::supervisor::Supervisor;
use crate::config::OrderManagerConfig;
use crate::db::OrderStore;
use crate::domain::{normalize_address, OrderEvent, OrderSide, ProjectScope};
use crate::error::{Error, Result};
use crate::kv::KvStore;

/// Producer side of the order event queue.
pub type OrderEventSender = mpsc::Sender<OrderEvent>;

pub struct OrderManager {
    cancel: CancellationToken,
    store: OrderStore,
    kv: KvStore,
    scope: ProjectScope,
    config: OrderManagerConfig,
    sender: OrderEventSender,
    receiver: Mutex<Option<mpsc::Receiver<OrderEvent>>>,
}

impl std::fmt::Debug for OrderManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderManager")
            .field("scope", &self.scope)
            .field("config", &self.config)
            .field("started", &self.receiver.lock().is_none())
            .finish()
    }
}

impl OrderManager {
    /// Create the manager and its event queue. Nothing runs until
    /// [`OrderManager::start`].
    #[must_use]
    pub fn new(
        cancel: CancellationToken,
        store: OrderStore,
        kv: KvStore,
        scope: ProjectScope,
        config: OrderManagerConfig,
    ) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        Arc::new(Self {
            cancel,
            store,
            kv,
            scope,
            config,
            sender,
            receiver: Mutex::new(Some(receiver)),
        })
    }

    /// Queue handle for producers.
    #[must_use]
    pub fn sender(&self) -> OrderEventSender {
        self.sender.clone()
    }

    #[must_use]
    pub fn scope(&self) -> &ProjectScope {
        &self.scope
    }

    /// Cache key holding the floor price of `collection`.
    #[must_use]
    pub fn floor_key(&self, collection: &str) -> String {
        self.scope
            .cache_key(&format!("floor_price:{}", normalize_address(collection)))
    }

    /// Spawn the event loop on `supervisor` and return immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyStarted`] on a second call.
    pub fn start(self: &Arc<Self>, supervisor: &Arc<Supervisor>) -> Result<()> {
        let receiver = self.receiver.lock().take().ok_or(Error::AlreadyStarted)?;
        let manager = Arc::clone(self);
        supervisor.spawn("order_manager", manager.run(receiver));
        Ok(())
    }

    async fn run(self: Arc<Self>, mut receiver: mpsc::Receiver<OrderEvent>) -> Result<()> {
        info!(
            scope = %self.scope,
            expiry_check_ms = self.config.expiry_check_interval_ms,
            "Order manager started"
        );

        let mut expiry_tick = tokio::time::interval(self.config.expiry_check_interval());
        expiry_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    info!("Order manager shutting down");
                    break;
                }

                event = receiver.recv() => {
                    let Some(event) = event else {
                        debug!("Order event queue closed");
                        break;
                    };
                    self.handle_event(&event).await?;
                }

                _ = expiry_tick.tick() => {
                    self.expire_due(unix_now()).await?;
                }
            }
        }

        Ok(())
    }

    /// Apply one event to derived state.
    ///
    /// # Errors
    ///
    /// Store failures are returned. Cache failures are logged and skipped.
    pub async fn handle_event(&self, event: &OrderEvent) -> Result<()> {
        match event {
            OrderEvent::Created {
                order_id,
                collection,
                side: OrderSide::List,
                price,
                ..
            } => {
                debug!(
                    order_id = %order_id,
                    collection = %collection,
                    price = %price,
                    "Listing created"
                );
                self.lower_floor(collection, *price).await?;
            }
            OrderEvent::Created { order_id, .. } => {
                debug!(order_id = %order_id, "Bid created");
            }
            OrderEvent::Cancelled {
                order_id,
                collection,
            } => {
                debug!(order_id = %order_id, collection = %collection, "Order cancelled");
                self.refresh_floor(collection).await?;
            }
            OrderEvent::Matched {
                make_order_id,
                take_order_id,
                collection,
                price,
            } => {
                debug!(
                    make_order_id = %make_order_id,
                    take_order_id = %take_order_id,
                    collection = %collection,
                    price = %price,
                    "Orders matched"
                );
                self.refresh_floor(collection).await?;
            }
        }
        Ok(())
    }

    /// Expire every order due at `now` (unix seconds) and refresh the floor
    /// of each affected collection. Returns the number of collections
    /// touched.
    pub async fn expire_due(&self, now: u64) -> Result<usize> {
        let affected = self.store.expire_orders(&self.scope, now).await?;
        if !affected.is_empty() {
            info!(collections = affected.len(), "Expired overdue orders");
        }
        for collection in &affected {
            self.refresh_floor(collection).await?;
        }
        Ok(affected.len())
    }

    /// Cached floor price of `collection`, if any.
    pub async fn cached_floor(&self, collection: &str) -> Result<Option<Decimal>> {
        let Some(raw) = self.kv.get(&self.floor_key(collection)).await? else {
            return Ok(None);
        };
        Decimal::from_str(&raw)
            .map(Some)
            .map_err(|e| Error::Parse(format!("cached floor price {raw:?}: {e}")))
    }

    /// Lower the cached floor to `price` when it undercuts it. Without a
    /// usable cached floor the store is the only source of truth.
    async fn lower_floor(&self, collection: &str, price: Decimal) -> Result<()> {
        let current = match self.cached_floor(collection).await {
            Ok(Some(current)) => current,
            Ok(None) => return self.refresh_floor(collection).await,
            Err(e) => {
                warn!(collection = %collection, error = %e, "Failed to read floor price");
                return self.refresh_floor(collection).await;
            }
        };
        if current <= price {
            return Ok(());
        }
        if let Err(e) = self
            .kv
            .set(&self.floor_key(collection), &price.normalize().to_string())
            .await
        {
            warn!(collection = %collection, error = %e, "Failed to write floor price");
        }
        Ok(())
    }

    async fn refresh_floor(&self, collection: &str) -> Result<()> {
        let floor = self.store.floor_price(&self.scope, collection).await?;
        let key = self.floor_key(collection);
        let written = match floor {
            Some(price) => self.kv.set(&key, &price.normalize().to_string()).await,
            None => self.kv.del(&key).await.map(|_| ()),
        };
        if let Err(e) = written {
            warn!(collection = %collection, error = %e, "Failed to refresh floor price");
        }
        Ok(())
    }
}

fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rust_decimal_macros::dec;

    use super::*;
    use crate::config::DbConfig;
    use crate::db::model::OrderRow;
    use crate::db::{create_pool, run_migrations};
    use crate::domain::OrderStatus;
    use crate::kv::{KvNode, MemoryNode};

    fn manager() -> Arc<OrderManager> {
        let pool = create_pool(&DbConfig {
            path: ":memory:".into(),
            max_connections: 1,
            connect_timeout_ms: 1_000,
        })
        .unwrap();
        run_migrations(&pool).unwrap();
        let node: Arc<dyn KvNode> = Arc::new(MemoryNode::new("mem"));
        let kv = KvStore::from_nodes(vec![(node, 2)]).unwrap();
        OrderManager::new(
            CancellationToken::new(),
            crate::db::OrderStore::new(pool),
            kv,
            ProjectScope::new("sepolia", "easyswap"),
            OrderManagerConfig {
                expiry_check_interval_ms: 20,
                queue_capacity: 8,
            },
        )
    }

    fn listing(id: &str, price: &str, expiry: i64) -> OrderRow {
        OrderRow {
            order_id: id.into(),
            chain: "sepolia".into(),
            project: "easyswap".into(),
            collection: "0xc0".into(),
            token_id: "1".into(),
            side: OrderSide::List.as_i32(),
            sale_kind: 1,
            maker: "0xmaker".into(),
            price: price.into(),
            expiry,
            salt: "1".into(),
            status: OrderStatus::Active.as_i32(),
            block_number: 1,
            updated_at: String::new(),
        }
    }

    fn created(id: &str, price: Decimal) -> OrderEvent {
        OrderEvent::Created {
            order_id: id.into(),
            collection: "0xC0".into(),
            token_id: "1".into(),
            side: OrderSide::List,
            price,
            expiry: 0,
        }
    }

    #[test]
    fn floor_key_is_scoped() {
        assert_eq!(
            manager().floor_key("0xC0"),
            "cache:es:easyswap:sepolia:floor_price:0xc0"
        );
    }

    async fn list(manager: &OrderManager, id: &str, price: Decimal) {
        manager
            .store
            .insert_order(&listing(id, &price.to_string(), 0))
            .await
            .unwrap();
        manager.handle_event(&created(id, price)).await.unwrap();
    }

    #[tokio::test]
    async fn listing_only_lowers_floor() {
        let manager = manager();
        list(&manager, "0x01", dec!(2)).await;
        list(&manager, "0x02", dec!(3)).await;
        assert_eq!(manager.cached_floor("0xc0").await.unwrap(), Some(dec!(2)));

        list(&manager, "0x03", dec!(1.25)).await;
        assert_eq!(
            manager.cached_floor("0xc0").await.unwrap(),
            Some(dec!(1.25))
        );
    }

    #[tokio::test]
    async fn cold_cache_takes_floor_from_store() {
        let manager = manager();
        manager.store.insert_order(&listing("0x01", "1", 0)).await.unwrap();
        manager.store.insert_order(&listing("0x02", "2", 0)).await.unwrap();

        manager.handle_event(&created("0x02", dec!(2))).await.unwrap();
        assert_eq!(manager.cached_floor("0xc0").await.unwrap(), Some(dec!(1)));
    }

    #[tokio::test]
    async fn cancel_recomputes_floor_from_store() {
        let manager = manager();
        manager.store.insert_order(&listing("0x01", "1", 0)).await.unwrap();
        manager.store.insert_order(&listing("0x02", "4", 0)).await.unwrap();
        manager.handle_event(&created("0x01", dec!(1))).await.unwrap();

        manager
            .store
            .update_order_status(&manager.scope, "0x01", OrderStatus::Cancelled)
            .await
            .unwrap();
        manager
            .handle_event(&OrderEvent::Cancelled {
                order_id: "0x01".into(),
                collection: "0xc0".into(),
            })
            .await
            .unwrap();
        assert_eq!(manager.cached_floor("0xc0").await.unwrap(), Some(dec!(4)));

        manager
            .store
            .update_order_status(&manager.scope, "0x02", OrderStatus::Filled)
            .await
            .unwrap();
        manager
            .handle_event(&OrderEvent::Matched {
                make_order_id: "0x02".into(),
                take_order_id: "0x99".into(),
                collection: "0xc0".into(),
                price: dec!(4),
            })
            .await
            .unwrap();
        assert_eq!(manager.cached_floor("0xc0").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expiry_sweep_refreshes_floor() {
        let manager = manager();
        manager.store.insert_order(&listing("0x01", "1", 100)).await.unwrap();
        manager.store.insert_order(&listing("0x02", "5", 0)).await.unwrap();
        manager.handle_event(&created("0x01", dec!(1))).await.unwrap();

        assert_eq!(manager.expire_due(50).await.unwrap(), 0);
        assert_eq!(manager.expire_due(100).await.unwrap(), 1);
        assert_eq!(manager.cached_floor("0xc0").await.unwrap(), Some(dec!(5)));
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let manager = manager();
        let supervisor = Arc::new(Supervisor::new(manager.cancel.clone()));
        manager.start(&supervisor).unwrap();
        assert!(matches!(
            manager.start(&supervisor),
            Err(Error::AlreadyStarted)
        ));
        manager.cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), supervisor.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn queued_events_are_applied_by_the_loop() {
        let manager = manager();
        let supervisor = Arc::new(Supervisor::new(manager.cancel.clone()));
        manager.start(&supervisor).unwrap();

        manager.store.insert_order(&listing("0x01", "7", 0)).await.unwrap();
        manager.sender().send(created("0x01", dec!(7))).await.unwrap();

        let mut floor = None;
        for _ in 0..100 {
            floor = manager.cached_floor("0xc0").await.unwrap();
            if floor.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(floor, Some(dec!(7)));

        manager.cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), supervisor.wait())
            .await
            .unwrap();
        assert_eq!(supervisor.running(), 0);
    }
}
