//! Order-book chain indexer.
//!
//! Follows the order-book contract block range by block range, persists
//! orders and activities for tracked collections, and forwards every order
//! state change to the [`OrderManager`](super::order_manager::OrderManager).
//!
//! Only networks with a known [`ChainKind`] get an indexer.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use alloy_rpc_types_eth::Log;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::collection_filter::CollectionFilter;
use super::order_manager::OrderEventSender;
use super::supervisor::Supervisor;
use crate::chain::events::{
    address_hex, decode_log, order_key, wei_to_eth, LogCancel, LogMake, LogMatch, OrderBookLog,
};
use crate::chain::{ChainClient, ChainIdentity, ChainKind, LogQuery};
use crate::config::Config;
use crate::db::model::{NewActivityRow, OrderRow};
use crate::db::OrderStore;
use crate::domain::{ActivityKind, OrderEvent, OrderSide, OrderStatus, ProjectScope, SaleKind};
use crate::error::{Error, Result};
use crate::kv::KvStore;

/// Indexer tuning taken from configuration.
#[derive(Debug, Clone)]
pub struct IndexerSettings {
    pub dex_address: Address,
    pub start_block: u64,
    pub batch_size: u64,
    pub poll_interval: Duration,
    pub auto_track_collections: bool,
}

impl IndexerSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            dex_address: config.contract_cfg.dex_address()?,
            start_block: config.sync.start_block,
            batch_size: config.sync.batch_size.max(1),
            poll_interval: config.sync.poll_interval(),
            auto_track_collections: config.sync.auto_track_collections,
        })
    }
}

/// Collaborators shared with the rest of the service.
pub struct IndexerDeps {
    pub store: OrderStore,
    pub kv: KvStore,
    pub client: Arc<dyn ChainClient>,
    pub filter: Arc<CollectionFilter>,
    pub orders: OrderEventSender,
}

pub struct OrderBookIndexer {
    kind: ChainKind,
    chain: ChainIdentity,
    cancel: CancellationToken,
    settings: IndexerSettings,
    store: OrderStore,
    kv: KvStore,
    client: Arc<dyn ChainClient>,
    filter: Arc<CollectionFilter>,
    orders: OrderEventSender,
}

impl std::fmt::Debug for OrderBookIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBookIndexer")
            .field("kind", &self.kind)
            .field("chain", &self.chain)
            .field("settings", &self.settings)
            .finish()
    }
}

/// Build the indexer variant for `chain`.
///
/// Returns `None` for networks without an order-book deployment.
pub fn new(
    chain: &ChainIdentity,
    cancel: CancellationToken,
    settings: IndexerSettings,
    deps: IndexerDeps,
) -> Option<Arc<OrderBookIndexer>> {
    let Some(kind) = chain.kind() else {
        warn!(
            chain_id = chain.id,
            chain_name = %chain.name,
            "No order-book indexer for this chain"
        );
        return None;
    };

    Some(Arc::new(OrderBookIndexer {
        kind,
        chain: chain.clone(),
        cancel,
        settings,
        store: deps.store,
        kv: deps.kv,
        client: deps.client,
        filter: deps.filter,
        orders: deps.orders,
    }))
}

impl OrderBookIndexer {
    #[must_use]
    pub fn kind(&self) -> ChainKind {
        self.kind
    }

    fn scope(&self) -> &ProjectScope {
        self.filter.scope()
    }

    /// Cache key holding the last indexed block.
    #[must_use]
    pub fn sync_height_key(&self) -> String {
        self.scope().cache_key("sync_height")
    }

    /// Spawn the indexing loop on `supervisor` and return immediately.
    pub fn start(self: &Arc<Self>, supervisor: &Arc<Supervisor>) {
        let indexer = Arc::clone(self);
        supervisor.spawn("orderbook_indexer", indexer.run());
    }

    async fn run(self: Arc<Self>) -> Result<()> {
        let mut next = match self.store.last_indexed_block(self.scope()).await? {
            Some(last) => last.saturating_add(1),
            None => self.settings.start_block,
        };
        info!(
            chain = %self.chain,
            kind = %self.kind,
            contract = %self.settings.dex_address,
            from_block = next,
            "Order-book indexer started"
        );

        loop {
            let head = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                head = self.client.block_number() => head,
            };
            let head = match head {
                Ok(head) => head,
                Err(e) => {
                    warn!(error = %e, "Failed to fetch block number");
                    if !self.pause().await {
                        break;
                    }
                    continue;
                }
            };

            let Some(safe_head) = head.checked_sub(self.kind.confirmations()) else {
                if !self.pause().await {
                    break;
                }
                continue;
            };
            if next > safe_head {
                if !self.pause().await {
                    break;
                }
                continue;
            }

            let to_block = safe_head.min(next.saturating_add(self.settings.batch_size - 1));
            let query = LogQuery {
                address: self.settings.dex_address,
                from_block: next,
                to_block,
            };
            let logs = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                logs = self.client.logs(&query) => logs,
            };
            let logs = match logs {
                Ok(logs) => logs,
                Err(e) => {
                    warn!(from_block = next, to_block, error = %e, "Failed to fetch logs");
                    if !self.pause().await {
                        break;
                    }
                    continue;
                }
            };

            debug!(from_block = next, to_block, logs = logs.len(), "Indexing block range");
            for log in &logs {
                self.handle_log(log).await?;
            }

            self.store.save_indexed_block(self.scope(), to_block).await?;
            if let Err(e) = self
                .kv
                .set(&self.sync_height_key(), &to_block.to_string())
                .await
            {
                warn!(error = %e, "Failed to cache sync height");
            }
            next = to_block + 1;
        }

        info!("Order-book indexer shutting down");
        Ok(())
    }

    /// Sleep one poll interval. Returns `false` if cancelled meanwhile.
    async fn pause(&self) -> bool {
        tokio::select! {
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(self.settings.poll_interval) => true,
        }
    }

    /// Persist one log and forward the resulting order event.
    ///
    /// Undecodable logs are skipped. Store failures are returned.
    pub async fn handle_log(&self, log: &Log) -> Result<()> {
        let event = match decode_log(log) {
            Ok(Some(event)) => event,
            Ok(None) => return Ok(()),
            Err(e) => {
                warn!(
                    block = log.block_number.unwrap_or_default(),
                    log_index = log.log_index.unwrap_or_default(),
                    error = %e,
                    "Skipping undecodable log"
                );
                return Ok(());
            }
        };

        let forwarded = match event {
            OrderBookLog::Make(make) => self.handle_make(log, &make).await?,
            OrderBookLog::Cancel(cancel) => self.handle_cancel(log, &cancel).await?,
            OrderBookLog::Match(matched) => self.handle_match(log, &matched).await?,
        };

        if let Some(event) = forwarded {
            self.forward(event).await;
        }
        Ok(())
    }

    async fn handle_make(&self, log: &Log, make: &LogMake) -> Result<Option<OrderEvent>> {
        let collection = address_hex(make.nft.collection);
        if !self.ensure_tracked(&collection).await? {
            return Ok(None);
        }

        let order_id = order_key(make.orderKey);
        let (Some(side), Some(sale_kind)) =
            (OrderSide::from_u8(make.side), SaleKind::from_u8(make.saleKind))
        else {
            warn!(
                order_id = %order_id,
                side = make.side,
                sale_kind = make.saleKind,
                "Unknown order kind"
            );
            return Ok(None);
        };
        let price = match wei_to_eth(make.price) {
            Ok(price) => price,
            Err(e) => {
                warn!(order_id = %order_id, error = %e, "Skipping order with unusable price");
                return Ok(None);
            }
        };

        let token_id = make.nft.tokenId.to_string();
        let maker = address_hex(make.maker);
        let now = Utc::now().to_rfc3339();
        let inserted = self
            .store
            .insert_order(&OrderRow {
                order_id: order_id.clone(),
                chain: self.scope().chain().to_string(),
                project: self.scope().project().to_string(),
                collection: collection.clone(),
                token_id: token_id.clone(),
                side: side.as_i32(),
                sale_kind: sale_kind.as_i32(),
                maker: maker.clone(),
                price: price.to_string(),
                expiry: i64::try_from(make.expiry).unwrap_or(i64::MAX),
                salt: make.salt.to_string(),
                status: OrderStatus::Active.as_i32(),
                block_number: block_of(log),
                updated_at: now,
            })
            .await?;

        self.record_activity(
            log,
            ActivityKind::from(side),
            &collection,
            &token_id,
            &maker,
            None,
            &price.to_string(),
        )
        .await?;

        if !inserted {
            debug!(order_id = %order_id, "Order already indexed");
            return Ok(None);
        }

        Ok(Some(OrderEvent::Created {
            order_id,
            collection,
            token_id,
            side,
            price,
            expiry: make.expiry,
        }))
    }

    async fn handle_cancel(&self, log: &Log, cancel: &LogCancel) -> Result<Option<OrderEvent>> {
        let order_id = order_key(cancel.orderKey);
        let Some(order) = self.store.order(self.scope(), &order_id).await? else {
            debug!(order_id = %order_id, "Cancel for unknown order");
            return Ok(None);
        };

        let updated = self
            .store
            .update_order_status(self.scope(), &order_id, OrderStatus::Cancelled)
            .await?;
        self.record_activity(
            log,
            ActivityKind::Cancel,
            &order.collection,
            &order.token_id,
            &address_hex(cancel.maker),
            None,
            &order.price,
        )
        .await?;

        Ok(updated.then(|| OrderEvent::Cancelled {
            order_id,
            collection: order.collection,
        }))
    }

    async fn handle_match(&self, log: &Log, matched: &LogMatch) -> Result<Option<OrderEvent>> {
        let make = &matched.makeOrder;
        let take = &matched.takeOrder;

        // A bid is filled by the seller's take order, which carries the token.
        let make_is_bid = OrderSide::from_u8(make.side) == Some(OrderSide::Bid);
        let (nft, seller, buyer) = if make_is_bid {
            (&take.nft, take.maker, make.maker)
        } else {
            (&make.nft, make.maker, take.maker)
        };

        let collection = address_hex(nft.collection);
        if !self.filter.is_tracked(&collection) {
            debug!(collection = %collection, "Match on untracked collection");
            return Ok(None);
        }

        let make_order_id = order_key(matched.makeOrderKey);
        let take_order_id = order_key(matched.takeOrderKey);
        let price = match wei_to_eth(matched.fillPrice) {
            Ok(price) => price,
            Err(e) => {
                warn!(order_id = %make_order_id, error = %e, "Skipping match with unusable price");
                return Ok(None);
            }
        };

        let make_filled = self
            .store
            .update_order_status(self.scope(), &make_order_id, OrderStatus::Filled)
            .await?;
        let take_filled = self
            .store
            .update_order_status(self.scope(), &take_order_id, OrderStatus::Filled)
            .await?;
        let seller = address_hex(seller);
        let buyer = address_hex(buyer);
        self.record_activity(
            log,
            ActivityKind::Sale,
            &collection,
            &nft.tokenId.to_string(),
            &seller,
            Some(buyer),
            &price.to_string(),
        )
        .await?;

        if !make_filled && !take_filled {
            debug!(make_order_id = %make_order_id, "Match already indexed");
            return Ok(None);
        }

        Ok(Some(OrderEvent::Matched {
            make_order_id,
            take_order_id,
            collection,
            price,
        }))
    }

    /// Whether events for `collection` should be indexed, tracking it first
    /// when auto-tracking is on.
    async fn ensure_tracked(&self, collection: &str) -> Result<bool> {
        if self.filter.is_tracked(collection) {
            return Ok(true);
        }
        if !self.settings.auto_track_collections {
            debug!(collection = %collection, "Skipping untracked collection");
            return Ok(false);
        }
        self.store
            .insert_collection(self.scope(), collection, "")
            .await?;
        self.filter.add(collection);
        info!(collection = %collection, "Tracking new collection");
        Ok(true)
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_activity(
        &self,
        log: &Log,
        kind: ActivityKind,
        collection: &str,
        token_id: &str,
        maker: &str,
        taker: Option<String>,
        price: &str,
    ) -> Result<()> {
        let tx_hash = log.transaction_hash.map(order_key).unwrap_or_default();
        let log_index = i64::try_from(log.log_index.unwrap_or_default())
            .map_err(|e| Error::Parse(e.to_string()))?;
        self.store
            .insert_activity(&NewActivityRow {
                chain: self.scope().chain().to_string(),
                project: self.scope().project().to_string(),
                kind: kind.as_str().to_string(),
                collection: collection.to_string(),
                token_id: token_id.to_string(),
                maker: maker.to_string(),
                taker,
                price: price.to_string(),
                tx_hash,
                log_index,
                block_number: block_of(log),
                created_at: Utc::now().to_rfc3339(),
            })
            .await?;
        Ok(())
    }

    async fn forward(&self, event: OrderEvent) {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => {}
            sent = self.orders.send(event) => {
                if sent.is_err() {
                    debug!("Order manager queue closed");
                }
            }
        }
    }
}

fn block_of(log: &Log) -> i64 {
    log.block_number
        .and_then(|b| i64::try_from(b).ok())
        .unwrap_or_default()
}
