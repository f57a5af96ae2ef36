//! SQLite order store.
//!
//! Persists tracked collections, orders, activities and indexing progress
//! for one or more (chain, project) scopes using Diesel.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::Utc;
use diesel::prelude::*;
use rust_decimal::Decimal;

use super::connection::DbPool;
use super::model::{ActivityRow, CollectionRow, IndexedStatusRow, NewActivityRow, OrderRow};
use super::schema::{activities, collections, indexed_status, orders};
use crate::domain::{normalize_address, OrderSide, OrderStatus, ProjectScope};
use crate::error::{Error, Result};

type PooledConn =
    diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<diesel::SqliteConnection>>;

/// SQLite-backed store shared by the collection filter, indexer and order
/// manager. Cheap to clone.
#[derive(Clone)]
pub struct OrderStore {
    pool: DbPool,
}

impl std::fmt::Debug for OrderStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.pool.state();
        f.debug_struct("OrderStore")
            .field("connections", &state.connections)
            .field("idle", &state.idle_connections)
            .finish()
    }
}

impl OrderStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    fn conn(&self) -> Result<PooledConn> {
        self.pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))
    }

    /// Addresses of every collection tracked in `scope`.
    pub async fn tracked_collections(&self, scope: &ProjectScope) -> Result<Vec<String>> {
        let mut conn = self.conn()?;
        let rows = collections::table
            .filter(collections::chain.eq(scope.chain()))
            .filter(collections::project.eq(scope.project()))
            .select(collections::address)
            .order(collections::address.asc())
            .load::<String>(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(rows)
    }

    /// Start tracking a collection. Returns `false` if it was already tracked.
    pub async fn insert_collection(
        &self,
        scope: &ProjectScope,
        address: &str,
        name: &str,
    ) -> Result<bool> {
        let row = CollectionRow {
            chain: scope.chain().to_string(),
            project: scope.project().to_string(),
            address: normalize_address(address),
            name: name.to_string(),
            created_at: Utc::now().to_rfc3339(),
        };
        let mut conn = self.conn()?;
        let inserted = diesel::insert_or_ignore_into(collections::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(inserted > 0)
    }

    /// Last fully indexed block for `scope`, if indexing ever ran.
    pub async fn last_indexed_block(&self, scope: &ProjectScope) -> Result<Option<u64>> {
        let mut conn = self.conn()?;
        let row: Option<IndexedStatusRow> = indexed_status::table
            .find((scope.chain(), scope.project()))
            .select(IndexedStatusRow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(row.map(|r| u64::try_from(r.last_block).unwrap_or_default()))
    }

    pub async fn save_indexed_block(&self, scope: &ProjectScope, block: u64) -> Result<()> {
        let row = IndexedStatusRow {
            chain: scope.chain().to_string(),
            project: scope.project().to_string(),
            last_block: to_i64(block)?,
        };
        let mut conn = self.conn()?;
        diesel::replace_into(indexed_status::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    /// Insert a new order. An order id already stored for the row's scope
    /// is ignored and returns `false`.
    pub async fn insert_order(&self, order: &OrderRow) -> Result<bool> {
        let mut conn = self.conn()?;
        let inserted = diesel::insert_or_ignore_into(orders::table)
            .values(order)
            .execute(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(inserted > 0)
    }

    pub async fn order(&self, scope: &ProjectScope, order_id: &str) -> Result<Option<OrderRow>> {
        let mut conn = self.conn()?;
        orders::table
            .find((scope.chain(), scope.project(), order_id))
            .select(OrderRow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// Move an active order of `scope` to `status`.
    ///
    /// Orders that are already filled, cancelled or expired keep their
    /// status. Returns whether a row changed.
    pub async fn update_order_status(
        &self,
        scope: &ProjectScope,
        order_id: &str,
        status: OrderStatus,
    ) -> Result<bool> {
        let mut conn = self.conn()?;
        let updated = diesel::update(
            orders::table
                .filter(orders::chain.eq(scope.chain()))
                .filter(orders::project.eq(scope.project()))
                .filter(orders::order_id.eq(order_id))
                .filter(orders::status.eq(OrderStatus::Active.as_i32())),
        )
        .set((
            orders::status.eq(status.as_i32()),
            orders::updated_at.eq(Utc::now().to_rfc3339()),
        ))
        .execute(&mut conn)
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(updated > 0)
    }

    /// Record an activity. Replays of the same `(tx_hash, log_index)` within
    /// a scope are ignored and return `false`.
    pub async fn insert_activity(&self, activity: &NewActivityRow) -> Result<bool> {
        let mut conn = self.conn()?;
        let inserted = diesel::insert_or_ignore_into(activities::table)
            .values(activity)
            .execute(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(inserted > 0)
    }

    /// Activities of `scope`, oldest first.
    pub async fn activities(&self, scope: &ProjectScope) -> Result<Vec<ActivityRow>> {
        let mut conn = self.conn()?;
        activities::table
            .filter(activities::chain.eq(scope.chain()))
            .filter(activities::project.eq(scope.project()))
            .order(activities::id.asc())
            .select(ActivityRow::as_select())
            .load(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// Lowest price among active listings of `collection`.
    ///
    /// Prices are stored as decimal text, so the minimum is taken after
    /// parsing rather than in SQL.
    pub async fn floor_price(
        &self,
        scope: &ProjectScope,
        collection: &str,
    ) -> Result<Option<Decimal>> {
        let mut conn = self.conn()?;
        let prices = orders::table
            .filter(orders::chain.eq(scope.chain()))
            .filter(orders::project.eq(scope.project()))
            .filter(orders::collection.eq(normalize_address(collection)))
            .filter(orders::side.eq(OrderSide::List.as_i32()))
            .filter(orders::status.eq(OrderStatus::Active.as_i32()))
            .select(orders::price)
            .load::<String>(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut floor: Option<Decimal> = None;
        for price in prices {
            let price = Decimal::from_str(&price).map_err(|e| Error::Parse(e.to_string()))?;
            floor = Some(floor.map_or(price, |current| current.min(price)));
        }
        Ok(floor)
    }

    /// Mark every active order of `scope` whose expiry is at or before
    /// `now` (unix seconds) as expired. An expiry of zero never expires.
    ///
    /// Returns the distinct collections that lost at least one order.
    pub async fn expire_orders(&self, scope: &ProjectScope, now: u64) -> Result<Vec<String>> {
        let now = to_i64(now)?;
        let mut conn = self.conn()?;
        let updated_at = Utc::now().to_rfc3339();

        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let due: Vec<(String, String)> = orders::table
                .filter(orders::chain.eq(scope.chain()))
                .filter(orders::project.eq(scope.project()))
                .filter(orders::status.eq(OrderStatus::Active.as_i32()))
                .filter(orders::expiry.gt(0))
                .filter(orders::expiry.le(now))
                .select((orders::order_id, orders::collection))
                .load(conn)?;

            if due.is_empty() {
                return Ok(Vec::new());
            }

            let (ids, affected): (Vec<String>, BTreeSet<String>) = due.into_iter().unzip();

            diesel::update(
                orders::table
                    .filter(orders::chain.eq(scope.chain()))
                    .filter(orders::project.eq(scope.project()))
                    .filter(orders::order_id.eq_any(&ids)),
            )
                .set((
                    orders::status.eq(OrderStatus::Expired.as_i32()),
                    orders::updated_at.eq(&updated_at),
                ))
                .execute(conn)?;

            Ok(affected.into_iter().collect())
        })
        .map_err(|e| Error::Database(e.to_string()))
    }
}

fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| Error::Parse(format!("{value} does not fit in i64")))
}
