//! Database model types for Diesel ORM.

use diesel::prelude::*;

use super::schema::{activities, collections, indexed_status, orders};

/// Database row for a tracked collection.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = collections)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CollectionRow {
    pub chain: String,
    pub project: String,
    pub address: String,
    pub name: String,
    pub created_at: String,
}

/// Database row for an order.
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct OrderRow {
    pub order_id: String,
    pub chain: String,
    pub project: String,
    pub collection: String,
    pub token_id: String,
    pub side: i32,
    pub sale_kind: i32,
    pub maker: String,
    /// Decimal ETH amount.
    pub price: String,
    /// Unix seconds; zero means no expiry.
    pub expiry: i64,
    pub salt: String,
    pub status: i32,
    pub block_number: i64,
    pub updated_at: String,
}

/// Database row for an activity (insertable).
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = activities)]
pub struct NewActivityRow {
    pub chain: String,
    pub project: String,
    pub kind: String,
    pub collection: String,
    pub token_id: String,
    pub maker: String,
    pub taker: Option<String>,
    pub price: String,
    pub tx_hash: String,
    pub log_index: i64,
    pub block_number: i64,
    pub created_at: String,
}

/// Database row for an activity (queryable).
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = activities)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ActivityRow {
    pub id: i32,
    pub chain: String,
    pub project: String,
    pub kind: String,
    pub collection: String,
    pub token_id: String,
    pub maker: String,
    pub taker: Option<String>,
    pub price: String,
    pub tx_hash: String,
    pub log_index: i64,
    pub block_number: i64,
    pub created_at: String,
}

/// Indexing progress per scope.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = indexed_status)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct IndexedStatusRow {
    pub chain: String,
    pub project: String,
    pub last_block: i64,
}
