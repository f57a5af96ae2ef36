//! Relational store: connection pool, schema, and the order store.

pub mod connection;
pub mod model;
pub mod schema;
mod store;

pub use connection::{create_pool, run_migrations, DbPool};
pub use store::OrderStore;
