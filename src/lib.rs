//! easyswap-sync - order-book synchronization for the EasySwap NFT
//! marketplace.
//!
//! The crate follows the marketplace's order-book contract on one chain,
//! persists orders and activities for tracked collections, and keeps
//! derived order state (floor prices, expiries) current in a sharded
//! cache.
//!
//! # Modules
//!
//! - [`config`] - Configuration loading from TOML files
//! - [`kv`] - Weighted, consistent-hash sharded cache over Redis nodes
//! - [`db`] - SQLite store (Diesel) for collections, orders, activities
//! - [`chain`] - Chain identity, RPC endpoint, JSON-RPC client, contract events
//! - [`domain`] - Order-book enums, events and the (chain, project) scope
//! - [`service`] - Composition root and the background subsystems
//! - [`error`] - Error types for the crate
//!
//! # Example
//!
//! ```no_run
//! use easyswap_sync::config::Config;
//! use easyswap_sync::service::Service;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> easyswap_sync::error::Result<()> {
//! let config = Config::load("config.toml")?;
//! let mut service = Service::new(&CancellationToken::new(), config).await?;
//! service.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod kv;
pub mod service;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
