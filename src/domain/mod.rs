//! Chain-agnostic order-book types shared by the store, the indexer, and
//! the order manager.

pub mod order;
pub mod scope;

pub use order::{ActivityKind, OrderEvent, OrderSide, OrderStatus, SaleKind};
pub use scope::{normalize_address, ProjectScope};
