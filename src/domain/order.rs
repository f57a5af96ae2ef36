//! Order-book enums and the events the indexer hands to the order manager.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order direction as encoded by the order-book contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    /// Sell order.
    List,
    /// Buy order.
    Bid,
}

impl OrderSide {
    /// Decode the contract's `uint8` side.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::List),
            1 => Some(Self::Bid),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            Self::List => 0,
            Self::Bid => 1,
        }
    }
}

/// Sale kind as encoded by the order-book contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleKind {
    /// Collection-wide offer: any token of the collection fills it.
    FixedPriceForCollection,
    /// Offer or listing for a single token.
    FixedPriceForItem,
}

impl SaleKind {
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::FixedPriceForCollection),
            1 => Some(Self::FixedPriceForItem),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            Self::FixedPriceForCollection => 0,
            Self::FixedPriceForItem => 1,
        }
    }
}

/// Persisted order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Active,
    Filled,
    Cancelled,
    Expired,
}

impl OrderStatus {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Active => 0,
            Self::Filled => 1,
            Self::Cancelled => 2,
            Self::Expired => 3,
        }
    }

    #[must_use]
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Active),
            1 => Some(Self::Filled),
            2 => Some(Self::Cancelled),
            3 => Some(Self::Expired),
            _ => None,
        }
    }
}

/// Kind of a persisted marketplace activity row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    List,
    Bid,
    Cancel,
    Sale,
}

impl ActivityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Bid => "bid",
            Self::Cancel => "cancel",
            Self::Sale => "sale",
        }
    }
}

impl From<OrderSide> for ActivityKind {
    fn from(side: OrderSide) -> Self {
        match side {
            OrderSide::List => Self::List,
            OrderSide::Bid => Self::Bid,
        }
    }
}

/// Order-affecting event forwarded from the indexer to the order manager.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderEvent {
    /// A new order was placed on chain.
    Created {
        order_id: String,
        collection: String,
        token_id: String,
        side: OrderSide,
        price: Decimal,
        expiry: u64,
    },
    /// An order was cancelled by its maker.
    Cancelled {
        order_id: String,
        collection: String,
    },
    /// Two orders were matched on chain.
    Matched {
        make_order_id: String,
        take_order_id: String,
        collection: String,
        price: Decimal,
    },
}

impl OrderEvent {
    /// Collection the event refers to.
    #[must_use]
    pub fn collection(&self) -> &str {
        match self {
            Self::Created { collection, .. }
            | Self::Cancelled { collection, .. }
            | Self::Matched { collection, .. } => collection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_decodes_contract_values() {
        assert_eq!(OrderSide::from_u8(0), Some(OrderSide::List));
        assert_eq!(OrderSide::from_u8(1), Some(OrderSide::Bid));
        assert_eq!(OrderSide::from_u8(2), None);
    }

    #[test]
    fn status_roundtrips_through_storage_value() {
        for status in [
            OrderStatus::Active,
            OrderStatus::Filled,
            OrderStatus::Cancelled,
            OrderStatus::Expired,
        ] {
            assert_eq!(OrderStatus::from_i32(status.as_i32()), Some(status));
        }
    }

    #[test]
    fn event_exposes_collection() {
        let event = OrderEvent::Cancelled {
            order_id: "0x01".into(),
            collection: "0xc0".into(),
        };
        assert_eq!(event.collection(), "0xc0");
    }
}
