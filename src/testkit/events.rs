//! Builders for order-book contract logs.

use std::str::FromStr;

use alloy_primitives::aliases::U96;
use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_rpc_types_eth::Log;
use alloy_sol_types::SolEvent;

use super::config::DEX_ADDRESS;
use crate::chain::events::{Asset, LogCancel, LogMake, LogMatch, Order};
use crate::domain::OrderSide;

/// One ether in wei.
pub const ETHER: u128 = 1_000_000_000_000_000_000;

/// The test order-book contract.
pub fn dex_address() -> Address {
    Address::from_str(DEX_ADDRESS).expect("valid dex address")
}

/// Address derived from a small number, e.g. `address(0xc0)`.
pub fn address(n: u64) -> Address {
    Address::left_padding_from(&n.to_be_bytes())
}

/// Order key derived from a small number.
pub fn key(n: u64) -> B256 {
    B256::from(U256::from(n))
}

fn side_value(side: OrderSide) -> u8 {
    match side {
        OrderSide::List => 0,
        OrderSide::Bid => 1,
    }
}

/// Single-token order.
pub fn order(
    side: OrderSide,
    collection: Address,
    token_id: u64,
    maker: Address,
    price: u128,
) -> Order {
    Order {
        side: side_value(side),
        saleKind: 1,
        maker,
        nft: Asset {
            tokenId: U256::from(token_id),
            collection,
            amount: U96::from(1u64),
        },
        price,
        expiry: 0,
        salt: 1,
    }
}

/// `LogMake` for `order` under `order_key`.
pub fn make(order_key: B256, order: &Order) -> LogMake {
    LogMake {
        orderKey: order_key,
        side: order.side,
        saleKind: order.saleKind,
        maker: order.maker,
        nft: order.nft.clone(),
        price: order.price,
        expiry: order.expiry,
        salt: order.salt,
    }
}

pub fn cancel(order_key: B256, maker: Address) -> LogCancel {
    LogCancel {
        orderKey: order_key,
        maker,
    }
}

pub fn matched(
    make_key: B256,
    take_key: B256,
    make: Order,
    take: Order,
    fill_price: u128,
) -> LogMatch {
    LogMatch {
        makeOrderKey: make_key,
        takeOrderKey: take_key,
        makeOrder: make,
        takeOrder: take,
        fillPrice: fill_price,
    }
}

/// Wrap `event` into an RPC log emitted by the test contract.
///
/// The transaction hash is derived from `(block, log_index)`.
pub fn rpc_log<E: SolEvent>(event: &E, block: u64, log_index: u64) -> Log {
    Log {
        inner: alloy_primitives::Log {
            address: dex_address(),
            data: event.encode_log_data(),
        },
        block_hash: Some(keccak256(block.to_be_bytes())),
        block_number: Some(block),
        block_timestamp: None,
        transaction_hash: Some(keccak256(format!("{block}:{log_index}"))),
        transaction_index: Some(0),
        log_index: Some(log_index),
        removed: false,
    }
}
