//! Order-book contract events.

use alloy_primitives::{hex, Address, B256};
use alloy_rpc_types_eth::Log;
use alloy_sol_types::{sol, SolEvent};
use rust_decimal::Decimal;

use crate::error::{Error, Result};

/// Decimals of the native currency prices are quoted in.
pub const PRICE_DECIMALS: u32 = 18;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct Asset {
        uint256 tokenId;
        address collection;
        uint96 amount;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct Order {
        uint8 side;
        uint8 saleKind;
        address maker;
        Asset nft;
        uint128 price;
        uint64 expiry;
        uint64 salt;
    }

    #[derive(Debug, PartialEq, Eq)]
    event LogMake(
        bytes32 orderKey,
        uint8 indexed side,
        uint8 indexed saleKind,
        address indexed maker,
        Asset nft,
        uint128 price,
        uint64 expiry,
        uint64 salt
    );

    #[derive(Debug, PartialEq, Eq)]
    event LogCancel(bytes32 indexed orderKey, address indexed maker);

    #[derive(Debug, PartialEq, Eq)]
    event LogMatch(
        bytes32 indexed makeOrderKey,
        bytes32 indexed takeOrderKey,
        Order makeOrder,
        Order takeOrder,
        uint128 fillPrice
    );
}

/// A decoded order-book log.
#[derive(Debug, PartialEq, Eq)]
pub enum OrderBookLog {
    Make(LogMake),
    Cancel(LogCancel),
    Match(LogMatch),
}

/// Decode an order-book log.
///
/// Returns `Ok(None)` for logs whose first topic is not an order-book event.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the topic matches but the payload does not.
pub fn decode_log(log: &Log) -> Result<Option<OrderBookLog>> {
    let Some(topic0) = log.topics().first() else {
        return Ok(None);
    };

    let data = log.data();
    let decoded = if *topic0 == LogMake::SIGNATURE_HASH {
        LogMake::decode_log_data(data).map(OrderBookLog::Make)
    } else if *topic0 == LogCancel::SIGNATURE_HASH {
        LogCancel::decode_log_data(data).map(OrderBookLog::Cancel)
    } else if *topic0 == LogMatch::SIGNATURE_HASH {
        LogMatch::decode_log_data(data).map(OrderBookLog::Match)
    } else {
        return Ok(None);
    };

    decoded
        .map(Some)
        .map_err(|e| Error::Parse(format!("order-book log: {e}")))
}

/// Lowercase `0x` hex of an order key.
#[must_use]
pub fn order_key(key: B256) -> String {
    hex::encode_prefixed(key)
}

/// Lowercase `0x` hex of an address.
#[must_use]
pub fn address_hex(address: Address) -> String {
    hex::encode_prefixed(address)
}

/// Convert a wei amount into a decimal amount of the native currency.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the amount exceeds decimal precision.
pub fn wei_to_eth(wei: u128) -> Result<Decimal> {
    let wei = i128::try_from(wei).map_err(|_| Error::Parse(format!("price {wei} out of range")))?;
    Decimal::try_from_i128_with_scale(wei, PRICE_DECIMALS)
        .map(|d| d.normalize())
        .map_err(|e| Error::Parse(format!("price {wei}: {e}")))
}
