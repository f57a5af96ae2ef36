//! JSON-RPC chain client.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types_eth::{Filter, Log};
use async_trait::async_trait;
use tracing::debug;

use super::endpoint::RpcEndpoint;
use crate::error::{Error, Result};

/// How long construction waits for the node to report its chain id.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Contract logs over an inclusive block range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogQuery {
    pub address: Address,
    pub from_block: u64,
    pub to_block: u64,
}

/// Read access to one chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain id the client was built for.
    fn chain_id(&self) -> u64;

    /// Latest block number.
    async fn block_number(&self) -> Result<u64>;

    async fn logs(&self, query: &LogQuery) -> Result<Vec<Log>>;
}

/// EVM JSON-RPC client over HTTP.
pub struct EvmClient {
    chain_id: u64,
    provider: DynProvider,
    endpoint: RpcEndpoint,
}

impl std::fmt::Debug for EvmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmClient")
            .field("chain_id", &self.chain_id)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl EvmClient {
    fn chain_error(&self, err: impl ToString) -> Error {
        Error::Chain(self.endpoint.redact(&err.to_string()))
    }
}

#[async_trait]
impl ChainClient for EvmClient {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn block_number(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| self.chain_error(e))
    }

    async fn logs(&self, query: &LogQuery) -> Result<Vec<Log>> {
        let filter = Filter::new()
            .address(query.address)
            .from_block(query.from_block)
            .to_block(query.to_block);
        self.provider
            .get_logs(&filter)
            .await
            .map_err(|e| self.chain_error(e))
    }
}

/// Build a client for `chain_id` and check the node serves that chain.
///
/// # Errors
///
/// Returns [`Error::Construction`] if the node cannot be reached within
/// [`CONNECT_TIMEOUT`] or reports a different chain id.
pub async fn new_chain_client(
    chain_id: u64,
    endpoint: &RpcEndpoint,
) -> Result<Arc<dyn ChainClient>> {
    let provider = ProviderBuilder::new()
        .connect_http(endpoint.url().clone())
        .erased();

    let reported = tokio::time::timeout(CONNECT_TIMEOUT, provider.get_chain_id())
        .await
        .map_err(|_| {
            Error::construction(
                "chain client",
                format!("{} did not answer within {CONNECT_TIMEOUT:?}", endpoint.host()),
            )
        })?
        .map_err(|e| Error::construction("chain client", endpoint.redact(&e.to_string())))?;

    if reported != chain_id {
        return Err(Error::construction(
            "chain client",
            format!("node reports chain id {reported}, expected {chain_id}"),
        ));
    }

    debug!(chain_id, host = endpoint.host(), "Chain client connected");

    Ok(Arc::new(EvmClient {
        chain_id,
        provider,
        endpoint: endpoint.clone(),
    }))
}
