//! Mock [`ChainClient`] backed by an in-memory log list.
//!
//! The head block and the stored logs can be changed while the indexer is
//! running; every `block_number` call is counted and wakes
//! [`MockChainClient::wait_polled`].

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use alloy_rpc_types_eth::Log;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::chain::{ChainClient, LogQuery};
use crate::error::{Error, Result};

pub struct MockChainClient {
    chain_id: u64,
    head: AtomicU64,
    logs: Mutex<Vec<Log>>,
    block_number_calls: AtomicUsize,
    log_queries: Mutex<Vec<LogQuery>>,
    fail_rpc: AtomicBool,
    polled: Notify,
}

impl MockChainClient {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            head: AtomicU64::new(0),
            logs: Mutex::new(Vec::new()),
            block_number_calls: AtomicUsize::new(0),
            log_queries: Mutex::new(Vec::new()),
            fail_rpc: AtomicBool::new(false),
            polled: Notify::new(),
        }
    }

    #[must_use]
    pub fn with_head(self, head: u64) -> Self {
        self.set_head(head);
        self
    }

    pub fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    pub fn push_log(&self, log: Log) {
        self.logs.lock().push(log);
    }

    /// Make every RPC call fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.fail_rpc.store(failing, Ordering::SeqCst);
    }

    pub fn block_number_calls(&self) -> usize {
        self.block_number_calls.load(Ordering::SeqCst)
    }

    /// Every log query served so far.
    pub fn log_queries(&self) -> Vec<LogQuery> {
        self.log_queries.lock().clone()
    }

    /// Wait until `block_number` has been called at least once.
    pub async fn wait_polled(&self, timeout: Duration) -> bool {
        if self.block_number_calls() > 0 {
            return true;
        }
        tokio::time::timeout(timeout, self.polled.notified())
            .await
            .is_ok()
            || self.block_number_calls() > 0
    }

    fn check_failing(&self) -> Result<()> {
        if self.fail_rpc.load(Ordering::SeqCst) {
            return Err(Error::Chain("mock rpc failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn block_number(&self) -> Result<u64> {
        self.block_number_calls.fetch_add(1, Ordering::SeqCst);
        self.polled.notify_one();
        self.check_failing()?;
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn logs(&self, query: &LogQuery) -> Result<Vec<Log>> {
        self.check_failing()?;
        self.log_queries.lock().push(*query);
        let logs = self
            .logs
            .lock()
            .iter()
            .filter(|log| log.address() == query.address)
            .filter(|log| {
                log.block_number
                    .is_some_and(|b| b >= query.from_block && b <= query.to_block)
            })
            .cloned()
            .collect();
        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Address;

    use super::*;

    #[tokio::test]
    async fn wait_polled_sees_earlier_calls() {
        let client = MockChainClient::new(1).with_head(5);
        assert_eq!(client.block_number().await.unwrap(), 5);
        assert!(client.wait_polled(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn wait_polled_times_out_without_calls() {
        let client = MockChainClient::new(1);
        assert!(!client.wait_polled(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn failing_client_returns_chain_errors() {
        let client = MockChainClient::new(1);
        client.set_failing(true);
        assert!(matches!(client.block_number().await, Err(Error::Chain(_))));
        let query = LogQuery {
            address: Address::ZERO,
            from_block: 0,
            to_block: 1,
        };
        assert!(client.logs(&query).await.is_err());
    }
}
