//! Redis-backed cache node.
//!
//! Connections are opened on first use and then shared: a
//! [`ConnectionManager`] for single servers, a cluster connection for
//! cluster seeds. Both reconnect on their own.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::cluster::ClusterClient;
use redis::cluster_async::ClusterConnection;
use redis::{Client, Cmd, FromRedisValue};
use tokio::sync::OnceCell;

use super::node::{NodeConf, NodeKind};
use super::KvNode;
use crate::error::{Error, Result};

enum Backend {
    Single {
        client: Client,
        conn: OnceCell<ConnectionManager>,
    },
    Cluster {
        client: ClusterClient,
        conn: OnceCell<ClusterConnection>,
    },
}

/// A Redis server or cluster acting as one cache node.
pub struct RedisNode {
    /// `host:port`, without credentials.
    name: String,
    backend: Backend,
}

impl RedisNode {
    /// Build a node from its descriptor. No connection is opened here.
    pub fn new(conf: &NodeConf) -> Result<Self> {
        let url = conf.redis_url()?;
        let name = format!(
            "{}:{}",
            url.host_str().unwrap_or_default(),
            url.port().unwrap_or(6379)
        );

        let backend = match conf.kind {
            NodeKind::Cluster => Backend::Cluster {
                client: ClusterClient::new(vec![url.as_str()])
                    .map_err(|e| Error::construction("cache", e))?,
                conn: OnceCell::new(),
            },
            NodeKind::Node | NodeKind::Memory => Backend::Single {
                client: Client::open(url.as_str()).map_err(|e| Error::construction("cache", e))?,
                conn: OnceCell::new(),
            },
        };

        Ok(Self { name, backend })
    }

    async fn query<T: FromRedisValue>(&self, cmd: &Cmd) -> Result<T> {
        match &self.backend {
            Backend::Single { client, conn } => {
                let conn = conn
                    .get_or_try_init(|| ConnectionManager::new(client.clone()))
                    .await?;
                let mut conn = conn.clone();
                let value: T = cmd.query_async(&mut conn).await?;
                Ok(value)
            }
            Backend::Cluster { client, conn } => {
                let conn = conn
                    .get_or_try_init(|| client.get_async_connection())
                    .await?;
                let mut conn = conn.clone();
                let value: T = cmd.query_async(&mut conn).await?;
                Ok(value)
            }
        }
    }
}

#[async_trait]
impl KvNode for RedisNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.query(redis::cmd("GET").arg(key)).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.query(redis::cmd("SET").arg(key).arg(value)).await
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let removed: i64 = self.query(redis::cmd("DEL").arg(key)).await?;
        Ok(removed > 0)
    }
}
