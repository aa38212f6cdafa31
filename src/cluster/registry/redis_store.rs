//! Redis registry backend
//!
//! Object records are plain string keys (`SET`/`GET`/`DEL`), membership is
//! a redis set (`SADD`/`SREM`/`SMEMBERS`). One multiplexed connection is
//! opened on first use and shared by all callers; after any failure it is
//! dropped so the next call reconnects.

use super::RegistryBackend;
use crate::common::{Error, Result};
use ::redis::aio::MultiplexedConnection;
use ::redis::{AsyncCommands, Client, RedisResult};
use async_trait::async_trait;
use std::future::Future;
use tokio::sync::Mutex;

pub struct RedisBackend {
    client: Client,
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl RedisBackend {
    /// Parse `url`; does not connect
    pub fn open(url: &str) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|e| Error::InvalidConfig(format!("invalid redis url {}: {}", url, e)))?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::RegistryUnavailable(e.to_string()))?;
        tracing::info!("Connected to redis registry");
        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn run<T, F, Fut>(&self, f: F) -> Result<T>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let conn = self.connection().await?;
        match f(conn).await {
            Ok(value) => Ok(value),
            Err(e) => {
                *self.conn.lock().await = None;
                Err(Error::Redis(e))
            }
        }
    }
}

#[async_trait]
impl RegistryBackend for RedisBackend {
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.run(|mut c| async move { c.set::<_, _, ()>(key, value).await })
            .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.run(|mut c| async move { c.get::<_, Option<String>>(key).await })
            .await
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.run(|mut c| async move { c.del::<_, ()>(key).await })
            .await
    }

    async fn sadd(&self, set: &str, member: &str) -> Result<()> {
        self.run(|mut c| async move { c.sadd::<_, _, ()>(set, member).await })
            .await
    }

    async fn srem(&self, set: &str, member: &str) -> Result<()> {
        self.run(|mut c| async move { c.srem::<_, _, ()>(set, member).await })
            .await
    }

    async fn smembers(&self, set: &str) -> Result<Vec<String>> {
        self.run(|mut c| async move { c.smembers::<_, Vec<String>>(set).await })
            .await
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
