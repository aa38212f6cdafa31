//! Shared location registry
//!
//! Records `bucket:filename -> owner` and the set of live members in an
//! external key-value store every node can reach. The store itself has no
//! ownership logic; it is a dumb shared map and set.
//!
//! [`LocationRegistry`] bounds every call with a timeout. Its plain
//! methods never fail: an unreachable or slow store reads as a miss (or
//! an empty set) and a skipped write, so a node keeps serving what it
//! holds locally. The `try_*` variants return the underlying error for
//! callers that must tell an outage apart from an empty answer.

pub mod memory;
pub mod redis_store;

pub use self::memory::MemoryBackend;
pub use self::redis_store::RedisBackend;

use crate::cluster::node::Node;
use crate::common::config::RegistryConfig;
use crate::common::key::ObjectKey;
use crate::common::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Name of the shared membership set
pub const MEMBERS_KEY: &str = "nodes";

/// Operations the registry needs from the shared store
#[async_trait]
pub trait RegistryBackend: Send + Sync {
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn del(&self, key: &str) -> Result<()>;

    async fn sadd(&self, set: &str, member: &str) -> Result<()>;

    async fn srem(&self, set: &str, member: &str) -> Result<()>;

    async fn smembers(&self, set: &str) -> Result<Vec<String>>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// Client to the shared location registry
#[derive(Clone)]
pub struct LocationRegistry {
    backend: Option<Arc<dyn RegistryBackend>>,
    timeout: Duration,
}

impl LocationRegistry {
    pub fn new(backend: Arc<dyn RegistryBackend>, timeout: Duration) -> Self {
        Self {
            backend: Some(backend),
            timeout,
        }
    }

    /// A registry that is never reachable: permanent single-node mode
    pub fn disabled() -> Self {
        Self {
            backend: None,
            timeout: Duration::from_millis(500),
        }
    }

    /// Redis-backed registry when a URL is configured, disabled otherwise
    ///
    /// Only the URL is checked here; no connection is attempted, so a
    /// store that is down at boot does not stop the node from starting.
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        match config.url.as_deref() {
            Some(url) => {
                let backend = RedisBackend::open(url)?;
                Ok(Self::new(Arc::new(backend), config.timeout()))
            }
            None => {
                tracing::info!("No registry configured, running in single-node mode");
                Ok(Self::disabled())
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn call<'a, T, F, Fut>(&'a self, f: F) -> Result<T>
    where
        F: FnOnce(&'a dyn RegistryBackend) -> Fut,
        Fut: Future<Output = Result<T>> + 'a,
    {
        let backend = self
            .backend
            .as_deref()
            .ok_or_else(|| Error::RegistryUnavailable("no registry configured".into()))?;

        match tokio::time::timeout(self.timeout, f(backend)).await {
            Ok(res) => res,
            Err(_) => Err(Error::RegistryTimeout(self.timeout)),
        }
    }

    // === Object records ===

    /// Record `node` as the owner of `key`, replacing any previous owner
    pub async fn try_put(&self, key: &ObjectKey, node: &Node) -> Result<()> {
        let raw_key = key.to_string();
        let value = serde_json::to_string(node)?;
        self.call(|b| b.set(&raw_key, &value)).await
    }

    /// Returns whether the record was written
    pub async fn put(&self, key: &ObjectKey, node: &Node) -> bool {
        match self.try_put(key, node).await {
            Ok(()) => true,
            Err(e) => {
                if self.is_enabled() {
                    tracing::warn!(key = %key, error = %e, "Registry put failed, ownership not advertised");
                }
                false
            }
        }
    }

    pub async fn try_get(&self, key: &ObjectKey) -> Result<Option<Node>> {
        let raw_key = key.to_string();
        let raw = self.call(|b| b.get(&raw_key)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Owner of `key`, or `None` on a miss or when the registry is unusable
    pub async fn get(&self, key: &ObjectKey) -> Option<Node> {
        match self.try_get(key).await {
            Ok(owner) => owner,
            Err(e) => {
                if self.is_enabled() {
                    tracing::warn!(key = %key, error = %e, "Registry lookup failed, treating as miss");
                }
                None
            }
        }
    }

    pub async fn try_delete(&self, key: &ObjectKey) -> Result<()> {
        let raw_key = key.to_string();
        self.call(|b| b.del(&raw_key)).await
    }

    /// Returns whether the record was removed
    pub async fn delete(&self, key: &ObjectKey) -> bool {
        match self.try_delete(key).await {
            Ok(()) => true,
            Err(e) => {
                if self.is_enabled() {
                    tracing::warn!(key = %key, error = %e, "Registry delete failed, record left behind");
                }
                false
            }
        }
    }

    // === Membership ===

    /// Publish `node` in the member set
    ///
    /// Older entries for the same id (a node restarted on another
    /// address) are dropped first so the set holds one entry per id. The
    /// whole exchange shares one timeout.
    pub async fn try_add_member(&self, node: &Node) -> Result<()> {
        let value = serde_json::to_string(node)?;
        let id = node.id.clone();
        self.call(|b| async move {
            for raw in b.smembers(MEMBERS_KEY).await? {
                let stale = serde_json::from_str::<Node>(&raw)
                    .map(|n| n.id == id && raw != value)
                    .unwrap_or(false);
                if stale {
                    b.srem(MEMBERS_KEY, &raw).await?;
                }
            }
            b.sadd(MEMBERS_KEY, &value).await
        })
        .await
    }

    pub async fn add_member(&self, node: &Node) -> bool {
        match self.try_add_member(node).await {
            Ok(()) => true,
            Err(e) => {
                if self.is_enabled() {
                    tracing::warn!(node = %node, error = %e, "Registry member publish failed");
                }
                false
            }
        }
    }

    /// Drop every entry for `node`'s id from the member set
    pub async fn try_remove_member(&self, node: &Node) -> Result<usize> {
        let id = node.id.clone();
        self.call(|b| async move {
            let mut removed = 0;
            for raw in b.smembers(MEMBERS_KEY).await? {
                let matches = serde_json::from_str::<Node>(&raw)
                    .map(|n| n.id == id)
                    .unwrap_or(false);
                if matches {
                    b.srem(MEMBERS_KEY, &raw).await?;
                    removed += 1;
                }
            }
            Ok(removed)
        })
        .await
    }

    pub async fn remove_member(&self, node: &Node) -> bool {
        match self.try_remove_member(node).await {
            Ok(n) => n > 0,
            Err(e) => {
                if self.is_enabled() {
                    tracing::warn!(node = %node, error = %e, "Registry member removal failed");
                }
                false
            }
        }
    }

    /// Members as published; unparsable entries are skipped
    pub async fn try_list_members(&self) -> Result<BTreeSet<Node>> {
        let raw = self.call(|b| b.smembers(MEMBERS_KEY)).await?;
        let members = raw
            .iter()
            .filter_map(|s| match serde_json::from_str::<Node>(s) {
                Ok(node) => Some(node),
                Err(e) => {
                    tracing::warn!(entry = %s, error = %e, "Skipping malformed member entry");
                    None
                }
            })
            .collect();
        Ok(members)
    }

    pub async fn list_members(&self) -> BTreeSet<Node> {
        match self.try_list_members().await {
            Ok(members) => members,
            Err(e) => {
                if self.is_enabled() {
                    tracing::warn!(error = %e, "Registry member listing failed");
                }
                BTreeSet::new()
            }
        }
    }
}

impl std::fmt::Debug for LocationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationRegistry")
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .field("timeout", &self.timeout)
            .finish()
    }
}
