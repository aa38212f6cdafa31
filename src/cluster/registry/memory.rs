//! In-process registry backend
//!
//! Shares one map and one set family between every clone, so several
//! nodes in the same process can coordinate through it exactly as they
//! would through redis. Reachability and latency can be switched at
//! runtime to exercise the degraded paths.

use super::RegistryBackend;
use crate::common::{Error, Result};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Inner {
    keys: Mutex<HashMap<String, String>>,
    sets: Mutex<HashMap<String, BTreeSet<String>>>,
    unreachable: AtomicBool,
    latency_ms: AtomicU64,
    lookups: AtomicUsize,
}

/// Shared in-memory store
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail as if the store were down
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.inner
            .latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of point lookups served so far
    pub fn lookups(&self) -> usize {
        self.inner.lookups.load(Ordering::SeqCst)
    }

    pub fn set_len(&self, set: &str) -> usize {
        self.sets().get(set).map_or(0, BTreeSet::len)
    }

    fn keys(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.inner.keys.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sets(&self) -> std::sync::MutexGuard<'_, HashMap<String, BTreeSet<String>>> {
        self.inner.sets.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn enter(&self) -> Result<()> {
        let latency = self.inner.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.inner.unreachable.load(Ordering::SeqCst) {
            return Err(Error::RegistryUnavailable("memory backend marked unreachable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RegistryBackend for MemoryBackend {
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.enter().await?;
        self.keys().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.enter().await?;
        self.inner.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.keys().get(key).cloned())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.enter().await?;
        self.keys().remove(key);
        Ok(())
    }

    async fn sadd(&self, set: &str, member: &str) -> Result<()> {
        self.enter().await?;
        self.sets()
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn srem(&self, set: &str, member: &str) -> Result<()> {
        self.enter().await?;
        if let Some(members) = self.sets().get_mut(set) {
            members.remove(member);
        }
        Ok(())
    }

    async fn smembers(&self, set: &str) -> Result<Vec<String>> {
        self.enter().await?;
        Ok(self
            .sets()
            .get(set)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_state() {
        let a = MemoryBackend::new();
        let b = a.clone();
        a.set("k", "v").await.unwrap();
        assert_eq!(b.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(a.lookups(), 1);
    }

    #[tokio::test]
    async fn test_sets() {
        let backend = MemoryBackend::new();
        backend.sadd("s", "x").await.unwrap();
        backend.sadd("s", "x").await.unwrap();
        backend.sadd("s", "y").await.unwrap();
        assert_eq!(backend.set_len("s"), 2);
        backend.srem("s", "x").await.unwrap();
        assert_eq!(backend.smembers("s").await.unwrap(), vec!["y".to_string()]);
        assert!(backend.smembers("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable() {
        let backend = MemoryBackend::new();
        backend.set_reachable(false);
        assert!(backend.get("k").await.is_err());
        backend.set_reachable(true);
        assert!(backend.get("k").await.unwrap().is_none());
    }
}
