//! Object node
//!
//! Ties one process's local storage to the cluster: every object
//! operation is resolved first, executed locally only when this node is
//! responsible, and followed by the registry bookkeeping that keeps the
//! rest of the cluster able to find the object.

use crate::cluster::membership::MembershipTracker;
use crate::cluster::node::Node;
use crate::cluster::registry::LocationRegistry;
use crate::cluster::resolver::{LocationResolver, Operation, RedirectTarget, Resolution};
use crate::cluster::ring::{HashRing, SharedRing};
use crate::common::config::{Config, WritePolicy};
use crate::common::key::ObjectKey;
use crate::common::storage::{FsStore, LocalStore};
use crate::common::utils::{format_time, unique_object_name};
use crate::common::{Error, Result};
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;

/// An object accepted by this node
#[derive(Debug, Clone, Serialize)]
pub struct StoredObject {
    pub bucket: String,
    pub name: String,
    pub size: u64,
    pub owner: Node,
    /// Whether the registry now points at this node
    pub advertised: bool,
}

#[derive(Debug, Clone)]
pub enum PutOutcome {
    Stored(StoredObject),
    Redirect(RedirectTarget),
}

#[derive(Debug, Clone)]
pub enum ObjectFetch {
    Local(Bytes),
    Redirect(RedirectTarget),
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// File details as reported to clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInfo {
    pub filename: String,
    pub bucket: String,
    pub size: u64,
    pub created_at: String,
    pub modified_at: String,
    /// Registry record, when the registry has one
    pub location: Option<Node>,
}

#[derive(Debug, Clone)]
pub enum InfoOutcome {
    Found(ObjectInfo),
    Redirect(RedirectTarget),
    NotFound,
}

/// Cluster view for operational introspection
#[derive(Debug, Clone, Serialize)]
pub struct ClusterStatus {
    pub node: Node,
    /// Distinct nodes on the current ring
    pub members: Vec<Node>,
    /// The static server list as configured
    pub configured: Vec<Node>,
    pub registry_enabled: bool,
    pub write_policy: WritePolicy,
}

pub struct ObjectNode {
    store: Arc<dyn LocalStore>,
    resolver: LocationResolver,
    membership: Arc<MembershipTracker>,
}

impl ObjectNode {
    pub fn new(
        store: Arc<dyn LocalStore>,
        membership: Arc<MembershipTracker>,
        write_policy: WritePolicy,
    ) -> Self {
        let resolver = LocationResolver::new(
            membership.local_node().clone(),
            membership.ring().clone(),
            membership.registry().clone(),
            write_policy,
        );
        Self {
            store,
            resolver,
            membership,
        }
    }

    /// Filesystem-backed node as described by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = Arc::new(FsStore::open(&config.node.root_dir)?);
        let registry = LocationRegistry::from_config(&config.registry)?;
        let ring = Arc::new(SharedRing::new(HashRing::new(
            config.placement.replicas,
            config.placement.hash,
        )));
        let membership = Arc::new(MembershipTracker::new(
            config.local_node(),
            config.static_nodes()?,
            registry,
            ring,
        ));

        tracing::info!("Object node: {}", membership.local_node());
        tracing::info!("  Root dir: {}", config.node.root_dir.display());
        tracing::info!("  Registry: {}", if membership.registry().is_enabled() { "redis" } else { "disabled" });
        tracing::info!("  Ring: {} vnodes/node, {}", config.placement.replicas, config.placement.hash);

        Ok(Self::new(store, membership, config.placement.write_policy))
    }

    pub fn local_node(&self) -> &Node {
        self.membership.local_node()
    }

    pub fn membership(&self) -> &Arc<MembershipTracker> {
        &self.membership
    }

    pub fn resolver(&self) -> &LocationResolver {
        &self.resolver
    }

    /// Publish this node and build the initial ring
    pub async fn start(&self) -> bool {
        self.membership.join().await
    }

    /// Key for a new upload of `original_name`, made unique
    pub fn unique_key(bucket: &str, original_name: &str) -> Result<ObjectKey> {
        ObjectKey::new(bucket, unique_object_name(original_name))
    }

    /// Store `data` under `key` if this node is responsible for the write
    pub async fn put_object(&self, key: &ObjectKey, data: &[u8]) -> Result<PutOutcome> {
        let present = self.store.contains(key);
        match self.resolver.resolve(key, Operation::Write, present).await? {
            Resolution::Serve => {
                self.store.write(key, data)?;
                let advertised = self.resolver.record_write(key).await;
                tracing::info!(key = %key, size = data.len(), advertised, "Stored object");
                Ok(PutOutcome::Stored(StoredObject {
                    bucket: key.bucket().to_string(),
                    name: key.filename().to_string(),
                    size: data.len() as u64,
                    owner: self.local_node().clone(),
                    advertised,
                }))
            }
            Resolution::Redirect(target) => Ok(PutOutcome::Redirect(target)),
            Resolution::NotFound => Err(Error::Internal(format!(
                "write for {} resolved to not-found",
                key
            ))),
        }
    }

    pub async fn get_object(&self, key: &ObjectKey) -> Result<ObjectFetch> {
        let present = self.store.contains(key);
        match self.resolver.resolve(key, Operation::Read, present).await? {
            Resolution::Serve => match self.store.read(key)? {
                Some(data) => Ok(ObjectFetch::Local(data)),
                // Deleted between the presence check and the read
                None => Ok(ObjectFetch::NotFound),
            },
            Resolution::Redirect(target) => Ok(ObjectFetch::Redirect(target)),
            Resolution::NotFound => Ok(ObjectFetch::NotFound),
        }
    }

    /// Delete `key` if this node holds it; other nodes' objects are not touched
    pub async fn delete_object(&self, key: &ObjectKey) -> Result<DeleteOutcome> {
        let present = self.store.contains(key);
        match self.resolver.resolve(key, Operation::Delete, present).await? {
            Resolution::Serve => {
                if !self.store.delete(key)? {
                    return Ok(DeleteOutcome::NotFound);
                }
                self.resolver.record_delete(key).await;
                tracing::info!(key = %key, "Deleted object");
                Ok(DeleteOutcome::Deleted)
            }
            Resolution::Redirect(_) | Resolution::NotFound => Ok(DeleteOutcome::NotFound),
        }
    }

    pub async fn object_info(&self, key: &ObjectKey) -> Result<InfoOutcome> {
        let present = self.store.contains(key);
        match self.resolver.resolve(key, Operation::Info, present).await? {
            Resolution::Serve => {
                let Some(meta) = self.store.metadata(key)? else {
                    return Ok(InfoOutcome::NotFound);
                };
                let location = self.resolver.recorded_owner(key).await;
                Ok(InfoOutcome::Found(ObjectInfo {
                    filename: key.filename().to_string(),
                    bucket: key.bucket().to_string(),
                    size: meta.size,
                    created_at: format_time(meta.created),
                    modified_at: format_time(meta.modified),
                    location,
                }))
            }
            Resolution::Redirect(target) => Ok(InfoOutcome::Redirect(target)),
            Resolution::NotFound => Ok(InfoOutcome::NotFound),
        }
    }

    pub fn cluster_status(&self) -> ClusterStatus {
        ClusterStatus {
            node: self.local_node().clone(),
            members: self.membership.members().into_iter().collect(),
            configured: self.membership.configured_nodes().to_vec(),
            registry_enabled: self.membership.registry().is_enabled(),
            write_policy: self.resolver.write_policy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::registry::MemoryBackend;
    use crate::common::hash::HashAlgorithm;
    use crate::common::storage::MemStore;
    use std::time::Duration;
    use tempfile::tempdir;

    fn single_node(registry: LocationRegistry) -> ObjectNode {
        let ring = Arc::new(SharedRing::new(HashRing::new(10, HashAlgorithm::Blake3)));
        let membership = Arc::new(MembershipTracker::new(
            Node::new("solo", "localhost", 3001),
            vec![],
            registry,
            ring,
        ));
        ObjectNode::new(Arc::new(MemStore::new()), membership, WritePolicy::LandLocally)
    }

    fn key(s: &str) -> ObjectKey {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let backend = MemoryBackend::new();
        let node = single_node(LocationRegistry::new(
            Arc::new(backend.clone()),
            Duration::from_millis(200),
        ));
        node.start().await;

        match node.put_object(&key("b:f.txt"), b"hello").await.unwrap() {
            PutOutcome::Stored(stored) => {
                assert_eq!(stored.size, 5);
                assert!(stored.advertised);
                assert_eq!(stored.owner.id, "solo");
            }
            other => panic!("expected stored, got {:?}", other),
        }

        match node.get_object(&key("b:f.txt")).await.unwrap() {
            ObjectFetch::Local(data) => assert_eq!(data, &b"hello"[..]),
            other => panic!("expected local, got {:?}", other),
        }

        assert_eq!(
            node.delete_object(&key("b:f.txt")).await.unwrap(),
            DeleteOutcome::Deleted
        );
        assert_eq!(
            node.delete_object(&key("b:f.txt")).await.unwrap(),
            DeleteOutcome::NotFound
        );
        assert!(matches!(
            node.get_object(&key("b:f.txt")).await.unwrap(),
            ObjectFetch::NotFound
        ));
        assert!(node.resolver().recorded_owner(&key("b:f.txt")).await.is_none());
    }

    #[tokio::test]
    async fn test_object_info_reports_location() {
        let backend = MemoryBackend::new();
        let node = single_node(LocationRegistry::new(
            Arc::new(backend),
            Duration::from_millis(200),
        ));
        node.put_object(&key("b:f.txt"), b"12345678").await.unwrap();

        match node.object_info(&key("b:f.txt")).await.unwrap() {
            InfoOutcome::Found(info) => {
                assert_eq!(info.size, 8);
                assert_eq!(info.bucket, "b");
                assert_eq!(info.location.map(|n| n.id), Some("solo".to_string()));
                assert_ne!(info.created_at, "");
            }
            other => panic!("expected info, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_works_without_registry() {
        let node = single_node(LocationRegistry::disabled());
        assert!(!node.start().await);

        match node.put_object(&key("b:f"), b"x").await.unwrap() {
            PutOutcome::Stored(stored) => assert!(!stored.advertised),
            other => panic!("expected stored, got {:?}", other),
        }
        assert!(matches!(
            node.get_object(&key("b:f")).await.unwrap(),
            ObjectFetch::Local(_)
        ));
        assert!(matches!(
            node.get_object(&key("b:other")).await.unwrap(),
            ObjectFetch::NotFound
        ));
    }

    #[test]
    fn test_unique_key() {
        let k = ObjectNode::unique_key("bucket1", "x.txt").unwrap();
        assert_eq!(k.bucket(), "bucket1");
        assert!(k.filename().ends_with("-x.txt"));
        assert!(ObjectNode::unique_key("bucket1", "../x").is_err());
    }

    #[test]
    fn test_from_config_and_status() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.node.id = Some("node-a".into());
        config.node.root_dir = dir.path().join("storage");
        config.placement.static_nodes = vec!["node-b@10.0.0.2:3001".into()];

        let node = ObjectNode::from_config(&config).unwrap();
        let status = node.cluster_status();
        assert_eq!(status.node.id, "node-a");
        assert_eq!(status.members.len(), 2);
        assert_eq!(status.configured.len(), 1);
        assert!(!status.registry_enabled);
        assert!(dir.path().join("storage").is_dir());
    }
}
