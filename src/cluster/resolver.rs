//! Per-request location resolution
//!
//! For every object operation the resolver decides whether this node
//! should handle the request itself, send the caller to another node, or
//! report the object as missing. It never proxies: a redirect makes the
//! target node resolve the request again from scratch.
//!
//! Local disk always wins. If the object is present here it is served
//! here, whatever the registry or the ring say.

use crate::cluster::node::Node;
use crate::cluster::registry::LocationRegistry;
use crate::cluster::ring::SharedRing;
use crate::common::config::WritePolicy;
use crate::common::key::ObjectKey;
use crate::common::utils::encode_segment;
use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Object operations that need a location decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Write,
    Read,
    Delete,
    Info,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Write => write!(f, "write"),
            Operation::Read => write!(f, "read"),
            Operation::Delete => write!(f, "delete"),
            Operation::Info => write!(f, "info"),
        }
    }
}

/// Where the transport layer should re-issue a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectTarget {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl RedirectTarget {
    /// Target for `op` on `key` served by `node`
    pub fn for_node(node: &Node, key: &ObjectKey, op: Operation) -> Self {
        Self {
            host: node.host.clone(),
            port: node.port,
            path: object_path(key, op),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.path)
    }
}

/// API path of `op` on `key`
///
/// Writes point at the named object rather than the bucket's upload
/// endpoint, so the target resolves the very same key.
pub fn object_path(key: &ObjectKey, op: Operation) -> String {
    let bucket = encode_segment(key.bucket());
    let filename = encode_segment(key.filename());
    match op {
        Operation::Write | Operation::Read | Operation::Delete => {
            format!("/api/buckets/{}/files/{}", bucket, filename)
        }
        Operation::Info => format!("/api/buckets/{}/files/{}/info", bucket, filename),
    }
}

/// Outcome of resolving one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Handle the request on this node
    Serve,
    /// Another node is responsible
    Redirect(RedirectTarget),
    /// Nobody this node can see holds the object
    NotFound,
}

pub struct LocationResolver {
    local: Node,
    ring: Arc<SharedRing>,
    registry: LocationRegistry,
    write_policy: WritePolicy,
}

impl LocationResolver {
    pub fn new(
        local: Node,
        ring: Arc<SharedRing>,
        registry: LocationRegistry,
        write_policy: WritePolicy,
    ) -> Self {
        Self {
            local,
            ring,
            registry,
            write_policy,
        }
    }

    pub fn local_node(&self) -> &Node {
        &self.local
    }

    pub fn write_policy(&self) -> WritePolicy {
        self.write_policy
    }

    /// Ring owner of `key`
    pub fn placement(&self, key: &ObjectKey) -> Result<Node> {
        self.ring
            .locate(&key.to_string())
            .ok_or(Error::MembershipEmpty)
    }

    /// Decide who handles `op` on `key`
    ///
    /// `local_present` is whether the object exists on this node's disk.
    /// Only writes can fail, and only when the ring has no members.
    pub async fn resolve(
        &self,
        key: &ObjectKey,
        op: Operation,
        local_present: bool,
    ) -> Result<Resolution> {
        let resolution = match op {
            Operation::Write => self.resolve_write(key, local_present)?,
            Operation::Read | Operation::Info => self.resolve_lookup(key, op, local_present).await,
            Operation::Delete => {
                // Deletes are never forwarded; only the holder may delete.
                if local_present {
                    Resolution::Serve
                } else {
                    Resolution::NotFound
                }
            }
        };

        tracing::debug!(key = %key, op = %op, local_present, resolution = ?resolution, "Resolved");
        Ok(resolution)
    }

    fn resolve_write(&self, key: &ObjectKey, local_present: bool) -> Result<Resolution> {
        let owner = self.placement(key)?;
        // The holder rewrites in place so the object never has two copies
        if owner == self.local || local_present {
            return Ok(Resolution::Serve);
        }

        match self.write_policy {
            WritePolicy::LandLocally => {
                tracing::debug!(key = %key, ring_owner = %owner, "Accepting write off its ring owner");
                Ok(Resolution::Serve)
            }
            WritePolicy::RedirectToOwner => Ok(Resolution::Redirect(RedirectTarget::for_node(
                &owner,
                key,
                Operation::Write,
            ))),
        }
    }

    async fn resolve_lookup(&self, key: &ObjectKey, op: Operation, local_present: bool) -> Resolution {
        if local_present {
            return Resolution::Serve;
        }

        match self.registry.get(key).await {
            Some(owner) if owner != self.local => {
                return Resolution::Redirect(RedirectTarget::for_node(&owner, key, op));
            }
            Some(_) => {
                tracing::warn!(key = %key, "Registry names this node as owner but the object is not on disk");
                return Resolution::NotFound;
            }
            None => {}
        }

        // Writes follow the ring under this policy, so the ring owner is
        // the best remaining guess when the registry knows nothing.
        if self.write_policy == WritePolicy::RedirectToOwner {
            if let Some(owner) = self.ring.locate(&key.to_string()) {
                if owner != self.local {
                    return Resolution::Redirect(RedirectTarget::for_node(&owner, key, op));
                }
            }
        }

        Resolution::NotFound
    }

    /// Advertise this node as the owner of `key` after a local write
    pub async fn record_write(&self, key: &ObjectKey) -> bool {
        self.registry.put(key, &self.local).await
    }

    /// Withdraw the record for `key` after a local delete
    pub async fn record_delete(&self, key: &ObjectKey) -> bool {
        self.registry.delete(key).await
    }

    /// Registry record for `key`, if any
    pub async fn recorded_owner(&self, key: &ObjectKey) -> Option<Node> {
        self.registry.get(key).await
    }
}
