//! Cluster membership
//!
//! Tracks this node's identity, publishes it to the registry and keeps the
//! shared ring in line with the live member set. The ring is always built
//! from: registry members ∪ statically configured nodes ∪ self.
//!
//! There is no failure detection. A node that crashes stays in the member
//! set, and so on every ring, until someone removes it by hand
//! ([`LocationRegistry::remove_member`]).

use crate::cluster::node::Node;
use crate::cluster::registry::LocationRegistry;
use crate::cluster::ring::{HashRing, SharedRing};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Result of one membership refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// The ring was rebuilt
    pub changed: bool,
    /// The registry answered; when false the last known members were reused
    pub registry_ok: bool,
    /// Distinct members on the ring afterwards
    pub members: usize,
}

pub struct MembershipTracker {
    local: Node,
    static_nodes: Vec<Node>,
    registry: LocationRegistry,
    ring: Arc<SharedRing>,
    /// Members last read from the registry
    known: Mutex<BTreeSet<Node>>,
    /// Held for a whole refresh so member sets are published in read order
    refreshing: tokio::sync::Mutex<()>,
}

impl MembershipTracker {
    /// Create a tracker and seed `ring` with self and the static nodes
    pub fn new(
        local: Node,
        static_nodes: Vec<Node>,
        registry: LocationRegistry,
        ring: Arc<SharedRing>,
    ) -> Self {
        let tracker = Self {
            local,
            static_nodes,
            registry,
            ring,
            known: Mutex::new(BTreeSet::new()),
            refreshing: tokio::sync::Mutex::new(()),
        };
        tracker.rebuild_if_changed(tracker.desired_members(&BTreeSet::new()));
        tracker
    }

    pub fn local_node(&self) -> &Node {
        &self.local
    }

    pub fn ring(&self) -> &Arc<SharedRing> {
        &self.ring
    }

    pub fn registry(&self) -> &LocationRegistry {
        &self.registry
    }

    /// The raw configured server list
    pub fn configured_nodes(&self) -> &[Node] {
        &self.static_nodes
    }

    /// Distinct nodes on the current ring
    pub fn members(&self) -> BTreeSet<Node> {
        self.ring.members()
    }

    /// Publish self to the registry, then refresh the ring
    ///
    /// Returns whether the publish reached the registry. A node that could
    /// not publish still serves; it is just invisible to the others.
    pub async fn join(&self) -> bool {
        let published = self.registry.add_member(&self.local).await;
        if published {
            tracing::info!(node = %self.local, "Joined cluster");
        } else {
            tracing::warn!(node = %self.local, "Could not publish membership, continuing in single-node mode");
        }
        self.refresh().await;
        published
    }

    /// Withdraw self from the registry's member set
    pub async fn leave(&self) -> bool {
        let removed = self.registry.remove_member(&self.local).await;
        if removed {
            tracing::info!(node = %self.local, "Left cluster");
        }
        removed
    }

    /// Re-read the member set and rebuild the ring if it changed
    pub async fn refresh(&self) -> RefreshOutcome {
        let _serial = self.refreshing.lock().await;
        let (registry_members, registry_ok) = match self.registry.try_list_members().await {
            Ok(members) => {
                *self.known.lock().unwrap_or_else(|e| e.into_inner()) = members.clone();
                (members, true)
            }
            Err(e) => {
                if self.registry.is_enabled() {
                    tracing::warn!(error = %e, "Membership refresh failed, keeping last known members");
                }
                let known = self.known.lock().unwrap_or_else(|e| e.into_inner()).clone();
                (known, false)
            }
        };

        let desired = self.desired_members(&registry_members);
        let members = desired.len();
        let changed = self.rebuild_if_changed(desired);

        RefreshOutcome {
            changed,
            registry_ok,
            members,
        }
    }

    /// Refresh every `interval` until `shutdown` turns true or is dropped
    pub fn spawn_refresh_loop(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let outcome = self.refresh().await;
                        tracing::debug!(
                            changed = outcome.changed,
                            registry_ok = outcome.registry_ok,
                            members = outcome.members,
                            "Membership refreshed"
                        );
                    }
                    res = shutdown.changed() => {
                        if res.is_err() || *shutdown.borrow() {
                            tracing::debug!("Membership refresh loop stopped");
                            break;
                        }
                    }
                }
            }
        })
    }

    fn desired_members(&self, registry_members: &BTreeSet<Node>) -> BTreeSet<Node> {
        // Self first: our own address is authoritative for our id
        let mut desired = BTreeSet::new();
        desired.insert(self.local.clone());
        for node in registry_members.iter().chain(self.static_nodes.iter()) {
            if !desired.contains(node) {
                desired.insert(node.clone());
            }
        }
        desired
    }

    fn rebuild_if_changed(&self, desired: BTreeSet<Node>) -> bool {
        let current = self.ring.snapshot();
        let current_members = current.members();
        if same_addresses(&current_members, &desired) && !current.is_empty() {
            return false;
        }

        let added: Vec<&str> = desired
            .difference(&current_members)
            .map(|n| n.id.as_str())
            .collect();
        let removed: Vec<&str> = current_members
            .difference(&desired)
            .map(|n| n.id.as_str())
            .collect();

        let next = HashRing::with_nodes(current.replicas(), current.algorithm(), &desired);
        self.ring.replace(next);

        tracing::info!(
            members = desired.len(),
            added = ?added,
            removed = ?removed,
            "Rebuilt placement ring"
        );
        true
    }
}

/// Equal ids and equal advertised addresses
fn same_addresses(a: &BTreeSet<Node>, b: &BTreeSet<Node>) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b.iter())
            .all(|(x, y)| x.id == y.id && x.host == y.host && x.port == y.port)
}
