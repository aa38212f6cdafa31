//! # fileio
//!
//! Placement and location for a bucketed object store spread over many
//! nodes:
//! - Consistent-hash ring with virtual nodes for write placement
//! - Shared location registry (redis) mapping objects to the node that holds them
//! - Membership tracking that keeps every node's ring in line with the registry
//! - Per-request resolution into serve locally, redirect, or not found
//!
//! Every node keeps serving when the registry is down: lookups degrade to
//! "not registered" and the ring falls back to the last known members.

#![allow(clippy::result_large_err)]
//!
//! ## Architecture
//!
//! ```text
//!        ┌─────────────────────────────┐
//!        │   Location registry (redis) │
//!        │  bucket:file -> node        │
//!        │  nodes       -> {members}   │
//!        └──────┬─────────┬─────────┬──┘
//!               │         │         │
//!        ┌──────▼───┐ ┌───▼──────┐ ┌▼─────────┐
//!        │ Node A   │ │ Node B   │ │ Node C   │
//!        │ ring     │ │ ring     │ │ ring     │
//!        │ resolver │ │ resolver │ │ resolver │
//!        │ disk     │ │ disk     │ │ disk     │
//!        └──────────┘ └──────────┘ └──────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Publish a node and keep its ring fresh
//! fileio join --id node-a --host 10.0.0.1 --port 3001
//!
//! # Which node would place this object?
//! fileio locate photos cat.jpg
//!
//! # Which node holds it?
//! fileio whereis photos cat.jpg
//! ```

pub mod cluster;
pub mod common;
pub mod node;

// Re-export commonly used types
pub use cluster::{HashRing, LocationRegistry, LocationResolver, MembershipTracker, Node, SharedRing};
pub use common::{Config, Error, ObjectKey, Result};
pub use node::ObjectNode;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");
