//! Placement and location for a cluster of object nodes
//!
//! - `ring`: consistent-hash placement over the member set
//! - `registry`: shared object-to-node records and membership list
//! - `membership`: keeps the ring in line with the registry
//! - `resolver`: serve, redirect or not-found for each operation

pub mod membership;
pub mod node;
pub mod registry;
pub mod resolver;
pub mod ring;

pub use membership::{MembershipTracker, RefreshOutcome};
pub use node::Node;
pub use registry::{LocationRegistry, MemoryBackend, RedisBackend, RegistryBackend};
pub use resolver::{LocationResolver, Operation, RedirectTarget, Resolution};
pub use ring::{HashRing, SharedRing};
