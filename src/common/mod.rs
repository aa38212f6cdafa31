//! Common utilities and types shared across fileio

pub mod config;
pub mod error;
pub mod hash;
pub mod key;
pub mod storage;
pub mod utils;

pub use config::{Config, NodeConfig, PlacementConfig, RegistryConfig, WritePolicy};
pub use error::{Error, Result};
pub use hash::{blake3_hash64, legacy_hash32, HashAlgorithm, RingPosition};
pub use key::ObjectKey;
pub use storage::{FsStore, LocalStore, MemStore, ObjectMeta};
pub use utils::{encode_segment, format_time, unique_object_name, validate_segment};
