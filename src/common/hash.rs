//! Hashing utilities for fileio
//!
//! - BLAKE3 (truncated to 64 bits) for ring positions, the default
//! - Legacy 32-bit rolling checksum, kept for clusters that must agree
//!   with nodes placing keys the old way
//!
//! Every node of a cluster must be configured with the same algorithm:
//! placement is only consistent if all nodes compute identical positions
//! for identical strings.

use serde::{Deserialize, Serialize};

/// Position on the ring. Both algorithms map into this space.
pub type RingPosition = i64;

/// Ring-wide hash function selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Blake3,
    Legacy32,
}

impl HashAlgorithm {
    /// Hash a key string to its ring position
    pub fn position(&self, key: &str) -> RingPosition {
        match self {
            HashAlgorithm::Blake3 => blake3_hash64(key),
            HashAlgorithm::Legacy32 => legacy_hash32(key) as RingPosition,
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashAlgorithm::Blake3 => write!(f, "blake3"),
            HashAlgorithm::Legacy32 => write!(f, "legacy32"),
        }
    }
}

impl std::str::FromStr for HashAlgorithm {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "blake3" => Ok(HashAlgorithm::Blake3),
            "legacy32" | "legacy" => Ok(HashAlgorithm::Legacy32),
            other => Err(crate::Error::InvalidConfig(format!(
                "unknown hash algorithm: {}",
                other
            ))),
        }
    }
}

/// First 8 bytes of BLAKE3(key), little endian, as a signed position
pub fn blake3_hash64(key: &str) -> RingPosition {
    let hash = blake3::hash(key.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&hash.as_bytes()[0..8]);
    i64::from_le_bytes(head)
}

/// 32-bit rolling multiply-and-add checksum (`h = h * 31 + byte`)
///
/// Operates on the UTF-8 bytes so that every implementation agrees
/// on the result for non-ASCII keys. Arithmetic wraps in signed 32 bits.
pub fn legacy_hash32(key: &str) -> i32 {
    key.bytes()
        .fold(0i32, |h, b| h.wrapping_mul(31).wrapping_add(b as i32))
}
