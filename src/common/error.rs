//! Error types for fileio

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Storage Errors ===
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    // === Placement Errors ===
    #[error("Membership is empty: no node can own this object")]
    MembershipEmpty,

    #[error("Invalid node: {0}")]
    InvalidNode(String),

    // === Registry Errors ===
    #[error("Location registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("Location registry timed out after {0:?}")]
    RegistryTimeout(Duration),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Errors that mean "the shared store could not be reached".
    ///
    /// These are absorbed by the registry facade and turned into
    /// single-node behaviour, never surfaced to a request.
    pub fn is_registry_failure(&self) -> bool {
        matches!(
            self,
            Error::RegistryUnavailable(_) | Error::RegistryTimeout(_) | Error::Redis(_)
        )
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_failures_are_classified() {
        assert!(Error::RegistryUnavailable("down".into()).is_registry_failure());
        assert!(Error::RegistryTimeout(Duration::from_millis(5)).is_registry_failure());
        assert!(!Error::MembershipEmpty.is_registry_failure());
        assert!(!Error::ObjectNotFound("b:f".into()).is_registry_failure());
    }
}
