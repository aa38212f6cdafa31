//! Cluster node identity

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// A server taking part in the cluster
///
/// Identity is the `id` alone: two values with the same id are the same
/// node even if their advertised address differs. Serialized as
/// `{"id": .., "host": .., "port": ..}`, which is also the registry format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub host: String,
    pub port: u16,
}

impl Node {
    pub fn new(id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port,
        }
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}:{}", self.id, self.host, self.port)
    }
}

/// Parses `id@host:port`, or `host:port` with the address doubling as the id
impl std::str::FromStr for Node {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let s = s.trim();
        let (id, addr) = match s.split_once('@') {
            Some((id, addr)) => (id.to_string(), addr),
            None => (s.to_string(), s),
        };

        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| crate::Error::InvalidNode(format!("missing port in {}", s)))?;
        let port: u16 = port
            .parse()
            .map_err(|_| crate::Error::InvalidNode(format!("invalid port in {}", s)))?;

        if id.is_empty() || host.is_empty() {
            return Err(crate::Error::InvalidNode(format!(
                "expected id@host:port, got {}",
                s
            )));
        }

        Ok(Node::new(id, host, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identity_is_id() {
        let a = Node::new("a", "10.0.0.1", 3001);
        let moved = Node::new("a", "10.0.0.9", 4000);
        assert_eq!(a, moved);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(!set.insert(moved));
    }

    #[test]
    fn test_parse() {
        let n: Node = "node-b@10.0.0.2:3002".parse().unwrap();
        assert_eq!(n.id, "node-b");
        assert_eq!(n.host, "10.0.0.2");
        assert_eq!(n.port, 3002);

        let bare: Node = "localhost:3001".parse().unwrap();
        assert_eq!(bare.id, "localhost:3001");
        assert_eq!(bare.address(), "localhost:3001");

        assert!("node-b@host".parse::<Node>().is_err());
        assert!("node-b@host:notaport".parse::<Node>().is_err());
        assert!("@host:1".parse::<Node>().is_err());
    }

    #[test]
    fn test_json_format() {
        let n = Node::new("server-42", "localhost", 3001);
        let json = serde_json::to_string(&n).unwrap();
        assert_eq!(json, r#"{"id":"server-42","host":"localhost","port":3001}"#);
        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(back.port, 3001);
    }
}
