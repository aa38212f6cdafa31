//! Configuration for fileio nodes
//!
//! Sources, lowest priority first:
//! 1. built-in defaults
//! 2. an optional TOML file
//! 3. `FILEIO__SECTION__FIELD` environment variables
//! 4. the plain deployment variables (`ROOT_DIR`, `PORT`, `PUBLIC_HOST`,
//!    `REDIS_URL`, `REDIS_HOST`, `REDIS_PORT`, `REDIS_PASSWORD`)
//!
//! Command-line flags are applied on top by the binary.

use crate::cluster::Node;
use crate::common::hash::HashAlgorithm;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Global configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// This node's identity and local storage
    pub node: NodeConfig,

    /// Shared location registry
    pub registry: RegistryConfig,

    /// Ring placement
    pub placement: PlacementConfig,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node ID; defaults to `server-{pid}`
    pub id: Option<String>,

    /// Host other nodes and clients use to reach this node
    pub public_host: String,

    /// Port other nodes and clients use to reach this node
    pub port: u16,

    /// Root directory for buckets
    pub root_dir: PathBuf,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: None,
            public_host: "localhost".to_string(),
            port: 3001,
            root_dir: PathBuf::from("./storage"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Redis URL; no URL means the node runs in single-node mode
    pub url: Option<String>,

    /// Upper bound on any single registry call
    pub timeout_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: 500,
        }
    }
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Where writes are accepted relative to the ring owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Writes land on whichever node received them; ring placement is advisory
    #[default]
    LandLocally,
    /// Writes (and registry misses on read) are redirected to the ring owner
    RedirectToOwner,
}

impl std::str::FromStr for WritePolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "land_locally" | "local" => Ok(WritePolicy::LandLocally),
            "redirect_to_owner" | "redirect" => Ok(WritePolicy::RedirectToOwner),
            other => Err(crate::Error::InvalidConfig(format!(
                "unknown write policy: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Virtual nodes per physical node
    pub replicas: usize,

    /// Ring hash function; must match across the cluster
    pub hash: HashAlgorithm,

    pub write_policy: WritePolicy,

    /// Fixed server list (`id@host:port`) seeding the ring
    pub static_nodes: Vec<String>,

    /// Membership refresh interval
    pub refresh_interval_secs: u64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            replicas: 10,
            hash: HashAlgorithm::default(),
            write_policy: WritePolicy::default(),
            static_nodes: Vec::new(),
            refresh_interval_secs: 30,
        }
    }
}

impl PlacementConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl Config {
    /// Load configuration from defaults, an optional file and the process environment
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::load_with(path, &vars)
    }

    /// Same as [`Config::load`] with an explicit variable set
    pub fn load_with(path: Option<&Path>, vars: &HashMap<String, String>) -> crate::Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        } else {
            builder = builder.add_source(config::File::with_name("fileio").required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("FILEIO")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("placement.static_nodes")
                .source(Some(vars.clone())),
        );

        builder = builder
            .set_override_option("node.root_dir", vars.get("ROOT_DIR").cloned())?
            .set_override_option("node.public_host", vars.get("PUBLIC_HOST").cloned())?
            .set_override_option("node.port", vars.get("PORT").cloned())?
            .set_override_option("registry.url", redis_url_from_vars(vars))?;

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the cluster cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.placement.replicas == 0 {
            return Err(crate::Error::InvalidConfig(
                "placement.replicas must be at least 1".into(),
            ));
        }
        if self.node.port == 0 {
            return Err(crate::Error::InvalidConfig("node.port cannot be 0".into()));
        }
        if self.registry.timeout_ms == 0 {
            return Err(crate::Error::InvalidConfig(
                "registry.timeout_ms must be positive".into(),
            ));
        }
        if self.placement.refresh_interval_secs == 0 {
            return Err(crate::Error::InvalidConfig(
                "placement.refresh_interval_secs must be positive".into(),
            ));
        }

        let mut seen = HashSet::new();
        for node in self.static_nodes()? {
            if !seen.insert(node.id.clone()) {
                return Err(crate::Error::InvalidConfig(format!(
                    "duplicate node id in static_nodes: {}",
                    node.id
                )));
            }
        }

        Ok(())
    }

    /// This node's identity
    pub fn local_node(&self) -> Node {
        let id = self
            .node
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(crate::common::utils::default_node_id);
        Node::new(id, self.node.public_host.clone(), self.node.port)
    }

    /// Parsed fixed server list
    pub fn static_nodes(&self) -> crate::Result<Vec<Node>> {
        self.placement
            .static_nodes
            .iter()
            .map(|s| s.parse::<Node>())
            .collect()
    }
}

/// Build a redis URL the way existing deployments set it up
///
/// `REDIS_URL` wins; otherwise `REDIS_HOST` (with optional `REDIS_PORT`
/// and `REDIS_PASSWORD`) is assembled into `redis://[:pass@]host:port/`.
fn redis_url_from_vars(vars: &HashMap<String, String>) -> Option<String> {
    if let Some(url) = vars.get("REDIS_URL").filter(|v| !v.is_empty()) {
        return Some(url.clone());
    }

    let host = vars.get("REDIS_HOST").filter(|v| !v.is_empty())?;
    let port = vars
        .get("REDIS_PORT")
        .filter(|v| !v.is_empty())
        .map(String::as_str)
        .unwrap_or("6379");

    match vars.get("REDIS_PASSWORD").filter(|v| !v.is_empty()) {
        Some(pass) => Some(format!("redis://:{}@{}:{}/", pass, host, port)),
        None => Some(format!("redis://{}:{}/", host, port)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.toml");
        std::fs::write(&path, "").unwrap();

        let config = Config::load_with(Some(&path), &HashMap::new()).unwrap();
        assert_eq!(config.node.port, 3001);
        assert_eq!(config.node.public_host, "localhost");
        assert_eq!(config.placement.replicas, 10);
        assert_eq!(config.placement.hash, HashAlgorithm::Blake3);
        assert_eq!(config.placement.write_policy, WritePolicy::LandLocally);
        assert!(config.registry.url.is_none());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_file_and_deployment_vars() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fileio.toml");
        std::fs::write(
            &path,
            r#"
[node]
id = "node-a"
port = 4000

[placement]
replicas = 20
hash = "legacy32"
write_policy = "redirect_to_owner"
static_nodes = ["node-b@10.0.0.2:4000", "node-c@10.0.0.3:4000"]
"#,
        )
        .unwrap();

        let env = vars(&[("PORT", "4100"), ("REDIS_HOST", "cache"), ("REDIS_PASSWORD", "s3cret")]);
        let config = Config::load_with(Some(&path), &env).unwrap();

        assert_eq!(config.local_node().id, "node-a");
        assert_eq!(config.node.port, 4100);
        assert_eq!(config.placement.replicas, 20);
        assert_eq!(config.placement.hash, HashAlgorithm::Legacy32);
        assert_eq!(config.placement.write_policy, WritePolicy::RedirectToOwner);
        assert_eq!(config.static_nodes().unwrap().len(), 2);
        assert_eq!(
            config.registry.url.as_deref(),
            Some("redis://:s3cret@cache:6379/")
        );
    }

    #[test]
    fn test_duplicate_static_ids_rejected() {
        let mut config = Config::default();
        config.placement.static_nodes = vec!["a@h1:1".into(), "a@h2:2".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_replicas_rejected() {
        let mut config = Config::default();
        config.placement.replicas = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_redis_url_precedence() {
        assert_eq!(redis_url_from_vars(&HashMap::new()), None);
        assert_eq!(
            redis_url_from_vars(&vars(&[("REDIS_HOST", "r"), ("REDIS_PORT", "7000")])),
            Some("redis://r:7000/".to_string())
        );
        assert_eq!(
            redis_url_from_vars(&vars(&[("REDIS_URL", "redis://x/"), ("REDIS_HOST", "r")])),
            Some("redis://x/".to_string())
        );
    }

    #[test]
    fn test_write_policy_parse() {
        assert_eq!("redirect".parse::<WritePolicy>().unwrap(), WritePolicy::RedirectToOwner);
        assert!("forward".parse::<WritePolicy>().is_err());
    }
}
