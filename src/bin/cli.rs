//! CLI for cluster placement operations

use anyhow::Context;
use clap::{Parser, Subcommand};
use fileio::cluster::{HashRing, LocationRegistry, MembershipTracker, Node, SharedRing};
use fileio::common::{Config, Error, ObjectKey};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "fileio")]
#[command(about = "fileio placement and location CLI")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish this node and keep its ring fresh until Ctrl-C
    Join {
        /// Node ID
        #[arg(long)]
        id: Option<String>,

        /// Advertised host
        #[arg(long)]
        host: Option<String>,

        /// Advertised port
        #[arg(long)]
        port: Option<u16>,

        /// Withdraw from the member set on exit
        #[arg(long)]
        leave_on_exit: bool,
    },

    /// List registry members and configured nodes
    Members,

    /// Ring owner of an object under the current membership
    Locate {
        bucket: String,
        filename: String,
    },

    /// Node recorded as holding an object
    Whereis {
        bucket: String,
        filename: String,
    },

    /// Remove a node from the registry member set
    Forget {
        /// Node ID
        node: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(level) = cli.log_level.clone() {
        config.log_level = level;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Join {
            id,
            host,
            port,
            leave_on_exit,
        } => {
            if id.is_some() {
                config.node.id = id;
            }
            if let Some(host) = host {
                config.node.public_host = host;
            }
            if let Some(port) = port {
                config.node.port = port;
            }
            config.validate()?;
            join(&config, leave_on_exit).await?;
        }

        Commands::Members => {
            let registry = LocationRegistry::from_config(&config.registry)?;
            let members = registry.try_list_members().await?;
            println!("Registry members: {}", members.len());
            for node in &members {
                println!("  {}", node);
            }
            let configured = config.static_nodes()?;
            println!("Configured nodes: {}", configured.len());
            for node in &configured {
                println!("  {}", node);
            }
        }

        Commands::Locate { bucket, filename } => {
            let key = ObjectKey::new(bucket, filename)?;
            let tracker = tracker(&config)?;
            let outcome = tracker.refresh().await;
            if !outcome.registry_ok && tracker.registry().is_enabled() {
                eprintln!("warning: registry unreachable, using configured nodes only");
            }
            let owner = tracker
                .ring()
                .locate(&key.to_string())
                .ok_or(Error::MembershipEmpty)?;
            println!("{} -> {}", key, owner);
        }

        Commands::Whereis { bucket, filename } => {
            let key = ObjectKey::new(bucket, filename)?;
            let registry = LocationRegistry::from_config(&config.registry)?;
            match registry.try_get(&key).await? {
                Some(owner) => println!("{} -> {}", key, owner),
                None => return Err(Error::ObjectNotFound(key.to_string()).into()),
            }
        }

        Commands::Forget { node } => {
            let registry = LocationRegistry::from_config(&config.registry)?;
            // Removal matches on id only
            let removed = registry.try_remove_member(&Node::new(node.clone(), "", 0)).await?;
            if removed == 0 {
                println!("{} was not a member", node);
            } else {
                println!("Removed {} ({} entries)", node, removed);
            }
        }
    }

    Ok(())
}

fn tracker(config: &Config) -> anyhow::Result<Arc<MembershipTracker>> {
    let registry = LocationRegistry::from_config(&config.registry)?;
    let ring = Arc::new(SharedRing::new(HashRing::new(
        config.placement.replicas,
        config.placement.hash,
    )));
    Ok(Arc::new(MembershipTracker::new(
        config.local_node(),
        config.static_nodes()?,
        registry,
        ring,
    )))
}

async fn join(config: &Config, leave_on_exit: bool) -> anyhow::Result<()> {
    let tracker = tracker(config)?;

    tracing::info!("Joining as {}", tracker.local_node());
    tracing::info!("Refresh interval: {:?}", config.placement.refresh_interval());
    tracker.join().await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tracker
        .clone()
        .spawn_refresh_loop(config.placement.refresh_interval(), shutdown_rx);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    let _ = shutdown_tx.send(true);
    handle.await?;

    if leave_on_exit {
        tracker.leave().await;
    }
    Ok(())
}
