//! `reefd` — the Reef cache router.
//!
//! Connects to the configured regional cache nodes, routes keys through the
//! hash ring with region affinity, and serves read-through lookups against a
//! small demo catalogue.
//!
//! # Usage
//!
//! ```text
//! reefd fetch --key book::1984 --region Europe    # read-through lookup
//! reefd fetch -k book::1984 -r Asia --memory      # same, without Redis
//! reefd route --key book::1984 --region Africa    # show the routing decision
//! reefd ring --samples 100000                     # ring balance report
//! reefd -c reef.toml --affinity ring route -k k -r Europe
//! ```

mod config;
mod telemetry;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use reef_engine::{ReadThrough, StaticLoader};
use reef_placement::HashRing;
use reef_router::{AccessTracker, NodeRegistry, Router};
use reef_store::{Connector, MemoryConnector, RedisConnector};
use reef_types::{AffinityPolicy, NodeId};
use tracing::{info, warn};

use config::CliConfig;

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "reefd", version, about = "Region-aware cache router")]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

/// Flags that take precedence over the config file.
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Use in-process memory nodes instead of Redis.
    #[arg(short, long, global = true)]
    memory: bool,

    /// Virtual replicas per node on the hash ring.
    #[arg(long, global = true)]
    replicas: Option<u32>,

    /// Region affinity policy: "region" or "ring".
    #[arg(long, global = true)]
    affinity: Option<AffinityPolicy>,
}

impl Overrides {
    fn apply(self, config: &mut CliConfig) {
        if self.memory {
            config.cache.backend = "memory".to_string();
        }
        if let Some(replicas) = self.replicas {
            config.ring.replicas = Some(replicas);
        }
        if let Some(affinity) = self.affinity {
            config.routing.affinity = affinity;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a key through the cache, loading it on a miss.
    Fetch {
        /// Key to look up.
        #[arg(short, long)]
        key: String,

        /// Region the caller is in.
        #[arg(short, long)]
        region: String,
    },

    /// Show which node would serve a key and why.
    Route {
        /// Key to route.
        #[arg(short, long)]
        key: String,

        /// Region the caller is in.
        #[arg(short, long)]
        region: String,
    },

    /// Show ring slot ownership and key distribution.
    Ring {
        /// Number of synthetic keys to place.
        #[arg(short = 'n', long, default_value = "10000")]
        samples: usize,
    },
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = CliConfig::load(cli.config.as_deref()).context("failed to load config")?;
    cli.overrides.apply(&mut config);
    config.validate()?;

    telemetry::init(&config.log);

    match cli.command {
        Commands::Fetch { key, region } => cmd_fetch(&config, &key, &region).await,
        Commands::Route { key, region } => cmd_route(&config, &key, &region).await,
        Commands::Ring { samples } => cmd_ring(&config, samples),
    }
}

// -----------------------------------------------------------------------
// Wiring
// -----------------------------------------------------------------------

fn build_connector(config: &CliConfig) -> Arc<dyn Connector> {
    if config.memory_backend() {
        Arc::new(MemoryConnector::new())
    } else {
        Arc::new(
            RedisConnector::new()
                .connect_timeout(config.connect_timeout())
                .response_timeout(config.response_timeout()),
        )
    }
}

/// Connect to every configured node and build a router over them.
async fn start_router(config: &CliConfig) -> Result<Arc<Router>> {
    let registry = Arc::new(NodeRegistry::new(build_connector(config), config.replicas()));
    registry
        .initialize(&config.node_addresses())
        .await
        .context("failed to initialize node registry")?;

    info!(
        nodes = registry.node_ids().len(),
        replicas = config.replicas(),
        backend = %config.cache.backend,
        affinity = %config.routing.affinity,
        "node registry ready"
    );

    let router = Router::new(registry, Arc::new(AccessTracker::new()))
        .with_policy(config.routing.affinity);
    Ok(Arc::new(router))
}

/// Close every node handle. Failures are logged, never fatal.
async fn shutdown(router: &Router) {
    for e in router.registry().cleanup().await {
        warn!(error = %e, "failed to close node");
    }
}

/// Backing data for `reefd fetch`.
fn demo_catalogue() -> StaticLoader {
    [
        ("book::1984", "Book: 1984, Genre: Programming, Price: $18.99"),
        ("book::dune", "Book: Dune, Genre: Science Fiction, Price: $12.50"),
        ("book::sicp", "Book: SICP, Genre: Programming, Price: $54.00"),
    ]
    .into_iter()
    .collect()
}

// -----------------------------------------------------------------------
// reefd fetch
// -----------------------------------------------------------------------

async fn cmd_fetch(config: &CliConfig, key: &str, region: &str) -> Result<()> {
    let router = start_router(config).await?;
    let read_through =
        ReadThrough::new(Arc::clone(&router), Arc::new(demo_catalogue())).with_ttl(config.ttl());

    let result = read_through.fetch_detailed(key, region).await;
    shutdown(&router).await;

    let outcome = result.with_context(|| format!("failed to fetch {key:?}"))?;
    info!(
        key,
        region,
        node = %outcome.node_id,
        hit = outcome.hit,
        reason = %outcome.reason,
        "fetched value"
    );
    println!("{}", outcome.value);
    Ok(())
}

// -----------------------------------------------------------------------
// reefd route
// -----------------------------------------------------------------------

async fn cmd_route(config: &CliConfig, key: &str, region: &str) -> Result<()> {
    let router = start_router(config).await?;
    let result = router.select(key, region);
    shutdown(&router).await;

    let selection = result?;
    println!("key:         {key}");
    println!("region:      {region}");
    println!("ring choice: {}", selection.ring_choice);
    println!("node:        {}", selection.node_id);
    println!("reason:      {}", selection.reason);
    Ok(())
}

// -----------------------------------------------------------------------
// reefd ring
// -----------------------------------------------------------------------

fn cmd_ring(config: &CliConfig, samples: usize) -> Result<()> {
    let ring = build_ring(config);
    let slots = ring.slot_counts();
    let owned = sample_ownership(&ring, samples);

    println!("Ring: {} nodes, {} slots", ring.node_count(), ring.slot_count());
    println!("{:<16} {:>8} {:>10}", "node", "slots", "share");
    for (node, count) in &slots {
        let keys = owned.get(node).copied().unwrap_or(0);
        let share = if samples == 0 {
            0.0
        } else {
            100.0 * keys as f64 / samples as f64
        };
        println!("{:<16} {:>8} {:>9.2}%", node.as_str(), count, share);
    }
    Ok(())
}

fn build_ring(config: &CliConfig) -> HashRing {
    let mut ring = HashRing::new(config.replicas());
    for node in config.node_addresses().into_keys() {
        ring.add_node(node);
    }
    ring
}

/// Count how many of `samples` synthetic keys each node owns.
fn sample_ownership(ring: &HashRing, samples: usize) -> BTreeMap<NodeId, usize> {
    let mut owned = BTreeMap::new();
    for i in 0..samples {
        if let Some(node) = ring.get_node(&format!("sample-{i}")) {
            *owned.entry(node.clone()).or_insert(0) += 1;
        }
    }
    owned
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
