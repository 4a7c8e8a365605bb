//! TOML configuration for the Reef daemon.
//!
//! Every section is optional; an empty file (or no file at all) yields the
//! three-region default deployment on local Redis ports.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use reef_placement::DEFAULT_REPLICAS;
use reef_types::{AffinityPolicy, NodeId};
use serde::Deserialize;

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Cache nodes: region name -> `host:port`.
    pub nodes: BTreeMap<String, String>,
    /// Hash ring tuning.
    pub ring: RingSection,
    /// Region affinity.
    pub routing: RoutingSection,
    /// Cache backend and timeouts.
    pub cache: CacheSection,
    /// Logging configuration.
    pub log: LogSection,
}

impl Default for CliConfig {
    fn default() -> Self {
        let nodes = [
            ("Europe", "localhost:6379"),
            ("Asia", "localhost:6380"),
            ("NorthAmerica", "localhost:6381"),
        ]
        .into_iter()
        .map(|(region, addr)| (region.to_string(), addr.to_string()))
        .collect();

        Self {
            nodes,
            ring: RingSection::default(),
            routing: RoutingSection::default(),
            cache: CacheSection::default(),
            log: LogSection::default(),
        }
    }
}

/// `[ring]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RingSection {
    /// Virtual replicas per node. Defaults to 100.
    pub replicas: Option<u32>,
}

/// `[routing]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RoutingSection {
    /// `"region"` (a known caller region always wins) or `"ring"`.
    pub affinity: AffinityPolicy,
}

/// `[cache]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Backend type: `"redis"` (default) or `"memory"`.
    pub backend: String,
    /// TTL in seconds for values written back after a miss.
    pub ttl_secs: Option<u64>,
    /// Redis connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
    /// Redis per-command timeout in milliseconds.
    pub response_timeout_ms: Option<u64>,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            backend: "redis".to_string(),
            ttl_secs: None,
            connect_timeout_ms: None,
            response_timeout_ms: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Human-readable lines.
    Text,
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl CliConfig {
    /// Load config from a TOML file, or use defaults if no path given.
    ///
    /// The result is not validated; call [`CliConfig::validate`] once CLI
    /// overrides have been applied.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("failed to read {}", p.display()))?;
                toml::from_str(&content)?
            }
            None => Self::default(),
        };
        Ok(config)
    }

    /// Parse config from a TOML string (used in tests).
    #[cfg(test)]
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the registry could never serve.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.nodes.is_empty() {
            bail!("no cache nodes configured");
        }
        if self.replicas() == 0 {
            bail!("ring.replicas must be at least 1");
        }
        if let Some((region, _)) = self.nodes.iter().find(|(_, addr)| addr.trim().is_empty()) {
            bail!("node {region:?} has an empty address");
        }
        match self.cache.backend.as_str() {
            "redis" | "memory" => Ok(()),
            other => bail!("unknown cache backend {other:?} (expected \"redis\" or \"memory\")"),
        }
    }

    /// Configured nodes keyed by [`NodeId`].
    pub fn node_addresses(&self) -> BTreeMap<NodeId, String> {
        self.nodes
            .iter()
            .map(|(region, addr)| (NodeId::from(region.as_str()), addr.clone()))
            .collect()
    }

    /// Effective virtual replicas per node.
    pub fn replicas(&self) -> u32 {
        self.ring.replicas.unwrap_or(DEFAULT_REPLICAS)
    }

    /// Whether the in-memory backend is selected.
    pub fn memory_backend(&self) -> bool {
        self.cache.backend == "memory"
    }

    /// Effective write-back TTL. Defaults to 10 minutes.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs.unwrap_or(600))
    }

    /// Effective Redis connect timeout. Defaults to 2 s.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.cache.connect_timeout_ms.unwrap_or(2_000))
    }

    /// Effective Redis command timeout. Defaults to 1 s.
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.cache.response_timeout_ms.unwrap_or(1_000))
    }
}
