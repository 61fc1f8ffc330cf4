//! Node configuration.
//!
//! Sources are merged in order of increasing priority:
//! 1. Built-in defaults
//! 2. YAML file (`pmcr.yaml`, or the path given with `--config`)
//! 3. Environment variables (`PMCR_` prefix, `__` as the nesting separator,
//!    e.g. `PMCR_CYCLE__MAX_ITERATIONS=3`)

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use pmcr_client::HttpStageClient;
use pmcr_core::{ConvergencePolicy, CycleConfig, PmcrError, RetryPolicy};
use pmcr_stages::StageSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File read when no `--config` path is given.
pub const DEFAULT_CONFIG_FILE: &str = "pmcr.yaml";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid listen address: {0}")]
    InvalidAddr(String),

    #[error("max_concurrent_cycles must be at least 1")]
    NoCycleSlots,

    #[error("max_finished_cycles must be at least 1")]
    NoFinishedSlots,

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid URL for the {stage} stage: {url}")]
    InvalidStageUrl { stage: &'static str, url: String },

    #[error(transparent)]
    Cycle(#[from] PmcrError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub server: ServerConfig,
    pub cycle: CycleSection,
    pub stages: StagesConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address.
    pub addr: String,

    /// Cycles allowed to run at once; further cycles queue.
    pub max_concurrent_cycles: usize,

    /// Finished background cycles kept for inspection; older ones are evicted.
    pub max_finished_cycles: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:3000".to_string(),
            max_concurrent_cycles: 16,
            max_finished_cycles: 256,
        }
    }
}

/// Bounds applied to every cycle the node runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleSection {
    pub max_iterations: u32,
    pub per_stage_timeout_ms: u64,
    pub cycle_deadline_ms: Option<u64>,
    pub retry: RetryPolicy,
    pub policy: ConvergencePolicy,
    pub default_artifact_type: String,
}

impl Default for CycleSection {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            per_stage_timeout_ms: 30_000,
            cycle_deadline_ms: None,
            retry: RetryPolicy::default(),
            policy: ConvergencePolicy::default(),
            default_artifact_type: "text".to_string(),
        }
    }
}

impl CycleSection {
    pub fn to_cycle_config(&self) -> CycleConfig {
        let mut config = CycleConfig::new(
            self.max_iterations,
            Duration::from_millis(self.per_stage_timeout_ms),
        )
        .with_retry(self.retry.clone())
        .with_policy(self.policy)
        .with_default_artifact_type(self.default_artifact_type.clone());

        if let Some(deadline_ms) = self.cycle_deadline_ms {
            config = config.with_deadline(Duration::from_millis(deadline_ms));
        }
        config
    }
}

/// Remote stage endpoints. A stage without a URL runs in-process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagesConfig {
    pub plan_url: Option<String>,
    pub make_url: Option<String>,
    pub check_url: Option<String>,
    pub reflect_url: Option<String>,
}

impl StagesConfig {
    fn urls(&self) -> [(&'static str, Option<&str>); 4] {
        [
            ("plan", self.plan_url.as_deref()),
            ("make", self.make_url.as_deref()),
            ("check", self.check_url.as_deref()),
            ("reflect", self.reflect_url.as_deref()),
        ]
    }

    /// Build the stage set the orchestrator calls.
    ///
    /// All remote stages share one connection pool.
    pub fn build(&self) -> StageSet {
        let http = reqwest::Client::new();
        let remote = |url: &str| Arc::new(HttpStageClient::with_client(url, http.clone()));

        let mut stages = StageSet::rule_based();
        if let Some(url) = self.plan_url.as_deref() {
            stages = stages.with_plan(remote(url));
        }
        if let Some(url) = self.make_url.as_deref() {
            stages = stages.with_make(remote(url));
        }
        if let Some(url) = self.check_url.as_deref() {
            stages = stages.with_check(remote(url));
        }
        if let Some(url) = self.reflect_url.as_deref() {
            stages = stages.with_reflect(remote(url));
        }
        stages
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter level; `RUST_LOG` takes precedence.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl NodeConfig {
    /// Load configuration from defaults, the YAML file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let figment = Figment::new()
            .merge(Serialized::defaults(NodeConfig::default()))
            .merge(Yaml::file(file))
            .merge(Env::prefixed("PMCR_").split("__"));

        Self::from_figment(figment)
            .with_context(|| format!("Failed to load configuration from {}", file.display()))
    }

    /// Extract and validate a configuration from `figment`.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: NodeConfig = figment
            .extract()
            .context("Failed to extract configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.server
            .addr
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidAddr(self.server.addr.clone()))?;

        if self.server.max_concurrent_cycles == 0 {
            return Err(ConfigError::NoCycleSlots);
        }

        if self.server.max_finished_cycles == 0 {
            return Err(ConfigError::NoFinishedSlots);
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.logging.level.clone()));
        }

        for (stage, url) in self.stages.urls() {
            if let Some(url) = url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ConfigError::InvalidStageUrl {
                        stage,
                        url: url.to_string(),
                    });
                }
            }
        }

        self.cycle.to_cycle_config().validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_yaml(yaml: &str) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(NodeConfig::default()))
            .merge(Yaml::string(yaml))
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = NodeConfig::default();
        assert!(config.validate().is_ok());

        let cycle = config.cycle.to_cycle_config();
        assert_eq!(cycle.max_iterations, 5);
        assert_eq!(cycle.per_stage_timeout, Duration::from_secs(30));
        assert_eq!(cycle.cycle_deadline, None);
    }

    #[test]
    fn test_yaml_overrides_defaults() {
        let config = NodeConfig::from_figment(with_yaml(
            r#"
server:
  addr: "127.0.0.1:8080"
  max_finished_cycles: 64
cycle:
  max_iterations: 3
  per_stage_timeout_ms: 2000
  cycle_deadline_ms: 60000
  policy: reflection_first
  retry:
    max_retries: 1
    initial_backoff_ms: 10
    max_backoff_ms: 100
stages:
  check_url: "http://checker:9000"
logging:
  format: json
"#,
        ))
        .unwrap();

        assert_eq!(config.server.addr, "127.0.0.1:8080");
        assert_eq!(config.server.max_concurrent_cycles, 16);
        assert_eq!(config.server.max_finished_cycles, 64);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.stages.check_url.as_deref(), Some("http://checker:9000"));

        let cycle = config.cycle.to_cycle_config();
        assert_eq!(cycle.max_iterations, 3);
        assert_eq!(cycle.cycle_deadline, Some(Duration::from_secs(60)));
        assert_eq!(cycle.policy, ConvergencePolicy::ReflectionFirst);
        assert_eq!(cycle.retry.max_retries, 1);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let mut config = NodeConfig::default();
        config.logging.level = "verbose".into();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLogLevel(_))));

        let mut config = NodeConfig::default();
        config.server.addr = "not an address".into();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidAddr(_))));

        let mut config = NodeConfig::default();
        config.stages.plan_url = Some("planner:9000".into());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidStageUrl { stage: "plan", .. })
        ));

        let mut config = NodeConfig::default();
        config.server.max_finished_cycles = 0;
        assert!(matches!(config.validate(), Err(ConfigError::NoFinishedSlots)));

        let mut config = NodeConfig::default();
        config.cycle.max_iterations = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Cycle(_))));
    }

    #[test]
    fn test_deadline_below_minimum_is_rejected() {
        let result = NodeConfig::from_figment(with_yaml(
            "cycle:\n  max_iterations: 2\n  per_stage_timeout_ms: 1000\n  cycle_deadline_ms: 5000\n",
        ));
        assert!(result.is_err());
    }
}
