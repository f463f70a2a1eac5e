use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

use crate::common::secrets::patterns::RiskLevel;
use crate::kernel::gateway::DedupScope;

/// Which mapping store backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-process map with a background expiry sweep. Single-process only.
    Memory,
    /// Shared redis instance; required when multiple processes share
    /// session state.
    Redis,
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub redis_url: String,
    /// How long a session mapping survives without being refreshed.
    pub mapping_ttl: Duration,
    pub fuzzy_matching_enabled: bool,
    pub dedup_scope: DedupScope,
    /// Recognizer candidates below this confidence are discarded.
    pub min_entity_score: f32,
    /// Risk levels that veto a request outright.
    pub secret_block_levels: Vec<RiskLevel>,
    pub recognition_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let store_backend = match env::var("MAPPING_STORE")
            .unwrap_or_else(|_| "memory".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => StoreBackend::Memory,
            "redis" => StoreBackend::Redis,
            other => anyhow::bail!("MAPPING_STORE must be `memory` or `redis`, got `{other}`"),
        };

        let mapping_ttl_secs: u64 = env::var("MAPPING_TTL_SECS")
            .unwrap_or_else(|_| "1800".to_string())
            .parse()
            .context("MAPPING_TTL_SECS must be a valid number of seconds")?;

        let dedup_scope = match env::var("PLACEHOLDER_DEDUP_SCOPE")
            .unwrap_or_else(|_| "session".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "session" => DedupScope::Session,
            "request" => DedupScope::Request,
            other => {
                anyhow::bail!("PLACEHOLDER_DEDUP_SCOPE must be `session` or `request`, got `{other}`")
            }
        };

        let secret_block_levels = env::var("SECRET_BLOCK_LEVELS")
            .unwrap_or_else(|_| "critical,high".to_string())
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                s.parse::<RiskLevel>()
                    .map_err(|e| anyhow::anyhow!("SECRET_BLOCK_LEVELS: {e}"))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            store_backend,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            mapping_ttl: Duration::from_secs(mapping_ttl_secs),
            fuzzy_matching_enabled: env_flag("FUZZY_MATCHING_ENABLED", true)?,
            dedup_scope,
            min_entity_score: env::var("MIN_ENTITY_SCORE")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()
                .context("MIN_ENTITY_SCORE must be a valid float")?,
            secret_block_levels,
            recognition_enabled: env_flag("RECOGNITION_ENABLED", true)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::Memory,
            redis_url: "redis://localhost:6379".to_string(),
            mapping_ttl: Duration::from_secs(1800),
            fuzzy_matching_enabled: true,
            dedup_scope: DedupScope::Session,
            min_entity_score: 0.5,
            secret_block_levels: vec![RiskLevel::Critical, RiskLevel::High],
            recognition_enabled: true,
        }
    }
}

fn env_flag(key: &str, default: bool) -> Result<bool> {
    match env::var(key) {
        Ok(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => anyhow::bail!("{key} must be a boolean flag, got `{other}`"),
        },
        Err(_) => Ok(default),
    }
}
