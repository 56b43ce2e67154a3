//! Configuration management for the intent engine
//!
//! Loads configuration from TOML files with environment variable substitution.
//! Settings are an explicit value handed to constructors; nothing reads
//! ambient global state after startup.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub engine: EngineConfig,
    pub orchestrator: OrchestratorConfig,
    pub account: AccountConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
    pub chains: HashMap<String, ChainConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub instance_id: String,
    /// Delay between settlement status polls
    pub poll_interval_ms: u64,
    /// Local wait bound; tracking past this returns Expired
    pub max_wait_secs: u64,
    /// Consecutive transient query failures tolerated before escalating
    pub max_query_retries: u32,
    /// Initial backoff after a transient query failure (doubles per retry)
    pub retry_backoff_ms: u64,
    /// How long settled records stay queryable before eviction
    pub settled_record_ttl_secs: u64,
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Base URL of the execution network API
    pub base_url: String,
    /// API key, typically injected via ${ORCHESTRATOR_API_KEY}
    pub api_key: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    /// Hex-encoded SEC1 secp256k1 verifying keys of the account owners
    pub owner_keys: Vec<String>,
    /// Account factory the counterfactual address is derived against
    pub factory_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    /// Known token addresses by symbol, e.g. USDC -> 0x...
    #[serde(default)]
    pub tokens: HashMap<String, String>,
    pub enabled: bool,
}

impl Settings {
    /// Load settings from configuration files
    pub fn load() -> Result<Self> {
        let config_path = env::var("INTENT_ENGINE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific path
    pub fn load_from(config_path: &PathBuf) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        // Substitute environment variables
        let config_str = substitute_env_vars(&config_str);

        let settings: Settings = toml::from_str(&config_str)
            .with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        // At least one chain must be enabled
        if self.enabled_chains().is_empty() {
            anyhow::bail!("At least one chain must be enabled");
        }

        if self.orchestrator.base_url.is_empty() {
            anyhow::bail!("Orchestrator base URL is not configured");
        }

        if self.account.owner_keys.is_empty() {
            anyhow::bail!("At least one owner key must be configured");
        }

        for (name, chain) in &self.chains {
            if chain.enabled && chain.chain_id == 0 {
                anyhow::bail!("Chain {} has an invalid chain ID", name);
            }
        }

        Ok(())
    }

    /// Get list of enabled chains
    pub fn enabled_chains(&self) -> Vec<(&String, &ChainConfig)> {
        self.chains.iter().filter(|(_, c)| c.enabled).collect()
    }

    /// Get chain config by chain ID
    pub fn get_chain_by_id(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.values().find(|c| c.enabled && c.chain_id == chain_id)
    }

    /// Look up a token address by symbol on a chain
    pub fn token_address(&self, chain_id: u64, symbol: &str) -> Option<&String> {
        self.get_chain_by_id(chain_id)
            .and_then(|c| c.tokens.get(symbol))
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_CONFIG: &str = r#"
[engine]
instance_id = "test-1"
poll_interval_ms = 1000
max_wait_secs = 30
max_query_retries = 5
retry_backoff_ms = 200
settled_record_ttl_secs = 3600

[orchestrator]
base_url = "https://orchestrator.example.com"
api_key = "test-key"
request_timeout_secs = 10

[account]
owner_keys = ["02c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5"]
factory_address = "0x000000000000000000000000000000000000f00d"

[api]
host = "127.0.0.1"
port = 8080

[metrics]
enabled = false
port = 9090

[chains.optimism]
chain_id = 10
name = "Optimism"
enabled = true

[chains.base]
chain_id = 8453
name = "Base"
enabled = true

[chains.base.tokens]
USDC = "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913"
"#;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_load_sample_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE_CONFIG.as_bytes()).unwrap();

        let settings = Settings::load_from(&file.path().to_path_buf()).unwrap();
        assert_eq!(settings.engine.poll_interval(), Duration::from_secs(1));
        assert_eq!(settings.enabled_chains().len(), 2);
        assert_eq!(settings.get_chain_by_id(8453).unwrap().name, "Base");
        assert!(settings.get_chain_by_id(1).is_none());
    }

    #[test]
    fn test_token_lookup() {
        let settings: Settings = toml::from_str(SAMPLE_CONFIG).unwrap();
        assert_eq!(
            settings.token_address(8453, "USDC").unwrap(),
            "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913"
        );
        assert!(settings.token_address(10, "USDC").is_none());
        assert!(settings.token_address(8453, "DAI").is_none());
    }

    #[test]
    fn test_validation_rejects_no_enabled_chains() {
        let bad = SAMPLE_CONFIG.replace("enabled = true", "enabled = false");
        let settings: Result<Settings, _> = toml::from_str::<Settings>(&bad)
            .map_err(anyhow::Error::from)
            .and_then(|s| s.validate().map(|_| s));
        assert!(settings.is_err());
    }
}
