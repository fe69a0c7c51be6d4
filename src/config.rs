use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default = "default_networks")]
    pub networks: BTreeMap<String, NetworkConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Explorer lookups allowed in flight at once.
    pub concurrency: usize,
    /// Pause after each contract, to stay under explorer rate limits.
    pub pacing_ms: u64,
    pub request_timeout_secs: u64,
    /// Write an intermediate snapshot every this many processed work items.
    pub snapshot_interval: usize,
    pub output_dir: PathBuf,
    /// Report sample and generic fallback interfaces as verified, as older
    /// versions of this tool did.
    pub count_fallback_as_verified: bool,
    /// JSON file with extra known contracts.
    pub registry_file: Option<PathBuf>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            pacing_ms: 500,
            request_timeout_secs: 30,
            snapshot_interval: 500,
            output_dir: PathBuf::from("data"),
            count_fallback_as_verified: false,
            registry_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub chain_id: u64,
    pub native_token: String,
    /// Etherscan-compatible `.../api` endpoint.
    pub explorer_api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable consulted for `api_key` when it is not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

impl NetworkConfig {
    fn new(name: &str, chain_id: u64, native_token: &str, api_url: &str, key_env: &str) -> Self {
        Self {
            name: name.to_string(),
            chain_id,
            native_token: native_token.to_string(),
            explorer_api_url: Some(api_url.to_string()),
            api_key: None,
            api_key_env: Some(key_env.to_string()),
        }
    }
}

fn default_networks() -> BTreeMap<String, NetworkConfig> {
    let mut networks = BTreeMap::new();

    for (key, network) in [
        (
            "ethereum",
            NetworkConfig::new("Ethereum Mainnet", 1, "ETH", "https://api.etherscan.io/api", "ETHERSCAN_API_KEY"),
        ),
        (
            "polygon",
            NetworkConfig::new("Polygon", 137, "MATIC", "https://api.polygonscan.com/api", "POLYGONSCAN_API_KEY"),
        ),
        (
            "arbitrum",
            NetworkConfig::new("Arbitrum One", 42161, "ETH", "https://api.arbiscan.io/api", "ARBISCAN_API_KEY"),
        ),
        (
            "optimism",
            NetworkConfig::new("Optimism", 10, "ETH", "https://api-optimistic.etherscan.io/api", "OPTIMISTIC_API_KEY"),
        ),
        (
            "bsc",
            NetworkConfig::new("BNB Smart Chain", 56, "BNB", "https://api.bscscan.com/api", "BSCSCAN_API_KEY"),
        ),
        (
            "avalanche",
            NetworkConfig::new("Avalanche C-Chain", 43114, "AVAX", "https://api.snowtrace.io/api", "SNOWTRACE_API_KEY"),
        ),
        (
            "fantom",
            NetworkConfig::new("Fantom", 250, "FTM", "https://api.ftmscan.com/api", "FTMSCAN_API_KEY"),
        ),
        (
            "base",
            NetworkConfig::new("Base", 8453, "ETH", "https://api.basescan.org/api", "BASESCAN_API_KEY"),
        ),
    ] {
        networks.insert(key.to_string(), network);
    }

    networks
}

impl Default for Config {
    fn default() -> Self {
        Self {
            collector: CollectorConfig::default(),
            networks: default_networks(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {:?}: {}", path, e))?;

        Self::from_toml(&content).map_err(|e| anyhow!("Failed to parse config file {:?}: {}", path, e))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with fallback to default
    pub async fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Self {
        let mut config = match path {
            Some(path) => match Self::load_from_file(path).await {
                Ok(config) => {
                    tracing::info!("Loaded configuration from file");
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to load config file, using defaults: {}", e);
                    Self::default()
                }
            },
            None => Self::default(),
        };

        config.apply_env_vars();
        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.collector.concurrency == 0 {
            return Err(anyhow!("collector.concurrency must be at least 1"));
        }
        if self.collector.request_timeout_secs == 0 {
            return Err(anyhow!("collector.request_timeout_secs must be at least 1"));
        }
        Ok(())
    }

    /// Fill missing API keys from each network's `api_key_env` variable.
    /// A network without a key is still usable, lookups go out unauthenticated.
    pub fn apply_env_vars(&mut self) {
        for (network_name, network) in &mut self.networks {
            if network.api_key.as_deref().is_some_and(|k| !k.is_empty()) {
                continue;
            }
            let Some(var) = network.api_key_env.as_deref() else {
                continue;
            };
            match std::env::var(var) {
                Ok(key) if !key.is_empty() => {
                    tracing::debug!("Using {} for {} explorer lookups", var, network_name);
                    network.api_key = Some(key);
                }
                _ => {
                    if network.explorer_api_url.is_some() {
                        tracing::warn!(
                            "No API key for {}, set {} for reliable explorer lookups",
                            network_name,
                            var
                        );
                    }
                }
            }
        }
    }

    pub fn supported_networks(&self) -> Vec<String> {
        self.networks.keys().cloned().collect()
    }

    /// Get default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("defi-event-collector").join("config.toml"))
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let sample_config = r#"# DeFi Event Collector Configuration File

[collector]
concurrency = 5              # explorer lookups in flight at once
pacing_ms = 500              # pause after each contract
request_timeout_secs = 30
snapshot_interval = 500      # work items between intermediate snapshots
output_dir = "data"
count_fallback_as_verified = false
# registry_file = "known_contracts.json"

# Work items on networks not listed here are skipped.
# A network without explorer_api_url always uses sample interfaces.

[networks.ethereum]
name = "Ethereum Mainnet"
chain_id = 1
native_token = "ETH"
explorer_api_url = "https://api.etherscan.io/api"
api_key_env = "ETHERSCAN_API_KEY"
# api_key = "YOUR_API_KEY_HERE"

[networks.polygon]
name = "Polygon"
chain_id = 137
native_token = "MATIC"
explorer_api_url = "https://api.polygonscan.com/api"
api_key_env = "POLYGONSCAN_API_KEY"

[networks.arbitrum]
name = "Arbitrum One"
chain_id = 42161
native_token = "ETH"
explorer_api_url = "https://api.arbiscan.io/api"
api_key_env = "ARBISCAN_API_KEY"

[networks.optimism]
name = "Optimism"
chain_id = 10
native_token = "ETH"
explorer_api_url = "https://api-optimistic.etherscan.io/api"
api_key_env = "OPTIMISTIC_API_KEY"

[networks.bsc]
name = "BNB Smart Chain"
chain_id = 56
native_token = "BNB"
explorer_api_url = "https://api.bscscan.com/api"
api_key_env = "BSCSCAN_API_KEY"

[networks.avalanche]
name = "Avalanche C-Chain"
chain_id = 43114
native_token = "AVAX"
explorer_api_url = "https://api.snowtrace.io/api"
api_key_env = "SNOWTRACE_API_KEY"

[networks.fantom]
name = "Fantom"
chain_id = 250
native_token = "FTM"
explorer_api_url = "https://api.ftmscan.com/api"
api_key_env = "FTMSCAN_API_KEY"

[networks.base]
name = "Base"
chain_id = 8453
native_token = "ETH"
explorer_api_url = "https://api.basescan.org/api"
api_key_env = "BASESCAN_API_KEY"
"#;
        sample_config.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.collector.concurrency, 5);
        assert_eq!(config.collector.pacing_ms, 500);
        assert_eq!(config.collector.snapshot_interval, 500);
        assert_eq!(config.networks.len(), 8);
        assert!(config.networks.contains_key("base"));
        assert!(!config.networks.contains_key("zksync_era"));
    }

    #[test]
    fn test_sample_parses_to_defaults() {
        let config = Config::from_toml(&Config::generate_sample()).unwrap();
        let defaults = Config::default();

        assert_eq!(config.supported_networks(), defaults.supported_networks());
        assert_eq!(config.networks["polygon"].chain_id, 137);
        assert_eq!(
            config.networks["ethereum"].api_key_env.as_deref(),
            Some("ETHERSCAN_API_KEY")
        );
        assert!(!config.collector.count_fallback_as_verified);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config = Config::from_toml(
            r#"
            [collector]
            pacing_ms = 0

            [networks.local]
            name = "Local"
            chain_id = 31337
            native_token = "ETH"
            explorer_api_url = "http://127.0.0.1:8080/api"
            api_key = "k"
            "#,
        )
        .unwrap();

        assert_eq!(config.collector.pacing_ms, 0);
        assert_eq!(config.collector.concurrency, 5);
        assert_eq!(config.supported_networks(), vec!["local".to_string()]);
        assert_eq!(config.networks["local"].api_key.as_deref(), Some("k"));
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        assert!(Config::from_toml("[collector]\nconcurrency = 0\n").is_err());
    }

    #[test]
    fn test_explicit_key_wins_over_env() {
        let mut config = Config::default();
        if let Some(network) = config.networks.get_mut("ethereum") {
            network.api_key = Some("explicit".to_string());
            network.api_key_env = Some("DEFI_COLLECTOR_TEST_UNSET_VAR".to_string());
        }
        config.apply_env_vars();
        assert_eq!(config.networks["ethereum"].api_key.as_deref(), Some("explicit"));
    }

    #[tokio::test]
    async fn test_load_or_default_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let config = Config::load_or_default(Some(&missing)).await;
        assert_eq!(config.networks.len(), 8);

        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, "[collector]\nconcurrency = 2\n").await.unwrap();
        let config = Config::load_or_default(Some(&path)).await;
        assert_eq!(config.collector.concurrency, 2);
    }
}
