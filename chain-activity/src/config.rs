//! Configuration for the activity service.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chains::{ChainId, ChainRegistry};
use crate::persistence::PREFERENCES_FILE;
use crate::types::NftStandard;

/// Environment variable that overrides `data_provider.api_key`
pub const API_KEY_ENV: &str = "ALCHEMY_API_KEY";

/// Data provider settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataProviderConfig {
    /// Alchemy API key
    #[serde(default)]
    pub api_key: String,

    /// Host template override, `{network}` is replaced by the network slug
    pub endpoint: Option<String>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for DataProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Wallet bridge settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletConfig {
    /// URL of an EIP-1193 JSON-RPC bridge
    pub bridge_url: Option<String>,

    /// How often the bridge is polled for account/chain changes
    #[serde(default = "default_event_poll_interval")]
    pub event_poll_interval_secs: u64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            bridge_url: None,
            event_poll_interval_secs: default_event_poll_interval(),
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityConfig {
    /// Chain selected on first run and after disconnect
    #[serde(default = "default_chain")]
    pub default_chain: ChainId,

    /// Transfers requested per history page
    #[serde(default = "default_history_page_size")]
    pub history_page_size: u32,

    /// Maximum number of ERC-20 balances enriched with metadata
    #[serde(default = "default_token_limit")]
    pub token_limit: usize,

    /// NFTs requested per owner query
    #[serde(default = "default_nft_page_size")]
    pub nft_page_size: u32,

    /// Token standard left out of NFT results (empty keeps everything)
    #[serde(default = "default_nft_excluded_standard")]
    pub nft_excluded_standard: String,

    /// Gas price polling interval in seconds
    #[serde(default = "default_gas_poll_interval")]
    pub gas_poll_interval_secs: u64,

    /// Seconds an error stays visible
    #[serde(default = "default_error_display")]
    pub error_display_secs: u64,

    /// Drop fetch results that resolve after the account or chain changed
    #[serde(default = "default_discard_stale_results")]
    pub discard_stale_results: bool,

    /// Preference file; defaults to the config directory
    pub preferences_file: Option<PathBuf>,

    #[serde(default)]
    pub data_provider: DataProviderConfig,

    #[serde(default)]
    pub wallet: WalletConfig,
}

fn default_chain() -> ChainId {
    ChainId::ETHEREUM
}

fn default_history_page_size() -> u32 {
    10
}

fn default_token_limit() -> usize {
    20
}

fn default_nft_page_size() -> u32 {
    12
}

fn default_nft_excluded_standard() -> String {
    "ERC1155".to_string()
}

fn default_gas_poll_interval() -> u64 {
    15
}

fn default_error_display() -> u64 {
    5
}

fn default_discard_stale_results() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    30
}

fn default_event_poll_interval() -> u64 {
    2
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            default_chain: default_chain(),
            history_page_size: default_history_page_size(),
            token_limit: default_token_limit(),
            nft_page_size: default_nft_page_size(),
            nft_excluded_standard: default_nft_excluded_standard(),
            gas_poll_interval_secs: default_gas_poll_interval(),
            error_display_secs: default_error_display(),
            discard_stale_results: default_discard_stale_results(),
            preferences_file: None,
            data_provider: DataProviderConfig::default(),
            wallet: WalletConfig::default(),
        }
    }
}

impl ActivityConfig {
    /// Directory holding the config and preference files.
    pub fn default_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".chain-activity")
    }

    pub fn default_path() -> PathBuf {
        Self::default_dir().join("config.toml")
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: ActivityConfig = toml::from_str(&content)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Like [`from_file`](Self::from_file), but a missing file yields defaults.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            return Self::from_file(path);
        }
        tracing::debug!("No config at {}, using defaults", path.display());
        let mut config = Self::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Pick up overrides from the environment.
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                self.data_provider.api_key = key;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !ChainRegistry::builtin().contains(self.default_chain) {
            anyhow::bail!("default_chain {} is not a supported chain", self.default_chain);
        }

        if self.history_page_size == 0 {
            anyhow::bail!("history_page_size must be at least 1");
        }

        if self.nft_page_size == 0 || self.nft_page_size > 100 {
            anyhow::bail!("nft_page_size must be between 1 and 100");
        }

        if self.gas_poll_interval_secs == 0 {
            anyhow::bail!("gas_poll_interval_secs must be at least 1");
        }

        if self.error_display_secs == 0 {
            anyhow::bail!("error_display_secs must be at least 1");
        }

        if self.data_provider.request_timeout_secs == 0 {
            anyhow::bail!("data_provider.request_timeout_secs must be at least 1");
        }

        if let Some(endpoint) = &self.data_provider.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                anyhow::bail!("data_provider.endpoint must be an http(s) URL");
            }
        }

        if self.wallet.event_poll_interval_secs == 0 {
            anyhow::bail!("wallet.event_poll_interval_secs must be at least 1");
        }

        if self.token_limit == 0 {
            tracing::warn!("token_limit is 0, only the native balance will be listed");
        }

        Ok(())
    }

    /// Chain registry with the configured default.
    pub fn registry(&self) -> anyhow::Result<ChainRegistry> {
        ChainRegistry::builtin()
            .with_default(self.default_chain)
            .ok_or_else(|| anyhow::anyhow!("unsupported default chain {}", self.default_chain))
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.preferences_file
            .clone()
            .unwrap_or_else(|| Self::default_dir().join(PREFERENCES_FILE))
    }

    pub fn excluded_nft_standard(&self) -> Option<NftStandard> {
        let raw = self.nft_excluded_standard.trim();
        if raw.is_empty() {
            None
        } else {
            Some(NftStandard::from(raw))
        }
    }

    pub fn gas_poll_interval(&self) -> Duration {
        Duration::from_secs(self.gas_poll_interval_secs)
    }

    pub fn error_display(&self) -> Duration {
        Duration::from_secs(self.error_display_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.data_provider.request_timeout_secs)
    }

    pub fn event_poll_interval(&self) -> Duration {
        Duration::from_secs(self.wallet.event_poll_interval_secs)
    }
}
