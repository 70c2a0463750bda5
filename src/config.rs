pub use config::{Config, Environment, File as ConfigFile};
pub use once_cell::sync::OnceCell;

use alloy::primitives::Address;
use serde::Deserialize;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use crate::contracts::ContractAddresses;
use crate::multichain::{BatchPolicy, ChainEndpoint};
use crate::ratelimit::RateLimitPolicy;
use crate::scanner::ScanOptions;

static GLOBAL_CONFIG: OnceCell<Settings> = OnceCell::new();

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RpcSettings {
    pub url: String,
    pub requests_per_second: f64,
    pub burst: u32,
    pub native_symbol: String,
    pub explorer_url: String,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            url: "https://tea-sepolia.g.alchemy.com/public".to_string(),
            requests_per_second: 10.0,
            burst: 5,
            native_symbol: "TEA".to_string(),
            explorer_url: "https://sepolia.tea.xyz".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContractSettings {
    pub checkin: Address,
    pub badge: Address,
    pub username: Address,
    pub referral: Address,
    pub deploy_block: u64,
}

impl Default for ContractSettings {
    fn default() -> Self {
        Self {
            checkin: Address::ZERO,
            badge: Address::ZERO,
            username: Address::ZERO,
            referral: Address::ZERO,
            deploy_block: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub lookback_blocks: u64,
    pub chunk_size: u64,
    pub max_transactions: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        let options = ScanOptions::default();
        Self {
            lookback_blocks: options.lookback_blocks,
            chunk_size: options.chunk_size,
            max_transactions: options.max_transactions,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// On-disk store directory; unset keeps the cache in memory
    pub dir: Option<PathBuf>,
    pub ttl_ms: u64,
    pub quota_bytes: Option<usize>,
    pub memory_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: None,
            ttl_ms: 300_000,
            quota_bytes: Some(5 * 1024 * 1024),
            memory_entries: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    pub load_timeout_secs: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self { load_timeout_secs: 15 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:5000".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3005".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    pub batch_size: usize,
    pub max_jitter_ms: u64,
    pub batch_delay_ms: u64,
}

impl Default for GridSettings {
    fn default() -> Self {
        let policy = BatchPolicy::default();
        Self {
            batch_size: policy.batch_size,
            max_jitter_ms: policy.max_jitter.as_millis() as u64,
            batch_delay_ms: policy.batch_delay.as_millis() as u64,
        }
    }
}

/// Typed view of `config.toml` plus `GMTEA_*` overrides
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub rpc: RpcSettings,
    pub contracts: ContractSettings,
    pub scan: ScanSettings,
    pub cache: CacheSettings,
    pub feed: FeedSettings,
    pub backend: BackendSettings,
    pub server: ServerSettings,
    pub grid: GridSettings,
    pub chains: Vec<ChainEndpoint>,
}

impl Settings {
    /// Read `path` (optional) then `GMTEA_SECTION__KEY` environment variables
    pub fn load(path: &str) -> Result<Self, Box<dyn Error>> {
        let config = Config::builder()
            .add_source(ConfigFile::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("GMTEA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Contract addresses; every address must be configured
    pub fn contract_addresses(&self) -> Result<ContractAddresses, Box<dyn Error>> {
        let c = &self.contracts;
        for (name, address) in [
            ("checkin", c.checkin),
            ("badge", c.badge),
            ("username", c.username),
            ("referral", c.referral),
        ] {
            if address.is_zero() {
                return Err(format!("contracts.{} is not configured", name).into());
            }
        }
        Ok(ContractAddresses {
            checkin: c.checkin,
            badge: c.badge,
            username: c.username,
            referral: c.referral,
            deploy_block: c.deploy_block,
        })
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            lookback_blocks: self.scan.lookback_blocks,
            chunk_size: self.scan.chunk_size,
            max_transactions: self.scan.max_transactions,
        }
    }

    pub fn rate_limit(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            requests_per_second: self.rpc.requests_per_second,
            burst: self.rpc.burst,
        }
    }

    pub fn batch_policy(&self) -> BatchPolicy {
        BatchPolicy {
            batch_size: self.grid.batch_size,
            max_jitter: Duration::from_millis(self.grid.max_jitter_ms),
            batch_delay: Duration::from_millis(self.grid.batch_delay_ms),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache.ttl_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.feed.load_timeout_secs)
    }
}

pub fn init_global_config(path: &str) -> Result<&'static Settings, Box<dyn Error>> {
    let settings = Settings::load(path)?;
    GLOBAL_CONFIG
        .set(settings)
        .map_err(|_| "Config already set")?;
    get_global_config()
}

pub fn get_global_config() -> Result<&'static Settings, Box<dyn Error>> {
    Ok(GLOBAL_CONFIG.get().ok_or("Config not initialized")?)
}
