/// Activity pipeline
///
/// Scanner → Classifier → Reconciliation → sort → cache write.
///
/// Only a failed head lookup fails a pass. Everything narrower (one log
/// range, one transaction, one block timestamp, the check-in count) is
/// logged and skipped so a partial history is still returned and cached.

use alloy::primitives::Address;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{ActivityCache, LocalActivityCache};
use crate::classifier::EventClassifier;
use crate::clock::{Clock, SystemClock};
use crate::config::Settings;
use crate::contracts::ContractAddresses;
use crate::metrics::{self, Timer};
use crate::presentation::sort_newest_first;
use crate::provider::{ChainProvider, ProviderError, RpcChainProvider};
use crate::reconcile::reconcile_checkins;
use crate::scanner::{ScanOptions, TransactionScanner};
use crate::store::{FileStore, MemoryStore};
use crate::types::Activity;

pub const DEFAULT_NATIVE_SYMBOL: &str = "TEA";

#[derive(Debug)]
pub enum ActivityError {
    InvalidAddress(String),
    Provider(ProviderError),
    Task(String),
}

impl From<ProviderError> for ActivityError {
    fn from(e: ProviderError) -> Self {
        ActivityError::Provider(e)
    }
}

impl std::fmt::Display for ActivityError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ActivityError::InvalidAddress(a) => write!(f, "Invalid address: {}", a),
            ActivityError::Provider(e) => write!(f, "Blockchain unavailable: {}", e),
            ActivityError::Task(msg) => write!(f, "Reconstruction task failed: {}", msg),
        }
    }
}

impl std::error::Error for ActivityError {}

/// Parse a 0x-prefixed address in any letter case
pub fn parse_address(input: &str) -> Result<Address, ActivityError> {
    input
        .trim()
        .parse::<Address>()
        .map_err(|_| ActivityError::InvalidAddress(input.to_string()))
}

/// Reconstructs and caches a user's activity history
#[derive(Clone)]
pub struct ActivityService {
    provider: Arc<dyn ChainProvider>,
    cache: Arc<dyn ActivityCache>,
    contracts: ContractAddresses,
    options: ScanOptions,
    clock: Arc<dyn Clock>,
    native_symbol: String,
}

impl ActivityService {
    pub fn new(
        provider: Arc<dyn ChainProvider>,
        cache: Arc<dyn ActivityCache>,
        contracts: ContractAddresses,
    ) -> Self {
        Self {
            provider,
            cache,
            contracts,
            options: ScanOptions::default(),
            clock: Arc::new(SystemClock),
            native_symbol: DEFAULT_NATIVE_SYMBOL.to_string(),
        }
    }

    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_native_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.native_symbol = symbol.into();
        self
    }

    /// Fresh cached list, if any
    pub fn cached(&self, user: Address) -> Option<Vec<Activity>> {
        self.cache.get(&user.to_string())
    }

    pub fn invalidate(&self, user: Address) {
        self.cache.invalidate(&user.to_string());
    }

    /// Current time from the service clock, in seconds
    pub fn now_secs(&self) -> u64 {
        self.clock.now_secs()
    }

    /// Cached list when fresh, otherwise a full reconstruction
    pub async fn load(&self, user: Address) -> Result<Vec<Activity>, ActivityError> {
        if let Some(activities) = self.cached(user) {
            debug!(user = %user, count = activities.len(), "Serving cached activities");
            return Ok(activities);
        }
        self.fetch_onchain_activities(user).await
    }

    /// Full reconstruction from chain data; writes the cache on success
    pub async fn fetch_onchain_activities(&self, user: Address) -> Result<Vec<Activity>, ActivityError> {
        let timer = Timer::new();
        match self.reconstruct(user).await {
            Ok(activities) => {
                self.cache.set(&user.to_string(), &activities);
                metrics::record_reconstruction("success", timer.elapsed_secs());
                info!(
                    user = %user,
                    count = activities.len(),
                    duration_secs = timer.elapsed_secs(),
                    "Activity history reconstructed"
                );
                Ok(activities)
            }
            Err(e) => {
                metrics::record_reconstruction("error", timer.elapsed_secs());
                warn!(user = %user, error = %e, "Activity reconstruction failed");
                Err(e)
            }
        }
    }

    async fn reconstruct(&self, user: Address) -> Result<Vec<Activity>, ActivityError> {
        let provider = self.provider.as_ref();
        let scanner = TransactionScanner::new(provider, &self.contracts, self.options);
        let receipts = scanner.try_fetch_user_transactions(user).await?;

        let classifier = EventClassifier::new(provider, &self.contracts, user, &self.native_symbol);
        let mut block_times: HashMap<u64, u64> = HashMap::new();
        let mut activities = Vec::new();

        for receipt in &receipts {
            let timestamp = match block_times.get(&receipt.block_number) {
                Some(t) => *t,
                None => match provider.block_timestamp(receipt.block_number).await {
                    Ok(Some(t)) => {
                        block_times.insert(receipt.block_number, t);
                        t
                    }
                    Ok(None) => {
                        warn!(block = receipt.block_number, "Block not found, skipping transaction");
                        continue;
                    }
                    Err(e) => {
                        warn!(block = receipt.block_number, error = %e, "Failed to fetch block, skipping transaction");
                        continue;
                    }
                },
            };
            activities.extend(classifier.classify(receipt, timestamp).await);
        }

        reconcile_checkins(provider, &self.contracts, user, &mut activities, self.clock.as_ref()).await;
        sort_newest_first(&mut activities);
        Ok(activities)
    }
}

/// Wire provider, cache and contracts from settings
pub fn build_service(settings: &Settings) -> Result<ActivityService, Box<dyn std::error::Error>> {
    let contracts = settings.contract_addresses()?;
    let provider = RpcChainProvider::connect(&settings.rpc.url, settings.rate_limit())?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let cache: Arc<dyn ActivityCache> = match &settings.cache.dir {
        Some(dir) => {
            let mut store = FileStore::open(dir)?;
            if let Some(quota) = settings.cache.quota_bytes {
                store = store.with_quota(quota);
            }
            Arc::new(LocalActivityCache::with_clock(store, settings.cache_ttl(), clock.clone()))
        }
        None => {
            let mut store = MemoryStore::new(settings.cache.memory_entries);
            if let Some(quota) = settings.cache.quota_bytes {
                store = store.with_quota(quota);
            }
            Arc::new(LocalActivityCache::with_clock(store, settings.cache_ttl(), clock.clone()))
        }
    };

    info!(
        rpc = %settings.rpc.url,
        deploy_block = contracts.deploy_block,
        file_cache = settings.cache.dir.is_some(),
        "Activity service configured"
    );

    Ok(ActivityService::new(Arc::new(provider), cache, contracts)
        .with_options(settings.scan_options())
        .with_clock(clock)
        .with_native_symbol(settings.rpc.native_symbol.clone()))
}
