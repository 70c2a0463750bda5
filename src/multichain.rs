/// Multi-chain check-in grid
///
/// Reads `getCheckinCount` and `lastCheckinTime` for one user on every
/// configured chain. Requests go out in small batches: each request waits
/// a random jitter first, and batches are separated by a fixed delay.
/// Every chain is attempted and reports its own result; one failing chain
/// never hides the others.

use alloy::primitives::Address;
use futures::future::join_all;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::contracts;
use crate::provider::{ChainProvider, RpcChainProvider};
use crate::ratelimit::RateLimitPolicy;
use crate::reconcile::SECONDS_PER_DAY;
use crate::telemetry::truncate_list;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEndpoint {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    pub checkin_contract: Address,
    #[serde(default)]
    pub explorer_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    pub batch_size: usize,
    /// Upper bound of the random delay before each request
    pub max_jitter: Duration,
    /// Pause between consecutive batches
    pub batch_delay: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: 3,
            max_jitter: Duration::from_millis(300),
            batch_delay: Duration::from_millis(1_000),
        }
    }
}

/// Run `f` over `items` batch by batch; output order follows input order
pub async fn run_batched<T, F, Fut>(items: Vec<T>, policy: BatchPolicy, f: F) -> Vec<Fut::Output>
where
    F: Fn(T) -> Fut,
    Fut: Future,
{
    let batch_size = policy.batch_size.max(1);
    let jitter_ms = policy.max_jitter.as_millis() as u64;
    let mut results = Vec::with_capacity(items.len());
    let mut items = items.into_iter().peekable();
    let mut batch_index = 0usize;

    while items.peek().is_some() {
        if batch_index > 0 && !policy.batch_delay.is_zero() {
            tokio::time::sleep(policy.batch_delay).await;
        }

        let batch: Vec<_> = items
            .by_ref()
            .take(batch_size)
            .map(|item| {
                let delay = if jitter_ms > 0 {
                    Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
                } else {
                    Duration::ZERO
                };
                let fut = f(item);
                async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    fut.await
                }
            })
            .collect();

        debug!(batch = batch_index, size = batch.len(), "Running request batch");
        results.extend(join_all(batch).await);
        batch_index += 1;
    }
    results
}

/// A user may check in again 24 h after the last check-in
pub fn can_check_in(last_checkin: u64, now_secs: u64) -> bool {
    last_checkin == 0 || now_secs >= last_checkin.saturating_add(SECONDS_PER_DAY)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainCheckinStatus {
    pub checkin_count: u64,
    pub last_checkin: u64,
    pub can_check_in: bool,
    /// When the next check-in opens, if it is not open yet
    pub next_checkin_at: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridEntry {
    pub chain: String,
    pub chain_id: u64,
    pub status: Option<ChainCheckinStatus>,
    pub error: Option<String>,
}

/// Endpoint plus its provider, or why it could not be built
pub struct GridChain {
    pub endpoint: ChainEndpoint,
    pub provider: Result<Arc<dyn ChainProvider>, String>,
}

impl GridChain {
    pub fn new(endpoint: ChainEndpoint, provider: Arc<dyn ChainProvider>) -> Self {
        Self {
            endpoint,
            provider: Ok(provider),
        }
    }
}

/// Build one rate-limited RPC provider per endpoint
pub fn connect_all(endpoints: &[ChainEndpoint], policy: RateLimitPolicy) -> Vec<GridChain> {
    endpoints
        .iter()
        .cloned()
        .map(|endpoint| {
            let provider = RpcChainProvider::connect(&endpoint.rpc_url, policy)
                .map(|p| Arc::new(p) as Arc<dyn ChainProvider>)
                .map_err(|e| e.to_string());
            GridChain { endpoint, provider }
        })
        .collect()
}

async fn chain_status(
    provider: &dyn ChainProvider,
    contract: Address,
    user: Address,
    now_secs: u64,
) -> Result<ChainCheckinStatus, String> {
    let checkin_count = contracts::checkin_count(provider, contract, user)
        .await
        .map_err(|e| e.to_string())?;
    let last_checkin = contracts::last_checkin_time(provider, contract, user)
        .await
        .map_err(|e| e.to_string())?;
    let open = can_check_in(last_checkin, now_secs);
    Ok(ChainCheckinStatus {
        checkin_count,
        last_checkin,
        can_check_in: open,
        next_checkin_at: (!open).then(|| last_checkin.saturating_add(SECONDS_PER_DAY)),
    })
}

/// Check-in status of `user` on every chain
pub async fn checkin_grid(
    chains: &[GridChain],
    user: Address,
    policy: BatchPolicy,
    now_secs: u64,
) -> Vec<GridEntry> {
    let targets: Vec<&GridChain> = chains.iter().collect();
    let entries = run_batched(targets, policy, |chain| async move {
        let result = match &chain.provider {
            Ok(provider) => {
                chain_status(provider.as_ref(), chain.endpoint.checkin_contract, user, now_secs).await
            }
            Err(e) => Err(e.clone()),
        };
        let (status, error) = match result {
            Ok(status) => (Some(status), None),
            Err(e) => {
                warn!(chain = %chain.endpoint.name, error = %e, "Check-in status unavailable");
                (None, Some(e))
            }
        };
        GridEntry {
            chain: chain.endpoint.name.clone(),
            chain_id: chain.endpoint.chain_id,
            status,
            error,
        }
    })
    .await;

    let failed: Vec<&str> = entries
        .iter()
        .filter(|e| e.error.is_some())
        .map(|e| e.chain.as_str())
        .collect();
    info!(
        user = %user,
        chains = entries.len(),
        failed = %truncate_list(&failed, 5),
        "Check-in grid loaded"
    );
    entries
}
