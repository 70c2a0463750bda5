/// Chain Provider - JSON-RPC access behind a trait
///
/// The scanner, classifier and contract readers only see `ChainProvider`.
/// `RpcChainProvider` implements it over an alloy HTTP provider, taking a
/// rate-limiter token before every call and recording per-method latency.

use alloy::network::{ReceiptResponse, TransactionResponse};
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{
    BlockNumberOrTag, BlockTransactionsKind, Filter, Log, TransactionInput, TransactionRequest,
};
use alloy::transports::http::Http;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tracing::debug;

use crate::metrics;
use crate::ratelimit::{RateLimitPolicy, RateLimiter};
use crate::types::{ChainLog, ChainReceipt, ChainTransaction, LogQuery};

pub type HttpProvider = RootProvider<Http<Client>>;

/// Error type for provider calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Transport or node-side failure (timeout, rate limit, connection)
    Transport { method: &'static str, message: String },
    /// The node answered but the object does not exist (yet)
    NotFound { method: &'static str, what: String },
    /// Response could not be interpreted
    Decode { method: &'static str, message: String },
    /// No usable endpoint configured
    Unavailable(String),
}

impl ProviderError {
    pub fn transport(method: &'static str, err: impl std::fmt::Display) -> Self {
        ProviderError::Transport {
            method,
            message: err.to_string(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ProviderError::Transport { .. } => "transport",
            ProviderError::NotFound { .. } => "missing",
            ProviderError::Decode { .. } => "decode",
            ProviderError::Unavailable(_) => "unavailable",
        }
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ProviderError::Transport { method, message } => {
                write!(f, "{} failed: {}", method, message)
            }
            ProviderError::NotFound { method, what } => write!(f, "{}: {} not found", method, what),
            ProviderError::Decode { method, message } => {
                write!(f, "{} returned undecodable data: {}", method, message)
            }
            ProviderError::Unavailable(reason) => write!(f, "Provider unavailable: {}", reason),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Read-only view of a chain
#[async_trait]
pub trait ChainProvider: Send + Sync {
    async fn block_number(&self) -> Result<u64, ProviderError>;

    async fn logs(&self, query: &LogQuery) -> Result<Vec<ChainLog>, ProviderError>;

    async fn transaction(&self, hash: B256) -> Result<Option<ChainTransaction>, ProviderError>;

    async fn receipt(&self, hash: B256) -> Result<Option<ChainReceipt>, ProviderError>;

    /// Timestamp (seconds) of block `number`
    async fn block_timestamp(&self, number: u64) -> Result<Option<u64>, ProviderError>;

    /// `eth_call` against latest state
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ProviderError>;
}

#[async_trait]
impl<P: ChainProvider + ?Sized> ChainProvider for Arc<P> {
    async fn block_number(&self) -> Result<u64, ProviderError> {
        (**self).block_number().await
    }

    async fn logs(&self, query: &LogQuery) -> Result<Vec<ChainLog>, ProviderError> {
        (**self).logs(query).await
    }

    async fn transaction(&self, hash: B256) -> Result<Option<ChainTransaction>, ProviderError> {
        (**self).transaction(hash).await
    }

    async fn receipt(&self, hash: B256) -> Result<Option<ChainReceipt>, ProviderError> {
        (**self).receipt(hash).await
    }

    async fn block_timestamp(&self, number: u64) -> Result<Option<u64>, ProviderError> {
        (**self).block_timestamp(number).await
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ProviderError> {
        (**self).call(to, data).await
    }
}

/// alloy-backed provider with rate limiting and metrics
pub struct RpcChainProvider {
    inner: HttpProvider,
    limiter: RateLimiter,
    url: String,
}

impl RpcChainProvider {
    pub fn connect(rpc_url: &str, policy: RateLimitPolicy) -> Result<Self, ProviderError> {
        let url = rpc_url
            .parse()
            .map_err(|e| ProviderError::Unavailable(format!("invalid RPC URL {}: {}", rpc_url, e)))?;
        let inner = ProviderBuilder::new().on_http(url);
        Ok(Self {
            inner,
            limiter: RateLimiter::new(policy),
            url: rpc_url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Take a token, run the call, record latency and failures
    async fn observed<T, F>(&self, method: &'static str, fut: F) -> Result<T, ProviderError>
    where
        F: std::future::Future<Output = Result<T, ProviderError>>,
    {
        self.limiter.acquire().await;
        let timer = metrics::Timer::new();
        let result = fut.await;
        metrics::record_rpc_call_duration(method, timer.elapsed_secs());
        if let Err(e) = &result {
            metrics::increment_rpc_errors(method, e.kind());
            debug!(method, error = %e, "RPC call failed");
        }
        result
    }
}

fn convert_log(log: &Log) -> ChainLog {
    ChainLog {
        address: log.address(),
        topics: log.topics().to_vec(),
        data: log.data().data.clone(),
        block_number: log.block_number,
        transaction_hash: log.transaction_hash,
        log_index: log.log_index,
    }
}

#[async_trait]
impl ChainProvider for RpcChainProvider {
    async fn block_number(&self) -> Result<u64, ProviderError> {
        self.observed("eth_blockNumber", async {
            self.inner
                .get_block_number()
                .await
                .map_err(|e| ProviderError::transport("eth_blockNumber", e))
        })
        .await
    }

    async fn logs(&self, query: &LogQuery) -> Result<Vec<ChainLog>, ProviderError> {
        let filter = Filter::new()
            .address(query.address)
            .from_block(query.from_block)
            .to_block(query.to_block);

        self.observed("eth_getLogs", async {
            let logs = self
                .inner
                .get_logs(&filter)
                .await
                .map_err(|e| ProviderError::transport("eth_getLogs", e))?;
            Ok(logs.iter().map(convert_log).collect())
        })
        .await
    }

    async fn transaction(&self, hash: B256) -> Result<Option<ChainTransaction>, ProviderError> {
        self.observed("eth_getTransactionByHash", async {
            let tx = self
                .inner
                .get_transaction_by_hash(hash)
                .await
                .map_err(|e| ProviderError::transport("eth_getTransactionByHash", e))?;
            Ok(tx.map(|tx| ChainTransaction {
                hash: tx.tx_hash(),
                from: tx.from(),
                block_number: tx.block_number(),
            }))
        })
        .await
    }

    async fn receipt(&self, hash: B256) -> Result<Option<ChainReceipt>, ProviderError> {
        self.observed("eth_getTransactionReceipt", async {
            let receipt = self
                .inner
                .get_transaction_receipt(hash)
                .await
                .map_err(|e| ProviderError::transport("eth_getTransactionReceipt", e))?;
            Ok(receipt.map(|r| ChainReceipt {
                transaction_hash: r.transaction_hash(),
                from: r.from,
                block_number: r.block_number().unwrap_or_default(),
                status: r.status(),
                logs: r.inner.logs().iter().map(convert_log).collect(),
            }))
        })
        .await
    }

    async fn block_timestamp(&self, number: u64) -> Result<Option<u64>, ProviderError> {
        self.observed("eth_getBlockByNumber", async {
            let block = self
                .inner
                .get_block_by_number(BlockNumberOrTag::Number(number), BlockTransactionsKind::Hashes)
                .await
                .map_err(|e| ProviderError::transport("eth_getBlockByNumber", e))?;
            Ok(block.map(|b| b.header.timestamp))
        })
        .await
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ProviderError> {
        let request = TransactionRequest::default()
            .to(to)
            .input(TransactionInput::new(data));

        self.observed("eth_call", async {
            self.inner
                .call(&request)
                .await
                .map_err(|e| ProviderError::transport("eth_call", e))
        })
        .await
    }
}
