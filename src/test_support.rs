/// Shared fixtures for unit tests: an in-memory ChainProvider with call
/// counters, fixed contract addresses, and log builders.

use alloy::primitives::{address, Address, Bytes, B256};
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::contracts::ContractAddresses;
use crate::provider::{ChainProvider, ProviderError};
use crate::types::{ChainLog, ChainReceipt, ChainTransaction, LogQuery};

pub const CHECKIN: Address = address!("00000000000000000000000000000000000000c1");
pub const BADGE: Address = address!("00000000000000000000000000000000000000c2");
pub const USERNAME: Address = address!("00000000000000000000000000000000000000c3");
pub const REFERRAL: Address = address!("00000000000000000000000000000000000000c4");

/// Block timestamps default to `BASE_TIMESTAMP + block`
pub const BASE_TIMESTAMP: u64 = 1_700_000_000;

pub fn contracts() -> ContractAddresses {
    ContractAddresses {
        checkin: CHECKIN,
        badge: BADGE,
        username: USERNAME,
        referral: REFERRAL,
        deploy_block: 0,
    }
}

pub fn tx_hash(n: u64) -> B256 {
    B256::left_padding_from(&n.to_be_bytes())
}

pub fn log_from<E: SolEvent>(emitter: Address, event: &E, tx: B256, block: u64) -> ChainLog {
    let data = event.encode_log_data();
    ChainLog {
        address: emitter,
        topics: data.topics().to_vec(),
        data: data.data.clone(),
        block_number: Some(block),
        transaction_hash: Some(tx),
        log_index: Some(0),
    }
}

#[derive(Default)]
pub struct MockProvider {
    head: u64,
    fail_head: bool,
    logs: Mutex<Vec<ChainLog>>,
    transactions: Mutex<HashMap<B256, ChainTransaction>>,
    receipts: Mutex<HashMap<B256, ChainReceipt>>,
    timestamps: Mutex<HashMap<u64, u64>>,
    call_responses: Mutex<HashMap<(Address, [u8; 4]), Vec<u8>>>,
    failing_ranges: Mutex<HashSet<u64>>,
    failing_transactions: Mutex<HashSet<B256>>,
    pub log_calls: AtomicUsize,
    pub transaction_calls: AtomicUsize,
    pub receipt_calls: Mutex<HashMap<B256, usize>>,
    pub call_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(head: u64) -> Self {
        Self {
            head,
            ..Default::default()
        }
    }

    /// Every head lookup fails, as with an unreachable node
    pub fn unavailable() -> Self {
        Self {
            fail_head: true,
            ..Default::default()
        }
    }

    /// Register a mined transaction, its receipt, and expose its logs to getLogs
    pub fn add_transaction(&self, hash: B256, from: Address, block: u64, logs: Vec<ChainLog>) {
        self.logs.lock().unwrap().extend(logs.iter().cloned());
        self.transactions.lock().unwrap().insert(
            hash,
            ChainTransaction {
                hash,
                from,
                block_number: Some(block),
            },
        );
        self.receipts.lock().unwrap().insert(
            hash,
            ChainReceipt {
                transaction_hash: hash,
                from,
                block_number: block,
                status: true,
                logs,
            },
        );
    }

    pub fn set_timestamp(&self, block: u64, timestamp: u64) {
        self.timestamps.lock().unwrap().insert(block, timestamp);
    }

    pub fn set_call_response(&self, to: Address, selector: [u8; 4], response: Vec<u8>) {
        self.call_responses
            .lock()
            .unwrap()
            .insert((to, selector), response);
    }

    /// getLogs for ranges starting at `from_block` fails
    pub fn fail_range(&self, from_block: u64) {
        self.failing_ranges.lock().unwrap().insert(from_block);
    }

    pub fn fail_transaction(&self, hash: B256) {
        self.failing_transactions.lock().unwrap().insert(hash);
    }

    pub fn receipt_calls_for(&self, hash: B256) -> usize {
        self.receipt_calls
            .lock()
            .unwrap()
            .get(&hash)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl ChainProvider for MockProvider {
    async fn block_number(&self) -> Result<u64, ProviderError> {
        if self.fail_head {
            return Err(ProviderError::Unavailable("no provider".to_string()));
        }
        Ok(self.head)
    }

    async fn logs(&self, query: &LogQuery) -> Result<Vec<ChainLog>, ProviderError> {
        self.log_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_ranges.lock().unwrap().contains(&query.from_block) {
            return Err(ProviderError::transport("eth_getLogs", "rate limited"));
        }
        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|log| log.address == query.address)
            .filter(|log| {
                let block = log.block_number.unwrap_or_default();
                block >= query.from_block && block <= query.to_block
            })
            .cloned()
            .collect())
    }

    async fn transaction(&self, hash: B256) -> Result<Option<ChainTransaction>, ProviderError> {
        self.transaction_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_transactions.lock().unwrap().contains(&hash) {
            return Err(ProviderError::transport("eth_getTransactionByHash", "timeout"));
        }
        Ok(self.transactions.lock().unwrap().get(&hash).cloned())
    }

    async fn receipt(&self, hash: B256) -> Result<Option<ChainReceipt>, ProviderError> {
        *self.receipt_calls.lock().unwrap().entry(hash).or_insert(0) += 1;
        Ok(self.receipts.lock().unwrap().get(&hash).cloned())
    }

    async fn block_timestamp(&self, number: u64) -> Result<Option<u64>, ProviderError> {
        Ok(Some(
            self.timestamps
                .lock()
                .unwrap()
                .get(&number)
                .copied()
                .unwrap_or(BASE_TIMESTAMP + number),
        ))
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ProviderError> {
        self.call_calls.fetch_add(1, Ordering::SeqCst);
        let selector: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| ProviderError::transport("eth_call", "short calldata"))?;
        self.call_responses
            .lock()
            .unwrap()
            .get(&(to, selector))
            .cloned()
            .map(Bytes::from)
            .ok_or_else(|| ProviderError::transport("eth_call", "execution reverted"))
    }
}
