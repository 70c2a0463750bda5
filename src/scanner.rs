/// Transaction Scanner
///
/// Finds the user's recent GM Tea transactions by scanning contract logs:
/// - range is `[max(head - lookback, deploy_block), head]`, in fixed chunks
/// - each of the four contracts is queried separately per chunk
/// - transaction hashes are deduplicated across the whole scan
/// - the receipt is only fetched when the transaction sender is the user
/// - no new chunk is started once `max_transactions` receipts were found
///
/// Chunks and per-hash lookups run strictly one after another; pacing
/// comes from the provider's rate limiter.

use alloy::primitives::{Address, B256};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::contracts::ContractAddresses;
use crate::metrics;
use crate::provider::{ChainProvider, ProviderError};
use crate::telemetry::truncate_hex;
use crate::types::{ChainReceipt, LogQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// How far back from the head to look
    pub lookback_blocks: u64,
    /// Blocks per getLogs request
    pub chunk_size: u64,
    /// Stop starting new chunks after this many matches
    pub max_transactions: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            lookback_blocks: 30_000,
            chunk_size: 2_000,
            max_transactions: 50,
        }
    }
}

/// Inclusive `[from, to]` ranges covering `[start, end]`
pub fn block_chunks(start: u64, end: u64, chunk_size: u64) -> Vec<(u64, u64)> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut from = start;
    while from <= end {
        let to = from.saturating_add(chunk_size - 1).min(end);
        chunks.push((from, to));
        if to == u64::MAX {
            break;
        }
        from = to + 1;
    }
    chunks
}

pub struct TransactionScanner<'a, P: ChainProvider + ?Sized> {
    provider: &'a P,
    contracts: &'a ContractAddresses,
    options: ScanOptions,
}

impl<'a, P: ChainProvider + ?Sized> TransactionScanner<'a, P> {
    pub fn new(provider: &'a P, contracts: &'a ContractAddresses, options: ScanOptions) -> Self {
        Self {
            provider,
            contracts,
            options,
        }
    }

    /// Receipts of the user's transactions; empty on total failure
    pub async fn fetch_user_transactions(&self, user: Address) -> Vec<ChainReceipt> {
        match self.try_fetch_user_transactions(user).await {
            Ok(receipts) => receipts,
            Err(e) => {
                warn!(user = %user, error = %e, "Transaction scan failed");
                Vec::new()
            }
        }
    }

    /// Like `fetch_user_transactions` but reports a failed head lookup
    ///
    /// Anything after the head lookup is best-effort and never fails the scan.
    pub async fn try_fetch_user_transactions(
        &self,
        user: Address,
    ) -> Result<Vec<ChainReceipt>, ProviderError> {
        let head = self.provider.block_number().await?;
        let start = head
            .saturating_sub(self.options.lookback_blocks)
            .max(self.contracts.deploy_block);

        if start > head {
            debug!(head, deploy_block = self.contracts.deploy_block, "Head is before deployment");
            return Ok(Vec::new());
        }

        let chunks = block_chunks(start, head, self.options.chunk_size);
        info!(
            user = %user,
            from_block = start,
            to_block = head,
            chunks = chunks.len(),
            "Scanning contract logs"
        );

        let mut seen: HashSet<B256> = HashSet::new();
        let mut receipts: Vec<ChainReceipt> = Vec::new();

        for (from_block, to_block) in chunks {
            if receipts.len() >= self.options.max_transactions {
                debug!(
                    matched = receipts.len(),
                    limit = self.options.max_transactions,
                    "Match limit reached, stopping scan"
                );
                break;
            }
            metrics::increment_scan_chunks();

            let hashes = self.chunk_transaction_hashes(from_block, to_block).await;
            for hash in hashes {
                if !seen.insert(hash) {
                    continue;
                }
                if let Some(receipt) = self.receipt_if_sent_by(hash, user).await {
                    metrics::increment_matched_transactions();
                    receipts.push(receipt);
                }
            }
        }

        info!(user = %user, matched = receipts.len(), unique_hashes = seen.len(), "Scan complete");
        Ok(receipts)
    }

    /// Transaction hashes of all tracked-contract logs in one chunk, in log order
    async fn chunk_transaction_hashes(&self, from_block: u64, to_block: u64) -> Vec<B256> {
        let mut hashes = Vec::new();
        for (kind, address) in self.contracts.all() {
            let query = LogQuery {
                address,
                from_block,
                to_block,
            };
            match self.provider.logs(&query).await {
                Ok(logs) => hashes.extend(logs.iter().filter_map(|log| log.transaction_hash)),
                Err(e) => warn!(
                    contract = kind.as_str(),
                    from_block,
                    to_block,
                    error = %e,
                    "Failed to fetch logs for range"
                ),
            }
        }
        hashes
    }

    async fn receipt_if_sent_by(&self, hash: B256, user: Address) -> Option<ChainReceipt> {
        let tx = match self.provider.transaction(hash).await {
            Ok(Some(tx)) => tx,
            Ok(None) => {
                debug!(tx = %truncate_hex(&hash.to_string(), 18), "Transaction not found");
                return None;
            }
            Err(e) => {
                warn!(tx = %truncate_hex(&hash.to_string(), 18), error = %e, "Failed to fetch transaction");
                return None;
            }
        };

        if tx.from != user {
            return None;
        }

        match self.provider.receipt(hash).await {
            Ok(Some(receipt)) => Some(receipt),
            Ok(None) => {
                debug!(tx = %truncate_hex(&hash.to_string(), 18), "Receipt not available");
                None
            }
            Err(e) => {
                warn!(tx = %truncate_hex(&hash.to_string(), 18), error = %e, "Failed to fetch receipt");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{BadgeMinted, CheckinCompleted, UsernameRegistered};
    use crate::test_support::{contracts, log_from, tx_hash, MockProvider, BADGE, CHECKIN, USERNAME};
    use alloy::primitives::{address, U256};
    use std::sync::atomic::Ordering;

    const USER: Address = address!("00000000000000000000000000000000000000aa");
    const STRANGER: Address = address!("00000000000000000000000000000000000000bb");

    fn checkin(user: Address, tx: B256, block: u64) -> crate::types::ChainLog {
        log_from(
            CHECKIN,
            &CheckinCompleted {
                user,
                timestamp: U256::from(block),
                message: "gm".to_string(),
                checkinCount: U256::from(1u8),
            },
            tx,
            block,
        )
    }

    #[test]
    fn test_block_chunks() {
        assert_eq!(
            block_chunks(0, 4_500, 2_000),
            vec![(0, 1_999), (2_000, 3_999), (4_000, 4_500)]
        );
        assert_eq!(block_chunks(10, 10, 2_000), vec![(10, 10)]);
        assert!(block_chunks(11, 10, 2_000).is_empty());
    }

    #[tokio::test]
    async fn test_range_floors_at_deploy_block() {
        let provider = MockProvider::new(50_000);
        let mut c = contracts();
        c.deploy_block = 45_000;
        let scanner = TransactionScanner::new(&provider, &c, ScanOptions::default());

        scanner.fetch_user_transactions(USER).await;
        // [45000, 50000] is 3 chunks, 4 contracts each
        assert_eq!(provider.log_calls.load(Ordering::SeqCst), 12);
    }

    #[tokio::test]
    async fn test_lookback_window() {
        let provider = MockProvider::new(100_000);
        let c = contracts();
        // Outside the 30k window
        provider.add_transaction(tx_hash(1), USER, 60_000, vec![checkin(USER, tx_hash(1), 60_000)]);
        // Inside
        provider.add_transaction(tx_hash(2), USER, 75_000, vec![checkin(USER, tx_hash(2), 75_000)]);

        let scanner = TransactionScanner::new(&provider, &c, ScanOptions::default());
        let receipts = scanner.fetch_user_transactions(USER).await;

        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].transaction_hash, tx_hash(2));
        // 70000..=100000 is 16 chunks
        assert_eq!(provider.log_calls.load(Ordering::SeqCst), 16 * 4);
    }

    #[tokio::test]
    async fn test_filters_by_sender() {
        let provider = MockProvider::new(1_000);
        let c = contracts();
        provider.add_transaction(tx_hash(1), USER, 10, vec![checkin(USER, tx_hash(1), 10)]);
        provider.add_transaction(tx_hash(2), STRANGER, 11, vec![checkin(STRANGER, tx_hash(2), 11)]);

        let scanner = TransactionScanner::new(&provider, &c, ScanOptions::default());
        let receipts = scanner.fetch_user_transactions(USER).await;

        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].from, USER);
        assert_eq!(provider.receipt_calls_for(tx_hash(2)), 0);
    }

    #[tokio::test]
    async fn test_dedupes_hash_across_contracts() {
        let provider = MockProvider::new(1_000);
        let c = contracts();
        let hash = tx_hash(7);
        let logs = vec![
            log_from(
                BADGE,
                &BadgeMinted {
                    user: USER,
                    tokenId: U256::from(1u8),
                    tier: 2,
                    referrer: Address::ZERO,
                },
                hash,
                20,
            ),
            log_from(
                USERNAME,
                &UsernameRegistered {
                    user: USER,
                    username: "leaf".to_string(),
                },
                hash,
                20,
            ),
        ];
        provider.add_transaction(hash, USER, 20, logs);

        let scanner = TransactionScanner::new(&provider, &c, ScanOptions::default());
        let receipts = scanner.fetch_user_transactions(USER).await;

        assert_eq!(receipts.len(), 1);
        assert_eq!(provider.receipt_calls_for(hash), 1);
        assert_eq!(provider.transaction_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stops_after_match_limit() {
        let provider = MockProvider::new(29_999);
        let c = contracts();
        // 30 matching transactions in each of the first three chunks
        for chunk in 0..3u64 {
            for i in 0..30u64 {
                let n = chunk * 100 + i + 1;
                let block = chunk * 2_000 + i;
                provider.add_transaction(tx_hash(n), USER, block, vec![checkin(USER, tx_hash(n), block)]);
            }
        }

        let scanner = TransactionScanner::new(&provider, &c, ScanOptions::default());
        let receipts = scanner.fetch_user_transactions(USER).await;

        // Two chunks reach 60 >= 50; the third is never requested
        assert_eq!(receipts.len(), 60);
        assert_eq!(provider.log_calls.load(Ordering::SeqCst), 2 * 4);
    }

    #[tokio::test]
    async fn test_failed_range_and_transaction_are_skipped() {
        let provider = MockProvider::new(5_000);
        let c = contracts();
        provider.add_transaction(tx_hash(1), USER, 100, vec![checkin(USER, tx_hash(1), 100)]);
        provider.add_transaction(tx_hash(2), USER, 2_100, vec![checkin(USER, tx_hash(2), 2_100)]);
        provider.add_transaction(tx_hash(3), USER, 4_100, vec![checkin(USER, tx_hash(3), 4_100)]);
        provider.fail_range(0);
        provider.fail_transaction(tx_hash(3));

        let scanner = TransactionScanner::new(&provider, &c, ScanOptions::default());
        let receipts = scanner.fetch_user_transactions(USER).await;

        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].transaction_hash, tx_hash(2));
    }

    #[tokio::test]
    async fn test_unavailable_provider_returns_empty() {
        let provider = MockProvider::unavailable();
        let c = contracts();
        let scanner = TransactionScanner::new(&provider, &c, ScanOptions::default());

        assert!(scanner.fetch_user_transactions(USER).await.is_empty());
        assert!(scanner.try_fetch_user_transactions(USER).await.is_err());
        assert_eq!(provider.log_calls.load(Ordering::SeqCst), 0);
    }
}
