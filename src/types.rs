use std::fmt;

use alloy::primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};

/// Transaction hash carried by placeholder activities (no provenance)
pub const ZERO_HASH: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";

/// Closed set of activity kinds shown in the history feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Checkin,
    Badge,
    Username,
    Message,
    Reward,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Checkin => "checkin",
            ActivityKind::Badge => "badge",
            ActivityKind::Username => "username",
            ActivityKind::Message => "message",
            ActivityKind::Reward => "reward",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "checkin" | "check-in" => Some(ActivityKind::Checkin),
            "badge" => Some(ActivityKind::Badge),
            "username" => Some(ActivityKind::Username),
            "message" => Some(ActivityKind::Message),
            "reward" => Some(ActivityKind::Reward),
            _ => None,
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized on-chain event relevant to a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    /// Seconds since epoch
    pub timestamp: u64,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub title: String,
    pub subtitle: String,
    pub transaction_hash: String,
    pub block_number: u64,
    pub complete: bool,
}

impl Activity {
    pub fn new(
        kind: ActivityKind,
        tx_hash: B256,
        block_number: u64,
        timestamp: u64,
        title: impl Into<String>,
        subtitle: impl Into<String>,
    ) -> Self {
        let transaction_hash = tx_hash.to_string();
        Self {
            id: format!("{}-{}", kind.as_str(), transaction_hash),
            timestamp,
            kind,
            title: title.into(),
            subtitle: subtitle.into(),
            transaction_hash,
            block_number,
            complete: true,
        }
    }

    /// Placeholders stand in for check-ins whose transaction was not found
    pub fn is_placeholder(&self) -> bool {
        self.transaction_hash == ZERO_HASH && self.block_number == 0
    }
}

/// Log as returned by `eth_getLogs` or inside a receipt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<B256>,
    pub log_index: Option<u64>,
}

impl ChainLog {
    pub fn topic0(&self) -> Option<&B256> {
        self.topics.first()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTransaction {
    pub hash: B256,
    pub from: Address,
    pub block_number: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReceipt {
    pub transaction_hash: B256,
    pub from: Address,
    pub block_number: u64,
    pub status: bool,
    pub logs: Vec<ChainLog>,
}

/// Inclusive block range filtered to a single emitting contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogQuery {
    pub address: Address,
    pub from_block: u64,
    pub to_block: u64,
}
