/// GM Tea contract events
///
/// Each tracked event has a strict decoder returning `Result`. A log is
/// first matched by emitting contract and `topics[0]`, then decoded; a
/// decode failure still tells the caller which event it was, so the
/// classifier can fall back to a generic description.

use alloy::primitives::{Address, B256, U256};
use alloy::sol;
use alloy::sol_types::SolEvent;

use crate::contracts::ContractKind;
use crate::types::ChainLog;

sol! {
    event CheckinCompleted(address indexed user, uint256 timestamp, string message, uint256 checkinCount);
    event BadgeMinted(address indexed user, uint256 indexed tokenId, uint8 tier, address referrer);
    event UsernameRegistered(address indexed user, string username);
    event UsernameChanged(address indexed user, string oldUsername, string newUsername);
    event RewardClaimed(address indexed user, uint256 amount);
    event ReferralRecorded(address indexed referrer, address indexed referee, uint256 reward);
}

/// Event recognized by contract and topic hash, before decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSignature {
    CheckinCompleted,
    BadgeMinted,
    UsernameRegistered,
    UsernameChanged,
    RewardClaimed,
    ReferralRecorded,
}

impl EventSignature {
    pub const ALL: [EventSignature; 6] = [
        EventSignature::CheckinCompleted,
        EventSignature::BadgeMinted,
        EventSignature::UsernameRegistered,
        EventSignature::UsernameChanged,
        EventSignature::RewardClaimed,
        EventSignature::ReferralRecorded,
    ];

    pub fn topic(&self) -> B256 {
        match self {
            EventSignature::CheckinCompleted => CheckinCompleted::SIGNATURE_HASH,
            EventSignature::BadgeMinted => BadgeMinted::SIGNATURE_HASH,
            EventSignature::UsernameRegistered => UsernameRegistered::SIGNATURE_HASH,
            EventSignature::UsernameChanged => UsernameChanged::SIGNATURE_HASH,
            EventSignature::RewardClaimed => RewardClaimed::SIGNATURE_HASH,
            EventSignature::ReferralRecorded => ReferralRecorded::SIGNATURE_HASH,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EventSignature::CheckinCompleted => "CheckinCompleted",
            EventSignature::BadgeMinted => "BadgeMinted",
            EventSignature::UsernameRegistered => "UsernameRegistered",
            EventSignature::UsernameChanged => "UsernameChanged",
            EventSignature::RewardClaimed => "RewardClaimed",
            EventSignature::ReferralRecorded => "ReferralRecorded",
        }
    }

    pub fn contract(&self) -> ContractKind {
        match self {
            EventSignature::CheckinCompleted => ContractKind::Checkin,
            EventSignature::BadgeMinted => ContractKind::Badge,
            EventSignature::UsernameRegistered | EventSignature::UsernameChanged => {
                ContractKind::Username
            }
            EventSignature::RewardClaimed | EventSignature::ReferralRecorded => {
                ContractKind::Referral
            }
        }
    }

    /// Match `topic0` against the events of interest on `contract`
    pub fn identify(contract: ContractKind, topic0: &B256) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|sig| sig.contract() == contract && sig.topic() == *topic0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckinEvent {
    pub user: Address,
    pub timestamp: U256,
    pub message: String,
    pub checkin_count: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeMintEvent {
    pub user: Address,
    pub token_id: U256,
    pub tier: u8,
    pub referrer: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsernameEvent {
    Registered { user: Address, username: String },
    Changed { user: Address, old: String, new: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardEvent {
    pub user: Address,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralEvent {
    pub referrer: Address,
    pub referee: Address,
    pub reward: U256,
}

/// Decoded GM Tea event, one variant per event family
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GmTeaEvent {
    Checkin(CheckinEvent),
    BadgeMint(BadgeMintEvent),
    Username(UsernameEvent),
    Reward(RewardEvent),
    Referral(ReferralEvent),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub event: EventSignature,
    pub message: String,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Failed to decode {}: {}", self.event.name(), self.message)
    }
}

impl std::error::Error for DecodeError {}

fn decode_raw<E: SolEvent>(sig: EventSignature, log: &ChainLog) -> Result<E, DecodeError> {
    E::decode_raw_log(log.topics.iter().copied(), &log.data, true).map_err(|e| DecodeError {
        event: sig,
        message: e.to_string(),
    })
}

/// Decode a log already identified as `sig`
pub fn decode(sig: EventSignature, log: &ChainLog) -> Result<GmTeaEvent, DecodeError> {
    let event = match sig {
        EventSignature::CheckinCompleted => {
            let e: CheckinCompleted = decode_raw(sig, log)?;
            GmTeaEvent::Checkin(CheckinEvent {
                user: e.user,
                timestamp: e.timestamp,
                message: e.message,
                checkin_count: e.checkinCount,
            })
        }
        EventSignature::BadgeMinted => {
            let e: BadgeMinted = decode_raw(sig, log)?;
            GmTeaEvent::BadgeMint(BadgeMintEvent {
                user: e.user,
                token_id: e.tokenId,
                tier: e.tier,
                referrer: e.referrer,
            })
        }
        EventSignature::UsernameRegistered => {
            let e: UsernameRegistered = decode_raw(sig, log)?;
            GmTeaEvent::Username(UsernameEvent::Registered {
                user: e.user,
                username: e.username,
            })
        }
        EventSignature::UsernameChanged => {
            let e: UsernameChanged = decode_raw(sig, log)?;
            GmTeaEvent::Username(UsernameEvent::Changed {
                user: e.user,
                old: e.oldUsername,
                new: e.newUsername,
            })
        }
        EventSignature::RewardClaimed => {
            let e: RewardClaimed = decode_raw(sig, log)?;
            GmTeaEvent::Reward(RewardEvent {
                user: e.user,
                amount: e.amount,
            })
        }
        EventSignature::ReferralRecorded => {
            let e: ReferralRecorded = decode_raw(sig, log)?;
            GmTeaEvent::Referral(ReferralEvent {
                referrer: e.referrer,
                referee: e.referee,
                reward: e.reward,
            })
        }
    };
    Ok(event)
}
