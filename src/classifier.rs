/// Event Classifier
///
/// Turns one receipt into zero or more `Activity` records. Each log is
/// handled on its own: match the emitting contract, match `topics[0]`,
/// decode, describe. A log that matches a tracked event but fails to
/// decode still yields an activity with a generic description.

use alloy::primitives::utils::format_units;
use alloy::primitives::{Address, U256};
use tracing::{debug, warn};

use crate::contracts::{self, ContractAddresses};
use crate::events::{self, EventSignature, GmTeaEvent, UsernameEvent};
use crate::metrics;
use crate::provider::ChainProvider;
use crate::types::{Activity, ActivityKind, ChainLog, ChainReceipt};

pub const MESSAGE_PREVIEW_CHARS: usize = 30;
const ETHER_DECIMALS: u8 = 18;

const TIER_NAMES: [&str; 5] = ["Common", "Uncommon", "Rare", "Epic", "Legendary"];

/// Display name of a badge tier, `Tier N` outside the known range
pub fn tier_name(tier: u8) -> String {
    TIER_NAMES
        .get(tier as usize)
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("Tier {}", tier))
}

/// First `max_chars` characters, with "..." appended when cut
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    if message.chars().count() > max_chars {
        let cut: String = message.chars().take(max_chars).collect();
        format!("{}...", cut)
    } else {
        message.to_string()
    }
}

/// Wei amount as ether rounded to 4 decimals
///
/// # Examples
/// ```
/// use alloy::primitives::U256;
/// use gmtea_activity::classifier::format_ether;
/// assert_eq!(format_ether(U256::from(1_500_000_000_000_000_000u128)), "1.5000");
/// ```
pub fn format_ether(amount: U256) -> String {
    // Half of the last shown digit, so cutting to 4 places rounds
    let half = U256::from(50_000_000_000_000u64);
    let formatted = match format_units(amount.saturating_add(half), ETHER_DECIMALS) {
        Ok(formatted) => formatted,
        Err(e) => {
            debug!(amount = %amount, error = %e, "Could not format amount as ether");
            return format!("{} wei", amount);
        }
    };
    match formatted.split_once('.') {
        Some((whole, frac)) => format!("{}.{:0<4}", whole, &frac[..frac.len().min(4)]),
        None => format!("{}.0000", formatted),
    }
}

/// `0x1234...abcd`
pub fn short_address(address: Address) -> String {
    let s = address.to_string();
    format!("{}...{}", &s[..6], &s[s.len() - 4..])
}

/// Title, subtitle and kind for a decoded event as seen by `user`
pub fn describe(event: &GmTeaEvent, user: Address, native_symbol: &str) -> (ActivityKind, String, String) {
    match event {
        GmTeaEvent::Checkin(e) => {
            let subtitle = if e.message.trim().is_empty() {
                "GM!".to_string()
            } else {
                truncate_message(&e.message, MESSAGE_PREVIEW_CHARS)
            };
            (ActivityKind::Checkin, "Daily Check-in".to_string(), subtitle)
        }
        GmTeaEvent::BadgeMint(e) => (
            ActivityKind::Badge,
            "Badge Minted".to_string(),
            format!("{} Badge #{}", tier_name(e.tier), e.token_id),
        ),
        GmTeaEvent::Username(UsernameEvent::Registered { username, .. }) => (
            ActivityKind::Username,
            "Username Registered".to_string(),
            format!("@{}", username),
        ),
        GmTeaEvent::Username(UsernameEvent::Changed { old, new, .. }) => (
            ActivityKind::Username,
            "Username Changed".to_string(),
            format!("{} → {}", old, new),
        ),
        GmTeaEvent::Reward(e) => (
            ActivityKind::Reward,
            "Rewards Claimed".to_string(),
            format!("{} {}", format_ether(e.amount), native_symbol),
        ),
        GmTeaEvent::Referral(e) => {
            if e.referrer == user {
                (
                    ActivityKind::Reward,
                    "Referral Made".to_string(),
                    format!("Referred {}", short_address(e.referee)),
                )
            } else {
                (
                    ActivityKind::Reward,
                    "Referred by".to_string(),
                    short_address(e.referrer),
                )
            }
        }
    }
}

/// Generic description used when decoding fails
pub fn fallback_description(sig: EventSignature, block_number: u64) -> (ActivityKind, String, String) {
    match sig {
        EventSignature::CheckinCompleted => (
            ActivityKind::Checkin,
            "Daily Check-in".to_string(),
            format!("Check-in at block {}", block_number),
        ),
        EventSignature::BadgeMinted => (
            ActivityKind::Badge,
            "Badge Minted".to_string(),
            format!("Badge minted at block {}", block_number),
        ),
        EventSignature::UsernameRegistered => (
            ActivityKind::Username,
            "Username Registered".to_string(),
            format!("Username registered at block {}", block_number),
        ),
        EventSignature::UsernameChanged => (
            ActivityKind::Username,
            "Username Changed".to_string(),
            format!("Username changed at block {}", block_number),
        ),
        EventSignature::RewardClaimed => (
            ActivityKind::Reward,
            "Rewards Claimed".to_string(),
            format!("Reward claimed at block {}", block_number),
        ),
        EventSignature::ReferralRecorded => (
            ActivityKind::Reward,
            "Referral Recorded".to_string(),
            format!("Referral recorded at block {}", block_number),
        ),
    }
}

pub struct EventClassifier<'a, P: ChainProvider + ?Sized> {
    provider: &'a P,
    contracts: &'a ContractAddresses,
    user: Address,
    native_symbol: &'a str,
}

impl<'a, P: ChainProvider + ?Sized> EventClassifier<'a, P> {
    pub fn new(
        provider: &'a P,
        contracts: &'a ContractAddresses,
        user: Address,
        native_symbol: &'a str,
    ) -> Self {
        Self {
            provider,
            contracts,
            user,
            native_symbol,
        }
    }

    /// Activities for every recognized log in `receipt`
    pub async fn classify(&self, receipt: &ChainReceipt, timestamp: u64) -> Vec<Activity> {
        let mut activities = Vec::new();
        for log in &receipt.logs {
            if let Some(activity) = self.classify_log(receipt, log, timestamp).await {
                metrics::increment_activities_classified(activity.kind.as_str());
                activities.push(activity);
            }
        }
        activities
    }

    async fn classify_log(
        &self,
        receipt: &ChainReceipt,
        log: &ChainLog,
        timestamp: u64,
    ) -> Option<Activity> {
        let contract = self.contracts.kind_of(log.address)?;
        let sig = EventSignature::identify(contract, log.topic0()?)?;

        let (kind, title, subtitle) = match events::decode(sig, log) {
            Ok(event) => describe(&event, self.user, self.native_symbol),
            Err(e) => {
                warn!(
                    event = sig.name(),
                    block = receipt.block_number,
                    error = %e,
                    "Event decode failed, using generic description"
                );
                metrics::increment_decode_fallbacks(sig.name());
                self.fallback(sig, receipt.block_number).await
            }
        };

        Some(Activity::new(
            kind,
            receipt.transaction_hash,
            receipt.block_number,
            timestamp,
            title,
            subtitle,
        ))
    }

    async fn fallback(&self, sig: EventSignature, block_number: u64) -> (ActivityKind, String, String) {
        if sig == EventSignature::UsernameRegistered {
            match contracts::username_of(self.provider, self.contracts.username, self.user).await {
                Ok(Some(name)) => {
                    return (
                        ActivityKind::Username,
                        "Username Registered".to_string(),
                        format!("@{}", name),
                    )
                }
                Ok(None) => debug!(user = %self.user, "No current username on chain"),
                Err(e) => warn!(user = %self.user, error = %e, "Username lookup failed"),
            }
        }
        fallback_description(sig, block_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::getUsernameByAddressCall;
    use crate::events::{
        BadgeMinted, CheckinCompleted, ReferralRecorded, RewardClaimed, UsernameChanged,
        UsernameRegistered,
    };
    use crate::test_support::{
        contracts, log_from, tx_hash, MockProvider, BADGE, CHECKIN, REFERRAL, USERNAME,
    };
    use alloy::primitives::{address, Bytes};
    use alloy::sol_types::{SolCall, SolValue};

    const USER: Address = address!("00000000000000000000000000000000000000aa");
    const FRIEND: Address = address!("1234000000000000000000000000000000abcdef");

    fn receipt(block: u64, logs: Vec<ChainLog>) -> ChainReceipt {
        ChainReceipt {
            transaction_hash: tx_hash(block),
            from: USER,
            block_number: block,
            status: true,
            logs,
        }
    }

    async fn classify_one(log: ChainLog) -> Vec<Activity> {
        let provider = MockProvider::new(1_000);
        let c = contracts();
        let classifier = EventClassifier::new(&provider, &c, USER, "TEA");
        classifier.classify(&receipt(77, vec![log]), 1_700_000_077).await
    }

    #[test]
    fn test_tier_names() {
        assert_eq!(tier_name(0), "Common");
        assert_eq!(tier_name(4), "Legendary");
        assert_eq!(tier_name(5), "Tier 5");
    }

    #[test]
    fn test_truncate_message() {
        assert_eq!(truncate_message("short", 30), "short");
        let exact = "a".repeat(30);
        assert_eq!(truncate_message(&exact, 30), exact);
        let long = "b".repeat(31);
        assert_eq!(truncate_message(&long, 30), format!("{}...", "b".repeat(30)));
        // Character based, not byte based
        assert_eq!(truncate_message("🍵🍵🍵", 2), "🍵🍵...");
    }

    #[test]
    fn test_format_ether() {
        assert_eq!(format_ether(U256::ZERO), "0.0000");
        assert_eq!(format_ether(U256::from(1_000_000_000_000_000_000u128)), "1.0000");
        assert_eq!(format_ether(U256::from(123_456_789_000_000_000u128)), "0.1235");
        assert_eq!(format_ether(U256::from(99_999_000_000_000_000_000u128)), "99.9990");
        // Rounds up across the decimal point
        assert_eq!(format_ether(U256::from(1_999_960_000_000_000_000u128)), "2.0000");
        assert_eq!(format_ether(U256::from(1u8)), "0.0000");
    }

    #[test]
    fn test_short_address() {
        let s = short_address(FRIEND);
        assert!(s.starts_with("0x1234..."));
        assert!(s.to_lowercase().ends_with("cdef"));
    }

    #[tokio::test]
    async fn test_checkin_message_truncated() {
        let log = log_from(
            CHECKIN,
            &CheckinCompleted {
                user: USER,
                timestamp: U256::from(1u8),
                message: "Good morning tea lovers, hope the brew is strong today".to_string(),
                checkinCount: U256::from(4u8),
            },
            tx_hash(77),
            77,
        );
        let activities = classify_one(log).await;

        assert_eq!(activities.len(), 1);
        let a = &activities[0];
        assert_eq!(a.kind, ActivityKind::Checkin);
        assert_eq!(a.subtitle, "Good morning tea lovers, hope ...");
        assert_eq!(a.timestamp, 1_700_000_077);
        assert_eq!(a.id, format!("checkin-{}", tx_hash(77)));
    }

    #[tokio::test]
    async fn test_badge_tier() {
        let log = log_from(
            BADGE,
            &BadgeMinted {
                user: USER,
                tokenId: U256::from(12u8),
                tier: 3,
                referrer: Address::ZERO,
            },
            tx_hash(77),
            77,
        );
        let a = &classify_one(log).await[0];
        assert_eq!(a.kind, ActivityKind::Badge);
        assert_eq!(a.subtitle, "Epic Badge #12");
    }

    #[tokio::test]
    async fn test_username_changed() {
        let log = log_from(
            USERNAME,
            &UsernameChanged {
                user: USER,
                oldUsername: "sencha".to_string(),
                newUsername: "matcha".to_string(),
            },
            tx_hash(77),
            77,
        );
        let a = &classify_one(log).await[0];
        assert_eq!(a.title, "Username Changed");
        assert_eq!(a.subtitle, "sencha → matcha");
    }

    #[tokio::test]
    async fn test_reward_amount() {
        let log = log_from(
            REFERRAL,
            &RewardClaimed {
                user: USER,
                amount: U256::from(2_500_000_000_000_000_000u128),
            },
            tx_hash(77),
            77,
        );
        let a = &classify_one(log).await[0];
        assert_eq!(a.kind, ActivityKind::Reward);
        assert_eq!(a.subtitle, "2.5000 TEA");
    }

    #[tokio::test]
    async fn test_referral_roles() {
        // Queried user is the referrer (address compared case-insensitively)
        let made = log_from(
            REFERRAL,
            &ReferralRecorded {
                referrer: USER,
                referee: FRIEND,
                reward: U256::ZERO,
            },
            tx_hash(77),
            77,
        );
        let a = &classify_one(made).await[0];
        assert_eq!(a.title, "Referral Made");
        assert!(a.subtitle.starts_with("Referred 0x1234..."));

        // Queried user is the referee
        let by = log_from(
            REFERRAL,
            &ReferralRecorded {
                referrer: FRIEND,
                referee: USER,
                reward: U256::ZERO,
            },
            tx_hash(77),
            77,
        );
        let a = &classify_one(by).await[0];
        assert_eq!(a.title, "Referred by");
        assert!(a.subtitle.starts_with("0x1234..."));
    }

    #[tokio::test]
    async fn test_checkin_decode_failure_falls_back() {
        let mut log = log_from(
            CHECKIN,
            &CheckinCompleted {
                user: USER,
                timestamp: U256::from(1u8),
                message: "gm".to_string(),
                checkinCount: U256::from(1u8),
            },
            tx_hash(77),
            77,
        );
        log.data = Bytes::from(vec![0xff; 5]);

        let activities = classify_one(log).await;
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].kind, ActivityKind::Checkin);
        assert!(!activities[0].subtitle.is_empty());
        assert!(activities[0].subtitle.contains("77"));
    }

    #[tokio::test]
    async fn test_username_decode_failure_reads_current_name() {
        let provider = MockProvider::new(1_000);
        let c = contracts();
        provider.set_call_response(
            c.username,
            getUsernameByAddressCall::SELECTOR,
            ("oolong".to_string(),).abi_encode_params(),
        );
        let mut log = log_from(
            USERNAME,
            &UsernameRegistered {
                user: USER,
                username: "oolong".to_string(),
            },
            tx_hash(77),
            77,
        );
        log.data = Bytes::new();

        let classifier = EventClassifier::new(&provider, &c, USER, "TEA");
        let activities = classifier.classify(&receipt(77, vec![log.clone()]), 1).await;
        assert_eq!(activities[0].subtitle, "@oolong");

        // Lookup failure ends in the generic text
        let bare = MockProvider::new(1_000);
        let classifier = EventClassifier::new(&bare, &c, USER, "TEA");
        let activities = classifier.classify(&receipt(77, vec![log]), 1).await;
        assert_eq!(activities[0].subtitle, "Username registered at block 77");
    }

    #[tokio::test]
    async fn test_unknown_logs_are_ignored_and_multiple_events_kept() {
        let provider = MockProvider::new(1_000);
        let c = contracts();
        let checkin = log_from(
            CHECKIN,
            &CheckinCompleted {
                user: USER,
                timestamp: U256::from(1u8),
                message: String::new(),
                checkinCount: U256::from(1u8),
            },
            tx_hash(77),
            77,
        );
        let badge = log_from(
            BADGE,
            &BadgeMinted {
                user: USER,
                tokenId: U256::from(1u8),
                tier: 0,
                referrer: Address::ZERO,
            },
            tx_hash(77),
            77,
        );
        // Badge event emitted by the check-in contract does not count
        let mut misplaced = badge.clone();
        misplaced.address = CHECKIN;
        // Unrelated contract
        let mut foreign = checkin.clone();
        foreign.address = FRIEND;

        let classifier = EventClassifier::new(&provider, &c, USER, "TEA");
        let activities = classifier
            .classify(&receipt(77, vec![checkin, misplaced, foreign, badge]), 5)
            .await;

        let kinds: Vec<_> = activities.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![ActivityKind::Checkin, ActivityKind::Badge]);
        assert_eq!(activities[0].subtitle, "GM!");
    }
}
