/// GM Tea REST backend client
///
/// Read-only JSON endpoints for leaderboard, check-ins, badges, points and
/// user profiles. Addresses are lower-cased in paths. Response structs
/// default every missing field so older backend versions still parse.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("gmtea-activity/", env!("CARGO_PKG_VERSION"));

#[derive(Debug)]
pub enum BackendError {
    Http(String),
    Status { status: u16, url: String },
    Decode(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        BackendError::Http(e.to_string())
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            BackendError::Http(e) => write!(f, "Backend request failed: {}", e),
            BackendError::Status { status, url } => write!(f, "Backend returned {} for {}", status, url),
            BackendError::Decode(e) => write!(f, "Invalid backend response: {}", e),
        }
    }
}

impl std::error::Error for BackendError {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub address: String,
    pub username: Option<String>,
    pub points: u64,
    pub rank: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CheckinRecord {
    pub address: String,
    pub message: String,
    pub timestamp: u64,
    pub tx_hash: Option<String>,
    pub block_number: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BadgeRecord {
    pub token_id: u64,
    pub tier: u8,
    pub minted_at: Option<u64>,
    pub tx_hash: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PointsSummary {
    pub address: String,
    pub total: u64,
    pub checkin_points: u64,
    pub badge_points: u64,
    pub referral_points: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserProfile {
    pub address: String,
    pub username: Option<String>,
    pub checkin_count: u64,
    pub points: u64,
    pub referrer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    client: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let url = self.url(path);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                url,
            });
        }
        let body = response.text().await?;
        debug!(url = %url, bytes = body.len(), "Backend response");
        serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }

    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, BackendError> {
        self.get_json("/api/leaderboard/points").await
    }

    pub async fn latest_checkins(&self) -> Result<Vec<CheckinRecord>, BackendError> {
        self.get_json("/api/checkins/latest").await
    }

    pub async fn checkins(&self, address: &str) -> Result<Vec<CheckinRecord>, BackendError> {
        self.get_json(&format!("/api/checkins/{}", address.to_lowercase())).await
    }

    pub async fn badges(&self, address: &str) -> Result<Vec<BadgeRecord>, BackendError> {
        self.get_json(&format!("/api/badges/{}", address.to_lowercase())).await
    }

    pub async fn points(&self, address: &str) -> Result<PointsSummary, BackendError> {
        self.get_json(&format!("/api/points/{}", address.to_lowercase())).await
    }

    pub async fn user(&self, address: &str) -> Result<UserProfile, BackendError> {
        self.get_json(&format!("/api/users/{}", address.to_lowercase())).await
    }
}
