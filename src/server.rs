/// Activity HTTP API
///
/// GET /api/activity/{address}  activity history, cache first
/// GET /health                  liveness
/// GET /metrics                 Prometheus text format
///
/// A cache hit is answered immediately and refreshed in the background,
/// the same way the feed handles a mount. At most one background refresh
/// runs per address.

use axum::extract::{Path, Query};
use axum::http::{header, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, warn};

use crate::activity::{parse_address, ActivityError, ActivityService};
use crate::metrics;
use crate::presentation::{display_label, explorer_tx_url, group_by_day, ActivityFilter, DayGroup};
use crate::types::{Activity, ActivityKind};

pub struct AppState {
    pub service: ActivityService,
    pub explorer_url: String,
    refreshing: Mutex<HashSet<Address>>,
}

impl AppState {
    pub fn new(service: ActivityService, explorer_url: impl Into<String>) -> Self {
        Self {
            service,
            explorer_url: explorer_url.into(),
            refreshing: Mutex::new(HashSet::new()),
        }
    }

    pub fn is_refreshing(&self, user: Address) -> bool {
        self.refreshing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&user)
    }

    /// Start a background refresh for `user` unless one is already running.
    /// Returns whether a new refresh was started.
    pub fn spawn_refresh(self: &Arc<Self>, user: Address) -> bool {
        if !self
            .refreshing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user)
        {
            debug!(user = %user, "Background refresh already running");
            return false;
        }

        let state = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = state.service.fetch_onchain_activities(user).await {
                warn!(user = %user, error = %e, "Background refresh failed");
            }
            state
                .refreshing
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&user);
        });
        true
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ApiError {
    pub error: ErrorDetail,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorDetail {
    pub message: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

fn api_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            error: ErrorDetail {
                message: message.into(),
            },
        }),
    )
}

impl From<ActivityError> for (StatusCode, Json<ApiError>) {
    fn from(e: ActivityError) -> Self {
        let status = match e {
            ActivityError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
            ActivityError::Provider(_) => StatusCode::SERVICE_UNAVAILABLE,
            ActivityError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        api_error(status, e.to_string())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    /// Drop the cached entry and rebuild from chain data
    #[serde(default)]
    pub refresh: bool,
    #[serde(default)]
    pub grouped: bool,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Include estimated check-ins (default true)
    pub placeholders: Option<bool>,
    pub q: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityView {
    #[serde(flatten)]
    pub activity: Activity,
    pub label: String,
    pub placeholder: bool,
    pub explorer_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityResponse {
    pub address: String,
    pub cached: bool,
    pub refreshing: bool,
    pub activities: Vec<ActivityView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days: Option<Vec<DayGroup>>,
}

fn view(activity: Activity, explorer: &str) -> ActivityView {
    ActivityView {
        label: display_label(&activity),
        placeholder: activity.is_placeholder(),
        explorer_url: explorer_tx_url(explorer, &activity),
        activity,
    }
}

/// GET /api/activity/{address}
pub async fn activity_handler(
    Path(address): Path<String>,
    Query(query): Query<ActivityQuery>,
    Extension(state): Extension<Arc<AppState>>,
) -> ApiResult<ActivityResponse> {
    let result = activity_response(&address, &query, &state).await;
    let status = match &result {
        Ok(_) => 200,
        Err((status, _)) => status.as_u16(),
    };
    metrics::increment_http_requests("activity", status);
    result.map(Json)
}

async fn activity_response(
    address: &str,
    query: &ActivityQuery,
    state: &Arc<AppState>,
) -> Result<ActivityResponse, (StatusCode, Json<ApiError>)> {
    let user = parse_address(address)?;
    let kind = match query.kind.as_deref() {
        Some(k) => Some(
            ActivityKind::parse(k)
                .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, format!("Unknown activity type: {}", k)))?,
        ),
        None => None,
    };

    let cached = if query.refresh {
        state.service.invalidate(user);
        None
    } else {
        state.service.cached(user)
    };
    let was_cached = cached.is_some();

    let activities = match cached {
        Some(activities) => {
            state.spawn_refresh(user);
            activities
        }
        None => state.service.fetch_onchain_activities(user).await?,
    };
    debug!(user = %user, count = activities.len(), cached = was_cached, "Activity request");

    let filter = ActivityFilter {
        kind,
        include_placeholders: query.placeholders.unwrap_or(true),
        query: query.q.clone(),
    };
    let filtered = filter.apply(&activities);
    let days = query
        .grouped
        .then(|| group_by_day(&filtered, state.service.now_secs()));

    Ok(ActivityResponse {
        address: user.to_string().to_lowercase(),
        cached: was_cached,
        refreshing: was_cached,
        activities: filtered
            .into_iter()
            .map(|a| view(a, &state.explorer_url))
            .collect(),
        days,
    })
}

pub async fn health_handler() -> Json<serde_json::Value> {
    metrics::increment_http_requests("health", 200);
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/api/activity/{address}", get(activity_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(Extension(state))
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ActivityCache, LocalActivityCache, DEFAULT_TTL};
    use crate::clock::ManualClock;
    use crate::contracts::getCheckinCountCall;
    use crate::store::MemoryStore;
    use crate::test_support::{contracts, tx_hash, MockProvider};
    use alloy::primitives::U256;
    use alloy::sol_types::{SolCall, SolValue};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    const USER: &str = "0x00000000000000000000000000000000000000AA";
    const NOW_MS: u64 = 1_800_000_000_000;

    fn app_state(provider: Arc<MockProvider>) -> (Arc<AppState>, Arc<LocalActivityCache<MemoryStore>>) {
        let clock = Arc::new(ManualClock::new(NOW_MS));
        let cache = Arc::new(LocalActivityCache::with_clock(MemoryStore::default(), DEFAULT_TTL, clock.clone()));
        let service = ActivityService::new(provider, cache.clone(), contracts()).with_clock(clock);
        (Arc::new(AppState::new(service, "https://sepolia.tea.xyz")), cache)
    }

    async fn serve(state: Arc<AppState>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn spawn_app(provider: MockProvider) -> (String, Arc<LocalActivityCache<MemoryStore>>) {
        let (state, cache) = app_state(Arc::new(provider));
        (serve(state).await, cache)
    }

    fn http() -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_activity_endpoint_marks_placeholders() {
        let provider = MockProvider::new(1_000);
        provider.set_call_response(contracts().checkin, getCheckinCountCall::SELECTOR, U256::from(2u8).abi_encode());
        let (base, _) = spawn_app(provider).await;

        let body: serde_json::Value = http()
            .get(format!("{}/api/activity/{}", base, USER))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["cached"], false);
        assert_eq!(body["address"], USER.to_lowercase());
        let list = body["activities"].as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["type"], "checkin");
        assert_eq!(list[0]["placeholder"], true);
        assert!(list[0]["explorerUrl"].is_null());
        assert_eq!(list[0]["label"], "Daily Check-in (estimated)");
    }

    #[tokio::test]
    async fn test_cached_response_and_filters() {
        let (base, cache) = spawn_app(MockProvider::new(1_000)).await;
        cache.set(
            USER,
            &[
                Activity::new(ActivityKind::Badge, tx_hash(1), 1, 200, "Badge Minted", "Rare Badge #2"),
                Activity::new(ActivityKind::Checkin, tx_hash(2), 2, 100, "Daily Check-in", "GM!"),
            ],
        );

        let body: serde_json::Value = http()
            .get(format!("{}/api/activity/{}?type=badge", base, USER))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["cached"], true);
        let list = body["activities"].as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["subtitle"], "Rare Badge #2");
        assert!(list[0]["explorerUrl"].as_str().unwrap().starts_with("https://sepolia.tea.xyz/tx/0x"));
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let (base, _) = spawn_app(MockProvider::unavailable()).await;

        let bad = http().get(format!("{}/api/activity/not-an-address", base)).send().await.unwrap();
        assert_eq!(bad.status().as_u16(), 400);

        let down = http().get(format!("{}/api/activity/{}", base, USER)).send().await.unwrap();
        assert_eq!(down.status().as_u16(), 503);
        let body: ApiError = down.json().await.unwrap();
        assert!(body.error.message.contains("Blockchain unavailable"));

        let health = http().get(format!("{}/health", base)).send().await.unwrap();
        assert_eq!(health.status().as_u16(), 200);
    }

    #[tokio::test]
    async fn test_one_background_refresh_per_address() {
        let provider = Arc::new(MockProvider::new(1_000));
        let (state, _) = app_state(provider.clone());
        let user = parse_address(USER).unwrap();

        assert!(state.spawn_refresh(user));
        for _ in 0..9 {
            assert!(!state.spawn_refresh(user));
        }
        assert!(state.is_refreshing(user));

        tokio::time::timeout(Duration::from_secs(5), async {
            while state.is_refreshing(user) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        // One scan: a single chunk per tracked contract
        assert_eq!(provider.log_calls.load(Ordering::SeqCst), 4);
        assert!(state.spawn_refresh(user));
    }

    #[tokio::test]
    async fn test_refresh_query_replaces_cached_entry() {
        let (base, cache) = spawn_app(MockProvider::new(1_000)).await;
        cache.set(
            USER,
            &[Activity::new(ActivityKind::Badge, tx_hash(1), 1, 200, "Badge Minted", "Rare Badge #2")],
        );

        let body: serde_json::Value = http()
            .get(format!("{}/api/activity/{}?refresh=true", base, USER))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["cached"], false);
        assert_eq!(body["activities"].as_array().unwrap().len(), 0);
        assert_eq!(cache.get(USER), Some(vec![]));
    }

    #[tokio::test]
    async fn test_grouped_labels_follow_service_clock() {
        let (base, cache) = spawn_app(MockProvider::new(1_000)).await;
        let now = NOW_MS / 1_000;
        cache.set(
            USER,
            &[
                Activity::new(ActivityKind::Checkin, tx_hash(1), 1, now - 100, "Daily Check-in", "GM!"),
                Activity::new(ActivityKind::Checkin, tx_hash(2), 2, now - 86_400, "Daily Check-in", "GM!"),
            ],
        );

        let body: serde_json::Value = http()
            .get(format!("{}/api/activity/{}?grouped=true", base, USER))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let days = body["days"].as_array().unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0]["label"], "Today");
        assert_eq!(days[1]["label"], "Yesterday");
    }
}
