/// Activity feed state machine
///
/// `FeedState::apply` is a pure reducer over
/// `{Idle, Loading, Success, Error} × refreshing`. `ActivityFeed` drives it
/// for one address:
/// - mount with a fresh cache: show cached data, refresh in the background
/// - mount without cache: run the pipeline, give up waiting after 15 s
///
/// A timeout only stops the feed from waiting. The pipeline task keeps
/// running and still writes the cache when it finishes.

use alloy::primitives::Address;
use serde::Serialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::activity::{ActivityError, ActivityService};
use crate::metrics;
use crate::types::Activity;

pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(15);
pub const TIMEOUT_MESSAGE: &str = "Loading timed out. Try refreshing.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Mount { cached: Option<Vec<Activity>> },
    Loaded(Vec<Activity>),
    Failed(String),
    TimedOut,
    Retry { cached: Option<Vec<Activity>> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedState {
    pub status: FeedStatus,
    pub refreshing: bool,
    pub activities: Vec<Activity>,
    pub error: Option<String>,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            status: FeedStatus::Idle,
            refreshing: false,
            activities: Vec::new(),
            error: None,
        }
    }
}

impl FeedState {
    pub fn apply(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Mount { cached } | FeedEvent::Retry { cached } => match cached {
                Some(data) => {
                    self.status = FeedStatus::Success;
                    self.activities = data;
                    self.refreshing = true;
                    self.error = None;
                }
                None => {
                    self.status = FeedStatus::Loading;
                    self.refreshing = false;
                    self.error = None;
                }
            },
            FeedEvent::Loaded(data) => {
                self.status = FeedStatus::Success;
                self.activities = data;
                self.refreshing = false;
                self.error = None;
            }
            FeedEvent::Failed(message) => {
                self.refreshing = false;
                if self.status != FeedStatus::Success {
                    self.status = FeedStatus::Error;
                    self.error = Some(message);
                }
            }
            FeedEvent::TimedOut => {
                self.refreshing = false;
                if self.status == FeedStatus::Loading {
                    self.status = FeedStatus::Error;
                    self.error = Some(TIMEOUT_MESSAGE.to_string());
                }
            }
        }
    }

    /// Loaded successfully with nothing to show
    pub fn is_empty(&self) -> bool {
        self.status == FeedStatus::Success && self.activities.is_empty()
    }
}

type PipelineHandle = JoinHandle<Result<Vec<Activity>, ActivityError>>;

pub struct ActivityFeed {
    service: ActivityService,
    user: Address,
    state: FeedState,
    load_timeout: Duration,
    refresh: Option<PipelineHandle>,
}

impl ActivityFeed {
    pub fn new(service: ActivityService, user: Address) -> Self {
        Self {
            service,
            user,
            state: FeedState::default(),
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            refresh: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    pub fn state(&self) -> &FeedState {
        &self.state
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh.is_some()
    }

    pub async fn mount(&mut self) -> &FeedState {
        let cached = self.service.cached(self.user);
        self.start(FeedEvent::Mount { cached }).await
    }

    /// Same as a fresh mount, for the retry button
    pub async fn retry(&mut self) -> &FeedState {
        let cached = self.service.cached(self.user);
        self.start(FeedEvent::Retry { cached }).await
    }

    /// Wait for the background refresh started on a cache hit, at most the
    /// load timeout. Past that the cached data stays and the task is detached.
    pub async fn finish_refresh(&mut self) -> &FeedState {
        if let Some(handle) = self.refresh.take() {
            match tokio::time::timeout(self.load_timeout, handle).await {
                Ok(joined) => {
                    let event = Self::outcome(joined);
                    self.state.apply(event);
                }
                Err(_) => {
                    metrics::increment_feed_timeouts();
                    warn!(
                        user = %self.user,
                        timeout_secs = self.load_timeout.as_secs(),
                        "Background refresh timed out, keeping cached activities"
                    );
                    self.state.apply(FeedEvent::TimedOut);
                }
            }
        }
        &self.state
    }

    async fn start(&mut self, event: FeedEvent) -> &FeedState {
        let hit = matches!(
            &event,
            FeedEvent::Mount { cached: Some(_) } | FeedEvent::Retry { cached: Some(_) }
        );
        self.state.apply(event);

        if hit {
            debug!(user = %self.user, "Showing cached activities, refreshing in background");
            self.refresh = Some(self.spawn_pipeline());
            return &self.state;
        }

        let handle = self.spawn_pipeline();
        match tokio::time::timeout(self.load_timeout, handle).await {
            Ok(joined) => {
                let event = Self::outcome(joined);
                self.state.apply(event);
            }
            Err(_) => {
                // Dropping the handle detaches the task
                metrics::increment_feed_timeouts();
                warn!(
                    user = %self.user,
                    timeout_secs = self.load_timeout.as_secs(),
                    "Activity load timed out"
                );
                self.state.apply(FeedEvent::TimedOut);
            }
        }
        &self.state
    }

    fn spawn_pipeline(&self) -> PipelineHandle {
        let service = self.service.clone();
        let user = self.user;
        tokio::spawn(async move { service.fetch_onchain_activities(user).await })
    }

    fn outcome(joined: Result<Result<Vec<Activity>, ActivityError>, tokio::task::JoinError>) -> FeedEvent {
        match joined {
            Ok(Ok(activities)) => {
                info!(count = activities.len(), "Activity feed updated");
                FeedEvent::Loaded(activities)
            }
            Ok(Err(e)) => FeedEvent::Failed(e.to_string()),
            Err(e) => FeedEvent::Failed(ActivityError::Task(e.to_string()).to_string()),
        }
    }
}
