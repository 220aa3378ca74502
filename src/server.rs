//! HTTP server for feeding readings to a monitor session.
//!
//! This module provides an HTTP server that:
//! - Accepts one reading or a batch via POST /readings
//! - Runs each through the subject's [`MonitorSession`]
//! - Keeps the recent event timeline and run statistics
//! - Posts alert notices to a webhook when one is configured
//!
//! # Architecture
//!
//! ```text
//! Wearable bridge ──→ POST /readings ──→ vitals-agent ──→ webhook
//!                                            ↓
//!                               [Baseline / Classify / Events]
//! ```

use crate::config::Config;
use crate::core::{
    Baseline, BaselineStatus, Event, MonitorError, MonitorSession, SessionOutcome, State,
};
use crate::explain::{
    create_shared_stats_with_persistence, EventLog, SharedMonitorStats, StatsSnapshot,
};
use crate::ingest::RawReading;
use crate::notify::{AlertNotice, AlertThrottle, WebhookNotifier};
use axum::{
    extract::{Query, State as AxumState},
    http::{HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Monitor configuration (thresholds, baseline, webhook)
    pub config: Config,
    /// State directory for persisted stats
    pub state_dir: PathBuf,
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(port: u16, config: Config, state_dir: PathBuf) -> Self {
        Self {
            port,
            config,
            state_dir,
        }
    }
}

/// Shared server state
pub struct ServerState {
    /// Monitor session for the connected subject
    session: RwLock<MonitorSession>,
    /// Recent events, newest first
    event_log: RwLock<EventLog>,
    /// Run statistics
    stats: SharedMonitorStats,
    /// Alert webhook, if configured
    notifier: Option<WebhookNotifier>,
    /// Webhook cooldown
    throttle: Mutex<AlertThrottle>,
}

impl ServerState {
    /// Create new server state
    pub fn new(config: &ServerConfig) -> anyhow::Result<Self> {
        let notifier = match config.config.notify.clone() {
            Some(notify) => Some(WebhookNotifier::new(notify)?),
            None => None,
        };
        let cooldown = config
            .config
            .notify
            .as_ref()
            .map_or(crate::notify::DEFAULT_COOLDOWN_SECS, |n| n.cooldown_secs);

        Ok(Self {
            session: RwLock::new(MonitorSession::from_config(&config.config)),
            event_log: RwLock::new(EventLog::new(config.config.event_log_capacity)),
            stats: create_shared_stats_with_persistence(config.state_dir.join("stats.json")),
            notifier,
            throttle: Mutex::new(AlertThrottle::new(cooldown)),
        })
    }

    /// Persist stats off the async worker threads.
    async fn save_stats(&self) {
        let stats = self.stats.clone();
        match tokio::task::spawn_blocking(move || stats.save()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Failed to save stats: {}", e),
            Err(e) => tracing::error!("Stats save task failed: {}", e),
        }
    }

    async fn send_notices(&self, notices: Vec<AlertNotice>) {
        let Some(ref notifier) = self.notifier else {
            return;
        };
        for notice in notices {
            if !self.throttle.lock().await.admit(notice.timestamp) {
                tracing::debug!("alert notice suppressed by cooldown");
                continue;
            }
            if let Err(e) = notifier.send(&notice).await {
                tracing::error!("Failed to deliver alert notice: {}", e);
            }
        }
    }
}

/// Body of POST /readings: one reading or an array of them.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ReadingsRequest {
    Batch(Vec<RawReading>),
    Single(RawReading),
}

/// Result for one submitted reading.
#[derive(Debug, Clone, Serialize)]
pub struct ReadingResult {
    pub index: usize,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<State>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisional: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Event>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

impl ReadingResult {
    fn from_outcome(index: usize, outcome: &SessionOutcome) -> Self {
        Self {
            index,
            accepted: true,
            state: Some(outcome.classified.state),
            provisional: Some(outcome.classified.provisional),
            events: outcome.events.clone(),
            error: None,
        }
    }

    fn from_error(index: usize, error: &MonitorError) -> Self {
        Self {
            index,
            accepted: false,
            state: None,
            provisional: None,
            events: Vec::new(),
            error: Some(ErrorResponse::from(error)),
        }
    }
}

/// Response from the readings endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ReadingsResponse {
    pub accepted: usize,
    pub rejected: usize,
    pub results: Vec<ReadingResult>,
}

/// Response from the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub state: State,
    pub meaning: String,
    pub baseline_status: BaselineStatus,
    pub baseline: Baseline,
    pub accepted: u64,
    pub stats: StatsSnapshot,
    pub disclaimer: String,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl From<&MonitorError> for ErrorResponse {
    fn from(e: &MonitorError) -> Self {
        let code = match e {
            MonitorError::InvalidReading(_) => "INVALID_READING",
            MonitorError::OutOfOrderReading { .. } => "OUT_OF_ORDER",
        };
        Self {
            error: e.to_string(),
            code: code.to_string(),
        }
    }
}

/// Query parameters for GET /events
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /readings
///
/// A single rejected reading is answered with 422; a batch always answers
/// 200 with a result per item.
async fn readings(
    AxumState(state): AxumState<Arc<ServerState>>,
    Json(body): Json<ReadingsRequest>,
) -> Result<Json<ReadingsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let (items, single) = match body {
        ReadingsRequest::Batch(items) => (items, false),
        ReadingsRequest::Single(item) => (vec![item], true),
    };

    let mut results = Vec::with_capacity(items.len());
    let mut notices = Vec::new();
    let mut single_error = None;
    {
        let mut session = state.session.write().await;
        let mut event_log = state.event_log.write().await;

        for (index, raw) in items.into_iter().enumerate() {
            match session.process_raw(raw) {
                Ok(outcome) => {
                    state.stats.record_outcome(&outcome);
                    if let Some(notice) = AlertNotice::from_outcome(&outcome) {
                        notices.push(notice);
                    }
                    results.push(ReadingResult::from_outcome(index, &outcome));
                    event_log.push_all(outcome.events);
                }
                Err(e) => {
                    state.stats.record_error(&e);
                    if single {
                        single_error = Some(ErrorResponse::from(&e));
                        break;
                    }
                    results.push(ReadingResult::from_error(index, &e));
                }
            }
        }
    }

    state.save_stats().await;
    if let Some(error) = single_error {
        return Err((StatusCode::UNPROCESSABLE_ENTITY, Json(error)));
    }
    state.send_notices(notices).await;

    let accepted = results.iter().filter(|r| r.accepted).count();
    Ok(Json(ReadingsResponse {
        accepted,
        rejected: results.len() - accepted,
        results,
    }))
}

/// GET /events
async fn events(
    AxumState(state): AxumState<Arc<ServerState>>,
    Query(query): Query<EventsQuery>,
) -> Json<Vec<Event>> {
    let log = state.event_log.read().await;
    let limit = query.limit.unwrap_or(log.len());
    Json(log.iter().take(limit).cloned().collect())
}

/// GET /status
async fn status(AxumState(state): AxumState<Arc<ServerState>>) -> Json<StatusResponse> {
    let session = state.session.read().await;
    let current = session.current_state();
    Json(StatusResponse {
        state: current,
        meaning: current.meaning().to_string(),
        baseline_status: session.baseline_status(),
        baseline: session.current_baseline(),
        accepted: session.accepted(),
        stats: state.stats.stats(),
        disclaimer: crate::DISCLAIMER_SHORT.to_string(),
    })
}

/// POST /reset
///
/// Discards the learned baseline and the event timeline.
async fn reset(AxumState(state): AxumState<Arc<ServerState>>) -> Json<HealthResponse> {
    state.session.write().await.reset();
    state.event_log.write().await.clear();
    state.throttle.lock().await.reset();
    tracing::info!("Monitor session reset over HTTP");

    Json(HealthResponse {
        status: "reset".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState::new(&config)?);

    let app = Router::new()
        .route("/health", get(health))
        .route("/readings", post(readings))
        .route("/events", get(events))
        .route("/status", get(status))
        .route("/reset", post(reset))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Vitals agent server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
