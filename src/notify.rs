//! Alert notification for the vitals agent.
//!
//! When a reading opens an ALERT the monitor builds an [`AlertNotice`] and
//! hands it to an [`AlertSink`]. The default sink only logs; with the
//! `notify` feature a webhook sink posts the notice as JSON.
//!
//! Sinks are throttled by reading time, not wall-clock time, so replaying a
//! recorded stream behaves the same as watching it live.

use crate::core::classifier::State;
use crate::core::session::SessionOutcome;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default minimum spacing between two delivered notices.
pub const DEFAULT_COOLDOWN_SECS: u64 = 300;

/// Webhook configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Endpoint receiving `POST` requests with an [`AlertNotice`] body
    pub url: String,
    /// Optional bearer token
    #[serde(default)]
    pub token: Option<String>,
    /// Minimum seconds of reading time between delivered notices
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
}

fn default_cooldown() -> u64 {
    DEFAULT_COOLDOWN_SECS
}

impl NotifyConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_cooldown(mut self, secs: u64) -> Self {
        self.cooldown_secs = secs;
        self
    }

    pub fn validate(&self) -> Result<(), NotifyError> {
        if self.url.starts_with("http://") || self.url.starts_with("https://") {
            Ok(())
        } else {
            Err(NotifyError::Config(format!(
                "webhook url must be http(s): '{}'",
                self.url
            )))
        }
    }
}

/// Notification error types.
#[derive(Debug)]
pub enum NotifyError {
    /// Configuration error
    Config(String),
    /// Network/HTTP error
    Network(String),
    /// Endpoint returned an error response
    Server { status: u16, message: String },
    /// JSON serialization error
    Serialization(String),
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::Config(msg) => write!(f, "Notify config error: {msg}"),
            NotifyError::Network(msg) => write!(f, "Notify network error: {msg}"),
            NotifyError::Server { status, message } => {
                write!(f, "Notify endpoint error ({status}): {message}")
            }
            NotifyError::Serialization(msg) => write!(f, "Notify serialization error: {msg}"),
        }
    }
}

impl std::error::Error for NotifyError {}

/// Payload sent when a reading opens an ALERT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertNotice {
    pub timestamp: DateTime<Utc>,
    pub state: State,
    pub heart_rate: f64,
    pub skin_temp: f64,
    pub sweat_level: f64,
    /// Messages of every event raised by the reading
    pub events: Vec<String>,
    pub disclaimer: String,
    /// Identifies the sending host
    pub device_id: String,
}

impl AlertNotice {
    /// Build a notice if `outcome` carries an ALERT onset.
    pub fn from_outcome(outcome: &SessionOutcome) -> Option<Self> {
        if !outcome.raised_alert() {
            return None;
        }
        let reading = &outcome.classified.reading;
        Some(Self {
            timestamp: reading.timestamp(),
            state: outcome.classified.state,
            heart_rate: reading.heart_rate(),
            skin_temp: reading.skin_temp(),
            sweat_level: reading.sweat_level(),
            events: outcome.events.iter().map(|e| e.message.clone()).collect(),
            disclaimer: crate::DISCLAIMER_SHORT.to_string(),
            device_id: device_id(),
        })
    }
}

fn device_id() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    format!("vitals-{host}")
}

/// Cooldown keyed on reading timestamps.
#[derive(Debug, Clone)]
pub struct AlertThrottle {
    cooldown: Duration,
    last_sent: Option<DateTime<Utc>>,
}

impl AlertThrottle {
    /// Cooldowns beyond what a [`Duration`] can hold are clamped to its maximum.
    pub fn new(cooldown_secs: u64) -> Self {
        let cooldown = i64::try_from(cooldown_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Self {
            cooldown,
            last_sent: None,
        }
    }

    /// Returns true and arms the cooldown if a notice at `at` may be sent.
    pub fn admit(&mut self, at: DateTime<Utc>) -> bool {
        match self.last_sent {
            Some(last) if at >= last && at - last < self.cooldown => false,
            _ => {
                self.last_sent = Some(at);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last_sent = None;
    }
}

/// Destination for alert notices.
pub trait AlertSink {
    /// Deliver a notice. Returns `Ok(false)` if it was suppressed.
    fn deliver(&mut self, notice: &AlertNotice) -> Result<bool, NotifyError>;
}

/// Sink that writes notices to the log.
#[derive(Debug, Default)]
pub struct LogSink {
    delivered: u64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

impl AlertSink for LogSink {
    fn deliver(&mut self, notice: &AlertNotice) -> Result<bool, NotifyError> {
        tracing::warn!(
            timestamp = %notice.timestamp.to_rfc3339(),
            heart_rate = notice.heart_rate,
            skin_temp = notice.skin_temp,
            sweat_level = notice.sweat_level,
            "{}",
            notice.events.join("; ")
        );
        self.delivered += 1;
        Ok(true)
    }
}

/// Webhook notifier.
#[cfg(feature = "notify")]
pub struct WebhookNotifier {
    config: NotifyConfig,
    client: reqwest::Client,
}

#[cfg(feature = "notify")]
impl WebhookNotifier {
    pub fn new(config: NotifyConfig) -> Result<Self, NotifyError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| NotifyError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &NotifyConfig {
        &self.config
    }

    /// Post a notice to the webhook.
    pub async fn send(&self, notice: &AlertNotice) -> Result<(), NotifyError> {
        let body =
            serde_json::to_vec(notice).map_err(|e| NotifyError::Serialization(e.to_string()))?;
        let mut request = self
            .client
            .post(&self.config.url)
            .header("Content-Type", "application/json")
            .body(body);
        if let Some(ref token) = self.config.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotifyError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(NotifyError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

/// Blocking webhook notifier for use in synchronous contexts.
#[cfg(feature = "notify")]
pub struct BlockingWebhookNotifier {
    inner: WebhookNotifier,
    throttle: AlertThrottle,
    runtime: tokio::runtime::Runtime,
}

#[cfg(feature = "notify")]
impl BlockingWebhookNotifier {
    pub fn new(config: NotifyConfig) -> Result<Self, NotifyError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| NotifyError::Config(format!("Failed to create runtime: {e}")))?;

        Ok(Self {
            throttle: AlertThrottle::new(config.cooldown_secs),
            inner: WebhookNotifier::new(config)?,
            runtime,
        })
    }
}

#[cfg(feature = "notify")]
impl AlertSink for BlockingWebhookNotifier {
    fn deliver(&mut self, notice: &AlertNotice) -> Result<bool, NotifyError> {
        if !self.throttle.admit(notice.timestamp) {
            tracing::debug!("alert notice suppressed by cooldown");
            return Ok(false);
        }
        self.runtime.block_on(self.inner.send(notice))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::EventType;
    use crate::core::session::MonitorSession;
    use crate::ingest::types::Reading;
    use chrono::TimeZone;

    fn at(i: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(i)
    }

    #[test]
    fn test_notice_only_for_alert_onset() {
        let mut session = MonitorSession::default();
        for i in 0..15 {
            let outcome = session
                .process(Reading::new(at(i), 70.0, 36.5, 0.0).unwrap())
                .unwrap();
            assert!(AlertNotice::from_outcome(&outcome).is_none());
        }

        let outcome = session
            .process(Reading::new(at(15), 100.0, 36.5, 0.0).unwrap())
            .unwrap();
        let notice = AlertNotice::from_outcome(&outcome).unwrap();
        assert_eq!(notice.state, State::Alert);
        assert_eq!(notice.heart_rate, 100.0);
        assert!(outcome
            .events
            .iter()
            .any(|e| e.event_type == EventType::HrDeviation));
        assert!(notice.events.iter().any(|m| m.starts_with("ALERT triggered")));
        assert!(notice.disclaimer.contains("not a medical diagnosis"));

        // Persisting ALERT does not re-raise.
        let outcome = session
            .process(Reading::new(at(16), 100.0, 36.5, 0.0).unwrap())
            .unwrap();
        assert!(AlertNotice::from_outcome(&outcome).is_none());
    }

    #[test]
    fn test_throttle_uses_reading_time() {
        let mut throttle = AlertThrottle::new(60);
        assert!(throttle.admit(at(0)));
        assert!(!throttle.admit(at(30)));
        assert!(throttle.admit(at(60)));
        throttle.reset();
        assert!(throttle.admit(at(61)));
    }

    #[test]
    fn test_throttle_with_huge_cooldown() {
        for secs in [u64::MAX, i64::MAX as u64, i64::MAX as u64 / 1000 + 1] {
            let mut throttle = AlertThrottle::new(secs);
            assert!(throttle.admit(at(0)));
            assert!(!throttle.admit(at(86_400 * 365 * 100)));
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(NotifyConfig::new("https://example.org/hook").validate().is_ok());
        assert!(matches!(
            NotifyConfig::new("example.org").validate(),
            Err(NotifyError::Config(_))
        ));

        let config: NotifyConfig =
            serde_json::from_str(r#"{"url": "http://127.0.0.1:9/hook"}"#).unwrap();
        assert_eq!(config.cooldown_secs, DEFAULT_COOLDOWN_SECS);
        assert!(config.token.is_none());
    }

    #[test]
    fn test_log_sink_counts() {
        let mut sink = LogSink::new();
        let notice = AlertNotice {
            timestamp: at(0),
            state: State::Alert,
            heart_rate: 120.0,
            skin_temp: 36.5,
            sweat_level: 0.0,
            events: vec!["ALERT triggered".to_string()],
            disclaimer: crate::DISCLAIMER_SHORT.to_string(),
            device_id: "test".to_string(),
        };
        assert!(sink.deliver(&notice).unwrap());
        assert_eq!(sink.delivered(), 1);
    }
}
