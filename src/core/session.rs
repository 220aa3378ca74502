//! Per-subject monitoring session.
//!
//! A [`MonitorSession`] owns every piece of mutable state the pipeline
//! needs: the baseline estimator, the previous classified reading and the
//! last accepted timestamp. Each call to [`MonitorSession::process`] runs a
//! reading to completion:
//!
//! 1. Reject out-of-order timestamps
//! 2. Feed the baseline learning window
//! 3. Score deviation against the current baseline
//! 4. Classify with hysteresis against the previous state
//! 5. Adapt the baseline (established baselines only)
//! 6. Detect events against the previous reading
//!
//! One session per monitored subject; never shared between subjects.

use crate::config::Config;
use crate::core::baseline::{Baseline, BaselineConfig, BaselineEstimator, BaselineStatus};
use crate::core::classifier::{classify, ClassifiedReading, State, Thresholds};
use crate::core::deviation::{score_reading, DeviationResult};
use crate::core::events::{detect_events, Event, EventRules};
use crate::ingest::types::{RawReading, Reading, ReadingError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Errors reported for a single reading. None of them are fatal to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorError {
    /// Missing or non-finite channel; nothing was mutated.
    InvalidReading(ReadingError),
    /// Timestamp not after the last accepted one; nothing was mutated.
    OutOfOrderReading {
        timestamp: DateTime<Utc>,
        last: DateTime<Utc>,
    },
}

impl std::fmt::Display for MonitorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorError::InvalidReading(e) => write!(f, "Invalid reading: {e}"),
            MonitorError::OutOfOrderReading { timestamp, last } => write!(
                f,
                "Out-of-order reading: {} is not after {}",
                timestamp.to_rfc3339(),
                last.to_rfc3339()
            ),
        }
    }
}

impl std::error::Error for MonitorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MonitorError::InvalidReading(e) => Some(e),
            MonitorError::OutOfOrderReading { .. } => None,
        }
    }
}

impl From<ReadingError> for MonitorError {
    fn from(e: ReadingError) -> Self {
        MonitorError::InvalidReading(e)
    }
}

/// Result of processing one reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionOutcome {
    pub classified: ClassifiedReading,
    pub events: Vec<Event>,
    pub deviation: DeviationResult,
    /// Estimator status after this reading was observed
    pub baseline_status: BaselineStatus,
}

impl SessionOutcome {
    /// True when this reading opened an ALERT.
    pub fn raised_alert(&self) -> bool {
        self.events
            .iter()
            .any(|e| e.event_type == crate::core::events::EventType::Alert)
    }
}

/// Baseline, classifier memory and event memory for one subject.
#[derive(Debug, Clone)]
pub struct MonitorSession {
    estimator: BaselineEstimator,
    thresholds: Thresholds,
    rules: EventRules,
    previous: Option<ClassifiedReading>,
    last_timestamp: Option<DateTime<Utc>>,
    accepted: u64,
}

impl MonitorSession {
    pub fn new(baseline: BaselineConfig, thresholds: Thresholds, rules: EventRules) -> Self {
        Self {
            estimator: BaselineEstimator::new(baseline),
            thresholds,
            rules,
            previous: None,
            last_timestamp: None,
            accepted: 0,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.baseline.clone(), config.thresholds, config.events)
    }

    /// Validate and process a raw sample.
    pub fn process_raw(&mut self, raw: RawReading) -> Result<SessionOutcome, MonitorError> {
        let reading = raw.into_reading().map_err(|e| {
            warn!(error = %e, "rejected invalid reading");
            MonitorError::InvalidReading(e)
        })?;
        self.process(reading)
    }

    /// Run one reading through the pipeline.
    pub fn process(&mut self, reading: Reading) -> Result<SessionOutcome, MonitorError> {
        let timestamp = reading.timestamp();
        if let Some(last) = self.last_timestamp {
            if timestamp <= last {
                warn!(
                    timestamp = %timestamp.to_rfc3339(),
                    last = %last.to_rfc3339(),
                    "rejected out-of-order reading"
                );
                return Err(MonitorError::OutOfOrderReading { timestamp, last });
            }
        }

        let established_before = self.estimator.is_established();
        let baseline_status = self.estimator.observe(&reading);
        let baseline = self.estimator.current();

        let deviation = score_reading(&reading, &baseline, self.thresholds.mild);
        let previous_state = self.previous.as_ref().map(|p| p.state);
        let state = classify(deviation.max_magnitude, previous_state, &self.thresholds);

        // The reading that completes the learning window is not an adaptation candidate.
        if established_before {
            self.estimator.adapt(&reading, state);
        }

        if previous_state.is_some_and(|p| p != state) {
            info!(
                from = %previous_state.unwrap_or(State::Normal),
                to = %state,
                max_magnitude = deviation.max_magnitude,
                "state transition"
            );
        }

        let classified = ClassifiedReading {
            reading,
            state,
            baseline,
            provisional: !baseline_status.is_ready(),
        };
        let events = detect_events(&classified, self.previous.as_ref(), &self.rules);
        debug!(state = %state, events = events.len(), "reading classified");

        self.previous = Some(classified.clone());
        self.last_timestamp = Some(timestamp);
        self.accepted += 1;

        Ok(SessionOutcome {
            classified,
            events,
            deviation,
            baseline_status,
        })
    }

    /// Discard baseline and history; the next reading starts a fresh session.
    pub fn reset(&mut self) {
        info!(accepted = self.accepted, "session reset");
        self.estimator.reset();
        self.previous = None;
        self.last_timestamp = None;
        self.accepted = 0;
    }

    pub fn baseline_status(&self) -> BaselineStatus {
        self.estimator.status()
    }

    /// Baseline the next reading would be scored against.
    pub fn current_baseline(&self) -> Baseline {
        self.estimator.current()
    }

    /// State of the last accepted reading, NORMAL before any.
    pub fn current_state(&self) -> State {
        self.previous.as_ref().map_or(State::Normal, |p| p.state)
    }

    pub fn previous(&self) -> Option<&ClassifiedReading> {
        self.previous.as_ref()
    }

    /// Readings accepted since the session started or was reset.
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Consecutive NORMAL readings counted towards adaptation.
    pub fn normal_streak(&self) -> u32 {
        self.estimator.normal_streak()
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }
}

impl Default for MonitorSession {
    fn default() -> Self {
        Self::new(
            BaselineConfig::default(),
            Thresholds::default(),
            EventRules::default(),
        )
    }
}
