//! Session report export.
//!
//! A report bundles everything a monitoring run produced into one JSON
//! document: the classified readings, the events, the baseline the session
//! ended with and a per-state tally. The core never writes it anywhere; the
//! host decides where reports go.

use crate::core::baseline::Baseline;
use crate::core::classifier::{ClassifiedReading, State};
use crate::core::events::{Event, EventType};
use crate::core::session::SessionOutcome;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

/// The current report format version.
pub const REPORT_VERSION: &str = "1.0";

/// The name of this producer.
pub const PRODUCER_NAME: &str = "synheart-vitals-agent";

/// Producer metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ReportProducer {
    /// Name of the producing software
    pub name: String,
    /// Version of the producing software
    pub version: String,
    /// Unique instance identifier (UUID)
    pub instance_id: String,
    /// Host the agent ran on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

/// Number of readings per state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    pub normal: u64,
    pub shift: u64,
    pub alert: u64,
    pub recovery: u64,
}

impl StateCounts {
    pub fn record(&mut self, state: State) {
        match state {
            State::Normal => self.normal += 1,
            State::Shift => self.shift += 1,
            State::Alert => self.alert += 1,
            State::Recovery => self.recovery += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.normal + self.shift + self.alert + self.recovery
    }
}

/// Exported record of one monitoring run.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub report_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// First reading time (RFC3339)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    /// Last reading time (RFC3339)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    /// When this report was computed (RFC3339)
    pub computed_at_utc: String,
    pub producer: ReportProducer,
    /// Baseline in effect at the end of the run, if one was established
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_baseline: Option<Baseline>,
    pub state_counts: StateCounts,
    pub readings: Vec<ClassifiedReading>,
    pub events: Vec<Event>,
    pub disclaimer: String,
    pub meta: HashMap<String, serde_json::Value>,
}

/// Default number of readings and events kept for export.
pub const DEFAULT_REPORT_HISTORY: usize = 1_000;

/// Running tally of a monitoring run.
///
/// Totals cover every recorded reading; only the most recent `capacity`
/// readings and events are kept for export.
#[derive(Debug, Clone)]
pub struct RunRecorder {
    capacity: usize,
    readings: VecDeque<ClassifiedReading>,
    events: VecDeque<Event>,
    state_counts: StateCounts,
    reading_count: u64,
    event_count: u64,
    alert_count: u64,
    provisional_count: u64,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl RunRecorder {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            readings: VecDeque::new(),
            events: VecDeque::new(),
            state_counts: StateCounts::default(),
            reading_count: 0,
            event_count: 0,
            alert_count: 0,
            provisional_count: 0,
            started_at: None,
            ended_at: None,
        }
    }

    /// Record a processed reading and its events.
    pub fn record(&mut self, outcome: &SessionOutcome) {
        self.record_reading(&outcome.classified);
        self.record_events(&outcome.events);
    }

    pub fn record_reading(&mut self, reading: &ClassifiedReading) {
        let ts = reading.timestamp();
        self.started_at.get_or_insert(ts);
        self.ended_at = Some(ts);
        self.state_counts.record(reading.state);
        self.reading_count += 1;
        if reading.provisional {
            self.provisional_count += 1;
        }
        push_bounded(&mut self.readings, reading.clone(), self.capacity);
    }

    pub fn record_events(&mut self, events: &[Event]) {
        for event in events {
            self.event_count += 1;
            if event.event_type == EventType::Alert {
                self.alert_count += 1;
            }
            push_bounded(&mut self.events, event.clone(), self.capacity);
        }
    }

    /// Readings recorded since the run started, retained or not.
    pub fn reading_count(&self) -> u64 {
        self.reading_count
    }

    /// Retained readings, oldest first.
    pub fn readings(&self) -> impl Iterator<Item = &ClassifiedReading> {
        self.readings.iter()
    }

    pub fn retained_readings(&self) -> usize {
        self.readings.len()
    }

    pub fn state_counts(&self) -> &StateCounts {
        &self.state_counts
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RunRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_HISTORY)
    }
}

fn push_bounded<T>(buffer: &mut VecDeque<T>, item: T, capacity: usize) {
    if capacity == 0 {
        return;
    }
    if buffer.len() == capacity {
        buffer.pop_front();
    }
    buffer.push_back(item);
}

/// Builder for session reports.
pub struct ReportBuilder {
    instance_id: Uuid,
    session_id: Option<String>,
    host: Option<String>,
}

impl ReportBuilder {
    /// Create a new builder with a unique instance ID.
    pub fn new() -> Self {
        let host = hostname::get()
            .ok()
            .map(|h| h.to_string_lossy().to_string());
        Self {
            instance_id: Uuid::new_v4(),
            session_id: None,
            host,
        }
    }

    /// Set the session ID for generated reports.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Build a report from a complete run's readings (oldest first) and events.
    pub fn build(
        &self,
        readings: &[ClassifiedReading],
        events: &[Event],
        final_baseline: Option<Baseline>,
    ) -> SessionReport {
        let mut recorder = RunRecorder::new(readings.len().max(events.len()));
        for r in readings {
            recorder.record_reading(r);
        }
        recorder.record_events(events);
        self.build_from(&recorder, final_baseline)
    }

    /// Build a report from a recorder's totals and retained history.
    pub fn build_from(&self, run: &RunRecorder, final_baseline: Option<Baseline>) -> SessionReport {
        let mut meta = HashMap::new();
        meta.insert("reading_count".to_string(), serde_json::json!(run.reading_count));
        meta.insert("event_count".to_string(), serde_json::json!(run.event_count));
        meta.insert("alert_count".to_string(), serde_json::json!(run.alert_count));
        meta.insert(
            "provisional_readings".to_string(),
            serde_json::json!(run.provisional_count),
        );
        meta.insert(
            "readings_retained".to_string(),
            serde_json::json!(run.readings.len()),
        );

        SessionReport {
            report_version: REPORT_VERSION.to_string(),
            session_id: self.session_id.clone(),
            started_at: run.started_at.map(|t| t.to_rfc3339()),
            ended_at: run.ended_at.map(|t| t.to_rfc3339()),
            computed_at_utc: Utc::now().to_rfc3339(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                instance_id: self.instance_id.to_string(),
                host: self.host.clone(),
            },
            final_baseline,
            state_counts: run.state_counts.clone(),
            readings: run.readings.iter().cloned().collect(),
            events: run.events.iter().cloned().collect(),
            disclaimer: crate::DISCLAIMER_SHORT.to_string(),
            meta,
        }
    }

    /// Build and serialize a report to JSON.
    pub fn build_json(
        &self,
        readings: &[ClassifiedReading],
        events: &[Event],
        final_baseline: Option<Baseline>,
    ) -> String {
        let report = self.build(readings, events, final_baseline);
        serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}
