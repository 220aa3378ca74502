//! Explainable events derived from consecutive classified readings.
//!
//! Detection is a pure function of `(current, previous)`; calling it twice
//! with the same pair yields the same events, identifiers included.

use crate::core::classifier::{ClassifiedReading, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    StateChange,
    SweatSpike,
    HrDeviation,
    Alert,
    Recovery,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::StateChange => "state_change",
            EventType::SweatSpike => "sweat_spike",
            EventType::HrDeviation => "hr_deviation",
            EventType::Alert => "alert",
            EventType::Recovery => "recovery",
        }
    }

    /// Prefix of event identifiers.
    fn id_prefix(&self) -> &'static str {
        match self {
            EventType::StateChange => "state",
            EventType::SweatSpike => "sweat",
            EventType::HrDeviation => "hr",
            EventType::Alert => "alert",
            EventType::Recovery => "recovery",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notable transition, immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// `{prefix}-{timestamp_millis}`, unique per type and reading
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub message: String,
}

impl Event {
    pub fn new(event_type: EventType, timestamp: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            id: format!("{}-{}", event_type.id_prefix(), timestamp.timestamp_millis()),
            timestamp,
            event_type,
            message: message.into(),
        }
    }
}

/// Trigger levels for the vitals-based rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventRules {
    /// Absolute sweat increase between readings that counts as a spike
    pub sweat_spike_delta: f64,
    /// Heart-rate distance from baseline (bpm) that counts as a deviation
    pub hr_deviation_bpm: f64,
}

impl Default for EventRules {
    fn default() -> Self {
        Self {
            sweat_spike_delta: 100.0,
            hr_deviation_bpm: 20.0,
        }
    }
}

fn hr_distance(reading: &ClassifiedReading) -> f64 {
    (reading.reading.heart_rate() - reading.baseline.hr).abs()
}

/// Compare `current` against the reading before it.
///
/// Rules fire independently and are returned in this order: state change,
/// sweat spike, heart-rate deviation onset, alert, recovery. The first
/// reading of a session (no `previous`) produces nothing.
pub fn detect_events(
    current: &ClassifiedReading,
    previous: Option<&ClassifiedReading>,
    rules: &EventRules,
) -> Vec<Event> {
    let Some(previous) = previous else {
        return Vec::new();
    };

    let ts = current.timestamp();
    let mut events = Vec::new();

    if current.state != previous.state {
        events.push(Event::new(
            EventType::StateChange,
            ts,
            format!("Health state changed to {}", current.state),
        ));
    }

    let sweat_increase = current.reading.sweat_level() - previous.reading.sweat_level();
    if sweat_increase > rules.sweat_spike_delta {
        events.push(Event::new(
            EventType::SweatSpike,
            ts,
            format!("Sweat spike detected (+{sweat_increase:.0})"),
        ));
    }

    let hr_now = hr_distance(current);
    if hr_now > rules.hr_deviation_bpm && hr_distance(previous) <= rules.hr_deviation_bpm {
        events.push(Event::new(
            EventType::HrDeviation,
            ts,
            format!("Heart rate deviation detected ({hr_now:.0} BPM from baseline)"),
        ));
    }

    if current.state == State::Alert && previous.state != State::Alert {
        events.push(Event::new(
            EventType::Alert,
            ts,
            "ALERT triggered - vitals strongly deviate from personal baseline",
        ));
    }

    if current.state == State::Recovery && previous.state != State::Recovery {
        events.push(Event::new(
            EventType::Recovery,
            ts,
            "Recovery started - vitals returning to baseline",
        ));
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::baseline::Baseline;
    use crate::ingest::types::Reading;
    use chrono::{Duration, TimeZone};

    fn classified(i: i64, hr: f64, sweat: f64, state: State) -> ClassifiedReading {
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(i);
        ClassifiedReading {
            reading: Reading::new(ts, hr, 36.5, sweat).unwrap(),
            state,
            baseline: Baseline::new(70.0, 36.5, 0.0),
            provisional: false,
        }
    }

    fn types(events: &[Event]) -> Vec<EventType> {
        events.iter().map(|e| e.event_type).collect()
    }

    #[test]
    fn test_no_previous_no_events() {
        let cur = classified(0, 120.0, 500.0, State::Alert);
        assert!(detect_events(&cur, None, &EventRules::default()).is_empty());
    }

    #[test]
    fn test_alert_onset_order() {
        let prev = classified(0, 72.0, 0.0, State::Normal);
        let cur = classified(1, 95.0, 150.0, State::Alert);
        let events = detect_events(&cur, Some(&prev), &EventRules::default());

        assert_eq!(
            types(&events),
            vec![
                EventType::StateChange,
                EventType::SweatSpike,
                EventType::HrDeviation,
                EventType::Alert
            ]
        );
        assert_eq!(events[0].message, "Health state changed to ALERT");
        assert_eq!(events[1].message, "Sweat spike detected (+150)");
        assert_eq!(
            events[2].message,
            "Heart rate deviation detected (25 BPM from baseline)"
        );
        assert_eq!(events[0].id, format!("state-{}", cur.timestamp().timestamp_millis()));
    }

    #[test]
    fn test_detection_is_idempotent() {
        let prev = classified(0, 72.0, 0.0, State::Normal);
        let cur = classified(1, 95.0, 150.0, State::Alert);
        let rules = EventRules::default();
        assert_eq!(
            detect_events(&cur, Some(&prev), &rules),
            detect_events(&cur, Some(&prev), &rules)
        );
    }

    #[test]
    fn test_hr_deviation_is_edge_triggered() {
        let rules = EventRules::default();
        let a = classified(0, 70.0, 0.0, State::Normal);
        let b = classified(1, 95.0, 0.0, State::Shift);
        let c = classified(2, 95.0, 0.0, State::Shift);

        assert!(types(&detect_events(&b, Some(&a), &rules)).contains(&EventType::HrDeviation));
        assert!(!types(&detect_events(&c, Some(&b), &rules)).contains(&EventType::HrDeviation));
    }

    #[test]
    fn test_hr_deviation_threshold_is_exclusive() {
        let rules = EventRules::default();
        let a = classified(0, 70.0, 0.0, State::Normal);
        let b = classified(1, 90.0, 0.0, State::Normal);
        assert!(detect_events(&b, Some(&a), &rules).is_empty());
    }

    #[test]
    fn test_sweat_spike_needs_strict_increase() {
        let rules = EventRules::default();
        let a = classified(0, 70.0, 100.0, State::Normal);
        let b = classified(1, 70.0, 200.0, State::Normal);
        let c = classified(2, 70.0, 300.5, State::Normal);

        assert!(detect_events(&b, Some(&a), &rules).is_empty());
        assert_eq!(
            types(&detect_events(&c, Some(&b), &rules)),
            vec![EventType::SweatSpike]
        );
    }

    #[test]
    fn test_recovery_events() {
        let rules = EventRules::default();
        let alert = classified(0, 95.0, 0.0, State::Alert);
        let recovery = classified(1, 71.0, 0.0, State::Recovery);
        let events = detect_events(&recovery, Some(&alert), &rules);

        assert_eq!(
            types(&events),
            vec![EventType::StateChange, EventType::Recovery]
        );
        assert_eq!(events[1].id, format!("recovery-{}", recovery.timestamp().timestamp_millis()));
    }

    #[test]
    fn test_event_serializes_type_field() {
        let event = Event::new(EventType::SweatSpike, Utc::now(), "x");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "sweat_spike");
    }
}
