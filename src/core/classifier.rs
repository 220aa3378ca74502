//! Four-state health classifier with one-step hysteresis out of ALERT.
//!
//! ```text
//! from \ max_magnitude   < mild      mild..strong   >= strong
//! NORMAL                 NORMAL      SHIFT          ALERT
//! SHIFT                  NORMAL      SHIFT          ALERT
//! ALERT                  RECOVERY    SHIFT          ALERT
//! RECOVERY               NORMAL      SHIFT          ALERT
//! ```

use crate::core::baseline::Baseline;
use crate::core::deviation::{MILD_THRESHOLD, STRONG_THRESHOLD};
use crate::ingest::types::{Channel, Reading};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health state of a single reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    Normal,
    Shift,
    Alert,
    /// First sub-threshold reading after an ALERT.
    Recovery,
}

impl State {
    pub const ALL: [State; 4] = [State::Normal, State::Shift, State::Alert, State::Recovery];

    pub fn as_str(&self) -> &'static str {
        match self {
            State::Normal => "NORMAL",
            State::Shift => "SHIFT",
            State::Alert => "ALERT",
            State::Recovery => "RECOVERY",
        }
    }

    /// Stage code shown on dashboards (0-3).
    pub fn code(&self) -> u8 {
        match self {
            State::Normal => 0,
            State::Shift => 1,
            State::Alert => 2,
            State::Recovery => 3,
        }
    }

    pub fn meaning(&self) -> &'static str {
        match self {
            State::Normal => "Stable physiology",
            State::Shift => "Early stress response",
            State::Alert => "Strong deviation from personal baseline",
            State::Recovery => "Return toward baseline",
        }
    }

    /// Severity rank; `None` for RECOVERY, which is a marker rather than a level.
    pub fn severity(&self) -> Option<u8> {
        match self {
            State::Normal => Some(0),
            State::Shift => Some(1),
            State::Alert => Some(2),
            State::Recovery => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_uppercase().as_str() {
            "NORMAL" => Some(State::Normal),
            "SHIFT" => Some(State::Shift),
            "ALERT" => Some(State::Alert),
            "RECOVERY" => Some(State::Recovery),
            _ => None,
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Magnitude cut-offs for classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// At or above: SHIFT
    pub mild: f64,
    /// At or above: ALERT
    pub strong: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            mild: MILD_THRESHOLD,
            strong: STRONG_THRESHOLD,
        }
    }
}

/// State implied by magnitude alone.
pub fn tentative_state(max_magnitude: f64, thresholds: &Thresholds) -> State {
    if max_magnitude >= thresholds.strong {
        State::Alert
    } else if max_magnitude >= thresholds.mild {
        State::Shift
    } else {
        State::Normal
    }
}

/// Classify a reading given the state of the reading before it.
///
/// RECOVERY is re-derived every time, so it lasts exactly one reading.
pub fn classify(max_magnitude: f64, previous: Option<State>, thresholds: &Thresholds) -> State {
    match tentative_state(max_magnitude, thresholds) {
        State::Normal if previous == Some(State::Alert) => State::Recovery,
        state => state,
    }
}

/// A reading with its resolved state and the baseline it was scored against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedReading {
    #[serde(flatten)]
    pub reading: Reading,
    pub state: State,
    pub baseline: Baseline,
    /// True while the baseline was still being learned
    pub provisional: bool,
}

impl ClassifiedReading {
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.reading.timestamp()
    }

    /// Chart point for one channel.
    pub fn data_point(&self, channel: Channel) -> DataPoint {
        DataPoint {
            time: self.reading.timestamp(),
            value: self.reading.value(channel),
            baseline: self.baseline.value(channel),
        }
    }
}

/// One point of a per-channel trend line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub time: DateTime<Utc>,
    pub value: f64,
    pub baseline: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(magnitudes: &[f64]) -> Vec<State> {
        let thresholds = Thresholds::default();
        let mut previous = None;
        magnitudes
            .iter()
            .map(|&m| {
                let state = classify(m, previous, &thresholds);
                previous = Some(state);
                state
            })
            .collect()
    }

    #[test]
    fn test_threshold_boundaries() {
        let t = Thresholds::default();
        assert_eq!(tentative_state(0.09, &t), State::Normal);
        assert_eq!(tentative_state(0.10, &t), State::Shift);
        assert_eq!(tentative_state(0.24, &t), State::Shift);
        assert_eq!(tentative_state(0.25, &t), State::Alert);
    }

    #[test]
    fn test_recovery_after_alert() {
        assert_eq!(
            run(&[0.30, 0.30, 0.05, 0.05]),
            vec![State::Alert, State::Alert, State::Recovery, State::Normal]
        );
    }

    #[test]
    fn test_recovery_is_not_sticky() {
        assert_eq!(
            run(&[0.30, 0.05, 0.05, 0.05]),
            vec![State::Alert, State::Recovery, State::Normal, State::Normal]
        );
    }

    #[test]
    fn test_transition_table() {
        let t = Thresholds::default();
        let cases = [
            (State::Normal, [State::Normal, State::Shift, State::Alert]),
            (State::Shift, [State::Normal, State::Shift, State::Alert]),
            (State::Alert, [State::Recovery, State::Shift, State::Alert]),
            (State::Recovery, [State::Normal, State::Shift, State::Alert]),
        ];
        for (from, expected) in cases {
            for (m, want) in [0.05, 0.15, 0.30].into_iter().zip(expected) {
                assert_eq!(classify(m, Some(from), &t), want, "from {from} at {m}");
            }
        }
        assert_eq!(classify(0.05, None, &t), State::Normal);
    }

    #[test]
    fn test_state_metadata() {
        assert_eq!(State::Alert.code(), 2);
        assert_eq!(State::from_name("recovery"), Some(State::Recovery));
        assert_eq!(State::Recovery.severity(), None);
        assert!(State::Shift.severity() < State::Alert.severity());
        assert_eq!(
            serde_json::to_string(&State::Recovery).unwrap(),
            "\"RECOVERY\""
        );
    }
}
