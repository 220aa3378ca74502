//! Running statistics for a monitoring run.
//!
//! Counts what the monitor accepted, rejected and raised, so a user can see
//! at a glance how much of the input stream was actually classified.

use crate::core::events::EventType;
use crate::core::session::{MonitorError, SessionOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for the current run.
#[derive(Debug)]
pub struct MonitorStats {
    /// Readings classified
    readings_processed: AtomicU64,
    /// Readings rejected as invalid
    readings_rejected: AtomicU64,
    /// Readings rejected for timestamp regression
    out_of_order: AtomicU64,
    /// Events emitted
    events_emitted: AtomicU64,
    /// ALERT onsets
    alerts_raised: AtomicU64,
    /// Run start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl MonitorStats {
    pub fn new() -> Self {
        Self {
            readings_processed: AtomicU64::new(0),
            readings_rejected: AtomicU64::new(0),
            out_of_order: AtomicU64::new(0),
            events_emitted: AtomicU64::new(0),
            alerts_raised: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create stats that resume from, and save back to, `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            tracing::warn!("Could not load previous monitor stats: {e}");
        }

        stats
    }

    /// Record a processed reading and its events.
    pub fn record_outcome(&self, outcome: &SessionOutcome) {
        self.readings_processed.fetch_add(1, Ordering::Relaxed);
        self.events_emitted
            .fetch_add(outcome.events.len() as u64, Ordering::Relaxed);
        let alerts = outcome
            .events
            .iter()
            .filter(|e| e.event_type == EventType::Alert)
            .count();
        self.alerts_raised.fetch_add(alerts as u64, Ordering::Relaxed);
    }

    /// Record a reading the session refused.
    pub fn record_error(&self, error: &MonitorError) {
        match error {
            MonitorError::InvalidReading(_) => {
                self.readings_rejected.fetch_add(1, Ordering::Relaxed);
            }
            MonitorError::OutOfOrderReading { .. } => {
                self.out_of_order.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Record input that could not even be parsed into a sample.
    pub fn record_unparseable(&self) {
        self.readings_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            readings_processed: self.readings_processed.load(Ordering::Relaxed),
            readings_rejected: self.readings_rejected.load(Ordering::Relaxed),
            out_of_order: self.out_of_order.load(Ordering::Relaxed),
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
            alerts_raised: self.alerts_raised.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Monitor Statistics:\n\
             - Readings classified: {}\n\
             - Readings rejected (invalid): {}\n\
             - Readings rejected (out of order): {}\n\
             - Events emitted: {}\n\
             - Alerts raised: {}\n\
             - Run duration: {} seconds\n\
             \n\
             {}",
            stats.readings_processed,
            stats.readings_rejected,
            stats.out_of_order,
            stats.events_emitted,
            stats.alerts_raised,
            stats.session_duration_secs,
            crate::DISCLAIMER_SHORT
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                readings_processed: stats.readings_processed,
                readings_rejected: stats.readings_rejected,
                out_of_order: stats.out_of_order,
                events_emitted: stats.events_emitted,
                alerts_raised: stats.alerts_raised,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.readings_processed
                    .store(persisted.readings_processed, Ordering::Relaxed);
                self.readings_rejected
                    .store(persisted.readings_rejected, Ordering::Relaxed);
                self.out_of_order
                    .store(persisted.out_of_order, Ordering::Relaxed);
                self.events_emitted
                    .store(persisted.events_emitted, Ordering::Relaxed);
                self.alerts_raised
                    .store(persisted.alerts_raised, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.readings_processed.store(0, Ordering::Relaxed);
        self.readings_rejected.store(0, Ordering::Relaxed);
        self.out_of_order.store(0, Ordering::Relaxed);
        self.events_emitted.store(0, Ordering::Relaxed);
        self.alerts_raised.store(0, Ordering::Relaxed);
    }
}

impl Default for MonitorStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub readings_processed: u64,
    pub readings_rejected: u64,
    pub out_of_order: u64,
    pub events_emitted: u64,
    pub alerts_raised: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    readings_processed: u64,
    readings_rejected: u64,
    out_of_order: u64,
    events_emitted: u64,
    alerts_raised: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared stats.
pub type SharedMonitorStats = Arc<MonitorStats>;

pub fn create_shared_stats() -> SharedMonitorStats {
    Arc::new(MonitorStats::new())
}

pub fn create_shared_stats_with_persistence(path: PathBuf) -> SharedMonitorStats {
    Arc::new(MonitorStats::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::MonitorSession;
    use crate::ingest::types::{RawReading, Reading};
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_outcome_and_error_counting() {
        let stats = MonitorStats::new();
        let mut session = MonitorSession::default();
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        for (i, hr) in [70.0, 70.0, 200.0].into_iter().enumerate() {
            let r = Reading::new(start + Duration::seconds(i as i64), hr, 36.5, 0.0).unwrap();
            stats.record_outcome(&session.process(r).unwrap());
        }
        let late = Reading::new(start, 70.0, 36.5, 0.0).unwrap();
        stats.record_error(&session.process(late).unwrap_err());
        stats.record_error(&session.process_raw(RawReading::default()).unwrap_err());
        stats.record_unparseable();

        let s = stats.stats();
        assert_eq!(s.readings_processed, 3);
        assert_eq!(s.out_of_order, 1);
        assert_eq!(s.readings_rejected, 2);
        assert_eq!(s.alerts_raised, 1);
        assert!(s.events_emitted >= 2);
    }

    #[test]
    fn test_reset() {
        let stats = MonitorStats::new();
        stats.record_unparseable();
        stats.reset();
        assert_eq!(stats.stats().readings_rejected, 0);
    }

    #[test]
    fn test_persistence_round_trip() {
        let path = std::env::temp_dir()
            .join(format!("synheart-vitals-stats-{}", uuid::Uuid::new_v4()))
            .join("stats.json");

        let stats = MonitorStats::with_persistence(path.clone());
        stats.record_unparseable();
        stats.save().unwrap();

        let reloaded = MonitorStats::with_persistence(path.clone());
        assert_eq!(reloaded.stats().readings_rejected, 1);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_summary_format() {
        let summary = MonitorStats::new().summary();
        assert!(summary.contains("Readings classified"));
        assert!(summary.contains("Alerts raised"));
        assert!(summary.contains("not a medical diagnosis"));
    }
}
