//! Explainability module for the vitals agent.
//!
//! Keeps the human-readable side of a run: a bounded timeline of events and
//! counters of what was classified, rejected and raised.

pub mod stats;
pub mod timeline;

// Re-export commonly used types
pub use stats::{
    create_shared_stats, create_shared_stats_with_persistence, MonitorStats, SharedMonitorStats,
    StatsSnapshot,
};
pub use timeline::{EventLog, DEFAULT_CAPACITY};
