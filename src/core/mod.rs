//! Core functionality for the vitals agent.
//!
//! This module contains:
//! - Baseline learning and adaptation
//! - Per-channel deviation scoring
//! - State classification with hysteresis
//! - Event detection between consecutive readings
//! - The per-subject session that ties them together
//! - Session report export

pub mod baseline;
pub mod classifier;
pub mod deviation;
pub mod events;
pub mod report;
pub mod session;

// Re-export commonly used types
pub use baseline::{Baseline, BaselineConfig, BaselineEstimator, BaselineStatus};
pub use classifier::{classify, tentative_state, ClassifiedReading, DataPoint, State, Thresholds};
pub use deviation::{
    score, score_reading, ChannelDeviation, DeviationResult, DeviationStatus, MILD_THRESHOLD,
    STRONG_THRESHOLD,
};
pub use events::{detect_events, Event, EventRules, EventType};
pub use report::{
    ReportBuilder, RunRecorder, SessionReport, StateCounts, DEFAULT_REPORT_HISTORY, PRODUCER_NAME,
    REPORT_VERSION,
};
pub use session::{MonitorError, MonitorSession, SessionOutcome};
