//! Synheart Vitals Agent - personal-baseline vitals monitor for research.
//!
//! This library turns a stream of heart rate, skin temperature and sweat
//! readings into explainable health states. Each subject is compared against
//! their own learned baseline rather than population norms.
//!
//! # Outputs are not diagnoses
//!
//! - **Personal baseline**: deviations are relative to the subject's own resting values
//! - **Explainable**: every state change is recorded as a human-readable event
//! - **Local**: readings are processed in-process; nothing leaves the host unless
//!   a webhook is configured
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Synheart Vitals Agent                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Ingest    │──▶│  Baseline   │──▶│  Deviation  │       │
//! │  │ (CSV/JSONL) │   │ (learn/EMA) │   │  (scoring)  │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                                             │               │
//! │                                             ▼               │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Explain   │◀──│   Events    │◀──│ Classifier  │       │
//! │  │ (log/stats) │   │ (detector)  │   │(hysteresis) │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use chrono::{Duration, TimeZone, Utc};
//! use synheart_vitals_agent::{MonitorSession, Reading, State};
//!
//! let mut session = MonitorSession::default();
//! let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
//!
//! for i in 0..15 {
//!     let reading = Reading::new(start + Duration::seconds(i), 70.0, 36.5, 0.0).unwrap();
//!     session.process(reading).unwrap();
//! }
//!
//! let spike = Reading::new(start + Duration::seconds(15), 100.0, 36.5, 0.0).unwrap();
//! let outcome = session.process(spike).unwrap();
//! assert_eq!(outcome.classified.state, State::Alert);
//! ```

pub mod config;
pub mod core;
pub mod explain;
pub mod ingest;
pub mod notify;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use core::{
    Baseline, BaselineConfig, BaselineStatus, ClassifiedReading, Event, EventRules, EventType,
    MonitorError, MonitorSession, ReportBuilder, SessionOutcome, SessionReport, State, Thresholds,
};
pub use explain::{EventLog, MonitorStats, SharedMonitorStats, StatsSnapshot};
pub use ingest::{
    Channel, InputFormat, RawReading, Reading, ReadingError, ReadingSource, VitalsSimulator,
};
pub use notify::{AlertNotice, AlertSink, LogSink, NotifyConfig, NotifyError};

#[cfg(feature = "notify")]
pub use notify::{BlockingWebhookNotifier, WebhookNotifier};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// One-line disclaimer attached to every export and notice.
pub const DISCLAIMER_SHORT: &str =
    "Research monitoring output relative to a personal baseline; not a medical diagnosis.";

/// Disclaimer that can be displayed to users.
pub const DISCLAIMER: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║            SYNHEART VITALS AGENT - HEALTH DISCLAIMER             ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This agent compares your vitals against your own baseline.      ║
║                                                                  ║
║  ✓ WHAT IT DOES:                                                 ║
║    • Learns your resting heart rate, temperature and sweat       ║
║    • Flags readings that drift away from that baseline           ║
║    • Explains every state change as a timestamped event          ║
║                                                                  ║
║  ✗ WHAT IT IS NOT:                                               ║
║    • A medical device                                            ║
║    • A diagnosis of any condition                                ║
║    • A substitute for professional care                          ║
║                                                                  ║
║  States (NORMAL, SHIFT, ALERT, RECOVERY) describe deviation      ║
║  from a learned personal baseline and nothing more.              ║
║                                                                  ║
║  You can view monitoring statistics anytime with:                ║
║    synheart-vitals status                                        ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
