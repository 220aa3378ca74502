//! Reading ingress for the vitals agent.
//!
//! The monitor itself never touches I/O. This module turns text lines and
//! simulated vitals into [`RawReading`]s and hands them over on a channel.

pub mod simulator;
pub mod source;
pub mod types;

// Re-export commonly used types
pub use simulator::VitalsSimulator;
pub use source::{InputFormat, ReadingSource, SourceError, SourceItem};
pub use types::{parse_timestamp, Channel, RawReading, Reading, ReadingError, SweatBand};
