//! Per-channel deviation scoring against the current baseline.

use crate::core::baseline::Baseline;
use crate::ingest::types::{Channel, Reading};
use serde::{Deserialize, Serialize};

/// Relative deviation below which a channel counts as normal.
pub const MILD_THRESHOLD: f64 = 0.10;

/// Relative deviation at or above which a reading is an alert.
pub const STRONG_THRESHOLD: f64 = 0.25;

/// Direction of a channel's departure from baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviationStatus {
    Higher,
    Lower,
    Normal,
}

impl DeviationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviationStatus::Higher => "higher",
            DeviationStatus::Lower => "lower",
            DeviationStatus::Normal => "normal",
        }
    }
}

/// Deviation of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelDeviation {
    pub status: DeviationStatus,
    /// `|value - baseline| / baseline`, with a zero baseline treated as 1
    pub magnitude: f64,
}

/// Deviation of a whole reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviationResult {
    pub heart_rate: ChannelDeviation,
    pub skin_temp: ChannelDeviation,
    pub sweat_level: ChannelDeviation,
    pub max_magnitude: f64,
}

impl DeviationResult {
    pub fn channel(&self, channel: Channel) -> &ChannelDeviation {
        match channel {
            Channel::HeartRate => &self.heart_rate,
            Channel::SkinTemp => &self.skin_temp,
            Channel::SweatLevel => &self.sweat_level,
        }
    }

    /// Channel with the largest magnitude (first wins on ties).
    pub fn dominant_channel(&self) -> Channel {
        Channel::ALL
            .into_iter()
            .fold(Channel::HeartRate, |best, c| {
                if self.channel(c).magnitude > self.channel(best).magnitude {
                    c
                } else {
                    best
                }
            })
    }
}

/// Score one value with the default mild threshold.
pub fn score(value: f64, baseline_value: f64) -> ChannelDeviation {
    score_with_threshold(value, baseline_value, MILD_THRESHOLD)
}

/// Score one value; below `mild` the channel is `Normal`.
pub fn score_with_threshold(value: f64, baseline_value: f64, mild: f64) -> ChannelDeviation {
    let denominator = if baseline_value == 0.0 { 1.0 } else { baseline_value };
    let magnitude = (value - baseline_value).abs() / denominator;

    let status = if magnitude < mild {
        DeviationStatus::Normal
    } else if value > baseline_value {
        DeviationStatus::Higher
    } else {
        DeviationStatus::Lower
    };

    ChannelDeviation { status, magnitude }
}

/// Score every channel of `reading` independently.
pub fn score_reading(reading: &Reading, baseline: &Baseline, mild: f64) -> DeviationResult {
    let heart_rate = score_with_threshold(reading.heart_rate(), baseline.hr, mild);
    let skin_temp = score_with_threshold(reading.skin_temp(), baseline.temp, mild);
    let sweat_level = score_with_threshold(reading.sweat_level(), baseline.sweat, mild);

    let max_magnitude = heart_rate
        .magnitude
        .max(skin_temp.magnitude)
        .max(sweat_level.magnitude);

    DeviationResult {
        heart_rate,
        skin_temp,
        sweat_level,
        max_magnitude,
    }
}
