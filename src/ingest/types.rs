//! Reading types accepted by the monitor.
//!
//! A [`RawReading`] is whatever the ingress delivered: any channel may be
//! missing or garbage. A [`Reading`] is the validated form that the core
//! pipeline consumes; every channel is finite and it cannot be mutated once
//! built.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// The three physiological channels carried by every reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    HeartRate,
    SkinTemp,
    SweatLevel,
}

impl Channel {
    /// All channels in scoring order.
    pub const ALL: [Channel; 3] = [Channel::HeartRate, Channel::SkinTemp, Channel::SweatLevel];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::HeartRate => "heart_rate",
            Channel::SkinTemp => "skin_temp",
            Channel::SweatLevel => "sweat_level",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a raw sample could not become a [`Reading`].
#[derive(Debug, Clone, PartialEq)]
pub enum ReadingError {
    /// The sample has no timestamp.
    MissingTimestamp,
    /// A channel is absent or could not be parsed.
    Missing(Channel),
    /// A channel is NaN or infinite.
    NonFinite(Channel),
    /// Heart rate or sweat level below zero.
    Negative(Channel),
    /// The line itself is not a reading (wrong field count, bad timestamp).
    Malformed(String),
}

impl std::fmt::Display for ReadingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadingError::MissingTimestamp => write!(f, "missing timestamp"),
            ReadingError::Missing(c) => write!(f, "missing {c}"),
            ReadingError::NonFinite(c) => write!(f, "{c} is not a finite number"),
            ReadingError::Negative(c) => write!(f, "{c} must not be negative"),
            ReadingError::Malformed(e) => write!(f, "malformed reading: {e}"),
        }
    }
}

impl std::error::Error for ReadingError {}

/// A validated sample. All channels are finite; heart rate and sweat level
/// are non-negative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    timestamp: DateTime<Utc>,
    heart_rate: f64,
    skin_temp: f64,
    sweat_level: f64,
}

impl Reading {
    pub fn new(
        timestamp: DateTime<Utc>,
        heart_rate: f64,
        skin_temp: f64,
        sweat_level: f64,
    ) -> Result<Self, ReadingError> {
        check_channel(Channel::HeartRate, heart_rate, false)?;
        check_channel(Channel::SkinTemp, skin_temp, true)?;
        check_channel(Channel::SweatLevel, sweat_level, false)?;

        Ok(Self {
            timestamp,
            heart_rate,
            skin_temp,
            sweat_level,
        })
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Beats per minute.
    pub fn heart_rate(&self) -> f64 {
        self.heart_rate
    }

    /// Degrees Celsius.
    pub fn skin_temp(&self) -> f64 {
        self.skin_temp
    }

    /// Unitless conductance proxy.
    pub fn sweat_level(&self) -> f64 {
        self.sweat_level
    }

    pub fn value(&self, channel: Channel) -> f64 {
        match channel {
            Channel::HeartRate => self.heart_rate,
            Channel::SkinTemp => self.skin_temp,
            Channel::SweatLevel => self.sweat_level,
        }
    }
}

fn check_channel(channel: Channel, value: f64, allow_negative: bool) -> Result<(), ReadingError> {
    if !value.is_finite() {
        return Err(ReadingError::NonFinite(channel));
    }
    if !allow_negative && value < 0.0 {
        return Err(ReadingError::Negative(channel));
    }
    Ok(())
}

/// A sample as delivered by ingress, before validation.
///
/// Deserializes from JSON objects where `timestamp` (alias `time`) is either
/// epoch milliseconds or an RFC 3339 string, and any channel may be `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    #[serde(default, alias = "time", with = "timestamp_serde")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub heart_rate: Option<f64>,
    #[serde(default)]
    pub skin_temp: Option<f64>,
    #[serde(default)]
    pub sweat_level: Option<f64>,
}

impl RawReading {
    pub fn new(timestamp: DateTime<Utc>, heart_rate: f64, skin_temp: f64, sweat_level: f64) -> Self {
        Self {
            timestamp: Some(timestamp),
            heart_rate: Some(heart_rate),
            skin_temp: Some(skin_temp),
            sweat_level: Some(sweat_level),
        }
    }

    /// Parse one CSV row.
    ///
    /// Accepts `time,heart_rate,skin_temp,sweat_level` optionally followed by
    /// the four upstream label columns `baseline_hr,baseline_temp,baseline_sweat,state`,
    /// which are ignored: the baseline is always learned locally.
    /// Unparseable channel cells come back as `None` and fail validation later.
    pub fn from_csv_line(line: &str) -> Result<Self, ReadingError> {
        let parts: Vec<&str> = line.trim().split(',').map(str::trim).collect();
        if parts.len() != 4 && parts.len() != 8 {
            return Err(ReadingError::Malformed(format!(
                "expected 4 or 8 fields, got {}",
                parts.len()
            )));
        }

        let timestamp = parse_timestamp(parts[0])
            .ok_or_else(|| ReadingError::Malformed(format!("bad timestamp '{}'", parts[0])))?;

        Ok(Self {
            timestamp: Some(timestamp),
            heart_rate: parts[1].parse().ok(),
            skin_temp: parts[2].parse().ok(),
            sweat_level: parts[3].parse().ok(),
        })
    }

    /// Parse one JSON line.
    pub fn from_json_line(line: &str) -> Result<Self, ReadingError> {
        serde_json::from_str(line.trim()).map_err(|e| ReadingError::Malformed(e.to_string()))
    }

    /// Validate into a [`Reading`].
    pub fn into_reading(self) -> Result<Reading, ReadingError> {
        let timestamp = self.timestamp.ok_or(ReadingError::MissingTimestamp)?;
        let heart_rate = self.heart_rate.ok_or(ReadingError::Missing(Channel::HeartRate))?;
        let skin_temp = self.skin_temp.ok_or(ReadingError::Missing(Channel::SkinTemp))?;
        let sweat_level = self
            .sweat_level
            .ok_or(ReadingError::Missing(Channel::SweatLevel))?;
        Reading::new(timestamp, heart_rate, skin_temp, sweat_level)
    }
}

impl TryFrom<RawReading> for Reading {
    type Error = ReadingError;

    fn try_from(raw: RawReading) -> Result<Self, Self::Error> {
        raw.into_reading()
    }
}

/// Epoch milliseconds or RFC 3339.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(millis) = s.parse::<i64>() {
        return Utc.timestamp_millis_opt(millis).single();
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Coarse sweat band shown next to the raw level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SweatBand {
    Low,    // < 400
    Medium, // 400-699
    High,   // >= 700
}

impl SweatBand {
    pub fn from_level(level: f64) -> Self {
        if level < 400.0 {
            SweatBand::Low
        } else if level < 700.0 {
            SweatBand::Medium
        } else {
            SweatBand::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SweatBand::Low => "Low",
            SweatBand::Medium => "Medium",
            SweatBand::High => "High",
        }
    }
}

/// Serde support for millisecond-or-RFC 3339 timestamps.
mod timestamp_serde {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Millis(i64),
        Text(String),
    }

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.map(|t| t.to_rfc3339()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let repr = Option::<Repr>::deserialize(deserializer)?;
        let parsed = match repr {
            None => return Ok(None),
            Some(Repr::Millis(ms)) => super::parse_timestamp(&ms.to_string()),
            Some(Repr::Text(s)) => super::parse_timestamp(&s),
        };
        parsed
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("invalid timestamp"))
    }
}
