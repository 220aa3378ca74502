//! Personal baseline estimation.
//!
//! The estimator learns a subject's normal from the first `window` valid
//! readings, then follows slow drift with an exponential blend, but only
//! while the subject has been NORMAL for a sustained run.

use crate::core::classifier::State;
use crate::ingest::types::{Channel, Reading};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::debug;

/// Personal-normal vector used as the zero point for deviation scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub hr: f64,
    pub temp: f64,
    pub sweat: f64,
}

impl Baseline {
    /// Used for scoring before any valid reading has been seen.
    pub const FALLBACK: Baseline = Baseline {
        hr: 70.0,
        temp: 36.5,
        sweat: 0.0,
    };

    pub fn new(hr: f64, temp: f64, sweat: f64) -> Self {
        Self { hr, temp, sweat }
    }

    pub fn from_reading(reading: &Reading) -> Self {
        Self {
            hr: reading.heart_rate(),
            temp: reading.skin_temp(),
            sweat: reading.sweat_level(),
        }
    }

    pub fn value(&self, channel: Channel) -> f64 {
        match channel {
            Channel::HeartRate => self.hr,
            Channel::SkinTemp => self.temp,
            Channel::SweatLevel => self.sweat,
        }
    }

    /// `self * (1 - alpha) + reading * alpha`, per channel.
    pub fn blend(&self, reading: &Reading, alpha: f64) -> Self {
        let mix = |base: f64, value: f64| base * (1.0 - alpha) + value * alpha;
        Self {
            hr: mix(self.hr, reading.heart_rate()),
            temp: mix(self.temp, reading.skin_temp()),
            sweat: mix(self.sweat, reading.sweat_level()),
        }
    }

    fn mean_of(samples: &[Baseline]) -> Self {
        Self {
            hr: samples.iter().map(|s| s.hr).mean(),
            temp: samples.iter().map(|s| s.temp).mean(),
            sweat: samples.iter().map(|s| s.sweat).mean(),
        }
    }
}

impl Default for Baseline {
    fn default() -> Self {
        Self::FALLBACK
    }
}

/// Tuning for the estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineConfig {
    /// Valid readings averaged into the first baseline
    pub window: usize,
    /// Consecutive NORMAL readings required before adaptation starts
    pub adapt_start: u32,
    /// Exponential smoothing factor for adaptation
    pub alpha: f64,
    /// Baseline used while nothing has been observed
    pub fallback: Baseline,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            window: 15,
            adapt_start: 10,
            alpha: 0.1,
            fallback: Baseline::FALLBACK,
        }
    }
}

/// Where the estimator is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum BaselineStatus {
    /// No valid reading yet.
    Waiting,
    /// Accumulating the initial window; scoring uses a provisional baseline.
    Learning { count: usize, window: usize },
    /// Baseline established (and possibly adapted since).
    Ready { baseline: Baseline },
}

impl BaselineStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, BaselineStatus::Ready { .. })
    }
}

/// Owns the baseline for one monitoring session.
#[derive(Debug, Clone)]
pub struct BaselineEstimator {
    config: BaselineConfig,
    buffer: Vec<Baseline>,
    baseline: Option<Baseline>,
    normal_streak: u32,
}

impl BaselineEstimator {
    pub fn new(config: BaselineConfig) -> Self {
        let capacity = config.window.max(1);
        Self {
            config,
            buffer: Vec::with_capacity(capacity),
            baseline: None,
            normal_streak: 0,
        }
    }

    /// Feed a reading into the learning window.
    ///
    /// Once the window fills, its mean becomes the baseline. After that this
    /// is a no-op; drift is handled by [`adapt`](Self::adapt).
    pub fn observe(&mut self, reading: &Reading) -> BaselineStatus {
        if self.baseline.is_none() {
            self.buffer.push(Baseline::from_reading(reading));

            if self.buffer.len() >= self.config.window.max(1) {
                let established = Baseline::mean_of(&self.buffer);
                debug!(
                    hr = established.hr,
                    temp = established.temp,
                    sweat = established.sweat,
                    "baseline established"
                );
                self.baseline = Some(established);
                self.buffer.clear();
            }
        }
        self.status()
    }

    /// Record the classification of a reading scored against an established
    /// baseline. Returns true when the baseline moved.
    pub fn adapt(&mut self, reading: &Reading, state: State) -> bool {
        let Some(baseline) = self.baseline else {
            return false;
        };

        if state != State::Normal {
            self.normal_streak = 0;
            return false;
        }

        self.normal_streak = self.normal_streak.saturating_add(1);
        if self.normal_streak < self.config.adapt_start {
            return false;
        }

        let adapted = baseline.blend(reading, self.config.alpha);
        debug!(
            streak = self.normal_streak,
            hr = adapted.hr,
            temp = adapted.temp,
            sweat = adapted.sweat,
            "baseline adapted"
        );
        self.baseline = Some(adapted);
        true
    }

    /// Baseline to score against right now: the established one, else the
    /// mean of the partial window, else the configured fallback.
    pub fn current(&self) -> Baseline {
        match self.baseline {
            Some(b) => b,
            None if self.buffer.is_empty() => self.config.fallback,
            None => Baseline::mean_of(&self.buffer),
        }
    }

    pub fn status(&self) -> BaselineStatus {
        match self.baseline {
            Some(baseline) => BaselineStatus::Ready { baseline },
            None if self.buffer.is_empty() => BaselineStatus::Waiting,
            None => BaselineStatus::Learning {
                count: self.buffer.len(),
                window: self.config.window,
            },
        }
    }

    pub fn is_established(&self) -> bool {
        self.baseline.is_some()
    }

    /// Current run of consecutive NORMAL readings since establishment.
    pub fn normal_streak(&self) -> u32 {
        self.normal_streak
    }

    pub fn config(&self) -> &BaselineConfig {
        &self.config
    }

    /// Forget everything and return to `Waiting`.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.baseline = None;
        self.normal_streak = 0;
    }
}

impl Default for BaselineEstimator {
    fn default() -> Self {
        Self::new(BaselineConfig::default())
    }
}
