//! Synthetic vitals for demos.
//!
//! Cycles through four 30-tick phases (steady, drifting, stressed,
//! recovering) around a resting profile of 72 bpm / 34.5 °C / 820 sweat.
//! The generator knows nothing about baselines or states; it only shapes
//! input for the monitor.

use crate::ingest::types::RawReading;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const CYCLE_TICKS: u32 = 120;

/// Seeded generator of [`RawReading`]s, one per tick.
pub struct VitalsSimulator {
    rng: StdRng,
    tick: u32,
    next_timestamp: Option<DateTime<Utc>>,
    step: Duration,
    emitted: u64,
}

impl VitalsSimulator {
    /// Create a simulator starting at `start`, one reading per `step`.
    pub fn new(seed: u64, start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            tick: 0,
            next_timestamp: Some(start),
            step,
            emitted: 0,
        }
    }

    /// Number of readings produced so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Produce the next reading, or `None` once its timestamp would leave
    /// the representable range.
    fn next_reading(&mut self) -> Option<RawReading> {
        let timestamp = self.next_timestamp?;
        self.next_timestamp = timestamp.checked_add_signed(self.step);
        self.emitted += 1;

        self.tick = self.tick % CYCLE_TICKS + 1;
        let t = self.tick as f64;
        let rng = &mut self.rng;

        let (heart_rate, skin_temp, sweat_level) = match self.tick {
            1..=29 => (
                72.0 + rng.gen_range(-2.0..2.0),
                34.5 + rng.gen_range(-0.1..0.1),
                820.0 + rng.gen_range(-20.0..20.0),
            ),
            30..=59 => (
                72.0 + (t - 30.0) * 0.8 + rng.gen_range(0.0..4.0),
                34.5 - (t - 30.0) * 0.08 + rng.gen_range(0.0..0.2),
                820.0 - (t - 30.0) * 13.0 + rng.gen_range(0.0..40.0),
            ),
            60..=89 => (
                96.0 + rng.gen_range(0.0..6.0),
                32.1 + rng.gen_range(0.0..0.3),
                420.0 + rng.gen_range(0.0..50.0),
            ),
            _ => (
                96.0 - (t - 90.0) * 0.8 + rng.gen_range(0.0..4.0),
                32.1 + (t - 90.0) * 0.08 + rng.gen_range(0.0..0.2),
                420.0 + (t - 90.0) * 13.0 + rng.gen_range(0.0..40.0),
            ),
        };

        Some(RawReading::new(
            timestamp,
            heart_rate.round(),
            (skin_temp * 10.0).round() / 10.0,
            sweat_level.round(),
        ))
    }
}

impl Iterator for VitalsSimulator {
    type Item = RawReading;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_reading()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-22T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_simulator_is_deterministic() {
        let a: Vec<RawReading> = VitalsSimulator::new(7, start(), Duration::seconds(1))
            .take(50)
            .collect();
        let b: Vec<RawReading> = VitalsSimulator::new(7, start(), Duration::seconds(1))
            .take(50)
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_simulator_timestamps_increase() {
        let readings: Vec<RawReading> = VitalsSimulator::new(1, start(), Duration::seconds(1))
            .take(130)
            .collect();
        for pair in readings.windows(2) {
            assert!(pair[1].timestamp > pair[0].timestamp);
        }
    }

    #[test]
    fn test_simulator_timestamps_past_i32_ticks() {
        let mut sim = VitalsSimulator::new(1, start(), Duration::seconds(1));
        let ticks = i32::MAX as i64;
        sim.emitted = ticks as u64;
        sim.next_timestamp = Some(start() + Duration::seconds(ticks));

        let readings: Vec<RawReading> = sim.by_ref().take(3).collect();
        assert_eq!(readings.len(), 3);
        assert_eq!(readings[0].timestamp, Some(start() + Duration::seconds(ticks)));
        for pair in readings.windows(2) {
            assert!(pair[1].timestamp > pair[0].timestamp);
        }
        assert_eq!(sim.emitted(), ticks as u64 + 3);
    }

    #[test]
    fn test_simulator_stops_at_end_of_time() {
        let last = DateTime::<Utc>::MAX_UTC;
        let sim = VitalsSimulator::new(1, last - Duration::seconds(1), Duration::seconds(1));
        let readings: Vec<RawReading> = sim.take(5).collect();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[1].timestamp, Some(last));
    }

    #[test]
    fn test_simulator_stress_phase() {
        let readings: Vec<RawReading> = VitalsSimulator::new(3, start(), Duration::seconds(1))
            .take(CYCLE_TICKS as usize)
            .collect();

        let steady = readings[10].clone().into_reading().unwrap();
        let stressed = readings[70].clone().into_reading().unwrap();
        assert!((70.0..=74.0).contains(&steady.heart_rate()));
        assert!(stressed.heart_rate() >= 96.0);
        assert!(stressed.sweat_level() < 500.0);
    }
}
