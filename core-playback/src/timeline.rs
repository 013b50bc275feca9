//! Mapping between stream time and decode sequence numbers, plus loop bounds.

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tolerance, in frames, absorbed when converting a time back to a sequence
/// number. `Duration` only has nanosecond resolution, so `time_of(s)` can land
/// a hair before the true frame boundary.
const SEQ_EPSILON: f64 = 1e-4;

/// Frames per second of a decode sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameRate(f64);

impl FrameRate {
    pub fn new(fps: f64) -> Result<Self> {
        if fps.is_finite() && fps > 0.0 {
            Ok(Self(fps))
        } else {
            Err(PlaybackError::InvalidFrameRate(fps))
        }
    }

    pub fn fps(&self) -> f64 {
        self.0
    }

    /// Sequence number of the frame showing at `time`: `floor(t * r)`.
    pub fn seq_at(&self, time: Duration) -> u64 {
        (time.as_secs_f64() * self.0 + SEQ_EPSILON).floor() as u64
    }

    /// Stream time at which frame `seq` starts.
    pub fn time_of(&self, seq: u64) -> Duration {
        Duration::from_secs_f64(seq as f64 / self.0)
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.0)
    }
}

/// Range playback is restricted to. `min < max` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopBounds {
    min: Duration,
    max: Duration,
}

impl LoopBounds {
    pub fn new(min: Duration, max: Duration) -> Result<Self> {
        if min >= max {
            return Err(PlaybackError::InvalidArgument(format!(
                "loop bounds must satisfy min < max (got {:?}..{:?})",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    pub fn from_millis(min_ms: u64, max_ms: u64) -> Result<Self> {
        Self::new(Duration::from_millis(min_ms), Duration::from_millis(max_ms))
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn contains(&self, position: Duration) -> bool {
        position >= self.min && position <= self.max
    }

    /// Restrict to `[0, duration]`. `None` when nothing of the range is left.
    pub fn clamp_to(&self, duration: Duration) -> Option<Self> {
        let max = self.max.min(duration);
        (self.min < max).then_some(Self { min: self.min, max })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rejects_bad_frame_rates() {
        assert!(FrameRate::new(0.0).is_err());
        assert!(FrameRate::new(-25.0).is_err());
        assert!(FrameRate::new(f64::NAN).is_err());
        assert!(FrameRate::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_seq_mapping_at_25_fps() {
        let rate = FrameRate::new(25.0).unwrap();
        assert_eq!(rate.seq_at(Duration::ZERO), 0);
        assert_eq!(rate.seq_at(Duration::from_millis(39)), 0);
        assert_eq!(rate.seq_at(Duration::from_millis(40)), 1);
        assert_eq!(rate.seq_at(Duration::from_secs(10)), 250);
        assert_eq!(rate.time_of(249), Duration::from_millis(9960));
        assert_eq!(rate.period(), Duration::from_millis(40));
    }

    #[test]
    fn test_ntsc_boundaries() {
        let rate = FrameRate::new(30000.0 / 1001.0).unwrap();
        for seq in [1, 29, 30, 1799, 107892] {
            assert_eq!(rate.seq_at(rate.time_of(seq)), seq);
        }
    }

    #[test]
    fn test_loop_bounds() {
        assert!(LoopBounds::from_millis(5000, 5000).is_err());
        assert!(LoopBounds::from_millis(6000, 5000).is_err());

        let bounds = LoopBounds::from_millis(1000, 5000).unwrap();
        assert!(bounds.contains(Duration::from_millis(1000)));
        assert!(bounds.contains(Duration::from_millis(5000)));
        assert!(!bounds.contains(Duration::from_millis(5001)));

        let clamped = bounds.clamp_to(Duration::from_secs(3)).unwrap();
        assert_eq!(clamped.max(), Duration::from_secs(3));
        assert!(bounds.clamp_to(Duration::from_millis(500)).is_none());
    }

    proptest! {
        #[test]
        fn seq_mapping_is_monotonic(fps in 1.0f64..240.0, a in 0u64..3_600_000, b in 0u64..3_600_000) {
            let rate = FrameRate::new(fps).unwrap();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(rate.seq_at(Duration::from_millis(lo)) <= rate.seq_at(Duration::from_millis(hi)));
        }

        #[test]
        fn seq_round_trip_stays_adjacent(fps in 1.0f64..240.0, seq in 0u64..1_000_000) {
            let rate = FrameRate::new(fps).unwrap();
            let back = rate.seq_at(rate.time_of(seq));
            prop_assert!(back.abs_diff(seq) <= 1);
        }
    }
}
