//! Playback position, speed and loop bounds.
//!
//! Only the controller mutates a [`PlaybackPosition`]. The position never
//! leaves `[range_min, range_max]`, where the range is the loop bounds when
//! set and the whole media otherwise.

use super::listeners::PositionUpdate;
use crate::config::LoopPolicy;
use crate::error::{PlaybackError, Result};
use crate::timeline::LoopBounds;
use std::time::{Duration, Instant};

/// What one advancement step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Moved,
    /// Left the loop range and re-entered at the opposite bound.
    Wrapped,
    /// Pinned to a bound; playback should stop.
    Clamped,
}

#[derive(Debug, Clone, Copy)]
struct SeekAnimation {
    from: Duration,
    to: Duration,
    started: Instant,
    length: Duration,
}

#[derive(Debug, Clone)]
pub struct PlaybackPosition {
    position: Duration,
    speed: f64,
    bounds: Option<LoopBounds>,
    duration: Duration,
    animation: Option<SeekAnimation>,
}

impl PlaybackPosition {
    pub fn new(duration: Duration) -> Self {
        Self {
            position: Duration::ZERO,
            speed: 1.0,
            bounds: None,
            duration,
            animation: None,
        }
    }

    pub fn position(&self) -> Duration {
        self.position
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn bounds(&self) -> Option<LoopBounds> {
        self.bounds
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_forward(&self) -> bool {
        self.speed >= 0.0
    }

    /// Effective `[min, max]` the position is confined to.
    pub fn range(&self) -> (Duration, Duration) {
        match self.bounds {
            Some(bounds) => (bounds.min(), bounds.max()),
            None => (Duration::ZERO, self.duration),
        }
    }

    pub fn update(&self) -> PositionUpdate {
        let (min, max) = self.range();
        PositionUpdate {
            position: self.position,
            min,
            max,
        }
    }

    /// Signed speed multiplier; negative plays backwards.
    pub fn set_speed(&mut self, speed: f64) -> Result<()> {
        if !speed.is_finite() {
            return Err(PlaybackError::InvalidArgument(format!(
                "speed must be finite, got {}",
                speed
            )));
        }
        self.speed = speed;
        Ok(())
    }

    /// Replace the loop bounds, clipped to the media.
    ///
    /// Returns `true` if the position had to move into the new range.
    pub fn set_bounds(&mut self, bounds: Option<LoopBounds>) -> Result<bool> {
        self.bounds = match bounds {
            Some(bounds) => Some(bounds.clamp_to(self.duration).ok_or_else(|| {
                PlaybackError::InvalidArgument(format!(
                    "loop bounds {:?}..{:?} lie outside the media ({:?})",
                    bounds.min(),
                    bounds.max(),
                    self.duration
                ))
            })?),
            None => None,
        };
        let clamped = self.clamp(self.position);
        let moved = clamped != self.position;
        self.position = clamped;
        Ok(moved)
    }

    /// Jump to `target`, clamped into the range. Cancels any animation.
    pub fn seek(&mut self, target: Duration) -> Duration {
        self.animation = None;
        self.position = self.clamp(target);
        self.position
    }

    /// Interpolate towards `target` over `length` of real time.
    pub fn animate_to(&mut self, target: Duration, now: Instant, length: Duration) {
        self.animation = Some(SeekAnimation {
            from: self.position,
            to: self.clamp(target),
            started: now,
            length,
        });
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Move along a running animation. Returns `Some(true)` on its last step.
    pub fn step_animation(&mut self, now: Instant) -> Option<bool> {
        let animation = self.animation?;
        let elapsed = now.saturating_duration_since(animation.started);
        if elapsed >= animation.length || animation.length.is_zero() {
            self.position = animation.to;
            self.animation = None;
            return Some(true);
        }

        let progress = elapsed.as_secs_f64() / animation.length.as_secs_f64();
        let from = animation.from.as_secs_f64();
        let to = animation.to.as_secs_f64();
        self.position = Duration::from_secs_f64((from + (to - from) * progress).max(0.0));
        Some(false)
    }

    /// Advance by `elapsed * speed` of media time.
    pub fn advance(&mut self, elapsed: Duration, policy: LoopPolicy) -> Advance {
        let delta = elapsed.as_secs_f64() * self.speed;
        if delta == 0.0 {
            return Advance::Moved;
        }

        let (min, max) = self.range();
        let (lo, hi) = (min.as_secs_f64(), max.as_secs_f64());
        let target = self.position.as_secs_f64() + delta;
        let wrap = self.bounds.is_some() && policy == LoopPolicy::Wrap && hi > lo;

        if target > hi {
            if wrap {
                let overshoot = (target - hi) % (hi - lo);
                self.position = self.clamp(Duration::from_secs_f64(lo + overshoot));
                return Advance::Wrapped;
            }
            self.position = max;
            return Advance::Clamped;
        }
        if target < lo {
            if wrap {
                let overshoot = (lo - target) % (hi - lo);
                self.position = self.clamp(Duration::from_secs_f64(hi - overshoot));
                return Advance::Wrapped;
            }
            self.position = min;
            return Advance::Clamped;
        }

        self.position = self.clamp(Duration::from_secs_f64(target));
        Advance::Moved
    }

    fn clamp(&self, position: Duration) -> Duration {
        let (min, max) = self.range();
        position.clamp(min, max)
    }
}
