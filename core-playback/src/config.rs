//! Engine tuning configuration.
//!
//! Every field carries a serde default so hosts can ship partial JSON
//! documents and only override what they care about.

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What the controller does when the advancing position leaves the loop range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPolicy {
    /// Jump to the opposite bound and keep playing.
    #[default]
    Wrap,
    /// Clamp to the bound and stop.
    Stop,
}

/// Playback engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Total number of pre-allocated frame buffers (N).
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Frames per cache block (B), the unit of prefetch, seek and eviction.
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Blocks to warm beyond the lookahead window.
    #[serde(default = "default_prefetch_blocks")]
    pub prefetch_blocks: usize,

    /// Audio buffers queued before the sink is started.
    #[serde(default = "default_audio_prefetch_buffers")]
    pub audio_prefetch_buffers: usize,

    /// Frames requested ahead of the displayed one.
    #[serde(default = "default_audio_lookahead_frames")]
    pub audio_lookahead_frames: usize,

    /// Controller scheduling tick.
    #[serde(default = "default_tick_interval", with = "duration_ms")]
    pub tick_interval: Duration,

    /// Length of an animated seek.
    #[serde(default = "default_seek_animation", with = "duration_ms")]
    pub seek_animation: Duration,

    /// How long PREPARING waits for the sink before going video-only.
    #[serde(default = "default_audio_start_timeout", with = "duration_ms")]
    pub audio_start_timeout: Duration,

    /// Upper bound for blocking facade calls.
    #[serde(default = "default_request_timeout", with = "duration_ms")]
    pub request_timeout: Duration,

    #[serde(default)]
    pub loop_policy: LoopPolicy,

    /// Abort the process when the frame pool reports corruption.
    #[serde(default = "default_abort_on_invariant_violation")]
    pub abort_on_invariant_violation: bool,

    /// How long idle actors block on their mailbox.
    #[serde(default = "default_idle_wait", with = "duration_ms")]
    pub idle_wait: Duration,
}

fn default_pool_size() -> usize {
    64
}

fn default_block_size() -> usize {
    8
}

fn default_prefetch_blocks() -> usize {
    2
}

fn default_audio_prefetch_buffers() -> usize {
    4
}

fn default_audio_lookahead_frames() -> usize {
    12
}

fn default_tick_interval() -> Duration {
    Duration::from_millis(10)
}

fn default_seek_animation() -> Duration {
    Duration::from_millis(250)
}

fn default_audio_start_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_abort_on_invariant_violation() -> bool {
    cfg!(not(debug_assertions))
}

fn default_idle_wait() -> Duration {
    core_actor::DEFAULT_IDLE_WAIT
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            block_size: default_block_size(),
            prefetch_blocks: default_prefetch_blocks(),
            audio_prefetch_buffers: default_audio_prefetch_buffers(),
            audio_lookahead_frames: default_audio_lookahead_frames(),
            tick_interval: default_tick_interval(),
            seek_animation: default_seek_animation(),
            audio_start_timeout: default_audio_start_timeout(),
            request_timeout: default_request_timeout(),
            loop_policy: LoopPolicy::default(),
            abort_on_invariant_violation: default_abort_on_invariant_violation(),
            idle_wait: default_idle_wait(),
        }
    }
}

impl EngineConfig {
    /// Small pool, short lookahead. Suits scrubbing-heavy annotation work.
    pub fn low_latency() -> Self {
        Self {
            pool_size: 32,
            block_size: 4,
            prefetch_blocks: 1,
            audio_prefetch_buffers: 2,
            audio_lookahead_frames: 6,
            tick_interval: Duration::from_millis(5),
            ..Default::default()
        }
    }

    /// Large pool and deep lookahead for uninterrupted playback.
    pub fn high_quality() -> Self {
        Self {
            pool_size: 256,
            block_size: 16,
            prefetch_blocks: 4,
            audio_prefetch_buffers: 8,
            audio_lookahead_frames: 32,
            ..Default::default()
        }
    }

    /// Parse a (possibly partial) JSON document and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PlaybackError::InvalidConfig(e.to_string()))?;
        config.validate().map_err(PlaybackError::InvalidConfig)?;
        Ok(config)
    }

    /// Number of cache blocks in the pool.
    pub fn block_count(&self) -> usize {
        if self.block_size == 0 {
            0
        } else {
            self.pool_size / self.block_size
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.block_size == 0 {
            return Err("block_size must be greater than 0".to_string());
        }

        if self.pool_size < self.block_size {
            return Err("pool_size must hold at least one block".to_string());
        }

        if self.pool_size % self.block_size != 0 {
            return Err(format!(
                "pool_size ({}) must be a multiple of block_size ({})",
                self.pool_size, self.block_size
            ));
        }

        // The lookahead window may straddle one more block than it covers,
        // and the displayed frame can sit in yet another one.
        let lookahead_blocks = self.audio_lookahead_frames.div_ceil(self.block_size) + 2;
        if self.block_count() < lookahead_blocks {
            return Err(format!(
                "pool of {} blocks cannot hold a lookahead of {} frames (needs {} blocks)",
                self.block_count(),
                self.audio_lookahead_frames,
                lookahead_blocks
            ));
        }

        if self.audio_prefetch_buffers > self.audio_lookahead_frames {
            return Err(
                "audio_prefetch_buffers cannot exceed audio_lookahead_frames".to_string(),
            );
        }

        if self.tick_interval.is_zero() {
            return Err("tick_interval must be greater than 0".to_string());
        }

        if self.idle_wait.is_zero() {
            return Err("idle_wait must be greater than 0".to_string());
        }

        if self.request_timeout.is_zero() {
            return Err("request_timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Durations travel as integer milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.pool_size, 64);
        assert_eq!(config.block_size, 8);
        assert_eq!(config.block_count(), 8);
        assert_eq!(config.loop_policy, LoopPolicy::Wrap);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_validate() {
        assert!(EngineConfig::low_latency().validate().is_ok());
        assert!(EngineConfig::high_quality().validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = EngineConfig::default();

        config.block_size = 0;
        assert!(config.validate().is_err());

        config.block_size = 6;
        assert!(config.validate().unwrap_err().contains("multiple"));

        config.block_size = 8;
        config.pool_size = 16;
        assert!(config.validate().unwrap_err().contains("lookahead"));

        config = EngineConfig::default();
        config.tick_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        config = EngineConfig::default();
        config.audio_prefetch_buffers = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json() {
        let config =
            EngineConfig::from_json(r#"{"pool_size": 128, "loop_policy": "stop", "tick_interval": 20}"#)
                .unwrap();
        assert_eq!(config.pool_size, 128);
        assert_eq!(config.block_size, 8);
        assert_eq!(config.loop_policy, LoopPolicy::Stop);
        assert_eq!(config.tick_interval, Duration::from_millis(20));
        assert_eq!(config.seek_animation, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(matches!(
            EngineConfig::from_json(r#"{"block_size": 3}"#),
            Err(PlaybackError::InvalidConfig(_))
        ));
        assert!(EngineConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_serialization_round_trip() {
        let config = EngineConfig::high_quality();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
    }
}
