//! # Playback Error Types
//!
//! Error taxonomy for the playback engine.
//!
//! - *Media* errors (open, decode, seek) are reported by the frame fetcher.
//!   They are not fatal to the pipeline; the affected frame request is dropped.
//! - *Audio device* errors are reported by the audio renderer; playback then
//!   continues video-only.
//! - *Invariant violations* mean the frame pool is corrupted. They escalate as
//!   fatal faults.
//! - *Control* errors are returned to callers of the engine facade.

use bridge_traits::BridgeError;
use core_actor::{ActorError, RendezvousError};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Media Errors
    // ========================================================================
    /// The decoder could not open the media file.
    #[error("Failed to open media {file}: {reason}")]
    MediaOpen { file: String, reason: String },

    /// Error occurred while decoding a frame.
    #[error("Decoding error at frame {seq}: {reason}")]
    Decode { seq: u64, reason: String },

    /// The decoder could not seek to the requested position.
    #[error("Seek to {target:?} failed: {reason}")]
    Seek { target: Duration, reason: String },

    /// Frame rate reported by the decoder is unusable.
    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(f64),

    // ========================================================================
    // Audio Errors
    // ========================================================================
    /// Platform audio device failed or is unavailable.
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    // ========================================================================
    // Frame Pool Errors
    // ========================================================================
    /// The frame pool's bookkeeping is inconsistent.
    #[error("Frame pool invariant violated: {0}")]
    InvariantViolation(String),

    /// A try-only frame request found no free block.
    #[error("No free frame buffers")]
    NoFreeResources,

    // ========================================================================
    // Control Errors
    // ========================================================================
    /// Attempted operation when no media is open.
    #[error("No media open")]
    NoMediaOpen,

    /// The engine has been closed.
    #[error("Playback engine closed")]
    EngineClosed,

    /// Engine configuration is invalid.
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// A command argument is out of range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A collaborator or actor needed for the operation is not running.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    // ========================================================================
    // Wrapped Errors
    // ========================================================================
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Request failed: {0}")]
    Rendezvous(#[from] RendezvousError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Actor error: {0}")]
    Actor(#[from] ActorError),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` for errors that indicate corrupted engine state.
    pub fn is_fatal(&self) -> bool {
        match self {
            PlaybackError::InvariantViolation(_) => true,
            PlaybackError::Actor(err) => err.is_fatal(),
            _ => false,
        }
    }

    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::NoFreeResources
                | PlaybackError::AudioDevice(_)
                | PlaybackError::Rendezvous(RendezvousError::Timeout { .. })
        )
    }

    /// Returns `true` if this error came from the decoder.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::MediaOpen { .. }
                | PlaybackError::Decode { .. }
                | PlaybackError::Seek { .. }
                | PlaybackError::InvalidFrameRate(_)
        )
    }
}

impl From<PlaybackError> for ActorError {
    fn from(err: PlaybackError) -> Self {
        match err {
            PlaybackError::Actor(inner) => inner,
            err if err.is_fatal() => ActorError::fatal(err),
            err => ActorError::failed(err),
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
