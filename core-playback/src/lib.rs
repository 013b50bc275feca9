//! # Core Playback
//!
//! Actor-based media playback engine: a frame cache in front of a decoder,
//! an audio renderer, and a controller that keeps video, audio and the
//! playback position in step.
//!
//! ## Overview
//!
//! - [`engine`] - [`PlaybackEngine`], the blocking facade used by hosts
//! - [`controller`] - playback state machine, position and listeners
//! - [`cache`] - fixed-size frame pool and the actor that serves it
//! - [`fetcher`] - decodes blocks of frames into pool slots
//! - [`audio`] - ordered, paced feed into the host audio sink
//! - [`video`] - the frame currently on screen, pulled by display surfaces
//! - [`frame`] - pooled frames and the leases that pin them
//! - [`timeline`] - frame rate and loop bound arithmetic
//! - [`config`] - engine tuning ([`EngineConfig`])
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::{EngineConfig, OpenOptions, PlaybackEngine};
//! use core_runtime::CoreConfig;
//! use std::sync::Arc;
//!
//! let core = CoreConfig::builder()
//!     .decoder_factory(Arc::new(MyDecoderFactory))
//!     .audio_output(Arc::new(MyAudioOutput))
//!     .build()?;
//! let engine = PlaybackEngine::new(core, EngineConfig::default())?;
//!
//! let info = engine.open("clip.mp4", OpenOptions::new())?;
//! engine.start()?;
//! ```
//!
//! Host collaborators (decoder, audio sink, display surface, clock) are
//! defined in `bridge-traits`.

pub mod audio;
pub mod cache;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod frame;
pub mod timeline;
pub mod video;

pub use audio::{AudioMsg, AudioRenderer, AudioStatus, AudioUpdate};
pub use cache::{CacheMsg, CacheStats, FrameCache, FrameReply, FrameRequest};
pub use config::{EngineConfig, LoopPolicy};
pub use controller::{
    ControllerMsg, Listener, PlaybackStatus, PositionUpdate, StatusUpdate,
};
pub use engine::{OpenOptions, PlaybackEngine};
pub use error::{PlaybackError, Result};
pub use fetcher::{FetcherMsg, FrameFetcher};
pub use frame::FrameLease;
pub use timeline::{FrameRate, LoopBounds};
pub use video::VideoOutput;
