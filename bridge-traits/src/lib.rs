//! # Host Bridge Traits
//!
//! Collaborator contracts the playback engine needs from its host.
//!
//! ## Overview
//!
//! The engine never decodes containers, talks to audio devices or paints
//! pixels itself. Each of those capabilities is a trait defined here and
//! implemented by the host application (or by synthetic fakes in tests).
//!
//! ## Traits
//!
//! ### Media
//! - [`DecoderFactory`](playback::DecoderFactory) / [`MediaDecoder`](playback::MediaDecoder) - seek and decode one frame period at a time
//! - [`AudioOutput`](playback::AudioOutput) / [`AudioSink`](playback::AudioSink) - paced PCM output with start/stop notifications
//! - [`DisplaySurface`](playback::DisplaySurface) / [`FrameSource`](playback::FrameSource) - pull-on-repaint video display
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Monotonic time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The engine fails fast with descriptive errors when a required capability is
//! missing:
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .decoder_factory(Arc::new(MyDecoderFactory))
//!     .build()?; // Error::CapabilityMissing if the decoder factory is absent
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Host
//! implementations should convert platform-specific errors to `BridgeError`
//! and include context such as file paths or device names.
//!
//! ## Thread Safety
//!
//! Factories and surfaces are shared between the engine facade and its actor
//! threads and therefore require `Send + Sync`. Decoders and sinks are moved
//! onto a single actor thread and only require `Send`.

pub mod error;
pub mod platform;
pub mod playback;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use playback::{
    AudioChunk, AudioFormat, AudioOutput, AudioSink, DecoderFactory, DisplaySurface, FrameBuffer,
    FrameKind, FrameSource, MediaDecoder, MediaInfo, PixelFormat, SinkEvent, SinkEventHandler,
    SurfaceId, VideoFormat, VideoImage,
};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, SystemClock};
