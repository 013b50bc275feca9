//! # Core Configuration Module
//!
//! Host capability wiring for a playback engine.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! holding every bridge implementation the engine needs. It enforces
//! fail-fast validation so a missing capability is reported before any actor
//! thread starts.
//!
//! ## Required Dependencies
//!
//! - `DecoderFactory` - opens media files for decoding
//!
//! ## Optional Dependencies
//!
//! - `AudioOutput` - audio device access; without it the engine is video-only
//! - `Clock` - monotonic time source (default: `SystemClock`)
//! - fault handler - application hook for escalated actor faults
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .decoder_factory(Arc::new(MyDecoderFactory))
//!     .audio_output(Arc::new(MyAudioOutput))
//!     .fault_handler(|fault| eprintln!("playback fault: {fault}"))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Panics with an actionable CapabilityMissing error
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing decoder factory");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{AudioOutput, Clock, DecoderFactory, SystemClock};
use core_actor::Fault;
use std::sync::Arc;

/// Largest accepted event bus capacity.
const MAX_EVENT_BUFFER: usize = 65_536;

/// Application hook invoked for every escalated fault.
///
/// Runs on the error-reporter thread.
pub type FaultCallback = Arc<dyn Fn(&Fault) + Send + Sync>;

/// Host capabilities and runtime settings for a playback engine.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Opens decoders for media paths (required)
    pub decoder_factory: Arc<dyn DecoderFactory>,

    /// Creates audio sinks (optional; absent means video-only playback)
    pub audio_output: Option<Arc<dyn AudioOutput>>,

    /// Monotonic time source used for playback pacing
    pub clock: Arc<dyn Clock>,

    /// Application fault hook (optional)
    pub fault_handler: Option<FaultCallback>,

    /// Event bus capacity
    pub event_buffer: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("decoder_factory", &"DecoderFactory { ... }")
            .field(
                "audio_output",
                &self.audio_output.as_ref().map(|_| "AudioOutput { ... }"),
            )
            .field("clock", &"Clock { ... }")
            .field(
                "fault_handler",
                &self.fault_handler.as_ref().map(|_| "Fn(&Fault) { ... }"),
            )
            .field("event_buffer", &self.event_buffer)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Whether the engine can play audio.
    pub fn has_audio_output(&self) -> bool {
        self.audio_output.is_some()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer == 0 {
            return Err(Error::Config(
                "Event buffer must hold at least one event".to_string(),
            ));
        }

        if self.event_buffer > MAX_EVENT_BUFFER {
            return Err(Error::Config(format!(
                "Event buffer exceeds maximum of {} events",
                MAX_EVENT_BUFFER
            )));
        }

        Ok(())
    }
}

fn decoder_factory_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "DecoderFactory".to_string(),
        message: "A DecoderFactory implementation is required to open media files. \
                 Inject the host decoder adapter with .decoder_factory()."
            .to_string(),
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    decoder_factory: Option<Arc<dyn DecoderFactory>>,
    audio_output: Option<Arc<dyn AudioOutput>>,
    clock: Option<Arc<dyn Clock>>,
    fault_handler: Option<FaultCallback>,
    event_buffer: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the decoder factory (required).
    pub fn decoder_factory(mut self, factory: Arc<dyn DecoderFactory>) -> Self {
        self.decoder_factory = Some(factory);
        self
    }

    /// Sets the audio output. Leave unset for video-only playback.
    pub fn audio_output(mut self, output: Arc<dyn AudioOutput>) -> Self {
        self.audio_output = Some(output);
        self
    }

    /// Overrides the clock, typically with a manual clock in tests.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Installs the application fault hook.
    pub fn fault_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Fault) + Send + Sync + 'static,
    {
        self.fault_handler = Some(Arc::new(handler));
        self
    }

    /// Sets the event bus capacity.
    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = Some(capacity);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - `Error::CapabilityMissing` when no decoder factory was provided
    /// - `Error::Config` when a setting is out of range
    pub fn build(self) -> Result<CoreConfig> {
        let decoder_factory = self
            .decoder_factory
            .ok_or_else(decoder_factory_missing_error)?;

        let config = CoreConfig {
            decoder_factory,
            audio_output: self.audio_output,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            fault_handler: self.fault_handler,
            event_buffer: self.event_buffer.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
