//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the playback engine:
//! - Logging and tracing infrastructure
//! - Host capability configuration
//! - Engine event bus
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the engine crates depend on. It
//! establishes the logging conventions, the fail-fast capability wiring and
//! the event broadcasting mechanism used throughout the system.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder, FaultCallback};
pub use error::{Error, Result};
pub use events::{EngineEvent, EventBus, EventStream, PlaybackState};
