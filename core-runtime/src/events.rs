//! # Event Bus System
//!
//! Broadcasts engine notifications to any number of observers using
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! Registered listeners are the primary, ordered way to observe a playback
//! engine. The event bus is the decoupled secondary channel: UI layers, loggers
//! and tests subscribe without touching the engine's actors, and a slow
//! subscriber only ever lags itself.
//!
//! ```text
//! ┌────────────┐   emit    ┌───────────┐   subscribe   ┌────────────┐
//! │ Controller ├──────────>│           ├──────────────>│ UI thread  │
//! └────────────┘           │ EventBus  │               └────────────┘
//! ┌────────────┐   emit    │ (broadcast│   subscribe   ┌────────────┐
//! │ Faults     ├──────────>│  channel) ├──────────────>│ Test probe │
//! └────────────┘           └───────────┘               └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EngineEvent, EventBus, PlaybackState};
//!
//! let bus = EventBus::new(64);
//! let mut stream = bus.subscribe();
//!
//! bus.emit(EngineEvent::StateChanged { state: PlaybackState::Playing }).ok();
//! assert!(matches!(stream.try_recv(), Ok(EngineEvent::StateChanged { .. })));
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell behind and missed `n`
//!   events. Non-fatal; position updates are frequent, so UI subscribers
//!   should simply continue.
//! - **`RecvError::Closed`**: the engine and every clone of the bus are gone.
//!
//! Emission never blocks. Emitting with no subscribers returns an error that
//! emitters ignore.
//!
//! ## Threading
//!
//! Engine actors run on plain OS threads. Subscribers outside an async
//! runtime use [`EventStream::blocking_recv`] or [`EventStream::try_recv`].

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use uuid::Uuid;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError, TryRecvError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Position updates arrive every controller tick; subscribers that cannot
/// keep up receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Event Types
// ============================================================================

/// Playback controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// Position held static, no frames pulled.
    Stopped,
    /// Start requested; waiting for the first frame and for audio to run.
    Preparing,
    /// Position advances with real time.
    Playing,
    /// Terminal: the engine shut down.
    Closed,
}

impl PlaybackState {
    pub fn is_active(&self) -> bool {
        matches!(self, PlaybackState::Preparing | PlaybackState::Playing)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Stopped => "STOPPED",
            PlaybackState::Preparing => "PREPARING",
            PlaybackState::Playing => "PLAYING",
            PlaybackState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

/// Events published by a playback engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum EngineEvent {
    /// A media file was opened and its metadata read.
    MediaOpened {
        /// File name only; full paths stay out of events.
        file: String,
        duration_ms: u64,
        frame_rate: f64,
        frame_count: u64,
        has_video: bool,
        has_audio: bool,
    },
    /// The controller changed state.
    StateChanged { state: PlaybackState },
    /// The playback position moved.
    PositionChanged {
        position_ms: u64,
        loop_min_ms: Option<u64>,
        loop_max_ms: Option<u64>,
    },
    /// A different display surface became active.
    SurfaceChanged { surface_id: Uuid },
    /// An actor escalated a fault.
    Fault {
        actor: String,
        phase: String,
        message: String,
        fatal: bool,
    },
    /// The engine shut down.
    Closed,
}

impl EngineEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            EngineEvent::MediaOpened { .. } => "Media opened",
            EngineEvent::StateChanged { .. } => "Playback state changed",
            EngineEvent::PositionChanged { .. } => "Playback position changed",
            EngineEvent::SurfaceChanged { .. } => "Active surface changed",
            EngineEvent::Fault { .. } => "Actor fault",
            EngineEvent::Closed => "Engine closed",
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            EngineEvent::Fault { fatal: true, .. } => EventSeverity::Error,
            EngineEvent::Fault { .. } => EventSeverity::Warning,
            EngineEvent::MediaOpened { .. } | EngineEvent::Closed => EventSeverity::Info,
            EngineEvent::StateChanged { .. } => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for engine events. Clones share the channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// when there are none.
    pub fn emit(&self, event: EngineEvent) -> Result<usize, SendError<EngineEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.sender.subscribe())
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

type EventFilter = Box<dyn Fn(&EngineEvent) -> bool + Send + Sync>;

/// Receiving side of the bus with optional filtering.
pub struct EventStream {
    receiver: Receiver<EngineEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<EngineEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&EngineEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &EngineEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<EngineEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Blocking variant of [`EventStream::recv`] for threads outside an async
    /// runtime. Panics if called from within one, like tokio's own.
    pub fn blocking_recv(&mut self) -> Result<EngineEvent, RecvError> {
        loop {
            let event = self.receiver.blocking_recv()?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Returns the next matching event without blocking.
    pub fn try_recv(&mut self) -> Result<EngineEvent, TryRecvError> {
        loop {
            let event = self.receiver.try_recv()?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Drains every buffered matching event, skipping over lag gaps.
    pub fn drain(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        loop {
            match self.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return events,
            }
        }
    }
}
