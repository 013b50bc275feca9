//! Outward-facing listener registry.
//!
//! Listeners are called on the controller thread in registration order. A
//! panicking listener is logged and skipped; delivery to the others and to
//! later notifications continues.

use bridge_traits::SurfaceId;
use core_actor::panic_message;
use core_runtime::PlaybackState;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tracing::error;

/// Position broadcast on every tick that moved the position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionUpdate {
    pub position: Duration,
    /// Loop start, or the media start without loop bounds.
    pub min: Duration,
    /// Loop end, or the media end without loop bounds.
    pub max: Duration,
}

pub type PositionListener = Box<dyn FnMut(PositionUpdate) + Send>;
pub type StateListener = Box<dyn FnMut(PlaybackState) + Send>;
pub type SurfaceListener = Box<dyn FnMut(Option<SurfaceId>) + Send>;

/// A listener of any kind, as sent to the controller.
pub enum Listener {
    Position(PositionListener),
    State(StateListener),
    Surface(SurfaceListener),
}

#[derive(Default)]
pub struct Listeners {
    position: Vec<PositionListener>,
    state: Vec<StateListener>,
    surface: Vec<SurfaceListener>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: Listener) {
        match listener {
            Listener::Position(l) => self.position.push(l),
            Listener::State(l) => self.state.push(l),
            Listener::Surface(l) => self.surface.push(l),
        }
    }

    pub fn len(&self) -> usize {
        self.position.len() + self.state.len() + self.surface.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn notify_position(&mut self, update: PositionUpdate) {
        for (index, listener) in self.position.iter_mut().enumerate() {
            isolate("position", index, || listener(update));
        }
    }

    pub fn notify_state(&mut self, state: PlaybackState) {
        for (index, listener) in self.state.iter_mut().enumerate() {
            isolate("state", index, || listener(state));
        }
    }

    pub fn notify_surface(&mut self, surface: Option<SurfaceId>) {
        for (index, listener) in self.surface.iter_mut().enumerate() {
            isolate("surface", index, || listener(surface));
        }
    }
}

fn isolate(kind: &str, index: usize, deliver: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(deliver)) {
        error!(
            listener = kind,
            index,
            panic = %panic_message(payload.as_ref()),
            "Listener panicked"
        );
    }
}
