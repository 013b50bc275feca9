//! The frame currently on screen.
//!
//! `VideoOutput` is handed explicitly to whoever renders: the controller
//! presents frames into it and display surfaces pull from it when they
//! repaint. It holds the lease of the presented frame, so that frame cannot
//! be recycled while a surface may still read it.

use crate::frame::FrameLease;
use bridge_traits::{FrameSource, VideoImage};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Inner {
    current: Mutex<Option<FrameLease>>,
    presented: AtomicU64,
}

/// Shared handle to the presented frame. Clones share state.
#[derive(Clone, Default)]
pub struct VideoOutput {
    inner: Arc<Inner>,
}

impl VideoOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `lease`, returning the previously shown lease.
    ///
    /// The caller drops the returned lease outside the lock.
    pub fn present(&self, lease: FrameLease) -> Option<FrameLease> {
        let previous = self.inner.current.lock().replace(lease);
        self.inner.presented.fetch_add(1, Ordering::Relaxed);
        previous
    }

    /// Remove the presented frame, e.g. when media is replaced.
    pub fn clear(&self) -> Option<FrameLease> {
        self.inner.current.lock().take()
    }

    /// Sequence number of the frame on screen.
    pub fn current_seq(&self) -> Option<u64> {
        self.inner.current.lock().as_ref().map(FrameLease::seq)
    }

    pub fn frames_presented(&self) -> u64 {
        self.inner.presented.load(Ordering::Relaxed)
    }

    /// This output as the source a display surface pulls from.
    pub fn source(&self) -> Arc<dyn FrameSource> {
        Arc::new(self.clone())
    }
}

impl FrameSource for VideoOutput {
    fn with_latest_image(&self, f: &mut dyn FnMut(&VideoImage)) -> bool {
        let current = self.inner.current.lock();
        let Some(lease) = current.as_ref() else {
            return false;
        };
        let buffer = lease.read();
        match buffer.video.as_ref() {
            Some(image) => {
                f(image);
                true
            }
            None => false,
        }
    }
}
