//! Pooled frames and the leases consumers hold on them.

use crate::cache::{CacheMsg, RecycleNote};
use bridge_traits::{FrameBuffer, FrameKind};
use core_actor::ActorRef;
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::sync::Arc;

/// Contents of one pool slot.
#[derive(Debug, Default)]
pub struct FrameData {
    pub seq: u64,
    pub buffer: FrameBuffer,
}

/// One pre-allocated pool slot.
///
/// Allocated once when the pool is built and shared by `Arc` for the life of
/// the media session. The lock is only written by the fetcher while the owning
/// block is `fetching`, so readers holding a lease never contend with it.
#[derive(Debug)]
pub struct CachedFrame {
    slot: usize,
    offset: usize,
    data: RwLock<FrameData>,
}

impl CachedFrame {
    pub(crate) fn new(slot: usize, offset: usize) -> Self {
        Self {
            slot,
            offset,
            data: RwLock::new(FrameData::default()),
        }
    }

    /// Index of the owning cache block slot.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Position inside the owning block.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn read(&self) -> RwLockReadGuard<'_, FrameData> {
        self.data.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, FrameData> {
        self.data.write()
    }
}

/// One counted usage of a cached frame.
///
/// Dropping the lease returns the usage to the frame cache. A lease can never
/// be recycled twice and never outlives the generation of the block it was
/// granted from.
pub struct FrameLease {
    frame: Arc<CachedFrame>,
    seq: u64,
    generation: u64,
    cache: ActorRef<CacheMsg>,
}

impl FrameLease {
    pub(crate) fn new(
        frame: Arc<CachedFrame>,
        seq: u64,
        generation: u64,
        cache: ActorRef<CacheMsg>,
    ) -> Self {
        Self {
            frame,
            seq,
            generation,
            cache,
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Borrow the decoded buffer.
    pub fn read(&self) -> MappedRwLockReadGuard<'_, FrameBuffer> {
        RwLockReadGuard::map(self.frame.read(), |data| &data.buffer)
    }

    pub fn kind(&self) -> FrameKind {
        self.read().kind()
    }

    pub fn has_audio(&self) -> bool {
        self.read().audio.is_some()
    }

    pub fn has_video(&self) -> bool {
        self.read().video.is_some()
    }

    pub fn is_end_of_media(&self) -> bool {
        self.read().end_of_media
    }

    /// Whether both leases point at the same pooled frame.
    pub fn shares_frame_with(&self, other: &FrameLease) -> bool {
        Arc::ptr_eq(&self.frame, &other.frame)
    }
}

impl fmt::Debug for FrameLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameLease")
            .field("seq", &self.seq)
            .field("slot", &self.frame.slot())
            .field("offset", &self.frame.offset())
            .field("generation", &self.generation)
            .finish()
    }
}

impl Drop for FrameLease {
    fn drop(&mut self) {
        self.cache.send(CacheMsg::Recycle(RecycleNote {
            slot: self.frame.slot(),
            offset: self.frame.offset(),
            generation: self.generation,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_actor::mailbox;
    use std::time::Duration;

    #[test]
    fn test_drop_sends_recycle() {
        let (cache, inbox) = mailbox::<CacheMsg>("cache");
        let frame = Arc::new(CachedFrame::new(3, 1));
        frame.write().buffer.set_audio(&[1, 2, 3, 4]);

        let lease = FrameLease::new(Arc::clone(&frame), 7, 2, cache);
        assert_eq!(lease.seq(), 7);
        assert!(lease.has_audio());
        assert!(!lease.has_video());
        assert_eq!(lease.kind(), FrameKind::Audio);
        drop(lease);

        match inbox.recv_timeout(Duration::from_secs(1)) {
            Some(CacheMsg::Recycle(note)) => {
                assert_eq!(note.slot, 3);
                assert_eq!(note.offset, 1);
                assert_eq!(note.generation, 2);
            }
            _ => panic!("expected a recycle note"),
        }
    }

    #[test]
    fn test_shared_frame_identity() {
        let (cache, _inbox) = mailbox::<CacheMsg>("cache");
        let frame = Arc::new(CachedFrame::new(0, 0));
        let a = FrameLease::new(Arc::clone(&frame), 0, 1, cache.clone());
        let b = FrameLease::new(Arc::clone(&frame), 0, 1, cache.clone());
        let other = FrameLease::new(Arc::new(CachedFrame::new(0, 1)), 1, 1, cache);
        assert!(a.shares_frame_with(&b));
        assert!(!a.shares_frame_with(&other));
    }
}
