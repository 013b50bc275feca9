//! The frame pool: slot states, usage counters and eviction.
//!
//! `FramePool` is plain data with no threads or channels. The
//! [`FrameCache`](super::FrameCache) actor owns the only instance, so every
//! block and frame state transition is serialized through its mailbox.
//! Pending reply targets are stored as an opaque `W`, which keeps the pool
//! testable without an actor system.
//!
//! Block lifecycle:
//!
//! ```text
//!           acquire / prefetch              fill ok
//!  empty ───────────────────────> fetching ──────────> cached <──┐
//!    ^                               │                  │  ^     │ last
//!    └──────── fill failed ──────────┘          acquire │  │     │ recycle
//!                                                       v  │     │
//!  cached (least recently released) ── evict ──>     in-use ─────┘
//!  becomes fetching for another range
//! ```

use super::stats::CacheStats;
use crate::error::PlaybackError;
use crate::frame::CachedFrame;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifecycle state of a cache block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockState {
    Empty,
    Fetching,
    Cached,
    InUse,
}

/// A request waiting for a block.
#[derive(Debug)]
struct Waiter<W> {
    seq: u64,
    usage_count: u32,
    target: W,
}

#[derive(Debug)]
struct Block<W> {
    state: BlockState,
    block_id: Option<u64>,
    /// Bumped every time the slot starts a fill.
    generation: u64,
    frames: Vec<Arc<CachedFrame>>,
    usage: Vec<u32>,
    frames_in_use: usize,
    waiters: Vec<Waiter<W>>,
    fill_started: Option<Instant>,
}

/// Usage granted on one frame.
#[derive(Debug, Clone)]
pub struct Grant {
    pub seq: u64,
    pub usage_count: u32,
    pub generation: u64,
    pub frame: Arc<CachedFrame>,
}

/// Instruction to fill a block that just moved to `fetching`.
#[derive(Debug, Clone)]
pub struct FetchOrder {
    pub slot: usize,
    pub generation: u64,
    pub block_id: u64,
    pub base_seq: u64,
    pub frames: Vec<Arc<CachedFrame>>,
}

/// Result of a consumer request.
#[derive(Debug)]
pub enum Acquire<W> {
    /// The frame was available; the target is handed back for the reply.
    Granted(Grant, W),
    /// The block is already being filled; the request waits on it.
    Waiting,
    /// The block must be filled; the request waits on it.
    Fetch(FetchOrder),
    /// Try-only request and no free block.
    Rejected(W),
    /// Every block is in use or being filled; retried after the next release.
    Parked,
}

/// Result of a prefetch.
#[derive(Debug)]
pub enum Prefetch {
    /// Block already present; its recency was refreshed when evictable.
    Present,
    Fetch(FetchOrder),
    Rejected,
}

/// How a fill ended, with the reply targets that were waiting on it.
#[derive(Debug)]
pub enum FillOutcome<W> {
    Ready(Vec<(Grant, W)>),
    Failed(Vec<W>),
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    waits: u64,
    rejected_requests: u64,
    prefetches: u64,
    rejected_prefetches: u64,
    fills: u64,
    failed_fills: u64,
    evictions: u64,
    total_fill_time: Duration,
}

/// Fixed pool of `N` frames grouped into blocks of `B`.
pub struct FramePool<W> {
    block_size: usize,
    blocks: Vec<Block<W>>,
    /// block id -> slot, for every block that is not empty.
    index: HashMap<u64, usize>,
    /// Cached blocks with no leased frame, least recently released first.
    evictable: LruCache<usize, ()>,
    parked: VecDeque<Waiter<W>>,
    counters: Counters,
}

impl<W> FramePool<W> {
    /// Allocate every frame the session will ever use.
    ///
    /// `pool_size` is rounded down to a whole number of blocks.
    pub fn new(pool_size: usize, block_size: usize) -> Self {
        let block_size = block_size.max(1);
        let block_count = (pool_size / block_size).max(1);
        let blocks = (0..block_count)
            .map(|slot| Block {
                state: BlockState::Empty,
                block_id: None,
                generation: 0,
                frames: (0..block_size)
                    .map(|offset| Arc::new(CachedFrame::new(slot, offset)))
                    .collect(),
                usage: vec![0; block_size],
                frames_in_use: 0,
                waiters: Vec::new(),
                fill_started: None,
            })
            .collect();

        Self {
            block_size,
            blocks,
            index: HashMap::new(),
            evictable: LruCache::unbounded(),
            parked: VecDeque::new(),
            counters: Counters::default(),
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn pool_size(&self) -> usize {
        self.blocks.len() * self.block_size
    }

    /// Block id and offset of `seq`.
    pub fn locate(&self, seq: u64) -> (u64, usize) {
        let block_size = self.block_size as u64;
        (seq / block_size, (seq % block_size) as usize)
    }

    pub fn block_state(&self, slot: usize) -> Option<BlockState> {
        self.blocks.get(slot).map(|block| block.state)
    }

    /// Slot currently holding `block_id`, if any.
    pub fn slot_of(&self, block_id: u64) -> Option<usize> {
        self.index.get(&block_id).copied()
    }

    /// Usage counter of the frame holding `seq`, zero when absent.
    pub fn usage_of(&self, seq: u64) -> u32 {
        let (block_id, offset) = self.locate(seq);
        self.slot_of(block_id)
            .map(|slot| self.blocks[slot].usage[offset])
            .unwrap_or(0)
    }

    /// Request `usage_count` usages of frame `seq`.
    pub fn acquire(
        &mut self,
        seq: u64,
        usage_count: u32,
        only_if_free: bool,
        target: W,
    ) -> Result<Acquire<W>, PlaybackError> {
        let usage_count = usage_count.max(1);
        let (block_id, _) = self.locate(seq);
        let waiter = Waiter {
            seq,
            usage_count,
            target,
        };

        let outcome = if let Some(slot) = self.slot_of(block_id) {
            match self.blocks[slot].state {
                BlockState::Fetching => {
                    self.counters.waits += 1;
                    self.blocks[slot].waiters.push(waiter);
                    Acquire::Waiting
                }
                BlockState::Cached | BlockState::InUse => {
                    self.counters.hits += 1;
                    let grant = self.grant(slot, seq, usage_count);
                    Acquire::Granted(grant, waiter.target)
                }
                BlockState::Empty => {
                    return Err(PlaybackError::InvariantViolation(format!(
                        "block {} is indexed at empty slot {}",
                        block_id, slot
                    )));
                }
            }
        } else {
            match self.claim_slot(only_if_free) {
                Some(slot) => {
                    self.counters.misses += 1;
                    let order = self.begin_fill(slot, block_id);
                    self.blocks[slot].waiters.push(waiter);
                    Acquire::Fetch(order)
                }
                None if only_if_free => {
                    self.counters.rejected_requests += 1;
                    Acquire::Rejected(waiter.target)
                }
                None => {
                    self.parked.push_back(waiter);
                    Acquire::Parked
                }
            }
        };

        self.debug_check();
        Ok(outcome)
    }

    /// Warm the block starting at `base_seq` without consuming it.
    pub fn prefetch(&mut self, base_seq: u64) -> Prefetch {
        let (block_id, _) = self.locate(base_seq);
        if let Some(slot) = self.slot_of(block_id) {
            if self.blocks[slot].state == BlockState::Cached {
                self.evictable.promote(&slot);
            }
            return Prefetch::Present;
        }

        match self.claim_slot(true) {
            Some(slot) => {
                self.counters.prefetches += 1;
                let order = self.begin_fill(slot, block_id);
                self.debug_check();
                Prefetch::Fetch(order)
            }
            None => {
                self.counters.rejected_prefetches += 1;
                Prefetch::Rejected
            }
        }
    }

    /// Record the end of a fill.
    ///
    /// On success every waiter is granted. On failure the slot returns to
    /// `empty` and the waiters are handed back unanswered.
    pub fn complete_fill(
        &mut self,
        slot: usize,
        generation: u64,
        succeeded: bool,
    ) -> Result<FillOutcome<W>, PlaybackError> {
        let block = self.blocks.get_mut(slot).ok_or_else(|| {
            PlaybackError::InvariantViolation(format!("fill reported for unknown slot {}", slot))
        })?;
        if block.state != BlockState::Fetching || block.generation != generation {
            return Err(PlaybackError::InvariantViolation(format!(
                "fill reported for slot {} generation {} while it is {:?} at generation {}",
                slot, generation, block.state, block.generation
            )));
        }

        if let Some(started) = block.fill_started.take() {
            self.counters.total_fill_time += started.elapsed();
        }
        let waiters = std::mem::take(&mut block.waiters);

        let outcome = if succeeded {
            self.counters.fills += 1;
            block.state = BlockState::Cached;
            let grants = waiters
                .into_iter()
                .map(|waiter| (self.grant(slot, waiter.seq, waiter.usage_count), waiter.target))
                .collect();
            if self.blocks[slot].frames_in_use == 0 {
                self.evictable.put(slot, ());
            }
            FillOutcome::Ready(grants)
        } else {
            self.counters.failed_fills += 1;
            if let Some(block_id) = block.block_id.take() {
                self.index.remove(&block_id);
            }
            block.state = BlockState::Empty;
            FillOutcome::Failed(waiters.into_iter().map(|waiter| waiter.target).collect())
        };

        self.debug_check();
        Ok(outcome)
    }

    /// Return one usage of the frame at `offset` in `slot`.
    ///
    /// Returns `true` when the block became evictable.
    pub fn recycle(
        &mut self,
        slot: usize,
        offset: usize,
        generation: u64,
    ) -> Result<bool, PlaybackError> {
        let block = self.blocks.get_mut(slot).ok_or_else(|| {
            PlaybackError::InvariantViolation(format!("recycle for unknown slot {}", slot))
        })?;
        if block.generation != generation {
            return Err(PlaybackError::InvariantViolation(format!(
                "recycle for slot {} generation {} but the slot is at generation {}",
                slot, generation, block.generation
            )));
        }
        let usage = block.usage.get_mut(offset).ok_or_else(|| {
            PlaybackError::InvariantViolation(format!("recycle for unknown offset {}", offset))
        })?;
        if *usage == 0 || block.state != BlockState::InUse {
            return Err(PlaybackError::InvariantViolation(format!(
                "surplus recycle of slot {} offset {} (block {:?})",
                slot, offset, block.state
            )));
        }

        *usage -= 1;
        if *usage > 0 {
            return Ok(false);
        }
        block.frames_in_use -= 1;
        if block.frames_in_use > 0 {
            return Ok(false);
        }
        block.state = BlockState::Cached;
        self.evictable.put(slot, ());
        self.debug_check();
        Ok(true)
    }

    /// Retry parked consumer requests in arrival order.
    ///
    /// Requests that still find no block are parked again.
    pub fn retry_parked(&mut self) -> Result<Vec<Acquire<W>>, PlaybackError> {
        if self.parked.is_empty() || !self.has_claimable_slot() {
            return Ok(Vec::new());
        }
        let parked = std::mem::take(&mut self.parked);
        let mut outcomes = Vec::new();
        for waiter in parked {
            match self.acquire(waiter.seq, waiter.usage_count, false, waiter.target)? {
                Acquire::Parked => {}
                outcome => outcomes.push(outcome),
            }
        }
        Ok(outcomes)
    }

    /// Drop every pending reply target: waiters on fills and parked requests.
    pub fn drain_pending(&mut self) -> Vec<W> {
        let mut targets: Vec<W> = self.parked.drain(..).map(|waiter| waiter.target).collect();
        for block in &mut self.blocks {
            targets.extend(block.waiters.drain(..).map(|waiter| waiter.target));
        }
        targets
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            pool_size: self.pool_size(),
            block_size: self.block_size,
            parked_requests: self.parked.len(),
            hits: self.counters.hits,
            misses: self.counters.misses,
            waits: self.counters.waits,
            rejected_requests: self.counters.rejected_requests,
            prefetches: self.counters.prefetches,
            rejected_prefetches: self.counters.rejected_prefetches,
            fills: self.counters.fills,
            failed_fills: self.counters.failed_fills,
            evictions: self.counters.evictions,
            total_fill_time: self.counters.total_fill_time,
            invariant_violation: self.check_invariants().err(),
            ..Default::default()
        };
        for block in &self.blocks {
            match block.state {
                BlockState::Empty => stats.empty_blocks += 1,
                BlockState::Fetching => stats.fetching_blocks += 1,
                BlockState::Cached => stats.cached_blocks += 1,
                BlockState::InUse => stats.in_use_blocks += 1,
            }
            stats.frames_in_use += block.frames_in_use;
            stats.outstanding_leases += block.usage.iter().map(|&u| u as u64).sum::<u64>();
        }
        stats
    }

    /// Cross-check every piece of bookkeeping.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut indexed = 0;
        for (slot, block) in self.blocks.iter().enumerate() {
            let counted = block.usage.iter().filter(|&&u| u > 0).count();
            if counted != block.frames_in_use {
                return Err(format!(
                    "slot {} counts {} frames in use but usage shows {}",
                    slot, block.frames_in_use, counted
                ));
            }
            if (block.state == BlockState::InUse) != (block.frames_in_use > 0) {
                return Err(format!(
                    "slot {} is {:?} with {} frames in use",
                    slot, block.state, block.frames_in_use
                ));
            }
            if (block.state == BlockState::Cached) != self.evictable.contains(&slot) {
                return Err(format!("slot {} is {:?} but eviction list disagrees", slot, block.state));
            }
            if !block.waiters.is_empty() && block.state != BlockState::Fetching {
                return Err(format!("slot {} has waiters while {:?}", slot, block.state));
            }
            match (block.state, block.block_id) {
                (BlockState::Empty, None) => {}
                (BlockState::Empty, Some(id)) => {
                    return Err(format!("empty slot {} still names block {}", slot, id));
                }
                (state, None) => return Err(format!("{:?} slot {} has no block id", state, slot)),
                (_, Some(id)) => {
                    indexed += 1;
                    if self.index.get(&id) != Some(&slot) {
                        return Err(format!("block {} is not indexed at slot {}", id, slot));
                    }
                }
            }
        }
        if indexed != self.index.len() {
            return Err(format!(
                "index holds {} blocks but {} slots are occupied",
                self.index.len(),
                indexed
            ));
        }
        Ok(())
    }

    fn debug_check(&self) {
        #[cfg(debug_assertions)]
        if let Err(problem) = self.check_invariants() {
            panic!("frame pool corrupted: {}", problem);
        }
    }

    fn has_claimable_slot(&self) -> bool {
        !self.evictable.is_empty() || self.blocks.iter().any(|b| b.state == BlockState::Empty)
    }

    /// An empty slot, or with `only_if_free == false` the least recently
    /// released evictable one.
    fn claim_slot(&mut self, only_if_free: bool) -> Option<usize> {
        if let Some(slot) = self.blocks.iter().position(|b| b.state == BlockState::Empty) {
            return Some(slot);
        }
        if only_if_free {
            return None;
        }

        let (slot, ()) = self.evictable.pop_lru()?;
        let block = &mut self.blocks[slot];
        if let Some(old) = block.block_id.take() {
            self.index.remove(&old);
        }
        block.state = BlockState::Empty;
        self.counters.evictions += 1;
        Some(slot)
    }

    fn begin_fill(&mut self, slot: usize, block_id: u64) -> FetchOrder {
        let block = &mut self.blocks[slot];
        block.state = BlockState::Fetching;
        block.block_id = Some(block_id);
        block.generation += 1;
        block.fill_started = Some(Instant::now());
        self.index.insert(block_id, slot);

        FetchOrder {
            slot,
            generation: block.generation,
            block_id,
            base_seq: block_id * self.block_size as u64,
            frames: block.frames.clone(),
        }
    }

    fn grant(&mut self, slot: usize, seq: u64, usage_count: u32) -> Grant {
        let (_, offset) = self.locate(seq);
        let block = &mut self.blocks[slot];
        if block.usage[offset] == 0 {
            block.frames_in_use += 1;
        }
        block.usage[offset] += usage_count;
        if block.state == BlockState::Cached {
            self.evictable.pop(&slot);
        }
        block.state = BlockState::InUse;

        Grant {
            seq,
            usage_count,
            generation: block.generation,
            frame: Arc::clone(&block.frames[offset]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Pool = FramePool<&'static str>;

    fn fetch_order(outcome: Acquire<&'static str>) -> FetchOrder {
        match outcome {
            Acquire::Fetch(order) => order,
            other => panic!("expected a fetch, got {:?}", other),
        }
    }

    fn ready(outcome: FillOutcome<&'static str>) -> Vec<(Grant, &'static str)> {
        match outcome {
            FillOutcome::Ready(grants) => grants,
            FillOutcome::Failed(_) => panic!("expected a successful fill"),
        }
    }

    #[test]
    fn test_locate() {
        let pool = Pool::new(64, 8);
        assert_eq!(pool.block_count(), 8);
        assert_eq!(pool.locate(0), (0, 0));
        assert_eq!(pool.locate(7), (0, 7));
        assert_eq!(pool.locate(249), (31, 1));
    }

    #[test]
    fn test_miss_fill_then_hit() {
        let mut pool = Pool::new(8, 2);

        let order = fetch_order(pool.acquire(5, 1, false, "first").unwrap());
        assert_eq!(order.block_id, 2);
        assert_eq!(order.base_seq, 4);
        assert_eq!(order.frames.len(), 2);
        assert_eq!(pool.block_state(order.slot), Some(BlockState::Fetching));

        // Second request on the same block waits for the running fill.
        assert!(matches!(pool.acquire(4, 1, false, "second").unwrap(), Acquire::Waiting));

        let grants = ready(pool.complete_fill(order.slot, order.generation, true).unwrap());
        assert_eq!(grants.len(), 2);
        assert_eq!(grants[0].1, "first");
        assert_eq!(grants[0].0.seq, 5);
        assert_eq!(pool.block_state(order.slot), Some(BlockState::InUse));

        match pool.acquire(5, 2, false, "third").unwrap() {
            Acquire::Granted(grant, target) => {
                assert_eq!(target, "third");
                assert!(Arc::ptr_eq(&grant.frame, &grants[0].0.frame));
            }
            other => panic!("expected a hit, got {:?}", other),
        }
        assert_eq!(pool.usage_of(5), 3);
        assert_eq!(pool.usage_of(4), 1);

        let stats = pool.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.waits, 1);
        assert_eq!(stats.outstanding_leases, 4);
    }

    #[test]
    fn test_block_becomes_evictable_after_last_recycle() {
        let mut pool = Pool::new(8, 2);
        let order = fetch_order(pool.acquire(0, 2, false, "a").unwrap());
        let generation = order.generation;
        ready(pool.complete_fill(order.slot, generation, true).unwrap());

        assert!(!pool.recycle(order.slot, 0, generation).unwrap());
        assert_eq!(pool.block_state(order.slot), Some(BlockState::InUse));
        assert!(pool.recycle(order.slot, 0, generation).unwrap());
        assert_eq!(pool.block_state(order.slot), Some(BlockState::Cached));
    }

    #[test]
    fn test_surplus_recycle_is_an_invariant_violation() {
        let mut pool = Pool::new(8, 2);
        let order = fetch_order(pool.acquire(0, 1, false, "a").unwrap());
        ready(pool.complete_fill(order.slot, order.generation, true).unwrap());
        pool.recycle(order.slot, 0, order.generation).unwrap();

        let err = pool.recycle(order.slot, 0, order.generation).unwrap_err();
        assert!(err.is_fatal());
        assert!(pool.recycle(order.slot, 0, order.generation + 1).is_err());
        assert!(pool.recycle(99, 0, 1).is_err());
    }

    #[test]
    fn test_eviction_picks_least_recently_released() {
        let mut pool = Pool::new(4, 2);
        let first = fetch_order(pool.acquire(0, 1, false, "a").unwrap());
        ready(pool.complete_fill(first.slot, first.generation, true).unwrap());
        let second = fetch_order(pool.acquire(2, 1, false, "b").unwrap());
        ready(pool.complete_fill(second.slot, second.generation, true).unwrap());

        pool.recycle(second.slot, 0, second.generation).unwrap();
        pool.recycle(first.slot, 0, first.generation).unwrap();

        // Block 1 (seq 2..3) was released first, so it goes first.
        let third = fetch_order(pool.acquire(4, 1, false, "c").unwrap());
        assert_eq!(third.slot, second.slot);
        assert_eq!(third.generation, second.generation + 1);
        assert_eq!(pool.slot_of(1), None);
        assert_eq!(pool.slot_of(0), Some(first.slot));
        assert_eq!(pool.stats().evictions, 1);
    }

    #[test]
    fn test_in_use_blocks_are_never_evicted() {
        let mut pool = Pool::new(4, 2);
        let first = fetch_order(pool.acquire(0, 1, false, "a").unwrap());
        ready(pool.complete_fill(first.slot, first.generation, true).unwrap());
        let second = fetch_order(pool.acquire(2, 1, false, "b").unwrap());
        ready(pool.complete_fill(second.slot, second.generation, true).unwrap());

        assert!(matches!(pool.acquire(4, 1, false, "c").unwrap(), Acquire::Parked));
        assert!(matches!(pool.acquire(6, 1, true, "d").unwrap(), Acquire::Rejected("d")));
        assert_eq!(pool.stats().parked_requests, 1);
        assert!(pool.retry_parked().unwrap().is_empty());

        pool.recycle(first.slot, 0, first.generation).unwrap();
        let retried = pool.retry_parked().unwrap();
        assert_eq!(retried.len(), 1);
        match &retried[0] {
            Acquire::Fetch(order) => {
                assert_eq!(order.slot, first.slot);
                assert_eq!(order.base_seq, 4);
            }
            other => panic!("expected a fetch, got {:?}", other),
        }
        assert_eq!(pool.stats().parked_requests, 0);
    }

    #[test]
    fn test_prefetch_only_uses_empty_slots() {
        let mut pool = Pool::new(4, 2);
        let order = match pool.prefetch(8) {
            Prefetch::Fetch(order) => order,
            other => panic!("expected a prefetch fill, got {:?}", other),
        };
        assert_eq!(order.block_id, 4);
        assert!(ready(pool.complete_fill(order.slot, order.generation, true).unwrap()).is_empty());
        assert_eq!(pool.block_state(order.slot), Some(BlockState::Cached));

        assert!(matches!(pool.prefetch(9), Prefetch::Present));
        assert!(matches!(pool.prefetch(0), Prefetch::Fetch(_)));
        // Both slots are taken; the cached one is not reclaimed for a prefetch.
        assert!(matches!(pool.prefetch(20), Prefetch::Rejected));

        let stats = pool.stats();
        assert_eq!(stats.prefetches, 2);
        assert_eq!(stats.rejected_prefetches, 1);
    }

    #[test]
    fn test_failed_fill_empties_the_slot() {
        let mut pool = Pool::new(4, 2);
        let order = fetch_order(pool.acquire(0, 1, false, "a").unwrap());
        assert!(matches!(pool.acquire(1, 1, false, "b").unwrap(), Acquire::Waiting));

        match pool.complete_fill(order.slot, order.generation, false).unwrap() {
            FillOutcome::Failed(targets) => assert_eq!(targets, vec!["a", "b"]),
            FillOutcome::Ready(_) => panic!("fill should have failed"),
        }
        assert_eq!(pool.block_state(order.slot), Some(BlockState::Empty));
        assert_eq!(pool.slot_of(0), None);
        assert_eq!(pool.stats().failed_fills, 1);

        // A stale report for the same generation is rejected.
        assert!(pool.complete_fill(order.slot, order.generation, true).is_err());
    }

    #[test]
    fn test_drain_pending() {
        let mut pool = Pool::new(2, 2);
        let order = fetch_order(pool.acquire(0, 1, false, "a").unwrap());
        ready(pool.complete_fill(order.slot, order.generation, true).unwrap());
        assert!(matches!(pool.acquire(2, 1, false, "parked").unwrap(), Acquire::Parked));

        assert_eq!(pool.drain_pending(), vec!["parked"]);
        assert!(pool.check_invariants().is_ok());
    }
}
