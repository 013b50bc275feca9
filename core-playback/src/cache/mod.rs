//! # Frame Cache
//!
//! Keeps a sliding window of decoded frames around the playback position so
//! normal playback never waits on the decoder, while never holding more than
//! the pool's `N` buffers.
//!
//! ## Overview
//!
//! The cache is an actor wrapping a [`FramePool`]. Consumers send
//! [`CacheMsg::Acquire`] and receive [`FrameLease`]s; dropping a lease sends
//! [`CacheMsg::Recycle`] back. Missing blocks are filled by the
//! [`FrameFetcher`](crate::fetcher::FrameFetcher), which answers with
//! [`CacheMsg::Filled`].
//!
//! ```text
//!  Controller ──Acquire──> ┌────────────┐ ──Fill──> ┌──────────────┐
//!  engine     ──Prefetch─> │ FrameCache │           │ FrameFetcher │
//!  FrameLease ──Recycle──> │ (FramePool)│ <─Filled─ └──────────────┘
//!                          └────────────┘
//! ```
//!
//! ## Backpressure
//!
//! A request with `only_if_free` fails with [`FrameReply::NoFreeResources`]
//! when no empty block exists. Other requests that find every block in use
//! are parked and retried whenever a block is released or a fill ends.

pub mod pool;
pub mod stats;

pub use pool::{BlockState, FramePool};
pub use stats::CacheStats;

use crate::fetcher::{FetcherMsg, FillReport, FillRequest};
use crate::frame::FrameLease;
use core_actor::{Actor, ActorError, ActorRef, Context, ReplyTo};
use pool::{Acquire, FetchOrder, FillOutcome, Grant, Prefetch};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Request for `usage_count` leases on frame `seq`.
pub struct FrameRequest {
    pub seq: u64,
    pub usage_count: u32,
    /// Fail instead of evicting or waiting for a block.
    pub only_if_free: bool,
    pub reply: ReplyTo<FrameReply>,
}

/// Answer to a [`FrameRequest`].
#[derive(Debug)]
pub enum FrameReply {
    /// One lease per requested usage, all on the same frame.
    Ready(Vec<FrameLease>),
    NoFreeResources,
}

/// Identifies the usage a dropped lease returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecycleNote {
    pub slot: usize,
    pub offset: usize,
    pub generation: u64,
}

/// Frame cache mailbox protocol.
pub enum CacheMsg {
    Acquire(FrameRequest),
    /// Warm the block containing `base_seq` if a free block exists.
    Prefetch { base_seq: u64 },
    Recycle(RecycleNote),
    Filled(FillReport),
    Stats(ReplyTo<CacheStats>),
}

impl fmt::Debug for CacheMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheMsg::Acquire(request) => f
                .debug_struct("Acquire")
                .field("seq", &request.seq)
                .field("usage_count", &request.usage_count)
                .field("only_if_free", &request.only_if_free)
                .finish(),
            CacheMsg::Prefetch { base_seq } => {
                f.debug_struct("Prefetch").field("base_seq", base_seq).finish()
            }
            CacheMsg::Recycle(note) => f.debug_tuple("Recycle").field(note).finish(),
            CacheMsg::Filled(report) => f.debug_tuple("Filled").field(report).finish(),
            CacheMsg::Stats(_) => f.write_str("Stats"),
        }
    }
}

/// The frame cache actor.
pub struct FrameCache {
    pool: FramePool<ReplyTo<FrameReply>>,
    fetcher: ActorRef<FetcherMsg>,
}

impl FrameCache {
    pub fn new(pool_size: usize, block_size: usize, fetcher: ActorRef<FetcherMsg>) -> Self {
        Self {
            pool: FramePool::new(pool_size, block_size),
            fetcher,
        }
    }

    fn acquire(
        &mut self,
        request: FrameRequest,
        myself: &ActorRef<CacheMsg>,
    ) -> Result<(), ActorError> {
        let FrameRequest {
            seq,
            usage_count,
            only_if_free,
            reply,
        } = request;
        if usage_count == 0 {
            warn!(seq, "Frame request for zero usages treated as one");
        }
        let outcome = self.pool.acquire(seq, usage_count, only_if_free, reply)?;
        self.handle(outcome, myself);
        Ok(())
    }

    fn handle(&mut self, outcome: Acquire<ReplyTo<FrameReply>>, myself: &ActorRef<CacheMsg>) {
        match outcome {
            Acquire::Granted(grant, reply) => reply.reply(FrameReply::Ready(leases(grant, myself))),
            Acquire::Fetch(order) => self.dispatch(order, myself),
            Acquire::Rejected(reply) => reply.reply(FrameReply::NoFreeResources),
            Acquire::Waiting => {}
            Acquire::Parked => trace!("Frame request parked until a block is released"),
        }
    }

    fn dispatch(&self, order: FetchOrder, myself: &ActorRef<CacheMsg>) {
        debug!(
            block = order.block_id,
            slot = order.slot,
            generation = order.generation,
            "Dispatching block fill"
        );
        let reply = ReplyTo::actor(myself.clone(), CacheMsg::Filled);
        self.fetcher
            .send(FetcherMsg::Fill(FillRequest::new(order, reply)));
    }

    fn filled(&mut self, report: FillReport, myself: &ActorRef<CacheMsg>) -> Result<(), ActorError> {
        let outcome = self
            .pool
            .complete_fill(report.slot, report.generation, report.outcome.is_ok())?;
        match outcome {
            FillOutcome::Ready(grants) => {
                for (grant, reply) in grants {
                    reply.reply(FrameReply::Ready(leases(grant, myself)));
                }
            }
            FillOutcome::Failed(waiters) => {
                // Reply targets are dropped unanswered; requesters see a disconnect.
                warn!(
                    base_seq = report.base_seq,
                    waiters = waiters.len(),
                    "Block fill failed"
                );
            }
        }
        self.retry_parked(myself)
    }

    fn retry_parked(&mut self, myself: &ActorRef<CacheMsg>) -> Result<(), ActorError> {
        for outcome in self.pool.retry_parked()? {
            self.handle(outcome, myself);
        }
        Ok(())
    }
}

fn leases(grant: Grant, cache: &ActorRef<CacheMsg>) -> Vec<FrameLease> {
    (0..grant.usage_count)
        .map(|_| {
            FrameLease::new(
                Arc::clone(&grant.frame),
                grant.seq,
                grant.generation,
                cache.clone(),
            )
        })
        .collect()
}

impl Actor for FrameCache {
    type Message = CacheMsg;

    fn on_start(&mut self, _ctx: &Context<CacheMsg>) -> Result<(), ActorError> {
        info!(
            pool_size = self.pool.pool_size(),
            block_size = self.pool.block_size(),
            blocks = self.pool.block_count(),
            "Frame pool allocated"
        );
        Ok(())
    }

    fn on_message(&mut self, message: CacheMsg, ctx: &Context<CacheMsg>) -> Result<(), ActorError> {
        match message {
            CacheMsg::Acquire(request) => self.acquire(request, ctx.myself())?,
            CacheMsg::Prefetch { base_seq } => match self.pool.prefetch(base_seq) {
                Prefetch::Fetch(order) => self.dispatch(order, ctx.myself()),
                Prefetch::Present => {}
                Prefetch::Rejected => trace!(base_seq, "Prefetch rejected, no free block"),
            },
            CacheMsg::Recycle(note) => {
                if self.pool.recycle(note.slot, note.offset, note.generation)? {
                    self.retry_parked(ctx.myself())?;
                }
            }
            CacheMsg::Filled(report) => self.filled(report, ctx.myself())?,
            CacheMsg::Stats(reply) => reply.reply(self.pool.stats()),
        }
        Ok(())
    }

    fn on_stop(&mut self, _ctx: &Context<CacheMsg>) -> Result<(), ActorError> {
        let dropped = self.pool.drain_pending().len();
        let stats = self.pool.stats();
        info!(
            fills = stats.fills,
            evictions = stats.evictions,
            hit_rate = stats.hit_rate(),
            avg_fill_ms = stats.average_fill_time().as_millis() as u64,
            dropped_requests = dropped,
            "Frame cache stopped"
        );
        Ok(())
    }
}
