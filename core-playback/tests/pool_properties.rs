//! Property tests for the frame pool: random interleavings of acquire,
//! prefetch, fill completion and recycle never break its bookkeeping, and
//! releasing everything always returns the pool to an idle state.

use core_playback::cache::pool::{Acquire, FetchOrder, FillOutcome, Grant, Prefetch};
use core_playback::cache::FramePool;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Acquire { seq: u64, usage: u32, only_if_free: bool },
    Prefetch { base_seq: u64 },
    Complete { pick: usize, ok: bool },
    Recycle { pick: usize },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u64..48, 1u32..3, any::<bool>())
            .prop_map(|(seq, usage, only_if_free)| Op::Acquire { seq, usage, only_if_free }),
        1 => (0u64..48).prop_map(|base_seq| Op::Prefetch { base_seq }),
        3 => (any::<usize>(), prop::bool::weighted(0.9))
            .prop_map(|(pick, ok)| Op::Complete { pick, ok }),
        4 => any::<usize>().prop_map(|pick| Op::Recycle { pick }),
    ]
}

/// Outstanding state held by the pool's consumers.
#[derive(Default)]
struct Model {
    /// One entry per lease: (slot, offset, generation, seq).
    leases: Vec<(usize, usize, u64, u64)>,
    fills: Vec<FetchOrder>,
}

impl Model {
    fn granted(&mut self, grant: &Grant) {
        for _ in 0..grant.usage_count {
            self.leases.push((
                grant.frame.slot(),
                grant.frame.offset(),
                grant.generation,
                grant.seq,
            ));
        }
    }

    fn handle(&mut self, outcome: Acquire<u32>) {
        match outcome {
            Acquire::Granted(grant, _) => self.granted(&grant),
            Acquire::Fetch(order) => self.fills.push(order),
            Acquire::Waiting | Acquire::Parked | Acquire::Rejected(_) => {}
        }
    }

    fn complete(&mut self, pool: &mut FramePool<u32>, index: usize, ok: bool) {
        let order = self.fills.swap_remove(index);
        match pool.complete_fill(order.slot, order.generation, ok).unwrap() {
            FillOutcome::Ready(grants) => {
                for (grant, _) in &grants {
                    self.granted(grant);
                }
            }
            FillOutcome::Failed(_) => {}
        }
        self.retry(pool);
    }

    fn recycle(&mut self, pool: &mut FramePool<u32>, index: usize) {
        let (slot, offset, generation, _) = self.leases.swap_remove(index);
        pool.recycle(slot, offset, generation).unwrap();
        self.retry(pool);
    }

    fn retry(&mut self, pool: &mut FramePool<u32>) {
        for outcome in pool.retry_parked().unwrap() {
            self.handle(outcome);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_pool_bookkeeping_survives_any_interleaving(ops in prop::collection::vec(op(), 1..120)) {
        let mut pool: FramePool<u32> = FramePool::new(12, 3);
        let mut model = Model::default();

        for (tag, op) in ops.into_iter().enumerate() {
            match op {
                Op::Acquire { seq, usage, only_if_free } => {
                    let outcome = pool.acquire(seq, usage, only_if_free, tag as u32).unwrap();
                    model.handle(outcome);
                }
                Op::Prefetch { base_seq } => {
                    if let Prefetch::Fetch(order) = pool.prefetch(base_seq) {
                        model.fills.push(order);
                    }
                }
                Op::Complete { pick, ok } if !model.fills.is_empty() => {
                    let index = pick % model.fills.len();
                    model.complete(&mut pool, index, ok);
                }
                Op::Recycle { pick } if !model.leases.is_empty() => {
                    let index = pick % model.leases.len();
                    model.recycle(&mut pool, index);
                }
                _ => {}
            }

            prop_assert_eq!(pool.check_invariants(), Ok(()));
            let stats = pool.stats();
            prop_assert_eq!(stats.outstanding_leases, model.leases.len() as u64);
            prop_assert!(stats.frames_in_use <= pool.pool_size());
            prop_assert_eq!(stats.fetching_blocks, model.fills.len());
        }

        // Every lease must read the frame it was granted for.
        for &(slot, offset, _, seq) in &model.leases {
            prop_assert!(pool.usage_of(seq) > 0);
            prop_assert_eq!(pool.locate(seq).1, offset);
            prop_assert_eq!(pool.slot_of(pool.locate(seq).0), Some(slot));
        }

        // Drain: complete every fill, release every lease, repeat until idle.
        let mut rounds = 0;
        while !model.fills.is_empty() || !model.leases.is_empty() {
            while !model.fills.is_empty() {
                model.complete(&mut pool, 0, true);
            }
            while !model.leases.is_empty() {
                model.recycle(&mut pool, 0);
            }
            rounds += 1;
            prop_assert!(rounds < 1_000, "pool never drained");
        }

        let stats = pool.stats();
        prop_assert_eq!(pool.check_invariants(), Ok(()));
        prop_assert_eq!(stats.parked_requests, 0);
        prop_assert_eq!(stats.frames_in_use, 0);
        prop_assert_eq!(stats.in_use_blocks, 0);
        prop_assert_eq!(stats.fetching_blocks, 0);
        prop_assert!(stats.is_idle());
    }

    #[test]
    fn prop_evicts_least_recently_released(extra in 1u64..=4) {
        let mut pool: FramePool<u32> = FramePool::new(8, 2);
        let mut model = Model::default();

        // Fill all four blocks, release them in order 0..4.
        for block in 0..4u64 {
            model.handle(pool.acquire(block * 2, 1, false, 0).unwrap());
            model.complete(&mut pool, 0, true);
            model.recycle(&mut pool, 0);
        }

        // Each new block evicts the oldest release.
        for k in 0..extra {
            let seq = (10 + k) * 2;
            model.handle(pool.acquire(seq, 1, false, 0).unwrap());
            prop_assert_eq!(pool.slot_of(k), None);
            model.complete(&mut pool, 0, true);
            model.recycle(&mut pool, 0);
        }
        prop_assert_eq!(pool.stats().evictions, extra);
    }
}
