//! Frame cache statistics and monitoring

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Snapshot of the frame pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Total number of frame buffers (N)
    pub pool_size: usize,

    /// Frames per block (B)
    pub block_size: usize,

    /// Blocks holding no media
    pub empty_blocks: usize,

    /// Blocks currently being filled by the fetcher
    pub fetching_blocks: usize,

    /// Blocks holding decoded frames nobody is using
    pub cached_blocks: usize,

    /// Blocks with at least one leased frame
    pub in_use_blocks: usize,

    /// Frames with a non-zero usage counter
    pub frames_in_use: usize,

    /// Sum of all usage counters
    pub outstanding_leases: u64,

    /// Requests answered from a cached or in-use block
    pub hits: u64,

    /// Requests that started a fill
    pub misses: u64,

    /// Requests that waited on a block already being filled
    pub waits: u64,

    /// Consumer requests currently parked for lack of a block
    pub parked_requests: usize,

    /// Try-only requests refused for lack of a free block
    pub rejected_requests: u64,

    /// Prefetches that started a fill
    pub prefetches: u64,

    /// Prefetches refused for lack of a free block
    pub rejected_prefetches: u64,

    /// Completed fills
    pub fills: u64,

    /// Fills the fetcher could not complete
    pub failed_fills: u64,

    /// Cached blocks reclaimed for other media ranges
    pub evictions: u64,

    /// Total time between dispatching fills and their completion
    pub total_fill_time: Duration,

    /// First bookkeeping inconsistency found when the snapshot was taken
    pub invariant_violation: Option<String>,
}

impl CacheStats {
    pub fn block_count(&self) -> usize {
        self.empty_blocks + self.fetching_blocks + self.cached_blocks + self.in_use_blocks
    }

    /// Returns hit rate percentage among consumer requests.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.waits;
        if total == 0 {
            return 0.0;
        }

        (self.hits as f64 / total as f64) * 100.0
    }

    /// Average fill latency.
    pub fn average_fill_time(&self) -> Duration {
        if self.fills == 0 {
            Duration::ZERO
        } else {
            self.total_fill_time / self.fills as u32
        }
    }

    /// Returns true if no block can be reclaimed without a recycle.
    pub fn is_saturated(&self) -> bool {
        self.empty_blocks == 0 && self.cached_blocks == 0
    }

    /// Returns true if the pool's bookkeeping checked out.
    pub fn is_consistent(&self) -> bool {
        self.invariant_violation.is_none()
    }

    /// Returns true once every lease has been returned.
    pub fn is_idle(&self) -> bool {
        self.frames_in_use == 0 && self.fetching_blocks == 0 && self.parked_requests == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_metrics() {
        let stats = CacheStats {
            pool_size: 16,
            block_size: 4,
            empty_blocks: 1,
            cached_blocks: 2,
            in_use_blocks: 1,
            hits: 3,
            misses: 1,
            fills: 2,
            total_fill_time: Duration::from_millis(30),
            ..Default::default()
        };

        assert_eq!(stats.block_count(), 4);
        assert_eq!(stats.hit_rate(), 75.0);
        assert_eq!(stats.average_fill_time(), Duration::from_millis(15));
        assert!(!stats.is_saturated());
    }

    #[test]
    fn test_empty_stats() {
        let stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);
        assert_eq!(stats.average_fill_time(), Duration::ZERO);
        assert!(stats.is_idle());
        assert!(stats.is_consistent());
    }
}
