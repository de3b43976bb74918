//! Node-local shared memory (`spec.md` §3 `shared_control`, §5).
//!
//! A dataset's stripe counters must be visible to every rank on a node.
//! We back that with an anonymous `memmap2` mapping, the same crate the
//! teacher repo pulls in for read-only source mapping during encode; here
//! it is reinterpreted as a small array of atomics rather than mapped file
//! content. An anonymous mapping is shared only across threads/forks of one
//! process, which is exactly what `ThreadRankGroup` (simulated ranks as
//! threads) needs; a real multi-process deployment would build the same
//! `SharedRegion` over a `shm_open`-named mapping instead.

use crate::error::{HioError, Result};
use memmap2::MmapMut;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

pub struct SharedRegion {
    mmap: MmapMut,
}

// Safety: the region is only ever read/written through atomic operations
// on word-aligned offsets within its extent; no unsynchronized byte access
// is exposed.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    pub fn create(size: usize) -> Result<Self> {
        let mmap = MmapMut::map_anon(size.max(8))
            .map_err(|e| HioError::io("create shared-memory region", e))?;
        Ok(Self { mmap })
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Atomic view of the `u64` word at `byte_offset`. Panics if the
    /// region is too small or the offset is misaligned; both are
    /// programming errors internal to this crate, never caller-supplied.
    pub fn word_u64(&self, byte_offset: usize) -> &AtomicU64 {
        assert!(byte_offset + 8 <= self.mmap.len(), "shared-memory word out of range");
        assert_eq!(byte_offset % 8, 0, "shared-memory word misaligned");
        unsafe { &*(self.mmap.as_ptr().add(byte_offset) as *const AtomicU64) }
    }

    pub fn word_i64(&self, byte_offset: usize) -> &AtomicI64 {
        assert!(byte_offset + 8 <= self.mmap.len(), "shared-memory word out of range");
        assert_eq!(byte_offset % 8, 0, "shared-memory word misaligned");
        unsafe { &*(self.mmap.as_ptr().add(byte_offset) as *const AtomicI64) }
    }
}

/// `shared_control` (`spec.md` §3): `s_master` plus one monotonic stripe
/// counter per stripe, invariant 2 ("`s_index` is monotonically
/// non-decreasing for every stripe").
pub struct SharedControl {
    region: SharedRegion,
    stripe_count: usize,
}

const MASTER_UNSET: i64 = -1;

impl SharedControl {
    /// Layout: word 0 is `s_master` (signed rank, -1 = unclaimed); words
    /// `1..=stripe_count` are the per-stripe `s_index` counters.
    pub fn create(stripe_count: usize) -> Result<Self> {
        let stripe_count = stripe_count.max(1);
        let region = SharedRegion::create((1 + stripe_count) * 8)?;
        region.word_i64(0).store(MASTER_UNSET, Ordering::SeqCst);
        Ok(Self { region, stripe_count })
    }

    pub fn stripe_count(&self) -> usize {
        self.stripe_count
    }

    /// Node-leader election: the first rank to call this with `force`
    /// claims ownership; later callers just observe it. Returns the
    /// winning rank.
    pub fn claim_master(&self, candidate: u64) -> u64 {
        let word = self.region.word_i64(0);
        let _ = word.compare_exchange(
            MASTER_UNSET,
            candidate as i64,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        word.load(Ordering::SeqCst) as u64
    }

    pub fn master(&self) -> Option<u64> {
        let v = self.region.word_i64(0).load(Ordering::SeqCst);
        if v == MASTER_UNSET {
            None
        } else {
            Some(v as u64)
        }
    }

    fn stripe_word(&self, stripe: usize) -> &AtomicU64 {
        self.region.word_u64(8 + stripe * 8)
    }

    /// Atomic fetch-and-add on stripe `s`'s counter (`spec.md` §4.F step 3).
    pub fn fetch_add_stripe(&self, stripe: usize, delta: u64) -> u64 {
        self.stripe_word(stripe % self.stripe_count).fetch_add(delta, Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn stripe_index(&self, stripe: usize) -> u64 {
        self.stripe_word(stripe % self.stripe_count).load(Ordering::SeqCst)
    }
}
