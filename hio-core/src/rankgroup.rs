//! Rank group collaborator (`spec.md` §6.3): the MPI-shaped context a
//! dataset is opened against. `spec.md` §1 puts the actual collective
//! transport out of scope; this module provides the trait plus two
//! concrete, fully in-process implementations that are enough to exercise
//! every invariant in `spec.md` §8 without depending on an MPI runtime.

use crate::error::{HioError, Result};
use crate::shared::SharedControl;
use std::sync::{Arc, Mutex};

/// Collective operations a dataset needs from its rank group. Node
/// topology is exposed through `shared_rank`/`shared_size`/`node_count` so
/// the core can tell node-local ranks (who share a `SharedControl`) from
/// cross-node ones (who only share the scattered manifest).
pub trait RankGroup: Send + Sync {
    fn rank(&self) -> u64;
    fn size(&self) -> u64;
    fn shared_rank(&self) -> u64;
    fn shared_size(&self) -> u64;
    fn node_count(&self) -> u64;

    /// Returns this node's shared-memory region, sized for at least
    /// `stripe_count` stripes. The region is created lazily on the first
    /// call (every rank on a node computes the same `spec.md` §4.C
    /// `stripe_count` from the same FS probe and dataset configuration, so
    /// no collective round-trip is needed to agree on the size); later
    /// calls with a different `stripe_count` still return the
    /// already-created region.
    fn shared_memory_region(&self, stripe_count: usize) -> Result<Arc<SharedControl>>;

    fn barrier(&self) -> Result<()>;
    fn broadcast(&self, root: u64, data: &mut Vec<u8>) -> Result<()>;
    fn gather(&self, root: u64, data: &[u8]) -> Result<Option<Vec<Vec<u8>>>>;
    fn scatter(&self, root: u64, data: Option<Vec<Vec<u8>>>) -> Result<Vec<u8>>;
    fn allreduce_min(&self, value: i64) -> Result<i64>;
}

/// A single-rank, single-node group: the degenerate case `spec.md` §9
/// explicitly allows as acceptable for a non-MPI deployment. Every
/// collective is a no-op identity.
pub struct LocalRankGroup {
    shared: Mutex<Option<Arc<SharedControl>>>,
}

impl LocalRankGroup {
    pub fn new() -> Result<Self> {
        Ok(LocalRankGroup { shared: Mutex::new(None) })
    }
}

impl RankGroup for LocalRankGroup {
    fn rank(&self) -> u64 {
        0
    }
    fn size(&self) -> u64 {
        1
    }
    fn shared_rank(&self) -> u64 {
        0
    }
    fn shared_size(&self) -> u64 {
        1
    }
    fn node_count(&self) -> u64 {
        1
    }
    fn shared_memory_region(&self, stripe_count: usize) -> Result<Arc<SharedControl>> {
        let mut slot = self.shared.lock().unwrap();
        if let Some(region) = slot.as_ref() {
            return Ok(region.clone());
        }
        let region = Arc::new(SharedControl::create(stripe_count)?);
        *slot = Some(region.clone());
        Ok(region)
    }
    fn barrier(&self) -> Result<()> {
        Ok(())
    }
    fn broadcast(&self, _root: u64, _data: &mut Vec<u8>) -> Result<()> {
        Ok(())
    }
    fn gather(&self, _root: u64, data: &[u8]) -> Result<Option<Vec<Vec<u8>>>> {
        Ok(Some(vec![data.to_vec()]))
    }
    fn scatter(&self, _root: u64, data: Option<Vec<Vec<u8>>>) -> Result<Vec<u8>> {
        Ok(data.and_then(|mut v| v.pop()).unwrap_or_default())
    }
    fn allreduce_min(&self, value: i64) -> Result<i64> {
        Ok(value)
    }
}

/// Simulates `size` ranks as OS threads of one process, all on the same
/// (only) node: real shared memory and real atomics, enough to exercise
/// disjoint-stripe allocation and manifest gather/scatter concurrently,
/// without a true multi-node topology. `node_count()` is always 1; a
/// caller that asks this group to act as more than one node's leader
/// subgroup gets `NotAvailable` rather than a silently wrong merge
/// (`spec.md` §9 Open Question).
pub struct ThreadRankGroup {
    rank: u64,
    size: u64,
    shared: Arc<Mutex<Option<Arc<SharedControl>>>>,
    peers: Arc<std::sync::Mutex<Vec<Option<Vec<u8>>>>>,
    barrier: Arc<std::sync::Barrier>,
}

impl ThreadRankGroup {
    /// Builds `size` linked handles sharing one lazily-created
    /// `SharedControl` and one gather/scatter mailbox; hand one handle to
    /// each simulated rank.
    pub fn fleet(size: u64) -> Result<Vec<Self>> {
        if size == 0 {
            return Err(HioError::BadState("rank group size must be > 0".into()));
        }
        let shared = Arc::new(Mutex::new(None));
        let peers = Arc::new(std::sync::Mutex::new(vec![None; size as usize]));
        let barrier = Arc::new(std::sync::Barrier::new(size as usize));
        Ok((0..size)
            .map(|rank| ThreadRankGroup {
                rank,
                size,
                shared: shared.clone(),
                peers: peers.clone(),
                barrier: barrier.clone(),
            })
            .collect())
    }
}

impl RankGroup for ThreadRankGroup {
    fn rank(&self) -> u64 {
        self.rank
    }
    fn size(&self) -> u64 {
        self.size
    }
    fn shared_rank(&self) -> u64 {
        self.rank
    }
    fn shared_size(&self) -> u64 {
        self.size
    }
    fn node_count(&self) -> u64 {
        1
    }
    fn shared_memory_region(&self, stripe_count: usize) -> Result<Arc<SharedControl>> {
        let mut slot = self.shared.lock().unwrap();
        if let Some(region) = slot.as_ref() {
            return Ok(region.clone());
        }
        let region = Arc::new(SharedControl::create(stripe_count)?);
        *slot = Some(region.clone());
        Ok(region)
    }
    fn barrier(&self) -> Result<()> {
        self.barrier.wait();
        Ok(())
    }
    fn broadcast(&self, root: u64, data: &mut Vec<u8>) -> Result<()> {
        if self.rank == root {
            let mut slots = self.peers.lock().unwrap();
            for s in slots.iter_mut() {
                *s = Some(data.clone());
            }
        }
        self.barrier.wait();
        let slots = self.peers.lock().unwrap();
        if let Some(v) = &slots[self.rank as usize] {
            *data = v.clone();
        }
        drop(slots);
        self.barrier.wait();
        Ok(())
    }
    fn gather(&self, root: u64, data: &[u8]) -> Result<Option<Vec<Vec<u8>>>> {
        {
            let mut slots = self.peers.lock().unwrap();
            slots[self.rank as usize] = Some(data.to_vec());
        }
        self.barrier.wait();
        let result = if self.rank == root {
            let slots = self.peers.lock().unwrap();
            Some(slots.iter().map(|s| s.clone().unwrap_or_default()).collect())
        } else {
            None
        };
        self.barrier.wait();
        Ok(result)
    }
    fn scatter(&self, root: u64, data: Option<Vec<Vec<u8>>>) -> Result<Vec<u8>> {
        if self.rank == root {
            let payload = data.ok_or_else(|| {
                HioError::BadState("scatter root must supply data".into())
            })?;
            let mut slots = self.peers.lock().unwrap();
            for (i, chunk) in payload.into_iter().enumerate() {
                if i < slots.len() {
                    slots[i] = Some(chunk);
                }
            }
        }
        self.barrier.wait();
        let slots = self.peers.lock().unwrap();
        let mine = slots[self.rank as usize].clone().unwrap_or_default();
        drop(slots);
        self.barrier.wait();
        Ok(mine)
    }
    fn allreduce_min(&self, value: i64) -> Result<i64> {
        {
            let mut slots = self.peers.lock().unwrap();
            slots[self.rank as usize] = Some(value.to_le_bytes().to_vec());
        }
        self.barrier.wait();
        let min = {
            let slots = self.peers.lock().unwrap();
            slots
                .iter()
                .map(|s| i64::from_le_bytes(s.clone().unwrap_or_default().try_into().unwrap()))
                .min()
                .unwrap_or(value)
        };
        self.barrier.wait();
        Ok(min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn local_rank_group_is_degenerate_identity() {
        let g = LocalRankGroup::new().unwrap();
        assert_eq!(g.size(), 1);
        assert_eq!(g.allreduce_min(7).unwrap(), 7);
    }

    #[test]
    fn thread_rank_group_allreduce_min_sees_all_ranks() {
        let fleet = ThreadRankGroup::fleet(4).unwrap();
        let handles: Vec<_> = fleet
            .into_iter()
            .enumerate()
            .map(|(i, g)| thread::spawn(move || g.allreduce_min(10 - i as i64).unwrap()))
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 7); // min(10,9,8,7)
        }
    }

    #[test]
    fn thread_rank_group_gather_collects_every_rank() {
        let fleet = ThreadRankGroup::fleet(3).unwrap();
        let handles: Vec<_> = fleet
            .into_iter()
            .enumerate()
            .map(|(i, g)| thread::spawn(move || g.gather(0, &[i as u8]).unwrap()))
            .collect();
        let mut results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let root_result = results.remove(0);
        assert_eq!(root_result, Some(vec![vec![0], vec![1], vec![2]]));
        assert!(results.iter().all(|r| r.is_none()));
    }
}
