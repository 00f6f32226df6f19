//! FAT slot encoding, chain traversal and the cluster allocator.
//!
//! Slots are packed `i32`s: `0` = free, `-1` = end of chain, a positive
//! value is the next cluster in the chain and must land inside the data
//! region. Every chain walk is step-bounded by the cluster count so a
//! corrupted (cyclic) FAT surfaces as an error instead of a hang.

use log::{debug, trace};

use crate::container::Container;
use crate::error::{FsError, FsResult};
use crate::layout::Geometry;
use crate::store::ClusterStore;

pub const FAT_FREE: i32 = 0;
pub const FAT_EOC: i32 = -1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FatSlot {
    Free,
    EndOfChain,
    Next(u32),
}

impl FatSlot {
    pub fn encode(self) -> i32 {
        match self {
            FatSlot::Free => FAT_FREE,
            FatSlot::EndOfChain => FAT_EOC,
            FatSlot::Next(cluster) => cluster as i32,
        }
    }

    pub fn decode(raw: i32, geo: &Geometry) -> FsResult<Self> {
        match raw {
            FAT_FREE => Ok(FatSlot::Free),
            FAT_EOC => Ok(FatSlot::EndOfChain),
            n if n > 0 && geo.is_data_cluster(n as u32) => Ok(FatSlot::Next(n as u32)),
            _ => Err(FsError::Corrupted("FAT slot value out of range")),
        }
    }
}

/// Next cluster in a chain, `None` at the end. Running into a free slot
/// means the chain was severed underneath its directory entry.
pub fn next_in_chain<C: Container>(
    store: &mut ClusterStore<C>,
    cluster: u32,
) -> FsResult<Option<u32>> {
    match store.fat_slot(cluster)? {
        FatSlot::Next(next) => Ok(Some(next)),
        FatSlot::EndOfChain => Ok(None),
        FatSlot::Free => Err(FsError::Corrupted("chain runs through a free cluster")),
    }
}

pub fn last_in_chain<C: Container>(store: &mut ClusterStore<C>, head: u32) -> FsResult<u32> {
    let mut cluster = head;
    for _ in 0..store.geometry().total_clusters {
        match next_in_chain(store, cluster)? {
            Some(next) => cluster = next,
            None => return Ok(cluster),
        }
    }
    Err(FsError::Corrupted("cluster chain does not terminate"))
}

/// Claim the lowest-index free data cluster: mark it end-of-chain, zero it,
/// and link it behind `chain_tail` when one is given. Deterministic
/// lowest-first scan, O(total_clusters) worst case.
pub fn allocate<C: Container>(
    store: &mut ClusterStore<C>,
    chain_tail: Option<u32>,
) -> FsResult<u32> {
    let geo = *store.geometry();
    for cluster in geo.data_start..geo.total_clusters {
        if store.fat_slot(cluster)? != FatSlot::Free {
            continue;
        }
        store.set_fat_slot(cluster, FatSlot::EndOfChain)?;
        store.zero_cluster(cluster)?;
        if let Some(tail) = chain_tail {
            store.set_fat_slot(tail, FatSlot::Next(cluster))?;
        }
        trace!("allocated cluster {cluster} (tail {chain_tail:?})");
        return Ok(cluster);
    }
    debug!("allocation failed: no free cluster");
    Err(FsError::OutOfSpace)
}

/// Free every cluster of the chain starting at `head` and zero its bytes.
/// The caller must already have detached `head` from its directory entry so
/// no entry ever points at a free chain.
pub fn free_chain<C: Container>(store: &mut ClusterStore<C>, head: u32) -> FsResult<()> {
    let total = store.geometry().total_clusters;
    let mut cluster = head;
    let mut freed = 0u32;
    loop {
        if freed >= total {
            return Err(FsError::Corrupted("cluster chain does not terminate"));
        }
        let next = next_in_chain(store, cluster)?;
        store.set_fat_slot(cluster, FatSlot::Free)?;
        store.zero_cluster(cluster)?;
        freed += 1;
        match next {
            Some(n) => cluster = n,
            None => break,
        }
    }
    trace!("freed {freed} clusters from chain {head}");
    Ok(())
}
