//! Directory-block codec.
//!
//! A directory block is one cluster: a 4-byte entry count followed by a
//! fixed-size array of 44-byte entries. A directory's listing is the
//! concatenation of live entries across its cluster chain, in chain order;
//! entries never span a block boundary.

use crate::container::Container;
use crate::error::{FsError, FsResult};
use crate::fat;
use crate::layout::{ENTRY_SIZE, FILENAME_LEN, Geometry};
use crate::store::ClusterStore;

pub const DOT: &str = ".";
pub const DOTDOT: &str = "..";

/// A decoded directory entry. `size` is meaningful only for files;
/// directories report 0 and their true extent is implicit in chain length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
    pub start_cluster: u32,
    pub size: u32,
}

impl DirEntry {
    pub fn file(name: &str, start_cluster: u32) -> Self {
        Self {
            name: name.to_owned(),
            is_dir: false,
            start_cluster,
            size: 0,
        }
    }

    pub fn dir(name: &str, start_cluster: u32) -> Self {
        Self {
            name: name.to_owned(),
            is_dir: true,
            start_cluster,
            size: 0,
        }
    }

    /// Encode into the on-disk form. The name must already be validated to
    /// fit `FILENAME_LEN - 1` bytes.
    pub fn encode(&self) -> [u8; ENTRY_SIZE] {
        let mut raw = [0u8; ENTRY_SIZE];
        raw[..self.name.len()].copy_from_slice(self.name.as_bytes());
        raw[FILENAME_LEN..FILENAME_LEN + 4]
            .copy_from_slice(&u32::from(self.is_dir).to_le_bytes());
        raw[FILENAME_LEN + 4..FILENAME_LEN + 8].copy_from_slice(&self.start_cluster.to_le_bytes());
        raw[FILENAME_LEN + 8..FILENAME_LEN + 12].copy_from_slice(&self.size.to_le_bytes());
        raw
    }

    pub fn decode(raw: &[u8; ENTRY_SIZE], geo: &Geometry) -> FsResult<Self> {
        let name_end = raw[..FILENAME_LEN]
            .iter()
            .position(|&b| b == 0)
            .ok_or(FsError::Corrupted("entry name missing its NUL pad"))?;
        if name_end == 0 {
            return Err(FsError::Corrupted("entry with empty name"));
        }
        let name = std::str::from_utf8(&raw[..name_end])
            .map_err(|_| FsError::Corrupted("entry name is not valid UTF-8"))?
            .to_owned();
        let field = |i: usize| {
            let mut b = [0u8; 4];
            b.copy_from_slice(&raw[FILENAME_LEN + i..FILENAME_LEN + i + 4]);
            u32::from_le_bytes(b)
        };
        let is_dir = match field(0) {
            0 => false,
            1 => true,
            _ => return Err(FsError::Corrupted("entry directory flag out of range")),
        };
        let start_cluster = field(4);
        if !geo.is_data_cluster(start_cluster) {
            return Err(FsError::Corrupted("entry start cluster outside data region"));
        }
        Ok(Self {
            name,
            is_dir,
            start_cluster,
            size: field(8),
        })
    }
}

/// Where a live entry sits: its block and in-block index.
#[derive(Clone, Debug)]
pub struct EntryLoc {
    pub cluster: u32,
    pub index: u32,
    pub entry: DirEntry,
}

/// Walk the directory chain looking for an exact, case-sensitive name
/// match. First match wins.
pub fn lookup<C: Container>(
    store: &mut ClusterStore<C>,
    chain_head: u32,
    name: &str,
) -> FsResult<Option<EntryLoc>> {
    let total = store.geometry().total_clusters;
    let mut cluster = Some(chain_head);
    let mut hops = 0u32;
    while let Some(cur) = cluster {
        hops += 1;
        if hops > total {
            return Err(FsError::Corrupted("directory chain does not terminate"));
        }
        let count = store.entry_count(cur)?;
        for index in 0..count {
            let entry = store.read_entry(cur, index)?;
            if entry.name == name {
                return Ok(Some(EntryLoc {
                    cluster: cur,
                    index,
                    entry,
                }));
            }
        }
        cluster = fat::next_in_chain(store, cur)?;
    }
    Ok(None)
}

/// Append `entry` to the chain's last block, growing the chain by one
/// cluster when that block is full. Fails only when the allocator is out of
/// space.
pub fn insert<C: Container>(
    store: &mut ClusterStore<C>,
    chain_head: u32,
    entry: &DirEntry,
) -> FsResult<()> {
    let max = store.geometry().max_entries();
    let last = fat::last_in_chain(store, chain_head)?;
    let count = store.entry_count(last)?;
    if count < max {
        store.write_entry(last, count, entry)?;
        return store.set_entry_count(last, count + 1);
    }
    let fresh = fat::allocate(store, Some(last))?;
    store.write_entry(fresh, 0, entry)?;
    store.set_entry_count(fresh, 1)
}

/// Remove the named entry: shift everything after it left by one, zero the
/// vacated slot and decrement the count. The count is only ever decremented
/// on a match. Trailing blocks that end up empty are not reclaimed;
/// emptiness checks go through the logical count, not block count.
pub fn remove<C: Container>(
    store: &mut ClusterStore<C>,
    chain_head: u32,
    name: &str,
) -> FsResult<()> {
    let Some(loc) = lookup(store, chain_head, name)? else {
        return Err(FsError::NotFound);
    };
    let count = store.entry_count(loc.cluster)?;
    for index in loc.index..count - 1 {
        let shifted = store.read_entry(loc.cluster, index + 1)?;
        store.write_entry(loc.cluster, index, &shifted)?;
    }
    store.zero_entry(loc.cluster, count - 1)?;
    store.set_entry_count(loc.cluster, count - 1)
}

/// Logical entry count across the whole chain.
pub fn total_entries<C: Container>(store: &mut ClusterStore<C>, chain_head: u32) -> FsResult<u32> {
    let total = store.geometry().total_clusters;
    let mut cluster = Some(chain_head);
    let mut hops = 0u32;
    let mut entries = 0u32;
    while let Some(cur) = cluster {
        hops += 1;
        if hops > total {
            return Err(FsError::Corrupted("directory chain does not terminate"));
        }
        entries += store.entry_count(cur)?;
        cluster = fat::next_in_chain(store, cur)?;
    }
    Ok(entries)
}

/// All live entries in chain order, then in-block order: insertion order,
/// not sorted.
pub fn list<C: Container>(store: &mut ClusterStore<C>, chain_head: u32) -> FsResult<Vec<DirEntry>> {
    let total = store.geometry().total_clusters;
    let mut cluster = Some(chain_head);
    let mut hops = 0u32;
    let mut entries = Vec::new();
    while let Some(cur) = cluster {
        hops += 1;
        if hops > total {
            return Err(FsError::Corrupted("directory chain does not terminate"));
        }
        let count = store.entry_count(cur)?;
        for index in 0..count {
            entries.push(store.read_entry(cur, index)?);
        }
        cluster = fat::next_in_chain(store, cur)?;
    }
    Ok(entries)
}

/// Write the synthetic `.`/`..` pair into a freshly allocated directory
/// cluster.
pub fn init_directory<C: Container>(
    store: &mut ClusterStore<C>,
    cluster: u32,
    parent: u32,
) -> FsResult<()> {
    store.write_entry(cluster, 0, &DirEntry::dir(DOT, cluster))?;
    store.write_entry(cluster, 1, &DirEntry::dir(DOTDOT, parent))?;
    store.set_entry_count(cluster, 2)
}

/// The root carries only a `.` self entry; `..` is deliberately absent so
/// resolving it at the root fails.
pub fn init_root<C: Container>(store: &mut ClusterStore<C>, root: u32) -> FsResult<()> {
    store.write_entry(root, 0, &DirEntry::dir(DOT, root))?;
    store.set_entry_count(root, 1)
}

/// Recover a directory's name from its parent's listing, matched by start
/// cluster. Used to rebuild the working-directory path.
pub fn name_of_child<C: Container>(
    store: &mut ClusterStore<C>,
    parent: u32,
    child: u32,
) -> FsResult<String> {
    for entry in list(store, parent)? {
        if entry.is_dir && entry.start_cluster == child && entry.name != DOT && entry.name != DOTDOT
        {
            return Ok(entry.name);
        }
    }
    Err(FsError::Corrupted("directory missing from its parent's listing"))
}
