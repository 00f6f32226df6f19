//! On-disk layout: the superblock and the geometry derived from it.
//!
//! All on-disk integers are little-endian. Cluster 0 holds the superblock,
//! clusters `[fat_start, data_start)` hold the FAT (one packed `i32` per
//! cluster), and `[data_start, total_clusters)` are data clusters.

use std::io;

use crate::error::{FsError, FsResult};

pub const MAGIC: [u8; 4] = *b"FVL1";
pub const SUPERBLOCK_LEN: usize = 24;

/// Maximum stored name length including the NUL pad, so names may be up to
/// `FILENAME_LEN - 1` bytes.
pub const FILENAME_LEN: usize = 32;
/// name + is_dir + start_cluster + size
pub const ENTRY_SIZE: usize = FILENAME_LEN + 12;
/// Entry-count header at the front of every directory block.
pub const BLOCK_HEADER_LEN: usize = 4;

pub const MAX_PATH_BYTES: usize = 1024;
pub const MAX_PATH_COMPONENTS: usize = 100;

/// Smallest cluster that still fits a directory block header plus one entry.
pub const MIN_CLUSTER_SIZE: u32 = 64;
pub const DEFAULT_CLUSTER_SIZE: u32 = 512;

/// Format-time configuration. The cluster size is persisted in the
/// superblock so differently formatted containers open correctly.
#[derive(Clone, Copy, Debug)]
pub struct FormatOptions {
    pub cluster_size: u32,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            cluster_size: DEFAULT_CLUSTER_SIZE,
        }
    }
}

fn invalid(msg: &'static str) -> FsError {
    FsError::Io(io::Error::new(io::ErrorKind::InvalidInput, msg))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub cluster_size: u32,
    pub total_clusters: u32,
    pub root_cluster: u32,
    pub fat_start: u32,
    pub data_start: u32,
}

impl Geometry {
    /// Compute the layout for a container of `container_len` bytes.
    /// Cluster 0 is reserved for the superblock, the FAT follows, and the
    /// root directory claims the first data cluster.
    pub fn compute(container_len: u64, cluster_size: u32) -> FsResult<Self> {
        if cluster_size < MIN_CLUSTER_SIZE || cluster_size % 4 != 0 {
            return Err(invalid("cluster size must be a multiple of 4 and at least 64"));
        }
        let total = container_len / u64::from(cluster_size);
        if total > i32::MAX as u64 {
            return Err(invalid("container holds more clusters than the FAT can index"));
        }
        let total_clusters = total as u32;
        let fat_start = 1u32;
        let fat_bytes = u64::from(total_clusters) * 4;
        let fat_clusters = fat_bytes.div_ceil(u64::from(cluster_size)) as u32;
        let data_start = fat_start + fat_clusters;
        if data_start >= total_clusters {
            return Err(invalid("container too small for superblock, FAT and one data cluster"));
        }
        Ok(Self {
            cluster_size,
            total_clusters,
            root_cluster: data_start,
            fat_start,
            data_start,
        })
    }

    /// Directory entries that fit in one block.
    pub fn max_entries(&self) -> u32 {
        (self.cluster_size - BLOCK_HEADER_LEN as u32) / ENTRY_SIZE as u32
    }

    pub fn is_data_cluster(&self, cluster: u32) -> bool {
        cluster >= self.data_start && cluster < self.total_clusters
    }

    /// Bytes the formatted region occupies; the container must be at least
    /// this long.
    pub fn byte_len(&self) -> u64 {
        u64::from(self.total_clusters) * u64::from(self.cluster_size)
    }

    pub fn encode(&self) -> [u8; SUPERBLOCK_LEN] {
        let mut raw = [0u8; SUPERBLOCK_LEN];
        raw[0..4].copy_from_slice(&MAGIC);
        raw[4..8].copy_from_slice(&self.cluster_size.to_le_bytes());
        raw[8..12].copy_from_slice(&self.total_clusters.to_le_bytes());
        raw[12..16].copy_from_slice(&self.root_cluster.to_le_bytes());
        raw[16..20].copy_from_slice(&self.fat_start.to_le_bytes());
        raw[20..24].copy_from_slice(&self.data_start.to_le_bytes());
        raw
    }

    pub fn decode(raw: &[u8; SUPERBLOCK_LEN]) -> FsResult<Self> {
        if raw[0..4] != MAGIC {
            return Err(FsError::Corrupted("bad superblock magic"));
        }
        let field = |i: usize| {
            let mut b = [0u8; 4];
            b.copy_from_slice(&raw[i..i + 4]);
            u32::from_le_bytes(b)
        };
        let geo = Self {
            cluster_size: field(4),
            total_clusters: field(8),
            root_cluster: field(12),
            fat_start: field(16),
            data_start: field(20),
        };
        geo.validate()?;
        Ok(geo)
    }

    fn validate(&self) -> FsResult<()> {
        if self.cluster_size < MIN_CLUSTER_SIZE || self.cluster_size % 4 != 0 {
            return Err(FsError::Corrupted("superblock cluster size out of range"));
        }
        if self.fat_start == 0
            || self.fat_start >= self.data_start
            || self.data_start >= self.total_clusters
        {
            return Err(FsError::Corrupted("superblock region bounds out of order"));
        }
        if self.root_cluster != self.data_start {
            return Err(FsError::Corrupted("root cluster does not head the data region"));
        }
        let fat_bytes = u64::from(self.total_clusters) * 4;
        let fat_capacity =
            u64::from(self.data_start - self.fat_start) * u64::from(self.cluster_size);
        if fat_capacity < fat_bytes {
            return Err(FsError::Corrupted("FAT region too small for the cluster count"));
        }
        Ok(())
    }
}
