//! Typed, bounds-checked access to the cluster space.
//!
//! Every read or write the engine performs goes through this layer; raw
//! byte offsets never leave it. Accessors check cluster indices against the
//! geometry and entry indices against the block capacity, and report
//! violations as `Corrupted` rather than touching out-of-range bytes.

use crate::container::Container;
use crate::dir::DirEntry;
use crate::error::{FsError, FsResult};
use crate::fat::FatSlot;
use crate::layout::{BLOCK_HEADER_LEN, ENTRY_SIZE, Geometry, SUPERBLOCK_LEN};

pub struct ClusterStore<C> {
    container: C,
    geo: Geometry,
}

impl<C: Container> ClusterStore<C> {
    pub fn new(container: C, geo: Geometry) -> Self {
        Self { container, geo }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geo
    }

    pub fn into_container(self) -> C {
        self.container
    }

    pub fn sync(&mut self) -> FsResult<()> {
        self.container.sync()
    }

    fn cluster_base(&self, cluster: u32) -> FsResult<u64> {
        if cluster >= self.geo.total_clusters {
            return Err(FsError::Corrupted("cluster index out of bounds"));
        }
        Ok(u64::from(cluster) * u64::from(self.geo.cluster_size))
    }

    fn data_cluster_base(&self, cluster: u32) -> FsResult<u64> {
        if !self.geo.is_data_cluster(cluster) {
            return Err(FsError::Corrupted("cluster index outside data region"));
        }
        self.cluster_base(cluster)
    }

    // ─── Superblock ────────────────────────────────────────────────────────

    /// Write the superblock, zeroing the rest of cluster 0.
    pub fn write_superblock(&mut self) -> FsResult<()> {
        let mut block = vec![0u8; self.geo.cluster_size as usize];
        block[..SUPERBLOCK_LEN].copy_from_slice(&self.geo.encode());
        self.container.write_at(0, &block)
    }

    // ─── FAT slots ─────────────────────────────────────────────────────────

    fn fat_slot_offset(&self, cluster: u32) -> FsResult<u64> {
        if cluster >= self.geo.total_clusters {
            return Err(FsError::Corrupted("FAT index out of bounds"));
        }
        Ok(u64::from(self.geo.fat_start) * u64::from(self.geo.cluster_size)
            + u64::from(cluster) * 4)
    }

    pub fn fat_slot(&mut self, cluster: u32) -> FsResult<FatSlot> {
        let off = self.fat_slot_offset(cluster)?;
        let mut raw = [0u8; 4];
        self.container.read_at(off, &mut raw)?;
        let slot = FatSlot::decode(i32::from_le_bytes(raw), &self.geo)?;
        if slot == FatSlot::Next(cluster) {
            return Err(FsError::Corrupted("FAT slot points at itself"));
        }
        Ok(slot)
    }

    pub fn set_fat_slot(&mut self, cluster: u32, slot: FatSlot) -> FsResult<()> {
        let off = self.fat_slot_offset(cluster)?;
        self.container.write_at(off, &slot.encode().to_le_bytes())
    }

    /// Reset the whole FAT region to `Free`, including the zero pad past the
    /// last real slot.
    pub fn wipe_fat(&mut self) -> FsResult<()> {
        let zeros = vec![0u8; self.geo.cluster_size as usize];
        for cluster in self.geo.fat_start..self.geo.data_start {
            let base = self.cluster_base(cluster)?;
            self.container.write_at(base, &zeros)?;
        }
        Ok(())
    }

    // ─── Data clusters ─────────────────────────────────────────────────────

    pub fn zero_cluster(&mut self, cluster: u32) -> FsResult<()> {
        let base = self.data_cluster_base(cluster)?;
        let zeros = vec![0u8; self.geo.cluster_size as usize];
        self.container.write_at(base, &zeros)
    }

    /// File payload access within one cluster.
    pub fn read_payload(&mut self, cluster: u32, offset: u32, buf: &mut [u8]) -> FsResult<()> {
        let base = self.payload_base(cluster, offset, buf.len())?;
        self.container.read_at(base, buf)
    }

    pub fn write_payload(&mut self, cluster: u32, offset: u32, buf: &[u8]) -> FsResult<()> {
        let base = self.payload_base(cluster, offset, buf.len())?;
        self.container.write_at(base, buf)
    }

    fn payload_base(&self, cluster: u32, offset: u32, len: usize) -> FsResult<u64> {
        let base = self.data_cluster_base(cluster)?;
        if u64::from(offset) + len as u64 > u64::from(self.geo.cluster_size) {
            return Err(FsError::Corrupted("payload access crosses cluster boundary"));
        }
        Ok(base + u64::from(offset))
    }

    // ─── Directory blocks ──────────────────────────────────────────────────

    pub fn entry_count(&mut self, cluster: u32) -> FsResult<u32> {
        let base = self.data_cluster_base(cluster)?;
        let mut raw = [0u8; BLOCK_HEADER_LEN];
        self.container.read_at(base, &mut raw)?;
        let count = u32::from_le_bytes(raw);
        if count > self.geo.max_entries() {
            return Err(FsError::Corrupted("entry count exceeds block capacity"));
        }
        Ok(count)
    }

    pub fn set_entry_count(&mut self, cluster: u32, count: u32) -> FsResult<()> {
        if count > self.geo.max_entries() {
            return Err(FsError::Corrupted("entry count exceeds block capacity"));
        }
        let base = self.data_cluster_base(cluster)?;
        self.container.write_at(base, &count.to_le_bytes())
    }

    fn entry_base(&self, cluster: u32, index: u32) -> FsResult<u64> {
        if index >= self.geo.max_entries() {
            return Err(FsError::Corrupted("entry index exceeds block capacity"));
        }
        let base = self.data_cluster_base(cluster)?;
        Ok(base + BLOCK_HEADER_LEN as u64 + u64::from(index) * ENTRY_SIZE as u64)
    }

    pub fn read_entry(&mut self, cluster: u32, index: u32) -> FsResult<DirEntry> {
        let base = self.entry_base(cluster, index)?;
        let mut raw = [0u8; ENTRY_SIZE];
        self.container.read_at(base, &mut raw)?;
        DirEntry::decode(&raw, &self.geo)
    }

    pub fn write_entry(&mut self, cluster: u32, index: u32, entry: &DirEntry) -> FsResult<()> {
        let base = self.entry_base(cluster, index)?;
        self.container.write_at(base, &entry.encode())
    }

    /// Zero a vacated entry slot.
    pub fn zero_entry(&mut self, cluster: u32, index: u32) -> FsResult<()> {
        let base = self.entry_base(cluster, index)?;
        self.container.write_at(base, &[0u8; ENTRY_SIZE])
    }
}
