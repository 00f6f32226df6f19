//! The volume session.
//!
//! A `Volume` owns the container, the geometry read from its superblock and
//! the working-directory cursor. There is no ambient global state: every
//! operation goes through a `&mut Volume`, and several sessions over
//! different containers can coexist in one process. Opening the same
//! container twice is not guarded against; the container is assumed to be
//! exclusively owned.

use log::debug;

use crate::container::Container;
use crate::dir::{self, DOT, DOTDOT, DirEntry, EntryLoc};
use crate::error::{FsError, FsResult};
use crate::fat::{self, FatSlot};
use crate::file;
use crate::layout::{FormatOptions, Geometry, MAX_PATH_COMPONENTS};
use crate::path::{self, ParsedPath};
use crate::store::ClusterStore;

pub struct Volume<C: Container> {
    store: ClusterStore<C>,
    cwd: u32,
}

impl<C: Container> Volume<C> {
    /// Lay a fresh filesystem over `container`: superblock, zeroed FAT, and
    /// a root directory holding only its `.` self entry.
    pub fn format(container: C, options: FormatOptions) -> FsResult<Self> {
        let geo = Geometry::compute(container.len(), options.cluster_size)?;
        debug!(
            "format: {} clusters of {} bytes, FAT [{}, {}), root {}",
            geo.total_clusters, geo.cluster_size, geo.fat_start, geo.data_start, geo.root_cluster
        );
        let mut store = ClusterStore::new(container, geo);
        store.write_superblock()?;
        store.wipe_fat()?;
        store.set_fat_slot(geo.root_cluster, FatSlot::EndOfChain)?;
        store.zero_cluster(geo.root_cluster)?;
        dir::init_root(&mut store, geo.root_cluster)?;
        store.sync()?;
        Ok(Self {
            store,
            cwd: geo.root_cluster,
        })
    }

    /// Open an already formatted container, cursor at the root.
    pub fn open(mut container: C) -> FsResult<Self> {
        let mut raw = [0u8; crate::layout::SUPERBLOCK_LEN];
        container.read_at(0, &mut raw)?;
        let geo = Geometry::decode(&raw)?;
        if container.len() < geo.byte_len() {
            return Err(FsError::Corrupted("container shorter than its superblock claims"));
        }
        let mut store = ClusterStore::new(container, geo);
        if store.fat_slot(geo.root_cluster)? == FatSlot::Free {
            return Err(FsError::Corrupted("root cluster marked free"));
        }
        debug!(
            "open: {} clusters of {} bytes, root {}",
            geo.total_clusters, geo.cluster_size, geo.root_cluster
        );
        Ok(Self {
            store,
            cwd: geo.root_cluster,
        })
    }

    /// Tear the session down, flushing writes and returning the container.
    pub fn close(mut self) -> FsResult<C> {
        self.store.sync()?;
        Ok(self.store.into_container())
    }

    pub fn geometry(&self) -> &Geometry {
        self.store.geometry()
    }

    /// Chain head of the working directory.
    pub fn cwd(&self) -> u32 {
        self.cwd
    }

    fn start_of(&self, parsed: &ParsedPath<'_>) -> u32 {
        if parsed.absolute {
            self.store.geometry().root_cluster
        } else {
            self.cwd
        }
    }

    /// Navigate to the parent of the path's final component and validate
    /// that component as a fresh name. Shared by `mkdir` and `touch`.
    fn resolve_creation(&mut self, pathstr: &str) -> FsResult<(u32, String)> {
        let parsed = path::parse(pathstr)?;
        let (nav, name) = path::split_parent(&parsed)?;
        path::validate_new_name(name)?;
        let start = self.start_of(&parsed);
        let parent = path::resolve_dir(&mut self.store, start, nav)?;
        if dir::lookup(&mut self.store, parent, name)?.is_some() {
            return Err(FsError::AlreadyExists);
        }
        Ok((parent, name.to_owned()))
    }

    /// Resolve a path that must land on an existing file, keeping the
    /// entry's location so the caller can write the size field back.
    fn resolve_file(&mut self, pathstr: &str) -> FsResult<(u32, EntryLoc)> {
        let parsed = path::parse(pathstr)?;
        let (nav, name) = path::split_parent(&parsed)?;
        if name == DOT || name == DOTDOT {
            return Err(FsError::NotAFile);
        }
        let start = self.start_of(&parsed);
        let parent = path::resolve_dir(&mut self.store, start, nav)?;
        match dir::lookup(&mut self.store, parent, name)? {
            Some(loc) if !loc.entry.is_dir => Ok((parent, loc)),
            Some(_) => Err(FsError::NotAFile),
            None => Err(FsError::NotFound),
        }
    }

    /// Create a directory: claim a cluster, seed it with `.`/`..`, then
    /// publish it in the parent's listing.
    pub fn mkdir(&mut self, pathstr: &str) -> FsResult<()> {
        let (parent, name) = self.resolve_creation(pathstr)?;
        let fresh = fat::allocate(&mut self.store, None)?;
        dir::init_directory(&mut self.store, fresh, parent)?;
        if let Err(e) = dir::insert(&mut self.store, parent, &DirEntry::dir(&name, fresh)) {
            // A full parent must not leak the orphaned cluster.
            fat::free_chain(&mut self.store, fresh)?;
            return Err(e);
        }
        debug!("mkdir {pathstr}: cluster {fresh} under {parent}");
        Ok(())
    }

    /// Create an empty file backed by a single zeroed cluster.
    pub fn touch(&mut self, pathstr: &str) -> FsResult<()> {
        let (parent, name) = self.resolve_creation(pathstr)?;
        let fresh = fat::allocate(&mut self.store, None)?;
        if let Err(e) = dir::insert(&mut self.store, parent, &DirEntry::file(&name, fresh)) {
            fat::free_chain(&mut self.store, fresh)?;
            return Err(e);
        }
        debug!("touch {pathstr}: cluster {fresh} under {parent}");
        Ok(())
    }

    /// Remove a file or an empty directory: detach the entry first, then
    /// free its chain.
    pub fn rm(&mut self, pathstr: &str) -> FsResult<()> {
        let parsed = path::parse(pathstr)?;
        let (nav, name) = path::split_parent(&parsed)?;
        if name == DOT || name == DOTDOT {
            return Err(FsError::InvalidName);
        }
        let start = self.start_of(&parsed);
        let parent = path::resolve_dir(&mut self.store, start, nav)?;
        let Some(loc) = dir::lookup(&mut self.store, parent, name)? else {
            return Err(FsError::NotFound);
        };
        if loc.entry.is_dir {
            // Logical count over the whole chain; more than `.`/`..` means
            // the directory still has content.
            if dir::total_entries(&mut self.store, loc.entry.start_cluster)? > 2 {
                return Err(FsError::DirectoryNotEmpty);
            }
            // Removing the directory the cursor sits in would leave the
            // session dangling.
            if loc.entry.start_cluster == self.cwd {
                return Err(FsError::InvalidName);
            }
        }
        dir::remove(&mut self.store, parent, name)?;
        fat::free_chain(&mut self.store, loc.entry.start_cluster)?;
        debug!("rm {pathstr}: freed chain {}", loc.entry.start_cluster);
        Ok(())
    }

    /// Move the cursor. The walk is pure; the cursor is only committed once
    /// the whole path resolved.
    pub fn cd(&mut self, pathstr: &str) -> FsResult<()> {
        let parsed = path::parse(pathstr)?;
        let start = self.start_of(&parsed);
        self.cwd = path::resolve_dir(&mut self.store, start, &parsed.components)?;
        Ok(())
    }

    /// List a directory in insertion order, synthetic entries included.
    pub fn ls(&mut self, pathstr: &str) -> FsResult<Vec<DirEntry>> {
        let parsed = path::parse(pathstr)?;
        let start = self.start_of(&parsed);
        let target = path::resolve_dir(&mut self.store, start, &parsed.components)?;
        dir::list(&mut self.store, target)
    }

    /// Full contents of a file.
    pub fn read(&mut self, pathstr: &str) -> FsResult<Vec<u8>> {
        let (_, loc) = self.resolve_file(pathstr)?;
        file::read(&mut self.store, &loc.entry)
    }

    /// Append `data` at the end of a file, growing its chain as needed.
    /// On mid-write exhaustion the bytes already written stay in place, the
    /// size field reflects them, and `OutOfSpace` is returned.
    pub fn append(&mut self, pathstr: &str, data: &[u8]) -> FsResult<()> {
        let (_, loc) = self.resolve_file(pathstr)?;
        // The size field caps file length. Reject before writing anything
        // so no bytes land that the entry could not account for.
        if u64::from(loc.entry.size) + data.len() as u64 > u64::from(u32::MAX) {
            return Err(FsError::OutOfSpace);
        }
        let outcome = file::append(&mut self.store, loc.entry.start_cluster, loc.entry.size, data)?;
        if outcome.written > 0 {
            let mut entry = loc.entry.clone();
            entry.size += outcome.written as u32;
            self.store.write_entry(loc.cluster, loc.index, &entry)?;
        }
        if outcome.out_of_space {
            return Err(FsError::OutOfSpace);
        }
        Ok(())
    }

    /// Absolute path of the working directory, rebuilt by walking `..`
    /// links and matching each hop in its parent's listing.
    pub fn pwd(&mut self) -> FsResult<String> {
        let root = self.store.geometry().root_cluster;
        let mut names = Vec::new();
        let mut cluster = self.cwd;
        while cluster != root {
            if names.len() >= MAX_PATH_COMPONENTS {
                return Err(FsError::Corrupted("directory tree deeper than the path limit"));
            }
            let parent = match dir::lookup(&mut self.store, cluster, DOTDOT)? {
                Some(loc) => loc.entry.start_cluster,
                None => return Err(FsError::Corrupted("directory has no parent link")),
            };
            names.push(dir::name_of_child(&mut self.store, parent, cluster)?);
            cluster = parent;
        }
        names.reverse();
        Ok(format!("/{}", names.join("/")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{FileContainer, MemContainer};
    use crate::layout::FILENAME_LEN;

    fn small_volume() -> Volume<MemContainer> {
        // 64 clusters of 512 bytes, 62 of them data.
        Volume::format(MemContainer::new(64 * 512), FormatOptions::default()).unwrap()
    }

    fn tiny_volume() -> Volume<MemContainer> {
        // 8 clusters of 64 bytes: 6 data clusters, root takes one.
        Volume::format(MemContainer::new(8 * 64), FormatOptions { cluster_size: 64 }).unwrap()
    }

    fn names(entries: &[DirEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    // ── format / open ────────────────────────────────────────────────────

    #[test]
    fn format_then_open_lands_at_root_with_self_entry() {
        let vol = small_volume();
        let root = vol.store.geometry().root_cluster;
        let container = vol.close().unwrap();
        let mut vol = Volume::open(container).unwrap();
        assert_eq!(vol.cwd(), root);
        assert_eq!(names(&vol.ls("/").unwrap()), ["."]);
    }

    #[test]
    fn format_leaves_fat_empty_outside_root() {
        let mut vol = small_volume();
        let geo = *vol.store.geometry();
        assert_eq!(
            vol.store.fat_slot(geo.root_cluster).unwrap(),
            FatSlot::EndOfChain
        );
        for cluster in geo.root_cluster + 1..geo.total_clusters {
            assert_eq!(vol.store.fat_slot(cluster).unwrap(), FatSlot::Free);
        }
    }

    #[test]
    fn open_recovers_non_default_cluster_size() {
        let vol = Volume::format(
            MemContainer::new(256 * 1024),
            FormatOptions { cluster_size: 1024 },
        )
        .unwrap();
        let geo = *vol.geometry();
        let container = vol.close().unwrap();
        let vol = Volume::open(container).unwrap();
        assert_eq!(*vol.geometry(), geo);
    }

    #[test]
    fn open_rejects_blank_container() {
        assert!(matches!(
            Volume::open(MemContainer::new(64 * 512)),
            Err(FsError::Corrupted(_))
        ));
    }

    // ── mkdir / cd / pwd ─────────────────────────────────────────────────

    #[test]
    fn mkdir_cd_up_returns_to_start() {
        let mut vol = small_volume();
        let before = vol.cwd();
        vol.mkdir("x").unwrap();
        vol.cd("x").unwrap();
        assert_ne!(vol.cwd(), before);
        vol.cd("..").unwrap();
        assert_eq!(vol.cwd(), before);
    }

    #[test]
    fn cd_up_at_root_fails_and_cursor_holds() {
        let mut vol = small_volume();
        let root = vol.cwd();
        assert!(matches!(vol.cd(".."), Err(FsError::NotFound)));
        assert_eq!(vol.cwd(), root);
    }

    #[test]
    fn cd_into_file_fails() {
        let mut vol = small_volume();
        vol.touch("f").unwrap();
        assert!(matches!(vol.cd("f"), Err(FsError::NotDirectory)));
    }

    #[test]
    fn failed_multi_hop_cd_leaves_cursor_unchanged() {
        let mut vol = small_volume();
        vol.mkdir("a").unwrap();
        let before = vol.cwd();
        assert!(matches!(vol.cd("a/missing/deep"), Err(FsError::NotFound)));
        assert_eq!(vol.cwd(), before);
    }

    #[test]
    fn pwd_tracks_nested_dirs() {
        let mut vol = small_volume();
        assert_eq!(vol.pwd().unwrap(), "/");
        vol.mkdir("a").unwrap();
        vol.cd("a").unwrap();
        vol.mkdir("b").unwrap();
        vol.cd("b").unwrap();
        assert_eq!(vol.pwd().unwrap(), "/a/b");
        vol.cd("/").unwrap();
        assert_eq!(vol.pwd().unwrap(), "/");
    }

    #[test]
    fn mkdir_with_existing_parents_creates_only_leaf() {
        let mut vol = small_volume();
        vol.mkdir("a").unwrap();
        vol.mkdir("a/b").unwrap();
        vol.mkdir("a/b/c").unwrap();
        vol.cd("a/b").unwrap();
        assert!(names(&vol.ls(".").unwrap()).contains(&"c"));
    }

    #[test]
    fn mkdir_under_missing_parent_fails_without_partial_state() {
        let mut vol = small_volume();
        assert!(matches!(vol.mkdir("a/b"), Err(FsError::NotFound)));
        assert_eq!(names(&vol.ls("/").unwrap()), ["."]);
    }

    #[test]
    fn mkdir_duplicate_fails() {
        let mut vol = small_volume();
        vol.mkdir("a").unwrap();
        assert!(matches!(vol.mkdir("a"), Err(FsError::AlreadyExists)));
    }

    #[test]
    fn mkdir_reserved_names_fail() {
        let mut vol = small_volume();
        assert!(matches!(vol.mkdir("."), Err(FsError::InvalidName)));
        assert!(matches!(vol.mkdir(".."), Err(FsError::InvalidName)));
        assert!(matches!(vol.mkdir("/"), Err(FsError::InvalidName)));
    }

    #[test]
    fn name_length_boundary() {
        let mut vol = small_volume();
        let fits = "x".repeat(FILENAME_LEN - 1);
        vol.mkdir(&fits).unwrap();
        let too_long = "y".repeat(FILENAME_LEN);
        assert!(matches!(vol.mkdir(&too_long), Err(FsError::NameTooLong)));
    }

    #[test]
    fn new_directory_gets_dot_pair() {
        let mut vol = small_volume();
        vol.mkdir("sub").unwrap();
        assert_eq!(names(&vol.ls("sub").unwrap()), [".", ".."]);
    }

    // ── touch / append / read ────────────────────────────────────────────

    #[test]
    fn touch_append_read_round_trip() {
        let mut vol = small_volume();
        vol.touch("f").unwrap();
        vol.append("f", b"hello").unwrap();
        assert_eq!(vol.read("f").unwrap(), b"hello");
        let entry = vol.ls("/").unwrap().into_iter().find(|e| e.name == "f").unwrap();
        assert_eq!(entry.size, 5);
    }

    #[test]
    fn append_accumulates() {
        let mut vol = small_volume();
        vol.touch("log").unwrap();
        vol.append("log", b"one").unwrap();
        vol.append("log", b"two").unwrap();
        assert_eq!(vol.read("log").unwrap(), b"onetwo");
    }

    #[test]
    fn append_grows_across_clusters() {
        let mut vol = small_volume();
        vol.touch("big").unwrap();
        let data: Vec<u8> = (0..2000u32).map(|i| i as u8).collect();
        vol.append("big", &data).unwrap();
        assert_eq!(vol.read("big").unwrap(), data);
    }

    #[test]
    fn append_to_directory_fails() {
        let mut vol = small_volume();
        vol.mkdir("d").unwrap();
        assert!(matches!(vol.append("d", b"x"), Err(FsError::NotAFile)));
        assert!(matches!(vol.read("d"), Err(FsError::NotAFile)));
    }

    #[test]
    fn read_missing_file_fails() {
        let mut vol = small_volume();
        assert!(matches!(vol.read("nope"), Err(FsError::NotFound)));
    }

    #[test]
    fn partial_append_retains_prefix() {
        let mut vol = tiny_volume();
        vol.touch("f").unwrap();
        // 6 data clusters. At 64-byte clusters a block holds one entry, so
        // the root spilled a second block for `f`: root, spill and file head
        // leave 3 free clusters, capacity 4 * 64 = 256 bytes.
        let res = vol.append("f", &vec![9u8; 400]);
        assert!(matches!(res, Err(FsError::OutOfSpace)));
        assert_eq!(vol.read("f").unwrap(), vec![9u8; 256]);
    }

    #[test]
    fn touch_when_volume_full_fails_cleanly() {
        let mut vol = tiny_volume();
        // Each touch costs a file cluster plus a spilled directory block.
        vol.touch("f0").unwrap();
        vol.touch("f1").unwrap();
        assert!(matches!(vol.touch("f2"), Err(FsError::OutOfSpace)));
        // The failed create left no half-made entry behind.
        assert!(!names(&vol.ls("/").unwrap()).contains(&"f2"));
    }

    #[test]
    fn append_near_size_field_capacity_is_rejected_upfront() {
        let mut vol = small_volume();
        vol.touch("f").unwrap();
        let root = vol.store.geometry().root_cluster;
        let loc = dir::lookup(&mut vol.store, root, "f").unwrap().unwrap();
        let mut entry = loc.entry.clone();
        entry.size = u32::MAX - 2;
        vol.store.write_entry(loc.cluster, loc.index, &entry).unwrap();
        assert!(matches!(vol.append("f", b"abc"), Err(FsError::OutOfSpace)));
        // Nothing was written and the size field did not move.
        let after = dir::lookup(&mut vol.store, root, "f").unwrap().unwrap();
        assert_eq!(after.entry.size, u32::MAX - 2);
    }

    #[test]
    fn paths_resolve_from_root_or_cursor() {
        let mut vol = small_volume();
        vol.mkdir("a").unwrap();
        vol.cd("a").unwrap();
        vol.touch("/top").unwrap();
        vol.touch("inner").unwrap();
        assert!(names(&vol.ls("/").unwrap()).contains(&"top"));
        assert!(names(&vol.ls("/a").unwrap()).contains(&"inner"));
    }

    // ── rm ───────────────────────────────────────────────────────────────

    #[test]
    fn rm_empty_directory_succeeds() {
        let mut vol = small_volume();
        vol.mkdir("d").unwrap();
        vol.rm("d").unwrap();
        assert!(matches!(vol.cd("d"), Err(FsError::NotFound)));
    }

    #[test]
    fn rm_non_empty_directory_fails() {
        let mut vol = small_volume();
        vol.mkdir("d").unwrap();
        vol.touch("d/f").unwrap();
        assert!(matches!(vol.rm("d"), Err(FsError::DirectoryNotEmpty)));
        vol.rm("d/f").unwrap();
        vol.rm("d").unwrap();
    }

    #[test]
    fn rm_frees_clusters_for_reuse() {
        let mut vol = tiny_volume();
        vol.touch("a").unwrap();
        let entry = vol.ls("/").unwrap().into_iter().find(|e| e.name == "a").unwrap();
        vol.rm("a").unwrap();
        vol.touch("b").unwrap();
        let reused = vol.ls("/").unwrap().into_iter().find(|e| e.name == "b").unwrap();
        // Lowest-free-first hands the freed cluster straight back.
        assert_eq!(reused.start_cluster, entry.start_cluster);
    }

    #[test]
    fn rm_working_directory_is_rejected() {
        let mut vol = small_volume();
        vol.mkdir("d").unwrap();
        vol.cd("d").unwrap();
        assert!(matches!(vol.rm("../d"), Err(FsError::InvalidName)));
    }

    #[test]
    fn rm_missing_fails() {
        let mut vol = small_volume();
        assert!(matches!(vol.rm("ghost"), Err(FsError::NotFound)));
    }

    // ── ls ───────────────────────────────────────────────────────────────

    #[test]
    fn ls_preserves_insertion_order() {
        let mut vol = small_volume();
        for name in ["c", "a", "b"] {
            vol.touch(name).unwrap();
        }
        assert_eq!(names(&vol.ls("/").unwrap()), [".", "c", "a", "b"]);
    }

    #[test]
    fn ls_of_file_fails() {
        let mut vol = small_volume();
        vol.touch("f").unwrap();
        assert!(matches!(vol.ls("f"), Err(FsError::NotDirectory)));
    }

    // ── corruption ───────────────────────────────────────────────────────

    #[test]
    fn cyclic_directory_chain_surfaces_as_corruption() {
        let mut vol = small_volume();
        vol.mkdir("d").unwrap();
        let d = vol.ls("/").unwrap().into_iter().find(|e| e.name == "d").unwrap();
        vol.store
            .set_fat_slot(d.start_cluster, FatSlot::Next(vol.store.geometry().root_cluster))
            .unwrap();
        vol.store
            .set_fat_slot(vol.store.geometry().root_cluster, FatSlot::Next(d.start_cluster))
            .unwrap();
        let err = vol.ls("d").unwrap_err();
        assert!(err.is_fatal());
    }

    // ── persistence ──────────────────────────────────────────────────────

    #[test]
    fn tree_survives_close_and_reopen() {
        let path = std::env::temp_dir().join(format!("fatvol-vol-{}.img", std::process::id()));
        let _ = std::fs::remove_file(&path);
        {
            let container = FileContainer::create(&path, 64 * 512).unwrap();
            let mut vol = Volume::format(container, FormatOptions::default()).unwrap();
            vol.mkdir("docs").unwrap();
            vol.touch("docs/readme").unwrap();
            vol.append("docs/readme", b"persisted").unwrap();
            vol.close().unwrap();
        }
        let container = FileContainer::open(&path).unwrap();
        let mut vol = Volume::open(container).unwrap();
        assert_eq!(vol.read("docs/readme").unwrap(), b"persisted");
        assert_eq!(names(&vol.ls("docs").unwrap()), [".", "..", "readme"]);
        let _ = std::fs::remove_file(&path);
    }
}
