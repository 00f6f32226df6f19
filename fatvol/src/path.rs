//! Slash-delimited path handling: splitting, name validation and the pure
//! resolver walk.
//!
//! Resolution takes its starting cluster as an argument and returns the
//! resolved cluster as a value; nothing here touches the session cursor, so
//! a multi-hop failure cannot leave it half-moved.

use crate::container::Container;
use crate::dir::{self, DOT, DOTDOT};
use crate::error::{FsError, FsResult};
use crate::layout::{FILENAME_LEN, MAX_PATH_BYTES, MAX_PATH_COMPONENTS};
use crate::store::ClusterStore;

/// A parsed path: where the walk starts plus the remaining components.
/// `"/"` parses as absolute with no components.
#[derive(Debug, PartialEq, Eq)]
pub struct ParsedPath<'a> {
    pub absolute: bool,
    pub components: Vec<&'a str>,
}

pub fn parse(path: &str) -> FsResult<ParsedPath<'_>> {
    if path.is_empty() {
        return Err(FsError::InvalidName);
    }
    if path.len() >= MAX_PATH_BYTES {
        return Err(FsError::NameTooLong);
    }
    let absolute = path.starts_with('/');
    let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
    if components.len() > MAX_PATH_COMPONENTS {
        return Err(FsError::PathTooDeep);
    }
    for component in &components {
        if component.len() >= FILENAME_LEN {
            return Err(FsError::NameTooLong);
        }
    }
    Ok(ParsedPath {
        absolute,
        components,
    })
}

/// Split off the final component; everything before it is pure navigation.
/// Paths with no components (`/`, `.` after filtering) cannot name an entry.
pub fn split_parent<'a>(parsed: &'a ParsedPath<'_>) -> FsResult<(&'a [&'a str], &'a str)> {
    match parsed.components.split_last() {
        Some((last, nav)) => Ok((nav, last)),
        None => Err(FsError::InvalidName),
    }
}

/// Check a name about to be created: `.`/`..`/empty are reserved, NUL and
/// `/` are illegal, and the stored form must leave room for the NUL pad.
pub fn validate_new_name(name: &str) -> FsResult<()> {
    if name.is_empty() || name == DOT || name == DOTDOT {
        return Err(FsError::InvalidName);
    }
    if name.bytes().any(|b| b == 0 || b == b'/') {
        return Err(FsError::InvalidName);
    }
    if name.len() >= FILENAME_LEN {
        return Err(FsError::NameTooLong);
    }
    Ok(())
}

/// Walk `components` from `start`, resolving each against the directory
/// codec, and return the directory cluster they land on.
pub fn resolve_dir<C: Container>(
    store: &mut ClusterStore<C>,
    start: u32,
    components: &[&str],
) -> FsResult<u32> {
    let mut cluster = start;
    for component in components {
        cluster = step(store, cluster, component)?;
    }
    Ok(cluster)
}

fn step<C: Container>(store: &mut ClusterStore<C>, cluster: u32, component: &str) -> FsResult<u32> {
    match component {
        DOT => Ok(cluster),
        // The root has no `..` entry, so stepping up from it is NotFound.
        DOTDOT => match dir::lookup(store, cluster, DOTDOT)? {
            Some(loc) => Ok(loc.entry.start_cluster),
            None => Err(FsError::NotFound),
        },
        name => match dir::lookup(store, cluster, name)? {
            Some(loc) if loc.entry.is_dir => Ok(loc.entry.start_cluster),
            Some(_) => Err(FsError::NotDirectory),
            None => Err(FsError::NotFound),
        },
    }
}
