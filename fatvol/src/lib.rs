//! A single-container FAT-style filesystem.
//!
//! The whole filesystem lives inside one byte container (a disk image file
//! or an in-memory buffer), divided into fixed-size clusters: a superblock
//! in cluster 0, a file allocation table mapping every cluster to free, end
//! of chain or its successor, and data clusters holding directory blocks
//! and file payloads.
//!
//! [`Volume`] is the session type: format or open a [`Container`], then
//! drive it with path-based operations.
//!
//! ```no_run
//! use fatvol::{FormatOptions, MemContainer, Volume};
//!
//! # fn main() -> fatvol::FsResult<()> {
//! let mut vol = Volume::format(MemContainer::new(64 * 512), FormatOptions::default())?;
//! vol.mkdir("notes")?;
//! vol.touch("notes/today")?;
//! vol.append("notes/today", b"ship it")?;
//! assert_eq!(vol.read("notes/today")?, b"ship it");
//! # Ok(())
//! # }
//! ```

pub mod container;
pub mod dir;
pub mod error;
pub mod fat;
pub mod file;
pub mod layout;
pub mod path;
pub mod store;
pub mod volume;

pub use container::{Container, FileContainer, MemContainer};
pub use dir::DirEntry;
pub use error::{FsError, FsResult};
pub use layout::{FormatOptions, Geometry};
pub use volume::Volume;
