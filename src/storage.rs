//! Storage layer implementation for minibase.
//!
//! This module provides the foundation for persistent data storage using a
//! page-based architecture. Key components:
//!
//! - **Page**: Fixed-size blocks of data, the basic unit of I/O
//! - **DiskManager**: Handles reading/writing the pages of a single file
//! - **PagedFileManager**: Buffer pool + open-file table over named files,
//!   with LRU eviction and write-back before frame reuse
//! - **Bitmap**: Slot-occupancy bit vector embedded in on-disk structures
//!
//! The storage layer is strictly single-threaded and synchronous: every
//! operation performs blocking I/O in place on the caller's thread. The
//! index layer is built on exactly this surface and nothing else.

pub mod bitmap;
pub mod buffer;
pub mod disk;
pub mod error;

pub use bitmap::Bitmap;
pub use buffer::{PagedFileManager, StoreConfig};
pub use disk::DiskManager;
pub use error::{StorageError, StorageResult};

/// Default page size in bytes. Tests may configure smaller pages through
/// [`StoreConfig`].
pub const PAGE_SIZE: usize = 4096;

/// Default number of buffer frames.
pub const BUFFER_CAPACITY: usize = 64;

/// Sentinel meaning "no page" / "no slot" / "not found" in on-disk structures.
pub const INVALID: i32 = -1;

/// Identifier of an open file within a [`PagedFileManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(pub u32);

/// Page number within a file. Pages are numbered from zero and only grow by
/// append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageNum(pub u32);

impl std::fmt::Display for PageNum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
