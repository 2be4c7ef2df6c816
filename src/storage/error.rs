//! Storage layer error types.

use crate::storage::PageNum;
use thiserror::Error;

/// Errors that can occur in the storage layer.
///
/// Every error is surfaced synchronously to the immediate caller; there is
/// no retry layer anywhere in this core.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("cannot create file {0:?}: already exists")]
    CreateFile(String),

    #[error("cannot remove file {0:?}: not found")]
    RemoveFile(String),

    #[error("cannot open file {0:?}: already open")]
    OpenFile(String),

    #[error("cannot close file: not open")]
    CloseFile,

    #[error("file is not open")]
    FileNotOpen,

    #[error("cannot read page {page}: only {page_count} pages allocated")]
    ReadPage { page: PageNum, page_count: u32 },

    #[error("cannot write page {page}: only {page_count} pages allocated")]
    WritePage { page: PageNum, page_count: u32 },

    #[error("cannot append page: data is {actual} bytes, page size is {expected}")]
    AppendPage { expected: usize, actual: usize },

    #[error("page data too short: need {expected} bytes, got {actual}")]
    ShortPageData { expected: usize, actual: usize },

    #[error("short read from disk at page {0}")]
    ReadDisk(PageNum),

    #[error("short write to disk at page {0}")]
    WriteDisk(PageNum),

    #[error("buffer pool is full: cannot allocate a frame")]
    BufferPoolFull,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
