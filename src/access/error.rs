//! Index layer error types.

use crate::storage::StorageError;
use thiserror::Error;

/// Errors that can occur in the index layer.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("bucket is full: cannot insert RID")]
    BucketInsertRid,

    #[error("bucket slot {0} is not occupied")]
    BucketRemoveRid(usize),

    #[error("cannot insert entry: {0}")]
    NodeInsertEntry(String),

    #[error("unsupported field type/size: {0}")]
    FieldType(String),

    #[error("entry not found in index")]
    EntryNotFound,

    #[error("index metadata is corrupt: {0}")]
    CorruptMeta(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;
