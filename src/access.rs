//! Access layer: the disk-resident B+-tree secondary index.
//!
//! This module turns the page-granular storage surface into a typed index
//! structure:
//!
//! - **IndexManager / IndexHandle**: index-file lifecycle and entry
//!   insert/remove/scan, keyed by `(base name, index number)`
//! - **TreeNode**: the B+-tree page format and insert/split algorithm
//! - **Bucket**: overflow page chains holding every RID of a duplicate key
//! - **IndexKey / FieldType**: typed keys with natural ordering
//!
//! The index never interprets the RIDs it stores; they are opaque payloads
//! naming records managed by layers above this crate.

pub mod btree;
pub mod error;

pub use btree::iterator::{CompOp, IndexScan};
pub use btree::key::{FieldType, IndexKey};
pub use btree::{IndexHandle, IndexManager};
pub use error::{IndexError, IndexResult};

use crate::storage::INVALID;

/// Record identifier: `(page, slot)` naming a record stored outside the
/// index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rid {
    pub page_num: i32,
    pub slot_num: i32,
}

impl Rid {
    pub fn new(page_num: i32, slot_num: i32) -> Self {
        Self { page_num, slot_num }
    }

    /// The sentinel RID, used where no record is referenced.
    pub fn invalid() -> Self {
        Self {
            page_num: INVALID,
            slot_num: INVALID,
        }
    }
}
