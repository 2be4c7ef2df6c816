//! Forward-only index scans.
//!
//! A scan starts at the leftmost leaf and walks the sibling chain, so RIDs
//! come out in key order. Entries that point at overflow buckets are
//! expanded by walking their whole chain before the scan moves on.

use crate::access::btree::key::IndexKey;
use crate::access::btree::node::TreeNode;
use crate::access::btree::{read_bucket, read_node, IndexHandle};
use crate::access::error::IndexResult;
use crate::access::Rid;
use crate::storage::{PagedFileManager, INVALID};
use std::cmp::Ordering;
use std::collections::VecDeque;

/// Comparison operator filtering a scan against a supplied key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    Equal,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    NotEqual,
}

impl CompOp {
    fn matches(self, ord: Ordering) -> bool {
        match self {
            CompOp::Equal => ord.is_eq(),
            CompOp::Less => ord.is_lt(),
            CompOp::Greater => ord.is_gt(),
            CompOp::LessEq => ord.is_le(),
            CompOp::GreaterEq => ord.is_ge(),
            CompOp::NotEqual => ord.is_ne(),
        }
    }

    /// Whether a scan can stop for good once an entry key compares to the
    /// bound as `ord`. Keys only grow along the leaf chain.
    fn exhausted(self, ord: Ordering) -> bool {
        match self {
            CompOp::Less => !ord.is_lt(),
            CompOp::LessEq | CompOp::Equal => ord.is_gt(),
            _ => false,
        }
    }
}

enum Verdict {
    Yield,
    Skip,
    Stop,
}

/// Iterator over the RIDs selected by a scan, in key order.
pub struct IndexScan<'a> {
    pfm: &'a mut PagedFileManager,
    handle: IndexHandle,
    filter: Option<(CompOp, IndexKey)>,
    leaf: TreeNode,
    entry_idx: usize,
    pending: VecDeque<Rid>,
    finished: bool,
}

impl<'a> IndexScan<'a> {
    pub(crate) fn new(
        pfm: &'a mut PagedFileManager,
        handle: IndexHandle,
        leftmost_leaf: TreeNode,
        filter: Option<(CompOp, IndexKey)>,
    ) -> Self {
        Self {
            pfm,
            handle,
            filter,
            leaf: leftmost_leaf,
            entry_idx: 0,
            pending: VecDeque::new(),
            finished: false,
        }
    }

    fn judge(&self, key: &IndexKey) -> Verdict {
        match &self.filter {
            None => Verdict::Yield,
            Some((op, bound)) => {
                let ord = key.compare(bound);
                if op.matches(ord) {
                    Verdict::Yield
                } else if op.exhausted(ord) {
                    Verdict::Stop
                } else {
                    Verdict::Skip
                }
            }
        }
    }

    /// Queue every RID of a bucket chain, in chain order.
    fn expand_bucket_chain(&mut self, head: i32) -> IndexResult<()> {
        let mut page = head;
        while page != INVALID {
            let bucket = read_bucket(self.pfm, &self.handle, page)?;
            self.pending
                .extend(bucket.all_rids().into_iter().map(|(rid, _)| rid));
            page = bucket.next_page();
        }
        Ok(())
    }

    fn advance(&mut self) -> IndexResult<Option<Rid>> {
        loop {
            if let Some(rid) = self.pending.pop_front() {
                return Ok(Some(rid));
            }
            if self.finished {
                return Ok(None);
            }
            if self.entry_idx >= self.leaf.entries.len() {
                if self.leaf.next_sib == INVALID {
                    self.finished = true;
                    return Ok(None);
                }
                self.leaf = read_node(self.pfm, &self.handle, self.leaf.next_sib)?;
                self.entry_idx = 0;
                continue;
            }

            let entry = self.leaf.entries[self.entry_idx].clone();
            self.entry_idx += 1;
            match self.judge(&entry.key) {
                Verdict::Skip => continue,
                Verdict::Stop => {
                    self.finished = true;
                    return Ok(None);
                }
                Verdict::Yield => {
                    if entry.slot_num != INVALID {
                        return Ok(Some(Rid::new(entry.page_num, entry.slot_num)));
                    }
                    self.expand_bucket_chain(entry.page_num)?;
                }
            }
        }
    }
}

impl Iterator for IndexScan<'_> {
    type Item = IndexResult<Rid>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(Some(rid)) => Some(Ok(rid)),
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
