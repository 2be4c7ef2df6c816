//! B+-tree node page format.
//!
//! Every node fills one page: a 28-byte header followed by a dense array of
//! fixed-width entries.
//!
//! ```text
//! | node_type | parent | page_num | entry_count | prev_sib | next_sib | first_child |
//! | key (field_size bytes) page_num slot_num | ...
//! ```
//!
//! All header fields and entry trailers are little-endian `i32`, with
//! [`INVALID`] meaning "no page". Internal entries carry a child page and
//! `slot_num == INVALID`; leaf entries carry either a direct RID or, when
//! `slot_num == INVALID`, the head page of an overflow-bucket chain.
//!
//! A node's entries are always sorted ascending by key, except transiently
//! in the middle of a split, when a node may briefly hold capacity + 1
//! entries in memory.

use crate::access::btree::key::{FieldType, IndexKey};
use crate::access::error::IndexResult;
use crate::storage::INVALID;
use byteorder::{ByteOrder, LittleEndian};

pub const NODE_HEADER_SIZE: usize = 28;

/// Entries per node for the given page geometry.
pub fn node_capacity(page_size: usize, field_size: usize) -> usize {
    (page_size - NODE_HEADER_SIZE) / (field_size + 8)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Internal = 0,
    Leaf = 1,
}

/// One `(key, page_num, slot_num)` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: IndexKey,
    pub page_num: i32,
    pub slot_num: i32,
}

/// In-memory image of one tree-node page.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub node_type: NodeType,
    /// Parent page, `INVALID` only for the root.
    pub parent: i32,
    pub page_num: i32,
    pub prev_sib: i32,
    pub next_sib: i32,
    /// Leftmost child page; meaningful for internal nodes only.
    pub first_child: i32,
    pub entries: Vec<Entry>,
}

impl TreeNode {
    pub fn new(node_type: NodeType, page_num: i32) -> Self {
        Self {
            node_type,
            parent: INVALID,
            page_num,
            prev_sib: INVALID,
            next_sib: INVALID,
            first_child: INVALID,
            entries: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.node_type == NodeType::Leaf
    }

    /// Parse a node from its page image.
    pub fn from_page(
        data: &[u8],
        field_type: FieldType,
        field_size: usize,
    ) -> IndexResult<Self> {
        let node_type = if LittleEndian::read_i32(&data[0..4]) == NodeType::Leaf as i32 {
            NodeType::Leaf
        } else {
            NodeType::Internal
        };
        let parent = LittleEndian::read_i32(&data[4..8]);
        let page_num = LittleEndian::read_i32(&data[8..12]);
        let entry_count = LittleEndian::read_i32(&data[12..16]) as usize;
        let prev_sib = LittleEndian::read_i32(&data[16..20]);
        let next_sib = LittleEndian::read_i32(&data[20..24]);
        let first_child = LittleEndian::read_i32(&data[24..28]);

        let entry_size = field_size + 8;
        let mut entries = Vec::with_capacity(entry_count);
        for i in 0..entry_count {
            let off = NODE_HEADER_SIZE + i * entry_size;
            let key = IndexKey::read_from(field_type, &data[off..off + field_size])?;
            entries.push(Entry {
                key,
                page_num: LittleEndian::read_i32(&data[off + field_size..off + field_size + 4]),
                slot_num: LittleEndian::read_i32(
                    &data[off + field_size + 4..off + field_size + 8],
                ),
            });
        }
        Ok(Self {
            node_type,
            parent,
            page_num,
            prev_sib,
            next_sib,
            first_child,
            entries,
        })
    }

    /// Serialize into a page image of `page_size` bytes.
    pub fn to_page(&self, page_size: usize, field_size: usize) -> IndexResult<Vec<u8>> {
        let mut data = vec![0u8; page_size];
        LittleEndian::write_i32(&mut data[0..4], self.node_type as i32);
        LittleEndian::write_i32(&mut data[4..8], self.parent);
        LittleEndian::write_i32(&mut data[8..12], self.page_num);
        LittleEndian::write_i32(&mut data[12..16], self.entries.len() as i32);
        LittleEndian::write_i32(&mut data[16..20], self.prev_sib);
        LittleEndian::write_i32(&mut data[20..24], self.next_sib);
        LittleEndian::write_i32(&mut data[24..28], self.first_child);

        let entry_size = field_size + 8;
        debug_assert!(NODE_HEADER_SIZE + self.entries.len() * entry_size <= page_size);
        for (i, entry) in self.entries.iter().enumerate() {
            let off = NODE_HEADER_SIZE + i * entry_size;
            entry.key.write_to(&mut data[off..off + field_size], field_size)?;
            LittleEndian::write_i32(
                &mut data[off + field_size..off + field_size + 4],
                entry.page_num,
            );
            LittleEndian::write_i32(
                &mut data[off + field_size + 4..off + field_size + 8],
                entry.slot_num,
            );
        }
        Ok(data)
    }

    /// Binary search for the insertion/descent position of `key`: the index
    /// `i` such that every entry with key <= `key` lies left of `i`. An
    /// empty node yields 0.
    pub fn search_child_idx(&self, key: &IndexKey) -> usize {
        let mut lo = 0;
        let mut hi = self.entries.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.entries[mid].key.compare(key).is_le() {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Child page to descend into for `key`; internal nodes only.
    pub fn child_for(&self, key: &IndexKey) -> i32 {
        debug_assert!(!self.is_leaf());
        match self.search_child_idx(key) {
            0 => self.first_child,
            i => self.entries[i - 1].page_num,
        }
    }

    /// Every child page of an internal node, leftmost first.
    pub fn children(&self) -> Vec<i32> {
        debug_assert!(!self.is_leaf());
        let mut pages = Vec::with_capacity(self.entries.len() + 1);
        pages.push(self.first_child);
        pages.extend(self.entries.iter().map(|e| e.page_num));
        pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: usize = 256;

    fn leaf_with_keys(keys: &[i32]) -> TreeNode {
        let mut node = TreeNode::new(NodeType::Leaf, 1);
        for &k in keys {
            let idx = node.search_child_idx(&IndexKey::Int(k));
            node.entries.insert(
                idx,
                Entry {
                    key: IndexKey::Int(k),
                    page_num: k,
                    slot_num: 0,
                },
            );
        }
        node
    }

    #[test]
    fn test_capacity() {
        // (256 - 28) / (4 + 8) = 19
        assert_eq!(node_capacity(PAGE, 4), 19);
    }

    #[test]
    fn test_search_child_idx() {
        let node = leaf_with_keys(&[10, 20, 30]);
        assert_eq!(node.search_child_idx(&IndexKey::Int(5)), 0);
        assert_eq!(node.search_child_idx(&IndexKey::Int(10)), 1);
        assert_eq!(node.search_child_idx(&IndexKey::Int(15)), 1);
        assert_eq!(node.search_child_idx(&IndexKey::Int(30)), 3);
        assert_eq!(node.search_child_idx(&IndexKey::Int(99)), 3);

        let empty = TreeNode::new(NodeType::Leaf, 1);
        assert_eq!(empty.search_child_idx(&IndexKey::Int(1)), 0);
    }

    #[test]
    fn test_child_for() {
        let mut node = TreeNode::new(NodeType::Internal, 1);
        node.first_child = 100;
        node.entries.push(Entry {
            key: IndexKey::Int(10),
            page_num: 200,
            slot_num: crate::storage::INVALID,
        });
        assert_eq!(node.child_for(&IndexKey::Int(5)), 100);
        assert_eq!(node.child_for(&IndexKey::Int(10)), 200);
        assert_eq!(node.child_for(&IndexKey::Int(50)), 200);
        assert_eq!(node.children(), vec![100, 200]);
    }

    #[test]
    fn test_page_round_trip() {
        let mut node = leaf_with_keys(&[3, 1, 2]);
        node.parent = 9;
        node.prev_sib = 4;
        node.next_sib = 5;

        let data = node.to_page(PAGE, 4).unwrap();
        assert_eq!(data.len(), PAGE);
        let back = TreeNode::from_page(&data, FieldType::Int, 4).unwrap();
        assert_eq!(back.node_type, NodeType::Leaf);
        assert_eq!(back.parent, 9);
        assert_eq!(back.page_num, 1);
        assert_eq!(back.prev_sib, 4);
        assert_eq!(back.next_sib, 5);
        assert_eq!(back.entries, node.entries);
    }

    #[test]
    fn test_text_key_round_trip() {
        let mut node = TreeNode::new(NodeType::Leaf, 2);
        node.entries.push(Entry {
            key: IndexKey::Text("bob".into()),
            page_num: 1,
            slot_num: 2,
        });
        let data = node.to_page(PAGE, 16).unwrap();
        let back = TreeNode::from_page(&data, FieldType::Text, 16).unwrap();
        assert_eq!(back.entries[0].key, IndexKey::Text("bob".into()));
    }
}
