//! Index lifecycle and the B+-tree insertion/removal algorithm.
//!
//! An index lives in one file named `"{base}.{index_no}"`: page 0 holds the
//! index metadata, page 1 is the root node and keeps that page number for
//! the tree's entire lifetime — when the root splits, its old content is
//! relocated to a fresh page and the root page is rebuilt in place as an
//! internal node over the two halves.
//!
//! Split propagation climbs ancestors with an explicit loop over parent
//! page numbers, reloading each ancestor from the paged store, rather than
//! recursing on the call stack.

pub mod bucket;
pub mod iterator;
pub mod key;
pub mod node;

use crate::access::error::{IndexError, IndexResult};
use crate::access::Rid;
use crate::storage::{PageNum, PagedFileManager, FileId, INVALID};
use bucket::{bucket_capacity, Bucket};
use byteorder::{ByteOrder, LittleEndian};
use iterator::{CompOp, IndexScan};
use key::{FieldType, IndexKey};
use node::{node_capacity, Entry, NodeType, TreeNode};
use std::cmp::Ordering;

/// Page holding the index metadata.
const META_PAGE: PageNum = PageNum(0);

/// Fixed, never-reused page number of the root node.
const ROOT: i32 = 1;

/// Per-index metadata and file handle. Obtained from
/// [`IndexManager::open_index`]; all tree operations go through the manager.
#[derive(Debug, Clone, Copy)]
pub struct IndexHandle {
    file: FileId,
    field_type: FieldType,
    field_size: usize,
    /// Entries per tree node, derived from page size and entry size.
    capacity: usize,
    /// RID slots per overflow bucket page.
    bucket_capacity: usize,
}

impl IndexHandle {
    pub fn file(&self) -> FileId {
        self.file
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn field_size(&self) -> usize {
        self.field_size
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn bucket_capacity(&self) -> usize {
        self.bucket_capacity
    }
}

/// Creates, opens, and mutates per-field index files.
pub struct IndexManager {
    pfm: PagedFileManager,
}

pub(crate) fn read_node(
    pfm: &mut PagedFileManager,
    handle: &IndexHandle,
    page: i32,
) -> IndexResult<TreeNode> {
    let data = pfm.read_page(handle.file, PageNum(page as u32))?;
    TreeNode::from_page(data, handle.field_type, handle.field_size)
}

pub(crate) fn read_bucket(
    pfm: &mut PagedFileManager,
    handle: &IndexHandle,
    page: i32,
) -> IndexResult<Bucket> {
    let data = pfm.read_page(handle.file, PageNum(page as u32))?;
    Ok(Bucket::from_page(data, handle.bucket_capacity))
}

impl IndexManager {
    pub fn new(pfm: PagedFileManager) -> Self {
        Self { pfm }
    }

    /// The underlying paged store, shared with whatever other structures
    /// the embedding system keeps in it.
    pub fn storage(&mut self) -> &mut PagedFileManager {
        &mut self.pfm
    }

    fn index_file_name(base: &str, index_no: u32) -> String {
        format!("{}.{}", base, index_no)
    }

    /// Create the index file for `(base, index_no)`: a meta page and an
    /// empty root leaf. The file is left closed.
    pub fn create_index(
        &mut self,
        base: &str,
        index_no: u32,
        field_type: FieldType,
        field_size: usize,
    ) -> IndexResult<()> {
        field_type.check_size(field_size)?;
        let page_size = self.pfm.page_size();
        let capacity = node_capacity(page_size, field_size);
        if capacity < 2 {
            return Err(IndexError::FieldType(format!(
                "field size {} leaves room for {} entries per node",
                field_size, capacity
            )));
        }

        let name = Self::index_file_name(base, index_no);
        self.pfm.create_file(&name)?;
        let file = self.pfm.open_file(&name)?;
        self.pfm.allocate_pages(file, 2)?;

        let mut meta = vec![0u8; page_size];
        LittleEndian::write_i32(&mut meta[0..4], field_type.to_tag());
        LittleEndian::write_i32(&mut meta[4..8], field_size as i32);
        LittleEndian::write_i32(&mut meta[8..12], ROOT);
        self.pfm.write_page(file, META_PAGE, &meta)?;

        let root = TreeNode::new(NodeType::Leaf, ROOT);
        let data = root.to_page(page_size, field_size)?;
        self.pfm.write_page(file, PageNum(ROOT as u32), &data)?;

        self.pfm.close_file(file)?;
        Ok(())
    }

    /// Open an existing index, reading its metadata from page 0.
    pub fn open_index(&mut self, base: &str, index_no: u32) -> IndexResult<IndexHandle> {
        let name = Self::index_file_name(base, index_no);
        let file = self.pfm.open_file(&name)?;

        let (tag, field_size, root) = {
            let data = self.pfm.read_page(file, META_PAGE)?;
            (
                LittleEndian::read_i32(&data[0..4]),
                LittleEndian::read_i32(&data[4..8]),
                LittleEndian::read_i32(&data[8..12]),
            )
        };

        let handle = FieldType::from_tag(tag)
            .and_then(|field_type| {
                if root != ROOT || field_size <= 0 {
                    return Err(IndexError::CorruptMeta(format!(
                        "root page {} / field size {}",
                        root, field_size
                    )));
                }
                let field_size = field_size as usize;
                field_type.check_size(field_size)?;
                Ok(IndexHandle {
                    file,
                    field_type,
                    field_size,
                    capacity: node_capacity(self.pfm.page_size(), field_size),
                    bucket_capacity: bucket_capacity(self.pfm.page_size()),
                })
            })
            .map_err(|e| {
                let _ = self.pfm.close_file(file);
                e
            })?;
        Ok(handle)
    }

    /// Flush and close the index file.
    pub fn close_index(&mut self, handle: IndexHandle) -> IndexResult<()> {
        self.pfm.close_file(handle.file)?;
        Ok(())
    }

    /// Delete a closed index file.
    pub fn remove_index(&mut self, base: &str, index_no: u32) -> IndexResult<()> {
        let name = Self::index_file_name(base, index_no);
        self.pfm.remove_file(&name)?;
        Ok(())
    }

    /// Insert `(key, rid)` with a zero verbose tag.
    pub fn insert_entry(
        &mut self,
        handle: &IndexHandle,
        key: &IndexKey,
        rid: Rid,
    ) -> IndexResult<()> {
        self.insert_entry_tagged(handle, key, rid, 0)
    }

    /// Insert `(key, rid)` carrying an opaque caller-supplied tag. The tag
    /// is stored alongside the RID when the key overflows into a bucket;
    /// it is never interpreted by the index.
    pub fn insert_entry_tagged(
        &mut self,
        handle: &IndexHandle,
        key: &IndexKey,
        rid: Rid,
        verbose: i32,
    ) -> IndexResult<()> {
        self.check_key_type(handle, key)?;
        let mut leaf = self.find_leaf(handle, key)?;
        let idx = leaf.search_child_idx(key);

        if idx > 0 && leaf.entries[idx - 1].key.compare(key) == Ordering::Equal {
            return self.insert_duplicate(handle, leaf, idx - 1, rid, verbose);
        }

        leaf.entries.insert(
            idx,
            Entry {
                key: key.clone(),
                page_num: rid.page_num,
                slot_num: rid.slot_num,
            },
        );
        if leaf.entries.len() <= handle.capacity {
            return self.store_node(handle, &leaf);
        }
        self.split_node(handle, leaf)
    }

    /// Remove one `(key, rid)` pair. Fails with
    /// [`IndexError::EntryNotFound`] when the key or the RID is absent.
    pub fn remove_entry(
        &mut self,
        handle: &IndexHandle,
        key: &IndexKey,
        rid: Rid,
    ) -> IndexResult<()> {
        self.check_key_type(handle, key)?;
        let mut leaf = self.find_leaf(handle, key)?;
        let idx = leaf.search_child_idx(key);
        if idx == 0 || leaf.entries[idx - 1].key.compare(key) != Ordering::Equal {
            return Err(IndexError::EntryNotFound);
        }

        let entry = leaf.entries[idx - 1].clone();
        if entry.slot_num != INVALID {
            if Rid::new(entry.page_num, entry.slot_num) != rid {
                return Err(IndexError::EntryNotFound);
            }
            leaf.entries.remove(idx - 1);
            return self.store_node(handle, &leaf);
        }

        // The entry points at a bucket chain; find the bucket holding rid.
        let head = entry.page_num;
        let mut page = head;
        loop {
            let mut bucket = self.load_bucket(handle, page)?;
            if let Some(slot) = bucket.search_rid(rid) {
                bucket.remove_rid(slot)?;
                self.store_bucket(handle, page, &bucket)?;
                if self.chain_rid_total(handle, head)? == 0 {
                    // Last RID of the key is gone; drop the leaf entry so
                    // scans stay exact. Bucket pages are never reclaimed.
                    leaf.entries.remove(idx - 1);
                    self.store_node(handle, &leaf)?;
                }
                return Ok(());
            }
            match bucket.next_page() {
                INVALID => return Err(IndexError::EntryNotFound),
                next => page = next,
            }
        }
    }

    /// Forward-only scan over the leaf chain, yielding RIDs in key order
    /// (bucket chains included). `filter` of `None` yields everything.
    pub fn scan(
        &mut self,
        handle: &IndexHandle,
        filter: Option<(CompOp, IndexKey)>,
    ) -> IndexResult<IndexScan<'_>> {
        if let Some((_, key)) = &filter {
            self.check_key_type(handle, key)?;
        }
        let leaf = self.leftmost_leaf(handle)?;
        Ok(IndexScan::new(&mut self.pfm, *handle, leaf, filter))
    }

    /// Tree height: 1 for a lone root leaf.
    pub fn height(&mut self, handle: &IndexHandle) -> IndexResult<u32> {
        let mut height = 1;
        let mut node = self.load_node(handle, ROOT)?;
        while !node.is_leaf() {
            height += 1;
            node = self.load_node(handle, node.first_child)?;
        }
        Ok(height)
    }

    fn check_key_type(&self, handle: &IndexHandle, key: &IndexKey) -> IndexResult<()> {
        if key.field_type() != handle.field_type {
            return Err(IndexError::FieldType(format!(
                "key type {:?} does not match index type {:?}",
                key.field_type(),
                handle.field_type
            )));
        }
        Ok(())
    }

    fn load_node(&mut self, handle: &IndexHandle, page: i32) -> IndexResult<TreeNode> {
        read_node(&mut self.pfm, handle, page)
    }

    fn store_node(&mut self, handle: &IndexHandle, node: &TreeNode) -> IndexResult<()> {
        let data = node.to_page(self.pfm.page_size(), handle.field_size)?;
        self.pfm
            .write_page(handle.file, PageNum(node.page_num as u32), &data)?;
        Ok(())
    }

    fn load_bucket(&mut self, handle: &IndexHandle, page: i32) -> IndexResult<Bucket> {
        read_bucket(&mut self.pfm, handle, page)
    }

    fn store_bucket(
        &mut self,
        handle: &IndexHandle,
        page: i32,
        bucket: &Bucket,
    ) -> IndexResult<()> {
        let data = bucket.to_page(self.pfm.page_size());
        self.pfm
            .write_page(handle.file, PageNum(page as u32), &data)?;
        Ok(())
    }

    fn alloc_page(&mut self, handle: &IndexHandle) -> IndexResult<i32> {
        let page = self.pfm.append_page(handle.file, None)?;
        Ok(page.0 as i32)
    }

    /// Descend from the root to the leaf that owns `key`.
    fn find_leaf(&mut self, handle: &IndexHandle, key: &IndexKey) -> IndexResult<TreeNode> {
        let mut node = self.load_node(handle, ROOT)?;
        while !node.is_leaf() {
            let child = node.child_for(key);
            node = self.load_node(handle, child)?;
        }
        Ok(node)
    }

    fn leftmost_leaf(&mut self, handle: &IndexHandle) -> IndexResult<TreeNode> {
        let mut node = self.load_node(handle, ROOT)?;
        while !node.is_leaf() {
            node = self.load_node(handle, node.first_child)?;
        }
        Ok(node)
    }

    /// Sum of RID counts across a bucket chain.
    fn chain_rid_total(&mut self, handle: &IndexHandle, head: i32) -> IndexResult<u32> {
        let mut total = 0;
        let mut page = head;
        while page != INVALID {
            let bucket = self.load_bucket(handle, page)?;
            total += bucket.rid_count();
            page = bucket.next_page();
        }
        Ok(total)
    }

    /// Add a RID under a key that already has a leaf entry.
    fn insert_duplicate(
        &mut self,
        handle: &IndexHandle,
        mut leaf: TreeNode,
        entry_idx: usize,
        rid: Rid,
        verbose: i32,
    ) -> IndexResult<()> {
        let entry = leaf.entries[entry_idx].clone();

        if entry.slot_num != INVALID {
            // Still a direct single-RID entry: move both RIDs into a fresh
            // bucket and point the entry at it.
            let bucket_page = self.alloc_page(handle)?;
            let mut bucket = Bucket::new(handle.bucket_capacity);
            bucket.insert_rid(Rid::new(entry.page_num, entry.slot_num), 0)?;
            bucket.insert_rid(rid, verbose)?;
            self.store_bucket(handle, bucket_page, &bucket)?;
            leaf.entries[entry_idx].page_num = bucket_page;
            leaf.entries[entry_idx].slot_num = INVALID;
            return self.store_node(handle, &leaf);
        }

        // Walk the chain to the first bucket with free space.
        let mut page = entry.page_num;
        loop {
            let mut bucket = self.load_bucket(handle, page)?;
            if !bucket.is_full() {
                bucket.insert_rid(rid, verbose)?;
                return self.store_bucket(handle, page, &bucket);
            }
            if bucket.next_page() == INVALID {
                let new_page = self.alloc_page(handle)?;
                let mut fresh = Bucket::new(handle.bucket_capacity);
                fresh.insert_rid(rid, verbose)?;
                self.store_bucket(handle, new_page, &fresh)?;
                bucket.set_next_page(new_page);
                return self.store_bucket(handle, page, &bucket);
            }
            page = bucket.next_page();
        }
    }

    /// Split an overflowing node (capacity + 1 entries in memory) and climb
    /// ancestors until the promoted entries find room.
    fn split_node(&mut self, handle: &IndexHandle, mut node: TreeNode) -> IndexResult<()> {
        loop {
            debug_assert_eq!(node.entries.len(), handle.capacity + 1);
            let mid = (handle.capacity + 1) / 2;
            let sib_page = self.alloc_page(handle)?;
            let mut sibling = TreeNode::new(node.node_type, sib_page);
            let promoted = node.entries[mid].key.clone();

            if node.is_leaf() {
                // The promoted key must remain searchable as leaf data, so
                // the sibling keeps the middle entry.
                sibling.entries = node.entries.split_off(mid);
            } else {
                sibling.first_child = node.entries[mid].page_num;
                sibling.entries = node.entries.split_off(mid + 1);
                node.entries.truncate(mid);
                for child in sibling.children() {
                    let mut c = self.load_node(handle, child)?;
                    c.parent = sib_page;
                    self.store_node(handle, &c)?;
                }
            }

            sibling.prev_sib = node.page_num;
            sibling.next_sib = node.next_sib;
            if node.next_sib != INVALID {
                let mut right = self.load_node(handle, node.next_sib)?;
                right.prev_sib = sib_page;
                self.store_node(handle, &right)?;
            }
            node.next_sib = sib_page;

            if node.parent == INVALID {
                // Root split: relocate the old root's content to a fresh
                // page and rebuild the fixed root page as an internal node
                // over the two halves.
                let left_page = self.alloc_page(handle)?;
                node.page_num = left_page;
                node.parent = ROOT;
                sibling.prev_sib = left_page;
                sibling.parent = ROOT;
                if !node.is_leaf() {
                    for child in node.children() {
                        let mut c = self.load_node(handle, child)?;
                        c.parent = left_page;
                        self.store_node(handle, &c)?;
                    }
                }
                self.store_node(handle, &node)?;
                self.store_node(handle, &sibling)?;

                let mut root = TreeNode::new(NodeType::Internal, ROOT);
                root.first_child = left_page;
                root.entries.push(Entry {
                    key: promoted,
                    page_num: sib_page,
                    slot_num: INVALID,
                });
                return self.store_node(handle, &root);
            }

            sibling.parent = node.parent;
            let parent_page = node.parent;
            self.store_node(handle, &node)?;
            self.store_node(handle, &sibling)?;

            let mut parent = self.load_node(handle, parent_page)?;
            let idx = parent.search_child_idx(&promoted);
            if idx > 0 && parent.entries[idx - 1].key.compare(&promoted) == Ordering::Equal {
                return Err(IndexError::NodeInsertEntry(
                    "repeated key in internal node".to_string(),
                ));
            }
            parent.entries.insert(
                idx,
                Entry {
                    key: promoted,
                    page_num: sib_page,
                    slot_num: INVALID,
                },
            );
            if parent.entries.len() <= handle.capacity {
                return self.store_node(handle, &parent);
            }
            node = parent;
        }
    }
}
