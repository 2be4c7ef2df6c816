//! Overflow bucket pages for duplicate index keys.
//!
//! When a key gains a second RID, the leaf entry stops pointing at a record
//! and starts pointing at the head of a bucket chain. Each bucket fills
//! exactly one page:
//!
//! ```text
//! | rid_count: i32 | next_page: i32 | occupancy bitmap | slot array |
//! ```
//!
//! with 12-byte slots `(page_num: i32, slot_num: i32, verbose: i32)`. The
//! `verbose` value is an opaque caller-supplied tag carried 1:1 with each
//! RID; the index never interprets it.

use crate::access::error::{IndexError, IndexResult};
use crate::access::Rid;
use crate::storage::{Bitmap, INVALID};
use byteorder::{ByteOrder, LittleEndian};

pub const BUCKET_HEADER_SIZE: usize = 8;
pub const BUCKET_SLOT_SIZE: usize = 12;

/// Largest slot count whose header + bitmap + slot array fits in one page.
pub fn bucket_capacity(page_size: usize) -> usize {
    let mut cap = (page_size - BUCKET_HEADER_SIZE) * 8 / (BUCKET_SLOT_SIZE * 8 + 1);
    while BUCKET_HEADER_SIZE + Bitmap::byte_len(cap) + cap * BUCKET_SLOT_SIZE > page_size {
        cap -= 1;
    }
    cap
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BucketSlot {
    rid: Rid,
    verbose: i32,
}

/// In-memory image of one overflow bucket page.
#[derive(Debug, Clone)]
pub struct Bucket {
    rid_count: u32,
    next_page: i32,
    bitmap: Bitmap,
    slots: Vec<BucketSlot>,
}

impl Bucket {
    /// A fresh, empty bucket with `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            rid_count: 0,
            next_page: INVALID,
            bitmap: Bitmap::new(capacity),
            slots: vec![
                BucketSlot {
                    rid: Rid::invalid(),
                    verbose: 0,
                };
                capacity
            ],
        }
    }

    /// Parse a bucket from its page image.
    pub fn from_page(data: &[u8], capacity: usize) -> Self {
        let rid_count = LittleEndian::read_i32(&data[0..4]) as u32;
        let next_page = LittleEndian::read_i32(&data[4..8]);
        let bitmap_len = Bitmap::byte_len(capacity);
        let bitmap = Bitmap::from_bytes(&data[BUCKET_HEADER_SIZE..], capacity);
        let mut slots = Vec::with_capacity(capacity);
        let base = BUCKET_HEADER_SIZE + bitmap_len;
        for i in 0..capacity {
            let off = base + i * BUCKET_SLOT_SIZE;
            slots.push(BucketSlot {
                rid: Rid::new(
                    LittleEndian::read_i32(&data[off..off + 4]),
                    LittleEndian::read_i32(&data[off + 4..off + 8]),
                ),
                verbose: LittleEndian::read_i32(&data[off + 8..off + 12]),
            });
        }
        Self {
            rid_count,
            next_page,
            bitmap,
            slots,
        }
    }

    /// Serialize into a page image of `page_size` bytes.
    pub fn to_page(&self, page_size: usize) -> Vec<u8> {
        let mut data = vec![0u8; page_size];
        LittleEndian::write_i32(&mut data[0..4], self.rid_count as i32);
        LittleEndian::write_i32(&mut data[4..8], self.next_page);
        let bitmap_bytes = self.bitmap.as_bytes();
        data[BUCKET_HEADER_SIZE..BUCKET_HEADER_SIZE + bitmap_bytes.len()]
            .copy_from_slice(bitmap_bytes);
        let base = BUCKET_HEADER_SIZE + bitmap_bytes.len();
        for (i, slot) in self.slots.iter().enumerate() {
            let off = base + i * BUCKET_SLOT_SIZE;
            LittleEndian::write_i32(&mut data[off..off + 4], slot.rid.page_num);
            LittleEndian::write_i32(&mut data[off + 4..off + 8], slot.rid.slot_num);
            LittleEndian::write_i32(&mut data[off + 8..off + 12], slot.verbose);
        }
        data
    }

    pub fn rid_count(&self) -> u32 {
        self.rid_count
    }

    pub fn next_page(&self) -> i32 {
        self.next_page
    }

    /// Link a continuation bucket; used only when this bucket is full.
    pub fn set_next_page(&mut self, page: i32) {
        self.next_page = page;
    }

    pub fn is_full(&self) -> bool {
        self.rid_count as usize >= self.slots.len()
    }

    /// Store a RID in the first free slot. The caller is responsible for
    /// chaining a new bucket page when this fails.
    pub fn insert_rid(&mut self, rid: Rid, verbose: i32) -> IndexResult<usize> {
        let slot = self.bitmap.first_free().ok_or(IndexError::BucketInsertRid)?;
        self.bitmap.set(slot, true);
        self.slots[slot] = BucketSlot { rid, verbose };
        self.rid_count += 1;
        Ok(slot)
    }

    /// Clear an occupied slot.
    pub fn remove_rid(&mut self, slot: usize) -> IndexResult<()> {
        if slot >= self.slots.len() || !self.bitmap.get(slot) || self.rid_count == 0 {
            return Err(IndexError::BucketRemoveRid(slot));
        }
        self.bitmap.set(slot, false);
        self.slots[slot] = BucketSlot {
            rid: Rid::invalid(),
            verbose: 0,
        };
        self.rid_count -= 1;
        Ok(())
    }

    /// Slot holding `rid`, scanning occupied slots only.
    pub fn search_rid(&self, rid: Rid) -> Option<usize> {
        self.bitmap
            .occupied_slots()
            .into_iter()
            .find(|&slot| self.slots[slot].rid == rid)
    }

    /// Every occupied `(RID, verbose)` pair, in slot order.
    pub fn all_rids(&self) -> Vec<(Rid, i32)> {
        self.bitmap
            .occupied_slots()
            .into_iter()
            .map(|slot| (self.slots[slot].rid, self.slots[slot].verbose))
            .collect()
    }
}
