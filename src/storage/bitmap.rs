//! Fixed-capacity occupancy bitmap.
//!
//! Every on-disk structure that tracks slot occupancy embeds one of these
//! directly inside its page image: capacity N bits stored in ceil(N/8)
//! bytes, bit = 1 meaning "slot occupied".

/// A fixed-capacity bit vector with an exact byte-image representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    bits: Vec<u8>,
    capacity: usize,
}

impl Bitmap {
    /// Number of bytes needed to hold `capacity` bits.
    pub fn byte_len(capacity: usize) -> usize {
        capacity.div_ceil(8)
    }

    /// Create an all-free bitmap of `capacity` bits.
    pub fn new(capacity: usize) -> Self {
        Self {
            bits: vec![0u8; Self::byte_len(capacity)],
            capacity,
        }
    }

    /// Reconstruct a bitmap from its exact byte image.
    ///
    /// `bytes` must hold at least `byte_len(capacity)` bytes; extra bytes
    /// are ignored.
    pub fn from_bytes(bytes: &[u8], capacity: usize) -> Self {
        let len = Self::byte_len(capacity);
        debug_assert!(bytes.len() >= len);
        Self {
            bits: bytes[..len].to_vec(),
            capacity,
        }
    }

    /// The exact byte image; `from_bytes` round-trips it.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, idx: usize) -> bool {
        debug_assert!(idx < self.capacity);
        self.bits[idx / 8] & (1 << (idx % 8)) != 0
    }

    pub fn set(&mut self, idx: usize, occupied: bool) {
        debug_assert!(idx < self.capacity);
        if occupied {
            self.bits[idx / 8] |= 1 << (idx % 8);
        } else {
            self.bits[idx / 8] &= !(1 << (idx % 8));
        }
    }

    /// Index of the first free bit, or `None` when every bit below
    /// `capacity` is set.
    ///
    /// Scans byte-by-byte, skipping fully occupied bytes. Trailing bits of
    /// the last byte that lie beyond `capacity` are never reported.
    pub fn first_free(&self) -> Option<usize> {
        for (byte_idx, &byte) in self.bits.iter().enumerate() {
            if byte == 0xff {
                continue;
            }
            for bit in 0..8 {
                let idx = byte_idx * 8 + bit;
                if idx >= self.capacity {
                    return None;
                }
                if byte & (1 << bit) == 0 {
                    return Some(idx);
                }
            }
        }
        None
    }

    /// Indices of all occupied bits, ascending.
    pub fn occupied_slots(&self) -> Vec<usize> {
        (0..self.capacity).filter(|&i| self.get(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut bm = Bitmap::new(20);
        assert!(!bm.get(7));
        bm.set(7, true);
        assert!(bm.get(7));
        bm.set(7, false);
        assert!(!bm.get(7));
    }

    #[test]
    fn test_first_free_skips_full_bytes() {
        let mut bm = Bitmap::new(24);
        for i in 0..8 {
            bm.set(i, true);
        }
        assert_eq!(bm.first_free(), Some(8));
        bm.set(8, true);
        assert_eq!(bm.first_free(), Some(9));
    }

    #[test]
    fn test_first_free_respects_odd_capacity() {
        // Capacity 10: bits 10..16 of the second byte are padding and must
        // never be reported as free.
        let mut bm = Bitmap::new(10);
        for i in 0..10 {
            bm.set(i, true);
        }
        assert_eq!(bm.first_free(), None);
    }

    #[test]
    fn test_round_trip() {
        let mut bm = Bitmap::new(19);
        for &i in &[0, 3, 8, 17, 18] {
            bm.set(i, true);
        }
        let restored = Bitmap::from_bytes(bm.as_bytes(), 19);
        assert_eq!(restored.occupied_slots(), vec![0, 3, 8, 17, 18]);
    }

    #[test]
    fn test_occupied_slots_empty() {
        let bm = Bitmap::new(16);
        assert!(bm.occupied_slots().is_empty());
        assert_eq!(bm.first_free(), Some(0));
    }
}
