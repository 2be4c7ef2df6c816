//! LRU tracking over a fixed set of buffer-frame indices.
//!
//! [`IndexList`] is an ordered doubly linked list over the dense integer
//! domain `0..capacity`, with one extra sentinel index serving as both head
//! and tail. Links are plain index arrays, so ordering operations never
//! allocate. [`LruTracker`] wraps it with buffer-manager semantics.

/// Doubly linked list over indices `0..capacity`.
///
/// An index is either linked into the list or detached; detached nodes are
/// represented as self-loops, which makes `remove` idempotent.
#[derive(Debug)]
pub struct IndexList {
    next: Vec<usize>,
    prev: Vec<usize>,
    /// Sentinel index: `next[sentinel]` is the front, `prev[sentinel]` the back.
    sentinel: usize,
}

impl IndexList {
    pub fn new(capacity: usize) -> Self {
        let sentinel = capacity;
        let mut next: Vec<usize> = (0..=capacity).collect();
        let mut prev: Vec<usize> = (0..=capacity).collect();
        next[sentinel] = sentinel;
        prev[sentinel] = sentinel;
        Self {
            next,
            prev,
            sentinel,
        }
    }

    fn link(&mut self, idx: usize, after: usize) {
        let succ = self.next[after];
        self.next[after] = idx;
        self.prev[idx] = after;
        self.next[idx] = succ;
        self.prev[succ] = idx;
    }

    pub fn insert_front(&mut self, idx: usize) {
        self.remove(idx);
        let sentinel = self.sentinel;
        self.link(idx, sentinel);
    }

    pub fn insert_back(&mut self, idx: usize) {
        self.remove(idx);
        let tail = self.prev[self.sentinel];
        self.link(idx, tail);
    }

    /// Unlink `idx`. Removing an already-detached index is a no-op.
    pub fn remove(&mut self, idx: usize) {
        debug_assert!(idx < self.sentinel);
        if self.next[idx] == idx {
            return;
        }
        let (p, n) = (self.prev[idx], self.next[idx]);
        self.next[p] = n;
        self.prev[n] = p;
        self.next[idx] = idx;
        self.prev[idx] = idx;
    }

    /// Front of the list, or `None` when empty.
    pub fn front(&self) -> Option<usize> {
        let head = self.next[self.sentinel];
        (head != self.sentinel).then_some(head)
    }
}

/// LRU ordering over a fixed set of buffer frames.
///
/// The front of the chain is the least-recently-used frame. `find` only
/// inspects the front; the caller commits to reuse by calling [`access`],
/// which moves the frame to the most-recently-used position. This two-step
/// contract lets the buffer manager examine the victim's page (and flush it
/// if dirty) before taking the frame over.
///
/// [`access`]: LruTracker::access
#[derive(Debug)]
pub struct LruTracker {
    list: IndexList,
}

impl LruTracker {
    /// All `capacity` frames start in the chain, in index order, so an
    /// empty pool hands out frames 0, 1, 2, ...
    pub fn new(capacity: usize) -> Self {
        let mut list = IndexList::new(capacity);
        for idx in 0..capacity {
            list.insert_back(idx);
        }
        Self { list }
    }

    /// The current eviction victim, without unlinking it.
    pub fn find(&self) -> Option<usize> {
        self.list.front()
    }

    /// Mark a frame as just used: move it to the most-recently-used position.
    pub fn access(&mut self, frame: usize) {
        self.list.insert_back(frame);
    }

    /// Mark a frame as immediately reusable: move it to the front so it
    /// becomes the next eviction victim.
    pub fn free(&mut self, frame: usize) {
        self.list.insert_front(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(tracker: &mut LruTracker, n: usize) -> Vec<usize> {
        let mut order = Vec::with_capacity(n);
        for _ in 0..n {
            let victim = tracker.find().unwrap();
            tracker.access(victim);
            order.push(victim);
        }
        order
    }

    #[test]
    fn test_index_list_front_back() {
        let mut list = IndexList::new(4);
        assert_eq!(list.front(), None);

        list.insert_back(1);
        list.insert_back(2);
        list.insert_front(3);
        assert_eq!(list.front(), Some(3));

        list.remove(3);
        assert_eq!(list.front(), Some(1));
    }

    #[test]
    fn test_index_list_remove_idempotent() {
        let mut list = IndexList::new(4);
        list.insert_back(0);
        list.remove(0);
        list.remove(0);
        assert_eq!(list.front(), None);
    }

    #[test]
    fn test_reinsert_moves() {
        let mut list = IndexList::new(4);
        list.insert_back(0);
        list.insert_back(1);
        // Re-inserting an already-linked index relocates it.
        list.insert_back(0);
        assert_eq!(list.front(), Some(1));
    }

    #[test]
    fn test_initial_victim_order() {
        let mut tracker = LruTracker::new(4);
        assert_eq!(drain(&mut tracker, 4), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_access_moves_to_back() {
        let mut tracker = LruTracker::new(3);
        tracker.access(0);
        tracker.access(1);
        tracker.access(2);
        tracker.access(0);
        assert_eq!(drain(&mut tracker, 3), vec![1, 2, 0]);
    }

    #[test]
    fn test_find_does_not_unlink() {
        let tracker = LruTracker::new(2);
        assert_eq!(tracker.find(), Some(0));
        assert_eq!(tracker.find(), Some(0));
    }

    #[test]
    fn test_free_makes_next_victim() {
        let mut tracker = LruTracker::new(3);
        tracker.access(0);
        tracker.access(1);
        tracker.access(2);
        tracker.free(2);
        assert_eq!(tracker.find(), Some(2));
    }
}
