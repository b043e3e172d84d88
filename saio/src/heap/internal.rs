use super::bucket::Bucket;
use super::{HeapError, Result};

const N_BUCKETS: usize = 65; // bucket 0 (key == min_key) plus one per bit position 1..=64

/// An in-RAM binary radix heap over `u64` keys.
///
/// Bucket `id` for a key is `64 - leading_zeros(key ^ min_key)`: the
/// position (1-indexed from the LSB) of the highest bit at which `key`
/// differs from the current minimum, or `0` when they're equal. Because
/// `u64::leading_zeros` is well-defined (and returns 64) for a zero
/// argument, so this single formula already covers the `key == min_key`
/// case without a branch around a zero-width shift.
///
/// `push` requires `key >= current minimum`: keys must arrive in
/// non-decreasing order relative to the last popped value, same as any
/// monotone priority queue. Violating this is a programming error, not a
/// recoverable I/O condition, and is reported via [`HeapError`].
pub struct RadixHeap<V> {
    buckets: Vec<Bucket<V>>,
    min_key: u64,
    len: usize,
}

impl<V> RadixHeap<V> {
    pub fn new() -> Self {
        Self {
            buckets: (0..N_BUCKETS).map(|_| Bucket::new()).collect(),
            min_key: 0,
            len: 0,
        }
    }

    #[inline]
    fn bucket_id(key: u64, min_key: u64) -> usize {
        (64 - (key ^ min_key).leading_zeros()) as usize
    }

    pub fn push(&mut self, key: u64, value: V) -> Result<()> {
        if key < self.min_key {
            return Err(HeapError::NonMonotonicPush {
                key,
                min: self.min_key,
            });
        }
        let id = Self::bucket_id(key, self.min_key);
        self.buckets[id].push(key, value);
        self.len += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn peek_key(&mut self) -> Option<u64> {
        self.ensure_bucket_zero();
        (!self.buckets[0].is_empty()).then_some(self.min_key)
    }

    pub fn pop(&mut self) -> Option<(u64, V)> {
        self.ensure_bucket_zero();
        if self.buckets[0].is_empty() {
            return None;
        }
        self.len -= 1;
        self.buckets[0].pop()
    }

    fn ensure_bucket_zero(&mut self) {
        if !self.buckets[0].is_empty() || self.len == 0 {
            return;
        }
        let redistribute_id = (1..N_BUCKETS)
            .find(|&id| !self.buckets[id].is_empty())
            .expect("len > 0 implies some bucket is non-empty");

        self.min_key = self.buckets[redistribute_id]
            .min_seen()
            .expect("non-empty bucket has a tracked minimum");

        for (key, value) in self.buckets[redistribute_id].drain() {
            let id = Self::bucket_id(key, self.min_key);
            self.buckets[id].push(key, value);
        }
    }
}

impl<V> Default for RadixHeap<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_sorted_order() {
        let keys = [5u64, 1, 100, 3, 3, 0, 42];
        let mut sorted = keys.to_vec();
        sorted.sort_unstable();

        let mut heap = RadixHeap::new();
        for &k in &sorted {
            heap.push(k, ()).unwrap();
        }
        let mut out = Vec::new();
        while let Some((k, _)) = heap.pop() {
            out.push(k);
        }
        assert_eq!(out, sorted);
    }

    #[test]
    fn interleaved_push_pop_stays_sorted() {
        let mut heap = RadixHeap::new();
        heap.push(10, "a").unwrap();
        heap.push(20, "b").unwrap();
        assert_eq!(heap.pop(), Some((10, "a")));
        heap.push(15, "c").unwrap();
        heap.push(25, "d").unwrap();
        assert_eq!(heap.pop(), Some((15, "c")));
        assert_eq!(heap.pop(), Some((20, "b")));
        assert_eq!(heap.pop(), Some((25, "d")));
        assert_eq!(heap.pop(), None);
    }

    #[test]
    fn rejects_keys_below_current_minimum() {
        let mut heap = RadixHeap::new();
        heap.push(10, ()).unwrap();
        let _ = heap.pop();
        assert!(matches!(
            heap.push(5, ()),
            Err(HeapError::NonMonotonicPush { key: 5, min: 10 })
        ));
    }

    #[test]
    fn equal_keys_all_pop_before_anything_larger() {
        let mut heap = RadixHeap::new();
        for _ in 0..5 {
            heap.push(7, ()).unwrap();
        }
        heap.push(8, ()).unwrap();
        for _ in 0..5 {
            assert_eq!(heap.pop(), Some((7, ())));
        }
        assert_eq!(heap.pop(), Some((8, ())));
    }
}
