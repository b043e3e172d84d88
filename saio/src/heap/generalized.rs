use super::bucket::Bucket;
use super::{HeapError, Result};
use crate::config::Digits;

/// A radix heap whose digits may be wider than a single bit.
///
/// `digits` partitions the 64-bit key space into digit groups of widths
/// `r_0, r_1, ...` (least significant first). A key's bucket is identified
/// by `(digit_index, digit_value)`: the digit group containing the highest
/// bit at which the key differs from the current minimum, and that key's
/// value within that digit group. Redistribute scans digit groups from
/// least to most significant, and digit values ascending within a group —
/// under the monotone-push precondition, a non-empty bucket's digit value
/// is always greater than the minimum's digit value at that position, so
/// ascending order is sufficient to find the smallest candidate.
pub struct GeneralizedRadixHeap<V> {
    digits: Digits,
    bucket_zero: Bucket<V>,
    buckets: Vec<Vec<Bucket<V>>>,
    min_key: u64,
    len: usize,
}

impl<V> GeneralizedRadixHeap<V> {
    pub fn new(digits: Digits) -> Self {
        let buckets = (0..digits.len())
            .map(|d| (0..(1usize << digits.width(d))).map(|_| Bucket::new()).collect())
            .collect();
        Self {
            digits,
            bucket_zero: Bucket::new(),
            buckets,
            min_key: 0,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, key: u64, value: V) -> Result<()> {
        if key > self.digits.max_key() {
            return Err(HeapError::KeyOverflow {
                key,
                bits: self.digits.key_bits(),
            });
        }
        if key < self.min_key {
            return Err(HeapError::NonMonotonicPush {
                key,
                min: self.min_key,
            });
        }
        self.place(key, value);
        self.len += 1;
        Ok(())
    }

    fn place(&mut self, key: u64, value: V) {
        if key == self.min_key {
            self.bucket_zero.push(key, value);
            return;
        }
        let diff = key ^ self.min_key;
        let highest_bit = 63 - diff.leading_zeros();
        let digit = self.digits.digit_for_bit(highest_bit);
        let value_idx = self.digits.value(key, digit);
        self.buckets[digit][value_idx].push(key, value);
    }

    pub fn peek_key(&mut self) -> Option<u64> {
        self.ensure_bucket_zero();
        (!self.bucket_zero.is_empty()).then_some(self.min_key)
    }

    pub fn pop(&mut self) -> Option<(u64, V)> {
        self.ensure_bucket_zero();
        if self.bucket_zero.is_empty() {
            return None;
        }
        self.len -= 1;
        self.bucket_zero.pop()
    }

    fn ensure_bucket_zero(&mut self) {
        if !self.bucket_zero.is_empty() || self.len == 0 {
            return;
        }
        let (digit, value_idx) = (0..self.digits.len())
            .find_map(|d| {
                (0..self.buckets[d].len())
                    .find(|&v| !self.buckets[d][v].is_empty())
                    .map(|v| (d, v))
            })
            .expect("len > 0 implies some bucket is non-empty");

        self.min_key = self.buckets[digit][value_idx]
            .min_seen()
            .expect("non-empty bucket has a tracked minimum");

        for (key, value) in self.buckets[digit][value_idx].drain() {
            self.place(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_sorted_order_with_wide_digits() {
        let digits = Digits::uniform(8, 64).unwrap();
        let mut heap = GeneralizedRadixHeap::new(digits);

        let mut keys: Vec<u64> = (0..500).map(|i| (i * 2654435761u64) & 0xff_ffff).collect();
        keys.sort_unstable();
        for &k in &keys {
            heap.push(k, ()).unwrap();
        }

        let mut out = Vec::new();
        while let Some((k, _)) = heap.pop() {
            out.push(k);
        }
        assert_eq!(out, keys);
    }

    #[test]
    fn mixed_digit_widths() {
        let digits = Digits::new(vec![4, 4, 8, 16, 32], 64).unwrap();
        let mut heap = GeneralizedRadixHeap::new(digits);
        let mut keys = vec![1u64, 1, 2, 1000, 1 << 20, u32::MAX as u64];
        keys.sort_unstable();
        for &k in &keys {
            heap.push(k, k).unwrap();
        }
        let mut out = Vec::new();
        while let Some((k, v)) = heap.pop() {
            assert_eq!(k, v);
            out.push(k);
        }
        assert_eq!(out, keys);
    }

    #[test]
    fn rejects_non_monotonic_push() {
        let digits = Digits::uniform(16, 64).unwrap();
        let mut heap = GeneralizedRadixHeap::new(digits);
        heap.push(100, ()).unwrap();
        let _ = heap.pop();
        assert!(heap.push(50, ()).is_err());
    }

    #[test]
    fn rejects_a_key_wider_than_the_configured_digits() {
        let digits = Digits::uniform(8, 24).unwrap();
        let mut heap = GeneralizedRadixHeap::new(digits);
        assert!(heap.push(1 << 24, ()).is_err());
        assert!(heap.push((1 << 24) - 1, ()).is_ok());
    }
}
