use std::collections::VecDeque;
use std::path::PathBuf;

use super::HeapError;
use crate::config::BufferConfig;
use crate::packed::PackedPair;
use crate::record::Record;
use crate::stream::{StreamReader, StreamWriter};

/// A single external-memory radix-heap bucket: a bounded-capacity RAM head
/// plus an on-disk spill file for whatever doesn't fit.
///
/// `head` is a sliding window holding the `head_cap` most recently pushed
/// items; once it's full, each further push evicts the oldest item in
/// `head` to the on-disk spill. So the spill always holds the older
/// (earlier-pushed) items and `head` the newer ones, and redistribute
/// drains the spill before the head to preserve that order.
///
/// Items are never read back from the spill file until the bucket as a
/// whole is drained (during redistribute), so there is no interleaved
/// read/write on the spill stream — satisfying the "no concurrent access
/// to the same stream" constraint trivially, one direction at a time.
pub(crate) struct ExternalBucket<V: Record> {
    head: VecDeque<(u64, V)>,
    head_cap: usize,
    spill_path: PathBuf,
    spill_writer: Option<StreamWriter<PackedPair<u64, V>>>,
    spill_len: u64,
    min_seen: Option<u64>,
    config: BufferConfig,
}

impl<V: Record> ExternalBucket<V> {
    pub fn new(head_cap: usize, spill_path: PathBuf, config: BufferConfig) -> Self {
        Self {
            head: VecDeque::new(),
            head_cap: head_cap.max(1),
            spill_path,
            spill_writer: None,
            spill_len: 0,
            min_seen: None,
            config,
        }
    }

    pub fn push(&mut self, key: u64, value: V) -> Result<(), HeapError> {
        self.min_seen = Some(match self.min_seen {
            Some(m) => m.min(key),
            None => key,
        });

        self.head.push_back((key, value));
        if self.head.len() > self.head_cap {
            let (evicted_key, evicted_value) = self
                .head
                .pop_front()
                .expect("head just grew past capacity, so it holds at least one item");
            if self.spill_writer.is_none() {
                self.spill_writer = Some(StreamWriter::new(&self.spill_path, self.config)?);
            }
            self.spill_writer
                .as_mut()
                .expect("just ensured spill writer exists")
                .write(PackedPair::new(evicted_key, evicted_value));
            self.spill_len += 1;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_empty() && self.spill_len == 0
    }

    pub fn len(&self) -> u64 {
        self.head.len() as u64 + self.spill_len
    }

    pub fn min_seen(&self) -> Option<u64> {
        self.min_seen
    }

    /// Drains the on-disk spill (the older items) and then the RAM head
    /// (the newer items), and resets the bucket to empty.
    pub fn drain(&mut self) -> Result<Vec<(u64, V)>, HeapError> {
        self.min_seen = None;
        let mut out: Vec<(u64, V)> = Vec::with_capacity(self.head.len() + self.spill_len as usize);

        if let Some(writer) = self.spill_writer.take() {
            drop(writer);
            let mut reader = StreamReader::<PackedPair<u64, V>>::new(&self.spill_path, self.config)?;
            for _ in 0..self.spill_len {
                let pair = reader
                    .read()
                    .ok_or_else(|| crate::stream::StreamError::ShortRead {
                        expected: self.spill_len as usize,
                        got: out.len(),
                    })?;
                out.push((pair.first(), pair.second()));
            }
            drop(reader);
            let _ = std::fs::remove_file(&self.spill_path);
            self.spill_len = 0;
        }

        out.extend(self.head.drain(..));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn spills_past_ram_head_capacity_and_drains_everything() {
        let dir = tempdir().unwrap();
        let spill_path = dir.path().join("bucket.spill");
        let mut bucket = ExternalBucket::<u32>::new(4, spill_path, BufferConfig::default());

        for i in 0..50u64 {
            bucket.push(i, i as u32).unwrap();
        }
        assert_eq!(bucket.len(), 50);

        let mut drained = bucket.drain().unwrap();
        drained.sort_unstable();
        let expected: Vec<(u64, u32)> = (0..50).map(|i| (i, i as u32)).collect();
        assert_eq!(drained, expected);
        assert!(bucket.is_empty());
    }

    #[test]
    fn entirely_in_ram_when_under_capacity() {
        let dir = tempdir().unwrap();
        let spill_path = dir.path().join("small.spill");
        let mut bucket = ExternalBucket::<u8>::new(100, spill_path.clone(), BufferConfig::default());
        bucket.push(1, 1).unwrap();
        bucket.push(2, 2).unwrap();
        assert!(!spill_path.exists());
        let drained = bucket.drain().unwrap();
        assert_eq!(drained, vec![(1, 1), (2, 2)]);
    }
}
