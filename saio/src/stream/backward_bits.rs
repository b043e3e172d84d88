use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{BackwardStreamReader, Result, StreamError, StreamWriter};
use crate::config::BufferConfig;

/// Packs individual bits into 64-bit words, MSB-first within each word, and
/// appends a trailing `u64` header recording the total bit count once
/// closed — the header lands at the highest file offset, so a backward
/// reader sees it first.
pub struct BackwardBitStreamWriter {
    inner: StreamWriter<u64>,
    cur: u64,
    nbits: u32,
    total_bits: u64,
    path: PathBuf,
}

impl BackwardBitStreamWriter {
    pub fn new(path: impl AsRef<Path>, config: BufferConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let inner = StreamWriter::<u64>::new(&path, config)?;
        Ok(Self {
            inner,
            cur: 0,
            nbits: 0,
            total_bits: 0,
            path,
        })
    }

    pub fn write_bit(&mut self, bit: bool) {
        self.cur = (self.cur << 1) | (bit as u64);
        self.nbits += 1;
        self.total_bits += 1;
        if self.nbits == 64 {
            self.inner.write(self.cur);
            self.cur = 0;
            self.nbits = 0;
        }
    }

    pub fn write_bits(&mut self, value: u64, width: u32) {
        debug_assert!(width <= 64);
        for i in (0..width).rev() {
            self.write_bit((value >> i) & 1 == 1);
        }
    }

    /// Flushes the final partial word (if any) and appends the bit-count
    /// header. Consumes `self`: the underlying stream is closed as part of
    /// this call, so there is no separate `Drop`-based flush to rely on.
    pub fn close(mut self) -> Result<()> {
        if self.nbits > 0 {
            let word = self.cur << (64 - self.nbits);
            self.inner.write(word);
        }
        drop(self.inner);

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|source| StreamError::Io {
                path: self.path.clone(),
                source,
            })?;
        file.write_all(&self.total_bits.to_le_bytes())
            .map_err(|source| StreamError::Io {
                path: self.path.clone(),
                source,
            })?;
        Ok(())
    }
}

/// Reads a bit stream written by [`BackwardBitStreamWriter`], in reverse.
pub struct BackwardBitStreamReader {
    inner: BackwardStreamReader<u64>,
    word: u64,
    /// Next local bit position (0 = LSB) to read from `word`; 64 means the
    /// word is exhausted and a new one must be fetched.
    bit_pos: u32,
    total_bits_remaining: u64,
    /// Whether the next word fetch is the very first one. The first word
    /// read back is the writer's last (possibly partial) word, whose valid
    /// bit count is `total_bits mod 64` (or 64 if that's exactly 0); every
    /// word after it is a full 64-bit word.
    first_word: bool,
}

impl BackwardBitStreamReader {
    pub fn new(path: impl AsRef<Path>, config: BufferConfig) -> Result<Self> {
        let mut inner = BackwardStreamReader::<u64>::new(&path, config)?;
        let total_bits = inner.read().ok_or(StreamError::ShortRead {
            expected: 8,
            got: 0,
        })?;
        Ok(Self {
            inner,
            word: 0,
            bit_pos: 64,
            total_bits_remaining: total_bits,
            first_word: true,
        })
    }

    pub fn read_bit(&mut self) -> Option<bool> {
        if self.total_bits_remaining == 0 {
            return None;
        }
        if self.bit_pos == 64 {
            self.word = self.inner.read()?;
            let valid = if self.first_word {
                let w = (self.total_bits_remaining % 64) as u32;
                if w == 0 {
                    64
                } else {
                    w
                }
            } else {
                64
            };
            self.first_word = false;
            self.bit_pos = 64 - valid;
        }
        let bit = (self.word >> self.bit_pos) & 1 == 1;
        self.bit_pos += 1;
        self.total_bits_remaining -= 1;
        Some(bit)
    }

    pub fn read_bits(&mut self, width: u32) -> Option<u64> {
        let mut value = 0u64;
        for _ in 0..width {
            value = (value << 1) | self.read_bit()? as u64;
        }
        Some(value)
    }
}
