use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use super::{Result, StreamReader, StreamWriter};
use crate::config::BufferConfig;
use crate::record::Record;

fn part_path(base: &Path, idx: usize) -> PathBuf {
    PathBuf::from(format!("{}.{idx:04}", base.display()))
}

/// Splits a record stream across a sequence of part files, each holding at
/// most `part_capacity` records.
///
/// There is no separate manifest: the reader discovers where the stream
/// ends purely from which part files exist, the same way the writer
/// produces them.
pub struct MultipartStreamWriter<T: Record> {
    base: PathBuf,
    config: BufferConfig,
    part_capacity: usize,
    current: Option<StreamWriter<T>>,
    current_len: usize,
    next_part: usize,
    _marker: PhantomData<T>,
}

impl<T: Record> MultipartStreamWriter<T> {
    pub fn new(base: impl AsRef<Path>, config: BufferConfig, part_capacity: usize) -> Result<Self> {
        debug_assert!(part_capacity > 0, "a part must hold at least one record");
        Ok(Self {
            base: base.as_ref().to_path_buf(),
            config,
            part_capacity,
            current: None,
            current_len: 0,
            next_part: 0,
            _marker: PhantomData,
        })
    }

    pub fn write(&mut self, record: T) -> Result<()> {
        if self.current.is_none() || self.current_len == self.part_capacity {
            self.roll_part()?;
        }
        self.current
            .as_mut()
            .expect("just rolled a part")
            .write(record);
        self.current_len += 1;
        Ok(())
    }

    /// Appends a run of records, rolling parts as needed.
    pub fn write_slice(&mut self, values: &[T]) -> Result<()> {
        for &v in values {
            self.write(v)?;
        }
        Ok(())
    }

    fn roll_part(&mut self) -> Result<()> {
        self.current = Some(StreamWriter::new(part_path(&self.base, self.next_part), self.config)?);
        self.next_part += 1;
        self.current_len = 0;
        Ok(())
    }

    /// Flushes the last part. Consumes `self` so a caller can't keep
    /// writing after the stream is considered closed.
    pub fn close(mut self) -> Result<()> {
        self.current.take();
        Ok(())
    }
}

/// Reads a stream written by [`MultipartStreamWriter`], transparently
/// crossing part boundaries.
///
/// Parts are probed by existence alone: `base.0000`, `base.0001`, … is
/// opened in turn, drained, and the next one probed; a missing next part is
/// the normal end-of-stream signal, not an error.
pub struct MultipartStreamReader<T: Record> {
    base: PathBuf,
    config: BufferConfig,
    next_part: usize,
    current: Option<StreamReader<T>>,
    _marker: PhantomData<T>,
}

impl<T: Record> MultipartStreamReader<T> {
    pub fn new(base: impl AsRef<Path>, config: BufferConfig) -> Result<Self> {
        Ok(Self {
            base: base.as_ref().to_path_buf(),
            config,
            next_part: 0,
            current: None,
            _marker: PhantomData,
        })
    }

    pub fn read(&mut self) -> Result<Option<T>> {
        loop {
            if let Some(reader) = self.current.as_mut() {
                if let Some(v) = reader.read() {
                    return Ok(Some(v));
                }
                self.current = None;
            }
            if !self.advance_part()? {
                return Ok(None);
            }
        }
    }

    /// Bulk-reads into `out`, transparently spanning parts. Returns how
    /// many records were actually read.
    pub fn read_slice(&mut self, out: &mut [T]) -> Result<usize> {
        let mut n = 0;
        while n < out.len() {
            match self.read()? {
                Some(v) => {
                    out[n] = v;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    /// True once no current part remains and no next part exists.
    pub fn is_empty(&mut self) -> Result<bool> {
        if self.current.is_some() {
            return Ok(false);
        }
        Ok(!part_path(&self.base, self.next_part).exists())
    }

    fn advance_part(&mut self) -> Result<bool> {
        let path = part_path(&self.base, self.next_part);
        if !path.exists() {
            return Ok(false);
        }
        self.current = Some(StreamReader::new(&path, self.config)?);
        self.next_part += 1;
        Ok(true)
    }
}
