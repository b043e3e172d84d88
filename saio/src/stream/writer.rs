use std::fs::File;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use super::pool::{empty_channel, seeded_channel, BufferSlot};
use super::{fatal, Result, StreamError};
use crate::config::BufferConfig;
use crate::record::Record;

/// A forward, single-file, double/multi-buffered writer.
///
/// Records are appended to an in-memory buffer; once a buffer fills it is
/// handed to a background thread for the actual `write`, while the caller
/// picks up the next free buffer from the pool and keeps going.
pub struct StreamWriter<T: Record> {
    current: Option<BufferSlot>,
    pos: usize,
    buf_size: usize,
    free_rx: flume::Receiver<BufferSlot>,
    full_tx: flume::Sender<BufferSlot>,
    worker: Option<JoinHandle<()>>,
    error: Arc<Mutex<Option<io::Error>>>,
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Record> StreamWriter<T> {
    pub fn new(path: impl AsRef<Path>, config: BufferConfig) -> Result<Self> {
        debug_assert!(
            T::SIZE <= config.buf_size(),
            "buffer must fit at least one record"
        );

        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| StreamError::Io {
            path: path.clone(),
            source,
        })?;

        let buf_size = config.buf_size();
        let (free_tx, free_rx) = seeded_channel(config.n_buffers, buf_size);
        let (full_tx, full_rx) = empty_channel(config.n_buffers);
        let error = Arc::new(Mutex::new(None));

        let worker = spawn_worker(file, full_rx, free_tx, error.clone());

        let current = match free_rx.recv() {
            Ok(slot) => slot,
            Err(_) => fatal("writer buffer pool closed before first lease"),
        };

        Ok(Self {
            current: Some(current),
            pos: 0,
            buf_size,
            free_rx,
            full_tx,
            worker: Some(worker),
            error,
            path,
            _marker: PhantomData,
        })
    }

    pub fn write(&mut self, record: T) {
        self.check_error();
        if self.pos + T::SIZE > self.buf_size {
            self.flush_current();
        }
        let slot = self.current.as_mut().expect("current buffer always present between flushes");
        let pos = self.pos;
        record.to_bytes(&mut slot.raw_mut()[pos..pos + T::SIZE]);
        self.pos += T::SIZE;
    }

    /// Appends a run of records in one call.
    pub fn write_slice(&mut self, values: &[T]) {
        for &record in values {
            self.write(record);
        }
    }

    fn flush_current(&mut self) {
        let mut slot = self.current.take().expect("current buffer always present between flushes");
        slot.set_len(self.pos);
        if self.full_tx.send(slot).is_err() {
            fatal("writer worker gone while flushing a buffer");
        }
        self.pos = 0;
        self.current = Some(match self.free_rx.recv() {
            Ok(slot) => slot,
            Err(_) => fatal("writer worker gone while leasing the next buffer"),
        });
    }

    fn check_error(&self) {
        if let Some(err) = self.error.lock().take() {
            fatal(format!("{} ({})", err, self.path.display()));
        }
    }
}

impl<T: Record> Drop for StreamWriter<T> {
    fn drop(&mut self) {
        if self.pos > 0 {
            self.flush_current();
        }
        // Dropping the sender disconnects the worker's recv loop, which is
        // the stream's shutdown signal.
        let (disconnected_tx, _) = flume::bounded(0);
        let full_tx = std::mem::replace(&mut self.full_tx, disconnected_tx);
        drop(full_tx);

        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                fatal("writer worker thread panicked");
            }
        }
        self.check_error();
    }
}

fn spawn_worker(
    mut file: File,
    full_rx: flume::Receiver<BufferSlot>,
    free_tx: flume::Sender<BufferSlot>,
    error: Arc<Mutex<Option<io::Error>>>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        while let Ok(mut slot) = full_rx.recv() {
            if let Err(e) = file.write_all(slot.filled()) {
                *error.lock() = Some(e);
                return;
            }
            slot.reset();
            if free_tx.send(slot).is_err() {
                return;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamReader;
    use tempfile::tempdir;

    #[test]
    fn writes_are_visible_to_a_plain_reader() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");

        let mut writer = StreamWriter::<u32>::new(&path, BufferConfig::new(16, 2).unwrap()).unwrap();
        for i in 0..100u32 {
            writer.write(i);
        }
        drop(writer);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 100 * 4);

        let mut reader = StreamReader::<u32>::new(&path, BufferConfig::default()).unwrap();
        for i in 0..100u32 {
            assert_eq!(reader.read(), Some(i));
        }
        assert_eq!(reader.read(), None);
    }

    #[test]
    fn write_slice_matches_individual_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bulk.bin");

        let values: Vec<u32> = (0..200).collect();
        let mut writer = StreamWriter::<u32>::new(&path, BufferConfig::new(20, 5).unwrap()).unwrap();
        writer.write_slice(&values);
        drop(writer);

        let mut reader = StreamReader::<u32>::new(&path, BufferConfig::default()).unwrap();
        for &expected in &values {
            assert_eq!(reader.read(), Some(expected));
        }
        assert_eq!(reader.read(), None);
    }
}
