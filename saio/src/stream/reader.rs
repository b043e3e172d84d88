use std::fs::File;
use std::io::{self, Read};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use super::pool::{empty_channel, seeded_channel, BufferSlot};
use super::{fatal, Result, StreamError};
use crate::config::BufferConfig;
use crate::record::Record;

/// Largest record width this stream machinery is prepared to buffer on the
/// stack while stitching one across a buffer-refill boundary.
const MAX_RECORD_SIZE: usize = 16;

/// A forward, single-file, read-ahead buffered reader.
///
/// A background thread keeps reading the file into free buffers handed to
/// it by the caller, and posts filled buffers back; the caller decodes
/// records out of whatever buffer is current, stitching a record's bytes
/// across a buffer boundary when necessary.
pub struct StreamReader<T: Record> {
    current: Option<BufferSlot>,
    pos: usize,
    free_tx: flume::Sender<BufferSlot>,
    full_rx: flume::Receiver<BufferSlot>,
    worker: Option<JoinHandle<()>>,
    error: Arc<Mutex<Option<io::Error>>>,
    path: PathBuf,
    eof: bool,
    _marker: PhantomData<T>,
}

impl<T: Record> StreamReader<T> {
    pub fn new(path: impl AsRef<Path>, config: BufferConfig) -> Result<Self> {
        debug_assert!(T::SIZE <= MAX_RECORD_SIZE, "record too large for this stream reader");

        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| StreamError::Io {
            path: path.clone(),
            source,
        })?;

        let buf_size = config.buf_size();
        let (free_tx, free_rx) = seeded_channel(config.n_buffers, buf_size);
        let (full_tx, full_rx) = empty_channel(config.n_buffers);
        let error = Arc::new(Mutex::new(None));

        let worker = spawn_worker(file, free_rx, full_tx, error.clone());

        Ok(Self {
            current: None,
            pos: 0,
            free_tx,
            full_rx,
            worker: Some(worker),
            error,
            path,
            eof: false,
            _marker: PhantomData,
        })
    }

    /// Reads the next record, or `None` once the stream is exhausted.
    pub fn read(&mut self) -> Option<T> {
        self.check_error();
        let mut scratch = [0u8; MAX_RECORD_SIZE];
        for byte in scratch.iter_mut().take(T::SIZE) {
            *byte = self.pull_byte()?;
        }
        Some(T::from_bytes(&scratch[..T::SIZE]))
    }

    /// Bulk-reads into `out`, stopping at end of stream. Returns how many
    /// records were actually read.
    pub fn read_slice(&mut self, out: &mut [T]) -> usize {
        let mut n = 0;
        while n < out.len() {
            match self.read() {
                Some(v) => {
                    out[n] = v;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    fn pull_byte(&mut self) -> Option<u8> {
        loop {
            if let Some(slot) = &self.current {
                if self.pos < slot.len() {
                    let b = slot.filled()[self.pos];
                    self.pos += 1;
                    return Some(b);
                }
            }
            if !self.advance() {
                return None;
            }
        }
    }

    fn advance(&mut self) -> bool {
        if self.eof {
            return false;
        }
        if let Some(mut old) = self.current.take() {
            old.reset();
            let _ = self.free_tx.send(old);
        }
        match self.full_rx.recv() {
            Ok(slot) if slot.len() == 0 => {
                self.eof = true;
                false
            }
            Ok(slot) => {
                self.current = Some(slot);
                self.pos = 0;
                true
            }
            Err(_) => {
                self.eof = true;
                self.check_error();
                false
            }
        }
    }

    fn check_error(&self) {
        if let Some(err) = self.error.lock().take() {
            fatal(format!("{} ({})", err, self.path.display()));
        }
    }
}

impl<T: Record> Drop for StreamReader<T> {
    fn drop(&mut self) {
        let (disconnected_tx, _) = flume::bounded(0);
        let free_tx = std::mem::replace(&mut self.free_tx, disconnected_tx);
        drop(free_tx);

        // Drain any buffer the worker may still be trying to hand back so
        // it can observe the disconnected free channel and exit.
        while self.full_rx.try_recv().is_ok() {}

        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                fatal("reader worker thread panicked");
            }
        }
        self.check_error();
    }
}

fn spawn_worker(
    mut file: File,
    free_rx: flume::Receiver<BufferSlot>,
    full_tx: flume::Sender<BufferSlot>,
    error: Arc<Mutex<Option<io::Error>>>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        while let Ok(mut slot) = free_rx.recv() {
            match fill_buffer(&mut file, slot.raw_mut()) {
                Ok(0) => {
                    slot.set_len(0);
                    let _ = full_tx.send(slot);
                    break;
                }
                Ok(n) => {
                    slot.set_len(n);
                    if full_tx.send(slot).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    *error.lock() = Some(e);
                    break;
                }
            }
        }
    })
}

fn fill_buffer(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match file.read(&mut buf[total..])? {
            0 => break,
            n => total += n,
        }
    }
    Ok(total)
}
