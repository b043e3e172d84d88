use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use super::pool::{empty_channel, seeded_channel, BufferSlot};
use super::{fatal, Result, StreamError};
use crate::config::BufferConfig;
use crate::record::Record;

const MAX_RECORD_SIZE: usize = 16;

/// Reads records in reverse order, starting from the end of the file.
///
/// The background worker walks the file backward chunk by chunk (seek +
/// read), handing each chunk to the caller in the same forward byte order
/// it was read in; the caller then consumes bytes from the tail of each
/// chunk towards its head, which is the mirror image of
/// [`super::StreamReader`]'s head-to-tail walk.
pub struct BackwardStreamReader<T: Record> {
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

impl<T: Record> BackwardStreamReader<T> {
    pub fn new(path: impl AsRef<Path>, config: BufferConfig) -> Result<Self> {
        debug_assert!(T::SIZE <= MAX_RECORD_SIZE, "record too large for this stream reader");

        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| StreamError::Io {
            path: path.clone(),
            source,
        })?;
        let file_size = file
            .metadata()
            .map_err(|source| StreamError::Io {
                path: path.clone(),
                source,
            })?
            .len();

        let buf_size = config.buf_size();
        let (free_tx, free_rx) = seeded_channel(config.n_buffers, buf_size);
        let (full_tx, full_rx) = empty_channel(config.n_buffers);
        let error = Arc::new(Mutex::new(None));

        let worker = spawn_worker(file, file_size, free_rx, full_tx, error.clone());

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

    pub fn read(&mut self) -> Option<T> {
        self.check_error();
        let mut scratch = [0u8; MAX_RECORD_SIZE];
        for i in (0..T::SIZE).rev() {
            scratch[i] = self.pull_byte()?;
        }
        Some(T::from_bytes(&scratch[..T::SIZE]))
    }

    fn pull_byte(&mut self) -> Option<u8> {
        loop {
            if let Some(slot) = &self.current {
                if self.pos > 0 {
                    self.pos -= 1;
                    return Some(slot.filled()[self.pos]);
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
                self.pos = slot.len();
                self.current = Some(slot);
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

impl<T: Record> Drop for BackwardStreamReader<T> {
    fn drop(&mut self) {
        let (disconnected_tx, _) = flume::bounded(0);
        let free_tx = std::mem::replace(&mut self.free_tx, disconnected_tx);
        drop(free_tx);
        while self.full_rx.try_recv().is_ok() {}
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                fatal("backward reader worker thread panicked");
            }
        }
        self.check_error();
    }
}

fn spawn_worker(
    mut file: File,
    mut next_end: u64,
    free_rx: flume::Receiver<BufferSlot>,
    full_tx: flume::Sender<BufferSlot>,
    error: Arc<Mutex<Option<io::Error>>>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        while let Ok(mut slot) = free_rx.recv() {
            if next_end == 0 {
                slot.set_len(0);
                let _ = full_tx.send(slot);
                break;
            }
            let want = (slot.capacity() as u64).min(next_end) as usize;
            let start = next_end - want as u64;
            if let Err(e) = file.seek(SeekFrom::Start(start)) {
                *error.lock() = Some(e);
                break;
            }
            match fill_buffer(&mut file, &mut slot.raw_mut()[..want]) {
                Ok(n) if n == want => {
                    slot.set_len(n);
                    next_end = start;
                    if full_tx.send(slot).is_err() {
                        break;
                    }
                }
                Ok(n) => {
                    *error.lock() = Some(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("expected {want} bytes, got {n}"),
                    ));
                    break;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamWriter;
    use tempfile::tempdir;

    #[test]
    fn reads_in_reverse_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("backward.bin");

        let mut writer = StreamWriter::<u32>::new(&path, BufferConfig::new(20, 5).unwrap()).unwrap();
        let values: Vec<u32> = (0..200).collect();
        for &v in &values {
            writer.write(v);
        }
        drop(writer);

        let mut reader = BackwardStreamReader::<u32>::new(&path, BufferConfig::new(12, 3).unwrap()).unwrap();
        for &expected in values.iter().rev() {
            assert_eq!(reader.read(), Some(expected));
        }
        assert_eq!(reader.read(), None);
    }
}
