//! The buffer slot type and channel pre-fill helper shared by readers and
//! writers: a bounded channel is seeded with `count` pre-built buffers up
//! front so a stream never has to allocate mid-flight.

use flume as mpsc;

pub(crate) struct BufferSlot {
    data: Vec<u8>,
    len: usize,
}

impl BufferSlot {
    fn new(cap: usize) -> Self {
        Self {
            data: vec![0u8; cap],
            len: 0,
        }
    }

    pub fn filled(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn raw_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn set_len(&mut self, len: usize) {
        debug_assert!(len <= self.data.len());
        self.len = len;
    }

    pub fn reset(&mut self) {
        self.len = 0;
    }
}

/// Build a bounded channel pre-filled with `n_buffers` empty slots of
/// `buf_size` bytes each, ready to be leased out via `recv()`.
pub(crate) fn seeded_channel(
    n_buffers: usize,
    buf_size: usize,
) -> (mpsc::Sender<BufferSlot>, mpsc::Receiver<BufferSlot>) {
    let (tx, rx) = mpsc::bounded(n_buffers);
    for _ in 0..n_buffers {
        tx.send(BufferSlot::new(buf_size))
            .expect("freshly created channel has capacity for all seed buffers");
    }
    (tx, rx)
}

/// An empty, unseeded bounded channel pair, used for the "ready"/"full"
/// direction which starts out with nothing in flight.
pub(crate) fn empty_channel(n_buffers: usize) -> (mpsc::Sender<BufferSlot>, mpsc::Receiver<BufferSlot>) {
    mpsc::bounded(n_buffers)
}
