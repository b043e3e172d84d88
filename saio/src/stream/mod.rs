//! Async block-buffered stream I/O.
//!
//! Each reader/writer owns a dedicated background thread that performs the
//! actual `read`/`write` syscalls, and hands buffers back and forth with the
//! calling thread through a pair of bounded channels — one direction for
//! buffers ready to be drained/filled by the worker, the other for buffers
//! recycled back to the caller. This is a free/ready buffer-pool rendezvous,
//! expressed with channels rather than a mutex and condition variables.
//!
//! A stream is meant to be driven by exactly one thread at a time: no
//! concurrent access to the same reader/writer is supported.

mod backward;
mod backward_bits;
mod multipart;
mod pool;
mod reader;
mod writer;

pub use backward::BackwardStreamReader;
pub use backward_bits::BackwardBitStreamReader;
pub use multipart::{MultipartStreamReader, MultipartStreamWriter};
pub use reader::StreamReader;
pub use writer::StreamWriter;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead { expected: usize, got: usize },
    #[error("short write: expected to write {expected} bytes, wrote {got}")]
    ShortWrite { expected: usize, got: usize },
    #[error("path is not valid UTF-8: {0:?}")]
    PathEncoding(PathBuf),
}

pub type Result<T> = std::result::Result<T, StreamError>;

/// A background I/O worker has no recovery path of its own: if it dies
/// (panics, or its channel peer vanishes mid-transfer) the stream it served
/// is left in an undefined state. Per the "no crash durability" design,
/// such conditions are logged and the whole process aborts rather than
/// trying to continue with a stream whose buffering invariants may be
/// broken.
pub(crate) fn fatal(err: impl std::fmt::Display) -> ! {
    tracing::error!(%err, "fatal stream error, aborting process");
    std::process::abort();
}
