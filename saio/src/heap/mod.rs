//! Monotone-key priority queues (radix heaps), internal and external-memory.
//!
//! Keys are `u64`; a radix heap only ever supports pushing keys no smaller
//! than the last popped minimum (see each type's `push` documentation), in
//! exchange for O(1) amortized push/pop instead of a comparison heap's
//! O(log n). This is not a general-purpose priority queue — arbitrary
//! decrease-key or unordered key sequences are out of scope.

mod bucket;
mod external;
mod external_bucket;
mod generalized;
mod internal;

pub use external::EMRadixHeap;
pub use generalized::GeneralizedRadixHeap;
pub use internal::RadixHeap;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeapError {
    #[error("pushed key {key} is smaller than the current heap minimum {min}")]
    NonMonotonicPush { key: u64, min: u64 },
    #[error("pushed key {key} is wider than the configured {bits}-bit digit width")]
    KeyOverflow { key: u64, bits: u32 },
    #[error(transparent)]
    Stream(#[from] crate::stream::StreamError),
}

pub type Result<T> = std::result::Result<T, HeapError>;
