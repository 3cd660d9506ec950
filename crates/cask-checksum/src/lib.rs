//! Streaming checksum computation for the Cask store.
//!
//! Content checksums are BLAKE3 hex digests computed by streaming a byte
//! source to end-of-stream. Sources are modeled by the [`ByteSource`]
//! capability trait; decorators compose around any source:
//!
//! - [`FileSource`] -- reads a file, exposing its size and natural I/O
//!   block size as hints
//! - [`TeeSource`] -- fans every chunk out to a staging file while reading
//! - [`ProgressSource`] -- reports `(bytes so far, total)` to a callback
//!   after each chunk
//!
//! [`compute_checksum`] picks its chunk size and hashing parallelism from
//! the source's hints: small sources hash single-threaded in block-sized
//! chunks, large or unsized sources hash multi-threaded in ~32 MiB chunks.
//!
//! # Failure Model
//!
//! Any read error aborts the whole computation; no partial digest is ever
//! returned. The engine does not retry -- callers restart on a fresh source.

pub mod engine;
pub mod source;

pub use engine::{compute_checksum, CHECKSUM_HEX_LEN, DEFAULT_BLOCK_SIZE};
pub use source::{ByteSource, FileSource, ProgressCallback, ProgressSource, TeeSource};
