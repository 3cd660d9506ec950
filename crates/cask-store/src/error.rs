//! Error types for store operations.

use std::path::PathBuf;

use cask_address::AddressError;

/// Errors from store operations.
///
/// Plain I/O failures are carried transparently so callers can still reach
/// the underlying [`std::io::ErrorKind`] (permission errors, missing
/// devices, cross-filesystem renames). "Checksum not present" is never an
/// error -- lookups return `None` instead.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No persisted configuration was found under the root.
    #[error("store is not initialized at {0}")]
    NotInitialized(PathBuf),

    /// A persisted configuration already exists; re-initialization would
    /// risk losing the mapping needed to locate existing content.
    #[error("store is already initialized at {0}")]
    AlreadyInitialized(PathBuf),

    /// The root directory contains entries that are not the store's own.
    #[error("refusing to initialize non-empty directory {0}")]
    NotEmpty(PathBuf),

    /// The configured shard geometry leaves no checksum remainder.
    #[error(
        "prefix depth {depth} x width {width} does not leave a remainder of a {checksum_len}-char checksum"
    )]
    InvalidShardConfig {
        depth: u32,
        width: u32,
        checksum_len: usize,
    },

    /// Address-scheme misuse (checksum too short to shard).
    #[error(transparent)]
    Address(#[from] AddressError),

    /// The put source is not a regular file.
    #[error("not a regular file: {0}")]
    NotAFile(PathBuf),

    /// Unsupported open mode; stored files are never opened for mutation.
    #[error("invalid open mode {0:?}: only \"r\", \"rb\" and \"rt\" are supported")]
    InvalidMode(String),

    /// A checked-out copy's checksum disagrees with the stored entry's.
    /// This signals corruption of the stored file itself.
    #[error("integrity mismatch: expected checksum {expected}, computed {computed}")]
    IntegrityMismatch { expected: String, computed: String },

    /// The persisted configuration file is malformed.
    #[error("malformed store configuration: {0}")]
    Config(String),

    /// I/O error, propagated unmodified.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
