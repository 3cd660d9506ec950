//! Content-addressable file store.
//!
//! A [`Store`] persists files under a root directory at paths derived from
//! the BLAKE3 checksum of their contents. Identical content is stored
//! exactly once; the location of any stored file can be recomputed from its
//! checksum alone. Metadata belongs elsewhere -- callers keep checksums in
//! their own database and treat the store as write-once blob storage.
//!
//! # Put Strategies
//!
//! Three ways to move a file into the store, trading atomicity against user
//! experience (see [`PutStrategy`]):
//!
//! - [`PutStrategy::EarlyAtomicRename`] -- claim the source into the scratch
//!   directory first, then checksum. Most corruption-resistant.
//! - [`PutStrategy::LateAtomicRename`] -- checksum in place, then rename.
//!   The source stays visible until the very end.
//! - [`PutStrategy::Copy`] -- stream-copy while checksumming. The original
//!   file is untouched; works when the source lives on another volume.
//!
//! # Checkout Strategies
//!
//! Two ways to materialize stored content outside the store (see
//! [`CheckoutStrategy`]): a symbolic link, or a verified copy whose checksum
//! is compared against the entry's before the operation is declared good.
//!
//! # Design Rules
//!
//! 1. Stored files are immutable: no operation ever opens an addressed file
//!    for writing in place once created.
//! 2. New content becomes visible only through an atomic rename.
//! 3. Concurrent reads are always safe; concurrent puts of the same content
//!    race harmlessly (checksum equality implies content equality).
//! 4. All I/O errors are propagated, never silently ignored.

pub mod audit;
pub mod checkout;
pub mod config;
pub mod entry;
pub mod error;
mod fsutil;
pub mod put;
pub mod store;

pub use cask_checksum::ProgressCallback;
pub use checkout::CheckoutStrategy;
pub use config::{StoreConfig, CONFIG_FILE_NAME, SCRATCH_DIR_NAME};
pub use entry::StoreEntry;
pub use error::{StoreError, StoreResult};
pub use put::PutStrategy;
pub use store::Store;
