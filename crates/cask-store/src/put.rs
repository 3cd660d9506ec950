//! Put strategies: moving external content into the store.
//!
//! A put strategy gets a source file from its original location to the
//! addressed path inside the store. The three strategies trade corruption
//! resistance against user experience:
//!
//! | Strategy            | Resistance | Cost                                   |
//! |---------------------|------------|----------------------------------------|
//! | `EarlyAtomicRename` | highest    | source vanishes before checksum known  |
//! | `LateAtomicRename`  | medium     | source writable between hash and move  |
//! | `Copy`              | lowest     | full copy, but source never touched    |
//!
//! The rename strategies require source, scratch and destination on the
//! same volume. `Copy` only needs scratch and destination co-located, so it
//! is the one that works across filesystems.
//!
//! Every strategy stages intermediate files under a unique name in the
//! scratch directory, creates missing parent directories with `dmode`, and
//! applies `fmode` before returning. A failure to set permissions after a
//! successful rename is surfaced, never swallowed: the content is stored
//! but the access-control step did not take.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cask_checksum::{compute_checksum, FileSource, ProgressCallback, ProgressSource, TeeSource};

use crate::config::StoreConfig;
use crate::entry::StoreEntry;
use crate::error::{StoreError, StoreResult};
use crate::fsutil;

/// Selector for the put pipelines. Serialized with the wire names
/// `EARLY_ATOMIC_RENAME`, `LATE_ATOMIC_RENAME` and `COPY`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PutStrategy {
    EarlyAtomicRename,
    LateAtomicRename,
    Copy,
}

impl std::fmt::Display for PutStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::EarlyAtomicRename => "EARLY_ATOMIC_RENAME",
            Self::LateAtomicRename => "LATE_ATOMIC_RENAME",
            Self::Copy => "COPY",
        };
        f.write_str(name)
    }
}

/// Runs put pipelines against one store root.
pub(crate) struct PutRunner<'a> {
    root: &'a Path,
    scratch_dir: &'a Path,
    config: &'a StoreConfig,
}

impl<'a> PutRunner<'a> {
    pub(crate) fn new(root: &'a Path, scratch_dir: &'a Path, config: &'a StoreConfig) -> Self {
        Self {
            root,
            scratch_dir,
            config,
        }
    }

    /// Dispatch `strategy` for `source`.
    pub(crate) fn run(
        &self,
        strategy: PutStrategy,
        source: &Path,
        progress: Option<&ProgressCallback<'_>>,
    ) -> StoreResult<StoreEntry> {
        if !source.is_file() {
            return Err(StoreError::NotAFile(source.to_path_buf()));
        }
        tracing::debug!(source = %source.display(), %strategy, "put");
        match strategy {
            PutStrategy::EarlyAtomicRename => self.early_atomic_rename(source, progress),
            PutStrategy::LateAtomicRename => self.late_atomic_rename(source, progress),
            PutStrategy::Copy => self.copy(source, progress),
        }
    }

    /// Claim the source into the scratch directory with an atomic rename,
    /// checksum the claimed copy, then rename it to its address.
    ///
    /// Once the first rename lands, no caller-side mutation of the original
    /// path can corrupt the stored bytes. The cost is that the source
    /// disappears from its original location before its checksum is known.
    fn early_atomic_rename(
        &self,
        source: &Path,
        progress: Option<&ProgressCallback<'_>>,
    ) -> StoreResult<StoreEntry> {
        let scratch = self.scratch_path(source);
        std::fs::rename(source, &scratch)?;

        let mut reader = ProgressSource::new(FileSource::open(&scratch)?, progress);
        let checksum = compute_checksum(&mut reader)?;
        drop(reader);

        let (entry, dest) = self.destination(checksum)?;
        fsutil::create_dir_all_mode(fsutil::parent_of(&dest), self.config.dmode)?;

        // A pre-existing destination holds byte-identical content (same
        // checksum), so renaming over it is harmless.
        let is_duplicate = dest.is_file();
        std::fs::rename(&scratch, &dest)?;
        fsutil::set_file_mode(&dest, self.config.fmode)?;

        Ok(entry.duplicate(is_duplicate))
    }

    /// Checksum the source in place, then rename it to its address.
    ///
    /// The source stays visible at its original location until the very
    /// end, but a write landing between checksum and rename desynchronizes
    /// content from checksum. That window is this strategy's trade-off.
    fn late_atomic_rename(
        &self,
        source: &Path,
        progress: Option<&ProgressCallback<'_>>,
    ) -> StoreResult<StoreEntry> {
        let mut reader = ProgressSource::new(FileSource::open(source)?, progress);
        let checksum = compute_checksum(&mut reader)?;
        drop(reader);

        let (entry, dest) = self.destination(checksum)?;
        fsutil::create_dir_all_mode(fsutil::parent_of(&dest), self.config.dmode)?;

        let is_duplicate = dest.is_file();
        std::fs::rename(source, &dest)?;
        fsutil::set_file_mode(&dest, self.config.fmode)?;

        Ok(entry.duplicate(is_duplicate))
    }

    /// Stream-copy the source into a scratch file while checksumming, then
    /// rename the copy to its address. The original file is never touched,
    /// and this is the only strategy that works when the source lives on a
    /// different volume than the store.
    fn copy(&self, source: &Path, progress: Option<&ProgressCallback<'_>>) -> StoreResult<StoreEntry> {
        let scratch = self.scratch_path(source);
        let tee = TeeSource::create(FileSource::open(source)?, &scratch)?;
        let mut reader = ProgressSource::new(tee, progress);
        let checksum = compute_checksum(&mut reader)?;
        let staged = reader.into_inner().finish()?;

        let (entry, dest) = self.destination(checksum)?;
        fsutil::create_dir_all_mode(fsutil::parent_of(&dest), self.config.dmode)?;

        let is_duplicate = dest.is_file();
        if is_duplicate {
            // The copy is redundant; the addressed file already holds these
            // bytes. Discard the staged copy instead of renaming over a
            // live, possibly open, stored file.
            std::fs::remove_file(&staged)?;
        } else {
            std::fs::rename(&staged, &dest)?;
            fsutil::set_file_mode(&dest, self.config.fmode)?;
        }

        Ok(entry.duplicate(is_duplicate))
    }

    /// Unique staging path for `source` inside the scratch directory.
    ///
    /// The random token keeps concurrent puts of same-named sources from
    /// colliding; the original basename is kept for debuggability of
    /// abandoned temps.
    fn scratch_path(&self, source: &Path) -> PathBuf {
        let basename = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.scratch_dir
            .join(format!("{}_{basename}", Uuid::new_v4().simple()))
    }

    fn destination(&self, checksum: String) -> StoreResult<(StoreEntry, PathBuf)> {
        let entry = StoreEntry::new(
            checksum,
            self.config.prefix_depth,
            self.config.prefix_width,
            false,
        )?;
        let dest = self.root.join(entry.path());
        Ok((entry, dest))
    }
}

