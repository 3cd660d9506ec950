//! Checkout strategies: materializing stored content outside the store.
//!
//! A checkout either links to the stored file or produces a verified copy.
//! The copy path computes a checksum while streaming and compares it to the
//! entry's checksum before declaring success -- a disagreement means the
//! stored file itself is corrupt, independent of how it was put.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cask_checksum::{compute_checksum, FileSource, ProgressCallback, ProgressSource, TeeSource};

use crate::config::StoreConfig;
use crate::entry::StoreEntry;
use crate::error::{StoreError, StoreResult};
use crate::fsutil;

/// Selector for the checkout pipelines. Serialized with the wire names
/// `SYMBOLIC_LINK` and `COPY`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckoutStrategy {
    SymbolicLink,
    Copy,
}

impl std::fmt::Display for CheckoutStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::SymbolicLink => "SYMBOLIC_LINK",
            Self::Copy => "COPY",
        };
        f.write_str(name)
    }
}

/// Runs checkout pipelines against one store root.
pub(crate) struct CheckoutRunner<'a> {
    root: &'a Path,
    config: &'a StoreConfig,
}

impl<'a> CheckoutRunner<'a> {
    pub(crate) fn new(root: &'a Path, config: &'a StoreConfig) -> Self {
        Self { root, config }
    }

    /// Dispatch `strategy` for `entry`, materializing at `dest`.
    ///
    /// Returns the checksum of the checked-out bytes when the strategy
    /// produces one (`Copy`), or `None` when verification is meaningless
    /// (`SymbolicLink` always resolves to the exact stored bytes). A
    /// produced checksum that disagrees with the entry's fails with
    /// [`StoreError::IntegrityMismatch`].
    pub(crate) fn run(
        &self,
        strategy: CheckoutStrategy,
        entry: &StoreEntry,
        dest: &Path,
        progress: Option<&ProgressCallback<'_>>,
        dry_run: bool,
    ) -> StoreResult<Option<String>> {
        let stored = self.root.join(entry.path());
        if !stored.is_file() {
            return Err(StoreError::NotAFile(stored));
        }
        tracing::debug!(
            checksum = entry.checksum(),
            dest = %dest.display(),
            %strategy,
            dry_run,
            "checkout"
        );

        let computed = match strategy {
            CheckoutStrategy::SymbolicLink => {
                self.symbolic_link(&stored, dest, progress, dry_run)?
            }
            CheckoutStrategy::Copy => Some(self.copy(&stored, dest, progress, dry_run)?),
        };

        if let Some(computed) = &computed {
            if computed != entry.checksum() {
                return Err(StoreError::IntegrityMismatch {
                    expected: entry.checksum().to_string(),
                    computed: computed.clone(),
                });
            }
        }
        Ok(computed)
    }

    /// Create a symbolic link at `dest` pointing at the stored file.
    ///
    /// No checksum is reported: the link resolves to the stored bytes by
    /// construction. A dry run changes nothing on disk but still reports
    /// completion through the callback.
    fn symbolic_link(
        &self,
        stored: &Path,
        dest: &Path,
        progress: Option<&ProgressCallback<'_>>,
        dry_run: bool,
    ) -> StoreResult<Option<String>> {
        if dry_run {
            if let Some(callback) = progress {
                callback(dest, (1, Some(1)));
            }
            return Ok(None);
        }

        if let Some(callback) = progress {
            callback(dest, (0, Some(1)));
        }
        fsutil::create_dir_all_mode(fsutil::parent_of(dest), self.config.dmode)?;
        fsutil::symlink(stored, dest)?;
        if let Some(callback) = progress {
            callback(dest, (1, Some(1)));
        }
        Ok(None)
    }

    /// Stream the stored file to `dest` through a temporary file in the
    /// destination's parent, checksumming along the way, then rename into
    /// place and apply `fmode`. A dry run computes and returns the would-be
    /// checksum without writing anything.
    fn copy(
        &self,
        stored: &Path,
        dest: &Path,
        progress: Option<&ProgressCallback<'_>>,
        dry_run: bool,
    ) -> StoreResult<String> {
        if dry_run {
            let mut reader = ProgressSource::new(FileSource::open(stored)?, progress);
            return Ok(compute_checksum(&mut reader)?);
        }

        fsutil::create_dir_all_mode(fsutil::parent_of(dest), self.config.dmode)?;
        let temp = temp_sibling(dest);
        let tee = TeeSource::create(FileSource::open(stored)?, &temp)?;
        let mut reader = ProgressSource::new(tee, progress);
        let checksum = compute_checksum(&mut reader)?;
        let staged = reader.into_inner().finish()?;

        std::fs::rename(&staged, dest)?;
        fsutil::set_file_mode(dest, self.config.fmode)?;
        Ok(checksum)
    }
}

/// Unique temporary path in `dest`'s parent directory, so the final rename
/// stays on the destination's volume.
fn temp_sibling(dest: &Path) -> PathBuf {
    let basename = dest
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    fsutil::parent_of(dest).join(format!(".{basename}.{}", Uuid::new_v4().simple()))
}

