//! Corruption detection: finding stored files whose physical location
//! disagrees with their content address.
//!
//! A scan walks every file under the root (reserved entries excluded) and
//! checks that the file sits at the path its checksum addresses. The
//! checksum is either recomputed from content (slow, authoritative) or
//! derived from the physical path by unsharding it (fast, trusts the
//! directory structure). Only mismatches are yielded; a clean store scans
//! to an empty sequence.

use std::path::{Path, PathBuf};

use cask_address::unshard;
use cask_checksum::{compute_checksum, FileSource};

use crate::config::StoreConfig;
use crate::entry::StoreEntry;
use crate::error::StoreResult;

/// Lazy iterator over misfiled store entries, as `(actual path, expected
/// entry)` pairs. Created by [`Store::scan`](crate::Store::scan).
pub struct ScanIter<'a> {
    walk: walkdir::IntoIter,
    root: &'a Path,
    scratch_dir: &'a Path,
    config_file: PathBuf,
    config: &'a StoreConfig,
    trust_physical_path: bool,
}

impl<'a> ScanIter<'a> {
    pub(crate) fn new(
        root: &'a Path,
        scratch_dir: &'a Path,
        config_file: PathBuf,
        config: &'a StoreConfig,
        trust_physical_path: bool,
    ) -> Self {
        Self {
            walk: walkdir::WalkDir::new(root).into_iter(),
            root,
            scratch_dir,
            config_file,
            config,
            trust_physical_path,
        }
    }

    fn checksum_of(&self, path: &Path) -> StoreResult<String> {
        if self.trust_physical_path {
            // The path segments of a well-filed entry concatenate back to
            // its checksum; trusting them skips rehashing the content.
            let relative = path.strip_prefix(self.root).unwrap_or(path);
            Ok(unshard(
                relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned()),
            ))
        } else {
            let mut source = FileSource::open(path)?;
            Ok(compute_checksum(&mut source)?)
        }
    }
}

impl Iterator for ScanIter<'_> {
    type Item = StoreResult<(PathBuf, StoreEntry)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walk.next()? {
                Ok(entry) => entry,
                Err(err) => return Some(Err(std::io::Error::from(err).into())),
            };
            let path = entry.path();
            if path == self.config_file || path.starts_with(self.scratch_dir) {
                continue;
            }
            if !entry.file_type().is_file() {
                continue;
            }

            let checksum = match self.checksum_of(path) {
                Ok(checksum) => checksum,
                Err(err) => return Some(Err(err)),
            };
            let expected = match StoreEntry::new(
                checksum,
                self.config.prefix_depth,
                self.config.prefix_width,
                false,
            ) {
                Ok(expected) => expected,
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "unaddressable file in store");
                    return Some(Err(err.into()));
                }
            };

            if self.root.join(expected.path()) != path {
                tracing::warn!(
                    actual = %path.display(),
                    expected = %expected.path().display(),
                    "misfiled entry"
                );
                return Some(Ok((path.to_path_buf(), expected)));
            }
        }
    }
}
