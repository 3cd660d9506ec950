//! The identity of one stored object.

use std::path::{Path, PathBuf};

use cask_address::{shard, AddressResult};

/// Identity of one stored object: its checksum and its address.
///
/// Entries are views, not records: every read/write operation creates one
/// transiently and nothing persists them. Construction derives the path
/// from the checksum, so `path == address(checksum)` holds for the entry's
/// whole lifetime -- the fields are private precisely so the two cannot
/// drift apart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreEntry {
    checksum: String,
    path: PathBuf,
    is_duplicate: bool,
}

impl StoreEntry {
    /// Build an entry for `checksum` under the given shard geometry.
    pub(crate) fn new(
        checksum: String,
        prefix_depth: u32,
        prefix_width: u32,
        is_duplicate: bool,
    ) -> AddressResult<Self> {
        let segments = shard(&checksum, prefix_depth, prefix_width)?;
        let path: PathBuf = segments.iter().collect();
        Ok(Self {
            checksum,
            path,
            is_duplicate,
        })
    }

    /// Same entry with the duplicate flag set by a put operation.
    pub(crate) fn duplicate(mut self, is_duplicate: bool) -> Self {
        self.is_duplicate = is_duplicate;
        self
    }

    /// Lowercase hex digest identifying the content.
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// Addressed path, relative to the store root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether content with this checksum already existed before the put
    /// that returned this entry. Always `false` for entries from reads.
    pub fn is_duplicate(&self) -> bool {
        self.is_duplicate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_derived_from_checksum() {
        let entry = StoreEntry::new("ab12cd34ef".into(), 1, 2, false).unwrap();
        assert_eq!(entry.checksum(), "ab12cd34ef");
        assert_eq!(entry.path(), Path::new("ab/12cd34ef"));
        assert!(!entry.is_duplicate());
    }

    #[test]
    fn construction_fails_for_unshardable_checksum() {
        assert!(StoreEntry::new("ab".into(), 1, 2, false).is_err());
    }
}
