//! Persisted store configuration.
//!
//! The configuration is written once by [`Store::init`](crate::Store::init)
//! as JSON at a fixed name under the root and loaded on every subsequent
//! open. Its presence is what distinguishes an initialized store from a
//! plain directory; it is never overwritten or hand-edited after creation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use cask_checksum::CHECKSUM_HEX_LEN;

use crate::error::{StoreError, StoreResult};
use crate::put::PutStrategy;

/// Name of the configuration file under the store root.
pub const CONFIG_FILE_NAME: &str = "cask.json";

/// Name of the scratch subdirectory under the store root, used as the
/// staging area for strategies that need one. Lives inside the root so it
/// is always on the same volume, which atomic rename requires.
pub const SCRATCH_DIR_NAME: &str = ".scratch";

/// Store configuration, persisted once at initialization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Number of shard-directory levels (>= 1).
    pub prefix_depth: u32,
    /// Checksum characters consumed per shard level (>= 1).
    pub prefix_width: u32,
    /// Permission bits applied to stored files. The default `0o400` leaves
    /// only owner-read, so an accidental `echo oops > file` cannot destroy
    /// stored content.
    pub fmode: u32,
    /// Permission bits applied to created directories.
    pub dmode: u32,
    /// Strategy used when a put call does not override it.
    pub default_put_strategy: PutStrategy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            prefix_depth: 1,
            prefix_width: 2,
            fmode: 0o400,
            dmode: 0o700,
            default_put_strategy: PutStrategy::Copy,
        }
    }
}

impl StoreConfig {
    /// Check the shard geometry against the checksum length.
    ///
    /// Sharding is undefined when the prefix consumes the whole checksum,
    /// so `prefix_depth * prefix_width` must stay strictly below the hex
    /// digest length.
    pub fn validate(&self) -> StoreResult<()> {
        let prefix = self.prefix_depth as usize * self.prefix_width as usize;
        if self.prefix_depth < 1 || self.prefix_width < 1 || prefix >= CHECKSUM_HEX_LEN {
            return Err(StoreError::InvalidShardConfig {
                depth: self.prefix_depth,
                width: self.prefix_width,
                checksum_len: CHECKSUM_HEX_LEN,
            });
        }
        Ok(())
    }

    /// Load the configuration persisted under `root`.
    ///
    /// A missing file means the directory was never initialized.
    pub(crate) fn load(root: &Path) -> StoreResult<Self> {
        let path = root.join(CONFIG_FILE_NAME);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotInitialized(root.to_path_buf()));
            }
            Err(err) => return Err(err.into()),
        };
        let config: Self =
            serde_json::from_str(&raw).map_err(|err| StoreError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Persist the configuration under `root`.
    pub(crate) fn persist(&self, root: &Path) -> StoreResult<()> {
        let raw = serde_json::to_string_pretty(self)
            .map_err(|err| StoreError::Config(err.to_string()))?;
        std::fs::write(root.join(CONFIG_FILE_NAME), raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        StoreConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_prefix_consuming_whole_checksum() {
        let config = StoreConfig {
            prefix_depth: 32,
            prefix_width: 2,
            ..StoreConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(StoreError::InvalidShardConfig { .. })
        ));
    }

    #[test]
    fn rejects_zero_depth_and_width() {
        for (depth, width) in [(0, 2), (1, 0)] {
            let config = StoreConfig {
                prefix_depth: depth,
                prefix_width: width,
                ..StoreConfig::default()
            };
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            prefix_depth: 2,
            prefix_width: 3,
            fmode: 0o440,
            dmode: 0o750,
            default_put_strategy: PutStrategy::EarlyAtomicRename,
        };
        config.persist(dir.path()).unwrap();
        assert_eq!(StoreConfig::load(dir.path()).unwrap(), config);
    }

    #[test]
    fn strategy_uses_wire_names() {
        let raw = serde_json::to_string(&StoreConfig::default()).unwrap();
        assert!(raw.contains("\"COPY\""));
        let early = serde_json::to_string(&PutStrategy::EarlyAtomicRename).unwrap();
        assert_eq!(early, "\"EARLY_ATOMIC_RENAME\"");
    }

    #[test]
    fn load_on_uninitialized_root_reports_not_initialized() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            StoreConfig::load(dir.path()),
            Err(StoreError::NotInitialized(_))
        ));
    }
}
