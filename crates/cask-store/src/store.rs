//! The store orchestrator: lifecycle, CRUD operations, and audit entry
//! points over one configured root directory.

use std::fs::File;
use std::path::{Path, PathBuf};

use cask_checksum::ProgressCallback;

use crate::audit::ScanIter;
use crate::checkout::{CheckoutRunner, CheckoutStrategy};
use crate::config::{StoreConfig, CONFIG_FILE_NAME, SCRATCH_DIR_NAME};
use crate::entry::StoreEntry;
use crate::error::{StoreError, StoreResult};
use crate::fsutil;
use crate::put::{PutRunner, PutStrategy};

/// A content-addressable file store over one root directory.
///
/// A root is either *uninitialized* (no persisted configuration) or
/// *initialized* (configuration persisted, scratch directory present).
/// [`Store::init`] performs the one-way transition; [`Store::open_root`]
/// attaches to an already-initialized root. Every other operation requires
/// the initialized state, which holding a `Store` value proves.
///
/// All methods take `&self`; there is no global lock. Many concurrent
/// callers may issue independent operations against the same root -- see
/// the crate docs for the rename-based visibility rules that make this
/// safe.
pub struct Store {
    root: PathBuf,
    scratch_dir: PathBuf,
    config_file: PathBuf,
    config: StoreConfig,
}

impl Store {
    /// Initialize a new store at `root`, persisting `config`.
    ///
    /// The root directory is created if missing. Fails with
    /// [`StoreError::AlreadyInitialized`] if a configuration is already
    /// persisted there (silent re-initialization could orphan existing
    /// content), and with [`StoreError::NotEmpty`] if the directory holds
    /// anything besides the store's own reserved entries.
    pub fn init(root: impl AsRef<Path>, config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let root = root.as_ref();
        if !root.exists() {
            fsutil::create_dir_all_mode(root, config.dmode)?;
        }
        let root = root.canonicalize()?;

        let config_file = root.join(CONFIG_FILE_NAME);
        if config_file.exists() {
            return Err(StoreError::AlreadyInitialized(root));
        }
        for dir_entry in std::fs::read_dir(&root)? {
            let name = dir_entry?.file_name();
            if name != SCRATCH_DIR_NAME {
                return Err(StoreError::NotEmpty(root));
            }
        }

        let scratch_dir = root.join(SCRATCH_DIR_NAME);
        fsutil::create_dir_all_mode(&scratch_dir, config.dmode)?;
        config.persist(&root)?;
        tracing::debug!(root = %root.display(), "store initialized");

        Ok(Self {
            root,
            scratch_dir,
            config_file,
            config,
        })
    }

    /// Open the store already initialized at `root`.
    ///
    /// Fails with [`StoreError::NotInitialized`] when no configuration is
    /// persisted there.
    pub fn open_root(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(StoreError::NotInitialized(root.to_path_buf()));
        }
        let root = root.canonicalize()?;
        let config = StoreConfig::load(&root)?;

        let scratch_dir = root.join(SCRATCH_DIR_NAME);
        if !scratch_dir.is_dir() {
            fsutil::create_dir_all_mode(&scratch_dir, config.dmode)?;
        }

        Ok(Self {
            config_file: root.join(CONFIG_FILE_NAME),
            scratch_dir,
            root,
            config,
        })
    }

    /// Absolute root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The persisted configuration this store was initialized with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // ---------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------

    /// Store the file at `source` under its content address.
    ///
    /// `strategy` overrides the configured default for this call. The
    /// returned entry's `is_duplicate` reports whether content with this
    /// checksum already existed. See [`PutStrategy`] for the trade-offs;
    /// note that the rename strategies consume the source file.
    pub fn put(
        &self,
        source: impl AsRef<Path>,
        strategy: Option<PutStrategy>,
        progress: Option<&ProgressCallback<'_>>,
    ) -> StoreResult<StoreEntry> {
        let strategy = strategy.unwrap_or(self.config.default_put_strategy);
        PutRunner::new(&self.root, &self.scratch_dir, &self.config).run(
            strategy,
            source.as_ref(),
            progress,
        )
    }

    /// Put every regular file under `dir`, optionally recursing.
    ///
    /// Returns `(original path, entry)` pairs in walk order.
    pub fn put_dir(
        &self,
        dir: impl AsRef<Path>,
        recursive: bool,
        strategy: Option<PutStrategy>,
        progress: Option<&ProgressCallback<'_>>,
    ) -> StoreResult<Vec<(PathBuf, StoreEntry)>> {
        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut results = Vec::new();
        for dir_entry in walkdir::WalkDir::new(dir.as_ref())
            .min_depth(1)
            .max_depth(max_depth)
        {
            let dir_entry = dir_entry.map_err(std::io::Error::from)?;
            if !dir_entry.file_type().is_file() {
                continue;
            }
            let source = dir_entry.into_path();
            let entry = self.put(&source, strategy, progress)?;
            results.push((source, entry));
        }
        Ok(results)
    }

    /// Remove the file stored under `checksum`, pruning any shard
    /// directories the removal left empty. Absence is not an error.
    pub fn delete(&self, checksum: &str) -> StoreResult<()> {
        let path = self.addressed_path(checksum)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                self.prune_empty_dirs(path);
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    /// Look up `checksum`, returning its entry iff a regular file exists at
    /// its address. `Ok(None)` is the expected "not present" outcome, not
    /// an error.
    pub fn get(&self, checksum: &str) -> StoreResult<Option<StoreEntry>> {
        let entry = self.entry_for(checksum)?;
        if self.root.join(entry.path()).is_file() {
            Ok(Some(entry))
        } else {
            Ok(None)
        }
    }

    /// Whether content with `checksum` is present.
    pub fn exists(&self, checksum: &str) -> StoreResult<bool> {
        Ok(self.get(checksum)?.is_some())
    }

    /// Open the stored file for reading. Modes `"r"`, `"rb"` and `"rt"`
    /// are accepted; anything else fails with [`StoreError::InvalidMode`]
    /// -- stored files are never opened for in-place mutation.
    ///
    /// Absence, or anything other than a regular file at the address, fails
    /// with a `NotFound` I/O error up front rather than handing back a
    /// handle whose reads fail later.
    pub fn open(&self, checksum: &str, mode: &str) -> StoreResult<File> {
        if !matches!(mode, "r" | "rb" | "rt") {
            return Err(StoreError::InvalidMode(mode.to_string()));
        }
        let path = self.addressed_path(checksum)?;
        if !path.is_file() {
            return Err(std::io::Error::from(std::io::ErrorKind::NotFound).into());
        }
        Ok(File::open(path)?)
    }

    /// Materialize the content stored under `checksum` at `dest`.
    ///
    /// Returns the checkout's verified checksum, or `None` when the
    /// strategy reports none. With `dry_run` nothing is written; the copy
    /// strategy still computes and returns the would-be checksum.
    pub fn checkout(
        &self,
        strategy: CheckoutStrategy,
        checksum: &str,
        dest: impl AsRef<Path>,
        progress: Option<&ProgressCallback<'_>>,
        dry_run: bool,
    ) -> StoreResult<Option<String>> {
        let entry = self.entry_for(checksum)?;
        CheckoutRunner::new(&self.root, &self.config).run(
            strategy,
            &entry,
            dest.as_ref(),
            progress,
            dry_run,
        )
    }

    // ---------------------------------------------------------------
    // Enumeration
    // ---------------------------------------------------------------

    /// Iterate over the absolute paths of all stored files. Reserved
    /// entries (configuration, scratch) are excluded.
    pub fn files(&self) -> impl Iterator<Item = StoreResult<PathBuf>> + '_ {
        walkdir::WalkDir::new(&self.root)
            .into_iter()
            .filter_map(move |dir_entry| match dir_entry {
                Ok(dir_entry) => {
                    let path = dir_entry.path();
                    if dir_entry.file_type().is_file() && !self.is_reserved(path) {
                        Some(Ok(dir_entry.into_path()))
                    } else {
                        None
                    }
                }
                Err(err) => Some(Err(std::io::Error::from(err).into())),
            })
    }

    /// Number of stored files.
    pub fn count(&self) -> StoreResult<u64> {
        let mut count = 0;
        for path in self.files() {
            path?;
            count += 1;
        }
        Ok(count)
    }

    /// Total size in bytes of all stored files.
    pub fn size(&self) -> StoreResult<u64> {
        let mut total = 0;
        for path in self.files() {
            total += std::fs::metadata(path?)?.len();
        }
        Ok(total)
    }

    // ---------------------------------------------------------------
    // Audit
    // ---------------------------------------------------------------

    /// Lazily scan for misfiled entries; see [`ScanIter`].
    ///
    /// With `trust_physical_path` the checksum implied by each file's
    /// location is trusted (fast, assumes the shard structure is correct);
    /// otherwise every file is rehashed (slow, authoritative).
    pub fn scan(&self, trust_physical_path: bool) -> ScanIter<'_> {
        ScanIter::new(
            &self.root,
            &self.scratch_dir,
            self.config_file.clone(),
            &self.config,
            trust_physical_path,
        )
    }

    /// Rehash every stored file and move or delete any that are misfiled.
    ///
    /// A misfiled file whose correct address is already occupied is
    /// deleted -- safe because the occupant has the same checksum, hence
    /// the same bytes. Otherwise the file is moved to its address. Content
    /// is never lost.
    pub fn repair(&self) -> StoreResult<Vec<(PathBuf, StoreEntry)>> {
        let misfiled: Vec<(PathBuf, StoreEntry)> =
            self.scan(false).collect::<StoreResult<_>>()?;

        let mut repaired = Vec::with_capacity(misfiled.len());
        for (actual, expected) in misfiled {
            let dest = self.root.join(expected.path());
            if dest.is_file() {
                std::fs::remove_file(&actual)?;
            } else {
                fsutil::create_dir_all_mode(fsutil::parent_of(&dest), self.config.dmode)?;
                std::fs::rename(&actual, &dest)?;
            }
            fsutil::set_file_mode(&dest, self.config.fmode)?;
            tracing::debug!(
                from = %actual.display(),
                to = %dest.display(),
                "repaired misfiled entry"
            );
            repaired.push((actual, expected));
        }
        Ok(repaired)
    }

    // ---------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------

    fn entry_for(&self, checksum: &str) -> StoreResult<StoreEntry> {
        Ok(StoreEntry::new(
            checksum.to_string(),
            self.config.prefix_depth,
            self.config.prefix_width,
            false,
        )?)
    }

    /// Absolute addressed path for `checksum`.
    fn addressed_path(&self, checksum: &str) -> StoreResult<PathBuf> {
        Ok(self.root.join(self.entry_for(checksum)?.path()))
    }

    fn is_reserved(&self, path: &Path) -> bool {
        path == self.config_file || path.starts_with(&self.scratch_dir)
    }

    /// Remove now-empty directories from `path`'s parent up to (not
    /// including) the root. Stops at the first non-empty ancestor.
    fn prune_empty_dirs(&self, path: PathBuf) {
        let mut dir = path;
        while dir.pop() && dir != self.root && dir.starts_with(&self.root) {
            // remove_dir refuses non-empty directories, which ends the walk.
            if std::fs::remove_dir(&dir).is_err() {
                break;
            }
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("root", &self.root)
            .field("config", &self.config)
            .finish()
    }
}
