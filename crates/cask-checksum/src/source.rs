//! Byte-source capability trait and its decorators.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::engine::DEFAULT_BLOCK_SIZE;

/// Callback receiving `(source path, (bytes processed, total bytes))` after
/// each chunk. The total is `None` when the source size is unknown.
///
/// Callbacks are best-effort reporting only; no operation requires one for
/// correctness, and return values are ignored.
///
/// The lifetime parameter lets callbacks borrow from their environment;
/// without it the object-lifetime default would force `'static` closures.
pub type ProgressCallback<'a> = dyn Fn(&Path, (u64, Option<u64>)) + Send + Sync + 'a;

/// A readable stream of bytes with an identifying path and sizing hints.
///
/// `read_chunk` fills as much of `buf` as possible and returns the number of
/// bytes written; `0` means end-of-stream. The hints (`total_bytes`,
/// `block_size`) drive chunk-size and parallelism decisions in
/// [`compute_checksum`](crate::compute_checksum) and may be approximate or
/// absent -- they never affect the digest.
pub trait ByteSource {
    /// Path identifying this source, used for progress reporting and
    /// diagnostics.
    fn source_path(&self) -> &Path;

    /// Total bytes this source will yield, if known.
    fn total_bytes(&self) -> Option<u64>;

    /// The source's natural I/O block size in bytes.
    fn block_size(&self) -> u64 {
        DEFAULT_BLOCK_SIZE
    }

    /// Read the next chunk into `buf`. Returns `0` at end-of-stream.
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// A [`ByteSource`] over a regular file.
pub struct FileSource {
    file: File,
    path: PathBuf,
    len: Option<u64>,
    block_size: u64,
}

impl FileSource {
    /// Open `path` for streaming.
    ///
    /// Size and block-size hints come from the file's metadata. The lookup
    /// is opportunistic: if it fails the source still works, with an
    /// unknown size and the default block size.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = File::open(&path)?;
        let (len, block_size) = match file.metadata() {
            Ok(meta) => (Some(meta.len()), natural_block_size(&meta)),
            Err(err) => {
                tracing::debug!(path = %path.display(), %err, "metadata hint unavailable");
                (None, DEFAULT_BLOCK_SIZE)
            }
        };
        Ok(Self {
            file,
            path,
            len,
            block_size,
        })
    }
}

impl ByteSource for FileSource {
    fn source_path(&self) -> &Path {
        &self.path
    }

    fn total_bytes(&self) -> Option<u64> {
        self.len
    }

    fn block_size(&self) -> u64 {
        self.block_size
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // Fill the whole chunk unless the stream ends first; short reads
        // from the kernel are not end-of-stream.
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}

#[cfg(unix)]
fn natural_block_size(meta: &std::fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    let blksize = meta.blksize();
    if blksize == 0 {
        DEFAULT_BLOCK_SIZE
    } else {
        blksize
    }
}

#[cfg(not(unix))]
fn natural_block_size(_meta: &std::fs::Metadata) -> u64 {
    DEFAULT_BLOCK_SIZE
}

/// Decorator that writes every chunk read to a staging file.
///
/// The staging file is created eagerly at construction so that a failure to
/// create it surfaces before any bytes are consumed from the inner source.
/// After the stream is exhausted, [`finish`](TeeSource::finish) flushes the
/// staging file and hands its path back to the caller, who owns the rename
/// into place.
pub struct TeeSource<S> {
    inner: S,
    staging: File,
    staging_path: PathBuf,
}

impl<S: ByteSource> TeeSource<S> {
    /// Wrap `inner`, mirroring all bytes into a new file at `staging_path`.
    pub fn create(inner: S, staging_path: impl Into<PathBuf>) -> io::Result<Self> {
        let staging_path = staging_path.into();
        let staging = File::create(&staging_path)?;
        Ok(Self {
            inner,
            staging,
            staging_path,
        })
    }

    /// Path of the staging file receiving the mirrored bytes.
    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }

    /// Flush and sync the staging file, returning its path.
    pub fn finish(self) -> io::Result<PathBuf> {
        self.staging.sync_all()?;
        Ok(self.staging_path)
    }
}

impl<S: ByteSource> ByteSource for TeeSource<S> {
    fn source_path(&self) -> &Path {
        self.inner.source_path()
    }

    fn total_bytes(&self) -> Option<u64> {
        self.inner.total_bytes()
    }

    fn block_size(&self) -> u64 {
        self.inner.block_size()
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read_chunk(buf)?;
        if n > 0 {
            self.staging.write_all(&buf[..n])?;
        }
        Ok(n)
    }
}

/// Decorator that reports cumulative progress to a callback after each chunk.
pub struct ProgressSource<'a, S> {
    inner: S,
    callback: Option<&'a ProgressCallback<'a>>,
    processed: u64,
    total: Option<u64>,
}

impl<'a, S: ByteSource> ProgressSource<'a, S> {
    /// Wrap `inner`, reporting to `callback` when one is supplied.
    ///
    /// The total-bytes hint is captured once at construction.
    pub fn new(inner: S, callback: Option<&'a ProgressCallback<'a>>) -> Self {
        let total = inner.total_bytes();
        Self {
            inner,
            callback,
            processed: 0,
            total,
        }
    }

    /// Unwrap the decorated source.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: ByteSource> ByteSource for ProgressSource<'_, S> {
    fn source_path(&self) -> &Path {
        self.inner.source_path()
    }

    fn total_bytes(&self) -> Option<u64> {
        self.inner.total_bytes()
    }

    fn block_size(&self) -> u64 {
        self.inner.block_size()
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read_chunk(buf)?;
        if n > 0 {
            self.processed += n as u64;
            if let Some(callback) = self.callback {
                callback(self.inner.source_path(), (self.processed, self.total));
            }
        }
        Ok(n)
    }
}

/// Fixed-content in-memory source, for tests of the engine and decorators.
#[cfg(test)]
pub(crate) struct MemorySource {
    data: Vec<u8>,
    pos: usize,
    path: PathBuf,
    advertise_len: bool,
}

#[cfg(test)]
impl MemorySource {
    pub(crate) fn new(data: Vec<u8>, advertise_len: bool) -> Self {
        Self {
            data,
            pos: 0,
            path: PathBuf::from("<memory>"),
            advertise_len,
        }
    }
}

#[cfg(test)]
impl ByteSource for MemorySource {
    fn source_path(&self) -> &Path {
        &self.path
    }

    fn total_bytes(&self) -> Option<u64> {
        self.advertise_len.then(|| self.data.len() as u64)
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = (self.data.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn drain(source: &mut impl ByteSource, chunk: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; chunk];
        loop {
            let n = source.read_chunk(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        out
    }

    #[test]
    fn file_source_reads_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input");
        std::fs::write(&path, b"hello cask").unwrap();

        let mut source = FileSource::open(&path).unwrap();
        assert_eq!(source.total_bytes(), Some(10));
        assert_eq!(drain(&mut source, 3), b"hello cask");
    }

    #[test]
    fn tee_mirrors_bytes_to_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");

        let inner = MemorySource::new(b"mirrored content".to_vec(), true);
        let mut tee = TeeSource::create(inner, &staging).unwrap();
        assert_eq!(drain(&mut tee, 4), b"mirrored content");

        let path = tee.finish().unwrap();
        assert_eq!(path, staging);
        assert_eq!(std::fs::read(&staging).unwrap(), b"mirrored content");
    }

    #[test]
    fn progress_reports_cumulative_bytes() {
        let last = AtomicU64::new(0);
        let calls = AtomicU64::new(0);
        let callback = |_: &Path, (processed, total): (u64, Option<u64>)| {
            last.store(processed, Ordering::SeqCst);
            calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(total, Some(16));
        };

        let inner = MemorySource::new(b"mirrored content".to_vec(), true);
        let mut source = ProgressSource::new(inner, Some(&callback as &ProgressCallback<'_>));
        drain(&mut source, 4);

        assert_eq!(last.load(Ordering::SeqCst), 16);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn no_callback_is_fine() {
        let inner = MemorySource::new(b"quiet".to_vec(), false);
        let mut source = ProgressSource::new(inner, None);
        assert_eq!(drain(&mut source, 2), b"quiet");
    }
}
