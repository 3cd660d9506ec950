//! Chunked BLAKE3 digest computation with adaptive sizing.

use std::io;

use crate::source::ByteSource;

/// Length of a hex-encoded BLAKE3 digest.
pub const CHECKSUM_HEX_LEN: usize = 64;

/// Fallback I/O block size when a source offers no hint.
pub const DEFAULT_BLOCK_SIZE: u64 = 4096;

/// Sources larger than this (or of unknown size) hash multi-threaded in
/// large chunks. Below it, thread-pool overhead dominates the hash time.
const PARALLEL_THRESHOLD: u64 = 1_572_864; // 1.5 MiB

/// Target chunk size for large sources, rounded down to a block multiple.
const LARGE_CHUNK: u64 = 32 * 1024 * 1024;

/// Stream `source` to end-of-stream and return the lowercase hex BLAKE3
/// digest of its contents.
///
/// Chunking adapts to the source's hints: a source that advertises a size
/// at or below 1.5 MiB is read in block-sized chunks and hashed on the
/// calling thread; anything larger, or of unknown size, is read in ~32 MiB
/// chunks (rounded down to a multiple of the block size) and hashed with
/// BLAKE3's rayon-parallel update. The digest is identical either way --
/// chunk boundaries never affect BLAKE3 output.
///
/// Any read error aborts the computation; the caller restarts on a fresh
/// source if it wants to retry.
pub fn compute_checksum<S: ByteSource>(source: &mut S) -> io::Result<String> {
    let block = source.block_size().max(1);
    let (chunk_size, parallel) = match source.total_bytes() {
        Some(len) if len <= PARALLEL_THRESHOLD => (block, false),
        _ => ((LARGE_CHUNK / block).max(1) * block, true),
    };
    tracing::debug!(
        path = %source.source_path().display(),
        chunk_size,
        parallel,
        "computing checksum"
    );

    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; chunk_size as usize];
    loop {
        let n = source.read_chunk(&mut buf)?;
        if n == 0 {
            break;
        }
        if parallel {
            hasher.update_rayon(&buf[..n]);
        } else {
            hasher.update(&buf[..n]);
        }
    }
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{FileSource, MemorySource};

    fn reference_digest(data: &[u8]) -> String {
        blake3::hash(data).to_hex().to_string()
    }

    #[test]
    fn digest_matches_single_shot_hash() {
        let data = b"the quick brown fox".to_vec();
        let mut source = MemorySource::new(data.clone(), true);
        assert_eq!(compute_checksum(&mut source).unwrap(), reference_digest(&data));
    }

    #[test]
    fn digest_is_stable_across_chunking_branches() {
        // Same bytes through the small-chunk branch (size advertised) and
        // the large-chunk parallel branch (size withheld).
        let data: Vec<u8> = (0..100_000u32).flat_map(|i| i.to_le_bytes()).collect();

        let mut sized = MemorySource::new(data.clone(), true);
        let mut unsized_ = MemorySource::new(data.clone(), false);

        let small = compute_checksum(&mut sized).unwrap();
        let large = compute_checksum(&mut unsized_).unwrap();
        assert_eq!(small, large);
        assert_eq!(small, reference_digest(&data));
    }

    #[test]
    fn digest_of_empty_source() {
        let mut source = MemorySource::new(Vec::new(), true);
        assert_eq!(compute_checksum(&mut source).unwrap(), reference_digest(b""));
    }

    #[test]
    fn digest_is_lowercase_hex_of_expected_length() {
        let mut source = MemorySource::new(b"abc".to_vec(), true);
        let digest = compute_checksum(&mut source).unwrap();
        assert_eq!(digest.len(), CHECKSUM_HEX_LEN);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn digest_from_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input");
        std::fs::write(&path, b"file bytes").unwrap();

        let mut source = FileSource::open(&path).unwrap();
        assert_eq!(
            compute_checksum(&mut source).unwrap(),
            reference_digest(b"file bytes")
        );
    }

    #[test]
    fn repeated_computation_is_deterministic() {
        let data = b"determinism".to_vec();
        let a = compute_checksum(&mut MemorySource::new(data.clone(), true)).unwrap();
        let b = compute_checksum(&mut MemorySource::new(data, true)).unwrap();
        assert_eq!(a, b);
    }
}
