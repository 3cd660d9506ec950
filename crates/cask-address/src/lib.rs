//! Checksum-to-path addressing for the Cask store.
//!
//! A content checksum is split ("sharded") into a sequence of path segments:
//! `depth` fixed-width prefix segments followed by the remainder of the
//! checksum. Sharding bounds per-directory file counts; a store with
//! `depth = 1, width = 2` places checksum `ab12cd…` at `ab/12cd…`.
//!
//! The scheme is a pure function with a trivial inverse: concatenating the
//! segments of `shard(c)` reproduces `c` exactly. Nothing in this crate
//! touches the filesystem.

/// Errors from the addressing scheme.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AddressError {
    /// The checksum is too short to be split into `depth` prefix segments
    /// of `width` characters plus a non-empty remainder.
    #[error(
        "checksum of length {len} cannot be sharded with depth {depth} and width {width}"
    )]
    InvalidChecksumLength { len: usize, depth: u32, width: u32 },

    /// The checksum contains non-ASCII characters. Checksums are hex
    /// digests; rejecting anything wider keeps segment splitting a plain
    /// byte operation.
    #[error("checksum is not ASCII: {0:?}")]
    NotAscii(String),
}

/// Result alias for addressing operations.
pub type AddressResult<T> = Result<T, AddressError>;

/// Split `checksum` into `depth` prefix segments of `width` characters each,
/// followed by the remainder.
///
/// Fails when the checksum is not ASCII, or when
/// `checksum.len() <= depth * width`: the remainder segment must be
/// non-empty, otherwise distinct checksums could map to the same path.
///
/// # Examples
///
/// ```
/// use cask_address::shard;
///
/// let segments = shard("ab12cd34ef", 1, 2).unwrap();
/// assert_eq!(segments, vec!["ab", "12cd34ef"]);
/// ```
pub fn shard(checksum: &str, depth: u32, width: u32) -> AddressResult<Vec<String>> {
    if !checksum.is_ascii() {
        return Err(AddressError::NotAscii(checksum.to_string()));
    }
    let prefix_len = (depth as usize) * (width as usize);
    if checksum.len() <= prefix_len {
        return Err(AddressError::InvalidChecksumLength {
            len: checksum.len(),
            depth,
            width,
        });
    }

    let width = width as usize;
    let mut segments = Vec::with_capacity(depth as usize + 1);
    for i in 0..depth as usize {
        segments.push(checksum[i * width..(i + 1) * width].to_string());
    }
    segments.push(checksum[prefix_len..].to_string());
    Ok(segments)
}

/// Reassemble a checksum from its sharded path segments.
///
/// Inverse of [`shard`]: for every valid checksum `c`,
/// `unshard(shard(c, d, w).unwrap()) == c`.
pub fn unshard<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut checksum = String::new();
    for segment in segments {
        checksum.push_str(segment.as_ref());
    }
    checksum
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn shard_depth_one_width_two() {
        let segments = shard("ab12cd34ef", 1, 2).unwrap();
        assert_eq!(segments, vec!["ab".to_string(), "12cd34ef".to_string()]);
    }

    #[test]
    fn shard_deeper_prefix() {
        let segments = shard("abcdef0123", 3, 2).unwrap();
        assert_eq!(segments, vec!["ab", "cd", "ef", "0123"]);
    }

    #[test]
    fn shard_rejects_exhausted_checksum() {
        // depth * width == len leaves an empty remainder.
        let err = shard("abcd", 2, 2).unwrap_err();
        assert_eq!(
            err,
            AddressError::InvalidChecksumLength {
                len: 4,
                depth: 2,
                width: 2
            }
        );
    }

    #[test]
    fn shard_rejects_short_checksum() {
        assert!(shard("ab", 2, 4).is_err());
    }

    #[test]
    fn shard_rejects_non_ascii_checksum() {
        // Multi-byte characters must error, not split on a byte boundary.
        let err = shard("日本語abcdef", 1, 2).unwrap_err();
        assert_eq!(err, AddressError::NotAscii("日本語abcdef".to_string()));
    }

    #[test]
    fn unshard_concatenates() {
        assert_eq!(unshard(["ab", "12cd34ef"]), "ab12cd34ef");
    }

    proptest! {
        #[test]
        fn shard_round_trips(
            checksum in "[0-9a-f]{9,64}",
            depth in 1u32..4,
            width in 1u32..3,
        ) {
            // 9 hex chars always exceed the largest depth * width above.
            let segments = shard(&checksum, depth, width).unwrap();
            prop_assert_eq!(unshard(&segments), checksum.clone());
            prop_assert_eq!(segments.len() as u32, depth + 1);
            for seg in &segments[..depth as usize] {
                prop_assert_eq!(seg.len() as u32, width);
            }
        }
    }
}
