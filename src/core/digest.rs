/*!
 * Digest Engine: prefix, full, and sampled ("heuristic") 128-bit digests
 */

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use md5::{Digest as _, Md5};

use super::cancellation::CancellationToken;
use super::file_record::Digest;

const CHUNK_SIZE: usize = 8 * 1024;
const PARTIAL_SIZE: u64 = 4096;
pub const HEURISTIC_THRESHOLD: u64 = 3 * 1024 * 1024;
const HEURISTIC_BLOCK: u64 = 1024 * 1024;
const HEURISTIC_INTERVAL: u64 = 50 * 1024 * 1024;

#[derive(Debug)]
pub struct DigestError {
    pub path: std::path::PathBuf,
    pub source: io::Error,
}

impl std::fmt::Display for DigestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to digest {}: {}", self.path.display(), self.source)
    }
}

impl std::error::Error for DigestError {}

/// Digest of the first `min(size, 4096)` bytes. Cheaply falsifies equality
/// before a full read is attempted.
pub fn partial_digest(path: &Path, size: u64, token: &CancellationToken) -> Result<Digest, DigestError> {
    digest_until(path, size.min(PARTIAL_SIZE), token)
}

/// Digest of every byte in the file.
pub fn full_digest(path: &Path, size: u64, token: &CancellationToken) -> Result<Digest, DigestError> {
    digest_until(path, size, token)
}

/// Digest a fixed pattern of blocks: the first 1 MiB, then a 1 MiB block at
/// every 50 MiB offset for which a full block still fits before EOF, then
/// the final 1 MiB block ending at EOF. Only meaningful for files larger
/// than 3 MiB; callers should fall back to [`full_digest`] otherwise.
pub fn heuristic_digest(
    path: &Path,
    size: u64,
    token: &CancellationToken,
) -> Result<Digest, DigestError> {
    debug_assert!(size > HEURISTIC_THRESHOLD);

    let mut file = File::open(path).map_err(|e| DigestError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut hasher = Md5::new();

    let mut offsets = Vec::new();
    offsets.push(0u64);
    let mut offset = HEURISTIC_INTERVAL;
    while offset + HEURISTIC_BLOCK <= size {
        offsets.push(offset);
        offset += HEURISTIC_INTERVAL;
    }
    let last = size - HEURISTIC_BLOCK;
    if offsets.last() != Some(&last) {
        offsets.push(last);
    }

    let mut buf = vec![0u8; CHUNK_SIZE];
    for block_start in offsets {
        if token.is_cancelled() {
            return Err(cancelled(path));
        }
        file.seek(SeekFrom::Start(block_start)).map_err(|e| DigestError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut remaining = HEURISTIC_BLOCK;
        while remaining > 0 {
            if token.is_cancelled() {
                return Err(cancelled(path));
            }
            let to_read = remaining.min(CHUNK_SIZE as u64) as usize;
            let n = file.read(&mut buf[..to_read]).map_err(|e| DigestError {
                path: path.to_path_buf(),
                source: e,
            })?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            remaining -= n as u64;
        }
    }

    Ok(hasher.finalize().into())
}

fn digest_until(path: &Path, limit: u64, token: &CancellationToken) -> Result<Digest, DigestError> {
    let mut file = File::open(path).map_err(|e| DigestError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut hasher = Md5::new();
    let mut remaining = limit;
    let mut buf = vec![0u8; CHUNK_SIZE];

    while remaining > 0 {
        if token.is_cancelled() {
            return Err(cancelled(path));
        }
        let to_read = remaining.min(CHUNK_SIZE as u64) as usize;
        let n = file.read(&mut buf[..to_read]).map_err(|e| DigestError {
            path: path.to_path_buf(),
            source: e,
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        remaining -= n as u64;
    }

    Ok(hasher.finalize().into())
}

fn cancelled(path: &Path) -> DigestError {
    DigestError {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::Interrupted, "cancelled"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &[u8]) -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), contents).unwrap();
        file
    }

    #[test]
    fn test_full_digest_matches_known_md5() {
        let file = write_temp(b"HELLO");
        let token = CancellationToken::new();
        let digest = full_digest(file.path(), 5, &token).unwrap();
        // md5("HELLO") = 4dfdbff6dfd35ccbf8bc33fef69d8c1a
        assert_eq!(hex::encode(digest), "4dfdbff6dfd35ccbf8bc33fef69d8c1a");
    }

    #[test]
    fn test_identical_content_same_digest() {
        let a = write_temp(b"HELLO");
        let b = write_temp(b"HELLO");
        let token = CancellationToken::new();
        assert_eq!(
            full_digest(a.path(), 5, &token).unwrap(),
            full_digest(b.path(), 5, &token).unwrap()
        );
    }

    #[test]
    fn test_partial_digest_falsifies_before_full_read() {
        let a = write_temp(b"ALPHA");
        let b = write_temp(b"ALPHZ");
        let token = CancellationToken::new();
        assert_ne!(
            partial_digest(a.path(), 5, &token).unwrap(),
            partial_digest(b.path(), 5, &token).unwrap()
        );
    }

    #[test]
    fn test_heuristic_digest_samples_large_file() {
        let size = HEURISTIC_THRESHOLD as usize + 1024;
        let contents = vec![0xAB; size];
        let file = write_temp(&contents);
        let token = CancellationToken::new();
        let d1 = heuristic_digest(file.path(), size as u64, &token).unwrap();
        let d2 = heuristic_digest(file.path(), size as u64, &token).unwrap();
        assert_eq!(d1, d2);
    }

    #[test]
    fn test_digest_missing_file_errors() {
        let token = CancellationToken::new();
        let result = full_digest(Path::new("/nonexistent/path/xyz"), 10, &token);
        assert!(result.is_err());
    }
}
