/*!
 * Byte Confirmer: reads two files in lockstep and returns equality.
 */

use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::cancellation::CancellationToken;

const CHUNK_SIZE: usize = 64 * 1024;

/// Byte-compares `a` and `b`, reading both in fixed-size chunks until
/// either a mismatch is found or both reach EOF together. Any I/O error,
/// or files reaching EOF at different points, is treated as "not
/// confirmed" rather than propagated.
pub fn confirm_equal(a: &Path, b: &Path, token: &CancellationToken) -> bool {
    let (mut fa, mut fb) = match (File::open(a), File::open(b)) {
        (Ok(fa), Ok(fb)) => (fa, fb),
        _ => return false,
    };

    let mut buf_a = vec![0u8; CHUNK_SIZE];
    let mut buf_b = vec![0u8; CHUNK_SIZE];

    loop {
        if token.is_cancelled() {
            return false;
        }
        let na = match fa.read(&mut buf_a) {
            Ok(n) => n,
            Err(_) => return false,
        };
        let nb = match fb.read(&mut buf_b) {
            Ok(n) => n,
            Err(_) => return false,
        };

        if na != nb {
            return false;
        }
        if na == 0 {
            return true;
        }
        if buf_a[..na] != buf_b[..nb] {
            return false;
        }
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
    fn test_identical_files_confirmed() {
        let a = write_temp(b"HELLO WORLD");
        let b = write_temp(b"HELLO WORLD");
        let token = CancellationToken::new();
        assert!(confirm_equal(a.path(), b.path(), &token));
    }

    #[test]
    fn test_different_content_not_confirmed() {
        let a = write_temp(b"HELLO WORLD");
        let b = write_temp(b"HELLO WORLZ");
        let token = CancellationToken::new();
        assert!(!confirm_equal(a.path(), b.path(), &token));
    }

    #[test]
    fn test_different_length_not_confirmed() {
        let a = write_temp(b"HELLO");
        let b = write_temp(b"HELLO WORLD");
        let token = CancellationToken::new();
        assert!(!confirm_equal(a.path(), b.path(), &token));
    }

    #[test]
    fn test_missing_file_not_confirmed() {
        let a = write_temp(b"HELLO");
        let token = CancellationToken::new();
        assert!(!confirm_equal(
            a.path(),
            Path::new("/nonexistent/path/xyz"),
            &token
        ));
    }

    #[test]
    fn test_large_files_spanning_multiple_chunks() {
        let contents = vec![0x42u8; CHUNK_SIZE * 3 + 17];
        let a = write_temp(&contents);
        let b = write_temp(&contents);
        let token = CancellationToken::new();
        assert!(confirm_equal(a.path(), b.path(), &token));
    }

    #[test]
    fn test_cancellation_aborts_confirmation() {
        let contents = vec![0x42u8; CHUNK_SIZE * 3];
        let a = write_temp(&contents);
        let b = write_temp(&contents);
        let token = CancellationToken::new();
        token.cancel();
        assert!(!confirm_equal(a.path(), b.path(), &token));
    }
}
