/*!
 * Identity Oracle: distinguishes hard links from the same physical file
 * reached twice through different paths.
 */

use super::file_record::FileRecord;

/// True iff `a` and `b` share `(device, inode)` — they are the same
/// physical file on disk, whatever path led to them.
pub fn is_hardlink(a: &FileRecord, b: &FileRecord) -> bool {
    a.device == b.device && a.inode == b.inode
}

/// True iff `a` and `b` are not just the same physical file but were
/// reached through what is effectively the same path: identical identity,
/// identical basename, and parent directories that are themselves the same
/// physical directory. This distinguishes a genuine hard link (two
/// distinct directory entries pointing at one inode) from the user having
/// named the same directory twice on the command line.
pub fn is_same_file(a: &FileRecord, b: &FileRecord) -> bool {
    if !is_hardlink(a, b) {
        return false;
    }
    if a.filename() != b.filename() {
        return false;
    }
    match (parent_identity(a), parent_identity(b)) {
        (Some(pa), Some(pb)) => pa == pb,
        _ => false,
    }
}

#[cfg(unix)]
fn parent_identity(record: &FileRecord) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    let parent = record.parent()?;
    let meta = std::fs::metadata(parent).ok()?;
    Some((meta.dev(), meta.ino()))
}

#[cfg(windows)]
fn parent_identity(record: &FileRecord) -> Option<(u64, u64)> {
    let parent = record.parent()?;
    windows_identity::file_id(parent)
}

#[cfg(windows)]
mod windows_identity {
    use std::os::windows::io::AsRawHandle;
    use std::path::Path;

    #[repr(C)]
    #[derive(Default)]
    struct ByHandleFileInformation {
        file_attributes: u32,
        creation_time: u64,
        last_access_time: u64,
        last_write_time: u64,
        volume_serial_number: u32,
        file_size_high: u32,
        file_size_low: u32,
        number_of_links: u32,
        file_index_high: u32,
        file_index_low: u32,
    }

    extern "system" {
        fn GetFileInformationByHandle(
            handle: std::os::raw::c_void,
            info: *mut ByHandleFileInformation,
        ) -> i32;
    }

    /// (volume serial, file index) pair substituting for (device, inode)
    /// on Windows, where hard link detection requires an open handle.
    pub fn file_id(path: &Path) -> Option<(u64, u64)> {
        let file = std::fs::File::open(path).ok()?;
        let handle = file.as_raw_handle();
        let mut info = ByHandleFileInformation::default();
        let ok = unsafe { GetFileInformationByHandle(handle as _, &mut info) };
        if ok == 0 {
            return None;
        }
        let file_index = ((info.file_index_high as u64) << 32) | info.file_index_low as u64;
        Some((info.volume_serial_number as u64, file_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::file_record::Timestamp;
    use tempfile::tempdir;

    fn record_for(path: &std::path::Path) -> FileRecord {
        let meta = std::fs::metadata(path).unwrap();
        #[cfg(unix)]
        let (device, inode) = {
            use std::os::unix::fs::MetadataExt;
            (meta.dev(), meta.ino())
        };
        #[cfg(not(unix))]
        let (device, inode) = (0u64, 0u64);

        FileRecord {
            path: path.to_path_buf(),
            size: meta.len(),
            device,
            inode,
            mtime: Timestamp::default(),
            ctime: Timestamp::default(),
            mode: 0o644,
            uid: 0,
            gid: 0,
            partial_digest: None,
            full_digest: None,
            group: None,
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_hardlink_detected() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, b"content").unwrap();
        std::fs::hard_link(&a, &b).unwrap();

        let ra = record_for(&a);
        let rb = record_for(&b);

        assert!(is_hardlink(&ra, &rb));
        assert!(!is_same_file(&ra, &rb));
    }

    #[cfg(unix)]
    #[test]
    fn test_same_file_reached_twice() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        std::fs::write(&a, b"content").unwrap();

        let ra = record_for(&a);
        let rb = record_for(&a);

        assert!(is_hardlink(&ra, &rb));
        assert!(is_same_file(&ra, &rb));
    }

    #[test]
    fn test_distinct_files_not_hardlinked() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, b"content").unwrap();
        std::fs::write(&b, b"content").unwrap();

        let ra = record_for(&a);
        let rb = record_for(&b);

        assert!(!is_hardlink(&ra, &rb));
        assert!(!is_same_file(&ra, &rb));
    }

    #[test]
    fn test_different_basename_same_identity_is_hardlink_not_samefile() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("original.txt");
        let renamed_view = dir.path().join("alias.txt");
        std::fs::write(&a, b"content").unwrap();
        std::fs::hard_link(&a, &renamed_view).unwrap();

        let ra = record_for(&a);
        let rb = record_for(&renamed_view);
        assert!(is_hardlink(&ra, &rb));
        assert!(!is_same_file(&ra, &rb));
    }
}
