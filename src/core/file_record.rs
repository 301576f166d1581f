/*!
 * The FileRecord data model and its arena
 */

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Identifies one [`FileRecord`] inside a [`FileArena`]. Using an index
/// instead of a pointer keeps the arena iterator-friendly and destructor
/// free, matching the recommended port of the original's intrusive lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(pub usize);

/// Identifies a match set a record has been assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Timestamp {
    pub secs: i64,
    pub nanos: u32,
}

impl Timestamp {
    pub fn from_system_time(t: SystemTime) -> Self {
        match t.duration_since(SystemTime::UNIX_EPOCH) {
            Ok(d) => Timestamp {
                secs: d.as_secs() as i64,
                nanos: d.subsec_nanos(),
            },
            Err(e) => {
                let d = e.duration();
                Timestamp {
                    secs: -(d.as_secs() as i64),
                    nanos: d.subsec_nanos(),
                }
            }
        }
    }
}

pub type Digest = [u8; 16];

/// A candidate file emitted by the Enumerator and mutated in place as the
/// Grouping Engine lazily populates its digests.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size: u64,
    pub device: u64,
    pub inode: u64,
    pub mtime: Timestamp,
    pub ctime: Timestamp,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub partial_digest: Option<Digest>,
    pub full_digest: Option<Digest>,
    pub group: Option<GroupId>,
}

impl FileRecord {
    pub fn parent(&self) -> Option<&Path> {
        self.path.parent()
    }

    pub fn filename(&self) -> &std::ffi::OsStr {
        self.path.file_name().unwrap_or_default()
    }

    /// (mode, uid, gid) as a comparable triple, used by the permission
    /// filter to segregate otherwise-identical content by ownership.
    pub fn permission_triple(&self) -> (u32, u32, u32) {
        (self.mode, self.uid, self.gid)
    }
}

/// Owns every [`FileRecord`] discovered during a run.
#[derive(Debug, Default)]
pub struct FileArena {
    records: Vec<FileRecord>,
}

impl FileArena {
    pub fn new() -> Self {
        Self { records: Vec::new() }
    }

    pub fn insert(&mut self, record: FileRecord) -> FileId {
        let id = FileId(self.records.len());
        self.records.push(record);
        id
    }

    pub fn get(&self, id: FileId) -> &FileRecord {
        &self.records[id.0]
    }

    pub fn get_mut(&mut self, id: FileId) -> &mut FileRecord {
        &mut self.records[id.0]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FileId, &FileRecord)> {
        self.records
            .iter()
            .enumerate()
            .map(|(i, r)| (FileId(i), r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(path: &str, size: u64) -> FileRecord {
        FileRecord {
            path: PathBuf::from(path),
            size,
            device: 1,
            inode: 2,
            mtime: Timestamp::default(),
            ctime: Timestamp::default(),
            mode: 0o644,
            uid: 1000,
            gid: 1000,
            partial_digest: None,
            full_digest: None,
            group: None,
        }
    }

    #[test]
    fn test_arena_insert_and_get() {
        let mut arena = FileArena::new();
        let id = arena.insert(sample("/tmp/a", 5));
        assert_eq!(arena.get(id).size, 5);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_arena_ids_are_stable() {
        let mut arena = FileArena::new();
        let a = arena.insert(sample("/tmp/a", 1));
        let b = arena.insert(sample("/tmp/b", 2));
        assert_ne!(a, b);
        assert_eq!(arena.get(a).path, PathBuf::from("/tmp/a"));
        assert_eq!(arena.get(b).path, PathBuf::from("/tmp/b"));
    }

    #[test]
    fn test_permission_triple() {
        let rec = sample("/tmp/a", 1);
        assert_eq!(rec.permission_triple(), (0o644, 1000, 1000));
    }
}
