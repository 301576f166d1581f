/*!
 * Enumerator: walks the configured roots subject to filters and produces a
 * flat, ordered stream of `FileRecord`s ready for the Grouping Engine.
 */

use std::path::Path;

use walkdir::WalkDir;

use crate::config::ScanRoot;

use super::cache::SignatureCache;
use super::cancellation::CancellationToken;
use super::file_record::{FileArena, FileId, Timestamp};
use super::filter::FilterSet;

/// Identifies the process's own deletion log by stat identity, so the
/// enumerator never reports the log as a duplicate candidate of itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFileIdentity {
    pub device: u64,
    pub inode: u64,
}

pub struct Enumerator<'a> {
    filters: FilterSet,
    cache: Option<&'a SignatureCache>,
    token: &'a CancellationToken,
    log_identity: Option<LogFileIdentity>,
}

impl<'a> Enumerator<'a> {
    pub fn new(
        filters: FilterSet,
        cache: Option<&'a SignatureCache>,
        token: &'a CancellationToken,
        log_identity: Option<LogFileIdentity>,
    ) -> Self {
        Self {
            filters,
            cache,
            token,
            log_identity,
        }
    }

    /// Walk every root in order, appending discovered files into `arena`.
    /// Traversal order across roots, and within a root, is depth-first in
    /// the order `walkdir` yields entries.
    pub fn enumerate(&self, roots: &[ScanRoot], arena: &mut FileArena) {
        for root in roots {
            if self.token.is_cancelled() {
                return;
            }
            self.enumerate_root(root, arena);
        }
    }

    fn enumerate_root(&self, root: &ScanRoot, arena: &mut FileArena) {
        let max_depth = if root.recursive { usize::MAX } else { 1 };

        let mut walker = WalkDir::new(&root.path)
            .follow_links(self.filters.follow_symlinks)
            .max_depth(max_depth)
            .into_iter();

        loop {
            if self.token.is_cancelled() {
                return;
            }
            let entry = match walker.next() {
                None => break,
                Some(Ok(entry)) => entry,
                Some(Err(err)) => {
                    tracing::warn!("failed to read directory entry: {}", err);
                    continue;
                }
            };

            let path = entry.path();
            if let Some(name) = path.file_name() {
                if self.filters.should_skip_hidden(name) {
                    if entry.file_type().is_dir() {
                        walker.skip_current_dir();
                    }
                    continue;
                }
            }

            if entry.file_type().is_dir() {
                self.on_descend(path);
                continue;
            }

            if !entry.file_type().is_file() {
                // Unresolved symlink with following disabled, or a special
                // file (socket/fifo/device): neither is a regular file.
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    tracing::warn!("failed to stat {}: {}", path.display(), err);
                    continue;
                }
            };

            let record = build_record(path, &metadata);

            if let Some(log_id) = self.log_identity {
                if record.device == log_id.device && record.inode == log_id.inode {
                    continue;
                }
            }

            if !self.filters.size_in_bounds(record.size) {
                continue;
            }

            arena.insert(record);
        }
    }

    /// Resolve the directory's canonical path and, if a cache is configured,
    /// register/prune it before descending — orphaned entries for files or
    /// subdirectories that no longer exist are dropped here.
    fn on_descend(&self, dir: &Path) {
        let Some(cache) = self.cache else { return };
        let Ok(canonical) = dir.canonicalize() else { return };
        let parent_canonical = dir.parent().and_then(|p| p.canonicalize().ok());

        if !cache.is_read_only() {
            let _ = cache.register_directory(&canonical, parent_canonical.as_deref());
            let _ = cache.prune_directory(&canonical);
        }
    }
}

fn build_record(path: &Path, metadata: &std::fs::Metadata) -> super::file_record::FileRecord {
    let size = metadata.len();
    let mtime = Timestamp::from_system_time(
        metadata
            .modified()
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH),
    );
    let ctime = stat_ctime(metadata);
    let (device, inode) = stat_identity(metadata);
    let (mode, uid, gid) = stat_permissions(metadata);

    super::file_record::FileRecord {
        path: path.to_path_buf(),
        size,
        device,
        inode,
        mtime,
        ctime,
        mode,
        uid,
        gid,
        partial_digest: None,
        full_digest: None,
        group: None,
    }
}

#[cfg(unix)]
fn stat_identity(metadata: &std::fs::Metadata) -> (u64, u64) {
    use std::os::unix::fs::MetadataExt;
    (metadata.dev(), metadata.ino())
}

#[cfg(not(unix))]
fn stat_identity(_metadata: &std::fs::Metadata) -> (u64, u64) {
    (0, 0)
}

#[cfg(unix)]
fn stat_ctime(metadata: &std::fs::Metadata) -> Timestamp {
    use std::os::unix::fs::MetadataExt;
    Timestamp {
        secs: metadata.ctime(),
        nanos: metadata.ctime_nsec() as u32,
    }
}

#[cfg(not(unix))]
fn stat_ctime(metadata: &std::fs::Metadata) -> Timestamp {
    Timestamp::from_system_time(metadata.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH))
}

#[cfg(unix)]
fn stat_permissions(metadata: &std::fs::Metadata) -> (u32, u32, u32) {
    use std::os::unix::fs::MetadataExt;
    (metadata.mode(), metadata.uid(), metadata.gid())
}

#[cfg(not(unix))]
fn stat_permissions(_metadata: &std::fs::Metadata) -> (u32, u32, u32) {
    (0, 0, 0)
}

/// Retrieve the (device, inode) identity of an existing path, used to build
/// a [`LogFileIdentity`] for the configured log file before a run starts.
pub fn identity_of(path: &Path) -> Option<LogFileIdentity> {
    let metadata = std::fs::metadata(path).ok()?;
    let (device, inode) = stat_identity(&metadata);
    Some(LogFileIdentity { device, inode })
}
