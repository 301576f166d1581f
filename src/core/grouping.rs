/*!
 * Grouping Engine: an arena-backed, never-rebalanced binary search tree
 * keyed by (size, permission-triple, partial digest, full digest), the
 * heart of the duplicate-detection pipeline. Every candidate file is
 * inserted once; the walk to its insertion point is also the comparison
 * against every other candidate that could possibly be a duplicate.
 */

use std::cmp::Ordering;

use super::cache::SignatureCache;
use super::cancellation::CancellationToken;
use super::digest::{self, HEURISTIC_THRESHOLD};
use super::file_record::{Digest, FileArena, FileId};
use super::identity;
use super::matchset::MatchSetBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

struct SearchNode {
    file: FileId,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

/// Outcome of inserting one candidate file into the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The file matched an existing resident byte-for-byte-equivalent
    /// signature; it was attached to that resident's group, not inserted
    /// as a new tree node.
    Match(FileId),
    /// No match found anywhere along the walk; the file became a new leaf.
    Inserted,
    /// The identity pre-check fired against a node visited during the walk:
    /// the incoming file is a hard link (or the same file reached twice)
    /// of something already in the tree. Per policy this isn't a
    /// reportable duplicate, so the file is dropped — neither matched nor
    /// inserted as a leaf.
    Suppressed,
    /// A digest could not be computed (I/O error, or cancellation). The
    /// file is dropped from grouping; the caller may still report the
    /// error.
    DigestUnavailable,
}

pub struct GroupingEngine {
    nodes: Vec<SearchNode>,
    root: Option<NodeId>,
    permission_sensitive: bool,
    hardlinks_as_duplicates: bool,
    heuristic_digest: bool,
}

impl GroupingEngine {
    pub fn new(permission_sensitive: bool, hardlinks_as_duplicates: bool, heuristic_digest: bool) -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            permission_sensitive,
            hardlinks_as_duplicates,
            heuristic_digest,
        }
    }

    /// Walk the tree looking for a resident with the same (size,
    /// permission-triple, partial digest, full digest) signature as
    /// `incoming`, computing digests lazily (consulting `cache` first) as
    /// the walk narrows. Descends left on "incoming sorts before resident",
    /// right otherwise.
    pub fn insert(
        &mut self,
        incoming: FileId,
        arena: &mut FileArena,
        groups: &MatchSetBuilder,
        cache: Option<&SignatureCache>,
        token: &CancellationToken,
    ) -> InsertOutcome {
        let Some(root) = self.root else {
            let node = self.push_leaf(incoming);
            self.root = Some(node);
            return InsertOutcome::Inserted;
        };

        let mut current = root;
        loop {
            if token.is_cancelled() {
                return InsertOutcome::DigestUnavailable;
            }

            let resident = self.nodes[current.0].file;

            if self.identity_suppressed(incoming, resident, arena, groups) {
                return InsertOutcome::Suppressed;
            }

            let ordering = match self.compare(incoming, resident, arena, cache, token) {
                Ok(ordering) => ordering,
                Err(_) => return InsertOutcome::DigestUnavailable,
            };

            match ordering {
                Ordering::Equal => return InsertOutcome::Match(resident),
                Ordering::Less => match self.nodes[current.0].left {
                    Some(child) => current = child,
                    None => {
                        let node = self.push_leaf(incoming);
                        self.nodes[current.0].left = Some(node);
                        return InsertOutcome::Inserted;
                    }
                },
                Ordering::Greater => match self.nodes[current.0].right {
                    Some(child) => current = child,
                    None => {
                        let node = self.push_leaf(incoming);
                        self.nodes[current.0].right = Some(node);
                        return InsertOutcome::Inserted;
                    }
                },
            }
        }
    }

    /// Immediate-mode deletion support: when a newly-discovered file
    /// outlives the resident it matched, the tree node that pointed at the
    /// now-deleted resident must be repointed at the survivor so later
    /// walks compare against it. A linear scan, but only ever called once
    /// per confirmed immediate-mode deletion, not on the hot insert path.
    pub fn replace_file(&mut self, old: FileId, new: FileId) {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.file == old) {
            node.file = new;
        }
    }

    fn push_leaf(&mut self, file: FileId) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(SearchNode {
            file,
            left: None,
            right: None,
        });
        id
    }

    /// Before the staged content comparison, check whether `incoming` is
    /// (depending on policy) a hard link or the same file reached twice as
    /// `resident`, or any file already grouped alongside `resident`. A hit
    /// aborts the whole walk: the file is neither matched nor inserted.
    fn identity_suppressed(
        &self,
        incoming: FileId,
        resident: FileId,
        arena: &FileArena,
        groups: &MatchSetBuilder,
    ) -> bool {
        let incoming_rec = arena.get(incoming);
        let resident_rec = arena.get(resident);

        if self.same_identity(incoming_rec, resident_rec) {
            return true;
        }

        if let Some(group_id) = resident_rec.group {
            for &member in groups.members(group_id) {
                if member == resident {
                    continue;
                }
                if self.same_identity(incoming_rec, arena.get(member)) {
                    return true;
                }
            }
        }

        false
    }

    fn same_identity(
        &self,
        a: &super::file_record::FileRecord,
        b: &super::file_record::FileRecord,
    ) -> bool {
        if self.hardlinks_as_duplicates {
            identity::is_same_file(a, b)
        } else {
            identity::is_hardlink(a, b)
        }
    }

    fn compare(
        &self,
        incoming: FileId,
        resident: FileId,
        arena: &mut FileArena,
        cache: Option<&SignatureCache>,
        token: &CancellationToken,
    ) -> Result<Ordering, digest::DigestError> {
        let incoming_size = arena.get(incoming).size;
        let resident_size = arena.get(resident).size;
        if incoming_size != resident_size {
            return Ok(incoming_size.cmp(&resident_size));
        }

        if self.permission_sensitive {
            let incoming_triple = arena.get(incoming).permission_triple();
            let resident_triple = arena.get(resident).permission_triple();
            if incoming_triple != resident_triple {
                // Unconditionally "less", not a directional compare: a
                // mismatched (mode, uid, gid) triple only needs to segregate
                // the incoming file away from this resident, the same way
                // the original always sets cmpresult = -1 here rather than
                // comparing the triples against each other.
                return Ok(Ordering::Less);
            }
        }

        let incoming_partial = self.ensure_partial_digest(incoming, arena, cache, token)?;
        let resident_partial = self.ensure_partial_digest(resident, arena, cache, token)?;
        if incoming_partial != resident_partial {
            return Ok(incoming_partial.cmp(&resident_partial));
        }

        let incoming_full = self.ensure_full_digest(incoming, arena, cache, token)?;
        let resident_full = self.ensure_full_digest(resident, arena, cache, token)?;
        Ok(incoming_full.cmp(&resident_full))
    }

    fn ensure_partial_digest(
        &self,
        id: FileId,
        arena: &mut FileArena,
        cache: Option<&SignatureCache>,
        token: &CancellationToken,
    ) -> Result<Digest, digest::DigestError> {
        if let Some(d) = arena.get(id).partial_digest {
            return Ok(d);
        }

        if let Some(cache) = cache {
            let record = arena.get(id).clone();
            if let Ok((Some(partial), full)) = cache.load(&record) {
                arena.get_mut(id).partial_digest = Some(partial);
                if let Some(full) = full {
                    arena.get_mut(id).full_digest = Some(full);
                }
                return Ok(partial);
            }
        }

        let record = arena.get(id).clone();
        let computed = digest::partial_digest(&record.path, record.size, token)?;
        arena.get_mut(id).partial_digest = Some(computed);

        if let Some(cache) = cache {
            let full = arena.get(id).full_digest;
            let _ = cache.save(&record, Some(computed), full);
        }

        Ok(computed)
    }

    fn ensure_full_digest(
        &self,
        id: FileId,
        arena: &mut FileArena,
        cache: Option<&SignatureCache>,
        token: &CancellationToken,
    ) -> Result<Digest, digest::DigestError> {
        if let Some(d) = arena.get(id).full_digest {
            return Ok(d);
        }

        if let Some(cache) = cache {
            let record = arena.get(id).clone();
            if let Ok((_, Some(full))) = cache.load(&record) {
                arena.get_mut(id).full_digest = Some(full);
                return Ok(full);
            }
        }

        let record = arena.get(id).clone();
        let computed = if self.heuristic_digest && record.size > HEURISTIC_THRESHOLD {
            digest::heuristic_digest(&record.path, record.size, token)?
        } else {
            digest::full_digest(&record.path, record.size, token)?
        };
        arena.get_mut(id).full_digest = Some(computed);

        if let Some(cache) = cache {
            let partial = arena.get(id).partial_digest;
            let _ = cache.save(&record, partial, Some(computed));
        }

        Ok(computed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrderBy;
    use tempfile::tempdir;

    fn write(dir: &std::path::Path, name: &str, contents: &[u8]) -> super::super::file_record::FileRecord {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        let meta = std::fs::metadata(&path).unwrap();
        #[cfg(unix)]
        let (device, inode) = {
            use std::os::unix::fs::MetadataExt;
            (meta.dev(), meta.ino())
        };
        #[cfg(not(unix))]
        let (device, inode) = (0u64, 0u64);

        super::super::file_record::FileRecord {
            path,
            size: meta.len(),
            device,
            inode,
            mtime: super::super::file_record::Timestamp::default(),
            ctime: super::super::file_record::Timestamp::default(),
            mode: 0o644,
            uid: 0,
            gid: 0,
            partial_digest: None,
            full_digest: None,
            group: None,
        }
    }

    #[test]
    fn test_identical_content_matches() {
        let dir = tempdir().unwrap();
        let mut arena = FileArena::new();
        let a = arena.insert(write(dir.path(), "a.txt", b"HELLO"));
        let b = arena.insert(write(dir.path(), "b.txt", b"HELLO"));

        let token = CancellationToken::new();
        let groups = MatchSetBuilder::new(OrderBy::Discovery, false);
        let mut engine = GroupingEngine::new(false, false, false);

        assert_eq!(
            engine.insert(a, &mut arena, &groups, None, &token),
            InsertOutcome::Inserted
        );
        assert_eq!(
            engine.insert(b, &mut arena, &groups, None, &token),
            InsertOutcome::Match(a)
        );
    }

    #[test]
    fn test_different_size_never_matches() {
        let dir = tempdir().unwrap();
        let mut arena = FileArena::new();
        let a = arena.insert(write(dir.path(), "a.txt", b"HELLO"));
        let b = arena.insert(write(dir.path(), "b.txt", b"HELLO WORLD"));

        let token = CancellationToken::new();
        let groups = MatchSetBuilder::new(OrderBy::Discovery, false);
        let mut engine = GroupingEngine::new(false, false, false);

        engine.insert(a, &mut arena, &groups, None, &token);
        assert_eq!(
            engine.insert(b, &mut arena, &groups, None, &token),
            InsertOutcome::Inserted
        );
    }

    #[test]
    fn test_partial_digest_falsifies_before_full_match() {
        let dir = tempdir().unwrap();
        let mut arena = FileArena::new();
        let a = arena.insert(write(dir.path(), "alpha.txt", b"ALPHA"));
        let b = arena.insert(write(dir.path(), "alphz.txt", b"ALPHZ"));

        let token = CancellationToken::new();
        let groups = MatchSetBuilder::new(OrderBy::Discovery, false);
        let mut engine = GroupingEngine::new(false, false, false);

        engine.insert(a, &mut arena, &groups, None, &token);
        assert_eq!(
            engine.insert(b, &mut arena, &groups, None, &token),
            InsertOutcome::Inserted
        );
    }

    #[test]
    fn test_hardlink_suppressed_by_default() {
        let dir = tempdir().unwrap();
        let a_path = dir.path().join("a.txt");
        std::fs::write(&a_path, b"content").unwrap();
        let b_path = dir.path().join("b.txt");
        std::fs::hard_link(&a_path, &b_path).unwrap();

        let read = |p: &std::path::Path| -> super::super::file_record::FileRecord {
            let meta = std::fs::metadata(p).unwrap();
            use std::os::unix::fs::MetadataExt;
            super::super::file_record::FileRecord {
                path: p.to_path_buf(),
                size: meta.len(),
                device: meta.dev(),
                inode: meta.ino(),
                mtime: super::super::file_record::Timestamp::default(),
                ctime: super::super::file_record::Timestamp::default(),
                mode: 0o644,
                uid: 0,
                gid: 0,
                partial_digest: None,
                full_digest: None,
                group: None,
            }
        };

        let mut arena = FileArena::new();
        let a = arena.insert(read(&a_path));
        let b = arena.insert(read(&b_path));

        let token = CancellationToken::new();
        let groups = MatchSetBuilder::new(OrderBy::Discovery, false);
        let mut engine = GroupingEngine::new(false, false, false);

        assert_eq!(
            engine.insert(a, &mut arena, &groups, None, &token),
            InsertOutcome::Inserted
        );
        assert_eq!(
            engine.insert(b, &mut arena, &groups, None, &token),
            InsertOutcome::Suppressed
        );
    }

    #[test]
    fn test_hardlinks_as_duplicates_flag_allows_match() {
        let dir = tempdir().unwrap();
        let a_path = dir.path().join("a.txt");
        std::fs::write(&a_path, b"content").unwrap();
        let b_path = dir.path().join("b.txt");
        std::fs::hard_link(&a_path, &b_path).unwrap();

        let read = |p: &std::path::Path| -> super::super::file_record::FileRecord {
            let meta = std::fs::metadata(p).unwrap();
            use std::os::unix::fs::MetadataExt;
            super::super::file_record::FileRecord {
                path: p.to_path_buf(),
                size: meta.len(),
                device: meta.dev(),
                inode: meta.ino(),
                mtime: super::super::file_record::Timestamp::default(),
                ctime: super::super::file_record::Timestamp::default(),
                mode: 0o644,
                uid: 0,
                gid: 0,
                partial_digest: None,
                full_digest: None,
                group: None,
            }
        };

        let mut arena = FileArena::new();
        let a = arena.insert(read(&a_path));
        let b = arena.insert(read(&b_path));

        let token = CancellationToken::new();
        let groups = MatchSetBuilder::new(OrderBy::Discovery, false);
        // -H: hard links should count as duplicates, so is_same_file (not
        // is_hardlink) gates suppression, and this pair isn't "the same
        // file reached twice" (distinct basenames), so it's free to match.
        let mut engine = GroupingEngine::new(false, true, false);

        assert_eq!(
            engine.insert(a, &mut arena, &groups, None, &token),
            InsertOutcome::Inserted
        );
        assert_eq!(
            engine.insert(b, &mut arena, &groups, None, &token),
            InsertOutcome::Match(a)
        );
    }

    #[test]
    fn test_cache_populated_digest_is_reused() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("cache.db");
        let cache = SignatureCache::open(&db_path, false).unwrap();

        let mut arena = FileArena::new();
        let a = arena.insert(write(dir.path(), "a.txt", b"HELLO"));
        let b = arena.insert(write(dir.path(), "b.txt", b"HELLO"));

        let token = CancellationToken::new();
        let groups = MatchSetBuilder::new(OrderBy::Discovery, false);
        let mut engine = GroupingEngine::new(false, false, false);

        engine.insert(a, &mut arena, &groups, Some(&cache), &token);
        assert!(arena.get(a).partial_digest.is_some());
        assert!(arena.get(a).full_digest.is_some());

        let outcome = engine.insert(b, &mut arena, &groups, Some(&cache), &token);
        assert_eq!(outcome, InsertOutcome::Match(a));
    }
}
