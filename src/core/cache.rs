/*!
 * Signature Cache: a persistent key/value store mapping
 * (directory-path, filename, stat-identity) -> (prefix-digest, full-digest),
 * backed by `rusqlite` (bundled SQLite) so the process never depends on a
 * system SQLite install.
 */

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{DedupError, Result};

use super::file_record::{Digest, FileRecord, Timestamp};

/// Default location: `${XDG_CACHE_HOME:-$HOME/.cache}/twinsweep/cache.db`.
pub fn default_cache_path() -> Result<PathBuf> {
    let base = dirs::cache_dir().ok_or_else(|| {
        DedupError::Cache("could not determine the platform cache directory".into())
    })?;
    Ok(base.join("twinsweep").join("cache.db"))
}

pub struct SignatureCache {
    conn: Connection,
    read_only: bool,
    in_transaction: bool,
}

impl SignatureCache {
    /// Open (creating if absent) the cache database at `path`. The parent
    /// directory is created at mode 0700 on Unix.
    pub fn open(path: &Path, read_only: bool) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DedupError::Cache(format!("creating cache directory: {e}")))?;
            set_private_permissions(parent);
        }

        let conn = Connection::open(path)
            .map_err(|e| DedupError::Cache(format!("opening cache database: {e}")))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS directories (
                id INTEGER PRIMARY KEY,
                parent_id INTEGER,
                path TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS hashes (
                directory_id INTEGER NOT NULL,
                filename TEXT NOT NULL,
                size INTEGER NOT NULL,
                inode INTEGER NOT NULL,
                mtime_secs INTEGER NOT NULL,
                mtime_nanos INTEGER NOT NULL,
                partial_digest BLOB,
                full_digest BLOB,
                PRIMARY KEY (directory_id, filename)
            );",
        )?;

        Ok(SignatureCache {
            conn,
            read_only,
            in_transaction: false,
        })
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn begin_transaction(&mut self) -> Result<()> {
        if self.in_transaction {
            return Ok(());
        }
        self.conn.execute_batch("BEGIN")?;
        self.in_transaction = true;
        Ok(())
    }

    pub fn commit_transaction(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Ok(());
        }
        self.conn.execute_batch("COMMIT")?;
        self.in_transaction = false;
        Ok(())
    }

    fn directory_id(&self, canonical_dir: &str) -> Result<Option<i64>> {
        self.conn
            .query_row(
                "SELECT id FROM directories WHERE path = ?1",
                params![canonical_dir],
                |row| row.get(0),
            )
            .optional()
            .map_err(DedupError::from)
    }

    fn ensure_directory_id(&self, canonical_dir: &str) -> Result<i64> {
        if let Some(id) = self.directory_id(canonical_dir)? {
            return Ok(id);
        }
        self.conn.execute(
            "INSERT OR IGNORE INTO directories (parent_id, path) VALUES (NULL, ?1)",
            params![canonical_dir],
        )?;
        self.directory_id(canonical_dir)?.ok_or_else(|| {
            DedupError::Cache(format!("failed to register directory '{canonical_dir}'"))
        })
    }

    /// Returns cached digests only if directory, filename, size, inode, and
    /// mtime (seconds + nanos) all match the record. Any mismatch is a
    /// cache miss, never a stale hit.
    pub fn load(&self, record: &FileRecord) -> Result<(Option<Digest>, Option<Digest>)> {
        let Some(dir) = record.parent() else {
            return Ok((None, None));
        };
        let canonical_dir = dir.to_string_lossy().into_owned();
        let Some(directory_id) = self.directory_id(&canonical_dir)? else {
            return Ok((None, None));
        };
        let filename = record.filename().to_string_lossy().into_owned();

        let row: Option<(i64, i64, i64, i64, Option<Vec<u8>>, Option<Vec<u8>>)> = self
            .conn
            .query_row(
                "SELECT size, inode, mtime_secs, mtime_nanos, partial_digest, full_digest
                 FROM hashes WHERE directory_id = ?1 AND filename = ?2",
                params![directory_id, filename],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((size, inode, mtime_secs, mtime_nanos, partial, full)) = row else {
            return Ok((None, None));
        };

        let matches = size as u64 == record.size
            && inode as u64 == record.inode
            && mtime_secs == record.mtime.secs
            && mtime_nanos as u32 == record.mtime.nanos;

        if !matches {
            return Ok((None, None));
        }

        Ok((to_digest(partial), to_digest(full)))
    }

    /// Upsert by (directory-id, filename). A no-op in read-only mode.
    pub fn save(
        &self,
        record: &FileRecord,
        partial: Option<Digest>,
        full: Option<Digest>,
    ) -> Result<()> {
        if self.read_only {
            return Ok(());
        }
        let Some(dir) = record.parent() else {
            return Ok(());
        };
        let canonical_dir = dir.to_string_lossy().into_owned();
        let directory_id = self.ensure_directory_id(&canonical_dir)?;
        let filename = record.filename().to_string_lossy().into_owned();

        self.conn.execute(
            "INSERT INTO hashes
                (directory_id, filename, size, inode, mtime_secs, mtime_nanos, partial_digest, full_digest)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(directory_id, filename) DO UPDATE SET
                size = excluded.size,
                inode = excluded.inode,
                mtime_secs = excluded.mtime_secs,
                mtime_nanos = excluded.mtime_nanos,
                partial_digest = COALESCE(excluded.partial_digest, hashes.partial_digest),
                full_digest = COALESCE(excluded.full_digest, hashes.full_digest)",
            params![
                directory_id,
                filename,
                record.size as i64,
                record.inode as i64,
                record.mtime.secs,
                record.mtime.nanos as i64,
                partial.map(|d| d.to_vec()),
                full.map(|d| d.to_vec()),
            ],
        )?;
        Ok(())
    }

    /// Remove the cache entry for `path` after it has been deleted.
    pub fn delete_for_path(&self, path: &Path) -> Result<()> {
        if self.read_only {
            return Ok(());
        }
        let Some(dir) = path.parent() else {
            return Ok(());
        };
        let canonical_dir = dir.to_string_lossy().into_owned();
        let Some(directory_id) = self.directory_id(&canonical_dir)? else {
            return Ok(());
        };
        let Some(filename) = path.file_name() else {
            return Ok(());
        };
        self.conn.execute(
            "DELETE FROM hashes WHERE directory_id = ?1 AND filename = ?2",
            params![directory_id, filename.to_string_lossy().into_owned()],
        )?;
        Ok(())
    }

    /// Resolve a cached directory id by canonical path, if present. Used by
    /// the Enumerator before descending, so orphan pruning can be scoped to
    /// directories it already knows about.
    pub fn lookup_directory(&self, canonical_dir: &Path) -> Result<Option<i64>> {
        self.directory_id(&canonical_dir.to_string_lossy())
    }

    /// Record `canonical_dir` in the directory table, linking it to
    /// `parent`'s row if the parent is already known. Called by the
    /// Enumerator as it descends so directory lineage is available for
    /// scoped orphan pruning.
    pub fn register_directory(&self, canonical_dir: &Path, parent: Option<&Path>) -> Result<i64> {
        let path_str = canonical_dir.to_string_lossy().into_owned();
        if let Some(id) = self.directory_id(&path_str)? {
            return Ok(id);
        }
        if self.read_only {
            return Err(DedupError::Config(
                "cache is read-only; cannot register a new directory".into(),
            ));
        }
        let parent_id = match parent {
            Some(p) => self.directory_id(&p.to_string_lossy())?,
            None => None,
        };
        self.conn.execute(
            "INSERT OR IGNORE INTO directories (parent_id, path) VALUES (?1, ?2)",
            params![parent_id, path_str],
        )?;
        self.directory_id(&path_str)?
            .ok_or_else(|| DedupError::Cache(format!("failed to register directory '{path_str}'")))
    }

    /// Orphan-prune a single directory the Enumerator is about to descend
    /// into: remove cached file entries whose file no longer exists, and
    /// child directory records whose filesystem directory is gone. Scoped
    /// (not a full-database scan) so it can run on every descent cheaply;
    /// contrast with the unscoped [`SignatureCache::prune`] used by the
    /// `-x prune` maintenance action.
    pub fn prune_directory(&self, canonical_dir: &Path) -> Result<()> {
        if self.read_only {
            return Ok(());
        }
        let path_str = canonical_dir.to_string_lossy().into_owned();
        let Some(id) = self.directory_id(&path_str)? else {
            return Ok(());
        };

        let mut stmt = self
            .conn
            .prepare("SELECT filename FROM hashes WHERE directory_id = ?1")?;
        let filenames: Vec<String> = stmt
            .query_map(params![id], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;
        drop(stmt);
        for filename in filenames {
            if !canonical_dir.join(&filename).exists() {
                self.conn.execute(
                    "DELETE FROM hashes WHERE directory_id = ?1 AND filename = ?2",
                    params![id, filename],
                )?;
            }
        }

        let mut child_stmt = self
            .conn
            .prepare("SELECT id, path FROM directories WHERE parent_id = ?1")?;
        let children: Vec<(i64, String)> = child_stmt
            .query_map(params![id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?;
        drop(child_stmt);
        for (child_id, child_path) in children {
            if !Path::new(&child_path).is_dir() {
                self.conn
                    .execute("DELETE FROM hashes WHERE directory_id = ?1", params![child_id])?;
                self.conn
                    .execute("DELETE FROM directories WHERE id = ?1", params![child_id])?;
            }
        }
        Ok(())
    }

    /// Delete directories whose canonical path no longer exists or is no
    /// longer a directory, and (within surviving directories) entries whose
    /// file no longer exists.
    pub fn prune(&mut self) -> Result<()> {
        if self.read_only {
            return Err(DedupError::Config(
                "cache is read-only; cannot prune".into(),
            ));
        }

        let mut stmt = self.conn.prepare("SELECT id, path FROM directories")?;
        let rows: Vec<(i64, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?;
        drop(stmt);

        for (id, path) in rows {
            let dir_path = Path::new(&path);
            if !dir_path.is_dir() {
                self.conn
                    .execute("DELETE FROM hashes WHERE directory_id = ?1", params![id])?;
                self.conn
                    .execute("DELETE FROM directories WHERE id = ?1", params![id])?;
                continue;
            }

            let mut entry_stmt = self
                .conn
                .prepare("SELECT filename FROM hashes WHERE directory_id = ?1")?;
            let filenames: Vec<String> = entry_stmt
                .query_map(params![id], |row| row.get(0))?
                .collect::<rusqlite::Result<_>>()?;
            drop(entry_stmt);

            for filename in filenames {
                if !dir_path.join(&filename).exists() {
                    self.conn.execute(
                        "DELETE FROM hashes WHERE directory_id = ?1 AND filename = ?2",
                        params![id, filename],
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Wipe both tables.
    pub fn clear(&mut self) -> Result<()> {
        if self.read_only {
            return Err(DedupError::Config("cache is read-only; cannot clear".into()));
        }
        self.conn.execute_batch("DELETE FROM hashes; DELETE FROM directories;")?;
        Ok(())
    }

    /// Reclaim unused storage.
    pub fn vacuum(&mut self) -> Result<()> {
        if self.read_only {
            return Err(DedupError::Config(
                "cache is read-only; cannot vacuum".into(),
            ));
        }
        self.conn.execute_batch("VACUUM")?;
        Ok(())
    }
}

impl Drop for SignatureCache {
    fn drop(&mut self) {
        if self.in_transaction {
            let _ = self.conn.execute_batch("COMMIT");
        }
    }
}

fn to_digest(bytes: Option<Vec<u8>>) -> Option<Digest> {
    let bytes = bytes?;
    let mut digest = [0u8; 16];
    if bytes.len() != 16 {
        return None;
    }
    digest.copy_from_slice(&bytes);
    Some(digest)
}

#[cfg(unix)]
fn set_private_permissions(dir: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(meta) = std::fs::metadata(dir) {
        let mut perms = meta.permissions();
        perms.set_mode(0o700);
        let _ = std::fs::set_permissions(dir, perms);
    }
}

#[cfg(not(unix))]
fn set_private_permissions(_dir: &Path) {}

fn sample_record(path: PathBuf, size: u64, inode: u64) -> FileRecord {
    FileRecord {
        path,
        size,
        device: 1,
        inode,
        mtime: Timestamp { secs: 1000, nanos: 0 },
        ctime: Timestamp { secs: 1000, nanos: 0 },
        mode: 0o644,
        uid: 0,
        gid: 0,
        partial_digest: None,
        full_digest: None,
        group: None,
    }
}
