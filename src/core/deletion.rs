/*!
 * Deletion Driver: for each group (or, in immediate mode, each confirmed
 * pair) decides which members to preserve and removes the rest safely.
 */

use std::cmp::Ordering;
use std::io::{self, BufRead, Write};

use crate::config::{ConfirmationPolicy, OrderBy};

use super::cache::SignatureCache;
use super::cancellation::CancellationToken;
use super::confirm;
use super::deletion_log::DeletionLog;
use super::file_record::{FileArena, FileId, FileRecord, Timestamp};
use super::matchset::compare_members;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOutcome {
    Applied,
    Quit,
}

enum Selection {
    All,
    Quit,
    Indices(Vec<usize>),
    Invalid,
}

pub struct DeletionDriver<'a> {
    confirmation: ConfirmationPolicy,
    token: &'a CancellationToken,
    cache: Option<&'a SignatureCache>,
}

impl<'a> DeletionDriver<'a> {
    pub fn new(
        confirmation: ConfirmationPolicy,
        token: &'a CancellationToken,
        cache: Option<&'a SignatureCache>,
    ) -> Self {
        Self {
            confirmation,
            token,
            cache,
        }
    }

    /// Interactive batch mode: print the group, read a selection of
    /// indices to preserve (or `all`/`quit`), re-prompting on an invalid or
    /// empty selection. EOF on the prompt is treated as an explicit quit —
    /// a clean exit rather than a tight re-prompt loop.
    pub fn run_batch_prompt(
        &self,
        members: &[FileId],
        arena: &FileArena,
        input: &mut impl BufRead,
        output: &mut impl Write,
        mut log: Option<&mut DeletionLog>,
    ) -> io::Result<PromptOutcome> {
        loop {
            if self.token.is_cancelled() {
                return Ok(PromptOutcome::Quit);
            }

            print_group(members, arena, output)?;
            write!(
                output,
                "Preserve which files (1-{}, 'all', or 'quit')? ",
                members.len()
            )?;
            output.flush()?;

            let mut line = String::new();
            let bytes_read = input.read_line(&mut line)?;
            if bytes_read == 0 {
                return Ok(PromptOutcome::Quit);
            }

            match parse_selection(&line, members.len()) {
                Selection::Quit => return Ok(PromptOutcome::Quit),
                Selection::All => {
                    let all: Vec<usize> = (0..members.len()).collect();
                    self.finalize(members, &all, arena, log)?;
                    return Ok(PromptOutcome::Applied);
                }
                Selection::Indices(indices) if !indices.is_empty() => {
                    self.finalize(members, &indices, arena, log)?;
                    return Ok(PromptOutcome::Applied);
                }
                _ => {
                    writeln!(output, "invalid selection; at least one file must be preserved")?;
                    continue;
                }
            }
        }
    }

    /// Non-interactive batch mode: preserve the first member, delete the
    /// rest.
    pub fn run_noprompt(
        &self,
        members: &[FileId],
        arena: &FileArena,
        log: Option<&mut DeletionLog>,
    ) -> io::Result<()> {
        self.finalize(members, &[0], arena, log)
    }

    /// Immediate mode: `a` and `b` matched during grouping. Confirms the
    /// match (unless confirmation is skipped entirely), picks the keeper
    /// via the configured comparator (the member that compares `>=` the
    /// other), deletes the loser, and returns the id that survives — the
    /// caller repoints the Grouping Engine's tree node at it when the
    /// surviving id is the newly-discovered file.
    pub fn resolve_immediate_pair(
        &self,
        a: FileId,
        b: FileId,
        arena: &FileArena,
        order_by: OrderBy,
        reverse: bool,
        mut log: Option<&mut DeletionLog>,
    ) -> io::Result<FileId> {
        if self.confirmation != ConfirmationPolicy::Skipped {
            let confirmed =
                confirm::confirm_equal(&arena.get(a).path, &arena.get(b).path, self.token);
            if !confirmed {
                // Digests matched but the bytes didn't (or the file moved
                // under us); leave both alone rather than risk the wrong
                // deletion.
                return Ok(a);
            }
        }

        let (keeper, loser) = if compare_members(order_by, reverse, arena.get(a), arena.get(b))
            != Ordering::Less
        {
            (a, b)
        } else {
            (b, a)
        };

        if let Some(l) = log.as_deref_mut() {
            l.begin_set()?;
            l.kept(&arena.get(keeper).path)?;
        }

        self.delete_one(loser, arena)?;

        if let Some(l) = log.as_deref_mut() {
            l.deleted(&arena.get(loser).path)?;
            l.end_set()?;
        }

        Ok(keeper)
    }

    fn finalize(
        &self,
        members: &[FileId],
        preserved_indices: &[usize],
        arena: &FileArena,
        mut log: Option<&mut DeletionLog>,
    ) -> io::Result<()> {
        if let Some(l) = log.as_deref_mut() {
            l.begin_set()?;
        }

        let first_preserved = preserved_indices.first().map(|&i| members[i]);

        for (i, &id) in members.iter().enumerate() {
            if self.token.is_cancelled() {
                break;
            }

            if preserved_indices.contains(&i) {
                if let Some(l) = log.as_deref_mut() {
                    l.kept(&arena.get(id).path)?;
                }
                continue;
            }

            if self.should_reconfirm() {
                if let Some(keeper) = first_preserved {
                    let confirmed = confirm::confirm_equal(
                        &arena.get(id).path,
                        &arena.get(keeper).path,
                        self.token,
                    );
                    if !confirmed {
                        continue;
                    }
                }
            }

            if self.delete_one(id, arena).is_ok() {
                if let Some(l) = log.as_deref_mut() {
                    l.deleted(&arena.get(id).path)?;
                }
            }
        }

        if let Some(l) = log.as_deref_mut() {
            l.end_set()?;
        }
        Ok(())
    }

    /// Only the default policy re-confirms at deletion time; deferring
    /// once or twice both skip it (the grouping stage never did its own
    /// byte-confirm to "defer" from, so the two policies converge here).
    fn should_reconfirm(&self) -> bool {
        matches!(self.confirmation, ConfirmationPolicy::Always)
    }

    fn delete_one(&self, id: FileId, arena: &FileArena) -> io::Result<()> {
        let record = arena.get(id);
        remove_if_not_changed(record)?;
        if let Some(cache) = self.cache {
            let _ = cache.delete_for_path(&record.path);
        }
        Ok(())
    }
}

/// Re-stat immediately before unlinking and refuse if size or mtime has
/// drifted from the snapshot taken at enumeration time. Closes the TOCTOU
/// window between digesting and deletion.
fn remove_if_not_changed(record: &FileRecord) -> io::Result<()> {
    let meta = std::fs::symlink_metadata(&record.path)?;
    if meta.len() != record.size {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("{} changed size before deletion", record.path.display()),
        ));
    }
    let mtime = Timestamp::from_system_time(meta.modified()?);
    if mtime != record.mtime {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("{} changed mtime before deletion", record.path.display()),
        ));
    }
    std::fs::remove_file(&record.path)
}

fn parse_selection(line: &str, count: usize) -> Selection {
    let trimmed = line.trim();
    if trimmed.eq_ignore_ascii_case("quit") {
        return Selection::Quit;
    }
    if trimmed.eq_ignore_ascii_case("all") {
        return Selection::All;
    }
    if trimmed.is_empty() {
        return Selection::Invalid;
    }

    let mut indices = Vec::new();
    for token in trimmed.split(|c: char| c == ',' || c.is_whitespace()) {
        if token.is_empty() {
            continue;
        }
        match token.parse::<usize>() {
            Ok(n) if n >= 1 && n <= count => indices.push(n - 1),
            _ => return Selection::Invalid,
        }
    }

    if indices.is_empty() {
        Selection::Invalid
    } else {
        Selection::Indices(indices)
    }
}

fn print_group(members: &[FileId], arena: &FileArena, output: &mut impl Write) -> io::Result<()> {
    for (i, &id) in members.iter().enumerate() {
        writeln!(output, "[{}] {}", i + 1, arena.get(id).path.display())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrderBy;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn record_for(path: std::path::PathBuf) -> FileRecord {
        let meta = std::fs::metadata(&path).unwrap();
        FileRecord {
            size: meta.len(),
            device: 0,
            inode: 0,
            mtime: Timestamp::from_system_time(meta.modified().unwrap()),
            ctime: Timestamp::default(),
            mode: 0o644,
            uid: 0,
            gid: 0,
            partial_digest: None,
            full_digest: None,
            group: None,
            path,
        }
    }

    #[test]
    fn test_noprompt_preserves_first_deletes_rest() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, b"dup").unwrap();
        std::fs::write(&b, b"dup").unwrap();

        let mut arena = FileArena::new();
        let ida = arena.insert(record_for(a.clone()));
        let idb = arena.insert(record_for(b.clone()));

        let token = CancellationToken::new();
        let driver = DeletionDriver::new(ConfirmationPolicy::Always, &token, None);
        driver
            .run_noprompt(&[ida, idb], &arena, None)
            .unwrap();

        assert!(a.exists());
        assert!(!b.exists());
    }

    #[test]
    fn test_batch_prompt_quit_on_eof_deletes_nothing() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, b"dup").unwrap();
        std::fs::write(&b, b"dup").unwrap();

        let mut arena = FileArena::new();
        let ida = arena.insert(record_for(a.clone()));
        let idb = arena.insert(record_for(b.clone()));

        let token = CancellationToken::new();
        let driver = DeletionDriver::new(ConfirmationPolicy::Always, &token, None);
        let mut input = Cursor::new(Vec::new());
        let mut output = Vec::new();
        let outcome = driver
            .run_batch_prompt(&[ida, idb], &arena, &mut input, &mut output, None)
            .unwrap();

        assert_eq!(outcome, PromptOutcome::Quit);
        assert!(a.exists());
        assert!(b.exists());
    }

    #[test]
    fn test_batch_prompt_explicit_selection_preserves_chosen() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, b"dup").unwrap();
        std::fs::write(&b, b"dup").unwrap();

        let mut arena = FileArena::new();
        let ida = arena.insert(record_for(a.clone()));
        let idb = arena.insert(record_for(b.clone()));

        let token = CancellationToken::new();
        let driver = DeletionDriver::new(ConfirmationPolicy::Always, &token, None);
        let mut input = Cursor::new(b"2\n".to_vec());
        let mut output = Vec::new();
        let outcome = driver
            .run_batch_prompt(&[ida, idb], &arena, &mut input, &mut output, None)
            .unwrap();

        assert_eq!(outcome, PromptOutcome::Applied);
        assert!(!a.exists());
        assert!(b.exists());
    }

    #[test]
    fn test_immediate_mode_keeps_lexicographically_lesser_name() {
        let dir = tempdir().unwrap();
        let z = dir.path().join("z.txt");
        let a = dir.path().join("a.txt");
        std::fs::write(&z, b"X").unwrap();
        std::fs::write(&a, b"X").unwrap();

        let mut arena = FileArena::new();
        let idz = arena.insert(record_for(z.clone()));
        let ida = arena.insert(record_for(a.clone()));

        let token = CancellationToken::new();
        let driver = DeletionDriver::new(ConfirmationPolicy::Always, &token, None);
        let keeper = driver
            .resolve_immediate_pair(idz, ida, &arena, OrderBy::Name, false, None)
            .unwrap();

        assert_eq!(keeper, ida);
        assert!(a.exists());
        assert!(!z.exists());
    }

    #[test]
    fn test_changed_file_is_not_deleted() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, b"dup").unwrap();
        std::fs::write(&b, b"dup").unwrap();

        let mut arena = FileArena::new();
        let ida = arena.insert(record_for(a.clone()));
        let mut stale = record_for(b.clone());
        stale.size = 999; // pretend we snapshotted it before a later edit
        let idb = arena.insert(stale);

        let token = CancellationToken::new();
        let driver = DeletionDriver::new(ConfirmationPolicy::Always, &token, None);
        driver.run_noprompt(&[ida, idb], &arena, None).unwrap();

        assert!(a.exists());
        assert!(b.exists());
    }
}
