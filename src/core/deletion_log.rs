/*!
 * Deletion Log: a plaintext, append-only record of what was kept and
 * deleted, one bracketed record per group.
 */

use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;

const MAGIC_HEADER: &str = "# twinsweep deletion log v1";

pub struct DeletionLog {
    writer: BufWriter<std::fs::File>,
}

impl DeletionLog {
    /// Open `path` for appending, writing the magic header only if the
    /// file didn't already exist (so repeated runs accumulate one
    /// continuous log rather than clobbering it).
    pub fn create(path: &Path) -> io::Result<Self> {
        let is_new = !path.exists();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);
        if is_new {
            writeln!(writer, "{MAGIC_HEADER}")?;
        }
        Ok(Self { writer })
    }

    pub fn begin_set(&mut self) -> io::Result<()> {
        writeln!(self.writer, "begin_set")
    }

    pub fn kept(&mut self, path: &Path) -> io::Result<()> {
        writeln!(self.writer, "kept {}", path.display())
    }

    pub fn deleted(&mut self, path: &Path) -> io::Result<()> {
        writeln!(self.writer, "deleted {}", path.display())
    }

    pub fn end_set(&mut self) -> io::Result<()> {
        writeln!(self.writer, "end_set")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
