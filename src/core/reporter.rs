/*!
 * Reporter: formats match sets for the report-only / normal-listing output
 * path (`-f`, `-1`, `-S`, `-t`, `-m`, `-M`).
 */

use std::io::{self, Write};

use crate::config::RunConfig;

use super::file_record::{FileArena, FileId};
use super::matchset::MatchSetBuilder;

/// Write every group to `out`, respecting the listing flags in `config`.
pub fn report(
    config: &RunConfig,
    groups: &MatchSetBuilder,
    arena: &FileArena,
    out: &mut impl Write,
) -> io::Result<()> {
    if config.quicksummary {
        return report_summary(groups, arena, out, true);
    }
    if config.summarize {
        return report_summary(groups, arena, out, false);
    }

    for (_, group) in groups.groups() {
        let members: &[FileId] = if config.omit_first && group.members.len() > 1 {
            &group.members[1..]
        } else {
            &group.members
        };
        if members.is_empty() {
            continue;
        }

        if config.one_line {
            let line: Vec<String> = members
                .iter()
                .map(|&id| format_entry(config, arena, id))
                .collect();
            writeln!(out, "{}", line.join(" "))?;
        } else {
            for &id in members {
                writeln!(out, "{}", format_entry(config, arena, id))?;
            }
            writeln!(out)?;
        }
    }

    Ok(())
}

fn format_entry(config: &RunConfig, arena: &FileArena, id: FileId) -> String {
    let record = arena.get(id);
    let mut entry = record.path.display().to_string();
    if config.show_size {
        entry = format!("{entry} {}", record.size);
    }
    if config.show_time {
        entry = format!("{entry} {}", record.mtime.secs);
    }
    entry
}

fn report_summary(
    groups: &MatchSetBuilder,
    arena: &FileArena,
    out: &mut impl Write,
    quick: bool,
) -> io::Result<()> {
    let mut set_count = 0usize;
    let mut redundant_bytes = 0u64;

    for (_, group) in groups.groups() {
        if group.members.len() < 2 {
            continue;
        }
        set_count += 1;
        let per_file_size = arena.get(group.members[0]).size;
        redundant_bytes += per_file_size * (group.members.len() as u64 - 1);
    }

    let qualifier = if quick { " (may be duplicates)" } else { "" };
    writeln!(
        out,
        "{set_count} duplicate files{qualifier} in {set_count} sets, {redundant_bytes} bytes redundant"
    )
}
