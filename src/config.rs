/*!
 * CLI surface and the fully-resolved run configuration it compiles into.
 */

use std::path::PathBuf;

use clap::Parser;

use crate::error::{DedupError, Result};

/// One user-specified root directory, tagged with whether it should be
/// walked recursively. Mixed recursion (`-R`) tags only the directories
/// listed after the flag; `-r` tags all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRoot {
    pub path: PathBuf,
    pub recursive: bool,
}

/// Intra-group member ordering. `Time` (mtime) is the default, matching the
/// original's file-scope `ordertype_t ordertype = ORDER_MTIME;`. `Discovery`
/// keeps the order the Grouping Engine first saw the files in, but is never
/// the default — the original's arrival-order comparator is defined but
/// never wired into its dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    Discovery,
    Name,
    #[default]
    Time,
    Ctime,
}

/// How the Deletion Driver decides what to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletionMode {
    /// Only report groups; nothing is deleted.
    #[default]
    ReportOnly,
    /// Prompt interactively for each group.
    BatchPrompt,
    /// Preserve the first member of each group automatically.
    NoPromptBatch,
    /// Delete the loser of each pair as soon as a match is confirmed.
    Immediate,
}

/// How aggressively a non-preserved member is re-confirmed before deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfirmationPolicy {
    /// Byte-compare against the group's first preserved member before deleting.
    #[default]
    Always,
    /// Skip the byte-compare at deletion time (`-D` once).
    Deferred,
    /// Skip byte confirmation everywhere, including grouping (`-D -D`).
    Skipped,
}

/// `-x`/`--cacheaction` maintenance verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    ReadOnly,
    Prune,
    Clear,
    Vacuum,
}

impl CacheAction {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "readonly" => Ok(CacheAction::ReadOnly),
            "prune" => Ok(CacheAction::Prune),
            "clear" => Ok(CacheAction::Clear),
            "vacuum" => Ok(CacheAction::Vacuum),
            other => Err(DedupError::Config(format!(
                "unknown cache action '{other}' (expected readonly|prune|clear|vacuum)"
            ))),
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "twinsweep",
    version,
    about = "Find and optionally remove byte-identical duplicate files"
)]
pub struct Cli {
    /// Recurse into every listed directory.
    #[arg(short = 'r', long = "recurse")]
    pub recurse: bool,

    /// Recurse only into directories listed after this flag.
    #[arg(short = 'R', long = "recurse-list")]
    pub recurse_list: bool,

    /// Follow symbolic links.
    #[arg(short = 's', long = "symlinks")]
    pub symlinks: bool,

    /// Treat hard links as duplicates.
    #[arg(short = 'H', long = "hardlinks")]
    pub hardlinks: bool,

    /// Minimum file size in bytes.
    #[arg(short = 'G', long = "minsize", value_name = "N")]
    pub minsize: Option<u64>,

    /// Maximum file size in bytes.
    #[arg(short = 'L', long = "maxsize", value_name = "N")]
    pub maxsize: Option<u64>,

    /// Exclude zero-length files.
    #[arg(short = 'n', long = "noempty")]
    pub noempty: bool,

    /// Exclude hidden files and directories.
    #[arg(short = 'A', long = "nohidden")]
    pub nohidden: bool,

    /// Omit the first file of each set in normal output.
    #[arg(short = 'f', long = "omitfirst")]
    pub omitfirst: bool,

    /// List each set on a single line.
    #[arg(short = '1', long = "sameline")]
    pub sameline: bool,

    /// Show size of duplicates in output.
    #[arg(short = 'S', long = "size")]
    pub show_size: bool,

    /// Show modification time of duplicates in output.
    #[arg(short = 't', long = "time")]
    pub show_time: bool,

    /// Summarize duplicate information instead of listing every file.
    #[arg(short = 'm', long = "summarize")]
    pub summarize: bool,

    /// Like --summarize, but skips byte-for-byte confirmation.
    #[arg(short = 'M', long = "quicksummary")]
    pub quicksummary: bool,

    /// Hide progress indicators.
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Prompt for files to preserve, deleting the rest.
    #[arg(short = 'd', long = "delete")]
    pub delete: bool,

    /// Defer byte confirmation until deletion time; pass twice to skip it
    /// entirely.
    #[arg(short = 'D', long = "deferconfirmation", action = clap::ArgAction::Count)]
    pub defer_confirmation: u8,

    /// Use a sampled digest on files larger than 3 MiB.
    #[arg(short = 'e', long = "heuristic")]
    pub heuristic: bool,

    /// Used with -d: preserve the first file in each set, delete the rest,
    /// without prompting.
    #[arg(short = 'N', long = "noprompt")]
    pub noprompt: bool,

    /// Delete duplicates as they are identified rather than at the end of
    /// the run.
    #[arg(short = 'I', long = "immediate")]
    pub immediate: bool,

    /// Don't consider files with different permissions (mode/uid/gid) to
    /// be duplicates.
    #[arg(short = 'p', long = "permissions")]
    pub permissions: bool,

    /// Order files within a set: "name", "time", or "ctime".
    #[arg(short = 'o', long = "order", value_name = "name|time|ctime")]
    pub order: Option<String>,

    /// Reverse the order determined by -o.
    #[arg(short = 'i', long = "reverse")]
    pub reverse: bool,

    /// Write a deletion log to PATH.
    #[arg(short = 'l', long = "log", value_name = "PATH")]
    pub log: Option<PathBuf>,

    /// Enable the signature cache.
    #[arg(short = 'c', long = "cache")]
    pub cache: bool,

    /// Cache maintenance action: readonly, prune, clear, or vacuum.
    #[arg(short = 'x', long = "cacheaction", value_name = "ACTION")]
    pub cacheaction: Option<String>,

    /// One or more directories to scan.
    pub dirs: Vec<PathBuf>,
}

/// The fully-resolved, validated form of the CLI flags. This is what the
/// core actually consumes; `Cli` exists only to be parsed and translated.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub roots: Vec<ScanRoot>,
    pub follow_symlinks: bool,
    pub hardlinks_as_duplicates: bool,
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    pub exclude_empty: bool,
    pub exclude_hidden: bool,
    pub omit_first: bool,
    pub one_line: bool,
    pub show_size: bool,
    pub show_time: bool,
    pub summarize: bool,
    pub quicksummary: bool,
    pub quiet: bool,
    pub deletion_mode: DeletionMode,
    pub confirmation: ConfirmationPolicy,
    pub heuristic_digest: bool,
    pub permission_sensitive: bool,
    pub order_by: OrderBy,
    pub reverse_order: bool,
    pub log_path: Option<PathBuf>,
    pub cache_enabled: bool,
    pub cache_action: Option<CacheAction>,
}

impl RunConfig {
    /// Translate parsed CLI flags into a validated `RunConfig`, consuming
    /// the raw argv so `-R`'s "recurse only directories listed after this
    /// flag" contract can be resolved positionally, the way the original
    /// CLI's `nonoptafter` scan works.
    pub fn from_cli(cli: Cli, raw_args: &[String]) -> Result<Self> {
        if cli.recurse && cli.recurse_list {
            return Err(DedupError::Config(
                "options -r/--recurse and -R/--recurse-list are not compatible".into(),
            ));
        }

        let cache_action = cli
            .cacheaction
            .as_deref()
            .map(CacheAction::parse)
            .transpose()?;

        let maintenance_only = matches!(
            cache_action,
            Some(CacheAction::Clear) | Some(CacheAction::Vacuum)
        );

        if cli.dirs.is_empty() && !maintenance_only {
            return Err(DedupError::Config(
                "at least one directory is required".into(),
            ));
        }

        if let (Some(min), Some(max)) = (cli.minsize, cli.maxsize) {
            if max < min {
                return Err(DedupError::Config(format!(
                    "--maxsize ({max}) must not be less than --minsize ({min})"
                )));
            }
        }

        if cli.immediate && cli.delete {
            return Err(DedupError::Config(
                "-I/--immediate and -d/--delete are mutually exclusive deletion modes".into(),
            ));
        }

        if cli.noprompt && !cli.delete {
            return Err(DedupError::Config(
                "-N/--noprompt has no effect without -d/--delete".into(),
            ));
        }

        let roots = resolve_roots(&cli, raw_args);

        let deletion_mode = if cli.immediate {
            DeletionMode::Immediate
        } else if cli.delete && cli.noprompt {
            DeletionMode::NoPromptBatch
        } else if cli.delete {
            DeletionMode::BatchPrompt
        } else {
            DeletionMode::ReportOnly
        };

        let confirmation = match cli.defer_confirmation {
            0 => ConfirmationPolicy::Always,
            1 => ConfirmationPolicy::Deferred,
            _ => ConfirmationPolicy::Skipped,
        };

        let order_by = match cli.order.as_deref() {
            None => OrderBy::Time,
            Some("name") => OrderBy::Name,
            Some("time") => OrderBy::Time,
            Some("ctime") => OrderBy::Ctime,
            Some(other) => {
                return Err(DedupError::Config(format!(
                    "unknown order '{other}' (expected name|time|ctime)"
                )))
            }
        };

        Ok(RunConfig {
            roots,
            follow_symlinks: cli.symlinks,
            hardlinks_as_duplicates: cli.hardlinks,
            min_size: cli.minsize,
            max_size: cli.maxsize,
            exclude_empty: cli.noempty,
            exclude_hidden: cli.nohidden,
            omit_first: cli.omitfirst,
            one_line: cli.sameline,
            show_size: cli.show_size,
            show_time: cli.show_time,
            summarize: cli.summarize || cli.quicksummary,
            quicksummary: cli.quicksummary,
            quiet: cli.quiet,
            deletion_mode,
            confirmation,
            heuristic_digest: cli.heuristic,
            permission_sensitive: cli.permissions,
            order_by,
            reverse_order: cli.reverse,
            log_path: cli.log,
            cache_enabled: cli.cache || cache_action.is_some(),
            cache_action,
        })
    }
}

/// Resolve each positional directory's recursion flag. `-r` recurses all of
/// them; `-R` recurses only the ones that appear after its token in the
/// original argv, mirroring the C original's `nonoptafter("-R", ...)` scan
/// (the derive parser alone can't express "everything after this flag").
fn resolve_roots(cli: &Cli, raw_args: &[String]) -> Vec<ScanRoot> {
    if cli.recurse {
        return cli
            .dirs
            .iter()
            .map(|path| ScanRoot {
                path: path.clone(),
                recursive: true,
            })
            .collect();
    }

    if !cli.recurse_list {
        return cli
            .dirs
            .iter()
            .map(|path| ScanRoot {
                path: path.clone(),
                recursive: false,
            })
            .collect();
    }

    let flag_pos = raw_args
        .iter()
        .position(|a| a == "-R" || a == "--recurse-list");

    let Some(flag_pos) = flag_pos else {
        // -R was set (e.g. by a test constructing Cli directly) but not found
        // in raw_args: recurse everything, the conservative choice.
        return cli
            .dirs
            .iter()
            .map(|path| ScanRoot {
                path: path.clone(),
                recursive: true,
            })
            .collect();
    };

    cli.dirs
        .iter()
        .map(|path| {
            let dir_str = path.to_string_lossy();
            let dir_pos = raw_args.iter().position(|a| a == dir_str.as_ref());
            let recursive = dir_pos.map(|p| p > flag_pos).unwrap_or(true);
            ScanRoot {
                path: path.clone(),
                recursive,
            }
        })
        .collect()
}
