/*!
 * Core: the duplicate-detection pipeline. [`run`] wires the Enumerator,
 * Grouping Engine, Match Set Builder, and Deletion Driver together against
 * a validated [`crate::config::RunConfig`].
 */

pub mod cache;
pub mod cancellation;
pub mod confirm;
pub mod context;
pub mod deletion;
pub mod deletion_log;
pub mod digest;
pub mod enumerator;
pub mod file_record;
pub mod filter;
pub mod grouping;
pub mod identity;
pub mod matchset;
pub mod reporter;

use crate::config::{CacheAction, DeletionMode, RunConfig};
use crate::error::{DedupError, Result};

use context::Context;
use deletion::{DeletionDriver, PromptOutcome};
use enumerator::Enumerator;
use file_record::{FileArena, FileId};
use filter::FilterSet;
use grouping::{GroupingEngine, InsertOutcome};
use matchset::MatchSetBuilder;

/// Run the full pipeline against a validated configuration: a `-x
/// clear`/`-x vacuum` maintenance request short-circuits before any
/// directory is touched; everything else enumerates, groups, and then
/// reports or deletes according to the configured mode.
pub fn run(config: RunConfig) -> Result<()> {
    if let Some(action @ (CacheAction::Clear | CacheAction::Vacuum)) = config.cache_action {
        return run_cache_maintenance(action);
    }

    if config.roots.is_empty() {
        return Ok(());
    }

    let mut ctx = Context::new(config)?;
    let result = run_pipeline(&mut ctx);
    ctx.finish()?;
    result
}

fn run_cache_maintenance(action: CacheAction) -> Result<()> {
    let path = cache::default_cache_path()?;
    let mut store = cache::SignatureCache::open(&path, false)?;
    match action {
        CacheAction::Clear => store.clear(),
        CacheAction::Vacuum => store.vacuum(),
        CacheAction::ReadOnly | CacheAction::Prune => {
            unreachable!("run() only dispatches Clear/Vacuum to run_cache_maintenance")
        }
    }
}

fn run_pipeline(ctx: &mut Context) -> Result<()> {
    if ctx.config.cache_action == Some(CacheAction::Prune) {
        if let Some(store) = ctx.cache.as_mut() {
            store.prune()?;
        }
    }

    let filters = FilterSet {
        min_size: ctx.config.min_size,
        max_size: ctx.config.max_size,
        exclude_empty: ctx.config.exclude_empty,
        exclude_hidden: ctx.config.exclude_hidden,
        follow_symlinks: ctx.config.follow_symlinks,
    };

    let log_identity = ctx
        .config
        .log_path
        .as_deref()
        .and_then(enumerator::identity_of);

    let mut arena = FileArena::new();

    if let Some(store) = ctx.cache.as_mut() {
        store.begin_transaction()?;
    }

    {
        let enumerator = Enumerator::new(filters, ctx.cache.as_ref(), &ctx.token, log_identity);
        enumerator.enumerate(&ctx.config.roots, &mut arena);
    }

    let mut engine = GroupingEngine::new(
        ctx.config.permission_sensitive,
        ctx.config.hardlinks_as_duplicates,
        ctx.config.heuristic_digest,
    );
    let mut groups = MatchSetBuilder::new(ctx.config.order_by, ctx.config.reverse_order);

    let ids: Vec<FileId> = arena.iter().map(|(id, _)| id).collect();

    for id in ids {
        if ctx.token.is_cancelled() {
            break;
        }

        let outcome = engine.insert(id, &mut arena, &groups, ctx.cache.as_ref(), &ctx.token);

        match outcome {
            InsertOutcome::Match(peer) => {
                if ctx.config.deletion_mode == DeletionMode::Immediate {
                    let keeper = {
                        let driver =
                            DeletionDriver::new(ctx.config.confirmation, &ctx.token, ctx.cache.as_ref());
                        driver
                            .resolve_immediate_pair(
                                id,
                                peer,
                                &arena,
                                ctx.config.order_by,
                                ctx.config.reverse_order,
                                ctx.log.as_mut(),
                            )
                            .map_err(|e| DedupError::Fatal(format!("deleting duplicate: {e}")))?
                    };
                    if keeper == id {
                        engine.replace_file(peer, id);
                    }
                } else {
                    groups.attach(id, peer, &mut arena);
                }
            }
            InsertOutcome::Inserted | InsertOutcome::Suppressed | InsertOutcome::DigestUnavailable => {}
        }
    }

    if let Some(store) = ctx.cache.as_mut() {
        store.commit_transaction()?;
    }

    if ctx.token.is_cancelled() {
        return Ok(());
    }

    match ctx.config.deletion_mode {
        DeletionMode::ReportOnly => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            reporter::report(&ctx.config, &groups, &arena, &mut out)
                .map_err(|e| DedupError::Fatal(format!("writing report: {e}")))?;
        }
        DeletionMode::BatchPrompt => {
            let stdin = std::io::stdin();
            let mut input = stdin.lock();
            let stdout = std::io::stdout();
            let mut output = stdout.lock();

            for (_, group) in groups.groups() {
                if ctx.token.is_cancelled() {
                    break;
                }

                let outcome = {
                    let driver =
                        DeletionDriver::new(ctx.config.confirmation, &ctx.token, ctx.cache.as_ref());
                    driver
                        .run_batch_prompt(&group.members, &arena, &mut input, &mut output, ctx.log.as_mut())
                        .map_err(|e| DedupError::Fatal(format!("prompting for deletion: {e}")))?
                };

                if let Some(store) = ctx.cache.as_mut() {
                    store.commit_transaction()?;
                    store.begin_transaction()?;
                }

                if outcome == PromptOutcome::Quit {
                    break;
                }
            }
        }
        DeletionMode::NoPromptBatch => {
            for (_, group) in groups.groups() {
                if ctx.token.is_cancelled() {
                    break;
                }
                let driver = DeletionDriver::new(ctx.config.confirmation, &ctx.token, ctx.cache.as_ref());
                driver
                    .run_noprompt(&group.members, &arena, ctx.log.as_mut())
                    .map_err(|e| DedupError::Fatal(format!("deleting duplicate: {e}")))?;
            }
            if let Some(store) = ctx.cache.as_mut() {
                store.commit_transaction()?;
            }
        }
        DeletionMode::Immediate => {
            // Every match was already resolved inline, above.
        }
    }

    Ok(())
}
