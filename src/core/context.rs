/*!
 * Context: bundles the per-run configuration, cancellation token, optional
 * signature cache, and optional deletion log that would otherwise be
 * process-wide singletons. A single owner threaded through the
 * orchestration in `core::run`, not a collection of globals.
 */

use std::path::Path;

use crate::config::RunConfig;
use crate::error::Result;

use super::cache::{self, SignatureCache};
use super::cancellation::CancellationToken;
use super::deletion_log::DeletionLog;

pub struct Context {
    pub config: RunConfig,
    pub token: CancellationToken,
    pub cache: Option<SignatureCache>,
    pub log: Option<DeletionLog>,
}

impl Context {
    /// Build a run's context: installs the SIGINT handler, opens the
    /// signature cache at its default platform location if requested, and
    /// opens the deletion log if a path was configured.
    pub fn new(config: RunConfig) -> Result<Self> {
        let default_path = cache::default_cache_path()?;
        Self::build(config, &default_path)
    }

    /// Same as [`Context::new`] but opens the cache at `cache_path`
    /// instead of the platform default, so tests never touch the real
    /// user cache directory.
    #[cfg(test)]
    pub fn new_with_cache_path(config: RunConfig, cache_path: &Path) -> Result<Self> {
        Self::build(config, cache_path)
    }

    fn build(config: RunConfig, cache_path: &Path) -> Result<Self> {
        let token = CancellationToken::new();
        token.install_signal_handler();

        let cache = if config.cache_enabled {
            let read_only = matches!(
                config.cache_action,
                Some(crate::config::CacheAction::ReadOnly)
            );
            Some(SignatureCache::open(cache_path, read_only)?)
        } else {
            None
        };

        let log = config
            .log_path
            .as_deref()
            .map(DeletionLog::create)
            .transpose()
            .map_err(|e| {
                crate::error::DedupError::io(config.log_path.clone().unwrap_or_default(), e)
            })?;

        Ok(Self {
            config,
            token,
            cache,
            log,
        })
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Flush the deletion log (if any); called on every exit path.
    pub fn finish(&mut self) -> Result<()> {
        if let Some(log) = self.log.as_mut() {
            log.flush()
                .map_err(|e| crate::error::DedupError::Fatal(format!("flushing log: {e}")))?;
        }
        Ok(())
    }
}
