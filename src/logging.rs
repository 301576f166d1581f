/*!
 * Logging and tracing initialization
 */

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::RunConfig;

/// Initialize structured logging for a run. `-q`/`--quiet` lowers the
/// default level from `info` to `warn`; `RUST_LOG` or `TWINSWEEP_LOG`
/// override either default via `EnvFilter`, matching the ambient stack's
/// `tracing_subscriber::registry().with(EnvFilter).with(fmt::layer()).init()`
/// idiom.
pub fn init_logging(config: &RunConfig) {
    let default_level = if config.quiet {
        Level::WARN
    } else {
        Level::INFO
    };

    let env_filter = EnvFilter::try_from_env("TWINSWEEP_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(format!("twinsweep={default_level}")));

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}

#[cfg(test)]
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("twinsweep=debug"));
        let fmt_layer = fmt::layer().with_test_writer().with_target(false).compact();
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init();
    });
}
