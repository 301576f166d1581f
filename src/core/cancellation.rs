/*!
 * Cooperative cancellation token shared across the core
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide cancellation flag. Cloned cheaply and polled between
/// iterations of every potentially long loop (directory walk, digest chunk
/// loop, byte-confirm loop, cache iteration, prompt read).
#[derive(Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Install a SIGINT handler that raises this token. Best-effort: if a
    /// handler is already installed for the process, the second call is a
    /// no-op from the caller's perspective.
    pub fn install_signal_handler(&self) {
        let flag = self.flag.clone();
        let _ = ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
        });
    }
}
