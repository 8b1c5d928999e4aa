//! Caller-side cancellation of orchestrated runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A handle for cancelling a backup or restore.
///
/// The orchestrator checks the token before every stage: cancelling
/// between stages stops cleanly, while a stage already in flight runs to
/// completion. Clones share the same flag.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Requests cancellation.
    #[inline]
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Checks if cancellation was requested.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
