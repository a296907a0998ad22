//! Cooperative cancellation for long-running transcodes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::{Result, TranscodeError};

/// Shared flag checked by the pipeline between record groups and between merge steps.
///
/// Clones share the same flag, so a token handed to another thread (for example a
/// signal handler) can stop a transcode in progress.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns [`TranscodeError::Cancelled`] once cancellation has been requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() { Err(TranscodeError::Cancelled) } else { Ok(()) }
    }
}
