use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use shared::error::SharedError;

/// Shared flag raised by the signal handler and polled before every exchange.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag and reports whether it was already raised.
    pub fn cancel(&self) -> bool {
        self.cancelled.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), SharedError> {
        if self.is_cancelled() {
            Err(SharedError::Cancelled)
        } else {
            Ok(())
        }
    }
}
