//! Stop signal for a boundary scan.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::ScanError;

/// Shared between a detector, its rayon workers and any caller that wants
/// to stop the scan. Clones share one flag.
///
/// A cancel applies to the scan in flight, or to the next one if none is
/// running. The detector clears it with [`settle`](Self::settle) when that
/// scan returns, so the token can drive later scans.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    requested: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.requested.load(Ordering::Relaxed)
    }

    /// Gate in front of one file. Files already past it finish normally.
    pub fn checkpoint(&self) -> Result<(), ScanError> {
        if self.is_cancelled() {
            Err(ScanError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Clear the flag at the end of a scan. Returns the error to report
    /// when the scan was cut short.
    pub(crate) fn settle(&self) -> Option<ScanError> {
        self.requested
            .swap(false, Ordering::SeqCst)
            .then_some(ScanError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_follows_shared_flag() {
        let token = CancellationToken::new();
        let worker = token.clone();
        assert!(worker.checkpoint().is_ok());

        token.cancel();
        assert!(matches!(worker.checkpoint(), Err(ScanError::Cancelled)));
        assert!(worker.is_cancelled());
    }

    #[test]
    fn test_settle_clears_once() {
        let token = CancellationToken::new();
        assert!(token.settle().is_none());

        token.clone().cancel();
        assert!(matches!(token.settle(), Some(ScanError::Cancelled)));
        assert!(token.settle().is_none());
        assert!(token.checkpoint().is_ok());
    }
}
