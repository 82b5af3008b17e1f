use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-callback view of the current transaction's outcome.
///
/// A status is only valid for the duration of one
/// [`run_in_transaction`](super::Handle::run_in_transaction) invocation.
/// Clones share the underlying flag, so every participant in the same
/// transaction observes a single commit-vs-rollback decision.
#[derive(Debug, Clone)]
pub struct TransactionStatus {
    rollback_only: Arc<AtomicBool>,
}

impl TransactionStatus {
    pub fn new() -> Self {
        Self {
            rollback_only: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether the transaction has already been marked for rollback.
    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only.load(Ordering::SeqCst)
    }

    /// Mark the transaction for rollback. The handle rolls back instead of
    /// committing even if the callback returns successfully.
    pub fn set_rollback_only(&self) {
        self.rollback_only.store(true, Ordering::SeqCst);
    }
}

impl Default for TransactionStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_starts_clean() {
        let status = TransactionStatus::new();
        assert!(!status.is_rollback_only());
    }

    #[test]
    fn test_clones_share_the_flag() {
        let status = TransactionStatus::new();
        let view = status.clone();

        view.set_rollback_only();
        assert!(status.is_rollback_only());
    }
}
