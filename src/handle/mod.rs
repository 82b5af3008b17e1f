// ============================================================================
// Handle Capability
// ============================================================================

pub mod memory;
pub mod status;

pub use memory::{HandleStats, MemoryHandle};
pub use status::TransactionStatus;

use crate::core::Result;

/// Erased transactional callback as a [`Handle`] implementation sees it.
///
/// The value the caller cares about travels out of band; at this level a
/// callback only succeeds or fails.
pub type TxThunk<'a> = dyn FnMut(&dyn Handle, &TransactionStatus) -> Result<()> + 'a;

/// A live database session/transaction context.
///
/// Handles are owned externally (typically by a pool); this crate never
/// constructs or destroys the pooled resource itself, it only retains and
/// releases logical interest in it through a [`HandleLease`].
///
/// Similar to `postgres::Client` or `rusqlite::Connection` in shape, reduced
/// to the transaction-control surface.
///
/// [`HandleLease`]: crate::lease::HandleLease
pub trait Handle: Send + Sync {
    /// Begin a transaction. Fails if one is already active.
    fn begin(&self) -> Result<()>;

    /// Commit the active transaction. Fails if none is active.
    fn commit(&self) -> Result<()>;

    /// Roll back the active transaction. Fails if none is active.
    fn rollback(&self) -> Result<()>;

    /// Create a named savepoint inside the active transaction.
    ///
    /// Duplicate names on the same handle are a caller error; implementations
    /// resolve later `release`/`rollback_to` calls against the most recently
    /// created match and make no other promise.
    fn checkpoint(&self, name: &str) -> Result<()>;

    /// Release a named savepoint. Fails if `name` does not reference an open
    /// checkpoint.
    fn release_checkpoint(&self, name: &str) -> Result<()>;

    /// Roll back to a named savepoint, keeping it open. Fails if `name` does
    /// not reference an open checkpoint.
    fn rollback_to_checkpoint(&self, name: &str) -> Result<()>;

    /// Begin a transaction, invoke `callback` exactly once with this handle
    /// and a [`TransactionStatus`], then commit on success or roll back on
    /// failure.
    ///
    /// A failing callback is surfaced as
    /// [`TxError::TransactionFailed`](crate::TxError::TransactionFailed) with
    /// the original failure as its source.
    fn run_in_transaction(&self, callback: &mut TxThunk<'_>) -> Result<()>;
}
