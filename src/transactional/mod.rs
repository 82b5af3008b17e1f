// ============================================================================
// Transactional Capability
// ============================================================================
//
// Any object gains the full transaction-control surface by embedding a
// Transactor and implementing the one accessor; the seven operations are
// provided methods that each perform one dispatch-table lookup plus one
// handler invocation. No per-type transaction logic, no implementation
// inheritance.
//
// ============================================================================

use std::sync::Arc;

use log::debug;

use crate::core::{Result, TxError};
use crate::dispatch::{DispatchTable, TxArgs, TxOp};
use crate::handle::{Handle, TransactionStatus};
use crate::lease::{HandleLease, ReleaseListener};

/// A unit of work executed inside a transaction.
///
/// Invoked exactly once with the target object the capability call was made
/// on and a status for the enclosing transaction. A failure aborts the
/// transaction. Blanket-implemented for closures.
pub trait TransactionCallback<T: ?Sized, R> {
    fn in_transaction(&mut self, target: &T, status: &TransactionStatus) -> Result<R>;
}

impl<T, R, F> TransactionCallback<T, R> for F
where
    T: ?Sized,
    F: FnMut(&T, &TransactionStatus) -> Result<R>,
{
    fn in_transaction(&mut self, target: &T, status: &TransactionStatus) -> Result<R> {
        self(target, status)
    }
}

/// Adapter tying a [`HandleLease`] to the shared [`DispatchTable`].
///
/// Concrete types acquire transactional behavior by embedding one of these
/// and implementing [`Transactional::transactor`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use txlease::{MemoryHandle, TransactionStatus, Transactional, Transactor};
///
/// # fn main() -> txlease::Result<()> {
/// let transactor = Transactor::new(Arc::new(MemoryHandle::new()));
///
/// let moved = transactor.in_transaction(|tx: &Transactor, _status: &TransactionStatus| {
///     tx.checkpoint("stage")?;
///     tx.release("stage")?;
///     Ok(2)
/// })?;
///
/// assert_eq!(moved, 2);
/// # Ok(())
/// # }
/// ```
pub struct Transactor {
    lease: HandleLease,
    table: &'static DispatchTable,
}

impl Transactor {
    pub fn new(handle: Arc<dyn Handle>) -> Self {
        Self::with_lease(HandleLease::new(handle))
    }

    pub fn with_lease(lease: HandleLease) -> Self {
        Self {
            lease,
            table: DispatchTable::global(),
        }
    }

    /// Construct with a pool-boundary listener on the lease.
    pub fn with_listener(handle: Arc<dyn Handle>, listener: Arc<dyn ReleaseListener>) -> Self {
        Self::with_lease(HandleLease::new(handle).with_listener(listener))
    }

    /// Swap in a non-global dispatch table.
    pub fn with_table(mut self, table: &'static DispatchTable) -> Self {
        self.table = table;
        self
    }

    pub fn lease(&self) -> &HandleLease {
        &self.lease
    }

    pub fn handle(&self) -> &dyn Handle {
        self.lease.handle()
    }

    pub(crate) fn dispatch(&self, op: TxOp, args: TxArgs<'_>) -> Result<()> {
        self.table.dispatch(op, &self.lease, args)
    }

    /// Run `callback` in a transaction, bound to `target`.
    ///
    /// The callback's value is propagated unchanged on success. On failure
    /// the retention release still runs, then the original failure propagates
    /// inside [`TxError::TransactionFailed`].
    pub fn run_in_transaction<T, R, C>(&self, target: &T, mut callback: C) -> Result<R>
    where
        T: ?Sized,
        C: TransactionCallback<T, R>,
    {
        let mut result = None;
        {
            let mut wrapper = |_handle: &dyn Handle, status: &TransactionStatus| -> Result<()> {
                result = Some(callback.in_transaction(target, status)?);
                Ok(())
            };
            if let Err(err) = self.dispatch(TxOp::InTransaction, TxArgs::Callback(&mut wrapper)) {
                debug!("in_transaction aborted: {err}");
                return Err(err);
            }
        }
        result.ok_or(TxError::CallbackNeverInvoked)
    }
}

/// The transaction-control capability.
///
/// Implementors provide [`transactor`](Transactional::transactor); every
/// operation below is dispatched mechanically through the shared handler
/// table. Nested `in_transaction` calls on the same handle raise the
/// transaction retain count without re-entering the idle state; this layer
/// does not prevent double-commit (that validation belongs to the
/// [`Handle`](crate::handle::Handle) collaborator).
pub trait Transactional {
    /// Access the embedded transaction adapter.
    fn transactor(&self) -> &Transactor;

    /// Begin a transaction on the underlying handle, retaining it.
    fn begin(&self) -> Result<()> {
        self.transactor().dispatch(TxOp::Begin, TxArgs::None)
    }

    /// Commit the active transaction, releasing the retention.
    fn commit(&self) -> Result<()> {
        self.transactor().dispatch(TxOp::Commit, TxArgs::None)
    }

    /// Roll back the active transaction, releasing the retention.
    fn rollback(&self) -> Result<()> {
        self.transactor().dispatch(TxOp::Rollback, TxArgs::None)
    }

    /// Create a named savepoint. No effect on handle retention.
    fn checkpoint(&self, name: &str) -> Result<()> {
        self.transactor()
            .dispatch(TxOp::Checkpoint, TxArgs::Checkpoint(name))
    }

    /// Release a named savepoint. No effect on handle retention.
    fn release(&self, name: &str) -> Result<()> {
        self.transactor()
            .dispatch(TxOp::ReleaseCheckpoint, TxArgs::Checkpoint(name))
    }

    /// Roll back to a named savepoint. No effect on handle retention.
    fn rollback_to(&self, name: &str) -> Result<()> {
        self.transactor()
            .dispatch(TxOp::RollbackCheckpoint, TxArgs::Checkpoint(name))
    }

    /// Run `callback` inside a transaction, bound to this object.
    fn in_transaction<R, C>(&self, callback: C) -> Result<R>
    where
        Self: Sized,
        C: TransactionCallback<Self, R>,
    {
        self.transactor().run_in_transaction(self, callback)
    }
}

impl Transactional for Transactor {
    fn transactor(&self) -> &Transactor {
        self
    }
}
