use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use log::warn;

use super::{Handle, TransactionStatus, TxThunk};
use crate::core::{Result, TxError};

/// Global handle ID counter
static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Lifetime counters for one handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct HandleStats {
    pub transactions_begun: u64,
    pub transactions_committed: u64,
    pub transactions_rolled_back: u64,
}

impl fmt::Display for HandleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Handle Stats: {} begun, {} committed, {} rolled back",
            self.transactions_begun, self.transactions_committed, self.transactions_rolled_back
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandleState {
    Open,
    InTransaction,
    Closed,
}

struct HandleInner {
    state: HandleState,
    /// Named savepoints of the active transaction, innermost last.
    checkpoints: Vec<String>,
    /// Outcome flag of the active transaction, shared with every
    /// [`TransactionStatus`] handed to callbacks.
    status: TransactionStatus,
    stats: HandleStats,
}

/// In-process [`Handle`] implementation.
///
/// Tracks the transaction state machine (`Open -> InTransaction -> Open`,
/// plus `Closed`) and a stack of named savepoints with SQL semantics:
/// releasing a savepoint discards it and every savepoint created after it,
/// rolling back to one keeps it and discards everything above.
///
/// `run_in_transaction` is reentrant. A nested call joins the enclosing
/// transaction; only the outermost call begins, commits, or rolls back.
pub struct MemoryHandle {
    id: u64,
    inner: Mutex<HandleInner>,
}

impl MemoryHandle {
    pub fn new() -> Self {
        Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::SeqCst),
            inner: Mutex::new(HandleInner {
                state: HandleState::Open,
                checkpoints: Vec::new(),
                status: TransactionStatus::new(),
                stats: HandleStats::default(),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_in_transaction(&self) -> bool {
        self.inner
            .lock()
            .map(|inner| inner.state == HandleState::InTransaction)
            .unwrap_or(false)
    }

    pub fn is_closed(&self) -> bool {
        self.inner
            .lock()
            .map(|inner| inner.state == HandleState::Closed)
            .unwrap_or(false)
    }

    /// Lifetime transaction counters.
    pub fn stats(&self) -> HandleStats {
        self.inner
            .lock()
            .map(|inner| inner.stats)
            .unwrap_or_default()
    }

    /// Open savepoint names of the active transaction, innermost last.
    pub fn open_checkpoints(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|inner| inner.checkpoints.clone())
            .unwrap_or_default()
    }

    /// Close the handle, rolling back any active transaction first.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock()?;
        if inner.state == HandleState::InTransaction {
            inner.checkpoints.clear();
            inner.stats.transactions_rolled_back += 1;
        }
        inner.state = HandleState::Closed;
        Ok(())
    }
}

impl Default for MemoryHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Handle for MemoryHandle {
    fn begin(&self) -> Result<()> {
        let mut inner = self.inner.lock()?;
        match inner.state {
            HandleState::Closed => Err(TxError::HandleClosed),
            HandleState::InTransaction => Err(TxError::TransactionAlreadyActive),
            HandleState::Open => {
                inner.state = HandleState::InTransaction;
                inner.checkpoints.clear();
                inner.status = TransactionStatus::new();
                inner.stats.transactions_begun += 1;
                Ok(())
            }
        }
    }

    fn commit(&self) -> Result<()> {
        let mut inner = self.inner.lock()?;
        if inner.state != HandleState::InTransaction {
            return Err(TxError::NoActiveTransaction);
        }
        if !inner.checkpoints.is_empty() {
            warn!(
                "handle {}: committing with {} open checkpoint(s)",
                self.id,
                inner.checkpoints.len()
            );
        }
        inner.checkpoints.clear();
        inner.state = HandleState::Open;
        inner.stats.transactions_committed += 1;
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        let mut inner = self.inner.lock()?;
        if inner.state != HandleState::InTransaction {
            return Err(TxError::NoActiveTransaction);
        }
        inner.checkpoints.clear();
        inner.state = HandleState::Open;
        inner.stats.transactions_rolled_back += 1;
        Ok(())
    }

    fn checkpoint(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.lock()?;
        if inner.state != HandleState::InTransaction {
            return Err(TxError::NoActiveTransaction);
        }
        inner.checkpoints.push(name.to_string());
        Ok(())
    }

    fn release_checkpoint(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.lock()?;
        if inner.state != HandleState::InTransaction {
            return Err(TxError::NoActiveTransaction);
        }
        let index = inner
            .checkpoints
            .iter()
            .rposition(|checkpoint| checkpoint == name)
            .ok_or_else(|| TxError::CheckpointNotFound(name.to_string()))?;
        inner.checkpoints.truncate(index);
        Ok(())
    }

    fn rollback_to_checkpoint(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.lock()?;
        if inner.state != HandleState::InTransaction {
            return Err(TxError::NoActiveTransaction);
        }
        let index = inner
            .checkpoints
            .iter()
            .rposition(|checkpoint| checkpoint == name)
            .ok_or_else(|| TxError::CheckpointNotFound(name.to_string()))?;
        inner.checkpoints.truncate(index + 1);
        Ok(())
    }

    fn run_in_transaction(&self, callback: &mut TxThunk<'_>) -> Result<()> {
        let enclosing = {
            let inner = self.inner.lock()?;
            match inner.state {
                HandleState::Closed => return Err(TxError::HandleClosed),
                HandleState::InTransaction => Some(inner.status.clone()),
                HandleState::Open => None,
            }
        };

        // Nested call: join the enclosing transaction. The outermost
        // invocation owns the commit/rollback decision, so failures propagate
        // unwrapped from here.
        if let Some(status) = enclosing {
            return callback(self, &status);
        }

        self.begin()?;
        let status = {
            let inner = self.inner.lock()?;
            inner.status.clone()
        };

        match callback(self, &status) {
            Ok(()) => {
                if status.is_rollback_only() {
                    self.rollback()
                } else {
                    self.commit()
                }
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback() {
                    warn!(
                        "handle {}: rollback after failed transaction also failed: {rollback_err}",
                        self.id
                    );
                }
                Err(TxError::TransactionFailed {
                    source: Box::new(err),
                })
            }
        }
    }
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
