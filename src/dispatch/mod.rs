// ============================================================================
// Transactional Dispatch Table
// ============================================================================
//
// Maps each operation of the Transactional capability to a stateless handler
// function that performs it against the retention lease and the handle. The
// table is built once from an exhaustive match, so an operation without a
// handler cannot get past the compiler, and is shared process-wide.
//
// ============================================================================

use std::fmt;

use lazy_static::lazy_static;
use log::trace;

use crate::core::{Result, TxError};
use crate::handle::TxThunk;
use crate::lease::{HandleLease, TRANSACTION_TAG};

const OP_COUNT: usize = 7;

/// Identity of one operation in the Transactional capability set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxOp {
    Begin,
    Commit,
    Rollback,
    Checkpoint,
    ReleaseCheckpoint,
    RollbackCheckpoint,
    InTransaction,
}

impl TxOp {
    /// Every capability operation, in discriminant order.
    pub const ALL: [TxOp; OP_COUNT] = [
        TxOp::Begin,
        TxOp::Commit,
        TxOp::Rollback,
        TxOp::Checkpoint,
        TxOp::ReleaseCheckpoint,
        TxOp::RollbackCheckpoint,
        TxOp::InTransaction,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TxOp::Begin => "begin",
            TxOp::Commit => "commit",
            TxOp::Rollback => "rollback",
            TxOp::Checkpoint => "checkpoint",
            TxOp::ReleaseCheckpoint => "release_checkpoint",
            TxOp::RollbackCheckpoint => "rollback_checkpoint",
            TxOp::InTransaction => "in_transaction",
        }
    }
}

impl fmt::Display for TxOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Arguments of one dispatched operation.
///
/// The shape must match the operation; a mismatch is a dispatch defect and is
/// surfaced as an error rather than silently absorbed.
pub enum TxArgs<'a> {
    None,
    Checkpoint(&'a str),
    Callback(&'a mut TxThunk<'a>),
}

/// A stateless mapping from (lease, arguments) to a side effect on the lease
/// and handle. One handler per operation, constructed once and reused for
/// every invocation.
pub type Handler = fn(&HandleLease, TxArgs<'_>) -> Result<()>;

fn no_args(op: TxOp, args: TxArgs<'_>) -> Result<()> {
    match args {
        TxArgs::None => Ok(()),
        _ => Err(TxError::ExecutionError(format!(
            "{op} dispatched with unexpected arguments"
        ))),
    }
}

fn checkpoint_name<'a>(op: TxOp, args: TxArgs<'a>) -> Result<&'a str> {
    match args {
        TxArgs::Checkpoint(name) => Ok(name),
        _ => Err(TxError::ExecutionError(format!(
            "{op} dispatched without a checkpoint name"
        ))),
    }
}

fn callback_arg<'a>(op: TxOp, args: TxArgs<'a>) -> Result<&'a mut TxThunk<'a>> {
    match args {
        TxArgs::Callback(callback) => Ok(callback),
        _ => Err(TxError::ExecutionError(format!(
            "{op} dispatched without a callback"
        ))),
    }
}

fn begin_handler(lease: &HandleLease, args: TxArgs<'_>) -> Result<()> {
    no_args(TxOp::Begin, args)?;
    lease.retain(TRANSACTION_TAG)?;
    lease.handle().begin()
}

fn commit_handler(lease: &HandleLease, args: TxArgs<'_>) -> Result<()> {
    no_args(TxOp::Commit, args)?;
    lease.release(TRANSACTION_TAG)?;
    lease.handle().commit()
}

fn rollback_handler(lease: &HandleLease, args: TxArgs<'_>) -> Result<()> {
    no_args(TxOp::Rollback, args)?;
    lease.release(TRANSACTION_TAG)?;
    lease.handle().rollback()
}

fn checkpoint_handler(lease: &HandleLease, args: TxArgs<'_>) -> Result<()> {
    let name = checkpoint_name(TxOp::Checkpoint, args)?;
    lease.handle().checkpoint(name)
}

fn release_checkpoint_handler(lease: &HandleLease, args: TxArgs<'_>) -> Result<()> {
    let name = checkpoint_name(TxOp::ReleaseCheckpoint, args)?;
    lease.handle().release_checkpoint(name)
}

fn rollback_checkpoint_handler(lease: &HandleLease, args: TxArgs<'_>) -> Result<()> {
    let name = checkpoint_name(TxOp::RollbackCheckpoint, args)?;
    lease.handle().rollback_to_checkpoint(name)
}

fn in_transaction_handler(lease: &HandleLease, args: TxArgs<'_>) -> Result<()> {
    let callback = callback_arg(TxOp::InTransaction, args)?;
    // The guard releases on every exit path, success or failure.
    let _retained = lease.retain_scoped(TRANSACTION_TAG)?;
    lease.handle().run_in_transaction(callback)
}

/// The complete operation-to-handler mapping.
///
/// Lookup is exact and total: every [`TxOp`] has exactly one handler, checked
/// at construction before any handle interaction can occur.
pub struct DispatchTable {
    handlers: [Handler; OP_COUNT],
}

impl DispatchTable {
    pub fn new() -> Self {
        let table = Self {
            handlers: TxOp::ALL.map(Self::handler_for),
        };
        // Lookups index by discriminant; a mismatch with ALL's order is a
        // configuration defect and must fail here, not on first use.
        for (index, op) in TxOp::ALL.iter().enumerate() {
            assert_eq!(
                index, *op as usize,
                "dispatch table entry for '{op}' out of order"
            );
        }
        table
    }

    fn handler_for(op: TxOp) -> Handler {
        match op {
            TxOp::Begin => begin_handler,
            TxOp::Commit => commit_handler,
            TxOp::Rollback => rollback_handler,
            TxOp::Checkpoint => checkpoint_handler,
            TxOp::ReleaseCheckpoint => release_checkpoint_handler,
            TxOp::RollbackCheckpoint => rollback_checkpoint_handler,
            TxOp::InTransaction => in_transaction_handler,
        }
    }

    pub fn handler(&self, op: TxOp) -> Handler {
        self.handlers[op as usize]
    }

    /// Look up and invoke the handler for `op`.
    pub fn dispatch(&self, op: TxOp, lease: &HandleLease, args: TxArgs<'_>) -> Result<()> {
        trace!("dispatching {op}");
        (self.handler(op))(lease, args)
    }

    /// The process-wide shared table.
    pub fn global() -> &'static DispatchTable {
        &GLOBAL_TABLE
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static! {
    static ref GLOBAL_TABLE: DispatchTable = DispatchTable::new();
}
