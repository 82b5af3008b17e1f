// ============================================================================
// txlease Library
// ============================================================================
//
// Transaction-lifecycle coordination above a pooled, externally-owned
// database handle: reference-counted retention of the shared handle, named
// savepoints layered on flat begin/commit/rollback, and a Transactional
// capability any object acquires by composition instead of hand-written
// per-type boilerplate.
//
// ============================================================================

pub mod core;
pub mod dispatch;
pub mod handle;
pub mod lease;
pub mod prelude;
pub mod transactional;

// Re-export main types for convenience
pub use crate::core::{Result, TxError};
pub use dispatch::{DispatchTable, Handler, TxArgs, TxOp};
pub use handle::{Handle, HandleStats, MemoryHandle, TransactionStatus, TxThunk};
pub use lease::{HandleLease, ReleaseGuard, ReleaseListener, TRANSACTION_TAG};
pub use transactional::{TransactionCallback, Transactional, Transactor};
