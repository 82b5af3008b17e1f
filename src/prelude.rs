//! Recommended API entrypoints.
//!
//! Intended usage in app code: embed a [`Transactor`] in the types that need
//! transaction control, implement [`Transactional::transactor`], and keep the
//! [`Handle`] implementation at the driver boundary.

pub use crate::{
    Handle, HandleLease, MemoryHandle, ReleaseListener, Result, TransactionCallback,
    TransactionStatus, Transactional, Transactor, TxError,
};
