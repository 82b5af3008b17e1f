use thiserror::Error;

#[derive(Error, Debug)]
pub enum TxError {
    #[error("Release without matching retain for tag '{0}'")]
    ReleaseWithoutRetain(String),

    #[error("Checkpoint '{0}' not found")]
    CheckpointNotFound(String),

    #[error("No active transaction")]
    NoActiveTransaction,

    #[error("Transaction already active")]
    TransactionAlreadyActive,

    #[error("Handle is closed")]
    HandleClosed,

    #[error("Transaction failed and was rolled back")]
    TransactionFailed {
        #[source]
        source: Box<TxError>,
    },

    #[error("Transaction callback was never invoked")]
    CallbackNeverInvoked,

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, TxError>;

impl<T> From<std::sync::PoisonError<T>> for TxError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
