// MemoryHandle semantics: the transaction state machine, the savepoint
// stack, the rollback-only gate, and reentrant run_in_transaction.

use std::sync::Arc;

use txlease::{Handle, MemoryHandle, Result, TransactionStatus, Transactional, Transactor, TxError};

#[test]
fn test_release_discards_later_savepoints() {
    let handle = MemoryHandle::new();
    handle.begin().unwrap();

    handle.checkpoint("a").unwrap();
    handle.checkpoint("b").unwrap();
    handle.checkpoint("c").unwrap();

    handle.release_checkpoint("b").unwrap();
    assert_eq!(handle.open_checkpoints(), vec!["a"]);

    handle.commit().unwrap();
}

#[test]
fn test_rollback_to_keeps_the_target_savepoint() {
    let handle = MemoryHandle::new();
    handle.begin().unwrap();

    handle.checkpoint("a").unwrap();
    handle.checkpoint("b").unwrap();
    handle.checkpoint("c").unwrap();

    handle.rollback_to_checkpoint("b").unwrap();
    assert_eq!(handle.open_checkpoints(), vec!["a", "b"]);

    handle.rollback().unwrap();
}

#[test]
fn test_duplicate_savepoint_names_resolve_to_most_recent() {
    let handle = MemoryHandle::new();
    handle.begin().unwrap();

    handle.checkpoint("a").unwrap();
    handle.checkpoint("b").unwrap();
    handle.checkpoint("a").unwrap();

    handle.release_checkpoint("a").unwrap();
    assert_eq!(handle.open_checkpoints(), vec!["a", "b"]);

    handle.commit().unwrap();
}

#[test]
fn test_commit_clears_outstanding_savepoints() {
    let handle = MemoryHandle::new();
    handle.begin().unwrap();
    handle.checkpoint("left-open").unwrap();

    handle.commit().unwrap();
    assert!(handle.open_checkpoints().is_empty());

    // The next transaction starts with a clean stack.
    handle.begin().unwrap();
    assert!(matches!(
        handle.release_checkpoint("left-open"),
        Err(TxError::CheckpointNotFound(_))
    ));
    handle.rollback().unwrap();
}

#[test]
fn test_run_in_transaction_commits_on_success() {
    let handle = MemoryHandle::new();

    handle
        .run_in_transaction(&mut |h: &dyn Handle, _status: &TransactionStatus| {
            h.checkpoint("inside")?;
            h.release_checkpoint("inside")
        })
        .unwrap();

    assert!(!handle.is_in_transaction());
    let stats = handle.stats();
    assert_eq!(stats.transactions_begun, 1);
    assert_eq!(stats.transactions_committed, 1);
    assert_eq!(stats.transactions_rolled_back, 0);
}

#[test]
fn test_run_in_transaction_rolls_back_on_failure() {
    let handle = MemoryHandle::new();

    let err = handle
        .run_in_transaction(&mut |_h: &dyn Handle, _status: &TransactionStatus| {
            Err(TxError::ExecutionError("no good".into()))
        })
        .unwrap_err();

    match err {
        TxError::TransactionFailed { source } => {
            assert!(matches!(*source, TxError::ExecutionError(_)));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(!handle.is_in_transaction());
    assert_eq!(handle.stats().transactions_rolled_back, 1);
}

#[test]
fn test_rollback_only_wins_over_a_successful_callback() {
    let handle = MemoryHandle::new();

    handle
        .run_in_transaction(&mut |_h: &dyn Handle, status: &TransactionStatus| {
            status.set_rollback_only();
            Ok(())
        })
        .unwrap();

    let stats = handle.stats();
    assert_eq!(stats.transactions_committed, 0);
    assert_eq!(stats.transactions_rolled_back, 1);
}

#[test]
fn test_nested_run_joins_the_enclosing_transaction() {
    let handle = MemoryHandle::new();

    handle
        .run_in_transaction(&mut |h: &dyn Handle, _status: &TransactionStatus| {
            h.run_in_transaction(&mut |inner: &dyn Handle, _s: &TransactionStatus| {
                inner.checkpoint("nested")
            })
        })
        .unwrap();

    // One begin, one commit: the nested call neither began nor committed.
    let stats = handle.stats();
    assert_eq!(stats.transactions_begun, 1);
    assert_eq!(stats.transactions_committed, 1);
}

#[test]
fn test_nested_rollback_only_decides_the_outer_outcome() {
    let handle = MemoryHandle::new();

    handle
        .run_in_transaction(&mut |h: &dyn Handle, _status: &TransactionStatus| {
            h.run_in_transaction(&mut |_inner: &dyn Handle, nested: &TransactionStatus| {
                nested.set_rollback_only();
                Ok(())
            })
        })
        .unwrap();

    let stats = handle.stats();
    assert_eq!(stats.transactions_committed, 0);
    assert_eq!(stats.transactions_rolled_back, 1);
}

#[test]
fn test_run_in_transaction_on_a_closed_handle() {
    let handle = MemoryHandle::new();
    handle.close().unwrap();

    let result = handle.run_in_transaction(&mut |_h: &dyn Handle,
                                                 _status: &TransactionStatus|
     -> Result<()> { Ok(()) });

    assert!(matches!(result, Err(TxError::HandleClosed)));
}

#[test]
fn test_handle_works_behind_the_transactional_surface() {
    let handle = Arc::new(MemoryHandle::new());
    let transactor = Transactor::new(handle.clone());

    transactor
        .in_transaction(|tx: &Transactor, _status: &TransactionStatus| {
            tx.checkpoint("step")?;
            tx.rollback_to("step")?;
            tx.release("step")
        })
        .unwrap();

    assert_eq!(handle.stats().transactions_committed, 1);
    assert!(handle.open_checkpoints().is_empty());
}
