// ============================================================================
// Handle Retention Tracking
// ============================================================================
//
// Reference-counts named reservations ("retains") against one shared handle.
// Nested call sites retain the same tag independently; the handle becomes
// eligible for return to its pool only when every tag's count is back to
// zero. The lease itself never returns or closes the handle, it only reports
// the transition to an external listener.
//
// ============================================================================

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, trace, warn};

use crate::core::{Result, TxError};
use crate::handle::Handle;

/// Retention tag used by the transaction handlers.
pub const TRANSACTION_TAG: &str = "transaction";

/// Pool-boundary hook, notified when the last retain on a lease is released.
///
/// The deciding collaborator (typically the pool that owns the handle) reacts
/// here; the lease makes no return/close decision of its own.
pub trait ReleaseListener: Send + Sync {
    fn handle_freed(&self, handle: &dyn Handle);
}

/// Reference-counted retention of one shared [`Handle`].
///
/// Retain/release pairs for different tags are independent. The same tag may
/// be retained multiple times by nested call sites; the handle is reported
/// free exactly once, after the last matching release.
pub struct HandleLease {
    handle: Arc<dyn Handle>,
    retained: Mutex<HashMap<String, usize>>,
    listener: Option<Arc<dyn ReleaseListener>>,
}

impl HandleLease {
    pub fn new(handle: Arc<dyn Handle>) -> Self {
        Self {
            handle,
            retained: Mutex::new(HashMap::new()),
            listener: None,
        }
    }

    /// Attach a listener to be notified when the handle becomes free.
    pub fn with_listener(mut self, listener: Arc<dyn ReleaseListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn handle(&self) -> &dyn Handle {
        self.handle.as_ref()
    }

    /// Increment the retain count for `tag`.
    ///
    /// Never fails due to the state of the handle; the lease only manages
    /// counts.
    pub fn retain(&self, tag: &str) -> Result<()> {
        let mut retained = self.retained.lock()?;
        let count = retained.entry(tag.to_string()).or_insert(0);
        *count += 1;
        trace!("retain '{tag}': count now {count}");
        Ok(())
    }

    /// Decrement the retain count for `tag`.
    ///
    /// Fails with [`TxError::ReleaseWithoutRetain`] if the tag has no
    /// outstanding retains; the count never goes below zero.
    pub fn release(&self, tag: &str) -> Result<()> {
        let freed = {
            let mut retained = self.retained.lock()?;
            let Some(count) = retained.get_mut(tag) else {
                return Err(TxError::ReleaseWithoutRetain(tag.to_string()));
            };
            *count -= 1;
            trace!("release '{tag}': count now {count}");
            if *count == 0 {
                retained.remove(tag);
            }
            retained.is_empty()
        };

        // The listener runs outside the count lock so it may inspect the
        // lease without deadlocking.
        if freed {
            debug!("handle free: no outstanding retains");
            if let Some(listener) = &self.listener {
                listener.handle_freed(self.handle.as_ref());
            }
        }
        Ok(())
    }

    /// Retain `tag` and return a guard whose drop releases it.
    ///
    /// The release runs on every exit path, normal return or unwind.
    pub fn retain_scoped(&self, tag: &str) -> Result<ReleaseGuard<'_>> {
        self.retain(tag)?;
        Ok(ReleaseGuard {
            lease: self,
            tag: tag.to_string(),
        })
    }

    /// Whether any tag currently holds a retain.
    pub fn is_retained(&self) -> bool {
        self.retained
            .lock()
            .map(|retained| !retained.is_empty())
            .unwrap_or(false)
    }

    /// Outstanding retain count for `tag`.
    pub fn retain_count(&self, tag: &str) -> usize {
        self.retained
            .lock()
            .map(|retained| retained.get(tag).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

/// RAII release of a retained tag.
///
/// Drop cannot propagate errors, so a failed release is logged instead
/// (matching the pool-return discipline of connection guards).
pub struct ReleaseGuard<'a> {
    lease: &'a HandleLease,
    tag: String,
}

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.lease.release(&self.tag) {
            warn!("scoped release of '{}' failed: {err}", self.tag);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::MemoryHandle;

    fn create_test_lease() -> HandleLease {
        HandleLease::new(Arc::new(MemoryHandle::new()))
    }

    #[test]
    fn test_retain_release_counting() {
        let lease = create_test_lease();

        lease.retain("t").unwrap();
        lease.retain("t").unwrap();
        assert_eq!(lease.retain_count("t"), 2);

        lease.release("t").unwrap();
        assert!(lease.is_retained());

        lease.release("t").unwrap();
        assert!(!lease.is_retained());
        assert_eq!(lease.retain_count("t"), 0);
    }

    #[test]
    fn test_release_without_retain_fails() {
        let lease = create_test_lease();

        match lease.release("t") {
            Err(TxError::ReleaseWithoutRetain(tag)) => assert_eq!(tag, "t"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(lease.retain_count("t"), 0);
    }

    #[test]
    fn test_tags_are_independent() {
        let lease = create_test_lease();

        lease.retain("transaction").unwrap();
        lease.retain("cursor").unwrap();

        lease.release("transaction").unwrap();
        assert!(lease.is_retained());
        assert_eq!(lease.retain_count("cursor"), 1);

        lease.release("cursor").unwrap();
        assert!(!lease.is_retained());
    }

    #[test]
    fn test_scoped_retain_releases_on_drop() {
        let lease = create_test_lease();

        {
            let _guard = lease.retain_scoped("t").unwrap();
            assert_eq!(lease.retain_count("t"), 1);
        }
        assert_eq!(lease.retain_count("t"), 0);
    }
}
