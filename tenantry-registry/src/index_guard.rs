//! Run-once gate for creating the management tenant's search index.

use once_cell::sync::OnceCell;
use tenantry_core::TenantryResult;

/// Runs an initializer at most once successfully per guard.
///
/// Concurrent callers block until the running attempt finishes. The done
/// state is committed only when the initializer returns `Ok`; after a
/// failure the next caller runs it again.
#[derive(Debug, Default)]
pub struct IndexInitGuard {
    done: OnceCell<()>,
}

impl IndexInitGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure_initialized<F>(&self, init: F) -> TenantryResult<()>
    where
        F: FnOnce() -> TenantryResult<()>,
    {
        self.done.get_or_try_init(init).map(|_| ())
    }

    pub fn is_initialized(&self) -> bool {
        self.done.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tenantry_core::StorageError;

    #[test]
    fn test_runs_once() {
        let guard = IndexInitGuard::new();
        let calls = AtomicU32::new(0);
        for _ in 0..3 {
            guard
                .ensure_initialized(|| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(guard.is_initialized());
    }

    #[test]
    fn test_failure_is_retried() {
        let guard = IndexInitGuard::new();
        let err = guard.ensure_initialized(|| {
            Err(StorageError::IndexError {
                index_name: "management".to_string(),
                reason: "engine down".to_string(),
            }
            .into())
        });
        assert!(err.is_err());
        assert!(!guard.is_initialized());

        guard.ensure_initialized(|| Ok(())).unwrap();
        assert!(guard.is_initialized());
    }

    #[test]
    fn test_concurrent_callers_share_one_run() {
        let guard = Arc::new(IndexInitGuard::new());
        let calls = Arc::new(AtomicU32::new(0));
        let barrier = Arc::new(Barrier::new(6));

        let workers: Vec<_> = (0..6)
            .map(|_| {
                let guard = Arc::clone(&guard);
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    guard.ensure_initialized(|| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap().unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
