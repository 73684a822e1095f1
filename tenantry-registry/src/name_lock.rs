//! In-process mutual exclusion keyed by canonical tenant name.

use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;

/// One mutex per name currently in use.
///
/// Entries are created on demand and dropped once no caller holds or waits
/// on them, so the table only grows with concurrent distinct names.
#[derive(Debug, Default)]
pub struct NameLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl NameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `name`. Not reentrant.
    pub fn with_name_lock<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        let lock = Arc::clone(
            &self
                .locks
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        );

        let result = {
            let _held = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        drop(lock);
        self.locks.remove_if(name, |_, l| Arc::strong_count(l) == 1);
        result
    }

    /// Names with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_entry_dropped_after_use() {
        let locks = NameLocks::new();
        let value = locks.with_name_lock("org/app", || 7);
        assert_eq!(value, 7);
        assert!(locks.is_empty());
    }

    #[test]
    fn test_same_name_is_serialized() {
        let locks = Arc::new(NameLocks::new());
        let inside = Arc::new(AtomicU32::new(0));
        let overlap = Arc::new(AtomicU32::new(0));
        let barrier = Arc::new(Barrier::new(4));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let overlap = Arc::clone(&overlap);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    locks.with_name_lock("org/app", || {
                        if inside.fetch_add(1, Ordering::SeqCst) > 0 {
                            overlap.fetch_add(1, Ordering::SeqCst);
                        }
                        thread::sleep(Duration::from_millis(5));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    });
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(overlap.load(Ordering::SeqCst), 0);
        assert!(locks.is_empty());
    }

    #[test]
    fn test_distinct_names_do_not_block() {
        let locks = NameLocks::new();
        let nested = locks.with_name_lock("org/a", || locks.with_name_lock("org/b", || locks.len()));
        assert_eq!(nested, 2);
    }
}
