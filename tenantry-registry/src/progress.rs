//! Progress reporting for reindex and restore.

use std::sync::atomic::{AtomicU64, Ordering};

use tenantry_core::EntityRef;

/// Called once per entity written to a search index.
pub trait ProgressObserver {
    fn on_progress(&self, entity: &EntityRef);
}

impl<F> ProgressObserver for F
where
    F: Fn(&EntityRef),
{
    fn on_progress(&self, entity: &EntityRef) {
        self(entity)
    }
}

/// Ignores progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _entity: &EntityRef) {}
}

/// Counts progress calls.
#[derive(Debug, Default)]
pub struct ProgressCounter {
    count: AtomicU64,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}

impl ProgressObserver for ProgressCounter {
    fn on_progress(&self, _entity: &EntityRef) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use uuid::Uuid;

    #[test]
    fn test_closure_observer() {
        let seen = RefCell::new(Vec::new());
        let observer = |entity: &EntityRef| seen.borrow_mut().push(entity.clone());
        let entity = EntityRef::new("user", Uuid::now_v7());

        observer.on_progress(&entity);
        assert_eq!(seen.into_inner(), vec![entity]);
    }

    #[test]
    fn test_counter() {
        let counter = ProgressCounter::new();
        let entity = EntityRef::new("user", Uuid::now_v7());
        counter.on_progress(&entity);
        counter.on_progress(&entity);
        NoProgress.on_progress(&entity);
        assert_eq!(counter.count(), 2);
    }
}
