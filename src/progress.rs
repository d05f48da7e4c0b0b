//! In-progress flags for saves and refreshes that a view can poll.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable "in progress" flag. Every clone observes the same state.
#[derive(Debug, Clone, Default)]
pub struct ProgressFlag(Arc<AtomicBool>);

impl ProgressFlag {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Raises the flag until the returned guard is dropped. Returns `None` when
    /// it is already raised.
    pub fn begin(&self) -> Option<ProgressGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(ProgressGuard(Arc::clone(&self.0)))
    }
}

/// Lowers its flag on drop, including when the future holding it is cancelled.
#[derive(Debug)]
pub struct ProgressGuard(Arc<AtomicBool>);

impl Drop for ProgressGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_holds_the_flag_until_dropped() {
        let flag = ProgressFlag::default();
        let observer = flag.clone();
        assert!(!observer.is_set());

        let guard = flag.begin().unwrap();
        assert!(observer.is_set());
        assert!(observer.begin().is_none());

        drop(guard);
        assert!(!observer.is_set());
        assert!(flag.begin().is_some());
    }
}
