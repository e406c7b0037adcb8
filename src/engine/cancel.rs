use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Shared cooperative-cancel counter.
///
/// Each `cancel()` aborts exactly one render: the one in flight, or the next
/// one to start if none is running. Clones share the same counter.
#[derive(Debug, Clone, Default)]
pub struct CancelCounter(Arc<AtomicU32>);

impl CancelCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }

    pub fn pending(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }

    /// Take one pending cancel, if any.
    #[inline]
    pub fn consume(&self) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_cancel_is_consumed_once() {
        let c = CancelCounter::new();
        assert!(!c.consume());
        c.cancel();
        c.cancel();
        assert_eq!(c.pending(), 2);
        assert!(c.consume());
        assert!(c.consume());
        assert!(!c.consume());
    }

    #[test]
    fn clones_share_state() {
        let a = CancelCounter::new();
        let b = a.clone();
        a.cancel();
        assert!(b.consume());
        assert_eq!(a.pending(), 0);
    }
}
