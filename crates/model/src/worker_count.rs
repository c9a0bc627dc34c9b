use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// The shared count of currently active Parse Workers (§4.3, §5). Guards
/// only the integer counter itself, held just for increment/decrement,
/// the same substitution as [`crate::ShutdownFlag`]'s `AtomicBool`: no
/// lock is ever held across anything but the single add/subtract.
#[derive(Debug, Clone, Default)]
pub struct WorkerCount(Arc<AtomicU32>);

impl WorkerCount {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU32::new(0)))
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }

    /// Decrements the count and returns the value *after* decrementing, so
    /// the caller can tell whether it was the last active worker.
    pub fn decrement(&self) -> u32 {
        self.0.fetch_sub(1, Ordering::AcqRel) - 1
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_and_decrement_are_visible_across_clones() {
        let count = WorkerCount::new();
        let clone = count.clone();
        count.increment();
        count.increment();
        assert_eq!(clone.get(), 2);
        assert_eq!(clone.decrement(), 1);
        assert_eq!(count.get(), 1);
    }
}
