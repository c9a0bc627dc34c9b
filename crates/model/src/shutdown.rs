use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The global shutdown flag shared by the Supervisor, Dispatcher, and every
/// worker. A plain atomic boolean is sufficient (§9 design note): no
/// additional memory ordering is required beyond release-on-set /
/// acquire-on-read, since the flag never gates a data transfer. It is only
/// ever polled between otherwise-independent steps.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unset_and_observes_a_set_from_a_clone() {
        let flag = ShutdownFlag::new();
        let clone = flag.clone();
        assert!(!flag.is_set());
        clone.set();
        assert!(flag.is_set());
    }
}
