use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::domain::clock::clock::Clock;

/// Manually driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct MockClock {
    time: Arc<AtomicI64>,
}

impl MockClock {
    pub fn new(time_ms: i64) -> MockClock {
        MockClock { time: Arc::new(AtomicI64::new(time_ms)) }
    }

    pub fn set(&self, time_ms: i64) {
        self.time.store(time_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.time.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_millis(&self) -> i64 {
        self.time.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::clock::SharedClock;

    #[test]
    fn test_clones_share_time() {
        let clock = MockClock::new(1_000);
        let shared: SharedClock = Arc::new(clock.clone());
        clock.advance(250);
        assert_eq!(shared.now_millis(), 1_250);
        clock.set(10);
        assert_eq!(shared.now_millis(), 10);
    }
}
