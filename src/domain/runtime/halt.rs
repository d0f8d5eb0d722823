use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct HaltState {
    requested: bool,
    parked: bool,
}

/// Park/unpark point of a task thread.
///
/// A control thread requests the halt, the task thread parks itself the next time it
/// calls [`TaskThreadHalt::park_if_halted`], and stays parked until [`TaskThreadHalt::wake`].
/// Waking a task that is not halted does nothing.
#[derive(Debug, Default)]
pub struct TaskThreadHalt {
    state: Mutex<HaltState>,
    condvar: Condvar,
}

impl TaskThreadHalt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if a halt was already requested.
    pub fn halt(&self) -> bool {
        let mut state = self.state.lock();
        let newly_halted = !state.requested;
        state.requested = true;
        newly_halted
    }

    /// Returns true if the task was halted.
    pub fn wake(&self) -> bool {
        let mut state = self.state.lock();
        if !state.requested {
            return false;
        }
        state.requested = false;
        self.condvar.notify_all();
        true
    }

    pub fn is_halted(&self) -> bool {
        self.state.lock().requested
    }

    pub fn is_parked(&self) -> bool {
        self.state.lock().parked
    }

    /// Called by the task thread. Blocks while a halt is requested.
    pub fn park_if_halted(&self) {
        let mut state = self.state.lock();
        if !state.requested {
            return;
        }
        state.parked = true;
        self.condvar.notify_all();
        while state.requested {
            self.condvar.wait(&mut state);
        }
        state.parked = false;
    }

    /// Waits until the task thread has parked. Returns false on timeout or if the halt was
    /// withdrawn in the meantime.
    pub fn wait_until_parked(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.requested && !state.parked {
            if self.condvar.wait_until(&mut state, deadline).timed_out() {
                return state.parked;
            }
        }
        state.parked
    }

    /// Like [`TaskThreadHalt::wait_until_parked`], but a task that did not park is an error.
    /// The halt stays requested; the caller decides whether to wake.
    pub fn await_parked(&self, timeout: Duration) -> Result<()> {
        if self.wait_until_parked(timeout) {
            return Ok(());
        }
        Err(Error::GateError(format!("task thread did not park within {:?}", timeout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_wake_without_halt_is_noop() {
        let halt = TaskThreadHalt::new();
        assert!(!halt.wake());
        halt.park_if_halted();
    }

    #[test]
    fn test_parked_thread_resumes_after_wake() {
        let halt = Arc::new(TaskThreadHalt::new());
        assert!(halt.halt());
        assert!(!halt.halt());

        let task_halt = Arc::clone(&halt);
        let task = thread::spawn(move || task_halt.park_if_halted());

        assert!(halt.wait_until_parked(Duration::from_secs(5)));
        assert!(halt.wake());
        task.join().unwrap();
        assert!(!halt.is_parked());
        assert!(!halt.wake());
    }

    #[test]
    fn test_await_parked_fails_without_task_thread() {
        let halt = TaskThreadHalt::new();
        halt.halt();
        assert!(matches!(halt.await_parked(Duration::from_millis(20)), Err(Error::GateError(_))));
        assert!(halt.is_halted());
        assert!(halt.wake());
    }
}
