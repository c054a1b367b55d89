//! Cancellation signal shared between the automation threads and the GUI.
//!
//! A boolean flag guarded by a mutex with a condition variable, so waiting
//! threads wake up as soon as the flag is set instead of sleeping out their
//! full delay.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Default)]
struct Inner {
    flag: Mutex<bool>,
    changed: Condvar,
}

/// Cloneable handle to a shared set/clear flag.
#[derive(Clone, Default)]
pub struct CancellationSignal {
    inner: Arc<Inner>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.inner.flag.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sets the flag and wakes all waiters. Idempotent.
    pub fn set(&self) {
        *self.lock() = true;
        self.inner.changed.notify_all();
    }

    /// Clears the flag. Idempotent.
    pub fn clear(&self) {
        *self.lock() = false;
    }

    pub fn is_set(&self) -> bool {
        *self.lock()
    }

    /// Blocks until the flag is set or `timeout` elapses.
    ///
    /// Returns `true` if the flag is set on return.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut set = self.lock();
        while !*set {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            set = match self.inner.changed.wait_timeout(set, deadline - now) {
                Ok((guard, _)) => guard,
                Err(e) => e.into_inner().0,
            };
        }
        true
    }
}

impl std::fmt::Debug for CancellationSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationSignal")
            .field("set", &self.is_set())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_set_and_clear_are_idempotent() {
        let signal = CancellationSignal::new();
        assert!(!signal.is_set());
        signal.set();
        signal.set();
        assert!(signal.is_set());
        signal.clear();
        signal.clear();
        assert!(!signal.is_set());
    }

    #[test]
    fn test_wait_times_out_when_clear() {
        let signal = CancellationSignal::new();
        let start = Instant::now();
        assert!(!signal.wait_timeout(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_wait_returns_immediately_when_set() {
        let signal = CancellationSignal::new();
        signal.set();
        let start = Instant::now();
        assert!(signal.wait_timeout(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_set_wakes_waiter() {
        let signal = CancellationSignal::new();
        let waiter = signal.clone();
        let handle = thread::spawn(move || {
            let start = Instant::now();
            let woke = waiter.wait_timeout(Duration::from_secs(10));
            (woke, start.elapsed())
        });

        thread::sleep(Duration::from_millis(50));
        signal.set();

        let (woke, elapsed) = handle.join().expect("waiter panicked");
        assert!(woke);
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn test_zero_timeout_polls() {
        let signal = CancellationSignal::new();
        assert!(!signal.wait_timeout(Duration::ZERO));
        signal.set();
        assert!(signal.wait_timeout(Duration::ZERO));
    }
}
