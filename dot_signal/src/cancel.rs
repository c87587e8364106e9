//! Process-wide cancellation flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Shared shutdown signal.  Monotonic: once set it stays set.
///
/// Every pause in the program goes through [`CancelFlag::wait_timeout`], so a
/// loop observes cancellation within one poll interval at most.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    lock:      Mutex<()>,
    wake:      Condvar,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag and wake every waiter.
    ///
    /// Returns `true` only for the call that performed the transition, so
    /// repeated calls are harmless.
    pub fn cancel(&self) -> bool {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }
        // Waiters test the flag under the lock; taking it here means a waiter
        // is either before its check or parked on the condvar, never between.
        let _guard = self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.inner.wake.notify_all();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Block for up to `timeout`, returning early if the flag is set.
    ///
    /// Returns whether the flag is set on return.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            guard = self
                .inner
                .wake
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn starts_clear() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
    }

    #[test]
    fn second_cancel_is_a_no_op() {
        let flag = CancelFlag::new();
        assert!(flag.cancel());
        assert!(!flag.cancel());
        assert!(flag.is_cancelled());
    }

    #[test]
    fn clones_share_state() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        other.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn wait_times_out_when_clear() {
        let flag = CancelFlag::new();
        let start = Instant::now();
        assert!(!flag.wait_timeout(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn wait_returns_immediately_when_already_set() {
        let flag = CancelFlag::new();
        flag.cancel();
        let start = Instant::now();
        assert!(flag.wait_timeout(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn cancel_wakes_a_long_wait() {
        let flag = CancelFlag::new();
        let waiter = {
            let flag = flag.clone();
            thread::spawn(move || {
                let start = Instant::now();
                let set = flag.wait_timeout(Duration::from_secs(30));
                (set, start.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(20));
        flag.cancel();
        let (set, waited) = waiter.join().unwrap();
        assert!(set);
        assert!(waited < Duration::from_secs(5));
    }
}
