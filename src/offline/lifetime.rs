use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Counts units of agent work in flight. The runtime may only tear the agent
/// down while the count is zero.
#[derive(Debug, Clone, Default)]
pub struct KeepAlive {
    inner: Arc<(Mutex<usize>, Condvar)>,
}

/// Held for the duration of one lifecycle phase or one intercepted fetch.
#[derive(Debug)]
#[must_use = "work is only tracked while the token is held"]
pub struct WorkToken {
    inner: Arc<(Mutex<usize>, Condvar)>,
}

impl KeepAlive {
    pub fn token(&self) -> WorkToken {
        let (count, _) = &*self.inner;
        *count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        WorkToken {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn in_flight(&self) -> usize {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until no work is in flight, or the timeout passes. Returns
    /// whether the agent is idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let (count, idle) = &*self.inner;
        let guard = count.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = idle
            .wait_timeout_while(guard, timeout, |n| *n > 0)
            .unwrap_or_else(PoisonError::into_inner);
        *guard == 0
    }
}

impl Drop for WorkToken {
    fn drop(&mut self) {
        let (count, idle) = &*self.inner;
        let mut n = count.lock().unwrap_or_else(PoisonError::into_inner);
        *n = n.saturating_sub(1);
        if *n == 0 {
            idle.notify_all();
        }
    }
}
