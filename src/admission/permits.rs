//! Counting permit pool with an adjustable capacity

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

struct PermitState {
    capacity: usize,
    /// Permits currently handed out
    in_use: usize,
}

/// A semaphore whose capacity moves between 1 and `limit`
///
/// ## Concurrency:
/// - `state`: Protected by Mutex; waiters park on `released`
/// - Shrinking never revokes a held permit, it only withholds a free one
pub struct Permits {
    name: &'static str,
    limit: usize,
    state: Mutex<PermitState>,
    released: Condvar,
}

/// A held permit, returned to the pool on drop
pub struct PermitGuard<'a> {
    permits: &'a Permits,
}

impl Permits {
    pub fn new(name: &'static str, limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            name,
            limit,
            state: Mutex::new(PermitState {
                capacity: limit,
                in_use: 0,
            }),
            released: Condvar::new(),
        }
    }

    /// Wait up to `timeout` for a permit
    pub fn acquire(&self, timeout: Duration) -> Option<PermitGuard<'_>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();

        while state.in_use >= state.capacity {
            if self.released.wait_until(&mut state, deadline).timed_out()
                && state.in_use >= state.capacity
            {
                tracing::debug!(pool = self.name, "Permit wait timed out");
                return None;
            }
        }

        state.in_use += 1;
        Some(PermitGuard { permits: self })
    }

    /// Withhold one free permit. Fails if none is free or capacity is 1.
    pub fn try_shrink(&self) -> bool {
        let mut state = self.state.lock();
        if state.capacity > 1 && state.in_use < state.capacity {
            state.capacity -= 1;
            true
        } else {
            false
        }
    }

    /// Return one withheld permit, up to the limit
    pub fn grow(&self) -> bool {
        let mut state = self.state.lock();
        if state.capacity < self.limit {
            state.capacity += 1;
            self.released.notify_one();
            true
        } else {
            false
        }
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    /// Permits that could be acquired right now
    pub fn available(&self) -> usize {
        let state = self.state.lock();
        state.capacity.saturating_sub(state.in_use)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.in_use -= 1;
        self.released.notify_one();
    }
}

impl Drop for PermitGuard<'_> {
    fn drop(&mut self) {
        self.permits.release();
    }
}
