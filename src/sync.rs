//! Completion flag shared between a transfer-done interrupt and the
//! periodic refresh timer.
//!
//! The timer side never blocks: it consumes a completion with
//! [`Completion::try_wait`] and skips its work if the flag is not set. Only
//! teardown paths wait, and only for a bounded time.

use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::delay::DelayNs;

/// One-shot "transfer finished" flag.
#[derive(Debug, Default)]
pub struct Completion {
    done: AtomicBool,
}

impl Completion {
    /// A flag that is not yet complete.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            done: AtomicBool::new(false),
        }
    }

    /// Mark as complete. Called from the completion interrupt.
    #[inline]
    pub fn complete(&self) {
        self.done.store(true, Ordering::Release);
    }

    /// Consume a completion without blocking. Returns `false` if none is pending.
    #[inline]
    pub fn try_wait(&self) -> bool {
        self.done.swap(false, Ordering::Acquire)
    }

    /// Drop any pending completion.
    #[inline]
    pub fn reinit(&self) {
        self.done.store(false, Ordering::Relaxed);
    }

    /// `true` if a completion is pending. Does not consume it.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Wait up to `timeout_us` for a completion and consume it.
    pub fn wait_timeout<D: DelayNs>(&self, delay: &mut D, timeout_us: u32) -> bool {
        bounded_wait(delay, timeout_us, || self.try_wait())
    }
}

/// Poll interval of [`bounded_wait`].
pub const POLL_INTERVAL_US: u32 = 10;

/// Poll `ready` every [`POLL_INTERVAL_US`] until it returns `true` or
/// `timeout_us` has passed. Returns the last result of `ready`.
pub fn bounded_wait<D, F>(delay: &mut D, timeout_us: u32, mut ready: F) -> bool
where
    D: DelayNs,
    F: FnMut() -> bool,
{
    let mut waited = 0;
    loop {
        if ready() {
            return true;
        }
        if waited >= timeout_us {
            return false;
        }
        let step = POLL_INTERVAL_US.min(timeout_us - waited);
        delay.delay_us(step);
        waited += step;
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use core::cell::Cell;

    use super::*;

    #[derive(Default)]
    struct CountingDelay {
        us: u64,
    }

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.us += u64::from(ns) / 1000;
        }
    }

    #[test]
    fn test_try_wait_consumes() {
        let done = Completion::new();
        assert!(!done.try_wait());
        done.complete();
        assert!(done.is_complete());
        assert!(done.try_wait());
        assert!(!done.try_wait());
    }

    #[test]
    fn test_reinit() {
        let done = Completion::new();
        done.complete();
        done.reinit();
        assert!(!done.is_complete());
    }

    #[test]
    fn test_bounded_wait_times_out() {
        let mut delay = CountingDelay::default();
        assert!(!bounded_wait(&mut delay, 95, || false));
        assert_eq!(delay.us, 95);
    }

    #[test]
    fn test_bounded_wait_ready_later() {
        let mut delay = CountingDelay::default();
        let polls = Cell::new(0);
        let ready = bounded_wait(&mut delay, 1000, || {
            polls.set(polls.get() + 1);
            polls.get() == 3
        });
        assert!(ready);
        assert_eq!(delay.us, 20);
    }

    #[test]
    fn test_wait_timeout() {
        let mut delay = CountingDelay::default();
        let done = Completion::new();
        assert!(!done.wait_timeout(&mut delay, 30));
        done.complete();
        assert!(done.wait_timeout(&mut delay, 30));
        assert!(!done.is_complete());
    }
}
