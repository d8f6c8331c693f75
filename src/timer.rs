//! BCM timing: compare table and the blocking timer wait.
//!
//! A free-running hardware timer paces the scan-out loop. Its compare
//! registers hold one duration per bit plane, doubling with the plane index,
//! plus a short fixed "dim" interval used while the address lines settle.
//! The loop arms one compare at a time and then blocks in
//! [`ScanTimer::wait_for_timer_event`] until it fires; that wait is the only
//! suspension point of the real-time loop.

use alloc::vec::Vec;

use embedded_hal::delay::DelayNs;

use crate::MAX_PLANES;

/// Default timer clock (a 200 MHz co-processor cycle counter).
pub const DEFAULT_TIMER_HZ: u32 = 200_000_000;

/// Default duration of bit plane 0 in ticks.
pub const DEFAULT_PLANE0_TICKS: u32 = 100;

/// Default dim interval in ticks.
pub const DEFAULT_DIM_TICKS: u32 = 1500;

/// Convert nanoseconds to timer ticks, rounding down.
#[must_use]
pub const fn ns_to_ticks(ns: u64, clock_hz: u32) -> u32 {
    let ticks = ns * clock_hz as u64 / 1_000_000_000;
    if ticks > u32::MAX as u64 {
        u32::MAX
    } else {
        ticks as u32
    }
}

/// Convert microseconds to timer ticks, rounding down.
#[must_use]
pub const fn us_to_ticks(us: u64, clock_hz: u32) -> u32 {
    ns_to_ticks(us * 1000, clock_hz)
}

/// Convert timer ticks to nanoseconds, rounding down.
#[must_use]
pub const fn ticks_to_ns(ticks: u32, clock_hz: u32) -> u64 {
    if clock_hz == 0 {
        return 0;
    }
    ticks as u64 * 1_000_000_000 / clock_hz as u64
}

/// Which compare register to arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Compare {
    /// Display time of a bit plane.
    Plane(u8),
    /// Address settle interval with the panel blanked.
    Dim,
}

/// Compare values in timer ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerCompareSet {
    planes: [u32; MAX_PLANES],
    count: usize,
    dim: u32,
}

impl TimerCompareSet {
    /// `count` plane durations starting at `base` and doubling, plus `dim`.
    ///
    /// `count` is limited to `1..=MAX_PLANES`. Durations saturate at
    /// `u32::MAX`.
    #[must_use]
    pub const fn new(base: u32, count: usize, dim: u32) -> Self {
        let count = if count == 0 {
            1
        } else if count > MAX_PLANES {
            MAX_PLANES
        } else {
            count
        };
        let mut planes = [0u32; MAX_PLANES];
        let mut k = 0;
        while k < count {
            planes[k] = match base.checked_mul(1 << k) {
                Some(ticks) => ticks,
                None => u32::MAX,
            };
            k += 1;
        }
        Self { planes, count, dim }
    }

    /// Table from durations in nanoseconds at `clock_hz`.
    #[must_use]
    pub const fn from_ns(base_ns: u64, count: usize, dim_ns: u64, clock_hz: u32) -> Self {
        Self::new(
            ns_to_ticks(base_ns, clock_hz),
            count,
            ns_to_ticks(dim_ns, clock_hz),
        )
    }

    /// Same table with `count` planes.
    #[must_use]
    pub const fn with_planes(self, count: usize) -> Self {
        Self::new(self.planes[0], count, self.dim)
    }

    /// Number of bit planes.
    #[must_use]
    pub const fn planes(&self) -> usize {
        self.count
    }

    /// Ticks for a compare.
    #[inline]
    #[must_use]
    pub const fn ticks(&self, compare: Compare) -> u32 {
        match compare {
            Compare::Plane(k) => self.planes[k as usize % MAX_PLANES],
            Compare::Dim => self.dim,
        }
    }

    /// Total ticks to display every plane of one scan line, dim intervals included.
    #[must_use]
    pub const fn line_ticks(&self) -> u64 {
        let mut total = 0u64;
        let mut k = 0;
        while k < self.count {
            total += self.planes[k] as u64 + self.dim as u64;
            k += 1;
        }
        total
    }
}

impl Default for TimerCompareSet {
    fn default() -> Self {
        Self::new(DEFAULT_PLANE0_TICKS, MAX_PLANES, DEFAULT_DIM_TICKS)
    }
}

/// A free-running timer with preloaded compare registers.
pub trait ScanTimer {
    /// Arm `compare`, counting from now. Replaces any pending compare.
    fn start(&mut self, compare: Compare);

    /// Block until the armed compare fires.
    ///
    /// Returns at most the armed duration after [`start`](Self::start), and
    /// immediately if the compare already fired.
    fn wait_for_timer_event(&mut self);
}

impl<T: ScanTimer + ?Sized> ScanTimer for &mut T {
    fn start(&mut self, compare: Compare) {
        T::start(self, compare);
    }

    fn wait_for_timer_event(&mut self) {
        T::wait_for_timer_event(self);
    }
}

/// Timer built on an `embedded-hal` delay.
///
/// The interval is measured from the wait instead of the start, so work done
/// between [`start`](ScanTimer::start) and the wait stretches it.
#[derive(Debug)]
pub struct DelayTimer<D> {
    delay: D,
    compares: TimerCompareSet,
    clock_hz: u32,
    pending_ns: Option<u32>,
}

impl<D: DelayNs> DelayTimer<D> {
    /// Timer using `compares` expressed in ticks of `clock_hz`.
    pub fn new(delay: D, compares: TimerCompareSet, clock_hz: u32) -> Self {
        Self {
            delay,
            compares,
            clock_hz,
            pending_ns: None,
        }
    }

    /// Give the delay back.
    pub fn release(self) -> D {
        self.delay
    }
}

impl<D: DelayNs> ScanTimer for DelayTimer<D> {
    fn start(&mut self, compare: Compare) {
        let ns = ticks_to_ns(self.compares.ticks(compare), self.clock_hz);
        self.pending_ns = Some(ns.min(u64::from(u32::MAX)) as u32);
    }

    fn wait_for_timer_event(&mut self) {
        if let Some(ns) = self.pending_ns.take() {
            self.delay.delay_ns(ns);
        }
    }
}

/// Delay that returns immediately and only adds up the requested time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimDelay {
    elapsed_ns: u64,
}

impl SimDelay {
    /// A delay with nothing requested yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { elapsed_ns: 0 }
    }

    /// Total nanoseconds requested so far.
    #[must_use]
    pub const fn elapsed_ns(&self) -> u64 {
        self.elapsed_ns
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += u64::from(ns);
    }
}

/// One armed compare as seen by [`SimTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerEvent {
    /// Compare that was armed.
    pub compare: Compare,
    /// Virtual time at start.
    pub started: u64,
    /// Virtual time the compare fires.
    pub expires: u64,
}

/// Simulated timer advancing a virtual tick counter.
#[derive(Debug, Clone)]
pub struct SimTimer {
    compares: TimerCompareSet,
    now: u64,
    armed: Option<TimerEvent>,
    log: Option<Vec<TimerEvent>>,
}

impl SimTimer {
    /// Timer logging every armed compare.
    #[must_use]
    pub fn new(compares: TimerCompareSet) -> Self {
        Self {
            compares,
            now: 0,
            armed: None,
            log: Some(Vec::new()),
        }
    }

    /// Timer that only keeps time.
    #[must_use]
    pub fn unlogged(compares: TimerCompareSet) -> Self {
        Self {
            log: None,
            ..Self::new(compares)
        }
    }

    /// Virtual time in ticks.
    #[must_use]
    pub const fn now(&self) -> u64 {
        self.now
    }

    /// Let `ticks` pass, e.g. for work done between timer operations.
    pub fn advance(&mut self, ticks: u64) {
        self.now += ticks;
    }

    /// Armed compares, oldest first.
    #[must_use]
    pub fn log(&self) -> &[TimerEvent] {
        self.log.as_deref().unwrap_or(&[])
    }

    /// Forget the logged compares.
    pub fn clear_log(&mut self) {
        if let Some(log) = self.log.as_mut() {
            log.clear();
        }
    }
}

impl ScanTimer for SimTimer {
    fn start(&mut self, compare: Compare) {
        let event = TimerEvent {
            compare,
            started: self.now,
            expires: self.now + u64::from(self.compares.ticks(compare)),
        };
        self.armed = Some(event);
        if let Some(log) = self.log.as_mut() {
            log.push(event);
        }
    }

    fn wait_for_timer_event(&mut self) {
        if let Some(event) = self.armed.take() {
            self.now = self.now.max(event.expires);
        }
    }
}
