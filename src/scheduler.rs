//! Bare-metal BCM scan-out loop.
//!
//! [`BcmScheduler`] is the whole real-time context of a co-processor driving
//! the panel directly: one thread, no interrupts, paced only by
//! [`ScanTimer::wait_for_timer_event`]. For every `(line, plane)` pair it
//! runs the same sequence:
//!
//! 1. wait for the previous plane's display time to elapse
//! 2. blank the panel
//! 3. shift the row for this line and plane
//! 4. pulse the latch
//! 5. arm the dim timer and select the line while it runs
//! 6. wait for the dim interval
//! 7. arm the plane's display time and light the panel
//!
//! Planes advance fastest, then lines. After the last plane of the last line
//! the frame counter is bumped and the [`VsyncHook`] runs, which is the only
//! point where the bit-plane buffer may be swapped.
//!
//! Nothing here logs or allocates.

use embedded_hal::delay::DelayNs;

use crate::bitplane::BitPlaneBuffer;
use crate::config::PanelProtocol;
use crate::mux::{select_line, LineSelectTable};
use crate::port::PanelOutputPort;
use crate::shifter::shift_scanline;
use crate::timer::{Compare, ScanTimer};

/// Position of the scan-out loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanState {
    line: usize,
    plane: usize,
    lines: usize,
    planes: usize,
}

/// What [`ScanState::advance`] wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Advance {
    /// Next plane of the same line.
    Plane,
    /// First plane of the next line.
    Line,
    /// Back to line 0, plane 0. A frame was completed.
    Frame,
}

impl ScanState {
    /// Cursor at line 0, plane 0. Zero counts are treated as 1.
    #[must_use]
    pub const fn new(lines: usize, planes: usize) -> Self {
        Self {
            line: 0,
            plane: 0,
            lines: if lines == 0 { 1 } else { lines },
            planes: if planes == 0 { 1 } else { planes },
        }
    }

    /// Current scan line.
    #[must_use]
    pub const fn line(&self) -> usize {
        self.line
    }

    /// Current bit plane.
    #[must_use]
    pub const fn plane(&self) -> usize {
        self.plane
    }

    /// Number of scan lines.
    #[must_use]
    pub const fn lines(&self) -> usize {
        self.lines
    }

    /// Number of bit planes.
    #[must_use]
    pub const fn planes(&self) -> usize {
        self.planes
    }

    /// Move to the next pair.
    pub fn advance(&mut self) -> Advance {
        self.plane += 1;
        if self.plane < self.planes {
            return Advance::Plane;
        }
        self.plane = 0;
        self.line += 1;
        if self.line < self.lines {
            return Advance::Line;
        }
        self.line = 0;
        Advance::Frame
    }

    /// Back to line 0, plane 0.
    pub fn reset(&mut self) {
        self.line = 0;
        self.plane = 0;
    }
}

/// When the address lines change relative to the latch pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineSelectOrder {
    /// Latch first, then select the line during the dim interval.
    #[default]
    AfterLatch,
    /// Select the line, then latch.
    BeforeLatch,
}

/// Settle delays around shifting and latching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanTiming {
    /// After blanking, before the first clock.
    pub pre_shift_ns: u32,
    /// After the last clock, before the latch.
    pub post_shift_ns: u32,
    /// Latch pulse width.
    pub latch_ns: u32,
    /// Address change order.
    pub order: LineSelectOrder,
}

impl Default for ScanTiming {
    /// 4, 40 and 80 cycles of a 200 MHz core.
    fn default() -> Self {
        Self {
            pre_shift_ns: 20,
            post_shift_ns: 200,
            latch_ns: 400,
            order: LineSelectOrder::AfterLatch,
        }
    }
}

/// Runs at every frame boundary.
pub trait VsyncHook {
    /// `front` is the buffer the next frame will be shifted from.
    fn on_vsync(&mut self, front: &mut BitPlaneBuffer);
}

/// Vsync hook that does nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoVsync;

impl VsyncHook for NoVsync {
    fn on_vsync(&mut self, _front: &mut BitPlaneBuffer) {}
}

/// Back buffer swapped in at the next frame boundary once published.
#[derive(Debug, Clone)]
pub struct FrameSwap {
    back: BitPlaneBuffer,
    pending: bool,
    swaps: u32,
}

impl FrameSwap {
    /// Hook owning `back`.
    #[must_use]
    pub const fn new(back: BitPlaneBuffer) -> Self {
        Self {
            back,
            pending: false,
            swaps: 0,
        }
    }

    /// The buffer to draw the next frame into.
    pub fn back_mut(&mut self) -> &mut BitPlaneBuffer {
        &mut self.back
    }

    /// Hand the back buffer over at the next frame boundary.
    pub fn publish(&mut self) {
        self.pending = true;
    }

    /// `true` while a published buffer waits for the frame boundary.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending
    }

    /// Number of completed swaps.
    #[must_use]
    pub const fn swaps(&self) -> u32 {
        self.swaps
    }
}

impl VsyncHook for FrameSwap {
    fn on_vsync(&mut self, front: &mut BitPlaneBuffer) {
        // a buffer with another shape would desynchronise the line table
        if self.pending && self.back.layout() == front.layout() {
            core::mem::swap(front, &mut self.back);
            self.pending = false;
            self.swaps = self.swaps.wrapping_add(1);
        }
    }
}

/// The BCM scan-out state machine.
///
/// The timer's compare set must cover every plane of the buffer.
#[derive(Debug)]
pub struct BcmScheduler<P, T, D, V = NoVsync> {
    port: P,
    timer: T,
    delay: D,
    vsync: V,
    buffer: BitPlaneBuffer,
    lines: LineSelectTable,
    protocol: PanelProtocol,
    timing: ScanTiming,
    state: ScanState,
    frames: u32,
    started: bool,
}

impl<P, T, D> BcmScheduler<P, T, D, NoVsync>
where
    P: PanelOutputPort,
    T: ScanTimer,
    D: DelayNs,
{
    /// Scheduler shifting `buffer` forever, without a vsync hook.
    pub fn new(port: P, timer: T, delay: D, buffer: BitPlaneBuffer, protocol: PanelProtocol) -> Self {
        Self::with_vsync(port, timer, delay, buffer, protocol, NoVsync)
    }
}

impl<P, T, D, V> BcmScheduler<P, T, D, V>
where
    P: PanelOutputPort,
    T: ScanTimer,
    D: DelayNs,
    V: VsyncHook,
{
    /// Scheduler calling `vsync` at every frame boundary.
    pub fn with_vsync(
        port: P,
        timer: T,
        delay: D,
        buffer: BitPlaneBuffer,
        protocol: PanelProtocol,
        vsync: V,
    ) -> Self {
        let layout = buffer.layout();
        Self {
            port,
            timer,
            delay,
            vsync,
            buffer,
            lines: LineSelectTable::new(layout.lines),
            protocol,
            timing: ScanTiming::default(),
            state: ScanState::new(layout.lines, layout.planes),
            frames: 0,
            started: false,
        }
    }

    /// Use other settle delays or line select order.
    #[must_use]
    pub fn with_timing(mut self, timing: ScanTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Use a custom address table.
    #[must_use]
    pub fn with_line_table(mut self, lines: LineSelectTable) -> Self {
        self.lines = lines;
        self
    }

    /// Put the port in its safe state and arm the first timer.
    pub fn start(&mut self) {
        self.port.safe_state();
        self.state.reset();
        self.timer.start(Compare::Dim);
        self.started = true;
    }

    /// Emit one `(line, plane)` pair and advance.
    ///
    /// Calls [`start`](Self::start) first if needed.
    pub fn step(&mut self) -> Advance {
        if !self.started {
            self.start();
        }
        let line = self.state.line();
        let plane = self.state.plane();

        self.timer.wait_for_timer_event();
        self.port.set_output_enable(false);
        self.delay.delay_ns(self.timing.pre_shift_ns);

        shift_scanline(&mut self.port, self.buffer.row(line, plane), self.protocol);
        self.delay.delay_ns(self.timing.post_shift_ns);

        if self.timing.order == LineSelectOrder::BeforeLatch {
            select_line(&mut self.port, &self.lines, line);
        }
        self.port.set_latch(true);
        self.delay.delay_ns(self.timing.latch_ns);
        self.port.set_latch(false);

        self.timer.start(Compare::Dim);
        if self.timing.order == LineSelectOrder::AfterLatch {
            select_line(&mut self.port, &self.lines, line);
        }
        self.timer.wait_for_timer_event();

        self.timer.start(Compare::Plane(plane as u8));
        self.port.set_output_enable(true);

        let advance = self.state.advance();
        if advance == Advance::Frame {
            self.frames = self.frames.wrapping_add(1);
            self.vsync.on_vsync(&mut self.buffer);
        }
        advance
    }

    /// Step until a whole frame has been shown.
    pub fn run_frame(&mut self) {
        while self.step() != Advance::Frame {}
    }

    /// Scan forever.
    pub fn run(&mut self) -> ! {
        self.start();
        loop {
            self.step();
        }
    }

    /// Next pair to be emitted.
    #[must_use]
    pub const fn state(&self) -> &ScanState {
        &self.state
    }

    /// Frames completed.
    #[must_use]
    pub const fn frames(&self) -> u32 {
        self.frames
    }

    /// Buffer being shifted.
    #[must_use]
    pub const fn buffer(&self) -> &BitPlaneBuffer {
        &self.buffer
    }

    /// Buffer being shifted, for single-threaded producers writing between steps.
    pub fn buffer_mut(&mut self) -> &mut BitPlaneBuffer {
        &mut self.buffer
    }

    /// The vsync hook.
    pub fn vsync_mut(&mut self) -> &mut V {
        &mut self.vsync
    }

    /// The output port.
    #[must_use]
    pub const fn port(&self) -> &P {
        &self.port
    }

    /// The timer.
    #[must_use]
    pub const fn timer(&self) -> &T {
        &self.timer
    }

    /// Blank the panel and take the scheduler apart.
    pub fn into_parts(mut self) -> (P, T, D, V, BitPlaneBuffer) {
        self.port.safe_state();
        (self.port, self.timer, self.delay, self.vsync, self.buffer)
    }
}
