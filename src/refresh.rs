//! Interrupt-driven refresh controller.
//!
//! On a host with an operating system the panel data lines are fed by an
//! asynchronous transport (SPI, DMA) and timing comes from two high
//! resolution timers. [`RefreshController`] owns all shared state and is
//! driven by three callbacks, which the platform must serialise with each
//! other and with the process-context operations:
//!
//! - [`on_hsync`](RefreshController::on_hsync), periodic at the scan line
//!   rate: drop the latch and, if the previous transfer has completed, start
//!   the next one. If it has not, the period is skipped.
//! - [`on_transfer_complete`](RefreshController::on_transfer_complete):
//!   latch the shifted row, select its line, light the LEDs and arm the
//!   led-on timer, then advance. After the last line the whole bit-plane
//!   buffer is repacked from the pixel buffer (vsync).
//! - [`on_ledon_expired`](RefreshController::on_ledon_expired): blank.
//!
//! Mode changes stop refresh synchronously first. Stopping cancels the
//! periodic timer, waits (bounded) for an in-flight transfer and forces the
//! control lines to their safe state even if the wait timed out.

use crate::bitplane::{BitPlaneBuffer, Packer, RowBuffer};
use crate::config::{DisplayMode, ModeRequest, PanelConfig, PanelGeometry, ScanTimings};
use crate::error::Error;
use crate::mux::{select_line, LineSelectTable};
use crate::pixel::PixelBuffer;
use crate::port::PanelOutputPort;
use crate::scheduler::{Advance, ScanState};
use crate::sync::{bounded_wait, Completion};

use embedded_hal::delay::DelayNs;

/// Asynchronous transport shifting one row into the panel.
pub trait ScanlineTransport {
    /// Begin sending `row`. Completion is reported by calling
    /// [`RefreshController::on_transfer_complete`].
    ///
    /// The controller keeps the row memory alive and unmodified until then.
    fn start(&mut self, row: RowBuffer<'_>);

    /// `true` while a transfer is running.
    fn is_busy(&self) -> bool;
}

/// A one-shot or periodic high resolution timer.
pub trait HrTimer {
    /// Fire after `period_ns`. Replaces a pending expiry.
    fn start(&mut self, period_ns: u64);

    /// Cancel a pending expiry. Must not return while the callback runs.
    fn cancel(&mut self);
}

/// What the platform should do with a timer after its callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerAction {
    /// Forward by one period and keep running.
    Restart,
    /// Leave stopped.
    Stop,
}

/// Display blanking levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BlankMode {
    /// Display on.
    #[default]
    Unblank,
    /// Blanked, refresh stopped.
    Normal,
    /// Vsync off.
    VsyncSuspend,
    /// Hsync off.
    HsyncSuspend,
    /// Powered down.
    Powerdown,
}

/// Result of [`RefreshController::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopOutcome {
    /// Refresh was not running.
    AlreadyStopped,
    /// Stopped with no transfer left running.
    Drained,
    /// A transfer was still running after the timeout. Outputs are safe anyway.
    TimedOut,
}

/// Refresh counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RefreshStats {
    /// Transfers started.
    pub transfers: u32,
    /// Hsync periods skipped because the previous transfer was still running.
    pub skipped: u32,
    /// Vsyncs (full repacks).
    pub frames: u32,
}

/// Timer and transport driven refresh of a panel chain.
#[derive(Debug)]
pub struct RefreshController<X, P, H, L, D> {
    transport: X,
    port: P,
    hsync: H,
    ledon: L,
    delay: D,
    config: PanelConfig,
    packer: Packer,
    mode: DisplayMode,
    timings: ScanTimings,
    pixels: PixelBuffer,
    planes: BitPlaneBuffer,
    retired: Option<BitPlaneBuffer>,
    lines: LineSelectTable,
    scan: ScanState,
    done: Completion,
    in_flight: bool,
    vsync_pending: bool,
    running: bool,
    blank: BlankMode,
    stats: RefreshStats,
}

impl<X, P, H, L, D> RefreshController<X, P, H, L, D>
where
    X: ScanlineTransport,
    P: PanelOutputPort,
    H: HrTimer,
    L: HrTimer,
    D: DelayNs,
{
    /// Controller for `config`, stopped, with cleared buffers.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`] if the buffers cannot be allocated.
    pub fn new(
        transport: X,
        mut port: P,
        hsync: H,
        ledon: L,
        delay: D,
        config: PanelConfig,
    ) -> Result<Self, Error> {
        let config = PanelConfig {
            geometry: config.geometry.clamped(),
            ..config
        };
        let mode = config.display_mode().clamped(&config.geometry);
        let geometry = config.geometry.with_resolution(mode.xres, mode.yres);
        let packer = Packer::new(&config).with_geometry(geometry);
        let pixels = PixelBuffer::for_mode(&mode, config.source_bit_order)?;
        let planes = packer.alloc_buffer()?;
        let layout = planes.layout();
        port.safe_state();
        Ok(Self {
            transport,
            port,
            hsync,
            ledon,
            delay,
            config,
            packer,
            mode,
            timings: ScanTimings::new(&mode, layout.lines * layout.planes, config.brightness),
            pixels,
            planes,
            retired: None,
            lines: LineSelectTable::new(layout.lines),
            scan: ScanState::new(layout.lines, layout.planes),
            done: Completion::new(),
            in_flight: false,
            vsync_pending: false,
            running: false,
            blank: BlankMode::Unblank,
            stats: RefreshStats::default(),
        })
    }

    fn panel(&self) -> PanelGeometry {
        PanelGeometry {
            panels_wide: 1,
            panels_high: 1,
            ..self.config.geometry
        }
    }

    /// Parse `"<xres>x<yres>[-<bpp>][@<refresh>]"` and switch to it.
    ///
    /// # Errors
    ///
    /// [`Error::Mode`] for a malformed string, [`Error::OutOfMemory`] as for
    /// [`set_mode`](Self::set_mode).
    pub fn apply_mode_str(&mut self, mode: &str) -> Result<(), Error> {
        let request: ModeRequest = mode.parse()?;
        let mode = self.mode.with_request(&request, &self.panel());
        self.set_mode(mode)
    }

    /// Switch to `mode` after clamping it.
    ///
    /// Refresh is stopped first and restarted if the display is unblanked.
    /// New buffers are allocated before the old ones are released.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`] if the new buffers cannot be allocated. The
    /// previous mode stays active.
    pub fn set_mode(&mut self, mode: DisplayMode) -> Result<(), Error> {
        let mode = mode.clamped(&self.panel());
        self.stop();

        if (mode.xres, mode.yres, mode.bpp) != (self.mode.xres, self.mode.yres, self.mode.bpp) {
            let geometry = self.config.geometry.with_resolution(mode.xres, mode.yres);
            let packer = self.packer.with_geometry(geometry);
            let buffers = PixelBuffer::for_mode(&mode, self.config.source_bit_order)
                .and_then(|pixels| Ok((pixels, packer.alloc_buffer()?)));
            let (pixels, planes) = match buffers {
                Ok(buffers) => buffers,
                Err(err) => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("unable to switch to {}: {}", mode, err);
                    if self.blank == BlankMode::Unblank {
                        self.start();
                    }
                    return Err(err);
                }
            };
            let old = core::mem::replace(&mut self.planes, planes);
            if self.in_flight && self.retired.is_none() {
                // the timed out transfer may still read the old rows
                self.retired = Some(old);
            }
            let layout = self.planes.layout();
            self.pixels = pixels;
            self.packer = packer;
            self.config.geometry = geometry;
            self.lines = LineSelectTable::new(layout.lines);
            self.scan = ScanState::new(layout.lines, layout.planes);
        }

        let layout = self.planes.layout();
        self.mode = mode;
        self.config.refresh_hz = mode.refresh_hz();
        self.timings = ScanTimings::new(&mode, layout.lines * layout.planes, self.config.brightness);

        #[cfg(feature = "defmt")]
        defmt::info!(
            "mode {}: hsync {=u64} ns, led {=u64} ns, timeout {=u32} us",
            self.mode,
            self.timings.hsync_period_ns,
            self.timings.ledon_ns,
            self.timings.stop_timeout_us
        );

        if self.blank == BlankMode::Unblank {
            self.start();
        }
        Ok(())
    }

    /// Set the LED on-time, 0–255 of the scan line period.
    ///
    /// Takes effect from the next scan line.
    pub fn set_brightness(&mut self, brightness: u8) {
        self.config.brightness = brightness;
        self.timings = self.timings.with_brightness(brightness);
    }

    /// Current brightness.
    #[must_use]
    pub const fn brightness(&self) -> u8 {
        self.config.brightness
    }

    /// Change the blanking level. Anything but [`BlankMode::Unblank`] stops refresh.
    pub fn blank(&mut self, mode: BlankMode) {
        self.blank = mode;
        match mode {
            BlankMode::Unblank => self.start(),
            BlankMode::Normal
            | BlankMode::VsyncSuspend
            | BlankMode::HsyncSuspend
            | BlankMode::Powerdown => {
                self.stop();
            }
        }
    }

    /// Current blanking level.
    #[must_use]
    pub const fn blank_mode(&self) -> BlankMode {
        self.blank
    }

    /// Start refreshing: repack, then arm the hsync timer. No-op if running.
    ///
    /// After a timed out [`stop`](Self::stop) the transport may still be
    /// reading the current rows. The repack then waits for that transfer to
    /// complete.
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        if self.in_flight && self.retired.is_none() {
            self.vsync_pending = true;
        } else {
            self.vsync();
        }
        if !self.in_flight {
            self.done.reinit();
            self.done.complete();
        }
        self.running = true;
        self.hsync.start(self.timings.hsync_period_ns);
    }

    /// Stop refreshing and leave the control lines in their safe state.
    pub fn stop(&mut self) -> StopOutcome {
        if !self.running {
            return StopOutcome::AlreadyStopped;
        }
        self.running = false;
        self.hsync.cancel();

        let mut outcome = StopOutcome::Drained;
        if self.in_flight {
            let transport = &self.transport;
            if bounded_wait(&mut self.delay, self.timings.stop_timeout_us, || {
                !transport.is_busy()
            }) {
                self.finish_transfer();
            } else {
                #[cfg(feature = "defmt")]
                defmt::warn!(
                    "transfer still running after {=u32} us",
                    self.timings.stop_timeout_us
                );
                outcome = StopOutcome::TimedOut;
            }
        }

        self.ledon.cancel();
        self.port.set_output_enable(false);
        self.port.set_address(0);
        self.port.set_latch(false);
        outcome
    }

    /// Stop for system suspend. Buffers are kept.
    pub fn suspend(&mut self) -> StopOutcome {
        self.stop()
    }

    /// Restart after [`suspend`](Self::suspend) unless the display is blanked.
    pub fn resume(&mut self) {
        if self.blank == BlankMode::Unblank {
            self.start();
        }
    }

    /// Periodic hsync timer callback.
    pub fn on_hsync(&mut self) -> TimerAction {
        self.port.set_latch(false);
        if !self.running {
            return TimerAction::Stop;
        }
        if self.done.try_wait() {
            self.in_flight = true;
            self.stats.transfers = self.stats.transfers.wrapping_add(1);
            let row = self.planes.dma_row(self.scan.line(), self.scan.plane());
            self.transport.start(row);
        } else {
            self.stats.skipped = self.stats.skipped.wrapping_add(1);
            #[cfg(feature = "defmt")]
            defmt::trace!("hsync overrun, skipping line {=usize}", self.scan.line());
        }
        TimerAction::Restart
    }

    /// Transport completion callback.
    pub fn on_transfer_complete(&mut self) {
        if !self.in_flight {
            return;
        }
        if self.retired.take().is_some() {
            // row belonged to a buffer replaced by a mode change
            self.in_flight = false;
            self.done.complete();
            return;
        }

        let line = self.scan.line();
        let plane = self.scan.plane();
        self.port.set_latch(true);
        select_line(&mut self.port, &self.lines, line);
        if self.blank == BlankMode::Unblank && self.running {
            self.port.set_output_enable(true);
            self.ledon.start(self.ledon_ns(plane));
        }
        self.finish_transfer();
    }

    /// Led-on one-shot timer callback.
    pub fn on_ledon_expired(&mut self) -> TimerAction {
        self.port.set_output_enable(false);
        TimerAction::Stop
    }

    fn finish_transfer(&mut self) {
        self.in_flight = false;
        self.retired = None;
        if self.scan.advance() == Advance::Frame || self.vsync_pending {
            self.vsync();
        }
        self.done.complete();
    }

    fn ledon_ns(&self, plane: usize) -> u64 {
        let shift = self.scan.planes() - 1 - plane;
        self.timings.ledon_ns >> shift
    }

    fn vsync(&mut self) {
        self.vsync_pending = false;
        self.packer.pack(&self.pixels, &mut self.planes);
        self.scan.reset();
        self.stats.frames = self.stats.frames.wrapping_add(1);
    }

    /// The producer framebuffer.
    #[must_use]
    pub const fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    /// The producer framebuffer, picked up at the next vsync.
    pub fn pixels_mut(&mut self) -> &mut PixelBuffer {
        &mut self.pixels
    }

    /// Packed rows being shifted.
    #[must_use]
    pub const fn bit_planes(&self) -> &BitPlaneBuffer {
        &self.planes
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> &DisplayMode {
        &self.mode
    }

    /// Current timings.
    #[must_use]
    pub const fn timings(&self) -> &ScanTimings {
        &self.timings
    }

    /// Configuration with the current geometry, refresh and brightness.
    #[must_use]
    pub const fn config(&self) -> &PanelConfig {
        &self.config
    }

    /// Counters.
    #[must_use]
    pub const fn stats(&self) -> &RefreshStats {
        &self.stats
    }

    /// Next row to transfer.
    #[must_use]
    pub const fn scan_state(&self) -> &ScanState {
        &self.scan
    }

    /// `true` while the hsync timer is armed.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// `true` while a transfer has been started and not completed.
    #[must_use]
    pub const fn is_transfer_in_flight(&self) -> bool {
        self.in_flight
    }

    /// The control line port.
    #[must_use]
    pub const fn port(&self) -> &P {
        &self.port
    }

    /// The transport.
    #[must_use]
    pub const fn transport(&self) -> &X {
        &self.transport
    }

    /// The transport, for platform bookkeeping.
    pub fn transport_mut(&mut self) -> &mut X {
        &mut self.transport
    }

    /// The hsync timer.
    #[must_use]
    pub const fn hsync_timer(&self) -> &H {
        &self.hsync
    }

    /// The led-on timer.
    #[must_use]
    pub const fn ledon_timer(&self) -> &L {
        &self.ledon
    }

    /// Stop refresh and take the controller apart.
    pub fn release(mut self) -> (X, P, H, L, D) {
        self.stop();
        (self.transport, self.port, self.hsync, self.ledon, self.delay)
    }
}
