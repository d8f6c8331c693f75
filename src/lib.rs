//! Bit-plane packing and BCM scan-out timing for HUB75 and HUB12 LED matrix panels.
//!
//! ## How scanned LED panels work
//!
//! HUB75 RGB and HUB12 monochrome LED matrix panels are scanned, time-multiplexed displays
//! that behave like a long daisy-chained shift register rather than a random-access framebuffer.
//!
//! ### Signal names
//! - **R1 G1 B1 / R2 G2 B2** (HUB75) – Serial colour data for the upper and lower halves of the active scan line
//! - **R / DATA** (HUB12) – A single serial data line, usually active low
//! - **CLK** – Shift-register clock; every rising edge pushes the data bits one position along the chain
//! - **LAT / STB** – Latch; copies the shift-register contents to the LED drivers for the row currently selected by the address lines
//! - **OE** – Output-Enable: LEDs are lit only while OE is at its active level
//! - **A B C D** – Row-address select lines (choose which scan line is lit)
//!
//! ### Scanning
//! Only one scan line is lit at a time. For every line the driver blanks the panel,
//! shifts the row data in, pulses LAT, selects the line on the address wires and lights
//! the panel again. Doing this for every line fast enough (hundreds of Hz) makes the image
//! look steady.
//!
//! ### Brightness and colour depth (Binary Code Modulation)
//! - Full colour is achieved using **Binary Code Modulation (BCM)**, also known as *Bit-Angle
//!   Modulation (BAM)*. Each bit-plane is displayed for a period proportional to its binary
//!   weight (1, 2, 4, 8 …), yielding 2ⁿ intensity levels per channel. See
//!   [Batsocks – LED dimming using Binary Code Modulation](https://www.batsocks.co.uk/readme/art_bcm_1.htm)
//!   for a deeper explanation.
//! - Monochrome panels use a single plane; the LED on-time per line sets the brightness.
//!
//! ## Crate layout
//!
//! The producer draws into a [`pixel::PixelBuffer`] (1, 8 or 24 bpp, an
//! `embedded-graphics` draw target). A [`bitplane::Packer`] converts it into a
//! [`bitplane::BitPlaneBuffer`] holding one ready-to-shift row per
//! `(scan line, bit plane)` pair, in panel chain order ([`chain`]).
//!
//! Two refresh regimes consume those rows:
//!
//! 1. **Bare-metal loop** ([`scheduler::BcmScheduler`]) – a single real-time
//!    context that bit-bangs rows through a [`port::PanelOutputPort`] with
//!    [`shifter`] and [`mux`], paced only by a hardware compare timer
//!    ([`timer::ScanTimer`]).
//! 2. **Interrupt driven** ([`refresh::RefreshController`]) – an asynchronous
//!    transport (SPI or DMA) shifts the rows while an hsync timer and a led-on
//!    timer drive latch, address and output enable. The pixel buffer is repacked
//!    at every vsync.
//!
//! Both regimes share the same packer, port abstraction and line table, and
//! can be exercised off target with [`port::SimPort`], [`timer::SimTimer`] and
//! [`timer::SimDelay`]:
//!
//! ```
//! use embedded_graphics::prelude::*;
//! use hub75_scanout::bitplane::Packer;
//! use hub75_scanout::config::{PanelConfig, PanelGeometry};
//! use hub75_scanout::pattern::TestPattern;
//! use hub75_scanout::pixel::PixelBuffer;
//! use hub75_scanout::port::{OePolarity, SimPort};
//! use hub75_scanout::scheduler::BcmScheduler;
//! use hub75_scanout::timer::{SimDelay, SimTimer, TimerCompareSet};
//!
//! let config = PanelConfig::hub75(PanelGeometry::HUB75_32X16, 4);
//! let mut pixels = PixelBuffer::for_mode(&config.display_mode(), config.source_bit_order)?;
//! TestPattern::ColorBars.draw(&mut pixels)?;
//!
//! let packer = Packer::new(&config);
//! let mut planes = packer.alloc_buffer()?;
//! packer.pack(&pixels, &mut planes);
//!
//! let timer = SimTimer::new(TimerCompareSet::default().with_planes(config.planes()));
//! let port = SimPort::new(OePolarity::ActiveLow);
//! let mut scan = BcmScheduler::new(port, timer, SimDelay::new(), planes, config.protocol);
//! scan.start();
//! scan.run_frame();
//! assert_eq!(scan.frames(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Available Feature Flags
//!
//! ### `defmt` Feature
//! Implements `defmt::Format` for the public types and enables log output from
//! the refresh controller (mode changes, stop timeouts, allocation failures,
//! skipped transfers). Without it no logging code is compiled.
#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

extern crate alloc;

use embedded_graphics::pixelcolor::Rgb888;

pub mod bitplane;
pub mod chain;
pub mod config;
pub mod error;
pub mod mux;
pub mod pattern;
pub mod pixel;
pub mod port;
pub mod refresh;
pub mod scheduler;
pub mod shifter;
pub mod sync;
pub mod timer;

pub use error::{Error, ModeError};

/// Color type used in the framebuffer
pub type Color = Rgb888;

/// Most scan lines a panel can have (four address wires).
pub const MAX_LINES: usize = 16;

/// Most BCM bit planes (one per bit of an 8-bit channel).
pub const MAX_PLANES: usize = 8;

/// Computes the number of bit planes for a colour depth
///
/// # Arguments
///
/// * `bits` - Number of bits per color channel
///
/// # Returns
///
/// `bits` limited to `1..=MAX_PLANES`
#[must_use]
pub const fn compute_plane_count(bits: u8) -> usize {
    let bits = bits as usize;
    if bits == 0 {
        1
    } else if bits > MAX_PLANES {
        MAX_PLANES
    } else {
        bits
    }
}

/// Computes the total BCM on-time of one scan line in units of plane 0
///
/// Plane `k` is shown for `2^k` units, so `planes` planes add up to
/// `2^planes - 1`.
#[must_use]
pub const fn compute_bcm_units(planes: usize) -> u32 {
    (1u32 << planes) - 1
}
