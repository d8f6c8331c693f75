//! Producer-side pixel framebuffer.
//!
//! A [`PixelBuffer`] is a linear byte array laid out like a generic
//! framebuffer device: `line_length` bytes per row, rows top to bottom.
//! Three depths are supported:
//!
//! - [`PixelFormat::Mono`]: 1 bpp, eight pixels per byte. Which bit holds the
//!   leftmost pixel is given by [`SourceBitOrder`].
//! - [`PixelFormat::Indexed8`]: one byte per pixel, index 0 is dark and every
//!   other index is lit.
//! - [`PixelFormat::Rgb888`]: three bytes per pixel, red first.
//!
//! The buffer also implements [`DrawTarget`] so content can be rendered with
//! `embedded-graphics`. Drawing onto a monochrome or indexed buffer lights a
//! pixel when any channel of the colour is at least half intensity.

use alloc::vec::Vec;
use core::convert::Infallible;

use embedded_graphics::pixelcolor::RgbColor;
use embedded_graphics::prelude::{DrawTarget, OriginDimensions, Point, Size};

use crate::config::{DisplayMode, SourceBitOrder};
use crate::error::{try_alloc_zeroed, Error};
use crate::Color;

/// Storage format of a [`PixelBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PixelFormat {
    /// 1 bit per pixel.
    Mono,
    /// 8 bit palette index per pixel.
    Indexed8,
    /// 24 bit RGB per pixel.
    Rgb888,
}

impl PixelFormat {
    /// Format for a (clamped) bits-per-pixel value.
    #[must_use]
    pub const fn from_bpp(bpp: u8) -> Self {
        match bpp {
            0 | 1 => Self::Mono,
            2..=8 => Self::Indexed8,
            _ => Self::Rgb888,
        }
    }

    /// Bits used by one pixel.
    #[must_use]
    pub const fn bits_per_pixel(self) -> u8 {
        match self {
            Self::Mono => 1,
            Self::Indexed8 => 8,
            Self::Rgb888 => 24,
        }
    }

    /// Bytes per row for a given width.
    #[must_use]
    pub const fn line_length(self, width: usize) -> usize {
        width
            .saturating_mul(self.bits_per_pixel() as usize)
            .div_ceil(8)
    }
}

const LIT_THRESHOLD: u8 = 0x80;

#[inline]
fn is_lit(color: Color) -> bool {
    color.r() >= LIT_THRESHOLD || color.g() >= LIT_THRESHOLD || color.b() >= LIT_THRESHOLD
}

/// Linear framebuffer written by the producer and read by the packer.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    format: PixelFormat,
    bit_order: SourceBitOrder,
    line_length: usize,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Allocate a cleared buffer.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`] if the buffer cannot be allocated.
    pub fn try_new(
        width: usize,
        height: usize,
        format: PixelFormat,
        bit_order: SourceBitOrder,
    ) -> Result<Self, Error> {
        let line_length = format.line_length(width);
        // an unrepresentable size fails like any other oversized allocation
        let data = try_alloc_zeroed(line_length.saturating_mul(height))?;
        Ok(Self {
            width,
            height,
            format,
            bit_order,
            line_length,
            data,
        })
    }

    /// Allocate a cleared buffer sized for `mode`.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`] if the buffer cannot be allocated.
    pub fn for_mode(mode: &DisplayMode, bit_order: SourceBitOrder) -> Result<Self, Error> {
        Self::try_new(
            mode.xres as usize,
            mode.yres as usize,
            PixelFormat::from_bpp(mode.bpp),
            bit_order,
        )
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Storage format.
    #[must_use]
    pub const fn format(&self) -> PixelFormat {
        self.format
    }

    /// Bit order of monochrome bytes.
    #[must_use]
    pub const fn bit_order(&self) -> SourceBitOrder {
        self.bit_order
    }

    /// Bytes per row.
    #[must_use]
    pub const fn line_length(&self) -> usize {
        self.line_length
    }

    /// Raw framebuffer bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Raw framebuffer bytes for linear writes.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// One row of raw bytes.
    #[must_use]
    pub fn row_bytes(&self, y: usize) -> &[u8] {
        let start = y * self.line_length;
        &self.data[start..start + self.line_length]
    }

    /// Set every pixel dark.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    #[inline]
    const fn mono_mask(&self, x: usize) -> u8 {
        match self.bit_order {
            SourceBitOrder::LsbFirst => 1 << (x % 8),
            SourceBitOrder::MsbFirst => 0x80 >> (x % 8),
        }
    }

    /// `true` if the pixel lights at least one LED.
    ///
    /// Out of range coordinates read as dark.
    #[must_use]
    pub fn pixel_lit(&self, x: usize, y: usize) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let row = y * self.line_length;
        match self.format {
            PixelFormat::Mono => self.data[row + x / 8] & self.mono_mask(x) != 0,
            PixelFormat::Indexed8 => self.data[row + x] != 0,
            PixelFormat::Rgb888 => is_lit(self.rgb(x, y)),
        }
    }

    /// Pixel as an RGB colour. Lit monochrome and indexed pixels read as white.
    #[must_use]
    pub fn rgb(&self, x: usize, y: usize) -> Color {
        if x >= self.width || y >= self.height {
            return Color::BLACK;
        }
        match self.format {
            PixelFormat::Mono | PixelFormat::Indexed8 => {
                if self.pixel_lit(x, y) {
                    Color::WHITE
                } else {
                    Color::BLACK
                }
            }
            PixelFormat::Rgb888 => {
                let i = y * self.line_length + x * 3;
                Color::new(self.data[i], self.data[i + 1], self.data[i + 2])
            }
        }
    }

    /// Write one pixel. Out of range coordinates are ignored.
    pub fn set_pixel(&mut self, x: usize, y: usize, color: Color) {
        if x >= self.width || y >= self.height {
            return;
        }
        let row = y * self.line_length;
        match self.format {
            PixelFormat::Mono => {
                let mask = self.mono_mask(x);
                let byte = &mut self.data[row + x / 8];
                if is_lit(color) {
                    *byte |= mask;
                } else {
                    *byte &= !mask;
                }
            }
            PixelFormat::Indexed8 => self.data[row + x] = u8::from(is_lit(color)),
            PixelFormat::Rgb888 => {
                let i = row + x * 3;
                self.data[i..i + 3].copy_from_slice(&[color.r(), color.g(), color.b()]);
            }
        }
    }
}

impl core::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("line_length", &self.line_length)
            .field("size", &self.data.len())
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PixelBuffer {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "PixelBuffer<{}x{}, {}, {} bytes>",
            self.width,
            self.height,
            self.format,
            self.data.len()
        );
    }
}

impl OriginDimensions for PixelBuffer {
    fn size(&self) -> Size {
        Size::new(self.width as u32, self.height as u32)
    }
}

impl DrawTarget for PixelBuffer {
    type Color = Color;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = embedded_graphics::Pixel<Self::Color>>,
    {
        for embedded_graphics::Pixel(Point { x, y }, color) in pixels {
            if x < 0 || y < 0 {
                continue;
            }
            self.set_pixel(x as usize, y as usize, color);
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        match self.format {
            PixelFormat::Mono => self.data.fill(if is_lit(color) { 0xFF } else { 0 }),
            PixelFormat::Indexed8 => self.data.fill(u8::from(is_lit(color))),
            PixelFormat::Rgb888 => {
                for px in self.data.chunks_exact_mut(3) {
                    px.copy_from_slice(&[color.r(), color.g(), color.b()]);
                }
            }
        }
        Ok(())
    }
}
