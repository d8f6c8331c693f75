//! Bit-plane buffers and the packer that fills them.
//!
//! The packer turns a [`PixelBuffer`] into one byte sequence per
//! `(scan line, bit plane)` pair, in exactly the order the bytes have to be
//! clocked into the panel chain. Nothing is computed while shifting: the
//! scan-out loop only walks these rows.
//!
//! # Layouts
//!
//! **HUB12** panels have a single data line. Each output byte carries eight
//! horizontally adjacent pixels, MSB first on the wire. A panel with
//! `lines_per_scan` scan lines folds `panel_height / lines_per_scan` rows into
//! one shift register chain, so scan line `g` of a 16 row, 1/4 scan panel
//! emits, for every byte column, the rows `12+g, 8+g, 4+g, g`:
//!
//! ```text
//! line g:  [col0 r12+g][col0 r8+g][col0 r4+g][col0 rg][col1 r12+g] ...
//! ```
//!
//! Source bytes go through a 256-entry table combining the bit reversal
//! (for LSB-first framebuffers) and data inversion (for active-low panels).
//!
//! **HUB75** panels carry two RGB data sets, one for each panel half. Each
//! output byte holds R1 G1 B1 R2 G2 B2 of one pixel column at the positions
//! given by [`ColorWiring`]. Plane `k` of an `n` plane buffer emits bit
//! `8 - n + k` of each 8-bit channel, so plane 0 is the least significant
//! displayed bit. When the half panel has more rows than scan lines, the
//! extra rows are chained bottom-up, one panel width each.
//!
//! Panels are visited in chain order (see [`PanelChain`](crate::chain::PanelChain)).

use embedded_dma::ReadBuffer;
use embedded_graphics::pixelcolor::RgbColor;

use crate::config::{
    ColorWiring, DataPolarity, PanelConfig, PanelGeometry, PanelProtocol, SourceBitOrder,
};
use crate::error::{try_alloc_zeroed, Error};
use crate::pixel::{PixelBuffer, PixelFormat};
use crate::Color;

const fn build_bit_reverse() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = (i as u8).reverse_bits();
        i += 1;
    }
    table
}

/// Byte bit reversal table.
pub const BIT_REVERSE: [u8; 256] = build_bit_reverse();

const fn build_mono_table(reverse: bool, polarity: DataPolarity) -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let byte = if reverse { BIT_REVERSE[i] } else { i as u8 };
        table[i] = polarity.apply(byte, 0xFF);
        i += 1;
    }
    table
}

/// Shape of a [`BitPlaneBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitPlaneLayout {
    /// Scan lines.
    pub lines: usize,
    /// Bit planes per scan line.
    pub planes: usize,
    /// Bytes shifted per scan line and plane.
    pub scanlen: usize,
}

impl BitPlaneLayout {
    /// Total buffer size in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.lines
            .saturating_mul(self.planes)
            .saturating_mul(self.scanlen)
    }
}

/// Packed output rows for every scan line and bit plane.
#[derive(Clone, PartialEq, Eq)]
pub struct BitPlaneBuffer {
    layout: BitPlaneLayout,
    data: alloc::vec::Vec<u8>,
}

impl BitPlaneBuffer {
    /// Allocate a zeroed buffer.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`] if the buffer cannot be allocated.
    pub fn try_new(layout: BitPlaneLayout) -> Result<Self, Error> {
        Ok(Self {
            layout,
            data: try_alloc_zeroed(layout.size())?,
        })
    }

    /// Buffer shape.
    #[must_use]
    pub const fn layout(&self) -> BitPlaneLayout {
        self.layout
    }

    #[inline]
    const fn offset(&self, line: usize, plane: usize) -> usize {
        (line * self.layout.planes + plane) * self.layout.scanlen
    }

    /// Bytes to shift for `line` and `plane`.
    #[inline]
    #[must_use]
    pub fn row(&self, line: usize, plane: usize) -> &[u8] {
        let start = self.offset(line, plane);
        &self.data[start..start + self.layout.scanlen]
    }

    /// Mutable bytes for `line` and `plane`.
    #[inline]
    pub fn row_mut(&mut self, line: usize, plane: usize) -> &mut [u8] {
        let start = self.offset(line, plane);
        let len = self.layout.scanlen;
        &mut self.data[start..start + len]
    }

    /// DMA view of one row.
    #[must_use]
    pub fn dma_row(&self, line: usize, plane: usize) -> RowBuffer<'_> {
        RowBuffer(self.row(line, plane))
    }

    /// Fill every row with `byte`.
    pub fn fill(&mut self, byte: u8) {
        self.data.fill(byte);
    }

    /// The whole buffer, rows in `(line, plane)` order.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl core::fmt::Debug for BitPlaneBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BitPlaneBuffer")
            .field("layout", &self.layout)
            .field("size", &self.data.len())
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for BitPlaneBuffer {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "BitPlaneBuffer<lines: {}, planes: {}, scanlen: {}>",
            self.layout.lines,
            self.layout.planes,
            self.layout.scanlen
        );
    }
}

/// A borrowed scan line row handed to a DMA or SPI transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBuffer<'a>(&'a [u8]);

impl<'a> RowBuffer<'a> {
    /// The row bytes.
    #[must_use]
    pub const fn as_slice(&self) -> &'a [u8] {
        self.0
    }

    /// Row length in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` for an empty row.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

unsafe impl ReadBuffer for RowBuffer<'_> {
    type Word = u8;

    unsafe fn read_buffer(&self) -> (*const u8, usize) {
        (self.0.as_ptr(), self.0.len())
    }
}

/// Converts pixel buffers into bit-plane buffers for one panel configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct Packer {
    protocol: PanelProtocol,
    geometry: PanelGeometry,
    planes: usize,
    polarity: DataPolarity,
    wiring: ColorWiring,
    mono_lsb: [u8; 256],
    mono_msb: [u8; 256],
}

impl Packer {
    /// Packer for `config`. Conversion tables are built here, once.
    #[must_use]
    pub fn new(config: &PanelConfig) -> Self {
        Self {
            protocol: config.protocol,
            geometry: config.geometry.clamped(),
            planes: config.planes(),
            polarity: config.data_polarity,
            wiring: config.wiring,
            mono_lsb: build_mono_table(true, config.data_polarity),
            mono_msb: build_mono_table(false, config.data_polarity),
        }
    }

    /// Same packer for a chain resized to `geometry`.
    #[must_use]
    pub fn with_geometry(&self, geometry: PanelGeometry) -> Self {
        Self {
            geometry: geometry.clamped(),
            ..self.clone()
        }
    }

    /// Panel geometry this packer writes for.
    #[must_use]
    pub const fn geometry(&self) -> &PanelGeometry {
        &self.geometry
    }

    /// Layout of the buffers [`pack`](Self::pack) fills.
    #[must_use]
    pub const fn layout(&self) -> BitPlaneLayout {
        let g = &self.geometry;
        match self.protocol {
            PanelProtocol::Hub12 => BitPlaneLayout {
                lines: g.lines_per_scan,
                planes: 1,
                scanlen: (g.panel_width / 8 * g.rows_per_line()).saturating_mul(g.panel_count()),
            },
            PanelProtocol::Hub75 => BitPlaneLayout {
                lines: g.lines_per_scan,
                planes: self.planes,
                scanlen: (g.panel_width * g.color_fold()).saturating_mul(g.panel_count()),
            },
        }
    }

    /// Allocate a buffer matching [`layout`](Self::layout).
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`] if the buffer cannot be allocated.
    pub fn alloc_buffer(&self) -> Result<BitPlaneBuffer, Error> {
        BitPlaneBuffer::try_new(self.layout())
    }

    /// Conversion table for monochrome source bytes.
    #[must_use]
    pub const fn mono_table(&self, order: SourceBitOrder) -> &[u8; 256] {
        match order {
            SourceBitOrder::LsbFirst => &self.mono_lsb,
            SourceBitOrder::MsbFirst => &self.mono_msb,
        }
    }

    /// Rebuild every row of `dst` from `src`.
    ///
    /// Pixels outside `src` pack as dark. `dst` must have been allocated
    /// with this packer's layout.
    pub fn pack(&self, src: &PixelBuffer, dst: &mut BitPlaneBuffer) {
        debug_assert_eq!(dst.layout(), self.layout());
        match self.protocol {
            PanelProtocol::Hub12 => self.pack_mono(src, dst),
            PanelProtocol::Hub75 => self.pack_rgb(src, dst),
        }
    }

    fn pack_mono(&self, src: &PixelBuffer, dst: &mut BitPlaneBuffer) {
        let g = &self.geometry;
        let chain = g.chain();
        let lines = g.lines_per_scan;
        let rows = g.rows_per_line();
        let byte_cols = g.panel_width / 8;
        let table = self.mono_table(src.bit_order());

        for line in 0..lines {
            let out = dst.row_mut(line, 0);
            let mut i = 0;
            for (ox, oy) in chain.origins() {
                for k in 0..byte_cols {
                    let col = ox / 8 + k;
                    for l in (0..rows).rev() {
                        out[i] = self.mono_byte(src, table, col, oy + l * lines + line);
                        i += 1;
                    }
                }
            }
        }
    }

    #[inline]
    fn mono_byte(&self, src: &PixelBuffer, table: &[u8; 256], col: usize, y: usize) -> u8 {
        if src.format() == PixelFormat::Mono {
            let byte = if y < src.height() {
                src.row_bytes(y).get(col).copied().unwrap_or(0)
            } else {
                0
            };
            return table[usize::from(byte)];
        }
        let mut byte = 0u8;
        for bit in 0..8 {
            if src.pixel_lit(col * 8 + bit, y) {
                byte |= 0x80 >> bit;
            }
        }
        self.polarity.apply(byte, 0xFF)
    }

    fn pack_rgb(&self, src: &PixelBuffer, dst: &mut BitPlaneBuffer) {
        let g = &self.geometry;
        let chain = g.chain();
        let lines = g.lines_per_scan;
        let fold = g.color_fold();
        let half = g.panel_height / 2;
        let mask = self.wiring.mask();

        for line in 0..lines {
            for plane in 0..self.planes {
                let shift = 8 - self.planes + plane;
                let out = dst.row_mut(line, plane);
                let mut i = 0;
                for (ox, oy) in chain.origins() {
                    for l in (0..fold).rev() {
                        let y = oy + l * lines + line;
                        for x in ox..ox + g.panel_width {
                            let upper = channel_bits(src.rgb(x, y), shift);
                            let lower = channel_bits(src.rgb(x, y + half), shift);
                            out[i] = self.polarity.apply(self.wiring.encode(upper, lower), mask);
                            i += 1;
                        }
                    }
                }
            }
        }
    }
}

#[inline]
fn channel_bits(color: Color, shift: usize) -> [bool; 3] {
    [
        (color.r() >> shift) & 1 != 0,
        (color.g() >> shift) & 1 != 0,
        (color.b() >> shift) & 1 != 0,
    ]
}

impl core::fmt::Debug for Packer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Packer")
            .field("protocol", &self.protocol)
            .field("geometry", &self.geometry)
            .field("planes", &self.planes)
            .field("polarity", &self.polarity)
            .finish_non_exhaustive()
    }
}
