//! Panel wiring, display modes and derived refresh timings.
//!
//! Configuration is permissive: out-of-range values are clamped to something
//! the hardware can display instead of being rejected. Only a malformed mode
//! string is an error.

use core::str::FromStr;

use crate::chain::{PanelChain, Topology};
use crate::error::ModeError;
use crate::{compute_plane_count, MAX_LINES};

/// Highest refresh rate a mode may request.
pub const MAX_REFRESH_HZ: u32 = 1000;

const PICOS_PER_SEC: u64 = 1_000_000_000_000;
const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Data line layout of the panel connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PanelProtocol {
    /// One monochrome data line, eight pixels shifted per byte.
    Hub12,
    /// Two RGB data sets (upper and lower half), one pixel column per byte.
    Hub75,
}

/// Electrical polarity of the colour data lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataPolarity {
    /// A high data bit lights the LED (HUB75).
    ActiveHigh,
    /// A low data bit lights the LED (HUB12).
    ActiveLow,
}

impl DataPolarity {
    /// Convert logical "lit" bits into wire levels for the bits in `mask`.
    #[inline]
    #[must_use]
    pub const fn apply(self, bits: u8, mask: u8) -> u8 {
        match self {
            Self::ActiveHigh => bits,
            Self::ActiveLow => bits ^ mask,
        }
    }
}

/// Which bit of a 1 bpp framebuffer byte holds the leftmost pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SourceBitOrder {
    /// Leftmost pixel in bit 0. The wire is MSB-first, so bytes get reversed.
    LsbFirst,
    /// Leftmost pixel in bit 7.
    MsbFirst,
}

/// Bit positions of the six colour signals inside one output byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ColorWiring {
    /// Red, upper half.
    pub r1: u8,
    /// Green, upper half.
    pub g1: u8,
    /// Blue, upper half.
    pub b1: u8,
    /// Red, lower half.
    pub r2: u8,
    /// Green, lower half.
    pub g2: u8,
    /// Blue, lower half.
    pub b2: u8,
}

impl ColorWiring {
    /// R1 G1 B1 R2 G2 B2 on bits 0..=5.
    pub const SEQUENTIAL: Self = Self {
        r1: 0,
        g1: 1,
        b1: 2,
        r2: 3,
        g2: 4,
        b2: 5,
    };

    /// B1 G1 R1 B2 G2 R2 on bits 0..=5.
    pub const BGR: Self = Self {
        r1: 2,
        g1: 1,
        b1: 0,
        r2: 5,
        g2: 4,
        b2: 3,
    };

    /// All six colour bits.
    #[must_use]
    pub const fn mask(&self) -> u8 {
        (1 << self.r1) | (1 << self.g1) | (1 << self.b1) | (1 << self.r2) | (1 << self.g2) | (1 << self.b2)
    }

    /// Encode the lit state of an upper and a lower pixel.
    #[inline]
    #[must_use]
    pub const fn encode(&self, upper: [bool; 3], lower: [bool; 3]) -> u8 {
        ((upper[0] as u8) << self.r1)
            | ((upper[1] as u8) << self.g1)
            | ((upper[2] as u8) << self.b1)
            | ((lower[0] as u8) << self.r2)
            | ((lower[1] as u8) << self.g2)
            | ((lower[2] as u8) << self.b2)
    }
}

/// Physical panel layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PanelGeometry {
    /// Width of one panel in pixels.
    pub panel_width: usize,
    /// Height of one panel in pixels.
    pub panel_height: usize,
    /// Number of multiplexed scan lines (address codes).
    pub lines_per_scan: usize,
    /// Panels side by side.
    pub panels_wide: usize,
    /// Panels stacked vertically.
    pub panels_high: usize,
    /// How the panels are chained.
    pub topology: Topology,
}

impl PanelGeometry {
    /// Single 32×16 HUB12 (P10) monochrome panel, 1/4 scan.
    pub const HUB12_P10: Self = Self {
        panel_width: 32,
        panel_height: 16,
        lines_per_scan: 4,
        panels_wide: 1,
        panels_high: 1,
        topology: Topology::HorizontalFirst,
    };

    /// Single 32×16 HUB75 panel, 1/8 scan.
    pub const HUB75_32X16: Self = Self {
        panel_width: 32,
        panel_height: 16,
        lines_per_scan: 8,
        panels_wide: 1,
        panels_high: 1,
        topology: Topology::HorizontalFirst,
    };

    /// Single 32×32 HUB75 panel, 1/8 scan.
    pub const HUB75_32X32: Self = Self {
        panel_width: 32,
        panel_height: 32,
        lines_per_scan: 8,
        panels_wide: 1,
        panels_high: 1,
        topology: Topology::HorizontalFirst,
    };

    /// Total width in pixels.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.panel_width * self.panels_wide
    }

    /// Total height in pixels.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.panel_height * self.panels_high
    }

    /// Number of chained panels.
    #[must_use]
    pub const fn panel_count(&self) -> usize {
        self.panels_wide.saturating_mul(self.panels_high)
    }

    /// Panel rows driven by one scan line of a single-data-set (HUB12) panel.
    #[must_use]
    pub const fn rows_per_line(&self) -> usize {
        let rows = self.panel_height / max1(self.lines_per_scan);
        if rows == 0 {
            1
        } else {
            rows
        }
    }

    /// Rows per data half driven by one scan line of a dual-data-set (HUB75) panel.
    #[must_use]
    pub const fn color_fold(&self) -> usize {
        let rows = self.panel_height / 2 / max1(self.lines_per_scan);
        if rows == 0 {
            1
        } else {
            rows
        }
    }

    /// Chain order of the panels.
    #[must_use]
    pub const fn chain(&self) -> PanelChain {
        PanelChain::new(self)
    }

    /// Bring every field into its supported range.
    ///
    /// Panel width becomes a non-zero multiple of 8, the scan line count is
    /// limited by the address wires and the panel height, and at least one
    /// panel is chained.
    #[must_use]
    pub fn clamped(self) -> Self {
        let panel_width = round_up(self.panel_width.max(8), 8);
        let panel_height = self.panel_height.max(2);
        let lines_per_scan = self.lines_per_scan.clamp(1, MAX_LINES.min(panel_height));
        Self {
            panel_width,
            panel_height,
            lines_per_scan,
            panels_wide: self.panels_wide.max(1),
            panels_high: self.panels_high.max(1),
            topology: self.topology,
        }
    }

    /// Geometry covering a (panel aligned) resolution.
    #[must_use]
    pub fn with_resolution(self, xres: u32, yres: u32) -> Self {
        Self {
            panels_wide: (xres as usize / max1(self.panel_width)).max(1),
            panels_high: (yres as usize / max1(self.panel_height)).max(1),
            ..self
        }
    }
}

impl Default for PanelGeometry {
    fn default() -> Self {
        Self::HUB12_P10
    }
}

/// Everything needed to pack and time out a panel chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PanelConfig {
    /// Connector protocol.
    pub protocol: PanelProtocol,
    /// Panel layout.
    pub geometry: PanelGeometry,
    /// Colour bits per channel (bit planes) for colour panels, 1 for monochrome.
    pub bits: u8,
    /// Requested refresh rate in Hz.
    pub refresh_hz: u32,
    /// LED on-time per scan line, 0–255 of the line period.
    pub brightness: u8,
    /// Colour data polarity.
    pub data_polarity: DataPolarity,
    /// Pixel order inside 1 bpp framebuffer bytes.
    pub source_bit_order: SourceBitOrder,
    /// Colour bit positions in the output byte.
    pub wiring: ColorWiring,
}

impl PanelConfig {
    /// Configuration for HUB75 colour panels.
    #[must_use]
    pub const fn hub75(geometry: PanelGeometry, bits: u8) -> Self {
        Self {
            protocol: PanelProtocol::Hub75,
            geometry,
            bits,
            refresh_hz: 60,
            brightness: 255,
            data_polarity: DataPolarity::ActiveHigh,
            source_bit_order: SourceBitOrder::MsbFirst,
            wiring: ColorWiring::SEQUENTIAL,
        }
    }

    /// Number of BCM bit planes, `bits` limited to `1..=MAX_PLANES`.
    ///
    /// HUB12 panels are always driven with a single plane.
    #[must_use]
    pub const fn planes(&self) -> usize {
        match self.protocol {
            PanelProtocol::Hub12 => 1,
            PanelProtocol::Hub75 => compute_plane_count(self.bits),
        }
    }

    /// Display mode matching the configured geometry and refresh rate.
    #[must_use]
    pub fn display_mode(&self) -> DisplayMode {
        let bpp = match self.protocol {
            PanelProtocol::Hub12 => 1,
            PanelProtocol::Hub75 => 24,
        };
        DisplayMode::new(
            self.geometry.width() as u32,
            self.geometry.height() as u32,
            bpp,
            self.refresh_hz,
        )
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            protocol: PanelProtocol::Hub12,
            geometry: PanelGeometry::HUB12_P10,
            bits: 1,
            refresh_hz: 60,
            brightness: 10,
            data_polarity: DataPolarity::ActiveLow,
            source_bit_order: SourceBitOrder::LsbFirst,
            wiring: ColorWiring::SEQUENTIAL,
        }
    }
}

/// Pixel clock period in picoseconds for a refresh rate and resolution.
#[must_use]
pub const fn refresh_to_pixclock(refresh_hz: u32, xres: u32, yres: u32) -> u32 {
    let mut pixels = refresh_hz as u128 * xres as u128 * yres as u128;
    if pixels == 0 {
        pixels = 1;
    }
    let ps = PICOS_PER_SEC as u128 / pixels;
    if ps > u32::MAX as u128 {
        u32::MAX
    } else {
        ps as u32
    }
}

/// Refresh rate in Hz for a pixel clock period and resolution, at least 1.
#[must_use]
pub const fn pixclock_to_refresh(pixclock_ps: u32, xres: u32, yres: u32) -> u32 {
    let mut period = pixclock_ps as u128 * xres as u128 * yres as u128;
    if period == 0 {
        period = 1;
    }
    let hz = PICOS_PER_SEC as u128 / period;
    if hz == 0 {
        1
    } else if hz > u32::MAX as u128 {
        u32::MAX
    } else {
        hz as u32
    }
}

const fn max1(value: usize) -> usize {
    if value == 0 {
        1
    } else {
        value
    }
}

const fn round_up(value: usize, unit: usize) -> usize {
    let unit = max1(unit);
    value.div_ceil(unit) * unit
}

/// Round a resolution up to whole panels, staying within `u32`.
const fn round_up_res(value: u32, unit: usize) -> u32 {
    let unit = max1(unit) as u64;
    let mut rounded = (value as u64).div_ceil(unit) * unit;
    if rounded > u32::MAX as u64 {
        rounded -= unit;
    }
    if rounded == 0 {
        rounded = unit;
    }
    if rounded > u32::MAX as u64 {
        u32::MAX
    } else {
        rounded as u32
    }
}

/// A framebuffer mode: resolution, depth and pixel clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisplayMode {
    /// Horizontal resolution in pixels.
    pub xres: u32,
    /// Vertical resolution in pixels.
    pub yres: u32,
    /// Bits per pixel: 1, 8 or 24.
    pub bpp: u8,
    /// Pixel clock period in picoseconds.
    pub pixclock_ps: u32,
}

impl DisplayMode {
    /// Mode with the pixel clock derived from `refresh_hz`.
    #[must_use]
    pub const fn new(xres: u32, yres: u32, bpp: u8, refresh_hz: u32) -> Self {
        Self {
            xres,
            yres,
            bpp,
            pixclock_ps: refresh_to_pixclock(refresh_hz, xres, yres),
        }
    }

    /// Refresh rate implied by the pixel clock.
    #[must_use]
    pub const fn refresh_hz(&self) -> u32 {
        pixclock_to_refresh(self.pixclock_ps, self.xres, self.yres)
    }

    /// Bytes per framebuffer row.
    #[must_use]
    pub const fn line_length(&self) -> usize {
        (self.xres as usize)
            .saturating_mul(self.bpp as usize)
            .div_ceil(8)
    }

    /// Clamp the mode to what a chain of `geometry` panels can show.
    ///
    /// The resolution is rounded up to whole panels, the depth becomes 1, 8 or
    /// 24 bpp, and the refresh rate is held within `1..=MAX_REFRESH_HZ` by
    /// adjusting the pixel clock.
    #[must_use]
    pub fn clamped(self, geometry: &PanelGeometry) -> Self {
        let xres = round_up_res(self.xres.max(1), geometry.panel_width);
        let yres = round_up_res(self.yres.max(1), geometry.panel_height);
        let bpp = match self.bpp {
            0 | 1 => 1,
            2..=8 => 8,
            _ => 24,
        };
        let fastest = refresh_to_pixclock(MAX_REFRESH_HZ, xres, yres);
        let slowest = refresh_to_pixclock(1, xres, yres).max(fastest);
        let pixclock_ps = self.pixclock_ps.clamp(fastest, slowest).max(1);
        Self {
            xres,
            yres,
            bpp,
            pixclock_ps,
        }
    }

    /// Apply the fields of a parsed mode string, then clamp.
    ///
    /// Fields missing from the request keep their current value, and the
    /// refresh rate is kept if none was requested.
    #[must_use]
    pub fn with_request(self, request: &ModeRequest, geometry: &PanelGeometry) -> Self {
        let refresh = request.refresh_hz.unwrap_or_else(|| self.refresh_hz());
        let xres = round_up_res(request.xres.max(1), geometry.panel_width);
        let yres = round_up_res(request.yres.max(1), geometry.panel_height);
        let bpp = request.bpp.unwrap_or(self.bpp);
        Self::new(xres, yres, bpp, refresh).clamped(geometry)
    }
}

impl core::fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}x{}-{}@{}",
            self.xres,
            self.yres,
            self.bpp,
            self.refresh_hz()
        )
    }
}

/// A parsed `"<xres>x<yres>[-<bpp>][@<refresh>]"` mode string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModeRequest {
    /// Requested horizontal resolution.
    pub xres: u32,
    /// Requested vertical resolution.
    pub yres: u32,
    /// Requested bits per pixel, if given.
    pub bpp: Option<u8>,
    /// Requested refresh rate, if given.
    pub refresh_hz: Option<u32>,
}

fn parse_number<T: FromStr>(field: &str) -> Result<T, ModeError> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ModeError::InvalidNumber);
    }
    field.parse().map_err(|_| ModeError::InvalidNumber)
}

impl FromStr for ModeRequest {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (rest, refresh_hz) = match s.rsplit_once('@') {
            Some((rest, hz)) => (rest, Some(parse_number(hz)?)),
            None => (s, None),
        };
        let (resolution, bpp) = match rest.rsplit_once('-') {
            Some((resolution, bpp)) => (resolution, Some(parse_number(bpp)?)),
            None => (rest, None),
        };
        let (xres, yres) = resolution
            .split_once('x')
            .ok_or(ModeError::MissingResolution)?;
        Ok(Self {
            xres: parse_number(xres)?,
            yres: parse_number(yres)?,
            bpp,
            refresh_hz,
        })
    }
}

/// Refresh timings derived from a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanTimings {
    /// Period of the per-scan-line timer.
    pub hsync_period_ns: u64,
    /// LED on-time within each scan line.
    pub ledon_ns: u64,
    /// Upper bound for waiting on an in-flight transfer when stopping.
    pub stop_timeout_us: u32,
}

impl ScanTimings {
    /// Timings for `mode` on panels with `lines_per_scan` scan lines.
    #[must_use]
    pub fn new(mode: &DisplayMode, lines_per_scan: usize, brightness: u8) -> Self {
        let refresh = u64::from(mode.refresh_hz().max(1));
        let hsync_period_ns = NANOS_PER_SEC / refresh / lines_per_scan.max(1) as u64;
        let stop_timeout_us = (250_000 / refresh + 1_000) as u32;
        Self {
            hsync_period_ns,
            ledon_ns: 0,
            stop_timeout_us,
        }
        .with_brightness(brightness)
    }

    /// Same timings with the LED on-time scaled for `brightness`.
    #[must_use]
    pub const fn with_brightness(self, brightness: u8) -> Self {
        Self {
            ledon_ns: brightness as u64 * self.hsync_period_ns / 256,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::string::ToString;

    use super::*;
    use crate::MAX_PLANES;

    #[test]
    fn test_geometry_presets() {
        let g = PanelGeometry::HUB12_P10;
        assert_eq!((g.width(), g.height()), (32, 16));
        assert_eq!(g.rows_per_line(), 4);
        assert_eq!(g.color_fold(), 2);

        let g = PanelGeometry::HUB75_32X16;
        assert_eq!(g.color_fold(), 1);

        let g = PanelGeometry::HUB75_32X32;
        assert_eq!(g.color_fold(), 2);
    }

    #[test]
    fn test_geometry_clamped() {
        let g = PanelGeometry {
            panel_width: 20,
            panel_height: 16,
            lines_per_scan: 40,
            panels_wide: 0,
            panels_high: 0,
            topology: Topology::VerticalFirst,
        }
        .clamped();
        assert_eq!(g.panel_width, 24);
        assert_eq!(g.lines_per_scan, MAX_LINES);
        assert_eq!(g.panel_count(), 1);
        assert_eq!(g.topology, Topology::VerticalFirst);
    }

    #[test]
    fn test_geometry_with_resolution() {
        let g = PanelGeometry::HUB12_P10.with_resolution(96, 32);
        assert_eq!((g.panels_wide, g.panels_high), (3, 2));
        assert_eq!((g.width(), g.height()), (96, 32));
    }

    #[test]
    fn test_wiring_encode() {
        let w = ColorWiring::SEQUENTIAL;
        assert_eq!(w.mask(), 0x3F);
        assert_eq!(w.encode([true, false, false], [false, false, true]), 0b10_0001);

        let w = ColorWiring::BGR;
        assert_eq!(w.mask(), 0x3F);
        assert_eq!(w.encode([true, false, false], [true, false, false]), 0b10_0100);
    }

    #[test]
    fn test_polarity() {
        assert_eq!(DataPolarity::ActiveHigh.apply(0x0F, 0xFF), 0x0F);
        assert_eq!(DataPolarity::ActiveLow.apply(0x0F, 0xFF), 0xF0);
        assert_eq!(DataPolarity::ActiveLow.apply(0x01, 0x3F), 0x3E);
    }

    #[test]
    fn test_pixclock_round_trip() {
        for (hz, x, y) in [(60, 32, 16), (100, 32, 16), (60, 192, 32), (1000, 320, 32)] {
            let ps = refresh_to_pixclock(hz, x, y);
            assert_eq!(pixclock_to_refresh(ps, x, y), hz);
        }
    }

    #[test]
    fn test_parse_mode_string() {
        let req: ModeRequest = "64x32-8@60".parse().unwrap();
        assert_eq!(
            req,
            ModeRequest {
                xres: 64,
                yres: 32,
                bpp: Some(8),
                refresh_hz: Some(60)
            }
        );

        let req: ModeRequest = "96x16".parse().unwrap();
        assert_eq!(req.bpp, None);
        assert_eq!(req.refresh_hz, None);

        let req: ModeRequest = "32x32@100".parse().unwrap();
        assert_eq!(req.refresh_hz, Some(100));
        assert_eq!(req.bpp, None);
    }

    #[test]
    fn test_parse_mode_string_errors() {
        assert_eq!("".parse::<ModeRequest>(), Err(ModeError::MissingResolution));
        assert_eq!("64-8".parse::<ModeRequest>(), Err(ModeError::MissingResolution));
        assert_eq!("64x".parse::<ModeRequest>(), Err(ModeError::InvalidNumber));
        assert_eq!("64x32@fast".parse::<ModeRequest>(), Err(ModeError::InvalidNumber));
        assert_eq!("64x32-@60".parse::<ModeRequest>(), Err(ModeError::InvalidNumber));
    }

    #[test]
    fn test_clamp_rounds_to_panels() {
        let mode = DisplayMode::new(40, 20, 3, 60).clamped(&PanelGeometry::HUB12_P10);
        assert_eq!((mode.xres, mode.yres), (64, 32));
        assert_eq!(mode.bpp, 8);

        let mode = DisplayMode::new(0, 0, 0, 60).clamped(&PanelGeometry::HUB12_P10);
        assert_eq!((mode.xres, mode.yres, mode.bpp), (32, 16, 1));
    }

    #[test]
    fn test_clamp_caps_refresh() {
        let g = PanelGeometry::HUB12_P10;
        let mode = DisplayMode::new(320, 32, 1, 5000).clamped(&g);
        assert_eq!(mode.refresh_hz(), MAX_REFRESH_HZ);
        assert!(mode.pixclock_ps > 0);

        let timings = ScanTimings::new(&mode, g.lines_per_scan, 255);
        assert_eq!(timings.hsync_period_ns, 250_000);
        assert!(timings.ledon_ns > 0);
    }

    #[test]
    fn test_clamp_zero_refresh() {
        let mut mode = DisplayMode::new(32, 16, 1, 60);
        mode.pixclock_ps = u32::MAX;
        let mode = mode.clamped(&PanelGeometry::HUB12_P10);
        assert_eq!(mode.refresh_hz(), 1);
    }

    #[test]
    fn test_clamp_huge_resolution() {
        let g = PanelGeometry::HUB12_P10;
        let mode = DisplayMode::new(u32::MAX, u32::MAX, 24, u32::MAX).clamped(&g);
        assert_eq!((mode.xres, mode.yres), (u32::MAX - 31, u32::MAX - 15));
        assert!(mode.pixclock_ps > 0);
        assert!(mode.refresh_hz() >= 1);
        assert!(mode.line_length() > 0);

        let req: ModeRequest = "4294967264x4294967264-24".parse().unwrap();
        let mode = DisplayMode::new(32, 16, 1, 60).with_request(&req, &g);
        assert_eq!(mode.xres, 4_294_967_264);
        assert_eq!(mode.bpp, 24);
    }

    #[test]
    fn test_zero_geometry_does_not_divide_by_zero() {
        let g = PanelGeometry {
            panel_width: 0,
            panel_height: 0,
            lines_per_scan: 0,
            panels_wide: 0,
            panels_high: 0,
            topology: Topology::HorizontalFirst,
        };
        assert_eq!(g.rows_per_line(), 1);
        assert_eq!(g.color_fold(), 1);
        let g = g.with_resolution(64, 32);
        assert_eq!((g.panels_wide, g.panels_high), (64, 32));
    }

    #[test]
    fn test_with_request_keeps_refresh() {
        let g = PanelGeometry::HUB12_P10;
        let current = DisplayMode::new(32, 16, 1, 100);
        let req: ModeRequest = "20x10-8".parse().unwrap();
        let mode = current.with_request(&req, &g);
        assert_eq!((mode.xres, mode.yres, mode.bpp), (32, 16, 8));
        assert_eq!(mode.refresh_hz(), 100);
    }

    #[test]
    fn test_display_mode_to_string() {
        let mode = DisplayMode::new(64, 32, 8, 60);
        assert_eq!(mode.to_string(), "64x32-8@60");
    }

    #[test]
    fn test_scan_timings() {
        let mode = DisplayMode::new(32, 16, 1, 60);
        let t = ScanTimings::new(&mode, 4, 10);
        assert_eq!(t.hsync_period_ns, 1_000_000_000 / 60 / 4);
        assert_eq!(t.ledon_ns, 10 * t.hsync_period_ns / 256);
        assert_eq!(t.stop_timeout_us, 250_000 / 60 + 1_000);

        let brighter = t.with_brightness(255);
        assert!(brighter.ledon_ns > t.ledon_ns);
        assert!(brighter.ledon_ns < brighter.hsync_period_ns);
        assert_eq!(t.with_brightness(0).ledon_ns, 0);
    }

    #[test]
    fn test_default_config_is_hub12() {
        let config = PanelConfig::default();
        assert_eq!(config.protocol, PanelProtocol::Hub12);
        assert_eq!(config.geometry, PanelGeometry::HUB12_P10);
        assert_eq!(config.planes(), 1);
        assert_eq!(config.data_polarity, DataPolarity::ActiveLow);
        let mode = config.display_mode();
        assert_eq!((mode.xres, mode.yres, mode.bpp), (32, 16, 1));
        assert_eq!(mode.refresh_hz(), 60);
    }

    #[test]
    fn test_hub75_config_planes() {
        let config = PanelConfig::hub75(PanelGeometry::HUB75_32X32, 12);
        assert_eq!(config.planes(), MAX_PLANES);
        assert_eq!(config.display_mode().bpp, 24);
        assert_eq!(PanelConfig::hub75(PanelGeometry::HUB75_32X16, 1).planes(), 1);
    }
}
