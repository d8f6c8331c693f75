//! Built-in test patterns.
//!
//! A pattern is an `embedded-graphics` [`Drawable`] covering the whole
//! bounding box of its target, so it can be loaded into a [`PixelBuffer`]
//! before scanning starts or drawn onto any other canvas.
//!
//! [`PixelBuffer`]: crate::pixel::PixelBuffer

use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;

use crate::Color;

/// Colours of [`TestPattern::ColorBars`], left to right.
pub const BAR_COLORS: [Color; 8] = [
    Color::WHITE,
    Color::YELLOW,
    Color::CYAN,
    Color::GREEN,
    Color::MAGENTA,
    Color::RED,
    Color::BLUE,
    Color::BLACK,
];

/// A full-screen test image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TestPattern {
    /// Every pixel the same colour.
    Solid(Color),
    /// Eight vertical bars, see [`BAR_COLORS`].
    #[default]
    ColorBars,
    /// Grey ramp, black on the left to white on the right.
    Gradient,
    /// White and black squares with the given side length in pixels.
    Checkerboard(u32),
}

#[cfg(feature = "defmt")]
impl defmt::Format for TestPattern {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Solid(c) => defmt::write!(f, "Solid({=u8}, {=u8}, {=u8})", c.r(), c.g(), c.b()),
            Self::ColorBars => defmt::write!(f, "ColorBars"),
            Self::Gradient => defmt::write!(f, "Gradient"),
            Self::Checkerboard(cell) => defmt::write!(f, "Checkerboard({=u32})", cell),
        }
    }
}

impl Drawable for TestPattern {
    type Color = Color;
    type Output = ();

    fn draw<D>(&self, target: &mut D) -> Result<Self::Output, D::Error>
    where
        D: DrawTarget<Color = Self::Color>,
    {
        let area = target.bounding_box();
        let Some(bottom_right) = area.bottom_right() else {
            return Ok(());
        };
        let Size { width, height } = area.size;
        match *self {
            Self::Solid(color) => target.fill_solid(&area, color),
            Self::ColorBars => {
                let bars = BAR_COLORS.len() as u32;
                for (i, &color) in (0u32..).zip(BAR_COLORS.iter()) {
                    let left = width * i / bars;
                    let right = width * (i + 1) / bars;
                    let bar = Rectangle::new(
                        area.top_left + Point::new(left as i32, 0),
                        Size::new(right - left, height),
                    );
                    target.fill_solid(&bar, color)?;
                }
                Ok(())
            }
            Self::Gradient => {
                let span = width.saturating_sub(1).max(1);
                for x in 0..width {
                    let level = (x * 255 / span) as u8;
                    let column = Rectangle::new(
                        area.top_left + Point::new(x as i32, 0),
                        Size::new(1, height),
                    );
                    target.fill_solid(&column, Color::new(level, level, level))?;
                }
                Ok(())
            }
            Self::Checkerboard(cell) => {
                let cell = cell.max(1);
                let cells = Size::new(width.div_ceil(cell), height.div_ceil(cell));
                for row in 0..cells.height {
                    for col in 0..cells.width {
                        let color = if (row + col) % 2 == 0 {
                            Color::WHITE
                        } else {
                            Color::BLACK
                        };
                        let top_left = area.top_left
                            + Point::new((col * cell) as i32, (row * cell) as i32);
                        let square = Rectangle::with_corners(
                            top_left,
                            (top_left + Point::new(cell as i32 - 1, cell as i32 - 1))
                                .component_min(bottom_right),
                        );
                        target.fill_solid(&square, color)?;
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::config::SourceBitOrder;
    use crate::pixel::{PixelBuffer, PixelFormat};

    fn rgb_buffer() -> PixelBuffer {
        PixelBuffer::try_new(32, 16, PixelFormat::Rgb888, SourceBitOrder::MsbFirst).unwrap()
    }

    #[test]
    fn test_solid() {
        let mut fb = rgb_buffer();
        TestPattern::Solid(Color::RED).draw(&mut fb).unwrap();
        assert!((0..16).all(|y| (0..32).all(|x| fb.rgb(x, y) == Color::RED)));
    }

    #[test]
    fn test_solid_mono() {
        let mut fb =
            PixelBuffer::try_new(32, 16, PixelFormat::Mono, SourceBitOrder::LsbFirst).unwrap();
        TestPattern::Solid(Color::WHITE).draw(&mut fb).unwrap();
        assert!(fb.as_bytes().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_color_bars() {
        let mut fb = rgb_buffer();
        TestPattern::ColorBars.draw(&mut fb).unwrap();
        for (i, &color) in BAR_COLORS.iter().enumerate() {
            assert_eq!(fb.rgb(i * 4, 0), color);
            assert_eq!(fb.rgb(i * 4 + 3, 15), color);
        }
    }

    #[test]
    fn test_gradient() {
        let mut fb = rgb_buffer();
        TestPattern::Gradient.draw(&mut fb).unwrap();
        assert_eq!(fb.rgb(0, 5), Color::BLACK);
        assert_eq!(fb.rgb(31, 5), Color::WHITE);
        for x in 1..32 {
            assert!(fb.rgb(x, 0).r() >= fb.rgb(x - 1, 0).r());
        }
    }

    #[test]
    fn test_checkerboard() {
        let mut fb = rgb_buffer();
        TestPattern::Checkerboard(5).draw(&mut fb).unwrap();
        assert_eq!(fb.rgb(0, 0), Color::WHITE);
        assert_eq!(fb.rgb(4, 4), Color::WHITE);
        assert_eq!(fb.rgb(5, 0), Color::BLACK);
        assert_eq!(fb.rgb(0, 5), Color::BLACK);
        assert_eq!(fb.rgb(5, 5), Color::WHITE);
        // partial cells at the right and bottom edges
        assert_eq!(fb.rgb(31, 15), Color::BLACK);
    }

    #[test]
    fn test_checkerboard_zero_cell() {
        let mut fb = rgb_buffer();
        TestPattern::Checkerboard(0).draw(&mut fb).unwrap();
        assert_eq!(fb.rgb(0, 0), Color::WHITE);
        assert_eq!(fb.rgb(1, 0), Color::BLACK);
    }
}
