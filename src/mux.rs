//! Line multiplexer.
//!
//! The address lines select which scan line is driven. Codes come from a
//! table built once, so unusual panels (non-binary or interleaved address
//! decoders) only need a different table. Changing the address is a single
//! masked port update, so only one code is ever visible on the lines.

use crate::port::PanelOutputPort;
use crate::MAX_LINES;

/// Address code for every scan line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineSelectTable {
    codes: [u8; MAX_LINES],
    len: usize,
}

impl LineSelectTable {
    /// Binary codes `0..lines`. `lines` is limited to `1..=MAX_LINES`.
    #[must_use]
    pub const fn new(lines: usize) -> Self {
        let len = if lines == 0 {
            1
        } else if lines > MAX_LINES {
            MAX_LINES
        } else {
            lines
        };
        let mut codes = [0u8; MAX_LINES];
        let mut i = 0;
        while i < len {
            codes[i] = i as u8;
            i += 1;
        }
        Self { codes, len }
    }

    /// Table with explicit codes, truncated to `MAX_LINES` entries.
    #[must_use]
    pub fn from_codes(codes: &[u8]) -> Self {
        let len = codes.len().clamp(1, MAX_LINES);
        let mut table = [0u8; MAX_LINES];
        for (dst, &src) in table.iter_mut().zip(codes) {
            *dst = src & 0x0F;
        }
        Self { codes: table, len }
    }

    /// Address code for `line`, wrapping out of range lines.
    #[inline]
    #[must_use]
    pub const fn code(&self, line: usize) -> u8 {
        self.codes[line % self.len]
    }

    /// Number of scan lines.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Always `false`; a table has at least one line.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Drive the address lines for `line`, leaving every other signal alone.
#[inline]
pub fn select_line<P: PanelOutputPort + ?Sized>(port: &mut P, table: &LineSelectTable, line: usize) {
    port.set_address(table.code(line));
}
