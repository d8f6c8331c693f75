//! Scan line shifter.
//!
//! Streams one packed row into the panel shift registers. Every clock cycle
//! is the same three steps: put the data on the lines with the clock low,
//! raise the clock (the panel samples on this edge), move on. The loop has no
//! branches that depend on the data, so each byte costs the same number of
//! port writes. On exit the clock is low and the colour lines are off.

use crate::config::PanelProtocol;
use crate::port::PanelOutputPort;

/// Shift one byte per clock on the parallel colour lines (HUB75).
#[inline]
pub fn shift_parallel<P: PanelOutputPort + ?Sized>(port: &mut P, row: &[u8]) {
    for &byte in row {
        port.write_color(byte);
        port.clock_high();
    }
    port.idle();
}

/// Shift every byte MSB first on colour line 0, one bit per clock (HUB12).
#[inline]
pub fn shift_serial<P: PanelOutputPort + ?Sized>(port: &mut P, row: &[u8]) {
    for &byte in row {
        for bit in (0..8).rev() {
            port.write_color((byte >> bit) & 1);
            port.clock_high();
        }
    }
    port.idle();
}

/// Shift `row` the way panels speaking `protocol` expect it.
#[inline]
pub fn shift_scanline<P: PanelOutputPort + ?Sized>(
    port: &mut P,
    row: &[u8],
    protocol: PanelProtocol,
) {
    match protocol {
        PanelProtocol::Hub75 => shift_parallel(port, row),
        PanelProtocol::Hub12 => shift_serial(port, row),
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::vec::Vec;

    use super::*;
    use crate::port::{OePolarity, PortWord, SimPort};

    fn sampled(trace: &[PortWord]) -> Vec<u8> {
        // values present on the colour lines at each rising clock edge
        trace
            .windows(2)
            .filter(|w| !w[0].clock() && w[1].clock())
            .map(|w| w[1].color())
            .collect()
    }

    #[test]
    fn test_parallel_samples_every_byte() {
        let mut port = SimPort::new(OePolarity::ActiveLow);
        let row = [0x01, 0x3F, 0x00, 0x2A];
        shift_parallel(&mut port, &row);
        assert_eq!(sampled(port.trace()), row);
        assert_eq!(port.trace().len(), row.len() * 2 + 1);
    }

    #[test]
    fn test_data_settles_before_clock() {
        let mut port = SimPort::new(OePolarity::ActiveLow);
        shift_parallel(&mut port, &[0x11, 0x22]);
        for w in port.trace().windows(2) {
            if w[1].clock() {
                assert_eq!(w[0].color(), w[1].color());
                assert!(!w[0].clock());
            }
        }
    }

    #[test]
    fn test_exit_state_idle() {
        let mut port = SimPort::new(OePolarity::ActiveLow);
        port.set_address(2);
        shift_parallel(&mut port, &[0xFF; 8]);
        let word = port.word();
        assert!(!word.clock());
        assert_eq!(word.color(), 0);
        assert_eq!(word.address(), 2);
        assert!(!port.is_lit());
    }

    #[test]
    fn test_serial_is_msb_first() {
        let mut port = SimPort::new(OePolarity::ActiveLow);
        shift_serial(&mut port, &[0b1010_0001]);
        assert_eq!(sampled(port.trace()), [1, 0, 1, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_empty_row() {
        let mut port = SimPort::new(OePolarity::ActiveLow);
        shift_scanline(&mut port, &[], PanelProtocol::Hub75);
        assert_eq!(port.trace().len(), 1);
        assert!(sampled(port.trace()).is_empty());
    }

    #[test]
    fn test_dispatch_by_protocol() {
        let mut port = SimPort::untraced(OePolarity::ActiveLow);
        shift_scanline(&mut port, &[0xFF; 4], PanelProtocol::Hub12);
        assert_eq!(port.writes(), 4 * 8 * 2 + 1);
        let mut port = SimPort::untraced(OePolarity::ActiveLow);
        shift_scanline(&mut port, &[0xFF; 4], PanelProtocol::Hub75);
        assert_eq!(port.writes(), 4 * 2 + 1);
    }
}
