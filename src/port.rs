//! Panel output port.
//!
//! Colour, clock, address, latch and output-enable signals usually share one
//! GPIO output register. [`PortWord`] is the canonical layout of those signals
//! and [`PortState`] the single owned copy of the current levels; every change
//! is a masked read-modify-write so that an operation on one group of signals
//! never disturbs another.
//!
//! Backends implement [`PanelOutputPort::update`] and get the signal level
//! operations for free:
//!
//! - [`RegisterPort`] writes a memory-mapped output register through a
//!   [`PinMap`], preserving bits it does not own.
//! - [`GpioPort`] drives individual `embedded-hal` output pins.
//! - [`SimPort`] records every word it is given, for tests and benchmarks.

use alloc::vec::Vec;

use bitfield::bitfield;
use embedded_hal::digital::{OutputPin, PinState};

bitfield! {
    /// Levels of all panel signals in their canonical positions.
    ///
    /// The bit layout is as follows:
    /// - Bit 14: Output enable (physical level, see [`OePolarity`])
    /// - Bit 13: Latch
    /// - Bits 12-9: Line address (A is bit 9)
    /// - Bit 8: Clock
    /// - Bits 7-0: Colour data
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct PortWord(u32);
    impl Debug;
    pub u8, color, set_color: 7, 0;
    pub clock, set_clock: 8;
    pub u8, address, set_address: 12, 9;
    pub latch, set_latch: 13;
    pub output_enable, set_output_enable: 14;
}

impl PortWord {
    /// Colour data bits.
    pub const COLOR_MASK: u32 = 0xFF;
    /// Clock bit.
    pub const CLOCK_MASK: u32 = 1 << 8;
    /// Position of address line A.
    pub const ADDRESS_SHIFT: u32 = 9;
    /// Address bits.
    pub const ADDRESS_MASK: u32 = 0xF << Self::ADDRESS_SHIFT;
    /// Latch bit.
    pub const LATCH_MASK: u32 = 1 << 13;
    /// Output-enable bit.
    pub const OE_MASK: u32 = 1 << 14;

    /// Word with every signal low.
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PortWord {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "PortWord({=u32:#06x})", self.0);
    }
}

/// Level of the output-enable line that lights the LEDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OePolarity {
    /// Low lights the panel, high blanks it.
    #[default]
    ActiveLow,
    /// High lights the panel.
    ActiveHigh,
}

impl OePolarity {
    /// Physical level for a lit or blanked panel.
    #[inline]
    #[must_use]
    pub const fn level(self, lit: bool) -> bool {
        match self {
            Self::ActiveLow => !lit,
            Self::ActiveHigh => lit,
        }
    }
}

/// Current levels of every panel signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortState {
    word: PortWord,
}

impl PortState {
    /// Blanked panel, every other signal low.
    #[must_use]
    pub fn new(polarity: OePolarity) -> Self {
        let mut word = PortWord::new();
        word.set_output_enable(polarity.level(false));
        Self { word }
    }

    /// Replace the bits in `mask` with `bits`, returning the new word.
    #[inline]
    pub fn update(&mut self, mask: u32, bits: u32) -> PortWord {
        self.word = PortWord((self.word.0 & !mask) | (bits & mask));
        self.word
    }

    /// Current word.
    #[must_use]
    pub const fn word(&self) -> PortWord {
        self.word
    }
}

/// Signal-level access to a panel connector.
///
/// Implementors provide the masked update; the signal operations are built on
/// top of it. No operation ever touches bits outside its own mask.
pub trait PanelOutputPort {
    /// Replace the [`PortWord`] bits in `mask` with `bits`.
    fn update(&mut self, mask: u32, bits: u32);

    /// Output-enable polarity of the connected panel.
    fn oe_polarity(&self) -> OePolarity;

    /// Put `bits` on the colour lines with the clock low.
    #[inline]
    fn write_color(&mut self, bits: u8) {
        self.update(PortWord::COLOR_MASK | PortWord::CLOCK_MASK, u32::from(bits));
    }

    /// Raise the clock. The panel samples the colour lines on this edge.
    #[inline]
    fn clock_high(&mut self) {
        self.update(PortWord::CLOCK_MASK, PortWord::CLOCK_MASK);
    }

    /// Clock low, colour lines off.
    #[inline]
    fn idle(&mut self) {
        self.update(PortWord::COLOR_MASK | PortWord::CLOCK_MASK, 0);
    }

    /// Drive the address lines with a line-select code.
    #[inline]
    fn set_address(&mut self, code: u8) {
        self.update(
            PortWord::ADDRESS_MASK,
            u32::from(code) << PortWord::ADDRESS_SHIFT,
        );
    }

    /// Set the latch level.
    #[inline]
    fn set_latch(&mut self, high: bool) {
        self.update(PortWord::LATCH_MASK, if high { PortWord::LATCH_MASK } else { 0 });
    }

    /// Light (`true`) or blank the panel.
    #[inline]
    fn set_output_enable(&mut self, lit: bool) {
        let level = self.oe_polarity().level(lit);
        self.update(PortWord::OE_MASK, if level { PortWord::OE_MASK } else { 0 });
    }

    /// Blank the panel, then drop latch, clock, data and address.
    fn safe_state(&mut self) {
        self.set_output_enable(false);
        self.set_latch(false);
        self.idle();
        self.set_address(0);
    }
}

impl<T: PanelOutputPort + ?Sized> PanelOutputPort for &mut T {
    fn update(&mut self, mask: u32, bits: u32) {
        T::update(self, mask, bits);
    }

    fn oe_polarity(&self) -> OePolarity {
        T::oe_polarity(self)
    }
}

/// Bit positions of the panel signals inside a memory-mapped output register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinMap {
    /// Register bit of colour data bit 0.
    pub color_base: u8,
    /// Number of colour data lines.
    pub color_width: u8,
    /// Clock bit.
    pub clock: u8,
    /// Address bits A, B, C, D.
    pub address: [u8; 4],
    /// Latch bit.
    pub latch: u8,
    /// Output-enable bit.
    pub output_enable: u8,
}

impl PinMap {
    /// Translate a canonical word to register bits.
    ///
    /// Bit positions past the register width are dropped, as are colour lines
    /// beyond the eight the word carries.
    #[must_use]
    pub fn translate(&self, word: PortWord) -> u32 {
        let color_mask = (1u32 << self.color_width.min(8)) - 1;
        let color = u32::from(word.color()) & color_mask;
        let mut out = color.checked_shl(u32::from(self.color_base)).unwrap_or(0);
        if word.clock() {
            out |= bit(self.clock);
        }
        let address = word.address();
        for (i, &pos) in self.address.iter().enumerate() {
            if (address >> i) & 1 != 0 {
                out |= bit(pos);
            }
        }
        if word.latch() {
            out |= bit(self.latch);
        }
        if word.output_enable() {
            out |= bit(self.output_enable);
        }
        out
    }

    /// Every register bit driven by the panel.
    #[must_use]
    pub fn owned_mask(&self) -> u32 {
        self.translate(PortWord(u32::MAX))
    }
}

fn bit(pos: u8) -> u32 {
    1u32.checked_shl(u32::from(pos)).unwrap_or(0)
}

impl Default for PinMap {
    /// Six colour lines on bits 0-5, CLK 6, A-C 7-9, LAT 10, OE 11, D 12.
    fn default() -> Self {
        Self {
            color_base: 0,
            color_width: 6,
            clock: 6,
            address: [7, 8, 9, 12],
            latch: 10,
            output_enable: 11,
        }
    }
}

/// Port backed by a memory-mapped GPIO output register.
#[derive(Debug)]
pub struct RegisterPort {
    reg: *mut u32,
    pins: PinMap,
    owned: u32,
    polarity: OePolarity,
    state: PortState,
}

impl RegisterPort {
    /// Take over the panel bits of the register at `reg`.
    ///
    /// The register is written immediately with a blanked panel.
    ///
    /// # Safety
    ///
    /// `reg` must be valid for volatile reads and writes for the lifetime of
    /// the port, and no other code may write the bits selected by `pins`.
    pub unsafe fn new(reg: *mut u32, pins: PinMap, polarity: OePolarity) -> Self {
        let mut port = Self {
            reg,
            pins,
            owned: pins.owned_mask(),
            polarity,
            state: PortState::new(polarity),
        };
        port.flush();
        port
    }

    fn flush(&mut self) {
        let bits = self.pins.translate(self.state.word());
        // NOTE(unsafe): validity of `reg` and exclusive ownership of `owned`
        // are guaranteed by the caller of `new`.
        unsafe {
            let current = core::ptr::read_volatile(self.reg);
            core::ptr::write_volatile(self.reg, (current & !self.owned) | bits);
        }
    }

    /// Current signal levels.
    #[must_use]
    pub const fn word(&self) -> PortWord {
        self.state.word()
    }
}

impl PanelOutputPort for RegisterPort {
    #[inline]
    fn update(&mut self, mask: u32, bits: u32) {
        self.state.update(mask, bits);
        self.flush();
    }

    fn oe_polarity(&self) -> OePolarity {
        self.polarity
    }
}

/// Port driving one `embedded-hal` output pin per signal.
///
/// `DATA` colour lines and `ADDR` address lines, all of pin type `P`. Pin
/// errors are ignored since the scan-out loop has no error path.
///
/// The address pins cannot change together. When the address changes while
/// the panel is lit, OE is dropped for the duration of the change and then
/// restored.
pub struct GpioPort<P, const DATA: usize, const ADDR: usize> {
    data: [P; DATA],
    clock: P,
    address: [P; ADDR],
    latch: P,
    output_enable: P,
    polarity: OePolarity,
    state: PortState,
}

impl<P: OutputPin, const DATA: usize, const ADDR: usize> GpioPort<P, DATA, ADDR> {
    /// Create the port and blank the panel.
    pub fn new(
        data: [P; DATA],
        clock: P,
        address: [P; ADDR],
        latch: P,
        output_enable: P,
        polarity: OePolarity,
    ) -> Self {
        let mut port = Self {
            data,
            clock,
            address,
            latch,
            output_enable,
            polarity,
            state: PortState::new(polarity),
        };
        port.write_pins(u32::MAX);
        port
    }

    /// Give the pins back.
    pub fn release(self) -> ([P; DATA], P, [P; ADDR], P, P) {
        (
            self.data,
            self.clock,
            self.address,
            self.latch,
            self.output_enable,
        )
    }

    /// Current signal levels (test-only accessor).
    #[cfg(test)]
    const fn word(&self) -> PortWord {
        self.state.word()
    }

    fn write_pins(&mut self, mask: u32) {
        let word = self.state.word();
        if mask & PortWord::COLOR_MASK != 0 {
            for (i, pin) in self.data.iter_mut().enumerate() {
                pin.set_state(PinState::from((word.color() >> i) & 1 != 0)).ok();
            }
        }
        if mask & PortWord::ADDRESS_MASK != 0 {
            for (i, pin) in self.address.iter_mut().enumerate() {
                pin.set_state(PinState::from((word.address() >> i) & 1 != 0)).ok();
            }
        }
        if mask & PortWord::LATCH_MASK != 0 {
            self.latch.set_state(PinState::from(word.latch())).ok();
        }
        if mask & PortWord::OE_MASK != 0 {
            self.output_enable
                .set_state(PinState::from(word.output_enable()))
                .ok();
        }
        // clock last, so the data is settled before a rising edge
        if mask & PortWord::CLOCK_MASK != 0 {
            self.clock.set_state(PinState::from(word.clock())).ok();
        }
    }
}

impl<P: OutputPin, const DATA: usize, const ADDR: usize> PanelOutputPort
    for GpioPort<P, DATA, ADDR>
{
    fn update(&mut self, mask: u32, bits: u32) {
        let before = self.state.word();
        self.state.update(mask, bits);
        let mut mask = mask;
        let lit = before.output_enable() == self.polarity.level(true);
        if lit && before.address() != self.state.word().address() {
            // address pins move one at a time, keep the panel dark meanwhile
            self.output_enable
                .set_state(PinState::from(self.polarity.level(false)))
                .ok();
            mask |= PortWord::OE_MASK;
        }
        self.write_pins(mask);
    }

    fn oe_polarity(&self) -> OePolarity {
        self.polarity
    }
}

impl<P, const DATA: usize, const ADDR: usize> core::fmt::Debug for GpioPort<P, DATA, ADDR> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GpioPort")
            .field("data_pins", &DATA)
            .field("address_pins", &ADDR)
            .field("polarity", &self.polarity)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Simulated port recording every word written.
#[derive(Debug, Clone)]
pub struct SimPort {
    polarity: OePolarity,
    state: PortState,
    trace: Option<Vec<PortWord>>,
    writes: usize,
}

impl SimPort {
    /// Port that keeps a trace of every word.
    #[must_use]
    pub fn new(polarity: OePolarity) -> Self {
        Self {
            polarity,
            state: PortState::new(polarity),
            trace: Some(Vec::new()),
            writes: 0,
        }
    }

    /// Port that only counts writes.
    #[must_use]
    pub fn untraced(polarity: OePolarity) -> Self {
        Self {
            trace: None,
            ..Self::new(polarity)
        }
    }

    /// Current signal levels.
    #[must_use]
    pub const fn word(&self) -> PortWord {
        self.state.word()
    }

    /// `true` if the panel is currently lit.
    #[must_use]
    pub fn is_lit(&self) -> bool {
        self.lit_in(self.word())
    }

    /// `true` if `word` lights the panel.
    #[must_use]
    pub fn lit_in(&self, word: PortWord) -> bool {
        word.output_enable() == self.polarity.level(true)
    }

    /// Recorded words, oldest first. Empty for an untraced port.
    #[must_use]
    pub fn trace(&self) -> &[PortWord] {
        self.trace.as_deref().unwrap_or(&[])
    }

    /// Forget the recorded words.
    pub fn clear_trace(&mut self) {
        if let Some(trace) = self.trace.as_mut() {
            trace.clear();
        }
    }

    /// Number of updates since creation.
    #[must_use]
    pub const fn writes(&self) -> usize {
        self.writes
    }
}

impl PanelOutputPort for SimPort {
    #[inline]
    fn update(&mut self, mask: u32, bits: u32) {
        let word = self.state.update(mask, bits);
        self.writes += 1;
        if let Some(trace) = self.trace.as_mut() {
            trace.push(word);
        }
    }

    fn oe_polarity(&self) -> OePolarity {
        self.polarity
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use core::convert::Infallible;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::vec::Vec;

    use super::*;

    #[test]
    fn test_port_word_fields() {
        let mut word = PortWord::new();
        word.set_color(0x3F);
        word.set_address(0b1010);
        word.set_latch(true);
        assert_eq!(word.bits(), 0x3F | (0b1010 << 9) | (1 << 13));
        assert!(!word.clock());
        assert!(!word.output_enable());
        assert_eq!(word.address(), 0b1010);
    }

    #[test]
    fn test_port_word_bit_isolation() {
        let mut word = PortWord::new();
        word.set_address(0xF);
        assert_eq!(word.bits(), PortWord::ADDRESS_MASK);
        word.set_address(0);
        word.set_output_enable(true);
        assert_eq!(word.bits(), PortWord::OE_MASK);
    }

    #[test]
    fn test_port_state_masked_update() {
        let mut state = PortState::new(OePolarity::ActiveLow);
        assert!(state.word().output_enable());
        state.update(PortWord::COLOR_MASK, 0xFFFF_FFFF);
        assert_eq!(state.word().color(), 0xFF);
        assert!(state.word().output_enable());
        assert!(!state.word().clock());
    }

    #[test]
    fn test_oe_polarity() {
        assert!(!OePolarity::ActiveLow.level(true));
        assert!(OePolarity::ActiveLow.level(false));
        assert!(OePolarity::ActiveHigh.level(true));
    }

    #[test]
    fn test_sim_port_operations() {
        let mut port = SimPort::new(OePolarity::ActiveLow);
        assert!(!port.is_lit());
        port.write_color(0x15);
        port.clock_high();
        assert_eq!(port.word().color(), 0x15);
        assert!(port.word().clock());
        port.set_address(3);
        port.set_output_enable(true);
        assert!(port.is_lit());
        assert!(!port.word().output_enable());
        port.idle();
        assert_eq!(port.word().color(), 0);
        assert!(!port.word().clock());
        assert_eq!(port.word().address(), 3);
        assert_eq!(port.trace().len(), 5);
        assert_eq!(port.writes(), 5);
    }

    #[test]
    fn test_safe_state() {
        let mut port = SimPort::new(OePolarity::ActiveLow);
        port.write_color(0xFF);
        port.clock_high();
        port.set_latch(true);
        port.set_address(7);
        port.set_output_enable(true);
        port.clear_trace();
        port.safe_state();
        // blanked before anything else moves
        assert!(!port.lit_in(port.trace()[0]));
        assert_eq!(port.word(), PortState::new(OePolarity::ActiveLow).word());
    }

    #[test]
    fn test_untraced_sim_port() {
        let mut port = SimPort::untraced(OePolarity::ActiveHigh);
        port.set_output_enable(true);
        assert!(port.trace().is_empty());
        assert_eq!(port.writes(), 1);
        assert!(port.word().output_enable());
    }

    #[test]
    fn test_pin_map_translate() {
        let pins = PinMap::default();
        let mut word = PortWord::new();
        word.set_color(0b10_0001);
        word.set_clock(true);
        word.set_address(0b1001);
        word.set_output_enable(true);
        assert_eq!(
            pins.translate(word),
            0b10_0001 | (1 << 6) | (1 << 7) | (1 << 12) | (1 << 11)
        );
        assert_eq!(pins.owned_mask(), 0x1FFF);
    }

    #[test]
    fn test_pin_map_out_of_range_bits() {
        let pins = PinMap {
            color_base: 28,
            color_width: 40,
            clock: 33,
            address: [0, 1, 32, 255],
            latch: 31,
            output_enable: 64,
        };
        let mut word = PortWord::new();
        word.set_color(0xFF);
        word.set_clock(true);
        word.set_address(0xF);
        word.set_latch(true);
        word.set_output_enable(true);
        // colour keeps its low four bits, the rest falls off the register
        assert_eq!(pins.translate(word), 0xF000_0000 | 0b11 | (1 << 31));
        assert_eq!(pins.owned_mask(), 0xF000_0000 | 0b11 | (1 << 31));

        let wide = PinMap {
            color_base: 0,
            color_width: 40,
            ..PinMap::default()
        };
        word.set_color(0xFF);
        assert_eq!(wide.translate(word) & 0xFF, 0xFF);
    }

    #[test]
    fn test_register_port_preserves_foreign_bits() {
        let mut reg: u32 = 0xABCD_0000;
        let ptr = core::ptr::addr_of_mut!(reg);
        let mut port = unsafe { RegisterPort::new(ptr, PinMap::default(), OePolarity::ActiveLow) };
        assert_eq!(unsafe { ptr.read_volatile() }, 0xABCD_0000 | (1 << 11));

        port.set_address(5);
        port.set_output_enable(true);
        assert_eq!(unsafe { ptr.read_volatile() }, 0xABCD_0000 | (1 << 7) | (1 << 9));

        unsafe { ptr.write_volatile(ptr.read_volatile() | 0x8000) };
        port.write_color(0x3F);
        assert_eq!(
            unsafe { ptr.read_volatile() },
            0xABCD_8000 | 0x3F | (1 << 7) | (1 << 9)
        );
        assert_eq!(port.word().color(), 0x3F);
    }

    /// Level and, for watched pins, the OE level seen at each write.
    #[derive(Clone, Default)]
    struct MockPin(Rc<Cell<bool>>, Option<OeWatch>);

    type OeWatch = (Rc<Cell<bool>>, Rc<RefCell<Vec<bool>>>);

    impl MockPin {
        fn watching(oe: &MockPin, log: &Rc<RefCell<Vec<bool>>>) -> Self {
            Self(Rc::default(), Some((oe.0.clone(), log.clone())))
        }

        fn set(&self, level: bool) {
            if let Some((oe, log)) = &self.1 {
                log.borrow_mut().push(oe.get());
            }
            self.0.set(level);
        }
    }

    impl embedded_hal::digital::ErrorType for MockPin {
        type Error = Infallible;
    }

    impl OutputPin for MockPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.set(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.set(true);
            Ok(())
        }
    }

    #[test]
    fn test_gpio_port() {
        let data: [MockPin; 6] = Default::default();
        let address: [MockPin; 3] = Default::default();
        let (clock, latch, oe) = (MockPin::default(), MockPin::default(), MockPin::default());
        let mut port = GpioPort::new(
            data.clone(),
            clock.clone(),
            address.clone(),
            latch.clone(),
            oe.clone(),
            OePolarity::ActiveLow,
        );
        assert!(oe.0.get());

        port.write_color(0b00_0101);
        port.clock_high();
        assert!(data[0].0.get());
        assert!(!data[1].0.get());
        assert!(data[2].0.get());
        assert!(clock.0.get());

        port.set_address(0b110);
        assert!(!address[0].0.get());
        assert!(address[1].0.get());
        assert!(address[2].0.get());

        port.set_latch(true);
        port.set_output_enable(true);
        assert!(latch.0.get());
        assert!(!oe.0.get());

        port.safe_state();
        assert!(oe.0.get());
        assert!(!latch.0.get());
        assert!(!clock.0.get());
        assert!(!address[1].0.get());
        let (_, _, _, _, _) = port.release();
    }

    #[test]
    fn test_gpio_address_change_is_blanked() {
        let oe = MockPin::default();
        let log = Rc::new(RefCell::new(Vec::new()));
        let address: [MockPin; 4] = core::array::from_fn(|_| MockPin::watching(&oe, &log));
        let data: [MockPin; 2] = Default::default();
        let mut port = GpioPort::new(
            data,
            MockPin::default(),
            address.clone(),
            MockPin::default(),
            oe.clone(),
            OePolarity::ActiveLow,
        );
        port.set_output_enable(true);
        assert!(!oe.0.get());
        log.borrow_mut().clear();

        port.set_address(0b1011);
        // active low: every address pin moved with OE high
        assert_eq!(log.borrow().len(), 4);
        assert!(log.borrow().iter().all(|&oe_level| oe_level));
        assert!(!oe.0.get());
        assert!(address[3].0.get());
        assert!(!address[2].0.get());

        // unchanged address leaves OE alone
        log.borrow_mut().clear();
        port.set_address(0b1011);
        assert!(log.borrow().iter().all(|&oe_level| !oe_level));

        // blanked panel: nothing to hide
        port.set_output_enable(false);
        port.set_address(0);
        assert!(oe.0.get());
        assert_eq!(port.word().address(), 0);
    }
}
