//! Panel chain topology.
//!
//! Several panels are daisy-chained so that one shift-register stream feeds
//! all of them. The packer has to emit bytes in chain order, which depends on
//! how the panels were physically wired:
//! - [`Topology::HorizontalFirst`] walks a row of panels left to right, then
//!   moves down to the next row of panels.
//! - [`Topology::VerticalFirst`] walks a column of panels top to bottom, then
//!   moves right to the next column.
//!
//! [`PanelChain`] turns a chain position into the pixel origin of the panel
//! sitting there, so a packer can visit panels in wire order and read the
//! matching region of the framebuffer.

use crate::config::PanelGeometry;

/// Order in which chained panels are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Topology {
    /// Rows of panels first, then the next row down.
    #[default]
    HorizontalFirst,
    /// Columns of panels first, then the next column to the right.
    VerticalFirst,
}

/// Maps chain positions to panel locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PanelChain {
    topology: Topology,
    panels_wide: usize,
    panels_high: usize,
    panel_width: usize,
    panel_height: usize,
}

impl PanelChain {
    /// Chain for the given geometry.
    #[must_use]
    pub const fn new(geometry: &PanelGeometry) -> Self {
        Self {
            topology: geometry.topology,
            panels_wide: geometry.panels_wide,
            panels_high: geometry.panels_high,
            panel_width: geometry.panel_width,
            panel_height: geometry.panel_height,
        }
    }

    /// Number of panels in the chain.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.panels_wide * self.panels_high
    }

    /// `true` if the chain has no panels.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Panel grid position `(column, row)` of chain position `index`.
    #[must_use]
    pub const fn panel_position(&self, index: usize) -> (usize, usize) {
        match self.topology {
            Topology::HorizontalFirst => (index % self.panels_wide, index / self.panels_wide),
            Topology::VerticalFirst => (index / self.panels_high, index % self.panels_high),
        }
    }

    /// Top-left pixel of the panel at chain position `index`.
    #[must_use]
    pub const fn panel_origin(&self, index: usize) -> (usize, usize) {
        let (column, row) = self.panel_position(index);
        (column * self.panel_width, row * self.panel_height)
    }

    /// Panel origins in wire order.
    pub fn origins(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.len()).map(|index| self.panel_origin(index))
    }
}
