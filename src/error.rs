//! Error types.
//!
//! The scan-out loop itself has no error path; these are only returned from
//! setup operations (buffer allocation, mode changes, mode string parsing).

/// Why a mode string was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModeError {
    /// The string has no `<xres>x<yres>` part.
    MissingResolution,
    /// A numeric field is empty or not a decimal number.
    InvalidNumber,
}

impl core::fmt::Display for ModeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MissingResolution => f.write_str("mode string has no <xres>x<yres> part"),
            Self::InvalidNumber => f.write_str("mode string contains an invalid number"),
        }
    }
}

impl core::error::Error for ModeError {}

/// Errors returned by buffer allocation and mode changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A pixel or bit-plane buffer could not be allocated.
    OutOfMemory {
        /// Size of the failed allocation in bytes.
        bytes: usize,
    },
    /// A mode string could not be parsed.
    Mode(ModeError),
}

impl From<ModeError> for Error {
    fn from(err: ModeError) -> Self {
        Self::Mode(err)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::OutOfMemory { bytes } => write!(f, "unable to allocate {bytes} bytes"),
            Self::Mode(err) => write!(f, "invalid mode: {err}"),
        }
    }
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Mode(err) => Some(err),
            Self::OutOfMemory { .. } => None,
        }
    }
}

/// Allocate a zeroed byte vector, reporting failure instead of aborting.
pub(crate) fn try_alloc_zeroed(bytes: usize) -> Result<alloc::vec::Vec<u8>, Error> {
    let mut data = alloc::vec::Vec::new();
    data.try_reserve_exact(bytes)
        .map_err(|_| Error::OutOfMemory { bytes })?;
    data.resize(bytes, 0);
    Ok(data)
}
