use core::fmt;

use crate::transport::TransportError;

/// Why a region was rejected before anything was queued.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegionError {
    /// Width or height is zero.
    EmptyDimension,
    /// `x + width - 1` or `y + height - 1` does not fit the 16-bit address field.
    CoordinateOverflow,
    /// Pixel buffer length differs from `width * height`.
    LengthMismatch { expected: usize, actual: usize },
}

impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionError::EmptyDimension => f.write_str("zero width or height"),
            RegionError::CoordinateOverflow => f.write_str("window end exceeds 16-bit address"),
            RegionError::LengthMismatch { expected, actual } => {
                write!(f, "buffer holds {} pixels, region needs {}", actual, expected)
            }
        }
    }
}

/// Errors of the queued drawing path. Transport errors are fatal for the
/// session: the controller's window state is unknown afterwards.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DisplayError {
    /// Transaction `index` of a draw was refused; earlier ones may be queued.
    Submission { index: usize, source: TransportError },
    /// Fetching a completed transaction failed.
    Retrieval(TransportError),
    /// Region rejected, nothing was queued.
    InvalidRegion(RegionError),
}

impl From<RegionError> for DisplayError {
    fn from(e: RegionError) -> Self {
        Self::InvalidRegion(e)
    }
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayError::Submission { index, source } => {
                write!(f, "submission of transaction {} failed: {}", index, source)
            }
            DisplayError::Retrieval(e) => write!(f, "completion retrieval failed: {}", e),
            DisplayError::InvalidRegion(e) => write!(f, "invalid region: {}", e),
        }
    }
}

/// Error type that wraps SPI and GPIO errors of the synchronous init path.
#[derive(Debug)]
pub enum InitError<SpiE, GpioE> {
    Spi(SpiE),
    Gpio(GpioE),
}

impl<SpiE: fmt::Debug, GpioE: fmt::Debug> fmt::Display for InitError<SpiE, GpioE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::Spi(e) => write!(f, "init spi error: {:?}", e),
            InitError::Gpio(e) => write!(f, "init gpio error: {:?}", e),
        }
    }
}
