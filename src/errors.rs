use embedded_storage::nor_flash::NorFlashErrorKind;
use thiserror_no_std::Error;

/// Failures at the edges of the crate. The estimation core itself never errors: bad pulses are
/// dropped and a silent sensor reads as zero.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TachError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("JSON encoding failed, the output buffer is probably too small")]
    Serialize(),
    #[error("Fixed capacity text buffer overflowed")]
    BufferOverflow(),
    #[error("Malformed HTTP request")]
    MalformedRequest(),
    #[error("Unsupported HTTP method")]
    UnsupportedMethod(),
    #[error("Settings flash error: {0:?}")]
    Flash(NorFlashErrorKind),
    #[error("Settings record does not fit the flash read/write/erase granularity")]
    FlashAlignment(),
}

impl From<serde_json_core::ser::Error> for TachError {
    fn from(_: serde_json_core::ser::Error) -> Self {
        TachError::Serialize()
    }
}

impl From<core::fmt::Error> for TachError {
    fn from(_: core::fmt::Error) -> Self {
        TachError::BufferOverflow()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TachError {
    fn format(&self, f: defmt::Formatter<'_>) {
        match self {
            TachError::InvalidConfig(reason) => defmt::write!(f, "InvalidConfig({=str})", reason),
            TachError::Serialize() => defmt::write!(f, "Serialize"),
            TachError::BufferOverflow() => defmt::write!(f, "BufferOverflow"),
            TachError::MalformedRequest() => defmt::write!(f, "MalformedRequest"),
            TachError::UnsupportedMethod() => defmt::write!(f, "UnsupportedMethod"),
            TachError::Flash(kind) => defmt::write!(f, "Flash({})", defmt::Debug2Format(kind)),
            TachError::FlashAlignment() => defmt::write!(f, "FlashAlignment"),
        }
    }
}
