//! Matroska-specific error types.

use thiserror::Error;

/// Matroska metadata parsing errors.
#[derive(Error, Debug)]
pub enum MkvError {
    /// Invalid EBML header.
    #[error("Invalid EBML header: {0}")]
    InvalidEbmlHeader(String),

    /// Invalid element ID (no marker bit within the first four bits).
    #[error("Invalid element ID encoding")]
    InvalidElementId,

    /// Invalid variable-length integer.
    #[error("Invalid VINT encoding")]
    InvalidVint,

    /// The element declared the "unknown size" sentinel, which this parser
    /// does not support.
    #[error("Element with unknown size is not supported")]
    UnknownSize,

    /// Fixed-width integer field wider than 8 bytes.
    #[error("Integer field of {len} bytes exceeds 8-byte limit")]
    IntegerTooWide {
        /// Declared field length in bytes.
        len: u64,
    },

    /// The expected element was not found at the given position.
    #[error("Unexpected element: expected 0x{expected:08X}, found 0x{found:08X}")]
    UnexpectedElement {
        /// The element ID that was expected.
        expected: u32,
        /// The element ID that was found.
        found: u32,
    },

    /// Missing required element.
    #[error("Missing required element: {0}")]
    MissingElement(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl From<String> for MkvError {
    fn from(s: String) -> Self {
        MkvError::Other(s)
    }
}

impl From<&str> for MkvError {
    fn from(s: &str) -> Self {
        MkvError::Other(s.to_string())
    }
}

/// Result type for Matroska metadata operations.
pub type Result<T> = std::result::Result<T, MkvError>;

/// Convert MkvError to linkplay_core::Error.
impl From<MkvError> for linkplay_core::Error {
    fn from(err: MkvError) -> Self {
        use linkplay_core::ContainerError;
        match err {
            MkvError::Io(e) => linkplay_core::Error::Io(e),
            MkvError::InvalidEbmlHeader(msg) => {
                linkplay_core::Error::Container(ContainerError::InvalidStructure(msg))
            }
            MkvError::MissingElement(name) => {
                linkplay_core::Error::Container(ContainerError::MissingElement(name))
            }
            _ => linkplay_core::Error::Container(ContainerError::Other(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MkvError::IntegerTooWide { len: 12 };
        assert_eq!(err.to_string(), "Integer field of 12 bytes exceeds 8-byte limit");
    }

    #[test]
    fn test_conversion_to_core_error() {
        let err: linkplay_core::Error = MkvError::MissingElement("Info".into()).into();
        assert!(matches!(
            err,
            linkplay_core::Error::Container(linkplay_core::ContainerError::MissingElement(_))
        ));
    }
}
