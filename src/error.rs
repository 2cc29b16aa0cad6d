use std::fmt;

use thiserror::Error;

/// I/O errors that can occur when reading or writing slide files
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Error reported by the operating system
    #[error("I/O error on {path}: {message}")]
    Os { path: String, message: String },

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// File or directory not found
    #[error("Not found: {0}")]
    NotFound(String),
}

impl IoError {
    /// Wrap a `std::io::Error` together with the path it occurred on.
    pub fn from_std(path: impl fmt::Display, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            IoError::NotFound(path.to_string())
        } else {
            IoError::Os {
                path: path.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Errors related to reading a vendor container
#[derive(Debug, Clone, Error)]
pub enum FormatError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// TIFF parsing error
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// File format is not supported
    #[error("Unsupported format: {reason}")]
    UnsupportedFormat { reason: String },

    /// Vendor structure is present but inconsistent
    #[error("Malformed {vendor} container: {reason}")]
    Malformed {
        vendor: &'static str,
        reason: String,
    },
}

impl FormatError {
    pub(crate) fn malformed(vendor: &'static str, reason: impl Into<String>) -> Self {
        FormatError::Malformed {
            vendor,
            reason: reason.into(),
        }
    }
}

/// Errors that can occur when parsing TIFF files
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// IFD chain links back to a directory that was already visited
    #[error("IFD chain contains a cycle at offset {0}")]
    DirectoryCycle(u64),

    /// IFD chain is longer than the parser accepts
    #[error("IFD chain exceeds {0} directories")]
    TooManyDirectories(usize),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Unknown field type in IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),
}

// =============================================================================
// Anonymization Errors
// =============================================================================

/// Failure code returned across the external interface for every failure kind.
pub const FAILURE_CODE: i32 = -1;

/// Coarse classification of an anonymization failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// File missing or unreadable
    InvalidInput,
    /// File readable but not a known vendor format
    UnsupportedFormat,
    /// Directory chain truncated, cyclic or out of bounds
    MalformedContainer,
    /// Output could not be written
    WriteFailure,
}

/// Errors returned by the anonymization engine.
#[derive(Debug, Clone, Error)]
pub enum AnonymizeError {
    /// The source path could not be opened or read
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The source file does not match any supported vendor
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The container could not be parsed or is internally inconsistent
    #[error("Malformed container: {0}")]
    MalformedContainer(#[from] FormatError),

    /// Writing the output failed
    #[error("Write failure: {0}")]
    WriteFailure(#[from] IoError),

    /// The request itself is unusable (bad label, missing extension)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl AnonymizeError {
    /// Classify this error into the engine's failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnonymizeError::InvalidInput(_) | AnonymizeError::InvalidRequest(_) => {
                ErrorKind::InvalidInput
            }
            AnonymizeError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            AnonymizeError::MalformedContainer(_) => ErrorKind::MalformedContainer,
            AnonymizeError::WriteFailure(_) => ErrorKind::WriteFailure,
        }
    }

    /// Numeric failure code for callers that only understand integers.
    #[inline]
    pub const fn code(&self) -> i32 {
        FAILURE_CODE
    }
}

impl From<TiffError> for AnonymizeError {
    fn from(err: TiffError) -> Self {
        AnonymizeError::MalformedContainer(FormatError::Tiff(err))
    }
}
