//! Error types for IMAQdx operations.
//!
//! Native driver calls report an `IMAQdxError` status: zero is success, a
//! negative value is an error and a positive value is a warning. Errors are
//! turned into [`Error::Driver`] carrying the driver's own message text.

use std::fmt;
use thiserror::Error;

/// Result type alias for IMAQdx operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Base value of the IMAQdx error range.
const ERROR_BASE: u32 = 0xBFF6_9000;

/// Fallback text when the driver cannot describe its own status code.
pub(crate) const UNKNOWN_DRIVER_MESSAGE: &str = "Unable to get error message from driver.";

/// Errors that can occur when working with IMAQdx cameras.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The driver returned a negative status.
    #[error("IMAQdx error {code}: {message}")]
    Driver { code: ErrorCode, message: String },

    /// The native driver library could not be loaded or is missing a symbol.
    #[error("Failed to load IMAQdx driver library: {0}")]
    LibraryLoad(String),

    /// The session has been closed or dropped.
    #[error("The IMAQdx session has been closed.")]
    SessionClosed,

    /// An argument failed validation before reaching the driver.
    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    /// Positional lookup outside of a collection.
    #[error("Index {index} is out of range for a collection of {len} elements.")]
    IndexOutOfRange { index: usize, len: usize },

    /// Command attributes can be executed but not read.
    #[error("Command attributes are not readable.")]
    CommandNotReadable,

    /// A value of the wrong type was used with an attribute.
    #[error("Attribute '{name}' is of type {expected}, got a {actual} value.")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// The driver reported a data type this crate does not know.
    #[error("Unknown IMAQdx data type {0}.")]
    UnknownDataType(i32),

    /// [`add_private_attribute`](crate::AttributeCollection::add_private_attribute)
    /// could not find the requested name.
    #[error("The private IMAQdx attribute '{0}' does not exist.")]
    NonexistentPrivateAttribute(String),

    /// A frame could not be converted into an image.
    #[error("Unsupported pixel format '{0}'.")]
    UnsupportedPixelFormat(String),

    /// The worker thread for an asynchronous operation could not be started.
    #[error("Failed to start worker thread: {0}")]
    Worker(String),

    /// A configuration file could not be read or contained a bad value.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build an [`Error::Driver`] from a raw status and the driver's message.
    pub fn from_status(status: i32, message: impl Into<String>) -> Self {
        Error::Driver {
            code: ErrorCode::from(status),
            message: message.into(),
        }
    }

    /// The driver status code, if this error came from the driver.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Error::Driver { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub(crate) fn empty(name: &'static str) -> Self {
        Error::InvalidArgument {
            name,
            reason: "must not be empty".to_string(),
        }
    }

    pub(crate) fn not_positive(name: &'static str) -> Self {
        Error::InvalidArgument {
            name,
            reason: "must be greater than zero".to_string(),
        }
    }
}

impl From<Error> for cameraunit::Error {
    fn from(err: Error) -> Self {
        cameraunit::Error::GeneralError(err.to_string())
    }
}

/// Status codes documented by the IMAQdx driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    SystemMemoryFull,
    Internal,
    InvalidParameter,
    InvalidPointer,
    InvalidInterface,
    InvalidRegistryKey,
    InvalidAddress,
    InvalidDeviceType,
    NotImplemented,
    CameraNotFound,
    CameraInUse,
    CameraNotInitialized,
    CameraRemoved,
    CameraRunning,
    CameraNotRunning,
    AttributeNotSupported,
    AttributeNotSettable,
    AttributeNotReadable,
    AttributeOutOfRange,
    BufferNotAvailable,
    BufferListEmpty,
    BufferListLocked,
    BufferListNotLocked,
    ResourcesAllocated,
    ResourcesUnavailable,
    AsyncWrite,
    AsyncRead,
    Timeout,
    /// Any status outside the table above.
    Other(i32),
}

const KNOWN_CODES: [ErrorCode; 28] = [
    ErrorCode::SystemMemoryFull,
    ErrorCode::Internal,
    ErrorCode::InvalidParameter,
    ErrorCode::InvalidPointer,
    ErrorCode::InvalidInterface,
    ErrorCode::InvalidRegistryKey,
    ErrorCode::InvalidAddress,
    ErrorCode::InvalidDeviceType,
    ErrorCode::NotImplemented,
    ErrorCode::CameraNotFound,
    ErrorCode::CameraInUse,
    ErrorCode::CameraNotInitialized,
    ErrorCode::CameraRemoved,
    ErrorCode::CameraRunning,
    ErrorCode::CameraNotRunning,
    ErrorCode::AttributeNotSupported,
    ErrorCode::AttributeNotSettable,
    ErrorCode::AttributeNotReadable,
    ErrorCode::AttributeOutOfRange,
    ErrorCode::BufferNotAvailable,
    ErrorCode::BufferListEmpty,
    ErrorCode::BufferListLocked,
    ErrorCode::BufferListNotLocked,
    ErrorCode::ResourcesAllocated,
    ErrorCode::ResourcesUnavailable,
    ErrorCode::AsyncWrite,
    ErrorCode::AsyncRead,
    ErrorCode::Timeout,
];

impl ErrorCode {
    /// The raw `IMAQdxError` value.
    pub fn status(self) -> i32 {
        match self {
            ErrorCode::Other(status) => status,
            known => {
                let offset = KNOWN_CODES
                    .iter()
                    .position(|c| *c == known)
                    .unwrap_or_default() as u32;
                (ERROR_BASE + offset) as i32
            }
        }
    }
}

impl From<i32> for ErrorCode {
    fn from(status: i32) -> Self {
        let offset = (status as u32).wrapping_sub(ERROR_BASE) as usize;
        KNOWN_CODES
            .get(offset)
            .copied()
            .unwrap_or(ErrorCode::Other(status))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Other(status) => write!(f, "0x{:08X}", *status as u32),
            known => write!(f, "{:?} (0x{:08X})", known, known.status() as u32),
        }
    }
}
