//! Error types for the Wanderer Rotator SDK

use thiserror::Error;

/// Discrete error kinds exposed at the API boundary.
///
/// Every [`RotatorError`] maps onto exactly one kind. The numeric codes are
/// stable and follow the vendor SDK numbering (0 is success).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Device id is unknown to the registry
    InvalidId,
    /// One or more parameters are out of range
    InvalidParameter,
    /// Device is not in the right state for the call
    InvalidState,
    /// Transport or protocol failure
    Communication,
    /// A required argument was missing
    ///
    /// Never raised by this crate: references cannot be null. Kept so the
    /// numeric codes line up with the vendor SDK.
    NullInput,
}

impl ErrorKind {
    /// Numeric code of this kind
    pub fn code(self) -> u32 {
        match self {
            ErrorKind::InvalidId => 1,
            ErrorKind::InvalidParameter => 2,
            ErrorKind::InvalidState => 3,
            ErrorKind::Communication => 4,
            ErrorKind::NullInput => 5,
        }
    }

    /// Short name for logs and CLI output
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidId => "invalid-id",
            ErrorKind::InvalidParameter => "invalid-parameter",
            ErrorKind::InvalidState => "invalid-state",
            ErrorKind::Communication => "communication",
            ErrorKind::NullInput => "null-input",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core error type for rotator operations
#[derive(Error, Debug)]
pub enum RotatorError {
    /// Unknown device identifier
    #[error("Invalid device id: {0}")]
    InvalidId(u32),

    /// Invalid input or arguments
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Device is not ready for the requested operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Serial port errors
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Transport has no open port
    #[error("Port not open: {0}")]
    NotOpen(String),

    /// A framed read expired before a usable field arrived
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// A response field did not match the expected grammar
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The handshake probe never saw the device marker
    #[error("Handshake failed after {attempts} attempts")]
    HandshakeFailed { attempts: u32 },

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for rotator operations
pub type Result<T> = std::result::Result<T, RotatorError>;

impl RotatorError {
    /// Classify this error into its API-level kind.
    ///
    /// Transport and codec failures all surface as [`ErrorKind::Communication`].
    /// Configuration file problems are reported as invalid parameters.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RotatorError::InvalidId(_) => ErrorKind::InvalidId,
            RotatorError::InvalidParameter(_) | RotatorError::Config(_) => {
                ErrorKind::InvalidParameter
            }
            RotatorError::InvalidState(_) => ErrorKind::InvalidState,
            RotatorError::Serial(_)
            | RotatorError::NotOpen(_)
            | RotatorError::Timeout(_)
            | RotatorError::Protocol(_)
            | RotatorError::HandshakeFailed { .. }
            | RotatorError::Io(_) => ErrorKind::Communication,
        }
    }

    /// Shorthand for `kind() == ErrorKind::Communication`
    pub fn is_communication(&self) -> bool {
        self.kind() == ErrorKind::Communication
    }
}

impl From<toml::de::Error> for RotatorError {
    fn from(err: toml::de::Error) -> Self {
        RotatorError::Config(err.to_string())
    }
}
