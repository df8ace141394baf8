//! Error types shared by every nwcl crate.

use thiserror::Error;

use crate::status::Status;

/// Result type alias for nwcl operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A non-success native status, with its looked-up message.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{message}")]
pub struct NativeError {
    status: Status,
    message: &'static str,
}

impl NativeError {
    pub fn new(status: Status) -> Self {
        NativeError {
            status,
            message: status.message(),
        }
    }

    /// The native status code.
    pub fn status(&self) -> Status {
        self.status
    }

    pub fn message(&self) -> &'static str {
        self.message
    }
}

impl From<Status> for NativeError {
    fn from(status: Status) -> Self {
        NativeError::new(status)
    }
}

/// Misuse of the host-facing API, detected before any native call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    /// Direct construction of a wrapper class from the host.
    #[error("Illegal constructor")]
    IllegalConstructor { class: &'static str },

    /// A required argument was not supplied.
    #[error("{0}")]
    MissingArgument(&'static str),

    /// An argument had the wrong host type.
    #[error("{0}")]
    WrongType(&'static str),
}

/// An exception raised by host code while running a completion callback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct HostException {
    message: String,
}

impl HostException {
    pub fn new(message: impl Into<String>) -> Self {
        HostException {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Top-level nwcl error.
#[derive(Error, Debug)]
pub enum Error {
    /// The native layer reported a failure status.
    #[error(transparent)]
    Native(#[from] NativeError),

    /// The host called the API incorrectly.
    #[error(transparent)]
    Usage(#[from] UsageError),

    /// An info buffer did not have the width its key requires.
    #[error("info key {key:#06x} returned {actual} bytes, expected {expected}")]
    Decode {
        key: u32,
        expected: usize,
        actual: usize,
    },

    /// Configuration could not be parsed or was out of range.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O error, e.g. while building the control loop runtime.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a native error from a raw status.
    pub fn native(status: Status) -> Self {
        Error::Native(NativeError::new(status))
    }

    /// Native status carried by this error, if any.
    pub fn status(&self) -> Option<Status> {
        match self {
            Error::Native(e) => Some(e.status()),
            _ => None,
        }
    }

    pub fn is_usage(&self) -> bool {
        matches!(self, Error::Usage(_))
    }

    /// Error category for logs.
    pub fn category(&self) -> &'static str {
        match self {
            Error::Native(_) => "native",
            Error::Usage(_) => "usage",
            Error::Decode { .. } => "decode",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
        }
    }
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        Error::native(status)
    }
}
