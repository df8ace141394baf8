//! Native status codes and the fixed status → message table.

use std::fmt;

use crate::error::NativeError;

/// Status code returned by every native call.
///
/// The value space is the native API's signed 32-bit enumeration; codes this
/// crate does not know about are carried through unchanged and render as
/// "Unknown error".
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(i32);

impl Status {
    pub const SUCCESS: Status = Status(0);
    pub const DEVICE_NOT_FOUND: Status = Status(-1);
    pub const DEVICE_NOT_AVAILABLE: Status = Status(-2);
    pub const OUT_OF_RESOURCES: Status = Status(-5);
    pub const OUT_OF_HOST_MEMORY: Status = Status(-6);
    pub const INVALID_VALUE: Status = Status(-30);
    pub const INVALID_DEVICE_TYPE: Status = Status(-31);
    pub const INVALID_PLATFORM: Status = Status(-32);
    pub const INVALID_DEVICE: Status = Status(-33);
    pub const PLATFORM_NOT_FOUND_KHR: Status = Status(-1001);

    /// Reported when the native call panicked on its worker thread.
    ///
    /// Lies outside the native enumeration so it never collides with a
    /// vendor code.
    pub const WORKER_ABORTED: Status = Status(-9999);

    /// Wrap a raw status code received from the native layer.
    pub const fn from_raw(code: i32) -> Self {
        Status(code)
    }

    /// Raw status code.
    pub const fn code(self) -> i32 {
        self.0
    }

    pub const fn is_success(self) -> bool {
        self.0 == Self::SUCCESS.0
    }

    /// "Nothing matched" statuses are benign: enumeration yields an empty list.
    pub const fn is_not_found(self) -> bool {
        self.0 == Self::DEVICE_NOT_FOUND.0 || self.0 == Self::PLATFORM_NOT_FOUND_KHR.0
    }

    /// Convert to a `Result`, keeping the raw status as the error.
    pub fn into_result(self) -> Result<(), Status> {
        if self.is_success() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Like [`Status::into_result`] but produces the host-facing error type.
    pub fn check(self) -> Result<(), NativeError> {
        self.into_result().map_err(NativeError::from)
    }

    /// Message shown to the host for this status.
    pub fn message(self) -> &'static str {
        match self {
            Self::SUCCESS => "Success",
            Self::DEVICE_NOT_FOUND => "Device not found",
            Self::PLATFORM_NOT_FOUND_KHR => "Platform not found",
            Self::INVALID_PLATFORM | Self::INVALID_DEVICE => "Invalid platform/device handle",
            Self::INVALID_VALUE => "Invalid parameter enum",
            Self::INVALID_DEVICE_TYPE => "Invalid device type",
            Self::OUT_OF_RESOURCES => "Out of device resources",
            Self::OUT_OF_HOST_MEMORY => "Out of host memory",
            Self::DEVICE_NOT_AVAILABLE => "Device not available",
            Self::WORKER_ABORTED => "Native call aborted on worker thread",
            _ => "Unknown error",
        }
    }

    /// Symbolic name, used in logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::SUCCESS => "SUCCESS",
            Self::DEVICE_NOT_FOUND => "DEVICE_NOT_FOUND",
            Self::DEVICE_NOT_AVAILABLE => "DEVICE_NOT_AVAILABLE",
            Self::OUT_OF_RESOURCES => "OUT_OF_RESOURCES",
            Self::OUT_OF_HOST_MEMORY => "OUT_OF_HOST_MEMORY",
            Self::INVALID_VALUE => "INVALID_VALUE",
            Self::INVALID_DEVICE_TYPE => "INVALID_DEVICE_TYPE",
            Self::INVALID_PLATFORM => "INVALID_PLATFORM",
            Self::INVALID_DEVICE => "INVALID_DEVICE",
            Self::PLATFORM_NOT_FOUND_KHR => "PLATFORM_NOT_FOUND_KHR",
            Self::WORKER_ABORTED => "WORKER_ABORTED",
            _ => "UNKNOWN",
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::SUCCESS
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Status({} {})", self.name(), self.0)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.0)
    }
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        Status(code)
    }
}
