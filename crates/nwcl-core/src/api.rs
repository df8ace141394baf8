//! The blocking native compute API consumed by nwcl.
//!
//! Every call blocks the calling thread and reports a [`Status`]. Variable
//! length outputs follow the two-phase convention: pass `None` for the output
//! buffer to learn the required size, then call again with a buffer of exactly
//! that size (see [`crate::query`]).

use std::fmt;

use crate::handle::{DeviceId, PlatformId};
use crate::status::Status;

/// Device type bitfield used to filter device enumeration.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceType(u64);

impl DeviceType {
    pub const DEFAULT: DeviceType = DeviceType(1 << 0);
    pub const CPU: DeviceType = DeviceType(1 << 1);
    pub const GPU: DeviceType = DeviceType(1 << 2);
    pub const ACCELERATOR: DeviceType = DeviceType(1 << 3);
    pub const CUSTOM: DeviceType = DeviceType(1 << 4);
    pub const ALL: DeviceType = DeviceType(0xFFFF_FFFF);

    /// Named device types, in export order.
    pub const NAMED: [(&'static str, DeviceType); 6] = [
        ("CPU", Self::CPU),
        ("GPU", Self::GPU),
        ("ACCELERATOR", Self::ACCELERATOR),
        ("CUSTOM", Self::CUSTOM),
        ("DEFAULT", Self::DEFAULT),
        ("ALL", Self::ALL),
    ];

    pub const fn from_bits(bits: u64) -> Self {
        DeviceType(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    /// True if any bit of `other` is set in `self`.
    pub const fn intersects(self, other: DeviceType) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for DeviceType {
    fn default() -> Self {
        Self::ALL
    }
}

impl fmt::Debug for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Self::NAMED.iter().find(|(_, ty)| *ty == *self) {
            Some((name, _)) => write!(f, "DeviceType({})", name),
            None => write!(f, "DeviceType({:#x})", self.0),
        }
    }
}

/// Blocking native compute API.
///
/// Implementations must be callable from any thread; nwcl calls them from the
/// control thread on synchronous paths and from worker threads on asynchronous
/// ones.
pub trait ComputeApi: Send + Sync + 'static {
    /// Enumerate platforms.
    ///
    /// With `platforms = None`, only `num_platforms` is written.
    fn get_platform_ids(
        &self,
        platforms: Option<&mut [PlatformId]>,
        num_platforms: Option<&mut u32>,
    ) -> Status;

    /// Query a platform attribute.
    fn get_platform_info(
        &self,
        platform: PlatformId,
        param: u32,
        value: Option<&mut [u8]>,
        size_ret: Option<&mut usize>,
    ) -> Status;

    /// Enumerate devices of `platform` matching `device_type`.
    fn get_device_ids(
        &self,
        platform: Option<PlatformId>,
        device_type: DeviceType,
        devices: Option<&mut [DeviceId]>,
        num_devices: Option<&mut u32>,
    ) -> Status;

    /// Query a device attribute.
    fn get_device_info(
        &self,
        device: DeviceId,
        param: u32,
        value: Option<&mut [u8]>,
        size_ret: Option<&mut usize>,
    ) -> Status;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_type_bits() {
        assert!(DeviceType::ALL.intersects(DeviceType::GPU));
        assert!(!DeviceType::CPU.intersects(DeviceType::GPU));
        assert_eq!(format!("{:?}", DeviceType::GPU), "DeviceType(GPU)");
        assert_eq!(format!("{:?}", DeviceType::from_bits(0x6)), "DeviceType(0x6)");
    }
}
