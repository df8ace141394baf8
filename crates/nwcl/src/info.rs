//! Info keys and decoding of info buffers.
//!
//! Info queries return raw bytes. The key decides how they are read: text is
//! NUL-terminated, scalars are native-endian and must have exactly the width
//! of their type. Keys nwcl does not know are returned as raw bytes.

use nwcl_core::{DeviceType, Error, Result};

use crate::platform::Platform;

/// How an info buffer is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoKind {
    Text,
    UInt,
    ULong,
    Size,
    Bool,
    DeviceType,
    Platform,
    Raw,
}

/// A decoded info value.
#[derive(Debug, Clone, PartialEq)]
pub enum InfoValue {
    Text(String),
    UInt(u32),
    ULong(u64),
    Size(usize),
    Bool(bool),
    DeviceType(DeviceType),
    Platform(Platform),
    Bytes(Vec<u8>),
}

impl InfoValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            InfoValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric value, widened.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            InfoValue::UInt(v) => Some(u64::from(*v)),
            InfoValue::ULong(v) => Some(*v),
            InfoValue::Size(v) => Some(*v as u64),
            InfoValue::DeviceType(t) => Some(t.bits()),
            _ => None,
        }
    }

    pub fn as_platform(&self) -> Option<&Platform> {
        match self {
            InfoValue::Platform(p) => Some(p),
            _ => None,
        }
    }
}

/// Platform attribute key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlatformInfo(u32);

impl PlatformInfo {
    pub const PROFILE: PlatformInfo = PlatformInfo(0x0900);
    pub const VERSION: PlatformInfo = PlatformInfo(0x0901);
    pub const NAME: PlatformInfo = PlatformInfo(0x0902);
    pub const VENDOR: PlatformInfo = PlatformInfo(0x0903);
    pub const EXTENSIONS: PlatformInfo = PlatformInfo(0x0904);

    /// Exported constants, in export order.
    pub const NAMED: [(&'static str, PlatformInfo); 5] = [
        ("PLATFORM_PROFILE", Self::PROFILE),
        ("PLATFORM_VERSION", Self::VERSION),
        ("PLATFORM_NAME", Self::NAME),
        ("PLATFORM_VENDOR", Self::VENDOR),
        ("PLATFORM_EXTENSIONS", Self::EXTENSIONS),
    ];

    pub const fn from_raw(raw: u32) -> Self {
        PlatformInfo(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Every known platform key is a string.
    pub fn kind(self) -> InfoKind {
        if Self::NAMED.iter().any(|(_, key)| *key == self) {
            InfoKind::Text
        } else {
            InfoKind::Raw
        }
    }
}

/// Device attribute key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceInfo(u32);

impl DeviceInfo {
    pub const TYPE: DeviceInfo = DeviceInfo(0x1000);
    pub const VENDOR_ID: DeviceInfo = DeviceInfo(0x1001);
    pub const MAX_COMPUTE_UNITS: DeviceInfo = DeviceInfo(0x1002);
    pub const MAX_WORK_ITEM_DIMENSIONS: DeviceInfo = DeviceInfo(0x1003);
    pub const MAX_WORK_GROUP_SIZE: DeviceInfo = DeviceInfo(0x1004);
    pub const MAX_CLOCK_FREQUENCY: DeviceInfo = DeviceInfo(0x100C);
    pub const MAX_MEM_ALLOC_SIZE: DeviceInfo = DeviceInfo(0x1010);
    pub const GLOBAL_MEM_SIZE: DeviceInfo = DeviceInfo(0x101F);
    pub const LOCAL_MEM_SIZE: DeviceInfo = DeviceInfo(0x1023);
    pub const AVAILABLE: DeviceInfo = DeviceInfo(0x1027);
    pub const NAME: DeviceInfo = DeviceInfo(0x102B);
    pub const VENDOR: DeviceInfo = DeviceInfo(0x102C);
    pub const DRIVER_VERSION: DeviceInfo = DeviceInfo(0x102D);
    pub const PROFILE: DeviceInfo = DeviceInfo(0x102E);
    pub const VERSION: DeviceInfo = DeviceInfo(0x102F);
    pub const EXTENSIONS: DeviceInfo = DeviceInfo(0x1030);
    pub const PLATFORM: DeviceInfo = DeviceInfo(0x1031);

    const KINDS: [(DeviceInfo, InfoKind); 17] = [
        (Self::TYPE, InfoKind::DeviceType),
        (Self::VENDOR_ID, InfoKind::UInt),
        (Self::MAX_COMPUTE_UNITS, InfoKind::UInt),
        (Self::MAX_WORK_ITEM_DIMENSIONS, InfoKind::UInt),
        (Self::MAX_WORK_GROUP_SIZE, InfoKind::Size),
        (Self::MAX_CLOCK_FREQUENCY, InfoKind::UInt),
        (Self::MAX_MEM_ALLOC_SIZE, InfoKind::ULong),
        (Self::GLOBAL_MEM_SIZE, InfoKind::ULong),
        (Self::LOCAL_MEM_SIZE, InfoKind::ULong),
        (Self::AVAILABLE, InfoKind::Bool),
        (Self::NAME, InfoKind::Text),
        (Self::VENDOR, InfoKind::Text),
        (Self::DRIVER_VERSION, InfoKind::Text),
        (Self::PROFILE, InfoKind::Text),
        (Self::VERSION, InfoKind::Text),
        (Self::EXTENSIONS, InfoKind::Text),
        (Self::PLATFORM, InfoKind::Platform),
    ];

    pub const fn from_raw(raw: u32) -> Self {
        DeviceInfo(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub fn kind(self) -> InfoKind {
        Self::KINDS
            .iter()
            .find(|(key, _)| *key == self)
            .map(|(_, kind)| *kind)
            .unwrap_or(InfoKind::Raw)
    }
}

/// Text up to the first NUL; invalid UTF-8 is replaced.
pub(crate) fn decode_text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn exact<const N: usize>(key: u32, bytes: &[u8]) -> Result<[u8; N]> {
    bytes.try_into().map_err(|_| Error::Decode {
        key,
        expected: N,
        actual: bytes.len(),
    })
}

pub(crate) fn decode_usize(key: u32, bytes: &[u8]) -> Result<usize> {
    Ok(usize::from_ne_bytes(exact(key, bytes)?))
}

/// Decode every kind except [`InfoKind::Platform`], which needs a registry.
pub(crate) fn decode_scalar(key: u32, kind: InfoKind, bytes: Vec<u8>) -> Result<InfoValue> {
    let value = match kind {
        InfoKind::Text => InfoValue::Text(decode_text(&bytes)),
        InfoKind::UInt => InfoValue::UInt(u32::from_ne_bytes(exact(key, &bytes)?)),
        InfoKind::ULong => InfoValue::ULong(u64::from_ne_bytes(exact(key, &bytes)?)),
        InfoKind::Size => InfoValue::Size(decode_usize(key, &bytes)?),
        InfoKind::Bool => InfoValue::Bool(u32::from_ne_bytes(exact(key, &bytes)?) != 0),
        InfoKind::DeviceType => {
            InfoValue::DeviceType(DeviceType::from_bits(u64::from_ne_bytes(exact(key, &bytes)?)))
        }
        InfoKind::Platform | InfoKind::Raw => InfoValue::Bytes(bytes),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_stops_at_nul() {
        assert_eq!(decode_text(b"Fake Platform\0"), "Fake Platform");
        assert_eq!(decode_text(b"no terminator"), "no terminator");
        assert_eq!(decode_text(b""), "");
    }

    #[test]
    fn test_scalar_widths_enforced() {
        let key = DeviceInfo::MAX_COMPUTE_UNITS.raw();
        let value = decode_scalar(key, InfoKind::UInt, 8u32.to_ne_bytes().to_vec()).unwrap();
        assert_eq!(value, InfoValue::UInt(8));

        let err = decode_scalar(key, InfoKind::UInt, vec![1, 2]).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                expected: 4,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_bool_and_device_type() {
        let available = decode_scalar(0x1027, InfoKind::Bool, 1u32.to_ne_bytes().to_vec()).unwrap();
        assert_eq!(available, InfoValue::Bool(true));

        let ty = decode_scalar(
            0x1000,
            InfoKind::DeviceType,
            DeviceType::GPU.bits().to_ne_bytes().to_vec(),
        )
        .unwrap();
        assert_eq!(ty, InfoValue::DeviceType(DeviceType::GPU));
        assert_eq!(ty.as_u64(), Some(4));
    }

    #[test]
    fn test_key_kinds() {
        assert_eq!(PlatformInfo::NAME.kind(), InfoKind::Text);
        assert_eq!(PlatformInfo::from_raw(0x0999).kind(), InfoKind::Raw);
        assert_eq!(DeviceInfo::GLOBAL_MEM_SIZE.kind(), InfoKind::ULong);
        assert_eq!(DeviceInfo::PLATFORM.kind(), InfoKind::Platform);
        assert_eq!(DeviceInfo::from_raw(0x2000).kind(), InfoKind::Raw);
    }
}
