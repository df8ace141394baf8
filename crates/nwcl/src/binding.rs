//! Host-facing entry points.
//!
//! Host values are modelled by [`HostValue`]. Every entry point takes the
//! host's argument list and applies the host conventions:
//!
//! - argument problems are usage errors, raised synchronously even when a
//!   callback was passed
//! - a trailing [`HostValue::Function`] selects the asynchronous path; the
//!   entry point returns `Undefined` at once and the callback later receives
//!   `(Undefined, result)` or `(status code, Undefined)`
//! - methods invoked on a receiver of the wrong class return `Undefined`

use std::fmt;
use std::rc::Rc;

use nwcl_core::{DeviceType, HostException, Result, Status, UsageError};
use tracing::debug;

use crate::device::Device;
use crate::info::{decode_text, DeviceInfo, InfoValue, PlatformInfo};
use crate::module::ClModule;
use crate::platform::Platform;

/// A host function. Returning `Err` means the function threw.
pub type HostFunction = Rc<dyn Fn(&[HostValue]) -> std::result::Result<HostValue, HostException>>;

/// A value in the host's object model.
#[derive(Clone)]
pub enum HostValue {
    Undefined,
    Bool(bool),
    Int(i64),
    Number(f64),
    Text(String),
    Array(Vec<HostValue>),
    Platform(Platform),
    Device(Device),
    Function(HostFunction),
}

impl HostValue {
    /// Wrap a closure as a host function.
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&[HostValue]) -> std::result::Result<HostValue, HostException> + 'static,
    {
        HostValue::Function(Rc::new(f))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, HostValue::Undefined)
    }

    /// Integer value usable as a 32-bit enum.
    ///
    /// Integral numbers from `i32::MIN` to `u32::MAX` qualify; negative
    /// values keep their two's-complement bits, so `-1` reads as
    /// `0xFFFF_FFFF`.
    pub fn as_enum(&self) -> Option<u32> {
        let value = match self {
            HostValue::Int(v) => *v,
            HostValue::Number(n) if n.is_finite() && n.fract() == 0.0 => *n as i64,
            _ => return None,
        };
        if (i64::from(i32::MIN)..=i64::from(u32::MAX)).contains(&value) {
            Some(value as u32)
        } else {
            None
        }
    }

    pub fn as_platform(&self) -> Option<&Platform> {
        match self {
            HostValue::Platform(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_device(&self) -> Option<&Device> {
        match self {
            HostValue::Device(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[HostValue]> {
        match self {
            HostValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&HostFunction> {
        match self {
            HostValue::Function(f) => Some(f),
            _ => None,
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Undefined, HostValue::Undefined) => true,
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::Int(a), HostValue::Int(b)) => a == b,
            (HostValue::Number(a), HostValue::Number(b)) => a == b,
            (HostValue::Text(a), HostValue::Text(b)) => a == b,
            (HostValue::Array(a), HostValue::Array(b)) => a == b,
            (HostValue::Platform(a), HostValue::Platform(b)) => a == b,
            (HostValue::Device(a), HostValue::Device(b)) => a == b,
            (HostValue::Function(a), HostValue::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Undefined => write!(f, "Undefined"),
            HostValue::Bool(v) => write!(f, "Bool({})", v),
            HostValue::Int(v) => write!(f, "Int({})", v),
            HostValue::Number(v) => write!(f, "Number({})", v),
            HostValue::Text(v) => write!(f, "Text({:?})", v),
            HostValue::Array(items) => f.debug_list().entries(items).finish(),
            HostValue::Platform(p) => write!(f, "{:?}", p),
            HostValue::Device(d) => write!(f, "{:?}", d),
            HostValue::Function(_) => write!(f, "Function"),
        }
    }
}

impl From<InfoValue> for HostValue {
    fn from(value: InfoValue) -> Self {
        match value {
            InfoValue::Text(s) => HostValue::Text(s),
            InfoValue::UInt(v) => HostValue::Int(i64::from(v)),
            InfoValue::ULong(v) => match i64::try_from(v) {
                Ok(v) => HostValue::Int(v),
                Err(_) => HostValue::Number(v as f64),
            },
            InfoValue::Size(v) => match i64::try_from(v) {
                Ok(v) => HostValue::Int(v),
                Err(_) => HostValue::Number(v as f64),
            },
            InfoValue::Bool(v) => HostValue::Bool(v),
            InfoValue::DeviceType(t) => HostValue::Int(t.bits() as i64),
            InfoValue::Platform(p) => HostValue::Platform(p),
            InfoValue::Bytes(bytes) => HostValue::Text(decode_text(&bytes)),
        }
    }
}

impl From<Vec<Platform>> for HostValue {
    fn from(platforms: Vec<Platform>) -> Self {
        HostValue::Array(platforms.into_iter().map(HostValue::Platform).collect())
    }
}

impl From<Vec<Device>> for HostValue {
    fn from(devices: Vec<Device>) -> Self {
        HostValue::Array(devices.into_iter().map(HostValue::Device).collect())
    }
}

/// Split off a trailing callback.
fn split_callback(args: &[HostValue]) -> (&[HostValue], Option<HostFunction>) {
    match args.split_last() {
        Some((HostValue::Function(callback), rest)) => (rest, Some(Rc::clone(callback))),
        _ => (args, None),
    }
}

/// Invoke `callback` with the host's `(error, result)` convention.
///
/// Used as the completion of every asynchronous entry point, and available to
/// hosts that schedule their own calls on [`ClModule::control`].
pub fn deliver<T>(
    callback: HostFunction,
    outcome: std::result::Result<T, Status>,
) -> std::result::Result<(), HostException>
where
    T: Into<HostValue>,
{
    let argv = match outcome {
        Ok(result) => [HostValue::Undefined, result.into()],
        Err(status) => {
            debug!(status = %status, "Delivering native error to callback");
            [HostValue::Int(i64::from(status.code())), HostValue::Undefined]
        }
    };
    callback(&argv).map(|_| ())
}

/// Optional device type argument; absent or undefined means all types.
fn device_type_arg(arg: Option<&HostValue>) -> std::result::Result<DeviceType, UsageError> {
    match arg {
        None | Some(HostValue::Undefined) => Ok(DeviceType::ALL),
        Some(value) => value
            .as_enum()
            .map(|bits| DeviceType::from_bits(u64::from(bits)))
            .ok_or(UsageError::WrongType("Expects device type")),
    }
}

/// Shared getInfo prologue. `Ok(None)` means "wrong receiver".
fn info_key<'a, T>(
    this: &'a HostValue,
    args: &[HostValue],
    receiver: fn(&HostValue) -> Option<&T>,
) -> std::result::Result<Option<(&'a T, u32)>, UsageError> {
    let Some(first) = args.first() else {
        return Err(UsageError::MissingArgument("Expects parameter enum"));
    };
    let Some(wrapper) = receiver(this) else {
        return Ok(None);
    };
    let key = first
        .as_enum()
        .ok_or(UsageError::WrongType("Parameter enum must be integer"))?;
    Ok(Some((wrapper, key)))
}

impl ClModule {
    /// `getPlatforms([callback])`
    pub fn get_platforms(&self, args: &[HostValue]) -> Result<HostValue> {
        let (_, callback) = split_callback(args);
        match callback {
            Some(callback) => {
                self.platforms()
                    .enumerate_async(self.control(), move |outcome| deliver(callback, outcome));
                Ok(HostValue::Undefined)
            }
            None => Ok(self.platforms().enumerate()?.into()),
        }
    }

    /// `Platform.isPlatform(value)`
    pub fn is_platform(&self, args: &[HostValue]) -> HostValue {
        HostValue::Bool(args.first().and_then(HostValue::as_platform).is_some())
    }

    /// `Device.isDevice(value)`
    pub fn is_device(&self, args: &[HostValue]) -> HostValue {
        HostValue::Bool(args.first().and_then(HostValue::as_device).is_some())
    }

    /// `platform.getInfo(key)`
    pub fn platform_get_info(&self, this: &HostValue, args: &[HostValue]) -> Result<HostValue> {
        let Some((platform, key)) = info_key(this, args, HostValue::as_platform)? else {
            return Ok(HostValue::Undefined);
        };
        let value = self
            .platforms()
            .get_info(platform, PlatformInfo::from_raw(key))?;
        Ok(value.into())
    }

    /// `platform.getDevices([type], [callback])`
    pub fn platform_get_devices(&self, this: &HostValue, args: &[HostValue]) -> Result<HostValue> {
        let Some(platform) = this.as_platform() else {
            return Ok(HostValue::Undefined);
        };
        let (args, callback) = split_callback(args);
        let device_type = device_type_arg(args.first())?;
        self.enumerate_devices(Some(platform), device_type, callback)
    }

    /// `device.getInfo(key)`
    pub fn device_get_info(&self, this: &HostValue, args: &[HostValue]) -> Result<HostValue> {
        let Some((device, key)) = info_key(this, args, HostValue::as_device)? else {
            return Ok(HostValue::Undefined);
        };
        let value = self.devices().get_info(device, DeviceInfo::from_raw(key))?;
        Ok(value.into())
    }

    /// `getDevices([platform], [type], [callback])`
    ///
    /// Without a platform the native layer's default platform is used.
    pub fn get_devices(&self, args: &[HostValue]) -> Result<HostValue> {
        let (args, callback) = split_callback(args);
        let platform = match args.first() {
            None | Some(HostValue::Undefined) => None,
            Some(HostValue::Platform(platform)) => Some(platform),
            Some(_) => return Err(UsageError::WrongType("Expects platform").into()),
        };
        let device_type = device_type_arg(args.get(1))?;
        self.enumerate_devices(platform, device_type, callback)
    }

    fn enumerate_devices(
        &self,
        platform: Option<&Platform>,
        device_type: DeviceType,
        callback: Option<HostFunction>,
    ) -> Result<HostValue> {
        match callback {
            Some(callback) => {
                self.devices().enumerate_async(
                    self.control(),
                    platform,
                    device_type,
                    move |outcome| deliver(callback, outcome),
                );
                Ok(HostValue::Undefined)
            }
            None => Ok(self.devices().enumerate(platform, device_type)?.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_enum_accepts_int32_and_uint32() {
        assert_eq!(HostValue::Int(0x0902).as_enum(), Some(0x0902));
        assert_eq!(HostValue::Int(-1).as_enum(), Some(0xFFFF_FFFF));
        assert_eq!(HostValue::Int(0xFFFF_FFFF).as_enum(), Some(0xFFFF_FFFF));
        assert_eq!(HostValue::Number(4.0).as_enum(), Some(4));
        assert_eq!(HostValue::Number(4.5).as_enum(), None);
        assert_eq!(HostValue::Int(1 << 40).as_enum(), None);
        assert_eq!(HostValue::Text("4".into()).as_enum(), None);
    }

    #[test]
    fn test_split_callback_only_trailing() {
        let f = HostValue::function(|_| Ok(HostValue::Undefined));
        let args = [HostValue::Int(4), f.clone()];
        let (rest, callback) = split_callback(&args);
        assert_eq!(rest, &[HostValue::Int(4)]);
        assert!(callback.is_some());

        let args = [f, HostValue::Int(4)];
        let (rest, callback) = split_callback(&args);
        assert_eq!(rest.len(), 2);
        assert!(callback.is_none());
    }

    #[test]
    fn test_device_type_arg() {
        assert_eq!(device_type_arg(None), Ok(DeviceType::ALL));
        assert_eq!(device_type_arg(Some(&HostValue::Undefined)), Ok(DeviceType::ALL));
        assert_eq!(device_type_arg(Some(&HostValue::Int(4))), Ok(DeviceType::GPU));
        assert_eq!(
            device_type_arg(Some(&HostValue::Text("gpu".into()))),
            Err(UsageError::WrongType("Expects device type"))
        );
    }

    #[test]
    fn test_info_value_conversion() {
        assert_eq!(
            HostValue::from(InfoValue::ULong(u64::MAX)),
            HostValue::Number(u64::MAX as f64)
        );
        assert_eq!(HostValue::from(InfoValue::UInt(8)), HostValue::Int(8));
        assert_eq!(
            HostValue::from(InfoValue::Bytes(b"raw\0".to_vec())),
            HostValue::Text("raw".into())
        );
    }
}
