//! Device wrappers and device enumeration.

use std::sync::Arc;

use nwcl_core::{
    query_bytes, query_handles, ComputeApi, ControlLoop, DeviceId, DeviceKind, DeviceType,
    HandleRegistry, HostException, NativeError, PlatformId, PlatformKind, Result, Status, TaskId,
    Wrapper,
};
use tracing::{debug, trace};

use crate::info::{decode_scalar, decode_text, decode_usize, DeviceInfo, InfoKind, InfoValue};
use crate::platform::Platform;

/// Host-visible device object.
pub type Device = Wrapper<DeviceKind>;

/// Blocking device enumeration. `platform = None` lets the native layer pick.
pub(crate) fn fetch_device_ids(
    api: &dyn ComputeApi,
    platform: Option<PlatformId>,
    device_type: DeviceType,
) -> std::result::Result<Vec<DeviceId>, Status> {
    query_handles(|devices, num_devices| {
        api.get_device_ids(platform, device_type, devices, num_devices)
    })
}

/// Produces and reuses [`Device`] wrappers.
///
/// Holds the platform registry as well, so that a device's `PLATFORM`
/// attribute resolves to the same [`Platform`] object enumeration returns.
#[derive(Clone)]
pub struct DeviceFactory {
    api: Arc<dyn ComputeApi>,
    devices: HandleRegistry<DeviceKind>,
    platforms: HandleRegistry<PlatformKind>,
}

impl DeviceFactory {
    pub fn new(
        api: Arc<dyn ComputeApi>,
        devices: HandleRegistry<DeviceKind>,
        platforms: HandleRegistry<PlatformKind>,
    ) -> Self {
        DeviceFactory {
            api,
            devices,
            platforms,
        }
    }

    pub fn registry(&self) -> &HandleRegistry<DeviceKind> {
        &self.devices
    }

    pub fn wrap(&self, handle: DeviceId) -> Device {
        self.devices.get_or_create(handle)
    }

    /// Enumerate devices of `platform` matching `device_type`.
    ///
    /// "Device not found" yields an empty list.
    pub fn enumerate(
        &self,
        platform: Option<&Platform>,
        device_type: DeviceType,
    ) -> Result<Vec<Device>> {
        let ids = fetch_device_ids(&*self.api, platform.map(Platform::handle), device_type)
            .map_err(NativeError::from)?;
        debug!(count = ids.len(), ?device_type, "Enumerated devices");
        Ok(resolve(&self.devices, &ids))
    }

    /// Enumerate devices on a worker thread; `callback` runs once on the
    /// control thread.
    pub fn enumerate_async<C>(
        &self,
        control: &ControlLoop,
        platform: Option<&Platform>,
        device_type: DeviceType,
        callback: C,
    ) -> TaskId
    where
        C: FnOnce(std::result::Result<Vec<Device>, Status>) -> std::result::Result<(), HostException>
            + 'static,
    {
        let registry = self.devices.clone();
        let input = (Arc::clone(&self.api), platform.map(Platform::handle), device_type);
        control.run_async(
            input,
            |(api, platform, device_type)| fetch_device_ids(&**api, *platform, *device_type),
            move |outcome| callback(outcome.map(|ids| resolve(&registry, &ids))),
        )
    }

    /// Raw info bytes, exactly as long as the native size query reported.
    pub fn get_info_bytes(&self, device: &Device, key: DeviceInfo) -> Result<Vec<u8>> {
        let handle = device.handle();
        let bytes = query_bytes(|value, size_ret| {
            self.api.get_device_info(handle, key.raw(), value, size_ret)
        })
        .map_err(NativeError::from)?;
        trace!(?handle, key = key.raw(), len = bytes.len(), "Device info");
        Ok(bytes)
    }

    /// Decoded device attribute.
    pub fn get_info(&self, device: &Device, key: DeviceInfo) -> Result<InfoValue> {
        let bytes = self.get_info_bytes(device, key)?;
        match key.kind() {
            InfoKind::Platform => {
                let raw = decode_usize(key.raw(), &bytes)?;
                Ok(InfoValue::Platform(
                    self.platforms.get_or_create(PlatformId::from_raw(raw)),
                ))
            }
            kind => decode_scalar(key.raw(), kind, bytes),
        }
    }

    pub fn get_info_string(&self, device: &Device, key: DeviceInfo) -> Result<String> {
        let bytes = self.get_info_bytes(device, key)?;
        Ok(decode_text(&bytes))
    }
}

fn resolve(registry: &HandleRegistry<DeviceKind>, ids: &[DeviceId]) -> Vec<Device> {
    ids.iter().map(|&id| registry.get_or_create(id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformFactory;
    use crate::testing::FakeComputeApi;

    fn factories(api: FakeComputeApi) -> (PlatformFactory, DeviceFactory) {
        let api: Arc<dyn ComputeApi> = Arc::new(api);
        let platforms = HandleRegistry::new();
        (
            PlatformFactory::new(Arc::clone(&api), platforms.clone()),
            DeviceFactory::new(api, HandleRegistry::new(), platforms),
        )
    }

    fn two_device_api() -> FakeComputeApi {
        FakeComputeApi::new()
            .with_platform(0x10, "Fake CL")
            .with_device(0x10, 0xA0, DeviceType::GPU)
            .with_device(0x10, 0xB0, DeviceType::CPU)
    }

    #[test]
    fn test_enumerate_by_type() {
        let (platforms, devices) = factories(two_device_api());
        let platform = platforms.enumerate().unwrap().remove(0);

        let all = devices.enumerate(Some(&platform), DeviceType::ALL).unwrap();
        assert_eq!(all.len(), 2);

        let gpus = devices.enumerate(Some(&platform), DeviceType::GPU).unwrap();
        assert_eq!(gpus.len(), 1);
        assert_eq!(gpus[0], all[0]);
    }

    #[test]
    fn test_no_matching_devices_is_empty() {
        let (platforms, devices) = factories(two_device_api());
        let platform = platforms.enumerate().unwrap().remove(0);

        let accelerators = devices
            .enumerate(Some(&platform), DeviceType::ACCELERATOR)
            .unwrap();
        assert!(accelerators.is_empty());
    }

    #[test]
    fn test_platform_attribute_is_same_object() {
        let (platforms, devices) = factories(two_device_api());
        let platform = platforms.enumerate().unwrap().remove(0);
        let device = devices
            .enumerate(Some(&platform), DeviceType::GPU)
            .unwrap()
            .remove(0);

        let owner = devices.get_info(&device, DeviceInfo::PLATFORM).unwrap();
        assert_eq!(owner.as_platform(), Some(&platform));
    }

    #[test]
    fn test_scalar_attributes() {
        let (platforms, devices) = factories(two_device_api());
        let platform = platforms.enumerate().unwrap().remove(0);
        let device = devices
            .enumerate(Some(&platform), DeviceType::GPU)
            .unwrap()
            .remove(0);

        assert_eq!(
            devices.get_info(&device, DeviceInfo::TYPE).unwrap(),
            InfoValue::DeviceType(DeviceType::GPU)
        );
        assert_eq!(
            devices.get_info(&device, DeviceInfo::AVAILABLE).unwrap(),
            InfoValue::Bool(true)
        );
        assert!(devices
            .get_info_string(&device, DeviceInfo::NAME)
            .unwrap()
            .contains("0xa0"));
    }

    #[test]
    fn test_invalid_device_type_is_error() {
        let (platforms, devices) = factories(two_device_api());
        let platform = platforms.enumerate().unwrap().remove(0);

        let err = devices
            .enumerate(Some(&platform), DeviceType::from_bits(0))
            .unwrap_err();
        assert_eq!(err.status(), Some(Status::INVALID_DEVICE_TYPE));
    }
}
