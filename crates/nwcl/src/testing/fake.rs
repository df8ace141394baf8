//! In-memory compute backend.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, ThreadId};
use std::time::Duration;

use nwcl_core::{ComputeApi, DeviceId, DeviceType, NativeHandle, PlatformId, Status};

use crate::info::{DeviceInfo, PlatformInfo};

/// Device type bits the fake accepts besides `ALL`.
const KNOWN_TYPE_BITS: u64 = 0x1F;

#[derive(Debug, Clone)]
struct FakePlatform {
    id: PlatformId,
    info: BTreeMap<u32, Vec<u8>>,
}

#[derive(Debug, Clone)]
struct FakeDevice {
    id: DeviceId,
    platform: PlatformId,
    device_type: DeviceType,
    info: BTreeMap<u32, Vec<u8>>,
}

#[derive(Debug, Default)]
struct Failures {
    platform_ids: Option<Status>,
    device_ids: Option<Status>,
    info: Option<Status>,
}

#[derive(Debug, Default)]
struct State {
    platforms: Vec<FakePlatform>,
    devices: Vec<FakeDevice>,
    failures: Failures,
    reported_info_size: Option<usize>,
    last_thread: Option<ThreadId>,
}

/// Number of native calls made, per entry point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub platform_ids: u64,
    pub platform_info: u64,
    pub device_ids: u64,
    pub device_info: u64,
}

#[derive(Debug, Default)]
struct Counters {
    platform_ids: AtomicU64,
    platform_info: AtomicU64,
    device_ids: AtomicU64,
    device_info: AtomicU64,
}

/// Fake native layer with the two-phase calling conventions of the real one.
///
/// - no platforms: `PLATFORM_NOT_FOUND_KHR`
/// - no matching devices: `DEVICE_NOT_FOUND`
/// - unknown platform/device handle: `INVALID_PLATFORM` / `INVALID_DEVICE`
/// - bad type bits: `INVALID_DEVICE_TYPE`
/// - unknown info key or short output buffer: `INVALID_VALUE`
///
/// Strings are stored NUL-terminated.
#[derive(Debug, Default)]
pub struct FakeComputeApi {
    state: RwLock<State>,
    counters: Counters,
    latency: Option<Duration>,
}

fn text(s: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(s.len() + 1);
    bytes.extend_from_slice(s.as_bytes());
    bytes.push(0);
    bytes
}

fn platform_defaults(name: &str) -> BTreeMap<u32, Vec<u8>> {
    BTreeMap::from([
        (PlatformInfo::PROFILE.raw(), text("FULL_PROFILE")),
        (PlatformInfo::VERSION.raw(), text("OpenCL 1.2 nwcl-fake")),
        (PlatformInfo::NAME.raw(), text(name)),
        (PlatformInfo::VENDOR.raw(), text("nwcl")),
        (PlatformInfo::EXTENSIONS.raw(), text("")),
    ])
}

fn device_defaults(
    platform: PlatformId,
    device: DeviceId,
    device_type: DeviceType,
) -> BTreeMap<u32, Vec<u8>> {
    BTreeMap::from([
        (DeviceInfo::TYPE.raw(), device_type.bits().to_ne_bytes().to_vec()),
        (DeviceInfo::VENDOR_ID.raw(), 0x1234u32.to_ne_bytes().to_vec()),
        (DeviceInfo::MAX_COMPUTE_UNITS.raw(), 8u32.to_ne_bytes().to_vec()),
        (DeviceInfo::MAX_WORK_ITEM_DIMENSIONS.raw(), 3u32.to_ne_bytes().to_vec()),
        (DeviceInfo::MAX_WORK_GROUP_SIZE.raw(), 256usize.to_ne_bytes().to_vec()),
        (DeviceInfo::MAX_CLOCK_FREQUENCY.raw(), 1000u32.to_ne_bytes().to_vec()),
        (DeviceInfo::MAX_MEM_ALLOC_SIZE.raw(), (1u64 << 30).to_ne_bytes().to_vec()),
        (DeviceInfo::GLOBAL_MEM_SIZE.raw(), (4u64 << 30).to_ne_bytes().to_vec()),
        (DeviceInfo::LOCAL_MEM_SIZE.raw(), (64u64 << 10).to_ne_bytes().to_vec()),
        (DeviceInfo::AVAILABLE.raw(), 1u32.to_ne_bytes().to_vec()),
        (DeviceInfo::NAME.raw(), text(&format!("Fake device {:#x}", device.as_raw()))),
        (DeviceInfo::VENDOR.raw(), text("nwcl")),
        (DeviceInfo::DRIVER_VERSION.raw(), text("1.0")),
        (DeviceInfo::PROFILE.raw(), text("FULL_PROFILE")),
        (DeviceInfo::VERSION.raw(), text("OpenCL 1.2 nwcl-fake")),
        (DeviceInfo::EXTENSIONS.raw(), text("")),
        (DeviceInfo::PLATFORM.raw(), platform.as_raw().to_ne_bytes().to_vec()),
    ])
}

/// Copy `items` out through the count/fetch output parameters.
fn write_handles<T: Copy>(items: &[T], out: Option<&mut [T]>, count: Option<&mut u32>) -> Status {
    if out.is_none() && count.is_none() {
        return Status::INVALID_VALUE;
    }
    if let Some(count) = count {
        *count = items.len() as u32;
    }
    if let Some(out) = out {
        if out.is_empty() {
            return Status::INVALID_VALUE;
        }
        let n = out.len().min(items.len());
        out[..n].copy_from_slice(&items[..n]);
    }
    Status::SUCCESS
}

/// Copy an info value out through the size/fetch output parameters.
///
/// `reported` replaces the true length in the size query.
fn write_info(
    value: &[u8],
    reported: Option<usize>,
    out: Option<&mut [u8]>,
    size_ret: Option<&mut usize>,
) -> Status {
    if let Some(out) = out {
        if out.len() < value.len() {
            return Status::INVALID_VALUE;
        }
        out[..value.len()].copy_from_slice(value);
    }
    if let Some(size_ret) = size_ret {
        *size_ret = reported.unwrap_or(value.len());
    }
    Status::SUCCESS
}

impl FakeComputeApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a platform with default attributes and the given name.
    pub fn with_platform(mut self, raw: usize, name: &str) -> Self {
        let state = self.state_mut();
        state.platforms.push(FakePlatform {
            id: PlatformId::from_raw(raw),
            info: platform_defaults(name),
        });
        self
    }

    /// Add a device of `device_type` to platform `platform_raw`.
    pub fn with_device(mut self, platform_raw: usize, raw: usize, device_type: DeviceType) -> Self {
        let platform = PlatformId::from_raw(platform_raw);
        let id = DeviceId::from_raw(raw);
        self.state_mut().devices.push(FakeDevice {
            id,
            platform,
            device_type,
            info: device_defaults(platform, id, device_type),
        });
        self
    }

    /// Override or add one raw platform attribute.
    pub fn with_platform_info(mut self, platform_raw: usize, key: u32, value: Vec<u8>) -> Self {
        let id = PlatformId::from_raw(platform_raw);
        if let Some(platform) = self.state_mut().platforms.iter_mut().find(|p| p.id == id) {
            platform.info.insert(key, value);
        }
        self
    }

    /// Override or add one raw device attribute.
    pub fn with_device_info(mut self, device_raw: usize, key: u32, value: Vec<u8>) -> Self {
        let id = DeviceId::from_raw(device_raw);
        if let Some(device) = self.state_mut().devices.iter_mut().find(|d| d.id == id) {
            device.info.insert(key, value);
        }
        self
    }

    /// Sleep this long inside every native call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every platform enumeration fail with `status` (or succeed again).
    pub fn fail_platform_ids(&self, status: Option<Status>) {
        self.write().failures.platform_ids = status;
    }

    pub fn fail_device_ids(&self, status: Option<Status>) {
        self.write().failures.device_ids = status;
    }

    /// Applies to both platform and device info queries.
    pub fn fail_info(&self, status: Option<Status>) {
        self.write().failures.info = status;
    }

    /// Make every info size query report `size` instead of the stored
    /// length (or report the true length again).
    pub fn report_info_size(&self, size: Option<usize>) {
        self.write().reported_info_size = size;
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            platform_ids: self.counters.platform_ids.load(Ordering::SeqCst),
            platform_info: self.counters.platform_info.load(Ordering::SeqCst),
            device_ids: self.counters.device_ids.load(Ordering::SeqCst),
            device_info: self.counters.device_info.load(Ordering::SeqCst),
        }
    }

    /// Thread that made the most recent native call.
    pub fn last_thread(&self) -> Option<ThreadId> {
        self.read().last_thread
    }

    fn state_mut(&mut self) -> &mut State {
        self.state.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::SeqCst);
        self.write().last_thread = Some(thread::current().id());
        if let Some(latency) = self.latency {
            thread::sleep(latency);
        }
    }
}

impl ComputeApi for FakeComputeApi {
    fn get_platform_ids(
        &self,
        platforms: Option<&mut [PlatformId]>,
        num_platforms: Option<&mut u32>,
    ) -> Status {
        self.enter(&self.counters.platform_ids);
        let state = self.read();
        if let Some(status) = state.failures.platform_ids {
            return status;
        }

        let ids: Vec<PlatformId> = state.platforms.iter().map(|p| p.id).collect();
        let status = write_handles(&ids, platforms, num_platforms);
        if status.is_success() && ids.is_empty() {
            return Status::PLATFORM_NOT_FOUND_KHR;
        }
        status
    }

    fn get_platform_info(
        &self,
        platform: PlatformId,
        param: u32,
        value: Option<&mut [u8]>,
        size_ret: Option<&mut usize>,
    ) -> Status {
        self.enter(&self.counters.platform_info);
        let state = self.read();
        if let Some(status) = state.failures.info {
            return status;
        }

        let Some(entry) = state.platforms.iter().find(|p| p.id == platform) else {
            return Status::INVALID_PLATFORM;
        };
        match entry.info.get(&param) {
            Some(bytes) => write_info(bytes, state.reported_info_size, value, size_ret),
            None => Status::INVALID_VALUE,
        }
    }

    fn get_device_ids(
        &self,
        platform: Option<PlatformId>,
        device_type: DeviceType,
        devices: Option<&mut [DeviceId]>,
        num_devices: Option<&mut u32>,
    ) -> Status {
        self.enter(&self.counters.device_ids);
        let state = self.read();
        if let Some(status) = state.failures.device_ids {
            return status;
        }

        if let Some(platform) = platform {
            if !state.platforms.iter().any(|p| p.id == platform) {
                return Status::INVALID_PLATFORM;
            }
        }

        let bits = device_type.bits();
        if bits == 0 || (device_type != DeviceType::ALL && bits & !KNOWN_TYPE_BITS != 0) {
            return Status::INVALID_DEVICE_TYPE;
        }

        let in_scope = state
            .devices
            .iter()
            .filter(|d| platform.map_or(true, |p| d.platform == p));
        let ids: Vec<DeviceId> = if device_type == DeviceType::DEFAULT {
            in_scope.take(1).map(|d| d.id).collect()
        } else {
            in_scope
                .filter(|d| device_type.intersects(d.device_type))
                .map(|d| d.id)
                .collect()
        };

        if ids.is_empty() {
            if let Some(count) = num_devices {
                *count = 0;
            }
            return Status::DEVICE_NOT_FOUND;
        }
        write_handles(&ids, devices, num_devices)
    }

    fn get_device_info(
        &self,
        device: DeviceId,
        param: u32,
        value: Option<&mut [u8]>,
        size_ret: Option<&mut usize>,
    ) -> Status {
        self.enter(&self.counters.device_info);
        let state = self.read();
        if let Some(status) = state.failures.info {
            return status;
        }

        let Some(entry) = state.devices.iter().find(|d| d.id == device) else {
            return Status::INVALID_DEVICE;
        };
        match entry.info.get(&param) {
            Some(bytes) => write_info(bytes, state.reported_info_size, value, size_ret),
            None => Status::INVALID_VALUE,
        }
    }
}
