//! End-to-end scenarios against the fake backend.
//!
//! - Wrapper identity across repeated enumeration and across kinds
//! - Registry cleanup when the host drops its wrappers
//! - Empty results for "not found"
//! - Native failures on the synchronous path

use std::sync::Arc;

use nwcl::testing::FakeComputeApi;
use nwcl::{
    ClModule, DeviceInfo, DeviceType, HandleRegistry, InfoValue, ModuleConfig, Platform,
    PlatformId, PlatformInfo, PlatformKind, Status,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn load(api: FakeComputeApi) -> (Arc<FakeComputeApi>, ClModule) {
    init_tracing();
    let api = Arc::new(api);
    let config = ModuleConfig::default()
        .with_dispatcher(nwcl::DispatcherConfig::default().with_max_worker_threads(4));
    let module = ClModule::load(api.clone(), config).unwrap();
    (api, module)
}

fn two_platforms() -> FakeComputeApi {
    FakeComputeApi::new()
        .with_platform(0x10, "Alpha")
        .with_platform(0x20, "Beta")
        .with_device(0x10, 0xA0, DeviceType::GPU)
        .with_device(0x10, 0xA1, DeviceType::CPU)
        .with_device(0x20, 0xB0, DeviceType::ACCELERATOR)
}

#[test]
fn test_same_handle_same_object() {
    let registry = HandleRegistry::<PlatformKind>::new();
    let first = registry.get_or_create(PlatformId::from_raw(0x1));
    let second = registry.get_or_create(PlatformId::from_raw(0x1));

    assert!(Platform::ptr_eq(&first, &second));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_enumeration_matches_registry() {
    let (_api, module) = load(two_platforms());
    let platforms = module.platforms().enumerate().unwrap();

    assert_eq!(platforms.len(), 2);
    assert_eq!(
        platforms[0],
        module.platforms().wrap(PlatformId::from_raw(0x10))
    );
    assert_eq!(
        platforms[1],
        module.platforms().wrap(PlatformId::from_raw(0x20))
    );
    assert_eq!(module.platforms().registry().len(), 2);
}

#[test]
fn test_enumeration_uses_two_native_calls() {
    let (api, module) = load(two_platforms());
    module.platforms().enumerate().unwrap();
    assert_eq!(api.calls().platform_ids, 2);

    let platforms = module.platforms().enumerate().unwrap();
    module
        .platforms()
        .get_info(&platforms[0], PlatformInfo::NAME)
        .unwrap();
    assert_eq!(api.calls().platform_info, 2);
}

#[test]
fn test_out_of_host_memory_sync() {
    let (api, module) = load(two_platforms());
    api.fail_platform_ids(Some(Status::OUT_OF_HOST_MEMORY));

    let err = module.platforms().enumerate().unwrap_err();
    assert_eq!(err.to_string(), "Out of host memory");
    assert_eq!(err.status(), Some(Status::OUT_OF_HOST_MEMORY));
    assert!(module.platforms().registry().is_empty());
}

#[test]
fn test_unallocatable_info_size_sync() {
    let (api, module) = load(two_platforms());
    let platform = module.platforms().enumerate().unwrap().remove(0);
    api.report_info_size(Some(usize::MAX));

    let err = module
        .platforms()
        .get_info_bytes(&platform, PlatformInfo::NAME)
        .unwrap_err();
    assert_eq!(err.status(), Some(Status::OUT_OF_HOST_MEMORY));
    assert_eq!(err.to_string(), "Out of host memory");
}

#[test]
fn test_not_found_is_empty_not_error() {
    let (_api, module) = load(FakeComputeApi::new());
    assert!(module.platforms().enumerate().unwrap().is_empty());

    let (_api, module) = load(two_platforms());
    let beta = module.platforms().enumerate().unwrap().remove(1);
    let gpus = module
        .devices()
        .enumerate(Some(&beta), DeviceType::GPU)
        .unwrap();
    assert!(gpus.is_empty());
}

#[test]
fn test_dropped_wrappers_leave_registry() {
    let (_api, module) = load(two_platforms());

    let platforms = module.platforms().enumerate().unwrap();
    let serials: Vec<u64> = platforms.iter().map(|p| p.serial()).collect();
    assert_eq!(module.platforms().registry().len(), 2);

    drop(platforms);
    assert!(module.platforms().registry().is_empty());

    let again = module.platforms().enumerate().unwrap();
    assert_eq!(again.len(), 2);
    assert!(again.iter().all(|p| !serials.contains(&p.serial())));
}

#[test]
fn test_partial_drop_keeps_survivor_identity() {
    let (_api, module) = load(two_platforms());

    let mut platforms = module.platforms().enumerate().unwrap();
    let kept = platforms.remove(0);
    drop(platforms);

    assert_eq!(module.platforms().registry().len(), 1);
    let again = module.platforms().enumerate().unwrap();
    assert!(Platform::ptr_eq(&again[0], &kept));
}

#[test]
fn test_device_platform_is_enumerated_platform() {
    let (_api, module) = load(two_platforms());
    let platforms = module.platforms().enumerate().unwrap();

    for platform in &platforms {
        let devices = module
            .devices()
            .enumerate(Some(platform), DeviceType::ALL)
            .unwrap();
        assert!(!devices.is_empty());
        for device in &devices {
            let owner = module.devices().get_info(device, DeviceInfo::PLATFORM).unwrap();
            assert_eq!(owner, InfoValue::Platform(platform.clone()));
        }
    }
}

#[test]
fn test_device_platform_creates_wrapper_on_demand() {
    let (_api, module) = load(two_platforms());

    // Devices without a platform argument span every platform.
    let devices = module.devices().enumerate(None, DeviceType::ALL).unwrap();
    assert_eq!(devices.len(), 3);
    assert!(module.platforms().registry().is_empty());

    let owner = module
        .devices()
        .get_info(&devices[2], DeviceInfo::PLATFORM)
        .unwrap();
    let owner = owner.as_platform().unwrap().clone();
    assert_eq!(owner.handle(), PlatformId::from_raw(0x20));

    let platforms = module.platforms().enumerate().unwrap();
    assert!(Platform::ptr_eq(&platforms[1], &owner));
}

#[test]
fn test_invalid_platform_message() {
    let (_api, module) = load(two_platforms());
    let stray = module.platforms().wrap(PlatformId::from_raw(0x99));

    let err = module
        .platforms()
        .get_info(&stray, PlatformInfo::NAME)
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid platform/device handle");
}

#[test]
fn test_zero_length_info_is_empty() {
    let (_api, module) = load(
        FakeComputeApi::new()
            .with_platform(0x10, "Alpha")
            .with_platform_info(0x10, PlatformInfo::EXTENSIONS.raw(), Vec::new()),
    );
    let platform = module.platforms().enumerate().unwrap().remove(0);

    let bytes = module
        .platforms()
        .get_info_bytes(&platform, PlatformInfo::EXTENSIONS)
        .unwrap();
    assert!(bytes.is_empty());
    assert_eq!(
        module
            .platforms()
            .get_info(&platform, PlatformInfo::EXTENSIONS)
            .unwrap(),
        InfoValue::Text(String::new())
    );
}

#[test]
fn test_malformed_scalar_is_decode_error() {
    let (_api, module) = load(
        two_platforms().with_device_info(0xA0, DeviceInfo::MAX_COMPUTE_UNITS.raw(), vec![1, 2, 3]),
    );
    let device = module
        .devices()
        .enumerate(None, DeviceType::GPU)
        .unwrap()
        .remove(0);

    let err = module
        .devices()
        .get_info(&device, DeviceInfo::MAX_COMPUTE_UNITS)
        .unwrap_err();
    assert_eq!(err.category(), "decode");
}
