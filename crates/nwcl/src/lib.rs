//! Platform and device wrappers over a blocking compute API, for hosts with a
//! single control thread.
//!
//! nwcl loads as a [`ClModule`] over any [`ComputeApi`] implementation. The
//! module hands out [`Platform`] and [`Device`] wrappers whose identity is
//! stable (the same native handle always yields the same object while it is
//! alive) and runs slow enumeration calls on worker threads when the host
//! passes a callback.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use nwcl::testing::FakeComputeApi;
//! use nwcl::{ClModule, DeviceType, ModuleConfig, PlatformInfo};
//!
//! let api = Arc::new(
//!     FakeComputeApi::new()
//!         .with_platform(0x10, "Fake CL")
//!         .with_device(0x10, 0xA0, DeviceType::GPU),
//! );
//! let module = ClModule::load(api, ModuleConfig::default()).unwrap();
//!
//! let platforms = module.platforms().enumerate().unwrap();
//! let name = module
//!     .platforms()
//!     .get_info_string(&platforms[0], PlatformInfo::NAME)
//!     .unwrap();
//! assert_eq!(name, "Fake CL");
//!
//! let gpus = module
//!     .devices()
//!     .enumerate(Some(&platforms[0]), DeviceType::GPU)
//!     .unwrap();
//! assert_eq!(gpus.len(), 1);
//! ```

pub mod binding;
pub mod config;
pub mod device;
pub mod info;
pub mod module;
pub mod platform;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use binding::{HostFunction, HostValue};
pub use config::ModuleConfig;
pub use device::{Device, DeviceFactory};
pub use info::{DeviceInfo, InfoKind, InfoValue, PlatformInfo};
pub use module::{ClModule, ClassExport, ExportTable, ExportedConstant};
pub use platform::{Platform, PlatformFactory};

pub use nwcl_core::{
    ComputeApi, ControlLoop, DeviceId, DeviceKind, DeviceType, DispatchStats, DispatcherConfig,
    Error, HandleRegistry, HostException, NativeError, NativeHandle, PlatformId, PlatformKind,
    Result, Status, TaskId, UsageError, query_bytes, query_handles,
};
