//! Testing utilities for code built on nwcl.
//!
//! Provides [`FakeComputeApi`], an in-memory [`ComputeApi`](nwcl_core::ComputeApi)
//! backend with configurable platforms and devices, scripted failures, call
//! counters and optional per-call latency.
//!
//! # Feature Gate
//!
//! This module is only available when the `testing` feature is enabled,
//! or when running tests.
//!
//! ```toml
//! [dev-dependencies]
//! nwcl = { version = "...", features = ["testing"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use nwcl::testing::FakeComputeApi;
//! use nwcl::{ClModule, DeviceType, ModuleConfig};
//!
//! let api = Arc::new(
//!     FakeComputeApi::new()
//!         .with_platform(0x10, "Fake CL")
//!         .with_device(0x10, 0xA0, DeviceType::GPU),
//! );
//! let module = ClModule::load(api.clone(), ModuleConfig::default()).unwrap();
//! assert_eq!(module.platforms().enumerate().unwrap().len(), 1);
//! assert_eq!(api.calls().platform_ids, 2);
//! ```

pub mod fake;

pub use fake::{CallCounts, FakeComputeApi};
