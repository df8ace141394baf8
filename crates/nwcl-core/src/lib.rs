//! Core of nwcl: identity-preserving handle wrappers and control-loop dispatch
//! for blocking native compute APIs.
//!
//! A single-threaded host (one control thread, garbage-collected objects)
//! needs two guarantees from a binding to a handle-based native API:
//!
//! - **Identity**: every wrapper produced for the same native handle is the
//!   same object for as long as it is alive ([`HandleRegistry`]).
//! - **No blocking**: slow native calls run on worker threads and report back
//!   to the control thread exactly once ([`ControlLoop`], [`TaskBaton`]).
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────── control thread ─────────────────────────┐
//! │                                                                   │
//! │  host call ──> factory ──> HandleRegistry ──> Wrapper (Rc, !Send)  │
//! │                   │                                               │
//! │                   └─ callback? ──> ControlLoop::run_async         │
//! │                                        │            ▲             │
//! └────────────────────────────────────────┼────────────┼─────────────┘
//!                                          ▼            │
//!                         worker pool: TaskBaton::execute (blocking)
//! ```

pub mod api;
pub mod baton;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod query;
pub mod registry;
pub mod status;

pub use api::{ComputeApi, DeviceType};
pub use baton::{BatonState, TaskBaton, TaskId};
pub use config::DispatcherConfig;
pub use dispatcher::{ControlLoop, DispatchStats, FatalErrorHandler};
pub use error::{Error, HostException, NativeError, Result, UsageError};
pub use handle::{DeviceId, DeviceKind, NativeHandle, PlatformId, PlatformKind, ResourceKind};
pub use query::{query_bytes, query_handles};
pub use registry::{HandleRegistry, Wrapper};
pub use status::Status;
