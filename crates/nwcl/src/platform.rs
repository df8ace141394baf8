//! Platform wrappers and platform enumeration.

use std::sync::Arc;

use nwcl_core::{
    query_bytes, query_handles, ComputeApi, ControlLoop, HandleRegistry, HostException,
    NativeError, PlatformId, PlatformKind, Result, Status, TaskId, Wrapper,
};
use tracing::{debug, trace};

use crate::info::{decode_scalar, decode_text, InfoValue, PlatformInfo};

/// Host-visible platform object.
pub type Platform = Wrapper<PlatformKind>;

/// Blocking platform enumeration. Safe to call on a worker thread.
pub(crate) fn fetch_platform_ids(
    api: &dyn ComputeApi,
) -> std::result::Result<Vec<PlatformId>, Status> {
    query_handles(|platforms, num_platforms| api.get_platform_ids(platforms, num_platforms))
}

/// Produces and reuses [`Platform`] wrappers.
#[derive(Clone)]
pub struct PlatformFactory {
    api: Arc<dyn ComputeApi>,
    registry: HandleRegistry<PlatformKind>,
}

impl PlatformFactory {
    pub fn new(api: Arc<dyn ComputeApi>, registry: HandleRegistry<PlatformKind>) -> Self {
        PlatformFactory { api, registry }
    }

    pub fn registry(&self) -> &HandleRegistry<PlatformKind> {
        &self.registry
    }

    /// Wrapper for a handle received from the native layer.
    pub fn wrap(&self, handle: PlatformId) -> Platform {
        self.registry.get_or_create(handle)
    }

    /// Enumerate platforms on the calling (control) thread.
    ///
    /// "Not found" yields an empty list. Repeated calls return the same
    /// wrapper objects for as long as they are alive.
    pub fn enumerate(&self) -> Result<Vec<Platform>> {
        let ids = fetch_platform_ids(&*self.api).map_err(NativeError::from)?;
        debug!(count = ids.len(), "Enumerated platforms");
        Ok(resolve(&self.registry, &ids))
    }

    /// Enumerate platforms on a worker thread.
    ///
    /// `callback` runs on the control thread exactly once, with the wrapped
    /// platforms or the failing native status.
    pub fn enumerate_async<C>(&self, control: &ControlLoop, callback: C) -> TaskId
    where
        C: FnOnce(std::result::Result<Vec<Platform>, Status>) -> std::result::Result<(), HostException>
            + 'static,
    {
        let registry = self.registry.clone();
        control.run_async(
            Arc::clone(&self.api),
            |api| fetch_platform_ids(&**api),
            move |outcome| callback(outcome.map(|ids| resolve(&registry, &ids))),
        )
    }

    /// Raw info bytes, exactly as long as the native size query reported.
    pub fn get_info_bytes(&self, platform: &Platform, key: PlatformInfo) -> Result<Vec<u8>> {
        let handle = platform.handle();
        let bytes = query_bytes(|value, size_ret| {
            self.api.get_platform_info(handle, key.raw(), value, size_ret)
        })
        .map_err(NativeError::from)?;
        trace!(?handle, key = key.raw(), len = bytes.len(), "Platform info");
        Ok(bytes)
    }

    /// Decoded platform attribute.
    pub fn get_info(&self, platform: &Platform, key: PlatformInfo) -> Result<InfoValue> {
        let bytes = self.get_info_bytes(platform, key)?;
        decode_scalar(key.raw(), key.kind(), bytes)
    }

    /// Text attribute; unknown keys are read as text too.
    pub fn get_info_string(&self, platform: &Platform, key: PlatformInfo) -> Result<String> {
        let bytes = self.get_info_bytes(platform, key)?;
        Ok(decode_text(&bytes))
    }
}

pub(crate) fn resolve(registry: &HandleRegistry<PlatformKind>, ids: &[PlatformId]) -> Vec<Platform> {
    ids.iter().map(|&id| registry.get_or_create(id)).collect()
}
