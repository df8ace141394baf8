//! Property-based tests for wrapper identity and two-phase queries.
//!
//! - Enumerating twice yields the same wrapper objects, in native order
//! - Info buffers are exactly as long as the native size query reported
//! - Dropping every wrapper empties the registry

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;

use nwcl::testing::FakeComputeApi;
use nwcl::{ClModule, ModuleConfig, NativeHandle, Platform, PlatformInfo};

fn load(api: FakeComputeApi) -> ClModule {
    let config = ModuleConfig::default()
        .with_dispatcher(nwcl::DispatcherConfig::default().with_max_worker_threads(1));
    ClModule::load(Arc::new(api), config).unwrap()
}

/// Distinct non-null platform handles.
fn handle_set_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::btree_set(1usize..0x1_0000, 0..12)
        .prop_map(|set: BTreeSet<usize>| set.into_iter().collect())
}

/// Platform names without interior NULs.
fn name_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 ._()-]{0,48}"
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 32,
        ..ProptestConfig::default()
    })]

    #[test]
    fn prop_enumeration_identity(handles in handle_set_strategy()) {
        let api = handles
            .iter()
            .fold(FakeComputeApi::new(), |api, &raw| api.with_platform(raw, "P"));
        let module = load(api);

        let first = module.platforms().enumerate().unwrap();
        let second = module.platforms().enumerate().unwrap();

        prop_assert_eq!(first.len(), handles.len());
        prop_assert_eq!(module.platforms().registry().len(), handles.len());
        for ((a, b), &raw) in first.iter().zip(&second).zip(&handles) {
            prop_assert!(Platform::ptr_eq(a, b));
            prop_assert_eq!(a.handle().as_raw(), raw);
        }

        drop(first);
        drop(second);
        prop_assert!(module.platforms().registry().is_empty());
    }

    #[test]
    fn prop_info_bytes_exact(name in name_strategy()) {
        let module = load(FakeComputeApi::new().with_platform(0x10, &name));
        let platform = module.platforms().enumerate().unwrap().remove(0);

        let bytes = module
            .platforms()
            .get_info_bytes(&platform, PlatformInfo::NAME)
            .unwrap();
        prop_assert_eq!(bytes.len(), name.len() + 1);
        prop_assert_eq!(bytes.last().copied(), Some(0u8));

        let decoded = module
            .platforms()
            .get_info_string(&platform, PlatformInfo::NAME)
            .unwrap();
        prop_assert_eq!(decoded, name);
    }
}
