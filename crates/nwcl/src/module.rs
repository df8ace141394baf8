//! Module load/unload and the export table.

use std::sync::Arc;

use nwcl_core::{
    ComputeApi, ControlLoop, DeviceKind, DeviceType, HandleRegistry, HostException, PlatformKind,
    Result, ResourceKind, UsageError,
};
use tracing::info;

use crate::config::ModuleConfig;
use crate::device::DeviceFactory;
use crate::info::PlatformInfo;
use crate::platform::PlatformFactory;

/// An exported enum constant.
pub type ExportedConstant = (&'static str, u64);

/// One exported wrapper class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassExport {
    name: &'static str,
    class_name: &'static str,
    constants: Vec<ExportedConstant>,
    static_methods: &'static [&'static str],
    methods: &'static [&'static str],
}

impl ClassExport {
    fn new<K: ResourceKind>(
        name: &'static str,
        constants: Vec<ExportedConstant>,
        static_methods: &'static [&'static str],
        methods: &'static [&'static str],
    ) -> Self {
        ClassExport {
            name,
            class_name: K::CLASS_NAME,
            constants,
            static_methods,
            methods,
        }
    }

    /// Property name the class is exported under.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Class name reported by instances.
    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    pub fn constants(&self) -> &[ExportedConstant] {
        &self.constants
    }

    pub fn constant(&self, name: &str) -> Option<u64> {
        lookup(&self.constants, name)
    }

    pub fn static_methods(&self) -> &'static [&'static str] {
        self.static_methods
    }

    pub fn methods(&self) -> &'static [&'static str] {
        self.methods
    }

    /// Host-side `new Class()`. Wrappers only come from native calls, so this
    /// always fails.
    pub fn construct(&self) -> std::result::Result<(), UsageError> {
        Err(UsageError::IllegalConstructor {
            class: self.class_name,
        })
    }
}

/// Everything the module exposes to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTable {
    functions: &'static [&'static str],
    constants: Vec<ExportedConstant>,
    classes: Vec<ClassExport>,
}

impl ExportTable {
    fn build(export_enums: bool) -> Self {
        let platform_constants: Vec<ExportedConstant> = PlatformInfo::NAMED
            .iter()
            .map(|(name, key)| (*name, u64::from(key.raw())))
            .collect();
        let device_constants: Vec<ExportedConstant> = DeviceType::NAMED
            .iter()
            .map(|(name, ty)| (*name, ty.bits()))
            .collect();

        let enums = |constants: &Vec<ExportedConstant>| {
            if export_enums {
                constants.clone()
            } else {
                Vec::new()
            }
        };

        ExportTable {
            functions: &["getPlatforms"],
            constants: enums(&platform_constants),
            classes: vec![
                ClassExport::new::<PlatformKind>(
                    "Platform",
                    enums(&platform_constants),
                    &["isPlatform"],
                    &["getInfo", "getDevices"],
                ),
                ClassExport::new::<DeviceKind>(
                    "Device",
                    enums(&device_constants),
                    &["isDevice"],
                    &["getInfo"],
                ),
            ],
        }
    }

    /// Top-level functions.
    pub fn functions(&self) -> &'static [&'static str] {
        self.functions
    }

    /// Top-level constants.
    pub fn constants(&self) -> &[ExportedConstant] {
        &self.constants
    }

    pub fn constant(&self, name: &str) -> Option<u64> {
        lookup(&self.constants, name)
    }

    pub fn classes(&self) -> &[ClassExport] {
        &self.classes
    }

    pub fn class(&self, name: &str) -> Option<&ClassExport> {
        self.classes.iter().find(|c| c.name == name)
    }
}

fn lookup(constants: &[ExportedConstant], name: &str) -> Option<u64> {
    constants
        .iter()
        .find(|(constant, _)| *constant == name)
        .map(|(_, value)| *value)
}

/// A loaded module: registries, factories and the control loop.
///
/// Registries live exactly as long as the module. Dropping it unloads the
/// module; wrappers the host still holds keep working as plain values but are
/// no longer tracked.
pub struct ClModule {
    config: ModuleConfig,
    platforms: PlatformFactory,
    devices: DeviceFactory,
    control: ControlLoop,
    exports: ExportTable,
}

impl ClModule {
    /// Load the module over `api`.
    pub fn load(api: Arc<dyn ComputeApi>, config: ModuleConfig) -> Result<Self> {
        let control = ControlLoop::new(&config.dispatcher)?;

        let platform_registry = HandleRegistry::<PlatformKind>::new();
        let device_registry = HandleRegistry::<DeviceKind>::new();
        let platforms = PlatformFactory::new(Arc::clone(&api), platform_registry.clone());
        let devices = DeviceFactory::new(api, device_registry, platform_registry);

        let exports = ExportTable::build(config.export_enums);
        info!(
            classes = exports.classes().len(),
            constants = exports.constants().len(),
            "Loaded nwcl module"
        );

        Ok(ClModule {
            config,
            platforms,
            devices,
            control,
            exports,
        })
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    pub fn platforms(&self) -> &PlatformFactory {
        &self.platforms
    }

    pub fn devices(&self) -> &DeviceFactory {
        &self.devices
    }

    pub fn control(&self) -> &ControlLoop {
        &self.control
    }

    pub fn exports(&self) -> &ExportTable {
        &self.exports
    }

    /// Route exceptions raised by completion callbacks to `handler`.
    pub fn set_fatal_error_handler(&self, handler: impl Fn(&HostException) + 'static) {
        self.control.set_fatal_error_handler(handler);
    }

    /// Drive the control loop until all pending calls have completed.
    pub fn run_until_idle(&self) {
        self.control.run_until_idle();
    }
}

impl Drop for ClModule {
    fn drop(&mut self) {
        info!(
            platforms = self.platforms.registry().len(),
            devices = self.devices.registry().len(),
            "Unloading nwcl module"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeComputeApi;

    fn load(config: ModuleConfig) -> ClModule {
        ClModule::load(Arc::new(FakeComputeApi::new()), config).unwrap()
    }

    #[test]
    fn test_export_table_layout() {
        let module = load(ModuleConfig::default());
        let exports = module.exports();

        assert_eq!(exports.functions(), &["getPlatforms"]);
        assert_eq!(exports.constant("PLATFORM_NAME"), Some(0x0902));
        assert_eq!(exports.constants().len(), 5);

        let platform = exports.class("Platform").unwrap();
        assert_eq!(platform.class_name(), "CLPlatform");
        assert_eq!(platform.constant("PLATFORM_VENDOR"), Some(0x0903));
        assert_eq!(platform.static_methods(), &["isPlatform"]);

        let device = exports.class("Device").unwrap();
        assert_eq!(device.class_name(), "CLDevice");
        assert_eq!(device.constant("GPU"), Some(4));
        assert_eq!(device.constant("ALL"), Some(0xFFFF_FFFF));
        assert_eq!(device.constants().len(), 6);
    }

    #[test]
    fn test_enums_can_be_omitted() {
        let module = load(ModuleConfig::default().with_export_enums(false));
        assert!(module.exports().constants().is_empty());
        assert!(module.exports().class("Device").unwrap().constants().is_empty());
    }

    #[test]
    fn test_construct_is_illegal() {
        let module = load(ModuleConfig::default());
        for class in module.exports().classes() {
            let err = class.construct().unwrap_err();
            assert_eq!(err.to_string(), "Illegal constructor");
            assert_eq!(
                err,
                UsageError::IllegalConstructor {
                    class: class.class_name()
                }
            );
        }
    }

    #[test]
    fn test_load_rejects_bad_dispatcher_config() {
        let config = ModuleConfig::default()
            .with_dispatcher(nwcl_core::DispatcherConfig::default().with_max_worker_threads(0));
        let result = ClModule::load(Arc::new(FakeComputeApi::new()), config);
        assert!(result.is_err());
    }
}
