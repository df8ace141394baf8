//! Module configuration

use nwcl_core::{DispatcherConfig, Error, Result};
use serde::{Deserialize, Serialize};

/// Overrides `dispatcher.max_worker_threads`.
pub const ENV_MAX_WORKERS: &str = "NWCL_MAX_WORKERS";
/// Overrides `dispatcher.worker_thread_name`.
pub const ENV_WORKER_THREAD_NAME: &str = "NWCL_WORKER_THREAD_NAME";

/// Configuration for [`ClModule::load`](crate::ClModule::load).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Worker pool settings
    pub dispatcher: DispatcherConfig,
    /// Put the enum constants in the export table
    pub export_enums: bool,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            dispatcher: DispatcherConfig::default(),
            export_enums: true,
        }
    }
}

impl ModuleConfig {
    /// Set the dispatcher configuration
    pub fn with_dispatcher(mut self, dispatcher: DispatcherConfig) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Enable or disable enum constant exports
    pub fn with_export_enums(mut self, export_enums: bool) -> Self {
        self.export_enums = export_enums;
        self
    }

    /// Parse from TOML. Missing keys take their defaults.
    ///
    /// ```
    /// let config = nwcl::ModuleConfig::from_toml_str(
    ///     "[dispatcher]\nmax_worker_threads = 4\n",
    /// )
    /// .unwrap();
    /// assert_eq!(config.dispatcher.max_worker_threads, 4);
    /// assert!(config.export_enums);
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: ModuleConfig =
            toml::from_str(source).map_err(|e| Error::Config(e.to_string()))?;
        config.dispatcher.validate()?;
        Ok(config)
    }

    /// Defaults, overridden by `NWCL_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(max) = lookup(ENV_MAX_WORKERS) {
            self.dispatcher.max_worker_threads = max.trim().parse().map_err(|_| {
                Error::Config(format!("{} must be a positive integer, got {:?}", ENV_MAX_WORKERS, max))
            })?;
        }
        if let Some(name) = lookup(ENV_WORKER_THREAD_NAME) {
            self.dispatcher.worker_thread_name = name;
        }
        self.dispatcher.validate()?;
        Ok(self)
    }
}
