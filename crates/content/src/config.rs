//! Pipeline configuration.
use std::env;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::modules::{LOADER_VERSION, ModuleVersion};
use crate::scan::{ScanOptions, normalize_extension};

/// Folder looked up next to the executable when no data root is given.
pub const DATA_FOLDER_NAME: &str = "GameData";

/// Settings for a [`ContentPipeline`](crate::ContentPipeline) run.
#[derive(Clone, Debug)]
pub struct ContentConfig {
    /// Directory scanned for content and modules.
    pub data_root: PathBuf,
    /// Open module files found under the root.
    pub load_modules: bool,
    /// Primary extension identifying module files.
    pub module_extension: String,
    /// Follow symbolic links while scanning.
    pub follow_links: bool,
    /// Register the loaders linked into the host program.
    pub builtin_loaders: bool,
    /// Name of the implicit host module.
    pub host_name: String,
    pub host_version: ModuleVersion,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root().unwrap_or_else(|_| PathBuf::from(DATA_FOLDER_NAME)),
            load_modules: true,
            module_extension: env::consts::DLL_EXTENSION.to_string(),
            follow_links: false,
            builtin_loaders: true,
            host_name: env!("CARGO_PKG_NAME").to_string(),
            host_version: LOADER_VERSION.parse().unwrap_or_default(),
        }
    }
}

impl ContentConfig {
    /// Configuration rooted at `data_root`, everything else default.
    pub fn with_root(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            ..Self::default()
        }
    }

    /// Construct configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CONTENT_DATA_DIR` - Data root (default: `GameData` next to the executable)
    /// - `CONTENT_LOAD_MODULES` - Open module files (default: true)
    /// - `CONTENT_MODULE_EXTENSION` - Module file extension (default: platform library extension)
    /// - `CONTENT_FOLLOW_LINKS` - Follow symbolic links (default: false)
    /// - `CONTENT_BUILTIN_LOADERS` - Register host loaders (default: true)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(root) = read_env::<PathBuf>("CONTENT_DATA_DIR") {
            config.data_root = root;
        }
        if let Some(load) = read_env_bool("CONTENT_LOAD_MODULES") {
            config.load_modules = load;
        }
        if let Some(extension) = read_env::<String>("CONTENT_MODULE_EXTENSION") {
            config.module_extension = normalize_extension(&extension).to_string();
        }
        if let Some(follow) = read_env_bool("CONTENT_FOLLOW_LINKS") {
            config.follow_links = follow;
        }
        if let Some(builtins) = read_env_bool("CONTENT_BUILTIN_LOADERS") {
            config.builtin_loaders = builtins;
        }

        config
    }

    /// Sets the identity of the implicit host module.
    pub fn with_host(mut self, name: impl Into<String>, version: ModuleVersion) -> Self {
        self.host_name = name.into();
        self.host_version = version;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if normalize_extension(&self.module_extension).is_empty() {
            return Err(ConfigError::EmptyModuleExtension);
        }
        Ok(())
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            follow_links: self.follow_links,
            module_extension: normalize_extension(&self.module_extension).to_string(),
        }
    }
}

/// `GameData` next to the running executable.
pub fn default_data_root() -> Result<PathBuf, ConfigError> {
    let exe = env::current_exe().map_err(|e| ConfigError::NoDefaultRoot(e.to_string()))?;
    let dir = exe
        .parent()
        .ok_or_else(|| ConfigError::NoDefaultRoot(format!("{} has no parent", exe.display())))?;
    Ok(dir.join(DATA_FOLDER_NAME))
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}

fn read_env_bool(key: &str) -> Option<bool> {
    match env::var(key).ok()?.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_root_is_next_to_executable() {
        let root = default_data_root().unwrap();
        assert!(root.ends_with(DATA_FOLDER_NAME));
    }

    #[test]
    fn test_validate_rejects_empty_module_extension() {
        let mut config = ContentConfig::with_root("data");
        assert!(config.validate().is_ok());

        config.module_extension = ".".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyModuleExtension)
        ));
    }

    #[test]
    fn test_scan_options_normalize_extension() {
        let mut config = ContentConfig::with_root("data");
        config.module_extension = ".so".to_string();
        config.follow_links = true;

        let options = config.scan_options();
        assert_eq!(options.module_extension, "so");
        assert!(options.follow_links);
    }
}
