//! Loaders compiled into the host program.
//!
//! Any crate linked into the host can contribute loaders by submitting a
//! [`LoaderRegistration`]:
//!
//! ```ignore
//! inventory::submit! {
//!     LoaderRegistration::new("texture", register_texture)
//! }
//! ```

use crate::error::RegistrationError;
use crate::modules::{LoadedModule, ModuleVersion, RegisterFn};
use crate::registry::Registrar;

/// A loader (or group of loaders) linked into the host program.
pub struct LoaderRegistration {
    /// Sort key; registrations run in name order.
    pub name: &'static str,
    pub register: RegisterFn,
}

inventory::collect!(LoaderRegistration);

impl LoaderRegistration {
    pub const fn new(name: &'static str, register: RegisterFn) -> Self {
        Self { name, register }
    }
}

/// Runs every [`LoaderRegistration`] linked into the program, by name.
pub fn register_host_loaders(registrar: &mut Registrar<'_>) -> Result<(), RegistrationError> {
    let mut registrations: Vec<&'static LoaderRegistration> =
        inventory::iter::<LoaderRegistration>.into_iter().collect();
    registrations.sort_by_key(|r| r.name);

    for registration in registrations {
        (registration.register)(registrar)?;
    }
    Ok(())
}

/// The implicit module standing for the host program itself.
pub fn host_module(name: impl Into<String>, version: ModuleVersion) -> LoadedModule {
    LoadedModule::new(name, version, register_host_loaders)
}

/// A host module that contributes no loaders.
pub fn empty_host_module(name: impl Into<String>, version: ModuleVersion) -> LoadedModule {
    fn register_nothing(_: &mut Registrar<'_>) -> Result<(), RegistrationError> {
        Ok(())
    }
    LoadedModule::new(name, version, register_nothing)
}

#[cfg(all(test, feature = "builtins"))]
mod tests {
    use super::*;
    use crate::loaders::builtin::{LocaleLoader, TableLoader, TextureLoader};
    use crate::modules::ModuleSet;
    use crate::registry::Registry;

    #[test]
    fn test_host_module_registers_builtins() {
        let modules = ModuleSet::new(vec![host_module("host", ModuleVersion::new(1, 0, 0))]);
        let registry = Registry::discover(&modules);

        assert!(registry.get::<TextureLoader>().is_some());
        assert!(registry.get::<TableLoader>().is_some());
        assert!(registry.get_json::<LocaleLoader>().is_some());
        assert_eq!(registry.find("TextureLoader").unwrap().module, "host");
    }

    #[test]
    fn test_empty_host_module_registers_nothing() {
        let modules = ModuleSet::new(vec![empty_host_module("host", ModuleVersion::new(1, 0, 0))]);
        assert!(Registry::discover(&modules).is_empty());
    }
}
