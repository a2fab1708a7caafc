//! Content modules: units of code that contribute loaders.
//!
//! The host program is always present as an implicit module. External
//! modules are dynamic libraries found under the data root; each exports a
//! [`ModuleDeclaration`] named `content_module_declaration`, normally through
//! [`declare_module!`](crate::declare_module). Libraries are never unloaded:
//! the registry keeps loader instances and vtables that live inside them.

pub mod version;

use std::fmt;
use std::mem::ManuallyDrop;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use libloading::Library;
use tracing::{Dispatch, info, warn};

use crate::error::{ModuleLoadError, RegistrationError, panic_message};
use crate::registry::Registrar;
use crate::scan::FileRecord;

pub use version::ModuleVersion;

/// Layout version of [`ModuleDeclaration`]. Bumped on any change to it or to
/// the loader traits.
pub const MODULE_ABI_VERSION: u32 = 2;

/// Version of this crate; modules must be built against the same one.
pub const LOADER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the static every module library exports.
pub const DECLARATION_SYMBOL: &str = "content_module_declaration";

/// Registration entry point of a module.
pub type RegisterFn = fn(&mut Registrar<'_>) -> Result<(), RegistrationError>;

/// Hands the host's current subscriber to a module's own `tracing` copy.
pub type InstallDispatchFn = fn(&Dispatch);

/// Runs `register`, turning a panic into [`RegistrationError::Panicked`].
///
/// [`declare_module!`](crate::declare_module) wraps a module's entry point in
/// this so the panic is caught on the module's side of the library boundary.
#[doc(hidden)]
pub fn guard_registration(
    register: RegisterFn,
    registrar: &mut Registrar<'_>,
) -> Result<(), RegistrationError> {
    panic::catch_unwind(AssertUnwindSafe(|| register(registrar))).unwrap_or_else(|payload| {
        Err(RegistrationError::Panicked(panic_message(payload.as_ref())))
    })
}

/// Makes `dispatch` the global subscriber of the calling binary.
///
/// A library keeps the first subscriber it is given.
#[doc(hidden)]
pub fn install_dispatch(dispatch: &Dispatch) {
    let _ = tracing::dispatcher::set_global_default(dispatch.clone());
}

/// Static descriptor exported by a module library.
///
/// `abi_version` stays the first field so it can be checked before the
/// rest of the layout is trusted.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ModuleDeclaration {
    pub abi_version: u32,
    pub loader_version: &'static str,
    pub name: &'static str,
    pub version: &'static str,
    pub register: RegisterFn,
    pub install_dispatch: InstallDispatchFn,
}

impl fmt::Debug for ModuleDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDeclaration")
            .field("abi_version", &self.abi_version)
            .field("loader_version", &self.loader_version)
            .field("name", &self.name)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Exports the [`ModuleDeclaration`] of a module library.
///
/// ```ignore
/// content_loader::declare_module!("weapons", "0.1.0", register);
///
/// fn register(registrar: &mut Registrar<'_>) -> Result<(), RegistrationError> {
///     registrar.json_loader::<WeaponLoader>()
/// }
/// ```
#[macro_export]
macro_rules! declare_module {
    ($name:expr, $version:expr, $register:path) => {
        #[allow(non_upper_case_globals)]
        #[unsafe(no_mangle)]
        pub static content_module_declaration: $crate::modules::ModuleDeclaration =
            $crate::modules::ModuleDeclaration {
                abi_version: $crate::modules::MODULE_ABI_VERSION,
                loader_version: $crate::modules::LOADER_VERSION,
                name: $name,
                version: $version,
                register: {
                    fn guarded(
                        registrar: &mut $crate::registry::Registrar<'_>,
                    ) -> ::core::result::Result<(), $crate::error::RegistrationError> {
                        $crate::modules::guard_registration($register, registrar)
                    }
                    guarded
                },
                install_dispatch: $crate::modules::install_dispatch,
            };
    };
}

/// A module whose loaders can be discovered.
pub struct LoadedModule {
    name: String,
    version: ModuleVersion,
    file: Option<Arc<FileRecord>>,
    register: RegisterFn,
    library: Option<ManuallyDrop<Library>>,
}

impl LoadedModule {
    /// Creates an in-process module from its registration function.
    pub fn new(name: impl Into<String>, version: ModuleVersion, register: RegisterFn) -> Self {
        Self {
            name: name.into(),
            version,
            file: None,
            register,
            library: None,
        }
    }

    /// Opens the module library at `file`.
    ///
    /// # Errors
    ///
    /// Fails when the library cannot be opened, lacks a declaration, was
    /// built for another ABI or crate version, or declares bad metadata.
    pub fn open(file: Arc<FileRecord>) -> Result<Self, ModuleLoadError> {
        // SAFETY: opening a library runs its initializers; module files are
        // trusted content placed under the data root.
        let library = unsafe { Library::new(&file.path) }.map_err(ModuleLoadError::Open)?;

        // SAFETY: the symbol is checked for the expected ABI version before
        // any field past `abi_version` is read. The library is never
        // unloaded, so the `'static` strings stay valid.
        let declaration = unsafe {
            let symbol = library
                .get::<*const ModuleDeclaration>(DECLARATION_SYMBOL.as_bytes())
                .map_err(|source| ModuleLoadError::MissingDeclaration {
                    symbol: DECLARATION_SYMBOL,
                    source,
                })?;
            let ptr: *const ModuleDeclaration = *symbol;
            let abi_version = std::ptr::addr_of!((*ptr).abi_version).read();
            if abi_version != MODULE_ABI_VERSION {
                return Err(ModuleLoadError::AbiMismatch {
                    host: MODULE_ABI_VERSION,
                    module: abi_version,
                });
            }
            *ptr
        };

        let version = check_declaration(&declaration)?;
        tracing::dispatcher::get_default(|dispatch| (declaration.install_dispatch)(dispatch));

        Ok(Self {
            name: declaration.name.to_string(),
            version,
            file: Some(file),
            register: declaration.register,
            library: Some(ManuallyDrop::new(library)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> ModuleVersion {
        self.version
    }

    /// File the module was loaded from; `None` for in-process modules.
    pub fn file(&self) -> Option<&Arc<FileRecord>> {
        self.file.as_ref()
    }

    /// Path relative to the data root; `None` for in-process modules.
    pub fn relative_path(&self) -> Option<&str> {
        self.file.as_ref().map(|f| f.relative.as_str())
    }

    pub fn is_dynamic(&self) -> bool {
        self.library.is_some()
    }

    pub(crate) fn register(&self) -> RegisterFn {
        self.register
    }
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("path", &self.relative_path())
            .finish()
    }
}

/// Validates the metadata of a module declaration.
fn check_declaration(declaration: &ModuleDeclaration) -> Result<ModuleVersion, ModuleLoadError> {
    if declaration.abi_version != MODULE_ABI_VERSION {
        return Err(ModuleLoadError::AbiMismatch {
            host: MODULE_ABI_VERSION,
            module: declaration.abi_version,
        });
    }
    if declaration.loader_version != LOADER_VERSION {
        return Err(ModuleLoadError::LoaderVersionMismatch {
            host: LOADER_VERSION,
            module: declaration.loader_version,
        });
    }
    if declaration.name.trim().is_empty() {
        return Err(ModuleLoadError::EmptyName);
    }
    Ok(declaration.version.parse::<ModuleVersion>()?)
}

/// Every module visible to discovery, host first, then in scan order.
#[derive(Debug, Default)]
pub struct ModuleSet {
    modules: Vec<LoadedModule>,
}

impl ModuleSet {
    pub fn new(modules: Vec<LoadedModule>) -> Self {
        Self { modules }
    }

    pub fn push(&mut self, module: LoadedModule) {
        self.modules.push(module);
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoadedModule> {
        self.modules.iter()
    }

    pub fn get(&self, name: &str) -> Option<&LoadedModule> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Outcome of a single module loader step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleStep {
    /// The module with this name was loaded.
    Loaded(String),
    /// The file at this relative path could not be loaded.
    Skipped(String),
    Done,
}

/// Loads module files one per step.
pub struct ModuleLoader {
    pending: std::vec::IntoIter<Arc<FileRecord>>,
    total: usize,
    modules: ModuleSet,
    skipped: Vec<Arc<FileRecord>>,
}

impl ModuleLoader {
    /// Starts from the host module; `files` are opened in order.
    pub fn new(host: LoadedModule, files: &[Arc<FileRecord>]) -> Self {
        Self {
            pending: files.to_vec().into_iter(),
            total: files.len(),
            modules: ModuleSet::new(vec![host]),
            skipped: Vec::new(),
        }
    }

    /// Loads the next module file.
    ///
    /// A module that fails to load is logged and skipped.
    pub fn step(&mut self) -> ModuleStep {
        let Some(file) = self.pending.next() else {
            return ModuleStep::Done;
        };

        match LoadedModule::open(Arc::clone(&file)) {
            Ok(module) => {
                info!(
                    "Loaded module {} v{} from {}",
                    module.name(),
                    module.version(),
                    file.relative
                );
                let name = module.name().to_string();
                self.modules.push(module);
                ModuleStep::Loaded(name)
            }
            Err(e) => {
                warn!("Skipping module {}: {}", file.relative, e);
                let relative = file.relative.clone();
                self.skipped.push(file);
                ModuleStep::Skipped(relative)
            }
        }
    }

    /// Module files handled so far, loaded or skipped.
    pub fn processed(&self) -> usize {
        self.total - self.pending.len()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn skipped(&self) -> &[Arc<FileRecord>] {
        &self.skipped
    }

    pub fn finish(self) -> ModuleSet {
        self.modules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn register_nothing(_: &mut Registrar<'_>) -> Result<(), RegistrationError> {
        Ok(())
    }

    fn host() -> LoadedModule {
        LoadedModule::new("host", ModuleVersion::new(1, 0, 0), register_nothing)
    }

    #[test]
    fn test_host_module_is_always_present() {
        let loader = ModuleLoader::new(host(), &[]);
        let modules = loader.finish();

        assert_eq!(modules.len(), 1);
        let host = modules.get("host").unwrap();
        assert!(!host.is_dynamic());
        assert_eq!(host.relative_path(), None);
        assert_eq!(host.version(), ModuleVersion::new(1, 0, 0));
    }

    #[test]
    fn test_corrupt_module_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.so");
        fs::write(&path, b"definitely not a shared object").unwrap();
        let record = Arc::new(FileRecord::new(0, temp_dir.path(), &path));

        let mut loader = ModuleLoader::new(host(), &[record]);

        assert_eq!(loader.step(), ModuleStep::Skipped("broken.so".to_string()));
        assert_eq!(loader.step(), ModuleStep::Done);
        assert_eq!(loader.processed(), 1);
        assert_eq!(loader.skipped().len(), 1);
        assert_eq!(loader.finish().len(), 1);
    }

    fn register_panicking(_: &mut Registrar<'_>) -> Result<(), RegistrationError> {
        panic!("no loaders here")
    }

    fn declaration() -> ModuleDeclaration {
        ModuleDeclaration {
            abi_version: MODULE_ABI_VERSION,
            loader_version: LOADER_VERSION,
            name: "sample",
            version: "1.2.3",
            register: register_nothing,
            install_dispatch,
        }
    }

    #[test]
    fn test_matching_declaration_is_accepted() {
        assert_eq!(check_declaration(&declaration()).unwrap(), ModuleVersion::new(1, 2, 3));
    }

    #[test]
    fn test_declaration_from_other_abi_is_rejected() {
        let declaration = ModuleDeclaration {
            abi_version: MODULE_ABI_VERSION + 1,
            ..declaration()
        };

        let err = check_declaration(&declaration).unwrap_err();
        assert!(matches!(
            err,
            ModuleLoadError::AbiMismatch { host, module }
                if host == MODULE_ABI_VERSION && module == MODULE_ABI_VERSION + 1
        ));
    }

    #[test]
    fn test_declaration_from_other_crate_version_is_rejected() {
        let declaration = ModuleDeclaration {
            loader_version: "0.0.0-other",
            ..declaration()
        };

        let err = check_declaration(&declaration).unwrap_err();
        assert!(matches!(
            err,
            ModuleLoadError::LoaderVersionMismatch { module: "0.0.0-other", .. }
        ));
    }

    #[test]
    fn test_declaration_metadata_is_validated() {
        let unnamed = ModuleDeclaration {
            name: "  ",
            ..declaration()
        };
        assert!(matches!(check_declaration(&unnamed), Err(ModuleLoadError::EmptyName)));

        let unversioned = ModuleDeclaration {
            version: "one",
            ..declaration()
        };
        assert!(matches!(check_declaration(&unversioned), Err(ModuleLoadError::Version(_))));
    }

    mod declared {
        use super::*;

        crate::declare_module!("declared", "0.3.0", register_panicking);
    }

    #[test]
    fn test_declared_module_guards_its_entry_point() {
        let declaration = declared::content_module_declaration;
        assert_eq!(check_declaration(&declaration).unwrap(), ModuleVersion::new(0, 3, 0));
        assert_eq!(declaration.name, "declared");

        let mut builder = crate::registry::Registry::builder();
        let module = LoadedModule::new(
            declaration.name,
            ModuleVersion::new(0, 3, 0),
            declaration.register,
        );
        let err = builder.discover_module(&module).unwrap_err();
        assert!(matches!(err, RegistrationError::Panicked(msg) if msg.contains("no loaders")));
        assert!(builder.is_empty());
    }

    #[test]
    fn test_open_reports_library_errors() {
        let temp_dir = TempDir::new().unwrap();
        let record = Arc::new(FileRecord::new(
            0,
            temp_dir.path(),
            Path::new(temp_dir.path()).join("missing.so"),
        ));

        let err = LoadedModule::open(record).unwrap_err();
        assert!(matches!(err, ModuleLoadError::Open(_)));
    }
}
