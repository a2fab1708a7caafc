//! Loader discovery and typed lookup.
//!
//! There is no runtime type scanning: every module announces its loaders
//! through its registration entry point, and the registry aggregates those
//! announcements into one instance per concrete loader type.
//!
//! # Lookup
//!
//! Consumers resolve loaders by type through [`Registry::get`] and
//! [`Registry::get_json`]. Loaders that depend on each other resolve lazily
//! at load time through [`LoadContext`](crate::loaders::LoadContext), never
//! during registration, since registration order between modules is not a
//! dependency order.

mod host;

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::RegistrationError;
use crate::loaders::{
    ErasedLoader, JsonLoader, JsonLoaderSlot, LoadContext, LoadFailure, Loader, LoaderDescriptor,
    LoaderPhase, LoaderSlot, LoaderState, LoaderStep,
};
use crate::modules::{LoadedModule, ModuleSet, guard_registration};
use crate::scan::FileRecord;

pub use host::{LoaderRegistration, empty_host_module, host_module, register_host_loaders};

struct Entry {
    module: String,
    slot: Option<Box<dyn ErasedLoader>>,
}

/// Snapshot of one registered loader.
#[derive(Debug, Clone, Copy)]
pub struct LoaderInfo<'a> {
    /// Name of the module that registered the loader.
    pub module: &'a str,
    pub descriptor: &'a LoaderDescriptor,
    pub state: LoaderState,
    pub current: Option<usize>,
    /// Number of sealed objects, once completed.
    pub loaded: Option<usize>,
}

/// Handed to a module's entry point to announce its loaders.
pub struct Registrar<'a> {
    module: &'a str,
    known: &'a HashMap<TypeId, usize>,
    staged: Vec<(TypeId, Box<dyn ErasedLoader>)>,
}

impl Registrar<'_> {
    /// Name of the module being registered.
    pub fn module(&self) -> &str {
        self.module
    }

    /// Registers a default-constructed plain loader.
    ///
    /// Registering a type that is already known is a no-op.
    ///
    /// # Errors
    ///
    /// Fails when the loader's name or extension is empty.
    pub fn loader<L: Loader + Default>(&mut self) -> Result<(), RegistrationError> {
        let type_id = TypeId::of::<L>();
        if self.is_known(type_id) {
            debug!("[{}] loader {} already registered", self.module, std::any::type_name::<L>());
            return Ok(());
        }
        let slot = LoaderSlot::new(L::default())?;
        self.staged.push((type_id, Box::new(slot)));
        Ok(())
    }

    /// Registers a default-constructed JSON loader.
    ///
    /// # Errors
    ///
    /// Fails when the loader's name, extension or json extension is empty.
    pub fn json_loader<L: JsonLoader + Default>(&mut self) -> Result<(), RegistrationError> {
        let type_id = TypeId::of::<L>();
        if self.is_known(type_id) {
            debug!("[{}] loader {} already registered", self.module, std::any::type_name::<L>());
            return Ok(());
        }
        let slot = JsonLoaderSlot::new(L::default())?;
        self.staged.push((type_id, Box::new(slot)));
        Ok(())
    }

    fn is_known(&self, type_id: TypeId) -> bool {
        self.known.contains_key(&type_id) || self.staged.iter().any(|(id, _)| *id == type_id)
    }
}

/// Collects loaders from modules.
#[derive(Default)]
pub struct RegistryBuilder {
    entries: Vec<Entry>,
    index: HashMap<TypeId, usize>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the loaders of one module.
    ///
    /// The module's announcements are staged and only committed when its
    /// entry point succeeds; a failing or panicking entry point contributes
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns the entry point's error, or [`RegistrationError::Panicked`].
    pub fn discover_module(&mut self, module: &LoadedModule) -> Result<usize, RegistrationError> {
        let mut registrar = Registrar {
            module: module.name(),
            known: &self.index,
            staged: Vec::new(),
        };

        let result = guard_registration(module.register(), &mut registrar);
        let staged = registrar.staged;
        result?;

        let count = staged.len();
        for (type_id, slot) in staged {
            debug!("[{}] registered {}", module.name(), slot.descriptor());
            self.index.insert(type_id, self.entries.len());
            self.entries.push(Entry {
                module: module.name().to_string(),
                slot: Some(slot),
            });
        }
        Ok(count)
    }

    /// Registers the loaders of every module, in order.
    ///
    /// Calling this again with the same modules adds nothing.
    pub fn discover(&mut self, modules: &ModuleSet) -> usize {
        let mut total = 0;
        for module in modules.iter() {
            match self.discover_module(module) {
                Ok(count) => {
                    info!(
                        "Module {} v{} contributed {} loader(s)",
                        module.name(),
                        module.version(),
                        count
                    );
                    total += count;
                }
                Err(e) => warn!(
                    "Module {} contributed no loaders: {}",
                    module.name(),
                    e
                ),
            }
        }
        total
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn build(self) -> Registry {
        Registry {
            entries: self.entries,
            index: self.index,
        }
    }
}

/// One instance of every discovered loader, in discovery order.
pub struct Registry {
    entries: Vec<Entry>,
    index: HashMap<TypeId, usize>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Builds a registry from every module in `modules`.
    pub fn discover(modules: &ModuleSet) -> Self {
        let mut builder = RegistryBuilder::new();
        builder.discover(modules);
        builder.build()
    }

    /// The single instance of plain loader `L`, if registered.
    pub fn get<L: Loader>(&self) -> Option<&LoaderSlot<L>> {
        self.slot(TypeId::of::<L>())?
            .as_any()
            .downcast_ref::<LoaderSlot<L>>()
    }

    /// The single instance of JSON loader `L`, if registered.
    pub fn get_json<L: JsonLoader>(&self) -> Option<&JsonLoaderSlot<L>> {
        self.slot(TypeId::of::<L>())?
            .as_any()
            .downcast_ref::<JsonLoaderSlot<L>>()
    }

    /// Looks up a loader by its declared name.
    pub fn find(&self, name: &str) -> Option<LoaderInfo<'_>> {
        self.loaders().find(|info| info.descriptor.name == name)
    }

    /// Every registered loader, in discovery order.
    pub fn loaders(&self) -> impl Iterator<Item = LoaderInfo<'_>> + '_ {
        self.entries.iter().filter_map(|entry| {
            let slot = entry.slot.as_deref()?;
            Some(LoaderInfo {
                module: &entry.module,
                descriptor: slot.descriptor(),
                state: slot.state(),
                current: slot.current(),
                loaded: slot.loaded_count(),
            })
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn slot(&self, type_id: TypeId) -> Option<&dyn ErasedLoader> {
        let &i = self.index.get(&type_id)?;
        self.entries.get(i)?.slot.as_deref()
    }

    pub(crate) fn descriptor_at(&self, i: usize) -> Option<&LoaderDescriptor> {
        self.entries.get(i)?.slot.as_deref().map(ErasedLoader::descriptor)
    }

    pub(crate) fn state_at(&self, i: usize) -> Option<LoaderState> {
        self.entries.get(i)?.slot.as_deref().map(ErasedLoader::state)
    }

    pub(crate) fn loaded_count_at(&self, i: usize) -> Option<usize> {
        self.entries.get(i)?.slot.as_deref()?.loaded_count()
    }

    pub(crate) fn begin_at(&mut self, i: usize, files: Vec<Arc<FileRecord>>) -> bool {
        match self.entries.get_mut(i).and_then(|e| e.slot.as_deref_mut()) {
            Some(slot) => slot.begin(files),
            None => false,
        }
    }

    pub(crate) fn abort_at(&mut self, i: usize) {
        if let Some(slot) = self.entries.get_mut(i).and_then(|e| e.slot.as_deref_mut()) {
            if slot.state() == LoaderState::InProgress {
                slot.abort();
            }
        }
    }

    /// Advances loader `i` by one file.
    ///
    /// The slot is detached while it runs so the loader can read the rest
    /// of the registry.
    pub(crate) fn step_at(
        &mut self,
        i: usize,
        phase: LoaderPhase,
        data_root: &Path,
    ) -> Result<LoaderStep, LoadFailure> {
        let Some(mut slot) = self.entries.get_mut(i).and_then(|e| e.slot.take()) else {
            return Ok(LoaderStep::Aborted);
        };

        let step = {
            let ctx = LoadContext::new(self, phase, data_root);
            slot.step(&ctx)
        };

        self.entries[i].slot = Some(slot);
        step
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.loaders().map(|info| info.descriptor))
            .finish()
    }
}
