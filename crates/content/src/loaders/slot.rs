//! Registry-owned wrappers that run a loader one file at a time.

use std::any::Any;
use std::collections::HashMap;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::{LoadError, RegistrationError, panic_message};
use crate::loaders::{
    JsonLoader, LoadContext, LoadFailure, Loader, LoaderDescriptor, LoaderKind, LoaderState,
    LoaderStep, read_file,
};
use crate::results::{JsonResultSet, ResultSet};
use crate::scan::{FileRecord, normalize_extension};

/// Object-safe view of a slot, used by the registry and the engine.
pub(crate) trait ErasedLoader: Send + Sync {
    fn descriptor(&self) -> &LoaderDescriptor;

    fn state(&self) -> LoaderState;

    fn current(&self) -> Option<usize>;

    /// Number of sealed objects, once completed.
    fn loaded_count(&self) -> Option<usize>;

    /// Moves `NotStarted → InProgress` over `files`. Returns `false` and
    /// does nothing when the loader already ran.
    fn begin(&mut self, files: Vec<Arc<FileRecord>>) -> bool;

    /// Loads the next file.
    ///
    /// A failing or panicking file aborts the slot and comes back as `Err`.
    /// This runs inside the binary that registered the loader, which is the
    /// only place its panics can be caught.
    fn step(&mut self, ctx: &LoadContext<'_>) -> Result<LoaderStep, LoadFailure>;

    /// Discards working buffers and moves to `Aborted`.
    fn abort(&mut self);

    fn as_any(&self) -> &dyn Any;
}

fn validate_name(name: &str) -> Result<String, RegistrationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RegistrationError::EmptyName);
    }
    Ok(name.to_string())
}

/// Runs loader code, turning a panic into [`LoadError::Panicked`].
fn guarded<T>(file: &FileRecord, run: impl FnOnce() -> T) -> Result<T, LoadError> {
    panic::catch_unwind(AssertUnwindSafe(run)).map_err(|payload| LoadError::Panicked {
        path: file.path.clone(),
        message: panic_message(payload.as_ref()),
    })
}

/// A registered [`Loader`] together with its run state and results.
pub struct LoaderSlot<L: Loader> {
    loader: L,
    descriptor: LoaderDescriptor,
    state: LoaderState,
    current: Option<usize>,
    files: Vec<Arc<FileRecord>>,
    objects: Vec<L::Object>,
    paths: HashMap<String, usize>,
    results: Option<ResultSet<L::Object>>,
}

impl<L: Loader> LoaderSlot<L> {
    pub(crate) fn new(loader: L) -> Result<Self, RegistrationError> {
        let name = validate_name(loader.name())?;
        let extension = normalize_extension(loader.extension()).to_string();
        if extension.is_empty() {
            return Err(RegistrationError::EmptyExtension { loader: name });
        }

        let mut extra_extensions: Vec<String> = Vec::new();
        for extra in loader.extra_extensions() {
            let extra = normalize_extension(extra);
            if !extra.is_empty()
                && extra != extension
                && !extra_extensions.iter().any(|e| e == extra)
            {
                extra_extensions.push(extra.to_string());
            }
        }

        Ok(Self {
            descriptor: LoaderDescriptor {
                name,
                kind: LoaderKind::Plain,
                extension,
                extra_extensions,
                json_extension: None,
            },
            loader,
            state: LoaderState::NotStarted,
            current: None,
            files: Vec::new(),
            objects: Vec::new(),
            paths: HashMap::new(),
            results: None,
        })
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &LoaderDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    /// Whether the run completed and [`objects`](Self::objects) is available.
    pub fn is_loaded(&self) -> bool {
        self.state == LoaderState::Completed
    }

    /// Bucket index of the last file loaded, `None` before the first.
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Sealed results; `None` unless the run completed.
    pub fn objects(&self) -> Option<&ResultSet<L::Object>> {
        self.results.as_ref()
    }

    fn load_file(&self, file: &FileRecord) -> Result<L::Object, LoadError> {
        if self.paths.contains_key(file.key()) {
            return Err(LoadError::DuplicatePath {
                key: file.key().to_string(),
                path: file.path.clone(),
            });
        }
        let data = read_file(&file.path)?;
        guarded(file, || self.loader.load_object(file, &data))?
            .map_err(|source| LoadError::Deserialize {
                path: file.path.clone(),
                source,
            })
    }

    fn seal(&mut self) {
        let objects = std::mem::take(&mut self.objects);
        let paths = std::mem::take(&mut self.paths);
        self.files.clear();
        self.results = Some(ResultSet::new(objects, paths));
        self.state = LoaderState::Completed;
    }
}

impl<L: Loader> ErasedLoader for LoaderSlot<L> {
    fn descriptor(&self) -> &LoaderDescriptor {
        &self.descriptor
    }

    fn state(&self) -> LoaderState {
        self.state
    }

    fn current(&self) -> Option<usize> {
        self.current
    }

    fn loaded_count(&self) -> Option<usize> {
        self.results.as_ref().map(ResultSet::len)
    }

    fn begin(&mut self, files: Vec<Arc<FileRecord>>) -> bool {
        if self.state != LoaderState::NotStarted {
            return false;
        }
        self.files = files;
        self.current = None;
        self.objects = Vec::with_capacity(self.files.len());
        self.paths = HashMap::with_capacity(self.files.len());
        self.state = LoaderState::InProgress;
        true
    }

    fn step(&mut self, _ctx: &LoadContext<'_>) -> Result<LoaderStep, LoadFailure> {
        match self.state {
            LoaderState::InProgress => {}
            LoaderState::Aborted => return Ok(LoaderStep::Aborted),
            LoaderState::NotStarted | LoaderState::Completed => return Ok(LoaderStep::Done),
        }

        let next = self.current.map_or(0, |c| c + 1);
        let Some(file) = self.files.get(next).cloned() else {
            self.seal();
            return Ok(LoaderStep::Done);
        };

        match self.load_file(&file) {
            Ok(object) => {
                self.paths.insert(file.key().to_string(), self.objects.len());
                self.objects.push(object);
                self.current = Some(next);
                if next + 1 == self.files.len() {
                    self.seal();
                    Ok(LoaderStep::Done)
                } else {
                    Ok(LoaderStep::Continue)
                }
            }
            Err(e) => {
                self.abort();
                Err(LoadFailure::from(&e))
            }
        }
    }

    fn abort(&mut self) {
        self.files = Vec::new();
        self.objects = Vec::new();
        self.paths = HashMap::new();
        self.results = None;
        self.state = LoaderState::Aborted;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A registered [`JsonLoader`] together with its run state and results.
pub struct JsonLoaderSlot<L: JsonLoader> {
    loader: L,
    descriptor: LoaderDescriptor,
    state: LoaderState,
    current: Option<usize>,
    files: Vec<Arc<FileRecord>>,
    objects: Vec<L::Object>,
    ranges: HashMap<String, Range<usize>>,
    results: Option<JsonResultSet<L::Object>>,
}

impl<L: JsonLoader> JsonLoaderSlot<L> {
    pub(crate) fn new(loader: L) -> Result<Self, RegistrationError> {
        let name = validate_name(loader.name())?;
        let extension = normalize_extension(loader.extension()).to_string();
        if extension.is_empty() {
            return Err(RegistrationError::EmptyExtension { loader: name });
        }
        let json_extension = normalize_extension(loader.json_extension()).to_string();
        if json_extension.is_empty() {
            return Err(RegistrationError::EmptyJsonExtension { loader: name });
        }

        Ok(Self {
            descriptor: LoaderDescriptor {
                name,
                kind: LoaderKind::Json,
                extension,
                extra_extensions: Vec::new(),
                json_extension: Some(json_extension),
            },
            loader,
            state: LoaderState::NotStarted,
            current: None,
            files: Vec::new(),
            objects: Vec::new(),
            ranges: HashMap::new(),
            results: None,
        })
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &LoaderDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.state == LoaderState::Completed
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Sealed results; `None` unless the run completed.
    pub fn objects(&self) -> Option<&JsonResultSet<L::Object>> {
        self.results.as_ref()
    }

    fn load_file(
        &self,
        file: &FileRecord,
        ctx: &LoadContext<'_>,
    ) -> Result<Vec<L::Object>, LoadError> {
        if self.ranges.contains_key(file.key()) {
            return Err(LoadError::DuplicatePath {
                key: file.key().to_string(),
                path: file.path.clone(),
            });
        }
        let data = read_file(&file.path)?;
        guarded(file, || {
            self.loader
                .parse(file, &data)
                .and_then(|objects| self.loader.resolve(file, objects, ctx))
        })?
        .map_err(|source| LoadError::Deserialize {
                path: file.path.clone(),
                source,
            })
    }

    fn seal(&mut self) {
        let objects = std::mem::take(&mut self.objects);
        let ranges = std::mem::take(&mut self.ranges);
        self.files.clear();
        self.results = Some(JsonResultSet::new(objects, ranges));
        self.state = LoaderState::Completed;
    }
}

impl<L: JsonLoader> ErasedLoader for JsonLoaderSlot<L> {
    fn descriptor(&self) -> &LoaderDescriptor {
        &self.descriptor
    }

    fn state(&self) -> LoaderState {
        self.state
    }

    fn current(&self) -> Option<usize> {
        self.current
    }

    fn loaded_count(&self) -> Option<usize> {
        self.results.as_ref().map(JsonResultSet::len)
    }

    fn begin(&mut self, files: Vec<Arc<FileRecord>>) -> bool {
        if self.state != LoaderState::NotStarted {
            return false;
        }
        self.files = files;
        self.current = None;
        self.objects = Vec::new();
        self.ranges = HashMap::with_capacity(self.files.len());
        self.state = LoaderState::InProgress;
        true
    }

    fn step(&mut self, ctx: &LoadContext<'_>) -> Result<LoaderStep, LoadFailure> {
        match self.state {
            LoaderState::InProgress => {}
            LoaderState::Aborted => return Ok(LoaderStep::Aborted),
            LoaderState::NotStarted | LoaderState::Completed => return Ok(LoaderStep::Done),
        }

        let next = self.current.map_or(0, |c| c + 1);
        let Some(file) = self.files.get(next).cloned() else {
            self.seal();
            return Ok(LoaderStep::Done);
        };

        match self.load_file(&file, ctx) {
            Ok(batch) => {
                let start = self.objects.len();
                self.objects.extend(batch);
                self.ranges
                    .insert(file.key().to_string(), start..self.objects.len());
                self.current = Some(next);
                if next + 1 == self.files.len() {
                    self.seal();
                    Ok(LoaderStep::Done)
                } else {
                    Ok(LoaderStep::Continue)
                }
            }
            Err(e) => {
                self.abort();
                Err(LoadFailure::from(&e))
            }
        }
    }

    fn abort(&mut self) {
        self.files = Vec::new();
        self.objects = Vec::new();
        self.ranges = HashMap::new();
        self.results = None;
        self.state = LoaderState::Aborted;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
