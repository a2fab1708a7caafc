//! Loader capabilities and the per-loader step state machine.
//!
//! A [`Loader`] turns one file into one object. A [`JsonLoader`] turns one
//! `name.secondary.json` file into an array of objects. Implementations only
//! describe themselves and parse bytes; the run bookkeeping (state, current
//! index, working buffers, sealing) lives in [`LoaderSlot`] and
//! [`JsonLoaderSlot`], which the registry owns and the engine drives.

#[cfg(feature = "builtins")]
pub mod builtin;
mod context;
mod slot;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::error::LoadError;
use crate::scan::{FileRecord, JSON_EXTENSION};

pub use context::{LoadContext, LoaderPhase};
pub use slot::{JsonLoaderSlot, LoaderSlot};
pub(crate) use slot::ErasedLoader;

/// Result type returned by loader implementations.
pub type LoadResult<T> = anyhow::Result<T>;

/// Loads one object per file of a declared extension.
pub trait Loader: Send + Sync + 'static {
    /// Object produced from each file.
    type Object: Send + Sync + 'static;

    /// Name used in logs and progress reports.
    fn name(&self) -> &str;

    /// Primary extension this loader claims, with or without leading dot.
    fn extension(&self) -> &str;

    /// Further extensions whose files this loader also loads.
    fn extra_extensions(&self) -> &[&str] {
        &[]
    }

    /// Parses the content of `file`.
    fn load_object(&self, file: &FileRecord, data: &[u8]) -> LoadResult<Self::Object>;
}

/// Loads arrays of objects from `name.<json extension>.<extension>` files.
pub trait JsonLoader: Send + Sync + 'static {
    /// Element type of each file's array.
    type Object: DeserializeOwned + Send + Sync + 'static;

    fn name(&self) -> &str;

    /// Secondary extension this loader claims (`weapon` in `a.weapon.json`).
    fn json_extension(&self) -> &str;

    /// Primary extension this loader claims.
    fn extension(&self) -> &str {
        JSON_EXTENSION
    }

    /// Deserializes the content of `file` into its array.
    fn parse(&self, _file: &FileRecord, data: &[u8]) -> LoadResult<Vec<Self::Object>> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Post-processes a parsed file, with access to the completed results of
    /// plain loaders.
    fn resolve(
        &self,
        _file: &FileRecord,
        objects: Vec<Self::Object>,
        _ctx: &LoadContext<'_>,
    ) -> LoadResult<Vec<Self::Object>> {
        Ok(objects)
    }
}

/// Which capability a registered loader implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoaderKind {
    Plain,
    Json,
}

impl LoaderKind {
    /// Engine phase in which loaders of this kind run.
    pub fn phase(self) -> LoaderPhase {
        match self {
            LoaderKind::Plain => LoaderPhase::Plain,
            LoaderKind::Json => LoaderPhase::Json,
        }
    }
}

/// Static description of a registered loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderDescriptor {
    pub name: String,
    pub kind: LoaderKind,
    /// Primary extension, without leading dot.
    pub extension: String,
    /// Additional primary extensions, plain loaders only.
    pub extra_extensions: Vec<String>,
    /// Secondary extension, JSON loaders only.
    pub json_extension: Option<String>,
}

impl LoaderDescriptor {
    /// Every primary extension this loader reads.
    pub fn extensions(&self) -> impl Iterator<Item = &str> + '_ {
        std::iter::once(self.extension.as_str())
            .chain(self.extra_extensions.iter().map(String::as_str))
    }
}

impl fmt::Display for LoaderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.json_extension {
            Some(json) => write!(f, "{} (*.{}.{})", self.name, json, self.extension),
            None => write!(f, "{} (*.{})", self.name, self.extension),
        }
    }
}

/// Lifecycle of a single loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoaderState {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Aborted,
}

impl LoaderState {
    /// `Completed` and `Aborted` are final.
    pub fn is_terminal(self) -> bool {
        matches!(self, LoaderState::Completed | LoaderState::Aborted)
    }
}

/// Signal returned by one loader step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoaderStep {
    /// One file was loaded; more remain.
    Continue,
    /// The bucket is exhausted and the results are sealed.
    Done,
    /// A file failed; the remaining files will not be attempted.
    Aborted,
}

/// A file that aborted its loader.
///
/// Slots hand this back to the engine rather than logging it themselves,
/// so a loader compiled into a module still reports through the host's
/// subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    /// Short failure kind, see [`LoadError::kind`].
    pub kind: &'static str,
    pub path: PathBuf,
    pub message: String,
}

impl From<&LoadError> for LoadFailure {
    fn from(err: &LoadError) -> Self {
        Self {
            kind: err.kind(),
            path: err.path().to_path_buf(),
            message: err.to_string(),
        }
    }
}

/// Reads the whole content of `path`.
pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>, LoadError> {
    std::fs::read(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })
}
