//! Error types raised by the content pipeline.
//!
//! Only [`ScanError`] is fatal to a pipeline run. Every other error is
//! recovered locally: a failing module is skipped, a failing registration
//! drops that module's loaders, a failing file aborts that loader alone.

use std::any::Any;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while classifying the data root.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("could not create data root {path}: {source}")]
    CreateRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("data root {0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("data root {path} is not accessible: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while opening a single module file.
#[derive(Debug, Error)]
pub enum ModuleLoadError {
    #[error("failed to open module library: {0}")]
    Open(#[source] libloading::Error),

    #[error("module does not export `{symbol}`: {source}")]
    MissingDeclaration {
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },

    #[error("incompatible module ABI: host={host}, module={module}")]
    AbiMismatch { host: u32, module: u32 },

    #[error("module built against content-loader {module}, host runs {host}")]
    LoaderVersionMismatch {
        host: &'static str,
        module: &'static str,
    },

    #[error("module declares an empty name")]
    EmptyName,

    #[error(transparent)]
    Version(#[from] VersionError),
}

/// Malformed `major.minor.patch` version strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("version string is empty")]
    Empty,

    #[error("invalid version component `{component}` in `{version}`")]
    InvalidComponent { version: String, component: String },

    #[error("version `{0}` has more than three components")]
    TooManyComponents(String),
}

/// Errors raised by a module's registration entry point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("loader `{loader}` declares an empty extension")]
    EmptyExtension { loader: String },

    #[error("json loader `{loader}` declares an empty json extension")]
    EmptyJsonExtension { loader: String },

    #[error("loader declares an empty name")]
    EmptyName,

    #[error("module registration panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Custom(String),
}

/// Errors that abort a single loader run.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to deserialize {path}: {source}")]
    Deserialize {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("path key `{key}` was already loaded (from {path})")]
    DuplicatePath { key: String, path: PathBuf },

    #[error("loader panicked on {path}: {message}")]
    Panicked { path: PathBuf, message: String },
}

impl LoadError {
    /// Short name of the failure kind, used in abort logs.
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::Read { .. } => "FileReadError",
            LoadError::Deserialize { .. } => "DeserializationError",
            LoadError::DuplicatePath { .. } => "DuplicatePath",
            LoadError::Panicked { .. } => "LoaderPanic",
        }
    }

    /// File the failure occurred on.
    pub fn path(&self) -> &Path {
        match self {
            LoadError::Read { path, .. }
            | LoadError::Deserialize { path, .. }
            | LoadError::DuplicatePath { path, .. }
            | LoadError::Panicked { path, .. } => path,
        }
    }
}

/// Lookup failures on a sealed result set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResultSetError {
    #[error("no object loaded from path `{0}`")]
    KeyNotFound(String),

    #[error("path `{0}` appears more than once")]
    DuplicatePath(String),
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("could not determine a default data root: {0}")]
    NoDefaultRoot(String),

    #[error("module extension must not be empty")]
    EmptyModuleExtension,
}

/// Fatal pipeline errors.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, ContentError>;

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
