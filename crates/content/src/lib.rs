//! Data-driven content loading.
//!
//! A data root is scanned and every file bucketed by extension. Modules
//! found under the root are opened, every loader announced by the host and
//! by those modules is registered once, and each loader runs over the
//! bucket matching its extension:
//! - [`scan`]: classification into extension buckets
//! - [`modules`]: dynamic modules and the module declaration ABI
//! - [`registry`]: loader discovery and typed lookup
//! - [`engine`]: step-wise execution of every loader
//! - [`results`]: read-only, path-addressable result sets
//! - [`pipeline`]: the outer driver sequencing the above
//!
//! Everything is cooperative and single-threaded: each `step` does a bounded
//! amount of work and returns, so a host can load while it keeps rendering.

pub mod config;
pub mod engine;
pub mod error;
pub mod loaders;
pub mod modules;
pub mod pipeline;
pub mod registry;
pub mod results;
pub mod scan;

pub use config::ContentConfig;
pub use engine::{EngineStep, LoadEngine, LoaderOutcome, LoaderReport};
pub use error::{
    ConfigError, ContentError, LoadError, ModuleLoadError, RegistrationError, ResultSetError,
    ScanError,
};
pub use loaders::{
    JsonLoader, JsonLoaderSlot, LoadContext, LoadFailure, LoadResult, Loader, LoaderDescriptor,
    LoaderKind, LoaderPhase, LoaderSlot, LoaderState, LoaderStep,
};
pub use modules::{LoadedModule, ModuleDeclaration, ModuleLoader, ModuleSet, ModuleVersion};
pub use pipeline::{ContentPipeline, PipelineStage, PipelineStep, ProgressSink};
pub use registry::{LoaderRegistration, Registrar, Registry, RegistryBuilder};
pub use results::{JsonResultSet, ResultSet};
pub use scan::{ExtensionIndex, FileRecord, FileScanner, ScanOptions};

#[doc(hidden)]
pub use inventory;
