//! Read access to other loaders' results during a run.

use std::path::Path;

use crate::loaders::{JsonLoader, Loader};
use crate::registry::Registry;
use crate::results::{JsonResultSet, ResultSet};

/// Engine phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoaderPhase {
    Plain,
    Json,
}

/// Handed to loaders while they run.
///
/// Only results of loaders from an earlier phase are visible, and only once
/// those loaders completed, so a loader never observes partial data.
pub struct LoadContext<'a> {
    registry: &'a Registry,
    phase: LoaderPhase,
    data_root: &'a Path,
}

impl<'a> LoadContext<'a> {
    pub(crate) fn new(registry: &'a Registry, phase: LoaderPhase, data_root: &'a Path) -> Self {
        Self {
            registry,
            phase,
            data_root,
        }
    }

    pub fn phase(&self) -> LoaderPhase {
        self.phase
    }

    pub fn data_root(&self) -> &'a Path {
        self.data_root
    }

    /// Completed results of plain loader `L`.
    pub fn get<L: Loader>(&self) -> Option<&'a ResultSet<L::Object>> {
        if LoaderPhase::Plain >= self.phase {
            return None;
        }
        self.registry.get::<L>()?.objects()
    }

    /// Completed results of JSON loader `L`.
    pub fn get_json<L: JsonLoader>(&self) -> Option<&'a JsonResultSet<L::Object>> {
        if LoaderPhase::Json >= self.phase {
            return None;
        }
        self.registry.get_json::<L>()?.objects()
    }
}
