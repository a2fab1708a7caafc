//! Drives registered loaders through their file buckets.
//!
//! Plain loaders run first, then JSON loaders, each phase in discovery
//! order. Every call to [`LoadEngine::step`] does at most one file of work,
//! so a driver can interleave loading with its own frame loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::loaders::{LoaderKind, LoaderPhase, LoaderState, LoaderStep};
use crate::registry::Registry;
use crate::scan::{ExtensionIndex, FileRecord};

/// How a loader's run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderOutcome {
    Completed,
    Aborted,
    /// No file matched the loader's extension.
    Skipped,
    /// The loader had already run before this engine reached it.
    AlreadyRan,
}

/// Diagnostics for one loader, recorded when its run ends.
#[derive(Debug, Clone)]
pub struct LoaderReport {
    pub name: String,
    pub kind: LoaderKind,
    pub outcome: LoaderOutcome,
    /// Files in the loader's bucket.
    pub files: usize,
    /// Objects sealed into the result set; zero unless completed.
    pub objects: usize,
    pub elapsed: Duration,
}

/// Outcome of a single engine step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStep {
    /// Work was done; `status` describes it.
    Continue { status: String },
    /// Every loader has been run or skipped.
    Done,
}

struct Planned {
    slot: usize,
    phase: LoaderPhase,
    name: String,
    kind: LoaderKind,
    files: Vec<Arc<FileRecord>>,
}

struct ActiveRun {
    item: usize,
    next_file: usize,
    started: Instant,
}

/// Step-wise executor for every loader in a registry.
pub struct LoadEngine {
    data_root: PathBuf,
    queue: Vec<Planned>,
    cursor: usize,
    active: Option<ActiveRun>,
    phase: Option<LoaderPhase>,
    total_files: usize,
    processed_files: usize,
    reports: Vec<LoaderReport>,
}

impl LoadEngine {
    /// Plans a run of every loader in `registry` over the buckets of `index`.
    pub fn new(registry: &Registry, index: &ExtensionIndex) -> Self {
        let mut queue = Vec::with_capacity(registry.len());

        for phase in [LoaderPhase::Plain, LoaderPhase::Json] {
            for slot in 0..registry.len() {
                let Some(descriptor) = registry.descriptor_at(slot) else {
                    continue;
                };
                if descriptor.kind.phase() != phase {
                    continue;
                }

                let files = match &descriptor.json_extension {
                    Some(json_extension) => index
                        .json_bucket(&descriptor.extension, json_extension)
                        .to_vec(),
                    None => index.merged_bucket(descriptor.extensions()),
                };

                queue.push(Planned {
                    slot,
                    phase,
                    name: descriptor.name.clone(),
                    kind: descriptor.kind,
                    files,
                });
            }
        }

        let total_files = queue.iter().map(|p| p.files.len()).sum();

        Self {
            data_root: index.root().to_path_buf(),
            queue,
            cursor: 0,
            active: None,
            phase: None,
            total_files,
            processed_files: 0,
            reports: Vec::new(),
        }
    }

    /// Performs one unit of work: starts or skips a loader, or loads one
    /// file of the active loader.
    pub fn step(&mut self, registry: &mut Registry) -> EngineStep {
        if let Some(active) = self.active.as_mut() {
            let planned = &self.queue[active.item];
            let file = Arc::clone(&planned.files[active.next_file]);
            let step = registry.step_at(planned.slot, planned.phase, &self.data_root);
            self.processed_files += 1;
            active.next_file += 1;

            let status = format!("[{}] Loading {}", planned.name, file.relative);
            match step {
                Ok(LoaderStep::Continue) => {}
                Ok(LoaderStep::Done) => self.finish_active(registry, LoaderOutcome::Completed),
                Ok(LoaderStep::Aborted) => self.finish_active(registry, LoaderOutcome::Aborted),
                Err(failure) => {
                    error!(
                        "[{}] {} while loading {}: {}",
                        planned.name,
                        failure.kind,
                        failure.path.display(),
                        failure.message
                    );
                    self.finish_active(registry, LoaderOutcome::Aborted);
                }
            }
            return EngineStep::Continue { status };
        }

        let Some(planned) = self.queue.get(self.cursor) else {
            return EngineStep::Done;
        };
        let item = self.cursor;
        self.cursor += 1;

        if self.phase != Some(planned.phase) {
            self.phase = Some(planned.phase);
            info!("Starting {:?} loader phase", planned.phase);
        }

        if planned.files.is_empty() {
            info!("[{}] No files to load, skipping", planned.name);
            let status = format!("[{}] Nothing to load", planned.name);
            self.push_report(item, LoaderOutcome::Skipped, 0, Duration::ZERO);
            return EngineStep::Continue { status };
        }

        if !registry.begin_at(planned.slot, planned.files.clone()) {
            info!("[{}] Already ran, skipping", planned.name);
            let status = format!("[{}] Already loaded", planned.name);
            self.processed_files += planned.files.len();
            self.push_report(item, LoaderOutcome::AlreadyRan, 0, Duration::ZERO);
            return EngineStep::Continue { status };
        }

        info!(
            "[{}] Starting loader over {} file(s)",
            planned.name,
            planned.files.len()
        );
        let status = format!("[{}] Starting", planned.name);
        self.active = Some(ActiveRun {
            item,
            next_file: 0,
            started: Instant::now(),
        });
        EngineStep::Continue { status }
    }

    /// Steps until every loader has been handled.
    pub fn run(&mut self, registry: &mut Registry) {
        while self.step(registry) != EngineStep::Done {}
    }

    /// Aborts the loader in progress and drops the rest of the plan.
    ///
    /// Loaders that never started stay `NotStarted`.
    pub fn abort(&mut self, registry: &mut Registry) {
        if let Some(active) = self.active.as_ref() {
            registry.abort_at(self.queue[active.item].slot);
            self.finish_active(registry, LoaderOutcome::Aborted);
        }
        self.cursor = self.queue.len();
    }

    fn finish_active(&mut self, registry: &Registry, outcome: LoaderOutcome) {
        let Some(active) = self.active.take() else {
            return;
        };
        let elapsed = active.started.elapsed();
        let planned = &self.queue[active.item];
        let total = planned.files.len();

        match outcome {
            LoaderOutcome::Completed => {
                let objects = registry.loaded_count_at(planned.slot).unwrap_or(0);
                info!(
                    "[{}] Loaded {} object(s) from {} file(s) in {:.3}s",
                    planned.name,
                    objects,
                    total,
                    elapsed.as_secs_f64()
                );
                self.push_report(active.item, outcome, objects, elapsed);
            }
            _ => {
                warn!(
                    "[{}] Aborted after {} of {} file(s) in {:.3}s",
                    planned.name,
                    active.next_file,
                    total,
                    elapsed.as_secs_f64()
                );
                debug_assert_eq!(registry.state_at(planned.slot), Some(LoaderState::Aborted));
                self.processed_files += total - active.next_file;
                self.push_report(active.item, outcome, 0, elapsed);
            }
        }
    }

    fn push_report(
        &mut self,
        item: usize,
        outcome: LoaderOutcome,
        objects: usize,
        elapsed: Duration,
    ) {
        let planned = &self.queue[item];
        self.reports.push(LoaderReport {
            name: planned.name.clone(),
            kind: planned.kind,
            outcome,
            files: planned.files.len(),
            objects,
            elapsed,
        });
    }

    /// Fraction of all bucketed files handled so far, in `0.0..=1.0`.
    pub fn progress(&self) -> f32 {
        if self.total_files == 0 {
            return if self.is_done() { 1.0 } else { 0.0 };
        }
        (self.processed_files as f32 / self.total_files as f32).min(1.0)
    }

    pub fn is_done(&self) -> bool {
        self.active.is_none() && self.cursor >= self.queue.len()
    }

    /// Reports of loaders handled so far, in run order.
    pub fn reports(&self) -> &[LoaderReport] {
        &self.reports
    }

    /// Number of loaders planned for this run.
    pub fn planned(&self) -> usize {
        self.queue.len()
    }
}
