//! The outer step driver.
//!
//! [`ContentPipeline`] sequences the scan, module loading, discovery and
//! loader phases. Each [`step`](ContentPipeline::step) performs one unit of
//! work so the host can keep its own loop responsive; [`run`] drives it to
//! completion.
//!
//! [`run`]: ContentPipeline::run

use std::fmt;
use std::time::Instant;

use tracing::{error, info};

use crate::config::ContentConfig;
use crate::engine::{EngineStep, LoadEngine, LoaderReport};
use crate::error::ContentError;
use crate::modules::{ModuleLoader, ModuleSet, ModuleStep};
use crate::registry::{Registry, empty_host_module, host_module};
use crate::scan::{ExtensionIndex, FileScanner, ScanStep};

/// Receives a status line and a fraction in `0.0..=1.0` after each step.
pub trait ProgressSink {
    fn report(&mut self, status: &str, progress: f32);
}

impl<F> ProgressSink for F
where
    F: FnMut(&str, f32),
{
    fn report(&mut self, status: &str, progress: f32) {
        self(status, progress)
    }
}

/// Phase the pipeline is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelineStage {
    Scanning,
    LoadingModules,
    Discovering,
    RunningLoaders,
    Finished,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Scanning => "Scanning",
            Self::LoadingModules => "Loading modules",
            Self::Discovering => "Discovering loaders",
            Self::RunningLoaders => "Running loaders",
            Self::Finished => "Finished",
        };
        f.write_str(label)
    }
}

/// Outcome of a single pipeline step.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStep {
    Continue {
        stage: PipelineStage,
        status: String,
        /// Progress within `stage`.
        progress: f32,
    },
    Finished,
}

enum Stage {
    Pending,
    Scanning(FileScanner),
    LoadingModules(ModuleLoader),
    Discovering(ModuleSet),
    RunningLoaders(LoadEngine),
    Finished,
}

/// Loads every piece of content under a data root, one step at a time.
pub struct ContentPipeline {
    config: ContentConfig,
    stage: Stage,
    index: Option<ExtensionIndex>,
    modules: ModuleSet,
    registry: Registry,
    reports: Vec<LoaderReport>,
    started: Option<Instant>,
}

impl ContentPipeline {
    pub fn new(config: ContentConfig) -> Self {
        Self {
            config,
            stage: Stage::Pending,
            index: None,
            modules: ModuleSet::default(),
            registry: Registry::builder().build(),
            reports: Vec::new(),
            started: None,
        }
    }

    pub fn config(&self) -> &ContentConfig {
        &self.config
    }

    pub fn stage(&self) -> PipelineStage {
        match self.stage {
            Stage::Pending | Stage::Scanning(_) => PipelineStage::Scanning,
            Stage::LoadingModules(_) => PipelineStage::LoadingModules,
            Stage::Discovering(_) => PipelineStage::Discovering,
            Stage::RunningLoaders(_) => PipelineStage::RunningLoaders,
            Stage::Finished => PipelineStage::Finished,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.stage, Stage::Finished)
    }

    /// Performs one unit of work.
    ///
    /// # Errors
    ///
    /// Invalid configuration and scan failures are returned once; the
    /// pipeline is then finished with nothing loaded. Module and loader
    /// failures are logged and never returned.
    pub fn step(&mut self) -> Result<PipelineStep, ContentError> {
        let stage = std::mem::replace(&mut self.stage, Stage::Finished);
        let (next, step) = match stage {
            Stage::Pending => self.start()?,
            Stage::Scanning(scanner) => self.scan(scanner)?,
            Stage::LoadingModules(loader) => self.load_module(loader),
            Stage::Discovering(modules) => self.discover(modules),
            Stage::RunningLoaders(engine) => self.run_loader(engine),
            Stage::Finished => (Stage::Finished, PipelineStep::Finished),
        };
        self.stage = next;
        Ok(step)
    }

    /// Steps and hands each status to `sink`.
    pub fn step_with(&mut self, sink: &mut dyn ProgressSink) -> Result<PipelineStep, ContentError> {
        let step = self.step()?;
        match &step {
            PipelineStep::Continue {
                status, progress, ..
            } => sink.report(status, *progress),
            PipelineStep::Finished => sink.report(&PipelineStage::Finished.to_string(), 1.0),
        }
        Ok(step)
    }

    /// Steps until finished.
    pub fn run(&mut self, sink: &mut dyn ProgressSink) -> Result<(), ContentError> {
        while self.step_with(sink)? != PipelineStep::Finished {}
        Ok(())
    }

    /// Stops between steps. An in-progress loader is aborted; loaders that
    /// never started stay `NotStarted`.
    pub fn abort(&mut self) {
        if let Stage::RunningLoaders(engine) = &mut self.stage {
            engine.abort(&mut self.registry);
            self.reports = engine.reports().to_vec();
        }
        if !self.is_finished() {
            info!("Content pipeline aborted during {}", self.stage());
        }
        self.stage = Stage::Finished;
    }

    /// Loaders discovered so far; empty until discovery ran.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The scan result, once scanning finished.
    pub fn index(&self) -> Option<&ExtensionIndex> {
        self.index.as_ref()
    }

    /// Loaded modules, the host first; empty until module loading finished.
    pub fn modules(&self) -> &ModuleSet {
        &self.modules
    }

    /// Per-loader reports, complete once finished.
    pub fn reports(&self) -> &[LoaderReport] {
        &self.reports
    }

    /// Hands over the registry with every loader's results.
    pub fn into_registry(self) -> Registry {
        self.registry
    }

    fn start(&mut self) -> Result<(Stage, PipelineStep), ContentError> {
        self.started = Some(Instant::now());
        self.config.validate().inspect_err(|e| error!("Invalid content configuration: {}", e))?;

        let scanner = FileScanner::new(&self.config.data_root, &self.config.scan_options())
            .inspect_err(|e| error!("Content scan failed: {}", e))?;

        info!("Scanning {}", self.config.data_root.display());
        let status = format!("Scanning {}", self.config.data_root.display());
        Ok((Stage::Scanning(scanner), continue_step(PipelineStage::Scanning, status, 0.0)))
    }

    fn scan(&mut self, mut scanner: FileScanner) -> Result<(Stage, PipelineStep), ContentError> {
        let step = scanner
            .step()
            .inspect_err(|e| error!("Content scan failed: {}", e))?;

        match step {
            ScanStep::Located(file) => {
                let status = format!("Located {}", file.relative);
                Ok((Stage::Scanning(scanner), continue_step(PipelineStage::Scanning, status, 0.0)))
            }
            ScanStep::Skipped => {
                let status = format!("Scanned {} file(s)", scanner.located());
                Ok((Stage::Scanning(scanner), continue_step(PipelineStage::Scanning, status, 0.0)))
            }
            ScanStep::Done => {
                let index = scanner.finish();
                info!(
                    "Located {} file(s), {} module file(s)",
                    index.len(),
                    index.modules().len()
                );
                let status = format!("Located {} file(s)", index.len());

                let host = if self.config.builtin_loaders {
                    host_module(self.config.host_name.clone(), self.config.host_version)
                } else {
                    empty_host_module(self.config.host_name.clone(), self.config.host_version)
                };
                let files: &[_] = if self.config.load_modules {
                    index.modules()
                } else {
                    &[]
                };
                let loader = ModuleLoader::new(host, files);
                self.index = Some(index);

                Ok((
                    Stage::LoadingModules(loader),
                    continue_step(PipelineStage::Scanning, status, 1.0),
                ))
            }
        }
    }

    fn load_module(&mut self, mut loader: ModuleLoader) -> (Stage, PipelineStep) {
        let status = match loader.step() {
            ModuleStep::Loaded(name) => format!("Loaded module {}", name),
            ModuleStep::Skipped(path) => format!("Skipped module {}", path),
            ModuleStep::Done => {
                let modules = loader.finish();
                info!("{} module(s) ready", modules.len());
                let status = format!("{} module(s) ready", modules.len());
                return (
                    Stage::Discovering(modules),
                    continue_step(PipelineStage::LoadingModules, status, 1.0),
                );
            }
        };
        let progress = fraction(loader.processed(), loader.total());
        (
            Stage::LoadingModules(loader),
            continue_step(PipelineStage::LoadingModules, status, progress),
        )
    }

    fn discover(&mut self, modules: ModuleSet) -> (Stage, PipelineStep) {
        let mut builder = Registry::builder();
        let count = builder.discover(&modules);
        self.registry = builder.build();
        self.modules = modules;
        info!(
            "Discovered {} loader(s) across {} module(s)",
            count,
            self.modules.len()
        );

        let status = format!("Discovered {} loader(s)", count);
        let next = match &self.index {
            Some(index) => Stage::RunningLoaders(LoadEngine::new(&self.registry, index)),
            None => Stage::Finished,
        };
        (next, continue_step(PipelineStage::Discovering, status, 1.0))
    }

    fn run_loader(&mut self, mut engine: LoadEngine) -> (Stage, PipelineStep) {
        match engine.step(&mut self.registry) {
            EngineStep::Continue { status } => {
                let progress = engine.progress();
                (
                    Stage::RunningLoaders(engine),
                    continue_step(PipelineStage::RunningLoaders, status, progress),
                )
            }
            EngineStep::Done => {
                self.reports = engine.reports().to_vec();
                if let Some(started) = self.started {
                    info!(
                        "Content loaded in {:.3}s",
                        started.elapsed().as_secs_f64()
                    );
                }
                (Stage::Finished, PipelineStep::Finished)
            }
        }
    }
}

fn continue_step(stage: PipelineStage, status: String, progress: f32) -> PipelineStep {
    PipelineStep::Continue {
        stage,
        status,
        progress,
    }
}

fn fraction(done: usize, total: usize) -> f32 {
    if total == 0 {
        1.0
    } else {
        done as f32 / total as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config(root: &std::path::Path) -> ContentConfig {
        let mut config = ContentConfig::with_root(root);
        config.load_modules = false;
        config
    }

    #[test]
    fn test_pipeline_walks_every_stage() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("notes.txt"), "hello").unwrap();

        let mut pipeline = ContentPipeline::new(config(temp.path()));
        let mut stages = Vec::new();
        loop {
            match pipeline.step().unwrap() {
                PipelineStep::Continue { stage, .. } => {
                    if stages.last() != Some(&stage) {
                        stages.push(stage);
                    }
                }
                PipelineStep::Finished => break,
            }
        }

        assert_eq!(stages[0], PipelineStage::Scanning);
        assert!(stages.contains(&PipelineStage::LoadingModules));
        assert!(stages.contains(&PipelineStage::Discovering));
        assert!(pipeline.is_finished());
        assert_eq!(pipeline.index().unwrap().len(), 1);
        assert_eq!(pipeline.modules().len(), 1);
    }

    #[test]
    fn test_scan_failure_finishes_pipeline() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("not-a-dir");
        fs::write(&file, "x").unwrap();

        let mut pipeline = ContentPipeline::new(config(&file));
        assert!(pipeline.step().is_err());
        assert!(pipeline.is_finished());
        assert_eq!(pipeline.step().unwrap(), PipelineStep::Finished);
        assert!(pipeline.registry().is_empty());
    }

    #[test]
    fn test_abort_stops_between_steps() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "a").unwrap();

        let mut pipeline = ContentPipeline::new(config(temp.path()));
        pipeline.step().unwrap();
        pipeline.abort();

        assert!(pipeline.is_finished());
        assert_eq!(pipeline.step().unwrap(), PipelineStep::Finished);
        assert!(pipeline.index().is_none());
    }

    #[test]
    fn test_progress_reaches_one() {
        let temp = TempDir::new().unwrap();
        let mut pipeline = ContentPipeline::new(config(temp.path()));

        let mut last = (String::new(), 0.0f32);
        pipeline
            .run(&mut |status: &str, progress: f32| last = (status.to_string(), progress))
            .unwrap();

        assert_eq!(last.0, "Finished");
        assert_eq!(last.1, 1.0);
    }
}
