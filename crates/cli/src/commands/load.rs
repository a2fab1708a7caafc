//! Run the content pipeline

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use content_loader::{
    ContentPipeline, LoaderOutcome, LoaderState, PipelineStage, PipelineStep, ProgressSink,
};

/// Run the full pipeline and print a per-loader summary
#[derive(Parser, Debug)]
pub struct Load {
    /// Data root (defaults to CONTENT_DATA_DIR or GameData next to the executable)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Do not open module files found under the data root
    #[arg(long)]
    pub no_modules: bool,

    /// Pause between steps, in milliseconds
    #[arg(long, default_value_t = 0)]
    pub tick_ms: u64,
}

/// Prints one line per stage and the latest status.
struct StageReporter {
    stage: Option<PipelineStage>,
}

impl ProgressSink for StageReporter {
    fn report(&mut self, status: &str, progress: f32) {
        eprintln!(
            "  {} {}",
            style(format!("{:>3.0}%", progress * 100.0)).dim(),
            status
        );
    }
}

impl Load {
    pub fn execute(self) -> Result<()> {
        let mut config = super::config(self.data_dir);
        if self.no_modules {
            config.load_modules = false;
        }
        config = config.with_host(
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION").parse().unwrap_or_default(),
        );

        let root = config.data_root.clone();
        let mut pipeline = ContentPipeline::new(config);
        let mut reporter = StageReporter { stage: None };
        let tick = Duration::from_millis(self.tick_ms);

        loop {
            let step = pipeline
                .step()
                .with_context(|| format!("Failed to load content from {}", root.display()))?;

            let PipelineStep::Continue {
                stage,
                status,
                progress,
            } = step
            else {
                break;
            };

            if reporter.stage != Some(stage) {
                reporter.stage = Some(stage);
                eprintln!("{}", style(stage).bold().cyan());
            }
            reporter.report(&status, progress);

            if !tick.is_zero() {
                thread::sleep(tick);
            }
        }

        print_summary(&pipeline);
        Ok(())
    }
}

fn print_summary(pipeline: &ContentPipeline) {
    println!();
    println!("{}", style("=== Content Summary ===").bold().green());

    println!("{}", style("Modules:").bold().yellow());
    for module in pipeline.modules().iter() {
        println!(
            "  {} v{} {}",
            style(module.name()).cyan(),
            module.version(),
            style(module.relative_path().unwrap_or("(host)")).dim()
        );
    }

    println!();
    println!("{}", style("Loaders:").bold().yellow());
    for info in pipeline.registry().loaders() {
        let report = pipeline
            .reports()
            .iter()
            .find(|r| r.name == info.descriptor.name);

        let state = match info.state {
            LoaderState::Completed => style("completed").green(),
            LoaderState::Aborted => style("aborted").red(),
            LoaderState::InProgress => style("in progress").yellow(),
            LoaderState::NotStarted => match report.map(|r| r.outcome) {
                Some(LoaderOutcome::Skipped) => style("no files").dim(),
                _ => style("not started").dim(),
            },
        };

        let elapsed = report.map(|r| r.elapsed).unwrap_or_default();
        println!(
            "  {:<32} {:<12} {:>6} object(s) {:>9.3}s  [{}]",
            info.descriptor.to_string(),
            state,
            info.loaded.unwrap_or(0),
            elapsed.as_secs_f64(),
            info.module
        );
    }
}
