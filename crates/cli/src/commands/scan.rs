//! Classify the data root

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;

/// Classify files under the data root without loading them
#[derive(Parser, Debug)]
pub struct Scan {
    /// Data root (defaults to CONTENT_DATA_DIR or GameData next to the executable)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Follow symbolic links
    #[arg(long)]
    pub follow_links: bool,
}

impl Scan {
    pub fn execute(self) -> Result<()> {
        let mut config = super::config(self.data_dir);
        config.follow_links |= self.follow_links;
        config.validate()?;

        let index = content_loader::FileScanner::scan(&config.data_root, &config.scan_options())
            .with_context(|| format!("Failed to scan {}", config.data_root.display()))?;

        println!(
            "{} {}",
            style("Data root:").bold().cyan(),
            index.root().display()
        );
        println!("{} {}", style("Files:").bold().cyan(), index.len());
        println!();

        let mut extensions: Vec<&str> = index.extensions().collect();
        extensions.sort_unstable();

        println!("{}", style("Extensions:").bold().yellow());
        for extension in extensions {
            println!("  .{:<16} {}", extension, index.bucket(extension).len());
        }

        let mut json: Vec<(&str, &str)> = index.json_extensions().collect();
        json.sort_unstable();
        if !json.is_empty() {
            println!();
            println!("{}", style("Secondary extensions:").bold().yellow());
            for (extension, secondary) in json {
                let label = format!("{}.{}", secondary, extension);
                println!(
                    "  .{:<16} {}",
                    label,
                    index.json_bucket(extension, secondary).len()
                );
            }
        }

        if !index.modules().is_empty() {
            println!();
            println!("{}", style("Modules:").bold().yellow());
            for module in index.modules() {
                println!("  {}", module.relative);
            }
        }

        Ok(())
    }
}
