//! Command implementations
//!
//! Each command is a separate module that implements its own CLI args and execution logic.

mod load;
mod scan;

pub use load::Load;
pub use scan::Scan;

use std::path::PathBuf;

use content_loader::ContentConfig;

/// Environment configuration with the data root overridden when given.
fn config(data_dir: Option<PathBuf>) -> ContentConfig {
    let mut config = ContentConfig::from_env();
    if let Some(dir) = data_dir {
        config.data_root = dir;
    }
    config
}
