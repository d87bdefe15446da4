//! Command implementations.

mod info;
mod replay;
mod validate;

pub use info::run_info;
pub use replay::run_replay;
pub use validate::run_validate;

use std::path::Path;

use contracts::TelemetryConfig;

use crate::error::{CliError, Result};

/// Load and validate the configuration at `path`
fn load_config(path: &Path) -> Result<TelemetryConfig> {
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()));
    }
    Ok(config_loader::ConfigLoader::load_from_path(path)?)
}
