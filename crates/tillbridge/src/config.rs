//! CLI configuration -- thin wrapper around `tillbridge_config`.
//!
//! Adds resolution that respects `GlobalOpts` overrides (--config,
//! --platform) on top of the shared loader.

use std::path::PathBuf;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use tillbridge_config::{Settings, config_path, load_from, save_to};

/// Settings file in effect: `--config` / `TILLBRIDGE_CONFIG`, else the
/// platform default.
pub fn settings_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config_path)
}

/// Load settings with CLI flag overrides applied.
pub fn resolve_settings(global: &GlobalOpts) -> Result<Settings, CliError> {
    let path = settings_path(global);
    tracing::debug!(path = %path.display(), "loading settings");
    let mut settings = load_from(&path)?;
    if let Some(platform) = global.platform {
        settings.platform = platform;
    }
    Ok(settings)
}
