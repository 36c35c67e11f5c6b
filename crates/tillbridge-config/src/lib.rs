//! Configuration for tillbridge hosts.
//!
//! A TOML settings file plus `TILLBRIDGE_` environment overrides, layered
//! with figment and translated into `tillbridge_core::TerminalConfig` and
//! `tillbridge_api::WebConfig`. The core crates never read from disk; this
//! crate is the only place settings come from a file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tillbridge_api::WebConfig;
use tillbridge_api::transport::DEFAULT_API_BASE;
use tillbridge_core::{Platform, TerminalConfig};

/// Prefix for environment overrides. Nested keys are separated by `__`,
/// e.g. `TILLBRIDGE_WEB__API_BASE`.
pub const ENV_PREFIX: &str = "TILLBRIDGE_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// Top-level TOML settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    /// Host platform: `ios`, `android`, or `web`.
    #[serde(default)]
    pub platform: Platform,

    /// Items buffered per outgoing stream.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    #[serde(default)]
    pub web: WebSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            platform: Platform::default(),
            event_buffer: default_event_buffer(),
            web: WebSettings::default(),
        }
    }
}

/// Browser backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WebSettings {
    /// Base URL of the payments REST API.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            timeout: default_timeout(),
        }
    }
}

fn default_event_buffer() -> usize {
    TerminalConfig::default().event_buffer
}
fn default_api_base() -> String {
    DEFAULT_API_BASE.into()
}
fn default_timeout() -> u64 {
    30
}

impl Settings {
    /// Check values figment cannot reject on type alone.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_buffer == 0 {
            return Err(ConfigError::Validation {
                field: "event_buffer".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.web.timeout == 0 {
            return Err(ConfigError::Validation {
                field: "web.timeout".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        let url = self
            .web_config()
            .base_url()
            .map_err(|e| ConfigError::Validation {
                field: "web.api_base".into(),
                reason: e.to_string(),
            })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation {
                field: "web.api_base".into(),
                reason: format!("expected an http(s) URL, got '{}'", self.web.api_base),
            });
        }
        Ok(())
    }

    pub fn terminal_config(&self) -> TerminalConfig {
        TerminalConfig {
            platform: self.platform,
            event_buffer: self.event_buffer,
        }
    }

    pub fn web_config(&self) -> WebConfig {
        WebConfig::new(self.web.api_base.clone()).timeout(Duration::from_secs(self.web.timeout))
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the settings file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "tillbridge", "tillbridge").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("tillbridge");
    p
}

// ── Loading ─────────────────────────────────────────────────────────

/// Layered provider: defaults, then the file at `path` if it exists, then
/// the environment.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load and validate settings from `path` plus the environment.
pub fn load_from(path: &Path) -> Result<Settings, ConfigError> {
    let settings: Settings = figment(path).extract()?;
    settings.validate()?;
    Ok(settings)
}

/// Load settings from the canonical path.
pub fn load_settings() -> Result<Settings, ConfigError> {
    load_from(&config_path())
}

// ── Saving ──────────────────────────────────────────────────────────

/// Serialize settings to TOML at `path`, creating parent directories.
pub fn save_to(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(settings)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}
