//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config::{self, Settings};
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let path = config::settings_path(global);
            let settings = config::resolve_settings(global)?;
            let rendered = match global.output {
                OutputFormat::Table | OutputFormat::Plain => {
                    let source = if path.exists() {
                        path.display().to_string()
                    } else {
                        format!("{} (not found, defaults)", path.display())
                    };
                    format!("# {source}\n{}", toml::to_string_pretty(&settings)?)
                }
                OutputFormat::Json => serde_json::to_string_pretty(&settings)?,
                OutputFormat::JsonCompact => serde_json::to_string(&settings)?,
            };
            output::print_output(rendered.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::settings_path(global).display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Init { force } => {
            let path = config::settings_path(global);
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }

            let settings = Settings {
                platform: global.platform.unwrap_or_default(),
                ..Settings::default()
            };
            config::save_to(&path, &settings)?;
            if !global.quiet {
                eprintln!("Settings written to {}", path.display());
            }
            Ok(())
        }
    }
}
