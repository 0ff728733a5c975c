//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use renderhub_core::error::AppError;
use renderhub_database::connection::mask_password;

use super::Cli;
use crate::output::{self, OutputFormat};

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration (secrets masked)
    Show,
    /// Validate the configuration
    Validate,
}

/// Execute config commands
pub fn execute(args: &ConfigArgs, cli: &Cli, format: OutputFormat) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let mut config = cli.load_config()?;
            config.database.url = mask_password(&config.database.url);
            if let Some(url) = config.queue.broker_url.as_mut() {
                *url = mask_password(url);
            }
            if !config.storage.s3.secret_key.is_empty() {
                config.storage.s3.secret_key = "****".to_string();
            }
            output::print_item(&config, format);
        }
        ConfigCommand::Validate => match cli.load_config() {
            Ok(config) => {
                output::print_success(&format!(
                    "Configuration '{}/{}' is valid",
                    cli.config, cli.env
                ));
                output::print_kv("Database", &mask_password(&config.database.url));
                output::print_kv("Queue", &config.queue.name);
                output::print_kv("Concurrency", &config.worker.concurrency.to_string());
                output::print_kv("Render tool", &config.render.tool_path.display().to_string());
                output::print_kv("Storage", &format!("{:?}", config.storage.backend));
                output::print_kv("Lease", &format!("{:?}", config.lease.backend));
                if !config.render.is_tool_available() {
                    output::print_warning("Render tool not found at the configured path");
                }
            }
            Err(e) => {
                output::print_error(&format!("Configuration invalid: {}", e));
                return Err(e);
            }
        },
    }

    Ok(())
}
