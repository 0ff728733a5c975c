//! CLI command definitions and dispatch.

pub mod config;
pub mod job;
pub mod migrate;
pub mod render;

use clap::{Parser, Subcommand};

use renderhub_core::config::AppConfig;
use renderhub_core::error::AppError;
use renderhub_database::DatabasePool;

use crate::output::OutputFormat;

/// RenderHub: 3D render job pipeline administration
#[derive(Debug, Parser)]
#[command(name = "renderhub", version, about, long_about = None)]
pub struct Cli {
    /// Directory holding default.toml and the environment overlays
    #[arg(short, long, default_value = "config")]
    pub config: String,

    /// Environment overlay to load (config/<env>.toml)
    #[arg(short, long, env = "RENDERHUB_ENV", default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Enqueue a render job
    Enqueue(job::EnqueueArgs),
    /// Show queue counts, recent jobs, or one job
    Status(job::StatusArgs),
    /// Reset a failed or cancelled job to pending
    Retry(job::JobIdArg),
    /// Cancel a pending job
    Cancel(job::JobIdArg),
    /// Print the scene script generated for a render
    Script(render::ScriptArgs),
    /// Check that the configured render tool is runnable
    ToolCheck,
    /// Configuration management
    Config(config::ConfigArgs),
    /// Run database migrations
    Migrate,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Enqueue(args) => job::enqueue(args, &self.load_config()?, self.format).await,
            Commands::Status(args) => job::status(args, &self.load_config()?, self.format).await,
            Commands::Retry(args) => job::retry(args, &self.load_config()?).await,
            Commands::Cancel(args) => job::cancel(args, &self.load_config()?).await,
            Commands::Script(args) => render::script(args),
            Commands::ToolCheck => render::tool_check(&self.load_config()?).await,
            Commands::Config(args) => config::execute(args, self, self.format),
            Commands::Migrate => migrate::execute(&self.load_config()?).await,
        }
    }

    /// Load configuration from the selected directory and environment
    pub fn load_config(&self) -> Result<AppConfig, AppError> {
        AppConfig::load_from(&self.config, &self.env)
    }
}

/// Helper: connect to the database holding the job table
pub async fn connect_queue(config: &AppConfig) -> Result<DatabasePool, AppError> {
    DatabasePool::connect_url(config.queue_url(), &config.database).await
}
