//! Database migration CLI command.

use renderhub_core::config::AppConfig;
use renderhub_core::error::AppError;
use renderhub_database::migration::run_migrations;

use crate::output;

/// Run pending migrations against the queue database
pub async fn execute(config: &AppConfig) -> Result<(), AppError> {
    let pool = super::connect_queue(config).await?;
    run_migrations(pool.pool()).await?;
    pool.close().await;
    output::print_success("Migrations applied");
    Ok(())
}
