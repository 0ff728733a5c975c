//! RenderHub render worker
//!
//! Main entry point that wires all crates together and runs the render
//! queue consumer until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use renderhub_core::config::AppConfig;
use renderhub_core::error::AppError;
use renderhub_database::{DatabasePool, DesignRepository, JobRepository};
use renderhub_render::{BlenderTool, RenderPipeline, RenderTool};
use renderhub_storage::{HttpAssetFetcher, build_artifact_storage};
use renderhub_worker::executor::JobExecutor;
use renderhub_worker::jobs::{RenderJobHandler, RetentionJobHandler, WorkdirSweepJobHandler};
use renderhub_worker::{CronScheduler, JobQueue, PgDesignStore, WorkerRunner};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Worker error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from files and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let dir = std::env::var("RENDERHUB_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    let env = std::env::var("RENDERHUB_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load_from(&dir, &env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main worker run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting RenderHub worker v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Working root ─────────────────────────────────────
    tokio::fs::create_dir_all(&config.render.working_root)
        .await
        .map_err(|e| {
            AppError::internal(format!(
                "Failed to create working root '{}': {}",
                config.render.working_root.display(),
                e
            ))
        })?;

    // ── Step 2: Database connections + migrations ────────────────
    tracing::info!("Connecting to database...");
    let db_pool = DatabasePool::connect(&config.database).await?;
    let queue_pool = if config.queue_url() == config.database.url {
        db_pool.clone()
    } else {
        tracing::info!("Connecting to queue database...");
        DatabasePool::connect_url(config.queue_url(), &config.database).await?
    };

    if config.database.run_migrations {
        renderhub_database::migration::run_migrations(queue_pool.pool()).await?;
    }

    // ── Step 3: Collaborators ────────────────────────────────────
    let storage = build_artifact_storage(&config.storage).await?;
    if !storage.health_check().await? {
        tracing::warn!(
            "Artifact storage '{}' failed its health check",
            storage.provider_type()
        );
    }

    let fetcher = Arc::new(HttpAssetFetcher::new(Duration::from_secs(
        config.render.asset_download_timeout_seconds,
    ))?);
    let lease = renderhub_lease::build_design_lease(&config.lease).await?;

    let blender = BlenderTool::from_config(&config.render);
    if let Err(e) = blender.check() {
        tracing::warn!("{}; render jobs will fail until it is installed", e);
    }
    let tool: Arc<dyn RenderTool> = Arc::new(blender);

    let worker_id = format!("render-worker-{}", &uuid::Uuid::now_v7().simple().to_string()[..12]);

    // ── Step 4: Render pipeline ──────────────────────────────────
    let design_store = Arc::new(PgDesignStore::new(DesignRepository::new(
        db_pool.pool().clone(),
    )));
    let pipeline = Arc::new(
        RenderPipeline::new(config.render.clone(), design_store, Arc::clone(&storage), fetcher, tool)
            .with_lease(
                lease,
                Duration::from_secs(config.lease.ttl_seconds),
                config.lease.key_prefix.clone(),
            )
            .with_holder_id(worker_id.clone()),
    );

    tracing::info!(
        worker_id = %worker_id,
        concurrency = config.worker.concurrency,
        queue = %config.queue.name,
        tool = %config.render.tool_path.display(),
        storage = storage.provider_type(),
        working_root = %config.render.working_root.display(),
        "3D render worker ready"
    );

    if !config.worker.enabled {
        tracing::info!("Worker disabled by configuration; exiting");
        db_pool.close().await;
        return Ok(());
    }

    // ── Step 5: Queue, handlers, runner ──────────────────────────
    let job_repo = Arc::new(JobRepository::new(queue_pool.pool().clone()));
    let job_queue = Arc::new(JobQueue::new(job_repo, worker_id.clone()));

    let mut job_executor = JobExecutor::new();
    job_executor.register(Arc::new(RenderJobHandler::new(pipeline.clone())));
    job_executor.register(Arc::new(RetentionJobHandler::new(
        Arc::clone(&job_queue),
        &config.queue,
        &config.render,
    )));
    job_executor.register(Arc::new(WorkdirSweepJobHandler::new(&config.render)));
    let job_executor = Arc::new(job_executor);

    let worker_runner = WorkerRunner::new(
        Arc::clone(&job_queue),
        job_executor,
        config.worker.clone(),
        config.queue.clone(),
    );

    // ── Step 6: Scheduler ────────────────────────────────────────
    let mut scheduler = CronScheduler::new(Arc::clone(&job_queue)).await?;
    scheduler.register_default_tasks(&config.worker).await?;
    scheduler.start().await?;

    // ── Step 7: Run until shutdown ───────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = tokio::spawn(async move {
        worker_runner.run(shutdown_rx).await;
    });

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");
    let _ = shutdown_tx.send(true);

    if let Err(e) = worker_handle.await {
        tracing::error!("Worker task ended abnormally: {}", e);
    }

    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!("Scheduler shutdown failed: {}", e);
    }

    let snapshot = pipeline.metrics().snapshot();
    tracing::info!(
        started = snapshot.renders_started,
        succeeded = snapshot.renders_succeeded,
        failed = snapshot.renders_failed,
        timed_out = snapshot.renders_timed_out,
        rejected = snapshot.renders_rejected,
        previews = snapshot.previews_generated,
        previews_skipped = snapshot.previews_skipped,
        bytes_published = snapshot.bytes_published,
        p50 = ?snapshot.duration_p50,
        p95 = ?snapshot.duration_p95,
        "Render metrics at shutdown"
    );

    queue_pool.close().await;
    db_pool.close().await;

    tracing::info!("RenderHub worker shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
