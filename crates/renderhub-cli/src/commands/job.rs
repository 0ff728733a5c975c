//! Render job queue CLI commands.

use std::sync::Arc;

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use renderhub_core::config::AppConfig;
use renderhub_core::error::AppError;
use renderhub_core::types::id::{BrandId, DesignId, JobId, ProductId, UserId};
use renderhub_database::JobRepository;
use renderhub_entity::job::{Job, JobPriority, JobStatus};
use renderhub_entity::render::{RenderJob, RenderOptions, RenderType};
use renderhub_worker::JobQueue;

use super::render::QualityArg;
use crate::output::{self, OutputFormat};

/// Arguments for `enqueue`
#[derive(Debug, Args)]
pub struct EnqueueArgs {
    /// Design to render
    #[arg(long)]
    pub design: DesignId,
    /// Product the design customizes
    #[arg(long)]
    pub product: ProductId,
    /// Owning brand
    #[arg(long)]
    pub brand: BrandId,
    /// Requesting user
    #[arg(long)]
    pub user: Option<UserId>,
    /// Output format (gltf, stl, obj)
    #[arg(short = 't', long = "type", default_value = "gltf")]
    pub render_type: RenderType,
    /// Quality tier
    #[arg(short, long, value_enum, default_value = "medium")]
    pub quality: QualityArg,
    /// Export animation data (glTF only)
    #[arg(long)]
    pub animations: bool,
    /// Queue priority (low, normal, high, critical)
    #[arg(long, default_value = "normal")]
    pub priority: JobPriority,
}

/// Arguments for `status`
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Show a single job
    #[arg(long)]
    pub job: Option<JobId>,
    /// Only list jobs with this status
    #[arg(long)]
    pub status: Option<JobStatus>,
    /// Number of recent jobs to list
    #[arg(long, default_value_t = 20)]
    pub limit: i64,
}

/// A job id argument
#[derive(Debug, Args)]
pub struct JobIdArg {
    /// Job identifier
    pub id: JobId,
}

/// One row of the job listing
#[derive(Debug, Serialize, Tabled)]
pub struct JobRow {
    /// Job id
    #[tabled(rename = "ID")]
    pub id: String,
    /// Job type
    #[tabled(rename = "Type")]
    pub job_type: String,
    /// Status
    #[tabled(rename = "Status")]
    pub status: String,
    /// Attempts used / allowed
    #[tabled(rename = "Attempts")]
    pub attempts: String,
    /// Design from the payload, when present
    #[tabled(rename = "Design")]
    pub design: String,
    /// Last failure kind
    #[tabled(rename = "Last Error")]
    pub last_error: String,
    /// Enqueue time
    #[tabled(rename = "Created")]
    pub created_at: String,
}

impl From<&Job> for JobRow {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.to_string(),
            job_type: job.job_type.clone(),
            status: job.status.to_string(),
            attempts: format!("{}/{}", job.attempts, job.max_attempts),
            design: job
                .payload
                .get("designId")
                .and_then(|v| v.as_str())
                .unwrap_or("-")
                .to_string(),
            last_error: job.last_error_kind.clone().unwrap_or_else(|| "-".to_string()),
            created_at: job.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Per-status count row
#[derive(Debug, Serialize, Tabled)]
struct CountRow {
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Jobs")]
    count: i64,
}

async fn job_queue(config: &AppConfig) -> Result<JobQueue, AppError> {
    let pool = super::connect_queue(config).await?;
    let repo = Arc::new(JobRepository::new(pool.pool().clone()));
    Ok(JobQueue::new(repo, "renderhub-cli"))
}

/// Build the render payload from CLI arguments
pub fn render_job(args: &EnqueueArgs) -> Result<RenderJob, AppError> {
    if !args.render_type.is_supported() {
        return Err(AppError::validation(format!(
            "Render type '{}' is not supported",
            args.render_type
        )));
    }

    let mut options = RenderOptions::with_quality(args.quality.into());
    if args.animations {
        options.include_animations = Some(true);
    }

    Ok(RenderJob {
        design_id: args.design,
        product_id: args.product,
        brand_id: args.brand,
        user_id: args.user,
        render_type: args.render_type,
        options,
    })
}

/// Enqueue a render job
pub async fn enqueue(
    args: &EnqueueArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let render = render_job(args)?;
    let queue = job_queue(config).await?;
    let job = queue
        .enqueue_render(
            &config.queue.name,
            &render,
            args.priority,
            config.queue.max_attempts,
        )
        .await?;

    match format {
        OutputFormat::Json => output::print_item(&job, format),
        OutputFormat::Table => output::print_success(&format!(
            "Render job enqueued (id: {}, design: {}, type: {})",
            job.id, render.design_id, render.render_type
        )),
    }
    Ok(())
}

/// Show queue status
pub async fn status(
    args: &StatusArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let queue = job_queue(config).await?;

    if let Some(id) = args.job {
        let job = queue
            .find(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Job {} not found", id)))?;
        output::print_item(&job, format);
        return Ok(());
    }

    let stats = queue.stats(&config.queue.name).await?;
    let recent = queue
        .recent(&config.queue.name, args.status, args.limit)
        .await?;

    match format {
        OutputFormat::Json => output::print_item(
            &serde_json::json!({ "stats": stats, "jobs": recent }),
            format,
        ),
        OutputFormat::Table => {
            println!("Queue '{}':", stats.queue);
            let counts: Vec<CountRow> = stats
                .counts
                .iter()
                .map(|(status, count)| CountRow {
                    status: status.clone(),
                    count: *count,
                })
                .collect();
            output::print_list(&counts, format);

            let rows: Vec<JobRow> = recent.iter().map(JobRow::from).collect();
            output::print_list(&rows, format);
        }
    }
    Ok(())
}

/// Retry a failed or cancelled job
pub async fn retry(args: &JobIdArg, config: &AppConfig) -> Result<(), AppError> {
    let queue = job_queue(config).await?;
    if queue.retry(args.id).await? {
        output::print_success(&format!("Job {} reset to pending", args.id));
    } else {
        output::print_warning(&format!(
            "Job {} is not failed or cancelled; nothing to retry",
            args.id
        ));
    }
    Ok(())
}

/// Cancel a pending job
pub async fn cancel(args: &JobIdArg, config: &AppConfig) -> Result<(), AppError> {
    let queue = job_queue(config).await?;
    if queue.cancel(args.id).await? {
        output::print_success(&format!("Job {} cancelled", args.id));
    } else {
        output::print_warning(&format!("Job {} is not pending; not cancelled", args.id));
    }
    Ok(())
}
