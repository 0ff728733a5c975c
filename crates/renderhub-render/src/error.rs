//! Typed failures of the render pipeline.
//!
//! Every failure that reaches the orchestrator is a [`RenderError`]. Its
//! [`RenderErrorKind`] is the stable wire name stored on the job row, and its
//! [`RetryDisposition`] tells the queue whether another attempt can help.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use renderhub_core::error::{AppError, ErrorKind};
use renderhub_core::types::id::DesignId;
use renderhub_entity::design::DesignStatus;
use renderhub_entity::render::RenderType;

/// Unified error type for all render pipeline operations.
#[derive(Debug, Error)]
pub enum RenderError {
    // --- Intake ---
    /// The design record does not exist.
    #[error("Design {design_id} not found")]
    NotFound {
        /// Requested design.
        design_id: DesignId,
    },

    /// The design is not in the completed state.
    #[error("Design {design_id} is {status}, expected COMPLETED")]
    InvalidState {
        /// Requested design.
        design_id: DesignId,
        /// Its current status.
        status: DesignStatus,
    },

    /// The requested output format cannot be produced.
    #[error("Render type '{render_type}' is not supported")]
    UnsupportedFormat {
        /// Requested format.
        render_type: RenderType,
    },

    /// Another job holds the design's lease.
    #[error("Design {design_id} is being rendered by another job")]
    DesignBusy {
        /// Contended design.
        design_id: DesignId,
    },

    /// The lease backend could not be reached.
    #[error("Lease backend unavailable: {0}")]
    Lease(AppError),

    // --- Staging and scripting ---
    /// Required input assets could not be staged.
    #[error("Asset staging failed: {message}")]
    AssetStaging {
        /// What was missing.
        message: String,
    },

    /// The scene script could not be produced.
    #[error("Script generation failed: {message}")]
    ScriptGeneration {
        /// Reason.
        message: String,
    },

    // --- Tool execution ---
    /// Render tool executable not found at the configured path.
    #[error("Render tool not found: {}", .path.display())]
    ToolNotFound {
        /// Configured path.
        path: PathBuf,
    },

    /// Render tool exited with a non-zero status.
    #[error("Render tool exited with code {code}: {stderr}")]
    ToolFailed {
        /// Exit code.
        code: i32,
        /// Tail of captured stderr.
        stderr: String,
    },

    /// Render tool was terminated by a signal.
    #[error("Render tool was killed (signal termination)")]
    ToolKilled,

    /// Render tool exceeded its wall-clock limit and was killed.
    #[error("Render tool timed out after {}s", .timeout.as_secs())]
    RenderTimeout {
        /// The limit that was exceeded.
        timeout: Duration,
    },

    /// The tool finished but the expected artifact is absent or too small.
    #[error("Render output missing: {} ({reason})", .path.display())]
    RenderOutputMissing {
        /// Expected artifact path.
        path: PathBuf,
        /// `not created` or a size description.
        reason: String,
    },

    // --- Publication and reconciliation ---
    /// The model artifact could not be uploaded.
    #[error("Model upload failed: {0}")]
    ModelUpload(AppError),

    /// The design record could not be updated with the render result.
    #[error("Reconciliation failed: {0}")]
    Reconciliation(AppError),

    /// The design record could not be loaded.
    #[error("Design repository error: {0}")]
    Repository(AppError),

    // --- Generic ---
    /// Filesystem error in the working directory.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stable, closed set of failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderErrorKind {
    /// See [`RenderError::NotFound`].
    NotFound,
    /// See [`RenderError::InvalidState`].
    InvalidState,
    /// See [`RenderError::UnsupportedFormat`].
    UnsupportedFormat,
    /// See [`RenderError::DesignBusy`].
    DesignBusy,
    /// See [`RenderError::Lease`].
    LeaseUnavailable,
    /// See [`RenderError::AssetStaging`].
    AssetStaging,
    /// See [`RenderError::ScriptGeneration`].
    ScriptGeneration,
    /// See [`RenderError::ToolNotFound`].
    ToolNotFound,
    /// See [`RenderError::ToolFailed`].
    ToolFailed,
    /// See [`RenderError::ToolKilled`].
    ToolKilled,
    /// See [`RenderError::RenderTimeout`].
    RenderTimeout,
    /// See [`RenderError::RenderOutputMissing`].
    RenderOutputMissing,
    /// See [`RenderError::ModelUpload`].
    ModelUpload,
    /// See [`RenderError::Reconciliation`].
    Reconciliation,
    /// See [`RenderError::Repository`].
    Repository,
    /// See [`RenderError::Io`].
    Io,
}

impl RenderErrorKind {
    /// Wire name, as stored in `last_error_kind`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidState => "invalid_state",
            Self::UnsupportedFormat => "unsupported_format",
            Self::DesignBusy => "design_busy",
            Self::LeaseUnavailable => "lease_unavailable",
            Self::AssetStaging => "asset_staging",
            Self::ScriptGeneration => "script_generation",
            Self::ToolNotFound => "tool_not_found",
            Self::ToolFailed => "tool_failed",
            Self::ToolKilled => "tool_killed",
            Self::RenderTimeout => "render_timeout",
            Self::RenderOutputMissing => "render_output_missing",
            Self::ModelUpload => "model_upload",
            Self::Reconciliation => "reconciliation",
            Self::Repository => "repository",
            Self::Io => "io",
        }
    }

    /// Whether and how the queue should try again.
    pub fn retry(&self) -> RetryDisposition {
        match self {
            Self::NotFound
            | Self::InvalidState
            | Self::UnsupportedFormat
            | Self::ToolNotFound
            | Self::ScriptGeneration
            | Self::ToolFailed => RetryDisposition::Never,
            Self::RenderTimeout => RetryDisposition::RetryWithLongerTimeout,
            Self::DesignBusy
            | Self::LeaseUnavailable
            | Self::AssetStaging
            | Self::ToolKilled
            | Self::RenderOutputMissing
            | Self::ModelUpload
            | Self::Reconciliation
            | Self::Repository
            | Self::Io => RetryDisposition::Retry,
        }
    }
}

impl fmt::Display for RenderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Queue-level retry guidance for a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryDisposition {
    /// Deterministic failure; retrying cannot help.
    Never,
    /// Transient failure; retry with backoff.
    Retry,
    /// The tool ran out of time; retry with a longer limit.
    RetryWithLongerTimeout,
}

impl RetryDisposition {
    /// Whether any retry is allowed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Never)
    }
}

impl RenderError {
    /// Stable kind of this failure.
    pub fn kind(&self) -> RenderErrorKind {
        match self {
            Self::NotFound { .. } => RenderErrorKind::NotFound,
            Self::InvalidState { .. } => RenderErrorKind::InvalidState,
            Self::UnsupportedFormat { .. } => RenderErrorKind::UnsupportedFormat,
            Self::DesignBusy { .. } => RenderErrorKind::DesignBusy,
            Self::Lease(_) => RenderErrorKind::LeaseUnavailable,
            Self::AssetStaging { .. } => RenderErrorKind::AssetStaging,
            Self::ScriptGeneration { .. } => RenderErrorKind::ScriptGeneration,
            Self::ToolNotFound { .. } => RenderErrorKind::ToolNotFound,
            Self::ToolFailed { .. } => RenderErrorKind::ToolFailed,
            Self::ToolKilled => RenderErrorKind::ToolKilled,
            Self::RenderTimeout { .. } => RenderErrorKind::RenderTimeout,
            Self::RenderOutputMissing { .. } => RenderErrorKind::RenderOutputMissing,
            Self::ModelUpload(_) => RenderErrorKind::ModelUpload,
            Self::Reconciliation(_) => RenderErrorKind::Reconciliation,
            Self::Repository(_) => RenderErrorKind::Repository,
            Self::Io(_) => RenderErrorKind::Io,
        }
    }

    /// Retry guidance for this failure.
    pub fn retry(&self) -> RetryDisposition {
        self.kind().retry()
    }
}

impl From<RenderError> for AppError {
    fn from(err: RenderError) -> Self {
        let kind = match err.kind() {
            RenderErrorKind::NotFound => ErrorKind::NotFound,
            RenderErrorKind::InvalidState | RenderErrorKind::UnsupportedFormat => {
                ErrorKind::Validation
            }
            RenderErrorKind::DesignBusy => ErrorKind::Conflict,
            RenderErrorKind::LeaseUnavailable => ErrorKind::Lease,
            RenderErrorKind::ToolNotFound => ErrorKind::Configuration,
            RenderErrorKind::ModelUpload => ErrorKind::Storage,
            RenderErrorKind::Reconciliation | RenderErrorKind::Repository => ErrorKind::Database,
            RenderErrorKind::AssetStaging => ErrorKind::ExternalService,
            _ => ErrorKind::Internal,
        };
        AppError::with_source(kind, err.to_string(), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intake_failures_are_never_retried() {
        let id = DesignId::new();
        assert_eq!(
            RenderError::NotFound { design_id: id }.retry(),
            RetryDisposition::Never
        );
        assert_eq!(
            RenderError::InvalidState {
                design_id: id,
                status: DesignStatus::Processing
            }
            .retry(),
            RetryDisposition::Never
        );
        assert_eq!(
            RenderError::UnsupportedFormat {
                render_type: RenderType::Usdz
            }
            .retry(),
            RetryDisposition::Never
        );
    }

    #[test]
    fn test_timeout_distinct_from_crash() {
        let timeout = RenderError::RenderTimeout {
            timeout: Duration::from_secs(300),
        };
        let crash = RenderError::ToolFailed {
            code: 1,
            stderr: "segfault".into(),
        };
        assert_eq!(timeout.kind(), RenderErrorKind::RenderTimeout);
        assert_eq!(timeout.retry(), RetryDisposition::RetryWithLongerTimeout);
        assert_eq!(crash.retry(), RetryDisposition::Never);
        assert_eq!(timeout.to_string(), "Render tool timed out after 300s");
    }

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(RenderErrorKind::RenderOutputMissing.as_str(), "render_output_missing");
        let json = serde_json::to_string(&RenderErrorKind::DesignBusy).unwrap();
        assert_eq!(json, "\"design_busy\"");
    }

    #[test]
    fn test_into_app_error() {
        let err: AppError = RenderError::ModelUpload(AppError::storage("bucket gone")).into();
        assert_eq!(err.kind, ErrorKind::Storage);
        assert!(err.message.contains("bucket gone"));
    }
}
