//! External render tool configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Slack on top of the summed stage limits of one attempt.
pub const ATTEMPT_MARGIN: Duration = Duration::from_secs(300);

/// Configuration for the external 3D tool and the per-job working area.
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Filesystem path to the render tool executable.
    pub tool_path: PathBuf,

    /// Argument template for the render tool. `{script}` is replaced with
    /// the generated script path and `{work_dir}` with the job directory.
    pub tool_args: Vec<String>,

    /// Base path for ephemeral per-job working directories.
    pub working_root: PathBuf,

    /// Hard wall-clock limit for one render invocation.
    #[validate(range(min = 10, max = 7200))]
    pub tool_timeout_seconds: u64,

    /// Factor applied to the timeout when retrying a job whose previous
    /// attempt timed out.
    #[validate(range(min = 1, max = 10))]
    pub timeout_retry_multiplier: u32,

    /// Upper bound for an extended timeout.
    #[validate(range(min = 10, max = 14400))]
    pub max_tool_timeout_seconds: u64,

    /// Whether to render a preview image after export.
    pub preview_enabled: bool,

    /// Hard wall-clock limit for the preview invocation.
    #[validate(range(min = 5, max = 3600))]
    pub preview_timeout_seconds: u64,

    /// Minimum output size (bytes) for an export to count as produced.
    #[validate(range(min = 1))]
    pub min_output_bytes: u64,

    /// Whether to capture tool stdout/stderr for diagnostics.
    pub capture_output: bool,

    /// Fail staging when neither a base mesh nor a design image could be staged.
    pub require_assets: bool,

    /// Timeout for a single asset download.
    #[validate(range(min = 1, max = 3600))]
    pub asset_download_timeout_seconds: u64,

    /// Age after which a leftover working directory is swept.
    #[validate(range(min = 1))]
    pub orphan_max_age_hours: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            tool_path: PathBuf::from("/usr/bin/blender"),
            tool_args: default_tool_args(),
            working_root: std::env::temp_dir().join("renderhub"),
            tool_timeout_seconds: 300,
            timeout_retry_multiplier: 2,
            max_tool_timeout_seconds: 1800,
            preview_enabled: true,
            preview_timeout_seconds: 120,
            min_output_bytes: 1,
            capture_output: true,
            require_assets: false,
            asset_download_timeout_seconds: 120,
            orphan_max_age_hours: 6,
        }
    }
}

impl RenderConfig {
    /// Timeout for the main render invocation.
    ///
    /// `extended` is set when the previous attempt of the same job timed out.
    pub fn tool_timeout(&self, extended: bool) -> Duration {
        let base = self.tool_timeout_seconds;
        let secs = if extended {
            base.saturating_mul(u64::from(self.timeout_retry_multiplier))
                .min(self.max_tool_timeout_seconds.max(base))
        } else {
            base
        };
        Duration::from_secs(secs)
    }

    /// Timeout for the preview invocation.
    pub fn preview_timeout(&self) -> Duration {
        Duration::from_secs(self.preview_timeout_seconds)
    }

    /// Longest a healthy attempt can run: two asset downloads, the extended
    /// tool timeout and the preview pass, plus [`ATTEMPT_MARGIN`].
    pub fn longest_attempt(&self) -> Duration {
        self.tool_timeout(true)
            + self.preview_timeout()
            + Duration::from_secs(self.asset_download_timeout_seconds.saturating_mul(2))
            + ATTEMPT_MARGIN
    }

    /// Whether the configured tool executable exists.
    pub fn is_tool_available(&self) -> bool {
        !self.tool_path.as_os_str().is_empty() && self.tool_path.is_file()
    }
}

fn default_tool_args() -> Vec<String> {
    vec![
        "--background".to_string(),
        "--python".to_string(),
        "{script}".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RenderConfig::default();
        assert_eq!(config.tool_timeout_seconds, 300);
        assert_eq!(config.tool_args, vec!["--background", "--python", "{script}"]);
        assert!(!config.require_assets);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_extended_timeout_is_capped() {
        let config = RenderConfig {
            tool_timeout_seconds: 600,
            timeout_retry_multiplier: 4,
            max_tool_timeout_seconds: 1800,
            ..Default::default()
        };
        assert_eq!(config.tool_timeout(false), Duration::from_secs(600));
        assert_eq!(config.tool_timeout(true), Duration::from_secs(1800));
    }

    #[test]
    fn test_extended_timeout_never_shrinks() {
        let config = RenderConfig {
            tool_timeout_seconds: 600,
            max_tool_timeout_seconds: 60,
            ..Default::default()
        };
        assert_eq!(config.tool_timeout(true), Duration::from_secs(600));
    }

    #[test]
    fn test_longest_attempt_sums_stages() {
        let config = RenderConfig::default();
        // 600 extended + 120 preview + 2 * 120 downloads + 300 margin.
        assert_eq!(config.longest_attempt(), Duration::from_secs(1260));
    }

    #[test]
    fn test_toml_partial_section() {
        let config: RenderConfig =
            toml::from_str("tool_path = \"/opt/blender\"\nrequire_assets = true\n")
                .expect("parse toml");
        assert_eq!(config.tool_path, PathBuf::from("/opt/blender"));
        assert!(config.require_assets);
        assert_eq!(config.preview_timeout_seconds, 120);
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        let config = RenderConfig {
            tool_timeout_seconds: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
