//! Render tool CLI commands.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use renderhub_core::config::AppConfig;
use renderhub_core::error::AppError;
use renderhub_entity::render::{RenderQuality, RenderType};
use renderhub_render::{BlenderTool, MaterialSpec, SceneSpec, ScriptGenerator};

use crate::output;

/// Quality tier argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum QualityArg {
    /// 512px, 64 samples
    Low,
    /// 1024px, 128 samples
    Medium,
    /// 2048px, 256 samples
    High,
}

impl From<QualityArg> for RenderQuality {
    fn from(arg: QualityArg) -> Self {
        match arg {
            QualityArg::Low => RenderQuality::Low,
            QualityArg::Medium => RenderQuality::Medium,
            QualityArg::High => RenderQuality::High,
        }
    }
}

/// Arguments for `script`
#[derive(Debug, Args)]
pub struct ScriptArgs {
    /// Output format (gltf, stl, obj)
    #[arg(short = 't', long = "type", default_value = "gltf")]
    pub render_type: RenderType,
    /// Quality tier
    #[arg(short, long, value_enum, default_value = "medium")]
    pub quality: QualityArg,
    /// Material type (gold, silver, steel; anything else is the default)
    #[arg(short, long, default_value = "default")]
    pub material: String,
    /// Working directory written into the script
    #[arg(long, default_value = "/tmp/renderhub/render-preview")]
    pub work_dir: PathBuf,
    /// Staged product mesh to import
    #[arg(long)]
    pub product_model: Option<PathBuf>,
    /// Staged design image to apply as a texture
    #[arg(long)]
    pub design_image: Option<PathBuf>,
    /// Export animation data (glTF only)
    #[arg(long)]
    pub animations: bool,
}

/// Generate the scene script for the given arguments
pub fn scene_script(args: &ScriptArgs) -> Result<String, AppError> {
    let spec = SceneSpec {
        work_dir: &args.work_dir,
        render_type: args.render_type,
        quality: args.quality.into(),
        material: MaterialSpec::for_type(&args.material),
        product_model: args.product_model.as_deref(),
        design_image: args.design_image.as_deref(),
        include_animations: args.animations,
    };
    ScriptGenerator::scene_script(&spec).map_err(AppError::from)
}

/// Print a generated scene script
pub fn script(args: &ScriptArgs) -> Result<(), AppError> {
    let script = scene_script(args)?;
    println!("{}", script);
    Ok(())
}

/// Check the configured render tool
pub async fn tool_check(config: &AppConfig) -> Result<(), AppError> {
    let tool = BlenderTool::from_config(&config.render);

    println!("Render tool:");
    output::print_kv("Path", &tool.path().display().to_string());
    output::print_kv("Arguments", &config.render.tool_args.join(" "));
    output::print_kv("Working root", &config.render.working_root.display().to_string());

    tool.check().map_err(AppError::from)?;

    let version = tokio::time::timeout(
        Duration::from_secs(30),
        tokio::process::Command::new(tool.path())
            .arg("--version")
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| AppError::external_service("Render tool did not answer --version within 30s"))?
    .map_err(|e| AppError::external_service(format!("Failed to run render tool: {}", e)))?;

    if !version.status.success() {
        return Err(AppError::external_service(format!(
            "Render tool exited with {} on --version",
            version.status
        )));
    }

    let stdout = String::from_utf8_lossy(&version.stdout);
    let first_line = stdout.lines().next().unwrap_or("").trim();
    output::print_kv("Version", if first_line.is_empty() { "-" } else { first_line });
    output::print_success("Render tool is available");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(render_type: RenderType) -> ScriptArgs {
        ScriptArgs {
            render_type,
            quality: QualityArg::High,
            material: "gold".to_string(),
            work_dir: PathBuf::from("/tmp/renderhub/render-x"),
            product_model: None,
            design_image: None,
            animations: false,
        }
    }

    #[test]
    fn test_script_for_stl() {
        let script = scene_script(&args(RenderType::Stl)).unwrap();
        assert!(script.contains("output_format = \"stl\""));
        assert!(script.contains("scene.render.resolution_x = 2048"));
        assert!(script.contains("(1.0, 0.8, 0.2, 1.0)"));
    }

    #[test]
    fn test_script_rejects_usdz() {
        assert!(scene_script(&args(RenderType::Usdz)).is_err());
    }

    #[tokio::test]
    async fn test_tool_check_missing_tool() {
        let dir = tempfile::tempdir().unwrap();
        let mut config: AppConfig = serde_json::from_value(serde_json::json!({
            "database": { "url": "postgres://localhost/renderhub" }
        }))
        .unwrap();
        config.render.tool_path = dir.path().join("no-blender");

        assert!(tool_check(&config).await.is_err());
    }
}
