//! External render tool invocation.
//!
//! The tool runs as a child process with the generated script, inside the
//! job working directory, under a hard wall-clock limit. Exit status and
//! timeout are told apart so the queue can choose a retry strategy.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, error, info, warn};

use renderhub_core::config::RenderConfig;
use renderhub_entity::render::RenderType;

use crate::error::RenderError;
use crate::scripting::PREVIEW_FILE_NAME;
use crate::sidecar::{Sidecar, collect_sidecars};

/// Characters of stderr kept on a failure.
const STDERR_TAIL_CHARS: usize = 2000;

/// One tool run.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Script the tool executes.
    pub script: PathBuf,
    /// Working directory of the child process.
    pub work_dir: PathBuf,
    /// Hard wall-clock limit.
    pub timeout: Duration,
}

/// Captured output of a successful run.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Captured stdout (empty when capture is off).
    pub stdout: String,
    /// Captured stderr (empty when capture is off).
    pub stderr: String,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
}

/// Something that can execute a render script.
#[async_trait]
pub trait RenderTool: Send + Sync + fmt::Debug {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Run the script to completion or until the timeout expires.
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, RenderError>;
}

/// Blender (or any tool sharing its command-line shape) as a subprocess.
#[derive(Debug, Clone)]
pub struct BlenderTool {
    path: PathBuf,
    args: Vec<String>,
    capture_output: bool,
}

impl BlenderTool {
    /// Build from configuration.
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            path: config.tool_path.clone(),
            args: config.tool_args.clone(),
            capture_output: config.capture_output,
        }
    }

    /// Executable path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fail with [`RenderError::ToolNotFound`] when the executable is absent.
    pub fn check(&self) -> Result<(), RenderError> {
        if self.path.as_os_str().is_empty() || !self.path.exists() {
            return Err(RenderError::ToolNotFound {
                path: self.path.clone(),
            });
        }
        Ok(())
    }

    /// Substitute `{script}` and `{work_dir}` in the argument template.
    pub fn expand_args(&self, script: &str, work_dir: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace("{script}", script).replace("{work_dir}", work_dir))
            .collect()
    }
}

#[async_trait]
impl RenderTool for BlenderTool {
    fn name(&self) -> &str {
        "blender"
    }

    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, RenderError> {
        let script_str = invocation
            .script
            .to_str()
            .ok_or_else(|| RenderError::ScriptGeneration {
                message: format!("script path is not valid UTF-8: {}", invocation.script.display()),
            })?;
        let work_dir_str = invocation.work_dir.to_string_lossy();

        self.check()?;

        let mut cmd = tokio::process::Command::new(&self.path);

        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        let (stdout_cfg, stderr_cfg) = if self.capture_output {
            (Stdio::piped(), Stdio::piped())
        } else {
            (Stdio::null(), Stdio::null())
        };

        cmd.args(self.expand_args(script_str, &work_dir_str))
            .current_dir(&invocation.work_dir)
            .stdout(stdout_cfg)
            .stderr(stderr_cfg)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        // Own process group so helpers the tool spawns die with it.
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        debug!(
            tool = %self.path.display(),
            script = %invocation.script.display(),
            timeout_s = invocation.timeout.as_secs(),
            "Spawning render tool"
        );

        let start = Instant::now();
        let mut child = cmd.spawn()?;
        let pid = child.id();

        // Drain the pipes while the child runs so a chatty tool cannot
        // block on a full pipe.
        let stdout_task = tokio::spawn(read_pipe(child.stdout.take()));
        let stderr_task = tokio::spawn(read_pipe(child.stderr.take()));
        let drains = [stdout_task.abort_handle(), stderr_task.abort_handle()];

        // The limit covers the drain too: a grandchild holding the pipes
        // open keeps the run alive after the tool itself exits.
        let finished = tokio::time::timeout(invocation.timeout, async {
            let status = child.wait().await?;
            let stdout = stdout_task.await.unwrap_or_default();
            let stderr = stderr_task.await.unwrap_or_default();
            Ok::<_, std::io::Error>((status, stdout, stderr))
        })
        .await;

        let (status, stdout, stderr) = match finished {
            Ok(result) => result?,
            Err(_) => {
                error!(
                    timeout_s = invocation.timeout.as_secs(),
                    "Render tool timed out, killing"
                );
                terminate(&mut child, pid).await;
                for drain in drains {
                    drain.abort();
                }
                return Err(RenderError::RenderTimeout {
                    timeout: invocation.timeout,
                });
            }
        };
        let elapsed = start.elapsed();

        if !stderr.is_empty() {
            debug!(stderr = %stderr, "Render tool stderr output");
        }

        if status.success() {
            info!(
                elapsed_ms = elapsed.as_millis() as u64,
                "Render tool completed"
            );
            return Ok(ToolOutput { stdout, stderr, elapsed });
        }

        match status.code() {
            Some(code) => {
                error!(
                    code = code,
                    elapsed_ms = elapsed.as_millis() as u64,
                    stderr = %stderr,
                    "Render tool failed"
                );
                Err(RenderError::ToolFailed {
                    code,
                    stderr: tail(&stderr, STDERR_TAIL_CHARS),
                })
            }
            None => {
                error!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Render tool terminated by signal"
                );
                Err(RenderError::ToolKilled)
            }
        }
    }
}

/// Kill the tool and everything left in its process group.
async fn terminate(child: &mut tokio::process::Child, pid: Option<u32>) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        if let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) {
            match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
                Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
                Err(e) => warn!(pid = pid, error = %e, "Failed to kill render tool process group"),
            }
        }
    }
    #[cfg(not(unix))]
    let _ = pid;

    // Already reaped when only the drain overran.
    if matches!(child.try_wait(), Ok(Some(_))) {
        return;
    }
    if let Err(e) = child.kill().await {
        warn!(error = %e, "Failed to kill render tool");
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let Some(mut pipe) = pipe else {
        return String::new();
    };
    let mut buf = Vec::new();
    let _ = pipe.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).to_string()
}

fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    text.chars().skip(count - max_chars).collect()
}

/// A validated artifact produced by the tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedModel {
    /// Artifact path inside the working directory.
    pub path: PathBuf,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Format of the artifact.
    pub render_type: RenderType,
    /// Files the artifact references by relative path.
    pub sidecars: Vec<Sidecar>,
}

/// Runs scripts and validates what they produce.
#[derive(Debug, Clone)]
pub struct ExternalRenderInvoker {
    tool: Arc<dyn RenderTool>,
    min_output_bytes: u64,
}

impl ExternalRenderInvoker {
    /// Create an invoker around a tool.
    pub fn new(tool: Arc<dyn RenderTool>, min_output_bytes: u64) -> Self {
        Self {
            tool,
            min_output_bytes: min_output_bytes.max(1),
        }
    }

    /// The wrapped tool.
    pub fn tool(&self) -> &Arc<dyn RenderTool> {
        &self.tool
    }

    /// Run the scene script and return the exported model.
    pub async fn render(
        &self,
        script: &Path,
        work_dir: &Path,
        render_type: RenderType,
        timeout: Duration,
    ) -> Result<RenderedModel, RenderError> {
        let invocation = ToolInvocation {
            script: script.to_path_buf(),
            work_dir: work_dir.to_path_buf(),
            timeout,
        };
        self.tool.run(&invocation).await?;

        let path = work_dir.join(render_type.output_file_name());
        let size_bytes = self.validate_output(&path).await?;
        let sidecars = collect_sidecars(&path, render_type).await?;
        Ok(RenderedModel {
            path,
            size_bytes,
            render_type,
            sidecars,
        })
    }

    /// Run the preview script and return the image path.
    pub async fn render_preview(
        &self,
        script: &Path,
        work_dir: &Path,
        timeout: Duration,
    ) -> Result<PathBuf, RenderError> {
        let invocation = ToolInvocation {
            script: script.to_path_buf(),
            work_dir: work_dir.to_path_buf(),
            timeout,
        };
        self.tool.run(&invocation).await?;

        let path = work_dir.join(PREVIEW_FILE_NAME);
        self.validate_output(&path).await?;
        Ok(path)
    }

    /// An exit status of zero is not enough: the artifact must exist and
    /// reach the minimum size.
    async fn validate_output(&self, path: &Path) -> Result<u64, RenderError> {
        let meta = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => meta,
            _ => {
                return Err(RenderError::RenderOutputMissing {
                    path: path.to_path_buf(),
                    reason: "not created".to_string(),
                });
            }
        };

        if meta.len() < self.min_output_bytes {
            return Err(RenderError::RenderOutputMissing {
                path: path.to_path_buf(),
                reason: format!("{} bytes, expected at least {}", meta.len(), self.min_output_bytes),
            });
        }

        Ok(meta.len())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// `/bin/sh <script> <work_dir>` stands in for the real tool.
    fn shell_tool() -> BlenderTool {
        BlenderTool {
            path: PathBuf::from("/bin/sh"),
            args: vec!["{script}".to_string(), "{work_dir}".to_string()],
            capture_output: true,
        }
    }

    async fn write_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("job.sh");
        tokio::fs::write(&path, body).await.unwrap();
        path
    }

    fn invocation(script: PathBuf, dir: &Path, secs: u64) -> ToolInvocation {
        ToolInvocation {
            script,
            work_dir: dir.to_path_buf(),
            timeout: Duration::from_secs(secs),
        }
    }

    #[test]
    fn test_expand_args() {
        let tool = BlenderTool::from_config(&RenderConfig::default());
        assert_eq!(
            tool.expand_args("/w/render_script.py", "/w"),
            vec!["--background", "--python", "/w/render_script.py"]
        );
    }

    #[tokio::test]
    async fn test_success_captures_output() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "echo rendering\necho warn 1>&2\n").await;
        let out = shell_tool()
            .run(&invocation(script, dir.path(), 10))
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "rendering");
        assert_eq!(out.stderr.trim(), "warn");
    }

    #[tokio::test]
    async fn test_runs_in_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "echo data > here.txt\n").await;
        shell_tool()
            .run(&invocation(script, dir.path(), 10))
            .await
            .unwrap();
        assert!(dir.path().join("here.txt").exists());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_tool_failed() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "echo boom 1>&2\nexit 3\n").await;
        let err = shell_tool()
            .run(&invocation(script, dir.path(), 10))
            .await
            .unwrap_err();
        match err {
            RenderError::ToolFailed { code, stderr } => {
                assert_eq!(code, 3);
                assert_eq!(stderr.trim(), "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "sleep 30\n").await;
        let err = shell_tool()
            .run(&invocation(script, dir.path(), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::RenderTimeout { timeout } if timeout == Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_timeout_covers_background_children() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "sleep 8 &\nexit 0\n").await;
        let start = Instant::now();
        let err = shell_tool()
            .run(&invocation(script, dir.path(), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::RenderTimeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_signal_is_tool_killed() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "kill -9 $$\n").await;
        let err = shell_tool()
            .run(&invocation(script, dir.path(), 10))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::ToolKilled));
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let dir = tempfile::tempdir().unwrap();
        let tool = BlenderTool {
            path: dir.path().join("no-such-blender"),
            args: vec![],
            capture_output: false,
        };
        let err = tool
            .run(&invocation(dir.path().join("s.py"), dir.path(), 10))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::ToolNotFound { .. }));
    }

    #[tokio::test]
    async fn test_render_validates_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let invoker = ExternalRenderInvoker::new(Arc::new(shell_tool()), 1);

        let script = write_script(dir.path(), "printf 'solid x' > \"$1/rendered_model.stl\"\n").await;
        let model = invoker
            .render(&script, dir.path(), RenderType::Stl, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(model.size_bytes, 7);
        assert_eq!(model.path, dir.path().join("rendered_model.stl"));
    }

    #[tokio::test]
    async fn test_render_rejects_missing_and_empty_output() {
        let dir = tempfile::tempdir().unwrap();
        let invoker = ExternalRenderInvoker::new(Arc::new(shell_tool()), 1);

        let script = write_script(dir.path(), "exit 0\n").await;
        let err = invoker
            .render(&script, dir.path(), RenderType::Obj, Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::RenderOutputMissing { ref reason, .. } if reason == "not created"));

        let script = write_script(dir.path(), ": > \"$1/rendered_model.obj\"\n").await;
        let err = invoker
            .render(&script, dir.path(), RenderType::Obj, Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::RenderOutputMissing { .. }));
    }
}
