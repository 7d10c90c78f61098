//! Local text-generation engine driven as a subprocess (`ollama list`,
//! `ollama run <model>`).
//!
//! Every child is spawned with `kill_on_drop`, so dropping an in-flight
//! [`LocalEngine::run`] future (for example when the generator's timeout
//! fires) terminates the process. The scratch prompt file is owned by a guard
//! that removes it on every exit path.
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config;
use crate::error::GenerationError;

const PROBE_PROMPT: &str = "hello";

#[async_trait]
pub trait LocalEngine: Send + Sync {
    /// Pre-flight check: the model is installed and answers a trivial prompt.
    /// Never fails; any problem is logged and reported as `false`.
    async fn probe(&self, model: &str) -> bool;

    /// Generate text for `prompt`. Cancel-safe: dropping the future kills the
    /// child process.
    async fn run(&self, prompt: &str, model: &str) -> Result<String, GenerationError>;
}

#[derive(Debug, Clone)]
pub struct OllamaEngine {
    program: String,
    leading_args: Vec<String>,
    scratch_dir: PathBuf,
    probe_timeout: Duration,
}

impl OllamaEngine {
    pub fn new(command: &[String], scratch_dir: impl Into<PathBuf>) -> Self {
        let (program, leading_args) = match command.split_first() {
            Some((program, rest)) => (program.clone(), rest.to_vec()),
            None => ("ollama".to_string(), Vec::new()),
        };
        Self {
            program,
            leading_args,
            scratch_dir: scratch_dir.into(),
            probe_timeout: Duration::from_secs(10),
        }
    }

    pub fn from_config(cfg: &config::Config) -> Self {
        Self::new(&cfg.engine.command, &cfg.paths.scratch_dir)
            .with_probe_timeout(cfg.engine.probe_timeout())
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args).kill_on_drop(true);
        cmd
    }

    async fn list_models(&self) -> Result<String, String> {
        let mut cmd = self.command();
        cmd.arg("list")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = cmd.spawn().map_err(|e| format!("failed to spawn {}: {e}", self.program))?;
        let collected = tokio::time::timeout(self.probe_timeout, collect_output(&mut child)).await;
        let (status, stdout, stderr) = match collected {
            Ok(Ok(out)) => out,
            Ok(Err(e)) => return Err(format!("failed to read model list: {e}")),
            Err(_) => {
                terminate(&mut child).await;
                return Err(format!("model list timed out after {}s", self.probe_timeout.as_secs()));
            }
        };
        if !status.success() {
            return Err(format!("model list exited with {status}: {}", stderr.trim()));
        }
        Ok(stdout)
    }

    async fn test_model(&self, model: &str) -> Result<(), String> {
        let mut cmd = self.command();
        cmd.arg("run")
            .arg(model)
            .arg(PROBE_PROMPT)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        let mut child = cmd.spawn().map_err(|e| format!("failed to spawn {}: {e}", self.program))?;
        let mut stdout = child.stdout.take().ok_or("stdout not captured")?;

        // One deadline covers the first read and, when stdout closes early,
        // the wait for the exit status.
        let round_trip = tokio::time::timeout(self.probe_timeout, async {
            let mut buf = [0u8; 256];
            match stdout.read(&mut buf).await {
                Ok(0) => match child.wait().await {
                    Ok(status) if status.success() => {
                        Err("model test completed but produced no output".to_string())
                    }
                    Ok(status) => Err(format!("model test exited with {status}")),
                    Err(e) => Err(format!("failed to wait for model test: {e}")),
                },
                Ok(_) => Ok(()),
                Err(e) => Err(format!("failed to read model test output: {e}")),
            }
        })
        .await;

        let result = match round_trip {
            Ok(result) => result,
            Err(_) => Err(format!(
                "model test timed out after {}ms",
                self.probe_timeout.as_millis()
            )),
        };
        terminate(&mut child).await;
        result
    }
}

#[async_trait]
impl LocalEngine for OllamaEngine {
    async fn probe(&self, model: &str) -> bool {
        info!(model, "probing local engine");
        let listed = match self.list_models().await {
            Ok(listed) => listed,
            Err(reason) => {
                warn!(model, %reason, "local engine unavailable");
                return false;
            }
        };
        if !listed.contains(model) {
            warn!(model, available = %listed.trim(), "model not installed in local engine");
            return false;
        }
        debug!(model, "model listed; testing a round-trip");
        match self.test_model(model).await {
            Ok(()) => {
                info!(model, "local engine probe succeeded");
                true
            }
            Err(reason) => {
                warn!(model, %reason, "local engine probe failed");
                false
            }
        }
    }

    async fn run(&self, prompt: &str, model: &str) -> Result<String, GenerationError> {
        let scratch = ScratchFile::create(&self.scratch_dir, prompt).await?;
        let stdin = std::fs::File::open(scratch.path())
            .map_err(|e| GenerationError::process(format!("failed to open prompt file: {e}")))?;

        let mut cmd = self.command();
        cmd.arg("run")
            .arg(model)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        debug!(
            program = %self.program,
            model,
            prompt_file = %scratch.path().display(),
            "spawning local engine"
        );
        let mut child = cmd.spawn().map_err(|e| {
            GenerationError::process(format!("failed to spawn {}: {e}", self.program))
        })?;

        let (status, stdout, stderr) = collect_output(&mut child)
            .await
            .map_err(|e| GenerationError::process(format!("failed to read engine output: {e}")))?;

        if !stderr.trim().is_empty() {
            debug!(stderr = %stderr.trim(), "local engine stderr");
        }
        if !status.success() {
            return Err(GenerationError::process(format!(
                "engine exited with {status}: {}",
                stderr.trim()
            )));
        }
        let text = stdout.trim();
        if text.is_empty() {
            return Err(GenerationError::process("engine produced no output"));
        }
        info!(model, words = text.split_whitespace().count(), "local generation finished");
        Ok(text.to_string())
    }
}

/// Drain stdout and stderr concurrently, then reap the child.
async fn collect_output(child: &mut Child) -> std::io::Result<(ExitStatus, String, String)> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (out, err) = tokio::try_join!(read_all(stdout), read_all(stderr))?;
    let status = child.wait().await?;
    Ok((
        status,
        String::from_utf8_lossy(&out).into_owned(),
        String::from_utf8_lossy(&err).into_owned(),
    ))
}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        reader.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Kill and reap so no zombie is left behind.
async fn terminate(child: &mut Child) {
    if let Err(err) = child.kill().await {
        debug!(?err, "failed to kill engine child (already exited?)");
    }
}

/// Prompt file removed when dropped.
struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    async fn create(dir: &Path, contents: &str) -> Result<Self, GenerationError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| GenerationError::process(format!("failed to create scratch dir: {e}")))?;
        let path = dir.join(format!("prompt-{}.txt", uuid::Uuid::new_v4().simple()));
        let guard = Self { path };
        tokio::fs::write(&guard.path, contents)
            .await
            .map_err(|e| GenerationError::process(format!("failed to write prompt file: {e}")))?;
        Ok(guard)
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(?err, path = %self.path.display(), "failed to remove prompt file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_wrapper_command() {
        let engine = OllamaEngine::new(
            &["docker".into(), "exec".into(), "llm".into(), "ollama".into()],
            "/tmp",
        );
        assert_eq!(engine.program, "docker");
        assert_eq!(engine.leading_args, vec!["exec", "llm", "ollama"]);
    }

    #[test]
    fn empty_command_defaults_to_ollama() {
        let engine = OllamaEngine::new(&[], "/tmp");
        assert_eq!(engine.program, "ollama");
        assert!(engine.leading_args.is_empty());
    }

    #[tokio::test]
    async fn scratch_file_is_removed_on_drop() {
        let td = tempfile::tempdir().unwrap();
        let path = {
            let scratch = ScratchFile::create(td.path(), "prompt").await.unwrap();
            assert!(scratch.path().exists());
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
