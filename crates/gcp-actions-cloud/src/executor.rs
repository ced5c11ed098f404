use std::path::PathBuf;
use std::process::{Output, Stdio};

use crate::gcloud::{self, GcloudError};

/// Captured stdout and stderr of a successful gcloud run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Abstraction over gcloud CLI execution for testability.
///
/// Production code uses [`RealExecutor`], tests use mockall-generated mocks.
#[allow(async_fn_in_trait)]
pub trait GcloudExecutor: Send + Sync {
    /// Execute a gcloud command and capture stdout.
    async fn exec(&self, args: &[String]) -> Result<String, GcloudError>;

    /// Execute a gcloud command, streaming output to the terminal.
    async fn exec_streaming(&self, args: &[String]) -> Result<(), GcloudError>;

    /// Execute a gcloud command with data piped to stdin.
    async fn exec_with_stdin(
        &self,
        args: &[String],
        stdin_data: &[u8],
    ) -> Result<String, GcloudError>;

    /// Execute a gcloud command and capture both stdout and stderr.
    ///
    /// Some commands (`app deploy`) only report their result on stderr.
    async fn exec_capture(&self, args: &[String]) -> Result<CommandOutput, GcloudError>;
}

/// Real gcloud CLI executor.
///
/// Resolves `gcloud` on `PATH` unless pointed at an SDK `bin` directory,
/// which is needed right after installing into the tool cache.
#[derive(Debug, Clone, Default)]
pub struct RealExecutor {
    bin_dir: Option<PathBuf>,
}

impl RealExecutor {
    pub fn with_bin_dir(bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin_dir: Some(bin_dir.into()),
        }
    }

    fn command(&self, args: &[String]) -> tokio::process::Command {
        let program = match &self.bin_dir {
            Some(dir) => dir.join(gcloud::tool_command()),
            None => PathBuf::from(gcloud::tool_command()),
        };
        tracing::debug!(program = %program.display(), ?args, "running gcloud");
        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .env(gcloud::METRICS_ENV_VAR, gcloud::METRICS_LABEL)
            .env(gcloud::METRICS_VERSION_ENV_VAR, gcloud::METRICS_VERSION)
            .env(gcloud::DISABLE_PROMPTS_ENV_VAR, "1");
        cmd
    }

    fn check(args: &[String], output: Output) -> Result<CommandOutput, GcloudError> {
        if output.status.success() {
            Ok(CommandOutput {
                stdout: String::from_utf8(output.stdout)
                    .map_err(|e| GcloudError::InvalidUtf8 { source: e })?,
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            })
        } else {
            Err(GcloudError::CommandFailed {
                args: args.to_vec(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            })
        }
    }
}

impl GcloudExecutor for RealExecutor {
    async fn exec(&self, args: &[String]) -> Result<String, GcloudError> {
        self.exec_capture(args).await.map(|out| out.stdout)
    }

    async fn exec_streaming(&self, args: &[String]) -> Result<(), GcloudError> {
        let status = self
            .command(args)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| GcloudError::NotFound { source: e })?;

        if status.success() {
            Ok(())
        } else {
            Err(GcloudError::CommandFailed {
                args: args.to_vec(),
                stderr: format!("exit code: {status}"),
            })
        }
    }

    async fn exec_with_stdin(
        &self,
        args: &[String],
        stdin_data: &[u8],
    ) -> Result<String, GcloudError> {
        use tokio::io::AsyncWriteExt;

        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| GcloudError::NotFound { source: e })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(stdin_data)
                .await
                .map_err(|e| GcloudError::StdinWrite { source: e })?;
            stdin
                .shutdown()
                .await
                .map_err(|e| GcloudError::StdinWrite { source: e })?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| GcloudError::NotFound { source: e })?;

        Self::check(args, output).map(|out| out.stdout)
    }

    async fn exec_capture(&self, args: &[String]) -> Result<CommandOutput, GcloudError> {
        let output = self
            .command(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| GcloudError::NotFound { source: e })?;

        Self::check(args, output)
    }
}
