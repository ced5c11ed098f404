//! GitHub Actions runner file commands.
//!
//! Outputs, exported variables, and PATH additions are appended to the files
//! named by `GITHUB_OUTPUT`, `GITHUB_ENV`, and `GITHUB_PATH`. Masks and
//! annotations are workflow commands printed on stdout.

use std::io::Write;
use std::path::{Path, PathBuf};

pub const OUTPUT_FILE_ENV: &str = "GITHUB_OUTPUT";
pub const ENV_FILE_ENV: &str = "GITHUB_ENV";
pub const PATH_FILE_ENV: &str = "GITHUB_PATH";
pub const WORKSPACE_ENV: &str = "GITHUB_WORKSPACE";

/// Handle on the current step's runner files.
///
/// Construct once in the binary and pass it down; tests point it at
/// temporary files with [`Runner::with_files`].
#[derive(Debug, Clone, Default)]
pub struct Runner {
    output_file: Option<PathBuf>,
    env_file: Option<PathBuf>,
    path_file: Option<PathBuf>,
    workspace: Option<PathBuf>,
}

impl Runner {
    pub fn from_env() -> Self {
        let file = |name| std::env::var_os(name).map(PathBuf::from);
        Self {
            output_file: file(OUTPUT_FILE_ENV),
            env_file: file(ENV_FILE_ENV),
            path_file: file(PATH_FILE_ENV),
            workspace: file(WORKSPACE_ENV),
        }
    }

    pub fn with_files(
        output_file: Option<PathBuf>,
        env_file: Option<PathBuf>,
        path_file: Option<PathBuf>,
    ) -> Self {
        Self {
            output_file,
            env_file,
            path_file,
            workspace: None,
        }
    }

    pub fn with_workspace(mut self, workspace: PathBuf) -> Self {
        self.workspace = Some(workspace);
        self
    }

    /// The checked-out workspace (`GITHUB_WORKSPACE`).
    pub fn workspace(&self) -> crate::Result<&Path> {
        self.workspace
            .as_deref()
            .ok_or(crate::Error::MissingEnv {
                name: WORKSPACE_ENV,
            })
    }

    /// Set a step output. Without `GITHUB_OUTPUT` the pair is printed instead.
    pub fn set_output(&self, name: &str, value: &str) -> crate::Result<()> {
        tracing::debug!(name, "setting output");
        match &self.output_file {
            Some(path) => append(path, &key_value_record(name, value)),
            None => {
                println!("{name}={value}");
                Ok(())
            }
        }
    }

    /// Export an environment variable to subsequent steps.
    pub fn export_variable(&self, name: &str, value: &str) -> crate::Result<()> {
        tracing::debug!(name, "exporting variable");
        match &self.env_file {
            Some(path) => append(path, &key_value_record(name, value)),
            None => {
                println!("{name}={value}");
                Ok(())
            }
        }
    }

    /// Prepend a directory to PATH for subsequent steps.
    pub fn add_path(&self, dir: &Path) -> crate::Result<()> {
        match &self.path_file {
            Some(path) => append(path, &format!("{}\n", dir.display())),
            None => {
                println!("PATH+={}", dir.display());
                Ok(())
            }
        }
    }

    /// Ask the runner to redact `value` from the log, line by line.
    pub fn add_mask(&self, value: &str) {
        for line in value.lines().filter(|l| !l.trim().is_empty()) {
            println!("::add-mask::{line}");
        }
    }

    pub fn warning(&self, message: &str) {
        tracing::warn!("{message}");
        println!("::warning::{}", escape_data(message));
    }
}

/// `name=value`, or the heredoc form when the value spans lines.
fn key_value_record(name: &str, value: &str) -> String {
    if !value.contains('\n') && !value.contains('\r') {
        return format!("{name}={value}\n");
    }

    let mut delimiter = format!("ghadelimiter_{}", uuid::Uuid::new_v4().simple());
    while value.contains(&delimiter) {
        delimiter = format!("ghadelimiter_{}", uuid::Uuid::new_v4().simple());
    }
    format!("{name}<<{delimiter}\n{value}\n{delimiter}\n")
}

fn escape_data(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn append(path: &Path, record: &str) -> crate::Result<()> {
    let write_err = |e| crate::Error::RunnerWrite {
        path: path.to_path_buf(),
        source: e,
    };

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(write_err)?;
    file.write_all(record.as_bytes()).map_err(write_err)
}
