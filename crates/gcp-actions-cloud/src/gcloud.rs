/// Label gcloud reports in its usage metrics when run from these actions.
pub const METRICS_ENV_VAR: &str = "CLOUDSDK_METRICS_ENVIRONMENT";
pub const METRICS_LABEL: &str = "github-actions-setup-gcloud";
pub const METRICS_VERSION_ENV_VAR: &str = "CLOUDSDK_METRICS_ENVIRONMENT_VERSION";
pub const METRICS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// gcloud never blocks on an interactive prompt when this is set.
pub const DISABLE_PROMPTS_ENV_VAR: &str = "CLOUDSDK_CORE_DISABLE_PROMPTS";

/// The gcloud entrypoint for the current platform.
///
/// On Windows the SDK ships a `gcloud.cmd` wrapper and no `gcloud` binary.
pub fn tool_command() -> &'static str {
    if cfg!(windows) { "gcloud.cmd" } else { "gcloud" }
}

#[derive(Debug, thiserror::Error)]
pub enum GcloudError {
    #[error("gcloud CLI not found; install it with the setup-gcloud action")]
    NotFound { source: std::io::Error },

    #[error("gcloud command failed: {args:?}\n{stderr}")]
    CommandFailed { args: Vec<String>, stderr: String },

    #[error("gcloud output was not valid UTF-8")]
    InvalidUtf8 { source: std::string::FromUtf8Error },

    #[error("failed to write to gcloud stdin")]
    StdinWrite { source: std::io::Error },

    #[error("unexpected gcloud output for {what}")]
    UnexpectedOutput {
        what: &'static str,
        source: serde_json::Error,
    },
}
