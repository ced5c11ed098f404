mod appengine;
mod cloudrun;
mod functions;
mod gke;
mod iap;
mod secrets;
mod setup;
mod storage;

use std::fmt;
use std::path::Path;

use anyhow::Context;
use clap::Args;
use gcp_actions_cloud::{GcloudClient, GcloudExecutor};
use gcp_actions_core::{ActionsConfig, Credentials};

pub use appengine::{DeployAppEngineArgs, deploy_appengine};
pub use cloudrun::{DeployCloudRunArgs, deploy_cloudrun};
pub use functions::{
    DeleteCloudFunctionArgs, DeployCloudFunctionArgs, delete_cloud_function, deploy_cloud_function,
};
pub use gke::{GetGkeCredentialsArgs, get_gke_credentials};
pub use iap::{GetIapTokenArgs, get_iap_token};
pub use secrets::{GetSecretsArgs, get_secretmanager_secrets};
pub use setup::{CleanupArgs, SetupGcloudArgs, cleanup, setup_gcloud};
pub use storage::{UploadCloudStorageArgs, upload_cloud_storage};

/// Project exported by setup-gcloud for later steps.
pub(crate) const PROJECT_ENV: &str = "GCLOUD_PROJECT";
/// Path of the key file exported by setup-gcloud, removed by `cleanup`.
pub(crate) const CREDS_PATH_ENV: &str = "GOOGLE_GHA_CREDS_PATH";

/// Step of an action, attached to errors so the CI log names what failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Input,
    Install,
    Auth,
    Preflight,
    Deploy,
    DeployPoll,
    Upload,
    Cluster,
    Secrets,
    Token,
    Output,
    Cleanup,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Install => "install",
            Self::Auth => "auth",
            Self::Preflight => "preflight",
            Self::Deploy => "deploy",
            Self::DeployPoll => "deploy-poll",
            Self::Upload => "upload",
            Self::Cluster => "cluster",
            Self::Secrets => "secrets",
            Self::Token => "token",
            Self::Output => "output",
            Self::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} step failed", self.label())
    }
}

/// Inputs shared by every action that talks to a project.
#[derive(Args, Debug)]
pub struct GcpArgs {
    /// Service account key JSON, raw or base64 encoded
    #[arg(long, env = "INPUT_CREDENTIALS", hide_env_values = true)]
    pub credentials: Option<String>,

    /// Google Cloud project ID
    #[arg(long, env = "INPUT_PROJECT_ID")]
    pub project_id: Option<String>,
}

pub(crate) fn load_config() -> anyhow::Result<ActionsConfig> {
    ActionsConfig::load(Path::new(".")).context(Phase::Input)
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Explicit input, then `gcp-actions.toml`, then the key's own project,
/// then `GCLOUD_PROJECT` from an earlier setup step.
pub(crate) fn resolve_project(
    input: Option<&str>,
    config: &ActionsConfig,
    credentials: Option<&Credentials>,
) -> anyhow::Result<String> {
    // arch-lint: allow(no-silent-result-drop) reason="an unset GCLOUD_PROJECT just means no earlier setup step exported one"
    let exported = std::env::var(PROJECT_ENV).ok();

    non_empty(input)
        .or(non_empty(config.project.gcp_project_id.as_deref()))
        .or(credentials.and_then(Credentials::project_id))
        .or(non_empty(exported.as_deref()))
        .map(str::to_owned)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "no project ID: set project_id, [project].gcp_project_id in gcp-actions.toml, \
                 or run setup-gcloud first"
            )
        })
        .context(Phase::Input)
}

/// Authenticate with the given key (if any), then make sure gcloud runs
/// and has an active account.
pub(crate) async fn prepare_gcloud<E: GcloudExecutor>(
    client: &GcloudClient<E>,
    credentials: Option<&str>,
) -> anyhow::Result<Option<Credentials>> {
    let credentials = match non_empty(credentials) {
        Some(text) => {
            let credentials = Credentials::parse(text).context(Phase::Auth)?;
            client
                .authenticate(&credentials)
                .await
                .context(Phase::Auth)?;
            Some(credentials)
        }
        None => None,
    };

    let report = client
        .check_prerequisites()
        .await
        .context(Phase::Preflight)?;
    tracing::info!(
        gcloud = %report.gcloud_version,
        account = %report.account,
        "gcloud ready"
    );

    Ok(credentials)
}
