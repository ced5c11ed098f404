use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Args};
use gcp_actions_cloud::gcloud::{
    METRICS_ENV_VAR, METRICS_LABEL, METRICS_VERSION, METRICS_VERSION_ENV_VAR,
};
use gcp_actions_cloud::{
    GcloudClient, GcloudExecutor, Platform, PreflightReport, RealExecutor, SdkInstaller,
};
use gcp_actions_core::credentials::APPLICATION_CREDENTIALS_ENV;
use gcp_actions_core::{Credentials, Runner};

use super::{CREDS_PATH_ENV, PROJECT_ENV, Phase, load_config, non_empty};

#[derive(Args, Debug)]
pub struct SetupGcloudArgs {
    /// Cloud SDK version to install, or "latest"
    #[arg(long, env = "INPUT_VERSION")]
    version: Option<String>,

    /// Default project for gcloud
    #[arg(long, env = "INPUT_PROJECT_ID")]
    project_id: Option<String>,

    /// Service account key JSON, raw or base64 encoded
    #[arg(long, env = "INPUT_SERVICE_ACCOUNT_KEY", hide_env_values = true)]
    service_account_key: Option<String>,

    /// Deprecated; the key's client_email is always used
    #[arg(long, env = "INPUT_SERVICE_ACCOUNT_EMAIL")]
    service_account_email: Option<String>,

    /// Export the key for Application Default Credentials
    #[arg(
        long,
        env = "INPUT_EXPORT_DEFAULT_CREDENTIALS",
        default_value_t = false,
        action = ArgAction::Set
    )]
    export_default_credentials: bool,

    /// Where to write the exported key (defaults to a random file in the workspace)
    #[arg(long, env = "INPUT_CREDENTIALS_FILE_PATH")]
    credentials_file_path: Option<PathBuf>,

    /// Additional gcloud components, comma separated
    #[arg(long, env = "INPUT_INSTALL_COMPONENTS")]
    install_components: Option<String>,

    /// Use the gcloud already on PATH instead of installing one
    #[arg(long, env = "INPUT_SKIP_INSTALL", default_value_t = false, action = ArgAction::Set)]
    skip_install: bool,

    /// Runner tool cache directory
    #[arg(long, env = "RUNNER_TOOL_CACHE")]
    tool_cache: Option<PathBuf>,

    /// Credentials file left by an earlier auth step; used when no key is given
    #[arg(long = "credentials-path", env = "GOOGLE_GHA_CREDS_PATH")]
    gha_creds_path: Option<PathBuf>,
}

pub async fn setup_gcloud(args: SetupGcloudArgs) -> anyhow::Result<()> {
    let config = load_config()?;
    let runner = Runner::from_env();

    if non_empty(args.service_account_email.as_deref()).is_some() {
        runner.warning(
            "service_account_email is deprecated and ignored; \
             the client_email of the service account key is used",
        );
    }

    let requested_components = non_empty(args.install_components.as_deref());
    let (client, installed) = if args.skip_install {
        if non_empty(args.version.as_deref()).is_some_and(|v| v != "latest") {
            runner.warning("Ignoring \"version\" because \"skip_install\" was true!");
        }
        if requested_components.is_some() {
            runner.warning(
                "Installing custom components with the system-provided gcloud may fail; \
                 set \"skip_install\" to false to install a managed version",
            );
        }
        tracing::info!("skipping install, using gcloud from PATH");
        (GcloudClient::new(), None)
    } else {
        let (version, bin) = install_sdk(&args, &config.sdk.version).await?;
        runner.add_path(&bin).context(Phase::Output)?;
        (
            GcloudClient::with_executor(RealExecutor::with_bin_dir(bin)),
            Some(version),
        )
    };
    runner
        .export_variable(METRICS_ENV_VAR, METRICS_LABEL)
        .context(Phase::Output)?;
    runner
        .export_variable(METRICS_VERSION_ENV_VAR, METRICS_VERSION)
        .context(Phase::Output)?;

    let components: Vec<String> = match requested_components {
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_owned)
            .collect(),
        None => config.sdk.components.clone(),
    };
    client
        .install_components(&components)
        .await
        .context(Phase::Install)?;

    let credentials = match non_empty(args.service_account_key.as_deref()) {
        Some(key) => {
            let credentials = Credentials::parse(key).context(Phase::Auth)?;
            client
                .authenticate(&credentials)
                .await
                .context(Phase::Auth)?;
            Some(credentials)
        }
        None => None,
    };

    let project = non_empty(args.project_id.as_deref())
        .or(non_empty(config.project.gcp_project_id.as_deref()))
        .or(credentials.as_ref().and_then(Credentials::project_id))
        .map(str::to_owned);

    let authenticated_by = match (&credentials, &args.gha_creds_path) {
        (Some(_), _) => Some("service_account_key"),
        (None, Some(path)) => {
            if !path.is_file() {
                return Err(anyhow::anyhow!(
                    "credentials file {} from {CREDS_PATH_ENV} does not exist",
                    path.display()
                )
                .context(Phase::Auth));
            }
            client
                .authenticate_cred_file(path)
                .await
                .context(Phase::Auth)?;
            Some(CREDS_PATH_ENV)
        }
        (None, None) => None,
    };

    if let Some(project) = &project {
        client.set_project(project).await.context(Phase::Auth)?;
    }

    match &credentials {
        Some(credentials) if args.export_default_credentials => export_credentials(
            &runner,
            credentials,
            args.credentials_file_path,
            project.as_deref(),
        )?,
        _ => {}
    }

    let report = match authenticated_by {
        Some(source) => {
            tracing::info!(source, "gcloud authenticated");
            Some(preflight(&client).await?)
        }
        None => match client.check_prerequisites().await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::debug!(error = %e, "gcloud preflight without credentials");
                runner.warning(
                    "The gcloud CLI is not authenticated (or it is not installed). \
                     Authenticate by adding the \"google-github-actions/auth\" step \
                     prior to this one.",
                );
                None
            }
        },
    };

    let version = installed.or(report.map(|r| r.gcloud_version));
    if let Some(version) = version {
        runner
            .set_output("version", &version)
            .context(Phase::Output)?;
    }
    Ok(())
}

async fn install_sdk(
    args: &SetupGcloudArgs,
    default_version: &str,
) -> anyhow::Result<(String, PathBuf)> {
    let tool_cache = args
        .tool_cache
        .clone()
        .ok_or_else(|| anyhow::anyhow!("RUNNER_TOOL_CACHE is not set"))
        .context(Phase::Install)?;
    let platform = Platform::current().context(Phase::Install)?;
    let installer = SdkInstaller::new(tool_cache);

    let requested = non_empty(args.version.as_deref()).unwrap_or(default_version);
    let version = installer
        .resolve_version(requested)
        .await
        .context(Phase::Install)?;
    tracing::info!(%version, "installing Cloud SDK");

    let bin = installer
        .install(&version, &platform)
        .await
        .context(Phase::Install)?;
    Ok((version, bin))
}

fn export_credentials(
    runner: &Runner,
    credentials: &Credentials,
    path: Option<PathBuf>,
    project: Option<&str>,
) -> anyhow::Result<()> {
    let path = match path {
        Some(path) => path,
        None => runner
            .workspace()
            .context(Phase::Auth)?
            .join(format!("gha-creds-{}.json", uuid::Uuid::new_v4().simple())),
    };
    credentials.write_to(&path).context(Phase::Auth)?;

    let path = path.display().to_string();
    if let Some(project) = project {
        runner
            .export_variable(PROJECT_ENV, project)
            .context(Phase::Output)?;
    }
    runner
        .export_variable(APPLICATION_CREDENTIALS_ENV, &path)
        .context(Phase::Output)?;
    runner
        .export_variable(CREDS_PATH_ENV, &path)
        .context(Phase::Output)?;

    tracing::info!(%path, "exported default credentials");
    Ok(())
}

async fn preflight<E: GcloudExecutor>(
    client: &GcloudClient<E>,
) -> anyhow::Result<PreflightReport> {
    let report = client
        .check_prerequisites()
        .await
        .context(Phase::Preflight)?;
    tracing::info!(
        gcloud = %report.gcloud_version,
        account = %report.account,
        "gcloud configured"
    );
    Ok(report)
}

#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Key file exported by setup-gcloud
    #[arg(long, env = "GOOGLE_GHA_CREDS_PATH")]
    credentials_path: Option<PathBuf>,
}

/// Post step: remove the key file exported by setup-gcloud.
pub fn cleanup(args: CleanupArgs) -> anyhow::Result<()> {
    let Some(path) = args.credentials_path else {
        tracing::info!("no exported credentials to remove");
        return Ok(());
    };

    if !path.exists() {
        tracing::info!(path = %path.display(), "exported credentials already removed");
        return Ok(());
    }

    std::fs::remove_file(&path)
        .with_context(|| format!("failed to remove {}", path.display()))
        .context(Phase::Cleanup)?;
    tracing::info!(path = %path.display(), "removed exported credentials");
    Ok(())
}
