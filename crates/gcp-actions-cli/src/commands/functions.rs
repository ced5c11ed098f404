use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use gcp_actions_cloud::functions::{https_trigger_url, location_parent};
use gcp_actions_cloud::{
    CloudFunction, CloudFunctionOptions, FunctionsClient, FunctionsError, GcloudClient, PollOptions,
    Trigger,
};
use gcp_actions_core::{ActionsConfig, Credentials, Runner, parse_env_vars};

use super::{GcpArgs, Phase, load_config, non_empty, prepare_gcloud, resolve_project};

#[derive(Args, Debug)]
pub struct DeployCloudFunctionArgs {
    #[command(flatten)]
    gcp: GcpArgs,

    /// Function name
    #[arg(long, env = "INPUT_NAME")]
    name: String,

    /// Runtime, e.g. nodejs20 or python312
    #[arg(long, env = "INPUT_RUNTIME")]
    runtime: String,

    /// Region; falls back to `[project].region` in gcp-actions.toml
    #[arg(long, env = "INPUT_REGION")]
    region: Option<String>,

    #[arg(long, env = "INPUT_DESCRIPTION")]
    description: Option<String>,

    /// Exported function to run; defaults to the function name
    #[arg(long, env = "INPUT_ENTRY_POINT")]
    entry_point: Option<String>,

    /// Directory zipped and uploaded as the function source
    #[arg(long, env = "INPUT_SOURCE_DIR")]
    source_dir: Option<PathBuf>,

    /// Environment variables, `KEY1=VALUE1,KEY2=VALUE2`
    #[arg(long, env = "INPUT_ENV_VARS")]
    env_vars: Option<String>,

    #[arg(long, env = "INPUT_VPC_CONNECTOR")]
    vpc_connector: Option<String>,

    /// Service account the function runs as
    #[arg(long, env = "INPUT_SERVICE_ACCOUNT_EMAIL")]
    service_account_email: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "INPUT_TIMEOUT")]
    timeout: Option<u32>,

    #[arg(long, env = "INPUT_MAX_INSTANCES")]
    max_instances: Option<u32>,

    #[arg(long, env = "INPUT_EVENT_TRIGGER_TYPE")]
    event_trigger_type: Option<String>,

    #[arg(long, env = "INPUT_EVENT_TRIGGER_RESOURCE")]
    event_trigger_resource: Option<String>,

    #[arg(long, env = "INPUT_EVENT_TRIGGER_SERVICE")]
    event_trigger_service: Option<String>,
}

#[derive(Args, Debug)]
pub struct DeleteCloudFunctionArgs {
    #[command(flatten)]
    gcp: GcpArgs,

    /// Function name
    #[arg(long, env = "INPUT_NAME")]
    name: String,

    /// Region; falls back to `[project].region` in gcp-actions.toml
    #[arg(long, env = "INPUT_REGION")]
    region: Option<String>,
}

pub async fn deploy_cloud_function(args: DeployCloudFunctionArgs) -> anyhow::Result<()> {
    let config = load_config()?;
    let runner = Runner::from_env();

    let env_vars = match non_empty(args.env_vars.as_deref()) {
        Some(list) => parse_env_vars(list).context(Phase::Input)?,
        None => Default::default(),
    };
    let function = CloudFunction::new(CloudFunctionOptions {
        name: args.name,
        runtime: args.runtime,
        description: args.description,
        entry_point: args.entry_point,
        source_dir: args.source_dir,
        env_vars,
        vpc_connector: args.vpc_connector,
        service_account_email: args.service_account_email,
        timeout_secs: args.timeout,
        max_instances: args.max_instances,
        event_trigger_type: args.event_trigger_type,
        event_trigger_resource: args.event_trigger_resource,
        event_trigger_service: args.event_trigger_service,
    })
    .context(Phase::Input)?;

    let (client, poll) = functions_client(&args.gcp, args.region.as_deref(), &config).await?;
    tracing::info!(function = %function.function_path(client.parent()), "deploying Cloud Function");

    let done = client
        .deploy(&function, &poll)
        .await
        .map_err(with_phase)?;

    if function.trigger == Trigger::Https {
        match https_trigger_url(&done) {
            Some(url) => {
                tracing::info!(%url, "function deployed");
                runner.set_output("url", &url).context(Phase::Output)?;
            }
            None => tracing::warn!("deployment finished without an HTTPS trigger URL"),
        }
    } else {
        tracing::info!("event triggered function deployed");
    }
    Ok(())
}

pub async fn delete_cloud_function(args: DeleteCloudFunctionArgs) -> anyhow::Result<()> {
    let config = load_config()?;
    if non_empty(Some(args.name.as_str())).is_none() {
        return Err(FunctionsError::MissingField("name")).context(Phase::Input);
    }

    let (client, poll) = functions_client(&args.gcp, args.region.as_deref(), &config).await?;
    let function_path = format!("{}/functions/{}", client.parent(), args.name.trim());
    tracing::info!(function = %function_path, "deleting Cloud Function");

    client
        .delete(&function_path, &poll)
        .await
        .map_err(with_phase)?;
    tracing::info!(function = %function_path, "function deleted");
    Ok(())
}

/// Authenticate gcloud, borrow its access token, and point a REST client
/// at `projects/<p>/locations/<region>`.
async fn functions_client(
    gcp: &GcpArgs,
    region: Option<&str>,
    config: &ActionsConfig,
) -> anyhow::Result<(FunctionsClient, PollOptions)> {
    let gcloud = GcloudClient::new();
    let credentials: Option<Credentials> =
        prepare_gcloud(&gcloud, gcp.credentials.as_deref()).await?;
    let project = resolve_project(gcp.project_id.as_deref(), config, credentials.as_ref())?;
    let region = non_empty(region).unwrap_or(&config.project.region);

    let token = gcloud.print_access_token().await.context(Phase::Auth)?;
    let client = FunctionsClient::new(location_parent(&project, region), token);
    Ok((client, PollOptions::from_settings(&config.poll)))
}

fn with_phase(err: FunctionsError) -> anyhow::Error {
    let phase = match &err {
        FunctionsError::Poll { .. } | FunctionsError::OperationFailed { .. } => Phase::DeployPoll,
        _ => Phase::Deploy,
    };
    anyhow::Error::new(err).context(phase)
}
