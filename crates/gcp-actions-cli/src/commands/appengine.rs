use anyhow::Context;
use clap::{ArgAction, Args};
use gcp_actions_cloud::{AppEngineDeploy, GcloudClient};
use gcp_actions_core::Runner;

use super::{GcpArgs, Phase, load_config, non_empty, prepare_gcloud, resolve_project};

#[derive(Args, Debug)]
pub struct DeployAppEngineArgs {
    #[command(flatten)]
    gcp: GcpArgs,

    /// Space-separated deployable files, relative to the working directory
    #[arg(long, env = "INPUT_DELIVERABLES", default_value = "app.yaml")]
    deliverables: String,

    /// Prebuilt container image to deploy instead of building one
    #[arg(long, env = "INPUT_IMAGE-URL")]
    image_url: Option<String>,

    /// Version ID; gcloud generates one when unset
    #[arg(long, env = "INPUT_VERSION")]
    version: Option<String>,

    /// Route all traffic to the new version
    #[arg(long, env = "INPUT_PROMOTE", default_value_t = true, action = ArgAction::Set)]
    promote: bool,
}

pub async fn deploy_appengine(args: DeployAppEngineArgs) -> anyhow::Result<()> {
    let config = load_config()?;
    let runner = Runner::from_env();

    let deliverables: Vec<String> = args
        .deliverables
        .split_whitespace()
        .map(str::to_owned)
        .collect();
    if deliverables.is_empty() {
        anyhow::bail!("{}: deliverables must name at least one file", Phase::Input);
    }

    let client = GcloudClient::new();
    let credentials = prepare_gcloud(&client, args.gcp.credentials.as_deref()).await?;
    let project = resolve_project(
        args.gcp.project_id.as_deref(),
        &config,
        credentials.as_ref(),
    )?;

    let deploy = AppEngineDeploy {
        deliverables,
        image_url: non_empty(args.image_url.as_deref()).map(str::to_owned),
        version: non_empty(args.version.as_deref()).map(str::to_owned),
        promote: args.promote,
    };
    tracing::info!(%project, promote = deploy.promote, "deploying to App Engine");

    let url = client
        .deploy_app_engine(&project, &deploy)
        .await
        .context(Phase::Deploy)?;
    tracing::info!(%url, "App Engine deploy finished");

    runner.set_output("url", &url).context(Phase::Output)?;
    Ok(())
}
