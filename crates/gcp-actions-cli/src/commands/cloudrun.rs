use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use gcp_actions_cloud::{CloudRunDeploy, GcloudClient};
use gcp_actions_core::{Runner, parse_env_vars};

use super::{GcpArgs, Phase, load_config, non_empty, prepare_gcloud, resolve_project};

#[derive(Args, Debug)]
pub struct DeployCloudRunArgs {
    #[command(flatten)]
    gcp: GcpArgs,

    /// Cloud Run service name
    #[arg(long, env = "INPUT_SERVICE")]
    service: Option<String>,

    /// Container image to deploy
    #[arg(long, env = "INPUT_IMAGE")]
    image: Option<String>,

    /// Knative service YAML to apply with `gcloud run services replace`
    #[arg(long, env = "INPUT_METADATA")]
    metadata: Option<PathBuf>,

    /// Region; falls back to `[project].region` in gcp-actions.toml
    #[arg(long, env = "INPUT_REGION")]
    region: Option<String>,

    /// Environment variables, `KEY1=VALUE1,KEY2=VALUE2`
    #[arg(long, env = "INPUT_ENV_VARS")]
    env_vars: Option<String>,
}

/// What a Cloud Run deploy applies: a whole service definition, or an
/// image on a named service.
enum Target {
    Metadata(PathBuf),
    Image(CloudRunDeploy),
}

fn target(args: &DeployCloudRunArgs) -> anyhow::Result<Target> {
    let service = non_empty(args.service.as_deref());
    let image = non_empty(args.image.as_deref());
    let env_vars = non_empty(args.env_vars.as_deref());

    match (&args.metadata, service, image) {
        (Some(path), _, _) => {
            if image.is_some() || env_vars.is_some() {
                anyhow::bail!(
                    "metadata replaces the whole service; \
                     set the image and environment variables in {}",
                    path.display()
                );
            }
            if !path.is_file() {
                anyhow::bail!("metadata file {} does not exist", path.display());
            }
            Ok(Target::Metadata(path.clone()))
        }
        (None, Some(service), Some(image)) => Ok(Target::Image(CloudRunDeploy {
            service: service.to_owned(),
            image: image.to_owned(),
            env_vars: match env_vars {
                Some(list) => parse_env_vars(list)?,
                None => Default::default(),
            },
        })),
        (None, _, _) => anyhow::bail!("Provide image and service names or a YAML file"),
    }
}

pub async fn deploy_cloudrun(args: DeployCloudRunArgs) -> anyhow::Result<()> {
    let config = load_config()?;
    let runner = Runner::from_env();

    let target = target(&args).context(Phase::Input)?;
    let region = non_empty(args.region.as_deref())
        .unwrap_or(&config.project.region)
        .to_owned();

    let client = GcloudClient::new();
    let credentials = prepare_gcloud(&client, args.gcp.credentials.as_deref()).await?;
    let project = resolve_project(
        args.gcp.project_id.as_deref(),
        &config,
        credentials.as_ref(),
    )?;

    let url = match target {
        Target::Metadata(path) => {
            tracing::info!(
                metadata = %path.display(),
                %project,
                %region,
                "replacing Cloud Run service"
            );
            client.replace_cloud_run(&project, &region, &path).await
        }
        Target::Image(deploy) => {
            tracing::info!(service = %deploy.service, %project, %region, "deploying to Cloud Run");
            client.deploy_cloud_run(&project, &region, &deploy).await
        }
    }
    .context(Phase::Deploy)?;
    tracing::info!(%url, "Cloud Run deploy finished");

    runner.set_output("url", &url).context(Phase::Output)?;
    Ok(())
}
