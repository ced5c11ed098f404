use anyhow::Context;
use clap::{ArgAction, Args};
use gcp_actions_cloud::{GcloudClient, KubeAuth, KubeConfig};
use gcp_actions_core::Runner;

use super::{GcpArgs, Phase, load_config, non_empty, prepare_gcloud, resolve_project};

const KUBECONFIG_ENV: &str = "KUBECONFIG";

#[derive(Args, Debug)]
pub struct GetGkeCredentialsArgs {
    #[command(flatten)]
    gcp: GcpArgs,

    /// Cluster name
    #[arg(long, env = "INPUT_CLUSTER_NAME")]
    cluster_name: String,

    /// Zone or region of the cluster; falls back to `[project].region`
    #[arg(long, env = "INPUT_LOCATION")]
    location: Option<String>,

    /// Use the `gcp` auth provider instead of embedding an access token
    #[arg(
        long,
        env = "INPUT_USE_AUTH_PROVIDER",
        default_value_t = false,
        action = ArgAction::Set
    )]
    use_auth_provider: bool,

    /// Talk to the private endpoint of a private cluster
    #[arg(
        long,
        env = "INPUT_USE_INTERNAL_IP",
        default_value_t = false,
        action = ArgAction::Set
    )]
    use_internal_ip: bool,
}

pub async fn get_gke_credentials(args: GetGkeCredentialsArgs) -> anyhow::Result<()> {
    let config = load_config()?;
    let runner = Runner::from_env();
    let workspace = runner.workspace().context(Phase::Input)?.to_path_buf();

    let client = GcloudClient::new();
    let credentials = prepare_gcloud(&client, args.gcp.credentials.as_deref()).await?;
    let project = resolve_project(
        args.gcp.project_id.as_deref(),
        &config,
        credentials.as_ref(),
    )?;
    let location = non_empty(args.location.as_deref()).unwrap_or(&config.project.region);

    let cluster = client
        .describe_cluster(&args.cluster_name, location, &project)
        .await
        .context(Phase::Cluster)?;

    let auth = if args.use_auth_provider {
        KubeAuth::AuthProvider
    } else {
        KubeAuth::Token(client.print_access_token().await.context(Phase::Auth)?)
    };
    let kubeconfig =
        KubeConfig::for_cluster(&cluster, args.use_internal_ip, &auth).context(Phase::Cluster)?;
    let path = kubeconfig.write_to(&workspace).context(Phase::Output)?;
    tracing::info!(cluster = %cluster.name, path = %path.display(), "kubeconfig written");

    runner
        .export_variable(KUBECONFIG_ENV, &path.display().to_string())
        .context(Phase::Output)?;
    Ok(())
}
