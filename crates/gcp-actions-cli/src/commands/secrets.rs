use anyhow::Context;
use clap::Args;
use gcp_actions_cloud::GcloudClient;
use gcp_actions_core::{Runner, parse_secret_refs};
use secrecy::ExposeSecret;

use super::{GcpArgs, Phase, prepare_gcloud};

#[derive(Args, Debug)]
pub struct GetSecretsArgs {
    #[command(flatten)]
    gcp: GcpArgs,

    /// `output:projects/<p>/secrets/<s>[/versions/<v>]` entries, one per
    /// line or comma separated
    #[arg(long, env = "INPUT_SECRETS")]
    secrets: String,
}

pub async fn get_secretmanager_secrets(args: GetSecretsArgs) -> anyhow::Result<()> {
    let runner = Runner::from_env();
    let references = parse_secret_refs(&args.secrets).context(Phase::Input)?;
    if references.is_empty() {
        tracing::warn!("no secrets requested");
        return Ok(());
    }

    let client = GcloudClient::new();
    prepare_gcloud(&client, args.gcp.credentials.as_deref()).await?;

    for reference in &references {
        let value = client
            .access_secret(reference)
            .await
            .context(Phase::Secrets)?;
        runner.add_mask(value.expose_secret());
        runner
            .set_output(&reference.output, value.expose_secret())
            .context(Phase::Output)?;
        tracing::info!(output = %reference.output, secret = %reference.self_link(), "secret read");
    }
    Ok(())
}
