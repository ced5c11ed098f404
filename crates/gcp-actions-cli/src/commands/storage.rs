use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Args};
use gcp_actions_cloud::{Destination, GcloudClient, plan_upload, upload_all};
use gcp_actions_core::Runner;

use super::{GcpArgs, Phase, prepare_gcloud};

#[derive(Args, Debug)]
pub struct UploadCloudStorageArgs {
    #[command(flatten)]
    gcp: GcpArgs,

    /// File or directory to upload
    #[arg(long, env = "INPUT_PATH")]
    path: PathBuf,

    /// `bucket[/prefix]`
    #[arg(long, env = "INPUT_DESTINATION")]
    destination: String,

    /// Gzip files on the way up
    #[arg(long, env = "INPUT_GZIP", default_value_t = true, action = ArgAction::Set)]
    gzip: bool,
}

pub async fn upload_cloud_storage(args: UploadCloudStorageArgs) -> anyhow::Result<()> {
    let runner = Runner::from_env();

    let destination = Destination::parse(&args.destination).context(Phase::Input)?;
    let planned = plan_upload(&args.path, &destination).context(Phase::Input)?;
    tracing::info!(
        files = planned.len(),
        bucket = %destination.bucket,
        "planned upload"
    );

    let client = GcloudClient::new();
    prepare_gcloud(&client, args.gcp.credentials.as_deref()).await?;

    let uploaded = upload_all(&client, &destination, &planned, args.gzip)
        .await
        .context(Phase::Upload)?;

    runner
        .set_output("uploaded", &uploaded.join(","))
        .context(Phase::Output)?;
    Ok(())
}
