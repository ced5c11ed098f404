use anyhow::Context;
use clap::Args;
use gcp_actions_cloud::IapTokenClient;
use gcp_actions_core::{Credentials, Runner};
use secrecy::ExposeSecret;

use super::{Phase, non_empty};

#[derive(Args, Debug)]
pub struct GetIapTokenArgs {
    /// Service account key JSON, raw or base64 encoded; defaults to the
    /// file named by GOOGLE_APPLICATION_CREDENTIALS
    #[arg(
        long,
        alias = "credentials",
        env = "INPUT_SERVICE_ACCOUNT_KEY",
        hide_env_values = true
    )]
    service_account_key: Option<String>,

    /// OAuth client ID of the IAP-protected resource
    #[arg(long, alias = "oauth-client-id", env = "INPUT_IAP_OAUTH_CLIENT_ID")]
    iap_oauth_client_id: String,
}

pub async fn get_iap_token(args: GetIapTokenArgs) -> anyhow::Result<()> {
    let runner = Runner::from_env();

    let audience = non_empty(Some(args.iap_oauth_client_id.as_str()))
        .ok_or_else(|| anyhow::anyhow!("iap_oauth_client_id is required"))
        .context(Phase::Input)?;
    let credentials =
        Credentials::resolve(non_empty(args.service_account_key.as_deref())).context(Phase::Auth)?;
    tracing::info!(
        service_account = %credentials.client_email(),
        "requesting IAP token"
    );

    let token = IapTokenClient::new()
        .id_token(&credentials.key, audience)
        .await
        .context(Phase::Token)?;

    runner.add_mask(token.expose_secret());
    runner
        .set_output("token", token.expose_secret())
        .context(Phase::Output)?;
    Ok(())
}
