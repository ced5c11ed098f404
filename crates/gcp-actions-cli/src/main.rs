mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "gcp-actions",
    about = "GitHub Actions steps for Google Cloud Platform"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the Cloud SDK and authenticate gcloud
    SetupGcloud(commands::SetupGcloudArgs),
    /// Deploy an App Engine application
    DeployAppengine(commands::DeployAppEngineArgs),
    /// Deploy a container image or service YAML to Cloud Run
    DeployCloudrun(commands::DeployCloudRunArgs),
    /// Create or update a Cloud Function
    DeployCloudFunction(commands::DeployCloudFunctionArgs),
    /// Delete a Cloud Function
    DeleteCloudFunction(commands::DeleteCloudFunctionArgs),
    /// Upload a file or directory to Cloud Storage
    UploadCloudStorage(commands::UploadCloudStorageArgs),
    /// Write a kubeconfig for a GKE cluster
    GetGkeCredentials(commands::GetGkeCredentialsArgs),
    /// Read Secret Manager secrets into step outputs
    GetSecretmanagerSecrets(commands::GetSecretsArgs),
    /// Mint an OIDC token for Identity-Aware Proxy
    GetIapToken(commands::GetIapTokenArgs),
    /// Remove credentials exported by setup-gcloud
    Cleanup(commands::CleanupArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // arch-lint: allow(no-silent-result-drop) reason="a missing .env is the normal case on CI runners"
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::SetupGcloud(args) => commands::setup_gcloud(args).await?,
        Commands::DeployAppengine(args) => commands::deploy_appengine(args).await?,
        Commands::DeployCloudrun(args) => commands::deploy_cloudrun(args).await?,
        Commands::DeployCloudFunction(args) => commands::deploy_cloud_function(args).await?,
        Commands::DeleteCloudFunction(args) => commands::delete_cloud_function(args).await?,
        Commands::UploadCloudStorage(args) => commands::upload_cloud_storage(args).await?,
        Commands::GetGkeCredentials(args) => commands::get_gke_credentials(args).await?,
        Commands::GetSecretmanagerSecrets(args) => commands::get_secretmanager_secrets(args).await?,
        Commands::GetIapToken(args) => commands::get_iap_token(args).await?,
        Commands::Cleanup(args) => commands::cleanup(args)?,
    }

    Ok(())
}
