use crate::executor::{GcloudExecutor, RealExecutor};
use crate::gcloud::GcloudError;
use crate::kubeconfig::Cluster;
use crate::retry::Backoff;
use gcp_actions_core::{Credentials, SecretReference};
use regex::Regex;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

/// First `https://<host>.<tld>` URL in `app deploy` output.
static DEPLOYED_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://[A-Za-z0-9.\-]+\.[A-Za-z]+").expect("static pattern compiles")
});

/// gcloud operations client, parameterized over the executor for testability.
pub struct GcloudClient<E: GcloudExecutor = RealExecutor> {
    executor: E,
    backoff: Backoff,
}

impl GcloudClient<RealExecutor> {
    pub fn new() -> Self {
        Self::with_executor(RealExecutor::default())
    }
}

impl Default for GcloudClient<RealExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: GcloudExecutor> GcloudClient<E> {
    pub fn with_executor(executor: E) -> Self {
        Self {
            executor,
            backoff: Backoff::default(),
        }
    }

    /// Override the backoff used for URL discovery.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    // ── Preflight ──

    /// Check that gcloud runs and has an active account.
    pub async fn check_prerequisites(&self) -> Result<PreflightReport, PreflightError> {
        let version = self
            .executor
            .exec(&args(["version", "--format", "value(\"Google Cloud SDK\")"]))
            .await
            .map_err(|e| PreflightError::GcloudNotInstalled { source: e })?;

        let accounts = self
            .executor
            .exec(&args([
                "auth",
                "list",
                "--filter",
                "status:ACTIVE",
                "--format",
                "value(account)",
            ]))
            .await
            .map_err(|e| PreflightError::AuthList { source: e })?;

        let account = accounts
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .ok_or(PreflightError::NotAuthenticated)?;

        Ok(PreflightReport {
            gcloud_version: version.trim().to_owned(),
            account: account.to_owned(),
        })
    }

    // ── Setup ──

    /// `gcloud auth activate-service-account` with the key piped on stdin.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<(), SetupError> {
        let email = credentials.client_email();
        tracing::info!(account = %email, "activating service account");
        self.executor
            .exec_with_stdin(
                &args([
                    "--quiet",
                    "auth",
                    "activate-service-account",
                    email,
                    "--key-file",
                    "-",
                ]),
                credentials.json().as_bytes(),
            )
            .await
            .map_err(|e| SetupError::Authenticate { source: e })?;
        Ok(())
    }

    /// `gcloud auth login --cred-file`, for a credentials file written by an
    /// earlier auth step. Service account keys and external accounts both work.
    pub async fn authenticate_cred_file(&self, path: &Path) -> Result<(), SetupError> {
        let file = path
            .to_str()
            .ok_or_else(|| SetupError::InvalidPath(path.to_path_buf()))?;
        tracing::info!(path = %file, "authenticating with credentials file");
        self.executor
            .exec(&args(["--quiet", "auth", "login", "--cred-file", file]))
            .await
            .map_err(|e| SetupError::Authenticate { source: e })?;
        Ok(())
    }

    pub async fn set_project(&self, project_id: &str) -> Result<(), SetupError> {
        self.executor
            .exec(&args(["--quiet", "config", "set", "project", project_id]))
            .await
            .map_err(|e| SetupError::SetProject { source: e })?;
        Ok(())
    }

    pub async fn install_components(&self, components: &[String]) -> Result<(), SetupError> {
        if components.is_empty() {
            return Ok(());
        }

        let mut cmd = args(["--quiet", "components", "install"]);
        cmd.extend(components.iter().cloned());
        self.executor
            .exec_streaming(&cmd)
            .await
            .map_err(|e| SetupError::Components { source: e })
    }

    /// OAuth access token of the active account.
    pub async fn print_access_token(&self) -> Result<SecretString, GcloudError> {
        let token = self
            .executor
            .exec(&args(["auth", "print-access-token"]))
            .await?;
        Ok(SecretString::from(token.trim().to_owned()))
    }

    // ── App Engine ──

    /// Deploy to App Engine and return the URL gcloud reports.
    pub async fn deploy_app_engine(
        &self,
        project_id: &str,
        deploy: &AppEngineDeploy,
    ) -> Result<String, DeployError> {
        let mut cmd = args(["app", "deploy", "--quiet"]);
        cmd.extend(deploy.deliverables.iter().cloned());
        cmd.extend(args(["--project", project_id]));
        if let Some(image) = &deploy.image_url {
            cmd.extend(args(["--image-url", image]));
        }
        if let Some(version) = &deploy.version {
            cmd.extend(args(["--version", version]));
        }
        cmd.push(if deploy.promote { "--promote" } else { "--no-promote" }.to_owned());

        let output = self
            .executor
            .exec_capture(&cmd)
            .await
            .map_err(|e| DeployError::Deploy { source: e })?;

        find_deployed_url(&output.stderr)
            .or_else(|| find_deployed_url(&output.stdout))
            .ok_or(DeployError::MissingUrl)
    }

    // ── Cloud Run ──

    /// Deploy an image to Cloud Run and return the service URL.
    ///
    /// When the deploy output carries no URL, the service is described
    /// with backoff until one appears.
    pub async fn deploy_cloud_run(
        &self,
        project_id: &str,
        region: &str,
        deploy: &CloudRunDeploy,
    ) -> Result<String, DeployError> {
        let env_flag = gcp_actions_core::format_env_vars(&deploy.env_vars);

        let mut cmd = args([
            "run",
            "deploy",
            &deploy.service,
            "--image",
            &deploy.image,
            "--region",
            region,
            "--project",
            project_id,
        ]);
        if !env_flag.is_empty() {
            cmd.extend(args(["--update-env-vars", &env_flag]));
        }
        cmd.extend(args([
            "--platform",
            "managed",
            "--quiet",
            "--format",
            "value(status.url)",
        ]));

        let output = self
            .executor
            .exec(&cmd)
            .await
            .map_err(|e| DeployError::Deploy { source: e })?;

        let url = output.trim();
        if !url.is_empty() {
            return Ok(url.to_owned());
        }

        self.backoff
            .retry("cloud run url discovery", || {
                self.describe_service_url(&deploy.service, project_id, region)
            })
            .await
    }

    /// Replace a Cloud Run service from a service YAML and return its URL.
    ///
    /// The YAML is authoritative: the service name comes from its
    /// `metadata.name`, which is also used for URL discovery.
    pub async fn replace_cloud_run(
        &self,
        project_id: &str,
        region: &str,
        metadata: &Path,
    ) -> Result<String, DeployError> {
        let file = metadata
            .to_str()
            .ok_or_else(|| DeployError::InvalidPath(metadata.to_path_buf()))?;

        let output = self
            .executor
            .exec(&args([
                "run",
                "services",
                "replace",
                file,
                "--region",
                region,
                "--project",
                project_id,
                "--platform",
                "managed",
                "--quiet",
                "--format",
                "json",
            ]))
            .await
            .map_err(|e| DeployError::Deploy { source: e })?;

        let service: ReplacedService =
            serde_json::from_str(&output).map_err(|e| DeployError::Deploy {
                source: GcloudError::UnexpectedOutput {
                    what: "run services replace",
                    source: e,
                },
            })?;

        if let Some(url) = service.status.and_then(|s| s.url).filter(|u| !u.is_empty()) {
            return Ok(url);
        }

        let name = service.metadata.name;
        self.backoff
            .retry("cloud run url discovery", || {
                self.describe_service_url(&name, project_id, region)
            })
            .await
    }

    pub async fn describe_service_url(
        &self,
        service: &str,
        project_id: &str,
        region: &str,
    ) -> Result<String, DeployError> {
        let output = self
            .executor
            .exec(&args([
                "run",
                "services",
                "describe",
                service,
                "--project",
                project_id,
                "--region",
                region,
                "--platform",
                "managed",
                "--format",
                "value(status.url)",
            ]))
            .await
            .map_err(|e| DeployError::Describe { source: e })?;

        let url = output.trim();
        if url.is_empty() {
            Err(DeployError::MissingUrl)
        } else {
            Ok(url.to_owned())
        }
    }

    // ── GKE ──

    pub async fn describe_cluster(
        &self,
        name: &str,
        location: &str,
        project_id: &str,
    ) -> Result<Cluster, GcloudError> {
        let output = self
            .executor
            .exec(&args([
                "container",
                "clusters",
                "describe",
                name,
                "--location",
                location,
                "--project",
                project_id,
                "--format",
                "json",
            ]))
            .await?;

        serde_json::from_str(&output).map_err(|e| GcloudError::UnexpectedOutput {
            what: "container clusters describe",
            source: e,
        })
    }

    // ── Secret Manager ──

    /// Payload of the referenced secret version, as gcloud prints it.
    pub async fn access_secret(
        &self,
        reference: &SecretReference,
    ) -> Result<SecretString, SecretError> {
        let payload = self
            .executor
            .exec(&args([
                "secrets",
                "versions",
                "access",
                &reference.version,
                "--secret",
                &reference.name,
                "--project",
                &reference.project,
            ]))
            .await
            .map_err(|e| SecretError::Access {
                reference: reference.self_link(),
                source: e,
            })?;

        Ok(SecretString::from(payload))
    }

    // ── Cloud Storage ──

    pub async fn upload_object(
        &self,
        local: &Path,
        destination: &str,
        gzip: bool,
    ) -> Result<(), UploadError> {
        let local_str = local
            .to_str()
            .ok_or_else(|| UploadError::InvalidPath(local.to_path_buf()))?;

        let mut cmd = args(["storage", "cp", local_str, destination]);
        if gzip {
            cmd.push("--gzip-local-all".to_owned());
        }

        self.executor
            .exec(&cmd)
            .await
            .map_err(|e| UploadError::Copy {
                destination: destination.to_owned(),
                source: e,
            })?;
        Ok(())
    }
}

// ── Helper ──

fn args<const N: usize>(a: [&str; N]) -> Vec<String> {
    a.iter().map(|s| (*s).to_owned()).collect()
}

fn find_deployed_url(text: &str) -> Option<String> {
    DEPLOYED_URL.find(text).map(|m| m.as_str().to_owned())
}

// ── Request types ──

#[derive(Debug, Clone, Default)]
pub struct AppEngineDeploy {
    pub deliverables: Vec<String>,
    pub image_url: Option<String>,
    pub version: Option<String>,
    pub promote: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CloudRunDeploy {
    pub service: String,
    pub image: String,
    pub env_vars: BTreeMap<String, String>,
}

/// The parts of a replaced Cloud Run service the action reads back.
#[derive(Debug, Deserialize)]
struct ReplacedService {
    metadata: ServiceMetadata,
    #[serde(default)]
    status: Option<ServiceStatus>,
}

#[derive(Debug, Deserialize)]
struct ServiceMetadata {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ServiceStatus {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightReport {
    pub gcloud_version: String,
    pub account: String,
}

// ── Error types ──

#[derive(Debug, thiserror::Error)]
pub enum PreflightError {
    #[error("gcloud CLI not installed; run the setup-gcloud action first")]
    GcloudNotInstalled { source: GcloudError },

    #[error("failed to list gcloud accounts")]
    AuthList { source: GcloudError },

    #[error("gcloud is not authenticated; provide a service account key")]
    NotAuthenticated,
}

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("failed to activate service account")]
    Authenticate { source: GcloudError },

    #[error("failed to set default project")]
    SetProject { source: GcloudError },

    #[error("failed to install gcloud components")]
    Components { source: GcloudError },

    #[error("path is not valid UTF-8: {0}")]
    InvalidPath(std::path::PathBuf),
}

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("deployment failed")]
    Deploy { source: GcloudError },

    #[error("failed to describe deployed service")]
    Describe { source: GcloudError },

    #[error("deployment did not report a URL")]
    MissingUrl,

    #[error("path is not valid UTF-8: {0}")]
    InvalidPath(std::path::PathBuf),
}

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("failed to access secret {reference}")]
    Access {
        reference: String,
        source: GcloudError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("path is not valid UTF-8: {0}")]
    InvalidPath(std::path::PathBuf),

    #[error("failed to upload to {destination}")]
    Copy {
        destination: String,
        source: GcloudError,
    },
}
