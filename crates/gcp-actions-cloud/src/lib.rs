pub mod archive;
pub mod client;
pub mod executor;
pub mod functions;
pub mod gcloud;
pub mod iap;
pub mod kubeconfig;
pub mod operation;
pub mod retry;
pub mod sdk;
pub mod upload;

pub use client::{
    AppEngineDeploy, CloudRunDeploy, DeployError, GcloudClient, PreflightError, PreflightReport,
    SecretError, SetupError, UploadError,
};
pub use executor::{CommandOutput, GcloudExecutor, RealExecutor};
pub use functions::{CloudFunction, CloudFunctionOptions, FunctionsClient, FunctionsError, Trigger};
pub use gcloud::GcloudError;
pub use iap::{IapError, IapTokenClient};
pub use kubeconfig::{Cluster, KubeAuth, KubeConfig, KubeconfigError};
pub use operation::{
    Operation, OperationSource, OperationState, PollError, PollOptions, Status, TransportError,
    poll_operation,
};
pub use retry::Backoff;
pub use sdk::{Platform, SdkError, SdkInstaller};
pub use upload::{Destination, PlanError, PlannedUpload, plan_upload, upload_all};
