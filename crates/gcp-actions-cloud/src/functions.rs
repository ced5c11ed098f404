//! Cloud Functions (v1) deployment over REST.

use std::collections::BTreeMap;
use std::path::PathBuf;

use reqwest::header;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::archive::{self, ArchiveError};
use crate::operation::{
    self, Operation, OperationSource, PollError, PollOptions, Status, TransportError,
};

pub const DEFAULT_ENDPOINT: &str = "https://cloudfunctions.googleapis.com/v1";

const USER_AGENT: &str = concat!("gcp-actions/", env!("CARGO_PKG_VERSION"));

/// Signed upload URLs accept archives up to 100 MiB.
const SOURCE_CONTENT_LENGTH_RANGE: &str = "0,104857600";

/// Fields replaced when patching an existing function.
const UPDATE_MASK: &[&str] = &[
    "sourceUploadUrl",
    "name",
    "environmentVariables",
    "entryPoint",
    "runtime",
    "vpcConnector",
    "serviceAccountEmail",
    "timeout",
    "maxInstances",
    "eventTrigger.eventType",
    "eventTrigger.resource",
    "eventTrigger.service",
];

/// `projects/<project>/locations/<region>`
pub fn location_parent(project_id: &str, region: &str) -> String {
    format!("projects/{project_id}/locations/{region}")
}

// ── Function definition ──

/// Raw action inputs for a function deployment; empty strings mean "unset".
#[derive(Debug, Clone, Default)]
pub struct CloudFunctionOptions {
    pub name: String,
    pub runtime: String,
    pub description: Option<String>,
    pub entry_point: Option<String>,
    pub source_dir: Option<PathBuf>,
    pub env_vars: BTreeMap<String, String>,
    pub vpc_connector: Option<String>,
    pub service_account_email: Option<String>,
    pub timeout_secs: Option<u32>,
    pub max_instances: Option<u32>,
    pub event_trigger_type: Option<String>,
    pub event_trigger_resource: Option<String>,
    pub event_trigger_service: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Https,
    Event {
        event_type: String,
        resource: String,
        service: Option<String>,
    },
}

/// A validated function definition.
#[derive(Debug, Clone)]
pub struct CloudFunction {
    pub name: String,
    pub runtime: String,
    pub description: Option<String>,
    pub entry_point: Option<String>,
    pub source_dir: PathBuf,
    pub env_vars: BTreeMap<String, String>,
    pub vpc_connector: Option<String>,
    pub service_account_email: Option<String>,
    pub timeout_secs: Option<u32>,
    pub max_instances: Option<u32>,
    pub trigger: Trigger,
}

impl CloudFunction {
    pub fn new(opts: CloudFunctionOptions) -> Result<Self, FunctionsError> {
        let set = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        if opts.name.trim().is_empty() {
            return Err(FunctionsError::MissingField("name"));
        }
        if opts.runtime.trim().is_empty() {
            return Err(FunctionsError::MissingField("runtime"));
        }

        let trigger = match (
            set(opts.event_trigger_type),
            set(opts.event_trigger_resource),
            set(opts.event_trigger_service),
        ) {
            (Some(event_type), Some(resource), service) => Trigger::Event {
                event_type,
                resource,
                service,
            },
            (None, None, None) => Trigger::Https,
            _ => return Err(FunctionsError::IncompleteEventTrigger),
        };

        Ok(Self {
            name: opts.name,
            runtime: opts.runtime,
            description: set(opts.description),
            entry_point: set(opts.entry_point),
            source_dir: opts.source_dir.unwrap_or_else(|| PathBuf::from("./")),
            env_vars: opts.env_vars,
            vpc_connector: set(opts.vpc_connector),
            service_account_email: set(opts.service_account_email),
            timeout_secs: opts.timeout_secs,
            max_instances: opts.max_instances.filter(|n| *n > 0),
            trigger,
        })
    }

    /// Full resource name under `parent`.
    pub fn function_path(&self, parent: &str) -> String {
        format!("{parent}/functions/{}", self.name)
    }

    /// Request body for create/patch.
    pub fn to_resource(&self, parent: &str, source_upload_url: &str) -> FunctionResource {
        let (https_trigger, event_trigger) = match &self.trigger {
            Trigger::Https => (Some(HttpsTrigger::default()), None),
            Trigger::Event {
                event_type,
                resource,
                service,
            } => (
                None,
                Some(EventTrigger {
                    event_type: event_type.clone(),
                    resource: resource.clone(),
                    service: service.clone(),
                }),
            ),
        };

        FunctionResource {
            name: self.function_path(parent),
            description: self.description.clone(),
            entry_point: self.entry_point.clone(),
            runtime: self.runtime.clone(),
            source_upload_url: Some(source_upload_url.to_owned()),
            https_trigger,
            event_trigger,
            environment_variables: self.env_vars.clone(),
            vpc_connector: self.vpc_connector.clone(),
            service_account_email: self.service_account_email.clone(),
            timeout: self.timeout_secs.map(|s| format!("{s}s")),
            max_instances: self.max_instances,
        }
    }
}

// ── Wire types ──

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResource {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
    pub runtime: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_upload_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub https_trigger: Option<HttpsTrigger>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_trigger: Option<EventTrigger>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment_variables: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_connector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_instances: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpsTrigger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTrigger {
    pub event_type: String,
    pub resource: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListFunctionsResponse {
    #[serde(default)]
    functions: Vec<FunctionName>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FunctionName {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadUrlResponse {
    #[serde(default)]
    upload_url: Option<String>,
}

/// HTTPS trigger URL of a successfully deployed function.
pub fn https_trigger_url(op: &Operation) -> Option<String> {
    op.response
        .as_ref()?
        .get("httpsTrigger")?
        .get("url")?
        .as_str()
        .map(str::to_owned)
}

// ── Client ──

/// Cloud Functions API client for one `projects/*/locations/*` parent.
///
/// Authenticates with a bearer token obtained from the caller, usually
/// `gcloud auth print-access-token`.
pub struct FunctionsClient {
    http: reqwest::Client,
    endpoint: String,
    parent: String,
    token: SecretString,
}

impl FunctionsClient {
    pub fn new(parent: impl Into<String>, token: SecretString) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            parent: parent.into(),
            token,
        }
    }

    /// Point the client at another API root (tests, private endpoints).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn parent(&self) -> &str {
        &self.parent
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.endpoint)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<T, TransportError> {
        let response = request
            .bearer_auth(self.token.expose_secret())
            .header(header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| TransportError::Request {
                url: url.to_owned(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => format!("<unreadable body: {e}>"),
            };
            return Err(TransportError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| TransportError::Request {
                url: url.to_owned(),
                source: e,
            })
    }

    /// Resource names of every function under the parent.
    pub async fn list_functions(&self) -> Result<Vec<String>, FunctionsError> {
        let url = self.url(&format!("{}/functions", self.parent));
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.http.get(&url);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let page: ListFunctionsResponse = self.send(request, &url).await?;
            names.extend(page.functions.into_iter().map(|f| f.name));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(names)
    }

    /// Signed URL the source archive must be PUT to.
    pub async fn generate_upload_url(&self) -> Result<String, FunctionsError> {
        let url = self.url(&format!("{}/functions:generateUploadUrl", self.parent));
        let response: UploadUrlResponse = self
            .send(self.http.post(&url).json(&serde_json::json!({})), &url)
            .await?;

        response
            .upload_url
            .filter(|u| !u.is_empty())
            .ok_or(FunctionsError::NoUploadUrl)
    }

    pub async fn upload_source(
        &self,
        upload_url: &str,
        archive: Vec<u8>,
    ) -> Result<(), FunctionsError> {
        let response = self
            .http
            .put(upload_url)
            .header(header::CONTENT_TYPE, "application/zip")
            .header("x-goog-content-length-range", SOURCE_CONTENT_LENGTH_RANGE)
            .body(archive)
            .send()
            .await
            .map_err(|e| TransportError::Request {
                url: upload_url.to_owned(),
                source: e,
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => format!("<unreadable body: {e}>"),
            };
            Err(TransportError::Status {
                url: upload_url.to_owned(),
                status: status.as_u16(),
                body,
            }
            .into())
        }
    }

    pub async fn create_function(
        &self,
        resource: &FunctionResource,
    ) -> Result<Operation, FunctionsError> {
        let url = self.url(&format!("{}/functions", self.parent));
        Ok(self.send(self.http.post(&url).json(resource), &url).await?)
    }

    pub async fn patch_function(
        &self,
        resource: &FunctionResource,
    ) -> Result<Operation, FunctionsError> {
        let url = self.url(&resource.name);
        let request = self
            .http
            .patch(&url)
            .query(&[("updateMask", UPDATE_MASK.join(","))])
            .json(resource);
        Ok(self.send(request, &url).await?)
    }

    pub async fn delete_function(&self, function_path: &str) -> Result<Operation, FunctionsError> {
        let url = self.url(function_path);
        Ok(self.send(self.http.delete(&url), &url).await?)
    }

    /// Upload the function's source and create or update it, waiting for the
    /// resulting operation. A failed operation is returned as
    /// [`FunctionsError::OperationFailed`].
    pub async fn deploy(
        &self,
        function: &CloudFunction,
        poll: &PollOptions,
    ) -> Result<Operation, FunctionsError> {
        let function_path = function.function_path(&self.parent);
        let deployed = self.list_functions().await?;

        let source = archive::zip_dir(&function.source_dir)?;
        let upload_url = self.generate_upload_url().await?;
        self.upload_source(&upload_url, source).await?;
        tracing::info!(function = %function_path, "source uploaded");

        let resource = function.to_resource(&self.parent, &upload_url);
        let (op, message) = if deployed.contains(&function_path) {
            tracing::info!("Creating a function revision");
            (
                self.patch_function(&resource).await?,
                "Updating function deployment",
            )
        } else {
            tracing::info!("Creating a new function deployment");
            (
                self.create_function(&resource).await?,
                "Creating function deployment",
            )
        };

        let done = operation::poll_operation(self, &op, message, poll).await?;
        ensure_succeeded(done)
    }

    pub async fn delete(
        &self,
        function_path: &str,
        poll: &PollOptions,
    ) -> Result<Operation, FunctionsError> {
        let op = self.delete_function(function_path).await?;
        let done =
            operation::poll_operation(self, &op, "Deleting function deployment", poll).await?;
        ensure_succeeded(done)
    }
}

impl OperationSource for FunctionsClient {
    async fn get_operation(&self, name: &str) -> Result<Operation, TransportError> {
        let url = self.url(name);
        self.send(self.http.get(&url), &url).await
    }
}

fn ensure_succeeded(op: Operation) -> Result<Operation, FunctionsError> {
    match op.error {
        Some(status) => Err(FunctionsError::OperationFailed {
            name: op.name,
            status,
        }),
        None => Ok(op),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FunctionsError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("for event triggered functions, event_trigger_type and event_trigger_resource are required")]
    IncompleteEventTrigger,

    #[error("unable to generate a signed upload URL")]
    NoUploadUrl,

    #[error("failed to package function source")]
    Archive {
        #[from]
        source: ArchiveError,
    },

    #[error("cloud functions request failed")]
    Transport {
        #[from]
        source: TransportError,
    },

    #[error("function deployment did not complete")]
    Poll {
        #[from]
        source: PollError,
    },

    #[error("operation {name} failed: {status}")]
    OperationFailed { name: String, status: Status },
}
