//! Long-running operation polling.
//!
//! Control-plane calls that create, update, or delete a resource return an
//! [`Operation`] handle. [`poll_operation`] re-fetches it by name on a fixed
//! interval until the server reports it finished or the retry budget runs
//! out.
//!
//! ```text
//! Pending ──done, no error──▶ Succeeded
//!    │    ──error──────────▶ Failed
//!    └────budget exhausted─▶ TimedOut (PollError::Timeout)
//! ```
//!
//! An operation that finished with an `error` is returned as `Ok`: the
//! provider accepted the request and reported its outcome, and the caller
//! decides what a failed outcome means.

use std::time::Duration;

use gcp_actions_core::PollSettings;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::gcloud::GcloudError;

/// Server-side handle for an asynchronous task (`google.longrunning.Operation`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Failure descriptor reported by the provider (`google.rpc.Status`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<Value>,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Pending,
    Succeeded,
    Failed,
}

impl Operation {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn state(&self) -> OperationState {
        if self.error.is_some() {
            OperationState::Failed
        } else if self.done {
            OperationState::Succeeded
        } else {
            OperationState::Pending
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state() != OperationState::Pending
    }
}

/// Errors from a single request against the control-plane API.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request to {url} failed")]
    Request { url: String, source: reqwest::Error },

    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("failed to obtain an access token")]
    Token { source: GcloudError },
}

/// Anything that can fetch the current state of an operation by name.
#[allow(async_fn_in_trait)]
pub trait OperationSource: Send + Sync {
    async fn get_operation(&self, name: &str) -> Result<Operation, TransportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub max_retries: u32,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::from_settings(&PollSettings::default())
    }
}

impl PollOptions {
    pub fn from_settings(settings: &PollSettings) -> Self {
        Self {
            interval: Duration::from_secs(settings.interval_secs),
            max_retries: settings.max_retries,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("invalid operation: name is empty")]
    InvalidOperation,

    #[error("failed to fetch status of operation {name}")]
    Transport {
        name: String,
        source: TransportError,
    },

    /// `last` is the final snapshot fetched before giving up; its
    /// `metadata` carries whatever progress the provider reported.
    #[error("operation {name} did not finish after {attempts} polls")]
    Timeout {
        name: String,
        attempts: u32,
        last: Option<Box<Operation>>,
    },
}

/// Poll `op` until it reaches a terminal state.
///
/// Logs `display_message` before every poll and sleeps `options.interval`
/// between polls that come back pending. Transport failures are returned
/// immediately; only "not done yet" is retried.
pub async fn poll_operation<S>(
    source: &S,
    op: &Operation,
    display_message: &str,
    options: &PollOptions,
) -> Result<Operation, PollError>
where
    S: OperationSource + ?Sized,
{
    if op.name.trim().is_empty() {
        return Err(PollError::InvalidOperation);
    }

    let mut current_try = 0;
    let mut last = None;
    while current_try < options.max_retries {
        tracing::info!(
            operation = %op.name,
            attempt = current_try + 1,
            max_retries = options.max_retries,
            "{display_message}",
        );

        let response = source
            .get_operation(&op.name)
            .await
            .map_err(|e| PollError::Transport {
                name: op.name.clone(),
                source: e,
            })?;

        if response.is_terminal() {
            tracing::debug!(operation = %op.name, state = ?response.state(), "operation finished");
            return Ok(response);
        }

        last = Some(Box::new(response));
        current_try += 1;
        if current_try < options.max_retries {
            tokio::time::sleep(options.interval).await;
        }
    }

    Err(PollError::Timeout {
        name: op.name.clone(),
        attempts: current_try,
        last,
    })
}
