//! Core types and configuration for gcp-actions.
//!
//! This crate defines the `gcp-actions.toml` schema ([`ActionsConfig`]),
//! service account key parsing ([`Credentials`]), the small input grammars
//! the actions accept, and the GitHub runner file commands ([`Runner`]).

pub mod config;
pub mod credentials;
pub mod env_vars;
pub mod error;
pub mod runner;
pub mod secret_ref;

pub use config::{ActionsConfig, PollSettings, ProjectConfig, SdkConfig};
pub use credentials::{CredentialInput, Credentials, ServiceAccountKey};
pub use env_vars::{format_env_vars, parse_env_vars};
pub use error::{Error, Result};
pub use runner::Runner;
pub use secret_ref::{SecretReference, parse_secret_refs};
