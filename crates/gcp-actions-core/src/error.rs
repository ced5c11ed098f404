use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    // ── Credentials ──
    #[error("credentials are neither JSON nor valid base64")]
    CredentialsDecode { source: base64::DecodeError },

    #[error("decoded credentials are not valid UTF-8")]
    CredentialsUtf8 { source: std::string::FromUtf8Error },

    #[error("credentials are not a valid service account key")]
    CredentialsParse { source: serde_json::Error },

    #[error("no credentials provided and GOOGLE_APPLICATION_CREDENTIALS is not set")]
    NoCredentials,

    #[error("failed to read credentials file {path}")]
    CredentialsRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write credentials file {path}")]
    CredentialsWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Input parsing ──
    #[error("invalid reference {reference:?}: {reason}")]
    InvalidSecretRef {
        reference: String,
        reason: &'static str,
    },

    #[error("env vars must be in \"KEY1=VALUE1,KEY2=VALUE2\" format, received {entry:?}")]
    InvalidEnvVar { entry: String },

    // ── Runner file commands ──
    #[error("failed to write runner file {path}")]
    RunnerWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{name} is not set")]
    MissingEnv { name: &'static str },
}
