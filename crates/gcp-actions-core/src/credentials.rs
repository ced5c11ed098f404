//! Service account key parsing.
//!
//! Keys arrive either as raw JSON or as base64-encoded JSON. The shape is
//! decided once at the boundary ([`CredentialInput::classify`]) and resolved
//! into a single [`Credentials`] value that the rest of the workspace uses.

use std::io::Write;
use std::path::Path;

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

/// Environment variable consulted when no key is passed explicitly.
pub const APPLICATION_CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Accepts padded and unpadded input.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Raw credential text, tagged by encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialInput<'a> {
    RawJson(&'a str),
    Base64(&'a str),
}

impl<'a> CredentialInput<'a> {
    /// Text starting with `{` is JSON; anything else is treated as base64.
    pub fn classify(input: &'a str) -> Self {
        let trimmed = input.trim();
        if trimmed.starts_with('{') {
            Self::RawJson(trimmed)
        } else {
            Self::Base64(trimmed)
        }
    }

    pub fn decode(self) -> crate::Result<Credentials> {
        let json = match self {
            Self::RawJson(text) => text.to_owned(),
            Self::Base64(text) => {
                let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
                let bytes = LENIENT_BASE64
                    .decode(compact.as_bytes())
                    .map_err(|e| crate::Error::CredentialsDecode { source: e })?;
                String::from_utf8(bytes).map_err(|e| crate::Error::CredentialsUtf8 { source: e })?
            }
        };

        let key: ServiceAccountKey = serde_json::from_str(&json)
            .map_err(|e| crate::Error::CredentialsParse { source: e })?;

        Ok(Credentials {
            key,
            json: SecretString::from(json),
        })
    }
}

/// Service account key JSON as issued by IAM.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type", default)]
    pub key_type: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(deserialize_with = "secret_string")]
    pub private_key: SecretString,
    pub client_email: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub auth_provider_x509_cert_url: Option<String>,
    #[serde(default)]
    pub client_x509_cert_url: Option<String>,
}

/// A decoded service account key together with its JSON text.
///
/// The JSON is kept so it can be piped to `gcloud` or exported to disk
/// without re-serializing.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub key: ServiceAccountKey,
    json: SecretString,
}

impl Credentials {
    pub fn parse(input: &str) -> crate::Result<Self> {
        CredentialInput::classify(input).decode()
    }

    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| crate::Error::CredentialsRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// Use the explicit input when non-empty, else the file named by
    /// `GOOGLE_APPLICATION_CREDENTIALS`.
    pub fn resolve(input: Option<&str>) -> crate::Result<Self> {
        if let Some(text) = input.filter(|t| !t.trim().is_empty()) {
            return Self::parse(text);
        }

        match std::env::var_os(APPLICATION_CREDENTIALS_ENV) {
            Some(path) => {
                tracing::debug!(
                    path = ?path,
                    "loading credentials from {APPLICATION_CREDENTIALS_ENV}"
                );
                Self::from_file(Path::new(&path))
            }
            None => Err(crate::Error::NoCredentials),
        }
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    pub fn project_id(&self) -> Option<&str> {
        self.key.project_id.as_deref().filter(|p| !p.is_empty())
    }

    pub fn json(&self) -> &str {
        self.json.expose_secret()
    }

    /// Write the key JSON to `path`, readable by the owner only.
    pub fn write_to(&self, path: &Path) -> crate::Result<()> {
        let write_err = |e| crate::Error::CredentialsWrite {
            path: path.to_path_buf(),
            source: e,
        };

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(path).map_err(write_err)?;
        file.write_all(self.json().as_bytes()).map_err(write_err)?;
        tracing::debug!(path = %path.display(), "wrote credentials file");
        Ok(())
    }
}

fn secret_string<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_owned()
}
