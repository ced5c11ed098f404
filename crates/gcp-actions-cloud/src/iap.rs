//! OpenID Connect tokens for Identity-Aware Proxy.
//!
//! A service account signs a JWT asserting itself and the IAP client ID as
//! `target_audience`, then trades it at the key's token endpoint for a
//! Google-signed ID token.

use std::time::{SystemTime, UNIX_EPOCH};

use gcp_actions_core::ServiceAccountKey;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime of the signed assertion.
const ASSERTION_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub aud: String,
    pub target_audience: String,
    pub iat: u64,
    pub exp: u64,
}

impl AssertionClaims {
    pub fn new(key: &ServiceAccountKey, target_audience: &str, issued_at: u64) -> Self {
        Self {
            iss: key.client_email.clone(),
            aud: key.token_uri.clone(),
            target_audience: target_audience.to_owned(),
            iat: issued_at,
            exp: issued_at + ASSERTION_TTL_SECS,
        }
    }
}

/// RS256-sign the assertion with the key's private key.
pub fn sign_assertion(
    key: &ServiceAccountKey,
    claims: &AssertionClaims,
) -> Result<SecretString, IapError> {
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.expose_secret().as_bytes())
        .map_err(|e| IapError::InvalidKey { source: e })?;

    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    let jwt = jsonwebtoken::encode(&header, claims, &encoding_key)
        .map_err(|e| IapError::Sign { source: e })?;
    Ok(SecretString::from(jwt))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    id_token: Option<String>,
}

/// Exchanges signed assertions for ID tokens.
pub struct IapTokenClient {
    http: reqwest::Client,
}

impl Default for IapTokenClient {
    fn default() -> Self {
        Self::new()
    }
}

impl IapTokenClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// ID token for `audience`, valid for requests through IAP.
    pub async fn id_token(
        &self,
        key: &ServiceAccountKey,
        audience: &str,
    ) -> Result<SecretString, IapError> {
        let claims = AssertionClaims::new(key, audience, unix_now());
        let assertion = sign_assertion(key, &claims)?;
        self.exchange(&key.token_uri, &assertion).await
    }

    pub async fn exchange(
        &self,
        token_uri: &str,
        assertion: &SecretString,
    ) -> Result<SecretString, IapError> {
        tracing::debug!(%token_uri, "exchanging signed assertion for an ID token");
        let response = self
            .http
            .post(token_uri)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT),
                ("assertion", assertion.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| IapError::Request {
                url: token_uri.to_owned(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => format!("<unreadable body: {e}>"),
            };
            return Err(IapError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response.json().await.map_err(|e| IapError::Request {
            url: token_uri.to_owned(),
            source: e,
        })?;

        token
            .id_token
            .filter(|t| !t.is_empty())
            .map(SecretString::from)
            .ok_or(IapError::NoIdToken)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Debug, thiserror::Error)]
pub enum IapError {
    #[error("service account private key is not a valid RSA PEM key")]
    InvalidKey { source: jsonwebtoken::errors::Error },

    #[error("failed to sign JWT assertion")]
    Sign { source: jsonwebtoken::errors::Error },

    #[error("request to {url} failed")]
    Request { url: String, source: reqwest::Error },

    #[error("token endpoint returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("token endpoint response has no id_token")]
    NoIdToken,
}
