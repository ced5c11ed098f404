//! kubeconfig generation for GKE clusters.
//!
//! kubectl reads JSON kubeconfigs as well as YAML, so the file is written
//! with serde_json.

use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Subset of `container clusters describe --format json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub name: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub master_auth: Option<MasterAuth>,
    #[serde(default)]
    pub private_cluster_config: Option<PrivateClusterConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterAuth {
    #[serde(default)]
    pub cluster_ca_certificate: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateClusterConfig {
    #[serde(default)]
    pub private_endpoint: Option<String>,
}

/// How kubectl authenticates against the cluster.
#[derive(Debug, Clone)]
pub enum KubeAuth {
    /// Delegate to the `gcp` auth provider plugin.
    AuthProvider,
    /// Embed a short-lived access token.
    Token(SecretString),
}

#[derive(Debug, Serialize)]
pub struct KubeConfig {
    #[serde(rename = "apiVersion")]
    api_version: &'static str,
    kind: &'static str,
    clusters: Vec<NamedCluster>,
    contexts: Vec<NamedContext>,
    #[serde(rename = "current-context")]
    current_context: String,
    users: Vec<NamedUser>,
}

#[derive(Debug, Serialize)]
struct NamedCluster {
    name: String,
    cluster: ClusterEntry,
}

#[derive(Debug, Serialize)]
struct ClusterEntry {
    #[serde(
        rename = "certificate-authority-data",
        skip_serializing_if = "Option::is_none"
    )]
    certificate_authority_data: Option<String>,
    server: String,
}

#[derive(Debug, Serialize)]
struct NamedContext {
    name: String,
    context: ContextEntry,
}

#[derive(Debug, Serialize)]
struct ContextEntry {
    cluster: String,
    user: String,
}

#[derive(Debug, Serialize)]
struct NamedUser {
    name: String,
    user: UserEntry,
}

#[derive(Debug, Serialize)]
struct UserEntry {
    #[serde(
        serialize_with = "expose_token",
        skip_serializing_if = "Option::is_none"
    )]
    token: Option<SecretString>,
    #[serde(rename = "auth-provider", skip_serializing_if = "Option::is_none")]
    auth_provider: Option<AuthProviderEntry>,
}

#[derive(Debug, Serialize)]
struct AuthProviderEntry {
    name: &'static str,
}

impl KubeConfig {
    /// Single-cluster config; cluster, context and user all share the
    /// cluster's name.
    pub fn for_cluster(
        cluster: &Cluster,
        use_internal_ip: bool,
        auth: &KubeAuth,
    ) -> Result<Self, KubeconfigError> {
        let endpoint = if use_internal_ip {
            cluster
                .private_cluster_config
                .as_ref()
                .and_then(|c| c.private_endpoint.as_deref())
                .filter(|e| !e.is_empty())
                .ok_or_else(|| KubeconfigError::NoPrivateEndpoint(cluster.name.clone()))?
        } else if cluster.endpoint.is_empty() {
            return Err(KubeconfigError::NoEndpoint(cluster.name.clone()));
        } else {
            cluster.endpoint.as_str()
        };

        let user = match auth {
            KubeAuth::AuthProvider => UserEntry {
                token: None,
                auth_provider: Some(AuthProviderEntry { name: "gcp" }),
            },
            KubeAuth::Token(token) => UserEntry {
                token: Some(token.clone()),
                auth_provider: None,
            },
        };

        let name = cluster.name.clone();
        Ok(Self {
            api_version: "v1",
            kind: "Config",
            clusters: vec![NamedCluster {
                name: name.clone(),
                cluster: ClusterEntry {
                    certificate_authority_data: cluster
                        .master_auth
                        .as_ref()
                        .and_then(|m| m.cluster_ca_certificate.clone()),
                    server: format!("https://{endpoint}"),
                },
            }],
            contexts: vec![NamedContext {
                name: name.clone(),
                context: ContextEntry {
                    cluster: name.clone(),
                    user: name.clone(),
                },
            }],
            current_context: name.clone(),
            users: vec![NamedUser { name, user }],
        })
    }

    pub fn to_json(&self) -> Result<String, KubeconfigError> {
        serde_json::to_string_pretty(self).map_err(|e| KubeconfigError::Serialize { source: e })
    }

    /// Write under `dir` with a random file name and return the path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, KubeconfigError> {
        let path = dir.join(uuid::Uuid::new_v4().to_string());
        std::fs::write(&path, self.to_json()?).map_err(|e| KubeconfigError::Write {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }
}

/// The token only leaves its `SecretString` when the file is rendered.
fn expose_token<S: serde::Serializer>(
    token: &Option<SecretString>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match token {
        Some(token) => serializer.serialize_some(token.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum KubeconfigError {
    #[error("cluster {0} has no endpoint")]
    NoEndpoint(String),

    #[error("cluster {0} has no private endpoint")]
    NoPrivateEndpoint(String),

    #[error("failed to serialize kubeconfig")]
    Serialize { source: serde_json::Error },

    #[error("unable to write kubeconfig to {path}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn cluster() -> Cluster {
        serde_json::from_str(
            r#"{
                "name": "prod",
                "endpoint": "35.1.2.3",
                "masterAuth": { "clusterCaCertificate": "Q0EK" },
                "privateClusterConfig": { "privateEndpoint": "10.0.0.2" },
                "status": "RUNNING"
            }"#,
        )
        .unwrap()
    }

    fn render(config: &KubeConfig) -> Value {
        serde_json::from_str(&config.to_json().unwrap()).unwrap()
    }

    #[test]
    fn auth_provider_config() {
        let config = KubeConfig::for_cluster(&cluster(), false, &KubeAuth::AuthProvider).unwrap();
        let json = render(&config);

        assert_eq!(json["apiVersion"], "v1");
        assert_eq!(json["kind"], "Config");
        assert_eq!(json["current-context"], "prod");
        assert_eq!(json["clusters"][0]["cluster"]["server"], "https://35.1.2.3");
        assert_eq!(
            json["clusters"][0]["cluster"]["certificate-authority-data"],
            "Q0EK"
        );
        assert_eq!(json["contexts"][0]["context"]["user"], "prod");
        assert_eq!(json["users"][0]["user"]["auth-provider"]["name"], "gcp");
        assert!(json["users"][0]["user"].get("token").is_none());
    }

    #[test]
    fn token_config_with_internal_ip() {
        let auth = KubeAuth::Token(SecretString::from("ya29.token".to_owned()));
        let config = KubeConfig::for_cluster(&cluster(), true, &auth).unwrap();
        let json = render(&config);

        assert_eq!(json["clusters"][0]["cluster"]["server"], "https://10.0.0.2");
        assert_eq!(json["users"][0]["user"]["token"], "ya29.token");
        assert!(json["users"][0]["user"].get("auth-provider").is_none());
    }

    #[test]
    fn debug_output_redacts_token() {
        let auth = KubeAuth::Token(SecretString::from("ya29.token".to_owned()));
        let config = KubeConfig::for_cluster(&cluster(), false, &auth).unwrap();

        let debug = format!("{config:?}");
        assert!(!debug.contains("ya29.token"));
        assert!(config.to_json().unwrap().contains("ya29.token"));
    }

    #[test]
    fn internal_ip_requires_private_endpoint() {
        let mut public_only = cluster();
        public_only.private_cluster_config = None;

        let result = KubeConfig::for_cluster(&public_only, true, &KubeAuth::AuthProvider);
        assert!(matches!(result, Err(KubeconfigError::NoPrivateEndpoint(name)) if name == "prod"));
    }

    #[test]
    fn writes_to_random_file_in_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = KubeConfig::for_cluster(&cluster(), false, &KubeAuth::AuthProvider).unwrap();

        let path = config.write_to(tmp.path()).unwrap();
        assert_eq!(path.parent(), Some(tmp.path()));
        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["current-context"], "prod");
    }
}
