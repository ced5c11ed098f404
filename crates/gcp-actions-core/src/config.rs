use serde::{Deserialize, Serialize};

/// File name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "gcp-actions.toml";

/// gcp-actions.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionsConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub poll: PollSettings,
    #[serde(default)]
    pub sdk: SdkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// GCP project ID (falls back to the credentials' project)
    pub gcp_project_id: Option<String>,
    /// GCP region (defaults to us-central1)
    #[serde(default = "default_region")]
    pub region: String,
}

/// Long-running operation polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSettings {
    /// Seconds to sleep between two polls
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,
    /// Number of polls before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdkConfig {
    /// Cloud SDK version, or "latest"
    #[serde(default = "default_sdk_version")]
    pub version: String,
    /// Additional gcloud components to install
    #[serde(default)]
    pub components: Vec<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            gcp_project_id: None,
            region: default_region(),
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            version: default_sdk_version(),
            components: Vec::new(),
        }
    }
}

impl ActionsConfig {
    /// Load from gcp-actions.toml in the given directory, or return defaults if not found.
    pub fn load(dir: &std::path::Path) -> crate::Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                path: config_path.clone(),
                source: e,
            })?;
        toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
            path: config_path,
            source: e,
        })
    }
}

fn default_region() -> String {
    "us-central1".to_owned()
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_max_retries() -> u32 {
    100
}

fn default_sdk_version() -> String {
    "latest".to_owned()
}
