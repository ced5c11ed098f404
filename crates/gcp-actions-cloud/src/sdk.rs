//! Cloud SDK release resolution and installation into the runner tool cache.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::retry::Backoff;

pub const RELEASE_CHANNEL: &str = "https://dl.google.com/dl/cloudsdk/channels/rapid";

const USER_AGENT: &str = "github-actions-setup-gcloud";

/// Operating systems the SDK ships archives for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdkOs {
    Linux,
    Darwin,
    Windows,
}

impl SdkOs {
    pub fn parse(os: &str) -> Result<Self, SdkError> {
        match os.to_ascii_lowercase().as_str() {
            "linux" => Ok(Self::Linux),
            "darwin" | "macos" => Ok(Self::Darwin),
            "windows" | "win32" => Ok(Self::Windows),
            _ => Err(SdkError::UnsupportedOs(os.to_owned())),
        }
    }

    fn release_name(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Darwin => "darwin",
            Self::Windows => "windows",
        }
    }

    fn archive_extension(self) -> &'static str {
        match self {
            Self::Windows => "zip",
            Self::Linux | Self::Darwin => "tar.gz",
        }
    }
}

/// Normalize a machine architecture to the SDK's naming.
pub fn normalize_arch(arch: &str) -> Result<&'static str, SdkError> {
    match arch.to_ascii_lowercase().as_str() {
        "x64" | "x86_64" | "amd64" => Ok("x86_64"),
        "arm64" | "aarch64" => Ok("arm"),
        "x86" | "ia32" | "i386" | "i686" => Ok("x86"),
        _ => Err(SdkError::UnsupportedArch(arch.to_owned())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub os: SdkOs,
    pub arch: &'static str,
}

impl Platform {
    pub fn new(os: &str, arch: &str) -> Result<Self, SdkError> {
        Ok(Self {
            os: SdkOs::parse(os)?,
            arch: normalize_arch(arch)?,
        })
    }

    /// The platform this binary runs on.
    pub fn current() -> Result<Self, SdkError> {
        Self::new(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// `google-cloud-sdk-<version>-<os>-<arch>.<ext>`
    pub fn release_object(&self, version: &str) -> String {
        format!(
            "google-cloud-sdk-{version}-{}-{}.{}",
            self.os.release_name(),
            self.arch,
            self.os.archive_extension()
        )
    }
}

#[derive(Debug, Deserialize)]
struct ComponentsIndex {
    #[serde(default)]
    version: Option<String>,
}

/// Downloads and caches Cloud SDK releases.
pub struct SdkInstaller {
    http: reqwest::Client,
    channel: String,
    tool_cache: PathBuf,
    backoff: Backoff,
}

impl SdkInstaller {
    pub fn new(tool_cache: impl Into<PathBuf>) -> Self {
        Self {
            http: reqwest::Client::new(),
            channel: RELEASE_CHANNEL.to_owned(),
            tool_cache: tool_cache.into(),
            backoff: Backoff::default(),
        }
    }

    /// Serve releases from another base URL.
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn release_url(&self, platform: &Platform, version: &str) -> String {
        format!("{}/downloads/{}", self.channel, platform.release_object(version))
    }

    /// `latest` (or empty) resolves to the newest published version.
    pub async fn resolve_version(&self, requested: &str) -> Result<String, SdkError> {
        let requested = requested.trim();
        if requested.is_empty() || requested == "latest" {
            self.latest_version().await
        } else {
            Ok(requested.to_owned())
        }
    }

    pub async fn latest_version(&self) -> Result<String, SdkError> {
        let url = format!("{}/components-2.json", self.channel);
        self.backoff
            .retry("fetch latest gcloud version", || self.fetch_latest(&url))
            .await
    }

    async fn fetch_latest(&self, url: &str) -> Result<String, SdkError> {
        let response = self
            .http
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| SdkError::Http {
                url: url.to_owned(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SdkError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }

        let index: ComponentsIndex = response.json().await.map_err(|e| SdkError::Http {
            url: url.to_owned(),
            source: e,
        })?;

        index
            .version
            .filter(|v| !v.is_empty())
            .ok_or(SdkError::NoVersion)
    }

    /// Verify a release exists before downloading it.
    pub async fn check_release(&self, url: &str) -> Result<(), SdkError> {
        self.backoff
            .retry("check gcloud release", move || async move {
                let response = self
                    .http
                    .head(url)
                    .header(reqwest::header::USER_AGENT, USER_AGENT)
                    .send()
                    .await
                    .map_err(|e| SdkError::Http {
                        url: url.to_owned(),
                        source: e,
                    })?;
                if response.status().is_success() {
                    Ok(())
                } else {
                    Err(SdkError::Status {
                        url: url.to_owned(),
                        status: response.status().as_u16(),
                    })
                }
            })
            .await
    }

    /// `<tool cache>/gcloud/<version>/<arch>`
    pub fn install_dir(&self, version: &str, platform: &Platform) -> PathBuf {
        self.tool_cache
            .join("gcloud")
            .join(version)
            .join(platform.arch)
    }

    fn complete_marker(&self, version: &str, platform: &Platform) -> PathBuf {
        self.tool_cache
            .join("gcloud")
            .join(version)
            .join(format!("{}.complete", platform.arch))
    }

    pub fn is_installed(&self, version: &str, platform: &Platform) -> bool {
        self.complete_marker(version, platform).is_file()
            && self.install_dir(version, platform).join("bin").is_dir()
    }

    /// Install `version` unless it is already cached. Returns the SDK's
    /// `bin` directory.
    pub async fn install(&self, version: &str, platform: &Platform) -> Result<PathBuf, SdkError> {
        let install_dir = self.install_dir(version, platform);
        if self.is_installed(version, platform) {
            tracing::info!(version, dir = %install_dir.display(), "gcloud found in tool cache");
            return Ok(install_dir.join("bin"));
        }

        let url = self.release_url(platform, version);
        self.check_release(&url).await?;

        tracing::info!(%url, "downloading gcloud");
        let archive = self
            .backoff
            .retry("download gcloud", || self.download(&url))
            .await?;

        let staging = install_dir.with_extension("partial");
        remove_dir_if_exists(&staging)?;
        create_dir(&staging)?;
        match platform.os {
            SdkOs::Windows => extract_zip(&archive, &staging)?,
            SdkOs::Linux | SdkOs::Darwin => extract_tar_gz(&archive, &staging)?,
        }

        let sdk_root = staging.join("google-cloud-sdk");
        if !sdk_root.is_dir() {
            return Err(SdkError::MissingSdkRoot(staging));
        }
        remove_dir_if_exists(&install_dir)?;
        std::fs::rename(&sdk_root, &install_dir).map_err(|e| SdkError::Io {
            path: install_dir.clone(),
            source: e,
        })?;
        remove_dir_if_exists(&staging)?;

        let marker = self.complete_marker(version, platform);
        std::fs::write(&marker, "").map_err(|e| SdkError::Io {
            path: marker,
            source: e,
        })?;

        tracing::info!(version, dir = %install_dir.display(), "gcloud installed");
        Ok(install_dir.join("bin"))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, SdkError> {
        let response = self
            .http
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| SdkError::Http {
                url: url.to_owned(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SdkError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| SdkError::Http {
            url: url.to_owned(),
            source: e,
        })?;
        Ok(bytes.to_vec())
    }
}

pub fn extract_tar_gz(archive: &[u8], dest: &Path) -> Result<(), SdkError> {
    let decoder = flate2::read::GzDecoder::new(archive);
    tar::Archive::new(decoder)
        .unpack(dest)
        .map_err(|e| SdkError::Extract {
            path: dest.to_path_buf(),
            reason: e.to_string(),
        })
}

pub fn extract_zip(archive: &[u8], dest: &Path) -> Result<(), SdkError> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive)).map_err(|e| SdkError::Extract {
        path: dest.to_path_buf(),
        reason: e.to_string(),
    })?;
    zip.extract(dest).map_err(|e| SdkError::Extract {
        path: dest.to_path_buf(),
        reason: e.to_string(),
    })
}

fn create_dir(path: &Path) -> Result<(), SdkError> {
    std::fs::create_dir_all(path).map_err(|e| SdkError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

fn remove_dir_if_exists(path: &Path) -> Result<(), SdkError> {
    if path.exists() {
        std::fs::remove_dir_all(path).map_err(|e| SdkError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error("unexpected OS '{0}'")]
    UnsupportedOs(String),

    #[error("unsupported architecture '{0}'")]
    UnsupportedArch(String),

    #[error("request to {url} failed")]
    Http { url: String, source: reqwest::Error },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to retrieve gcloud SDK version: response has no version")]
    NoVersion,

    #[error("failed to extract gcloud archive into {path}: {reason}")]
    Extract { path: PathBuf, reason: String },

    #[error("gcloud archive has no google-cloud-sdk directory under {0}")]
    MissingSdkRoot(PathBuf),

    #[error("filesystem error at {path}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}
