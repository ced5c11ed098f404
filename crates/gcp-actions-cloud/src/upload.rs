//! Cloud Storage upload planning.
//!
//! A single file lands at `prefix/<file name>`. A directory is walked and
//! every file lands at `prefix/<path relative to the directory's parent>`,
//! so uploading `public/` keeps the `public/` segment in object names while
//! `.` uploads the working directory's contents without one.

use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::client::{GcloudClient, UploadError};
use crate::executor::GcloudExecutor;

/// `bucket[/prefix]` as given to the action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub bucket: String,
    pub prefix: Option<String>,
}

impl Destination {
    pub fn parse(input: &str) -> Result<Self, PlanError> {
        let input = input.trim().trim_start_matches("gs://");
        let (bucket, prefix) = match input.split_once('/') {
            Some((bucket, prefix)) => (bucket, Some(prefix.trim_matches('/'))),
            None => (input, None),
        };

        if bucket.is_empty() {
            return Err(PlanError::MissingBucket(input.to_owned()));
        }

        Ok(Self {
            bucket: bucket.to_owned(),
            prefix: prefix.filter(|p| !p.is_empty()).map(str::to_owned),
        })
    }

    fn object_name(&self, relative: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}/{relative}"),
            None => relative.to_owned(),
        }
    }

    /// `gs://` URL of an object in this bucket.
    pub fn url(&self, object: &str) -> String {
        format!("gs://{}/{object}", self.bucket)
    }
}

/// One local file and the object name it uploads to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUpload {
    pub local: PathBuf,
    pub object: String,
}

/// Work out object names for everything under `path`.
pub fn plan_upload(
    path: &Path,
    destination: &Destination,
) -> Result<Vec<PlannedUpload>, PlanError> {
    let meta = std::fs::metadata(path).map_err(|e| PlanError::Stat {
        path: path.to_path_buf(),
        source: e,
    })?;

    if meta.is_file() {
        let name = file_name(path)?;
        return Ok(vec![PlannedUpload {
            local: path.to_path_buf(),
            object: destination.object_name(&name),
        }]);
    }

    let base = walk_base(path);
    let mut planned = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.map_err(|e| PlanError::Walk {
            path: path.to_path_buf(),
            source: e,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(base)
            .map_err(|_| PlanError::OutsideRoot(entry.path().to_path_buf()))?;
        let relative: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        planned.push(PlannedUpload {
            local: entry.path().to_path_buf(),
            object: destination.object_name(&relative.join("/")),
        });
    }

    Ok(planned)
}

/// Copy every planned file and return the uploaded object names.
pub async fn upload_all<E: GcloudExecutor>(
    client: &GcloudClient<E>,
    destination: &Destination,
    planned: &[PlannedUpload],
    gzip: bool,
) -> Result<Vec<String>, UploadError> {
    let mut uploaded = Vec::with_capacity(planned.len());
    for item in planned {
        let url = destination.url(&item.object);
        tracing::info!(file = %item.local.display(), %url, "uploading");
        client.upload_object(&item.local, &url, gzip).await?;
        uploaded.push(item.object.clone());
    }
    Ok(uploaded)
}

/// Directory object names are relative to. A directory keeps its own name
/// (`public/...`) unless it is given as `.` or `dir/.`, which name its
/// contents.
fn walk_base(dir: &Path) -> &Path {
    let raw = dir.as_os_str().as_encoded_bytes();
    if raw == b"." || raw.ends_with(b"/.") || raw.ends_with(b"\\.") {
        dir
    } else {
        dir.parent().unwrap_or(Path::new(""))
    }
}

fn file_name(path: &Path) -> Result<String, PlanError> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| PlanError::OutsideRoot(path.to_path_buf()))
}

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("destination '{0}' has no bucket")]
    MissingBucket(String),

    #[error("cannot read {path}")]
    Stat {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to walk {path}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[error("cannot derive an object name for {0}")]
    OutsideRoot(PathBuf),
}
