use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Zip the contents of `dir` (not the directory itself) into memory.
///
/// Entry names are relative to `dir` and always use `/` separators.
pub fn zip_dir(dir: &Path) -> Result<Vec<u8>, ArchiveError> {
    if !dir.is_dir() {
        return Err(ArchiveError::NotADirectory(dir.to_path_buf()));
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut files = 0usize;

    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| ArchiveError::Walk {
            path: dir.to_path_buf(),
            source: e,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry_name(dir, entry.path())?;
        let content = std::fs::read(entry.path()).map_err(|e| ArchiveError::Read {
            path: entry.path().to_path_buf(),
            source: e,
        })?;

        writer
            .start_file(name, options)
            .map_err(|e| ArchiveError::Zip { source: e })?;
        writer
            .write_all(&content)
            .map_err(|e| ArchiveError::Write { source: e })?;
        files += 1;
    }

    let cursor = writer
        .finish()
        .map_err(|e| ArchiveError::Zip { source: e })?;
    tracing::debug!(dir = %dir.display(), files, "zipped source directory");
    Ok(cursor.into_inner())
}

fn entry_name(root: &Path, path: &Path) -> Result<String, ArchiveError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| ArchiveError::OutsideRoot(path.to_path_buf()))?;

    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("unable to find source directory {0}")]
    NotADirectory(PathBuf),

    #[error("failed to walk {path}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{0} is outside the archived directory")]
    OutsideRoot(PathBuf),

    #[error("failed to write zip archive")]
    Zip { source: zip::result::ZipError },

    #[error("failed to write zip entry")]
    Write { source: std::io::Error },
}
