//! File system helpers for the worker.

use log::debug;
use std::ffi::OsString;
use std::path::Path;
use tempfile::TempPath;
use tokio::fs::{self, File};

use crate::utils::Result;

const PARTIAL_SUFFIX: &str = ".part";

/// Ensures a directory exists, creating it and all parent directories if necessary.
pub async fn ensure_directory<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !fs::try_exists(path).await? {
        fs::create_dir_all(path).await?;
        debug!("Created directory: {path:?}");
    }
    Ok(())
}

/// Ensures the parent directory of a file exists.
pub async fn ensure_parent_directory<P: AsRef<Path>>(file_path: P) -> Result<()> {
    if let Some(parent) = file_path.as_ref().parent() {
        ensure_directory(parent).await?;
    }
    Ok(())
}

/// True when `path` is a regular file with at least one byte in it.
pub async fn is_non_empty_file<P: AsRef<Path>>(path: P) -> bool {
    match fs::metadata(path).await {
        Ok(metadata) => metadata.is_file() && metadata.len() > 0,
        Err(_) => false,
    }
}

/// Creates a uniquely named `<name>.<random>.part` sibling of `path` for the
/// worker to stream into.
///
/// The returned [`TempPath`] removes the file on drop unless it has been
/// persisted, so two downloads aimed at the same `path` never share a staging
/// file.
pub fn staging_file(path: &Path) -> Result<(File, TempPath)> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut prefix = path.file_name().map(OsString::from).unwrap_or_default();
    prefix.push(".");

    let staged = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(PARTIAL_SUFFIX)
        .tempfile_in(parent)?;
    let (file, temp_path) = staged.into_parts();
    Ok((File::from_std(file), temp_path))
}
