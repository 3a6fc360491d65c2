//! Output layout: `<output_dir>[/pvz3_downloads]/<platform>`.

use std::path::{Path, PathBuf};

use crate::backend::downloader::models::Platform;

/// Folder inserted between the chosen directory and the platform folder.
pub const DOWNLOAD_SUBFOLDER: &str = "pvz3_downloads";

/// File name the fetched catalog is saved under.
pub const MANIFEST_FILE_NAME: &str = "catalog.json";

/// Directory that receives the catalog and every asset of `platform`.
pub fn platform_output_dir(base: &Path, create_subfolder: bool, platform: Platform) -> PathBuf {
    let mut dir = base.to_path_buf();
    if create_subfolder {
        dir.push(DOWNLOAD_SUBFOLDER);
    }
    dir.push(platform.as_str());
    dir
}
