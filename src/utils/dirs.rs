//! System directories utilities.

use std::path::PathBuf;

/// Get the user's home directory.
pub fn home_dir() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        std::env::var("USERPROFILE")
            .or_else(|_| {
                let homedrive = std::env::var("HOMEDRIVE").unwrap_or_default();
                let homepath = std::env::var("HOMEPATH").unwrap_or_default();
                if homedrive.is_empty() || homepath.is_empty() {
                    Err(std::env::VarError::NotPresent)
                } else {
                    Ok(format!("{homedrive}{homepath}"))
                }
            })
            .ok()
            .map(PathBuf::from)
    }

    #[cfg(not(windows))]
    {
        std::env::var("HOME").ok().map(PathBuf::from)
    }
}

/// The user's Downloads directory, or the working directory when no home is set.
pub fn downloads_dir() -> PathBuf {
    home_dir()
        .map(|home| home.join("Downloads"))
        .unwrap_or_else(|| PathBuf::from("."))
}
