//! Error handling.

use thiserror::Error;

/// Errors surfaced by the download pipeline.
///
/// Only the manifest stage and `start` validation ever return these to a
/// caller. Per-item failures are folded into [`Outcome::Failed`] by the worker.
///
/// [`Outcome::Failed`]: crate::backend::downloader::models::Outcome::Failed
#[derive(Debug, Error)]
pub enum Error {
    #[error("manifest unavailable: {0}")]
    ManifestUnavailable(String),

    #[error("manifest malformed: {0}")]
    ManifestMalformed(String),

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("a download session is already running")]
    AlreadyRunning,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("concurrency limiter error: {0}")]
    Limiter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport(format!("request timed out: {err}"))
        } else {
            Self::Transport(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[macro_export]
macro_rules! transport_error {
    ($msg:literal) => {
        $crate::utils::error::Error::Transport($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::utils::error::Error::Transport(format!($fmt, $($arg)*))
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn transport_macro_formats_message() {
        let err = transport_error!("HTTP {}", 500);
        assert_eq!(err.to_string(), "transport error: HTTP 500");
    }
}
