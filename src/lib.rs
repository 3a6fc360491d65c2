//! Bulk downloader for Plants vs. Zombies 3 (CN) client assets.
//!
//! - `backend::downloader`: catalog fetch, planning, bounded parallel download
//! - `backend::utils`: configuration, output layout, file and HTTP helpers
//! - `utils`: errors, logging, system directories

pub mod backend;
pub mod utils;

pub use backend::downloader::{DownloadSession, SessionEvent, StartOptions};
pub use backend::utils::config::{DownloadConfig, RetryPolicy};
pub use utils::{Error, Result};
