//! Backend of the application.

pub mod downloader;
pub mod utils;
