//! Utility modules for the download backend.

/// Download configuration and persisted user preferences.
pub mod config;
/// File system helpers.
pub mod files;
/// HTTP client construction.
pub mod http;
/// Output directory layout.
pub mod paths;
