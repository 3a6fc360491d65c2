//! Shared HTTP client construction.

use std::time::Duration;

use reqwest::Client;

use crate::backend::utils::config::DownloadConfig;
use crate::utils::Result;

/// Builds the client shared by the manifest resolver and every worker.
///
/// Request-level timeouts are applied per call; only connecting is bounded here.
pub fn build_client(config: &DownloadConfig) -> Result<Client> {
    Ok(Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .user_agent(config.user_agent.as_str())
        .build()?)
}
