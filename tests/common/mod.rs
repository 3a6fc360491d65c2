#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use pvz3_downloader::backend::downloader::SessionEvent;
use pvz3_downloader::backend::utils::config::{DownloadConfig, RetryPolicy};
use tokio::sync::broadcast::Receiver;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CDN_TOKEN: &str = "{AppSettingsJson.AddressablesCdnServerBaseUrl}";

/// Retry policy with the production shape but millisecond delays.
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(200),
        attempt_timeout: Duration::from_secs(5),
    }
}

pub fn test_config(server: &MockServer) -> DownloadConfig {
    DownloadConfig::default()
        .with_base_url(server.uri())
        .with_retry(fast_policy())
}

/// Catalog body listing `ids` under `m_InternalIds`.
pub fn catalog(ids: &[&str]) -> String {
    serde_json::json!({
        "m_LocatorId": "AddressablesMainContentCatalog",
        "m_InternalIds": ids,
    })
    .to_string()
}

pub fn cdn_id(asset_path: &str) -> String {
    format!("{CDN_TOKEN}/{asset_path}")
}

pub async fn mount_catalog(server: &MockServer, platform: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/{platform}/catalog.json")))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

pub async fn mount_asset(server: &MockServer, asset_path: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/{asset_path}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// Everything currently buffered on the receiver.
pub fn drain(rx: &mut Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Every file below `dir`, recursively.
pub fn list_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return files;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            files.extend(list_files(&path));
        } else {
            files.push(path);
        }
    }
    files
}
