//! Download configuration and persisted user preferences.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backend::downloader::models::Platform;
use crate::utils::{Result, dirs};

/// CDN root of the CN production client assets.
pub const DEFAULT_CDN_BASE_URL: &str = "https://pvz3cdn.mengxingstar.com/ppp/cn_prod/client-assets";

/// Parallel downloads used when the caller does not pick a number.
pub const DEFAULT_CONCURRENCY: usize = 10;

const USER_CONFIG_FILE: &str = ".pvz3-downloader-config.json";

/// Per-item retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    #[serde(with = "millis")]
    pub base_delay: Duration,
    #[serde(with = "millis")]
    pub max_delay: Duration,
    #[serde(with = "millis")]
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            attempt_timeout: Duration::from_millis(60_000),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): `min(base * 2^(attempt-1), max)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Worst-case time a worker can spend on one item.
    pub fn worst_case(&self) -> Duration {
        let attempts = self.max_retries + 1;
        let sleeping: Duration = (1..=self.max_retries).map(|a| self.backoff(a)).sum();
        self.attempt_timeout * attempts + sleeping
    }
}

/// Read-only configuration of a download session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    pub cdn_base_url: String,
    #[serde(with = "millis")]
    pub manifest_timeout: Duration,
    pub retry: RetryPolicy,
    pub default_concurrency: usize,
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            cdn_base_url: DEFAULT_CDN_BASE_URL.to_string(),
            manifest_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            default_concurrency: DEFAULT_CONCURRENCY,
            user_agent: format!("pvz3-downloader/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl DownloadConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.cdn_base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Catalog location for `platform`.
    pub fn manifest_url(&self, platform: Platform) -> String {
        format!("{}/{}/catalog.json", self.cdn_base_url, platform)
    }
}

/// Preferences remembered between runs of the command-line shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserConfig {
    pub last_download_path: PathBuf,
    pub last_platform: Platform,
    pub last_concurrent: usize,
    pub create_sub_folder: bool,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            last_download_path: dirs::downloads_dir(),
            last_platform: Platform::Ios,
            last_concurrent: DEFAULT_CONCURRENCY,
            create_sub_folder: true,
        }
    }
}

impl UserConfig {
    /// `~/.pvz3-downloader-config.json`, or the working directory without a home.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(USER_CONFIG_FILE)
    }

    /// Load preferences, falling back to defaults on a missing or broken file.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(Some(config)) => config,
            Ok(None) => Self::default(),
            Err(e) => {
                log::warn!("Failed to load user config {path:?}: {e}");
                Self::default()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
