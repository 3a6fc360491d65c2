//! Catalog (manifest) retrieval.

use log::{debug, info};
use reqwest::Client;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backend::utils::paths::MANIFEST_FILE_NAME;
use crate::utils::{Error, Result};

/// JSON field of the Addressables catalog that lists asset locations.
pub const INTERNAL_IDS_FIELD: &str = "m_InternalIds";

/// Parsed catalog. Immutable once fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    internal_ids: Vec<String>,
}

impl Manifest {
    /// Parse a catalog body. Non-string entries are ignored.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| Error::ManifestMalformed(format!("invalid JSON: {e}")))?;

        let ids = value
            .get(INTERNAL_IDS_FIELD)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                Error::ManifestMalformed(format!("missing `{INTERNAL_IDS_FIELD}` array"))
            })?;

        let internal_ids: Vec<String> = ids
            .iter()
            .filter_map(|id| id.as_str().map(str::to_owned))
            .collect();

        if internal_ids.is_empty() {
            return Err(Error::ManifestMalformed(format!(
                "`{INTERNAL_IDS_FIELD}` contains no internal ids"
            )));
        }

        Ok(Self { internal_ids })
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            internal_ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn internal_ids(&self) -> &[String] {
        &self.internal_ids
    }

    pub fn len(&self) -> usize {
        self.internal_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.internal_ids.is_empty()
    }
}

/// Fetches a catalog and keeps a verbatim copy next to the assets.
pub struct ManifestResolver {
    client: Client,
    timeout: Duration,
}

impl ManifestResolver {
    pub const fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Single GET of `url`; the body is written to `<output_dir>/catalog.json`
    /// before it is parsed.
    pub async fn fetch(&self, url: &str, output_dir: &Path) -> Result<Manifest> {
        debug!("Fetching catalog from {url}");

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::ManifestUnavailable(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ManifestUnavailable(format!("{url}: HTTP {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::ManifestUnavailable(format!("{url}: {e}")))?;

        let saved = Self::persist(&body, output_dir).await?;
        info!("Catalog saved to {saved:?} ({} bytes)", body.len());

        Manifest::parse(&body)
    }

    async fn persist(body: &[u8], output_dir: &Path) -> Result<PathBuf> {
        let path = output_dir.join(MANIFEST_FILE_NAME);
        tokio::fs::write(&path, body).await?;
        Ok(path)
    }
}
