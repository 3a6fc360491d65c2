//! Turns catalog identifiers into concrete work items.

use log::{debug, warn};
use reqwest::Url;
use std::path::Path;

use super::manifest::Manifest;
use super::models::WorkItem;

/// Token Unity substitutes with the remote CDN root.
pub const CDN_BASE_URL_PLACEHOLDER: &str = "{AppSettingsJson.AddressablesCdnServerBaseUrl}";
/// Token Unity substitutes with the local Addressables runtime path.
pub const RUNTIME_PATH_PLACEHOLDER: &str = "{UnityEngine.AddressableAssets.Addressables.RuntimePath}";

/// Every placeholder the planner recognizes.
pub const KNOWN_PLACEHOLDERS: [&str; 2] = [CDN_BASE_URL_PLACEHOLDER, RUNTIME_PATH_PLACEHOLDER];

/// Known placeholder tokens and the values they expand to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderSet {
    entries: Vec<(String, String)>,
}

impl PlaceholderSet {
    /// Maps every known placeholder to `base_url`.
    pub fn with_base_url(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        Self::from_pairs(KNOWN_PLACEHOLDERS.iter().map(|token| (*token, base_url)))
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(token, value)| (token.into(), value.into()))
                .collect(),
        }
    }

    pub fn matches(&self, identifier: &str) -> bool {
        self.entries
            .iter()
            .any(|(token, _)| identifier.contains(token.as_str()))
    }

    /// Replace every occurrence of every token.
    pub fn substitute(&self, identifier: &str) -> String {
        self.entries
            .iter()
            .fold(identifier.to_string(), |acc, (token, value)| {
                acc.replace(token.as_str(), value)
            })
    }
}

/// Stable name for an asset whose URL has no usable file name.
///
/// Java-style string hash over UTF-16 code units (`h = h * 31 + unit`,
/// wrapping at 32 bits), then the absolute value.
pub fn fallback_filename(identifier: &str) -> String {
    let hash = identifier
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)));
    format!("asset_{}.bin", hash.unsigned_abs())
}

/// Last non-empty path segment, like a path basename.
fn filename_from_url(url: &Url) -> Option<String> {
    url.path()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
}

pub struct DownloadPlanner {
    placeholders: PlaceholderSet,
}

impl DownloadPlanner {
    pub const fn new(placeholders: PlaceholderSet) -> Self {
        Self { placeholders }
    }

    /// Builds the ordered work list for `manifest`.
    ///
    /// Identifiers without a placeholder are skipped, as are identifiers whose
    /// expansion is not an absolute URL. Order follows the manifest. Two
    /// identifiers resolving to the same file name both stay in the list.
    pub fn plan(&self, manifest: &Manifest, output_dir: &Path) -> Vec<WorkItem> {
        let mut items = Vec::new();

        for identifier in manifest.internal_ids() {
            if !self.placeholders.matches(identifier) {
                continue;
            }

            let resolved = self.placeholders.substitute(identifier);
            let url = match Url::parse(&resolved) {
                Ok(url) => url,
                Err(e) => {
                    warn!("Skipping {identifier}: cannot parse {resolved:?} as a URL ({e})");
                    continue;
                }
            };

            let filename =
                filename_from_url(&url).unwrap_or_else(|| fallback_filename(identifier));

            items.push(WorkItem {
                original_identifier: identifier.clone(),
                local_path: output_dir.join(&filename),
                resolved_url: resolved,
                filename,
            });
        }

        debug!(
            "Planned {} of {} catalog entries",
            items.len(),
            manifest.len()
        );
        items
    }
}
