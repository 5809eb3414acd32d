//! Fetches and validates the per-language version manifest, and caches the
//! parsed result for a short TTL.
//!
//! One cache entry per language, each wrapping the parsed manifest with a
//! fetch timestamp so a "did we already check this recently?" question can
//! be answered without a new request.
//!
//! The cache is an explicit, constructable `ManifestCache` rather than a
//! hidden process-global `static`: spec.md §9 itself asks for "a seam so
//! tests can reset it between cases", and an explicit value threaded in by
//! the caller is that seam without relying on test-order-dependent global
//! mutable state.

use crate::config::MANIFEST_CACHE_TTL;
use crate::error::ManifestError;
use crate::series::Series;
use crate::urls::manifest_url;
use crate::version::Version;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

/// A validated record for one (series, major version) pair, as published by
/// the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub version: Version,
    pub parts: Option<u32>,
    pub database_version: Option<String>,
    pub date_of_creation: String,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    major: u64,
    minor: u64,
    patch: u64,
    #[serde(default)]
    parts: Option<u32>,
    #[serde(default, rename = "databaseVersion")]
    database_version: Option<String>,
    #[serde(rename = "dateOfCreation")]
    date_of_creation: String,
}

type RawManifest = HashMap<String, HashMap<String, RawEntry>>;

struct CacheEntry {
    fetched_at: Instant,
    manifest: std::sync::Arc<RawManifest>,
}

/// Process-wide (per instance), single-slot-per-language manifest cache.
/// See the module docs for why this is an explicit value rather than a
/// hidden global.
#[derive(Default)]
pub struct ManifestCache {
    slots: Mutex<HashMap<String, CacheEntry>>,
}

impl ManifestCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every cached entry, regardless of TTL.
    pub fn clear(&self) {
        self.slots.lock().clear();
    }

    fn get_fresh(&self, lang: &str) -> Option<std::sync::Arc<RawManifest>> {
        let slots = self.slots.lock();
        let entry = slots.get(lang)?;
        if entry.fetched_at.elapsed() < MANIFEST_CACHE_TTL {
            Some(entry.manifest.clone())
        } else {
            None
        }
    }

    fn put(&self, lang: &str, manifest: std::sync::Arc<RawManifest>) {
        self.slots.lock().insert(
            lang.to_string(),
            CacheEntry {
                fetched_at: Instant::now(),
                manifest,
            },
        );
    }
}

/// Fetches (or reuses the cached copy of) the manifest for `lang`, then
/// extracts and validates the entry for `(series, major_version)`.
///
/// `force_fetch` bypasses and refreshes the cache, per spec.md §4.3. Cache
/// lookup failures (there is none to look up, or it is stale) fall through
/// to a fresh fetch transparently.
pub async fn get_version_info(
    client: &reqwest::Client,
    cache: &ManifestCache,
    base_url: &Url,
    series: Series,
    major_version: u64,
    lang: &str,
    request_timeout: Duration,
    force_fetch: bool,
    cancel: &CancellationToken,
) -> Result<ManifestEntry, ManifestError> {
    let raw = if force_fetch {
        None
    } else {
        cache.get_fresh(lang)
    };

    let raw = match raw {
        Some(raw) => raw,
        None => {
            let url = manifest_url(base_url, lang);
            let bytes = crate::fetch::fetch_bytes(client, url.clone(), request_timeout, cancel)
                .await
                .map_err(ManifestError::from)?;
            let raw: RawManifest = serde_json::from_slice(&bytes)
                .map_err(|err| ManifestError::VersionFileInvalid(url.clone(), err.to_string()))?;
            validate_raw_manifest(&url, &raw)?;
            let raw = std::sync::Arc::new(raw);
            cache.put(lang, raw.clone());
            raw
        }
    };

    extract_entry(&raw, series, major_version)
}

fn validate_raw_manifest(url: &Url, raw: &RawManifest) -> Result<(), ManifestError> {
    for series_entries in raw.values() {
        for (major_key, entry) in series_entries {
            let major_key_value: u64 = major_key.parse().map_err(|_| {
                ManifestError::VersionFileInvalid(
                    url.clone(),
                    format!("major-version key `{major_key}` is not an integer"),
                )
            })?;
            if major_key_value != entry.major {
                return Err(ManifestError::VersionFileInvalid(
                    url.clone(),
                    format!(
                        "entry's major ({}) does not match its key (`{major_key}`)",
                        entry.major
                    ),
                ));
            }
            if entry.major < 1 {
                return Err(ManifestError::VersionFileInvalid(
                    url.clone(),
                    "major version must be >= 1".to_string(),
                ));
            }
            if let Some(parts) = entry.parts {
                if parts < 1 {
                    return Err(ManifestError::VersionFileInvalid(
                        url.clone(),
                        "parts must be >= 1 when present".to_string(),
                    ));
                }
            }
            if entry.date_of_creation.is_empty() {
                return Err(ManifestError::VersionFileInvalid(
                    url.clone(),
                    "dateOfCreation must not be empty".to_string(),
                ));
            }
        }
    }
    Ok(())
}

fn extract_entry(
    raw: &RawManifest,
    series: Series,
    major_version: u64,
) -> Result<ManifestEntry, ManifestError> {
    let series_key = series.to_string();
    let Some(series_entries) = raw.get(&series_key) else {
        // spec.md §4.3: if the series itself is absent, the call fails with
        // VersionFileInvalid, not MajorVersionNotFound.
        return Err(ManifestError::VersionFileInvalid(
            Url::parse("about:blank").expect("static url"),
            format!("series `{series_key}` is not present in the manifest"),
        ));
    };
    let entry = series_entries
        .get(&major_version.to_string())
        .ok_or(ManifestError::MajorVersionNotFound {
            series: series_key,
            major: major_version,
        })?;

    Ok(ManifestEntry {
        version: Version::new(entry.major, entry.minor, entry.patch),
        parts: entry.parts,
        database_version: entry.database_version.clone(),
        date_of_creation: entry.date_of_creation.clone(),
    })
}
