//! Catalog sources.
//!
//! Collects candidate videos from a remote JSON endpoint and local
//! directories, and delivers them to the scheduler exactly once.

use crate::config::CatalogSettings;
use crate::scheduler::SchedulerHandle;
use crate::video::{Locator, TimeOfDay, Video};
use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use walkdir::WalkDir;

/// A video as listed by a catalog source.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub label: String,
    /// Locators keyed by quality/source option.
    #[serde(default)]
    pub sources: BTreeMap<String, String>,
    /// Locator used for any option without its own entry.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub time_of_day: Option<String>,
}

impl CatalogEntry {
    pub fn into_video(self) -> Video {
        let tag = self.time_of_day.as_deref().and_then(TimeOfDay::parse);
        let mut video = Video::new(self.label).with_time_tag(tag);
        for (option, uri) in self.sources {
            video = video.with_source(option, Locator::new(uri));
        }
        if let Some(uri) = self.url {
            video = video.with_fallback(Locator::new(uri));
        }
        video
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    items: Vec<T>,
}

/// Fetch the remote catalog.
pub async fn fetch_remote(client: &Client, url: &str) -> Result<Vec<CatalogEntry>> {
    let res = client
        .get(url)
        .send()
        .await
        .context("Failed to send catalog request")?
        .error_for_status()
        .context("Catalog server returned error")?;
    let parsed: ListResponse<CatalogEntry> =
        res.json().await.context("Failed to parse catalog")?;
    Ok(parsed.items)
}

/// Recursively list video files under `dir`.
pub fn scan_local(dir: &Path, extensions: &[String]) -> Result<Vec<CatalogEntry>> {
    if !dir.is_dir() {
        anyhow::bail!("{} is not a directory", dir.display());
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        if !matches {
            continue;
        }

        let absolute = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let Ok(uri) = url::Url::from_file_path(&absolute) else {
            tracing::debug!("Skipping {:?}: not representable as a file URL", absolute);
            continue;
        };
        let label = path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        entries.push(CatalogEntry {
            label,
            sources: BTreeMap::new(),
            url: Some(uri.to_string()),
            time_of_day: None,
        });
    }

    entries.sort_by(|a, b| a.label.cmp(&b.label));
    Ok(entries)
}

/// Save the catalog for offline use.
pub fn save_cached(path: &Path, entries: &[CatalogEntry]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create catalog cache directory")?;
    }
    let json = serde_json::to_string_pretty(entries).context("Failed to serialize catalog")?;
    fs::write(path, json).context("Failed to write catalog cache")?;
    tracing::debug!("Saved catalog cache with {} entries", entries.len());
    Ok(())
}

/// Load the cached catalog. A missing file is an empty catalog.
pub fn load_cached(path: &Path) -> Result<Vec<CatalogEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let json = fs::read_to_string(path).context("Failed to read catalog cache")?;
    let entries: Vec<CatalogEntry> =
        serde_json::from_str(&json).context("Failed to parse catalog cache")?;
    tracing::info!("Loaded cached catalog with {} entries", entries.len());
    Ok(entries)
}

/// Remote entries, falling back to the offline cache when the fetch fails.
async fn remote_entries(settings: &CatalogSettings, client: &Client, url: &str) -> Vec<CatalogEntry> {
    match fetch_remote(client, url).await {
        Ok(entries) => {
            tracing::info!("Fetched {} entries from {}", entries.len(), url);
            if let Some(cache) = &settings.cache_file {
                if let Err(e) = save_cached(cache, &entries) {
                    tracing::warn!("Failed to cache catalog: {:#}", e);
                }
            }
            entries
        }
        Err(e) => {
            tracing::warn!("Remote catalog unavailable: {:#}", e);
            match &settings.cache_file {
                Some(cache) => load_cached(cache).unwrap_or_else(|e| {
                    tracing::warn!("Failed to load catalog cache: {:#}", e);
                    Vec::new()
                }),
                None => Vec::new(),
            }
        }
    }
}

fn local_entries(dirs: Vec<PathBuf>, extensions: Vec<String>) -> Vec<CatalogEntry> {
    let mut entries = Vec::new();
    for dir in dirs {
        match scan_local(&dir, &extensions) {
            Ok(found) => {
                tracing::info!("Found {} local videos in {}", found.len(), dir.display());
                entries.extend(found);
            }
            Err(e) => tracing::warn!("Failed to scan {}: {:#}", dir.display(), e),
        }
    }
    entries
}

/// Gather every configured source. Failing sources are logged and skipped.
pub async fn fetch_catalog(settings: &CatalogSettings, client: &Client) -> Vec<Video> {
    let mut entries = Vec::new();

    if let Some(url) = &settings.remote_url {
        entries.extend(remote_entries(settings, client, url).await);
    }

    if !settings.local_dirs.is_empty() {
        let dirs = settings.local_dirs.clone();
        let extensions = settings.extensions.clone();
        match tokio::task::spawn_blocking(move || local_entries(dirs, extensions)).await {
            Ok(found) => entries.extend(found),
            Err(e) => tracing::warn!("Local scan aborted: {}", e),
        }
    }

    entries.into_iter().map(CatalogEntry::into_video).collect()
}

/// Fetch on a separate task and deliver the result once.
pub fn spawn_fetch(settings: CatalogSettings, scheduler: SchedulerHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        let client = Client::new();
        let videos = fetch_catalog(&settings, &client).await;
        tracing::info!("Catalog contains {} videos", videos.len());
        scheduler.deliver_catalog(videos);
    })
}
