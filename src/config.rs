//! Settings for the viewer, read once at startup.
//!
//! Sources, lowest priority first: built-in defaults, an optional TOML
//! file, then `AMBIENT_*` environment variables (`__` separates sections,
//! e.g. `AMBIENT_ROTATION__LEAD_TIME_MS=500`).

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File read when no path is given on the command line.
pub const DEFAULT_CONFIG_FILE: &str = "ambient-viewer.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub rotation: RotationSettings,
    pub catalog: CatalogSettings,
    pub engine: EngineSettings,
}

/// Values the rotation scheduler is constructed with.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RotationSettings {
    /// Only pick videos tagged for the current day/night bracket.
    pub filter_time_of_day: bool,
    /// Quality/source option passed to `Video::resolve`.
    pub quality: String,
    /// How long before a clip ends the transition begins.
    pub lead_time_ms: u64,
    pub fade_duration_ms: u64,
    /// Consecutive failures tolerated before reporting and reselecting.
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            filter_time_of_day: false,
            quality: "1080_h264".into(),
            lead_time_ms: 1000,
            fade_duration_ms: 1000,
            max_retries: 2,
            retry_backoff_ms: 2000,
        }
    }
}

impl RotationSettings {
    pub fn lead_time(&self) -> Duration {
        Duration::from_millis(self.lead_time_ms)
    }

    pub fn fade_duration(&self) -> Duration {
        Duration::from_millis(self.fade_duration_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// JSON endpoint returning `{"items": [...]}`.
    pub remote_url: Option<String>,
    /// Directories scanned recursively for video files.
    pub local_dirs: Vec<PathBuf>,
    pub extensions: Vec<String>,
    /// Offline copy of the last successful remote fetch.
    pub cache_file: Option<PathBuf>,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            remote_url: None,
            local_dirs: Vec::new(),
            extensions: ["mp4", "mov", "m4v", "mkv", "webm"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            cache_file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Simulated,
    Gstreamer,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub backend: Backend,
    /// Silence audio tracks.
    pub muted: bool,
    pub simulated_clip_ms: u64,
    pub simulated_ready_ms: u64,
    /// Share of simulated loads that fail instead of becoming ready.
    pub simulated_failure_rate: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            backend: Backend::Simulated,
            muted: true,
            simulated_clip_ms: 30_000,
            simulated_ready_ms: 250,
            simulated_failure_rate: 0.0,
        }
    }
}

impl Settings {
    /// Load settings from `path` (or the default file, if present) and the
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings: Settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("AMBIENT")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("catalog.local_dirs")
                    .with_list_parse_key("catalog.extensions")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let rotation = &self.rotation;
        if rotation.max_retries == 0 {
            bail!("rotation.max_retries must be at least 1");
        }
        if rotation.quality.trim().is_empty() {
            bail!("rotation.quality must not be empty");
        }
        if !(0.0..=1.0).contains(&self.engine.simulated_failure_rate) {
            bail!("engine.simulated_failure_rate must be between 0 and 1");
        }
        if rotation.fade_duration_ms > rotation.lead_time_ms {
            tracing::warn!(
                "Fade ({} ms) is longer than the lead time ({} ms); clips will end mid-fade",
                rotation.fade_duration_ms,
                rotation.lead_time_ms
            );
        }
        if self.catalog.remote_url.is_none() && self.catalog.local_dirs.is_empty() {
            tracing::warn!("No catalog source configured; the display will stay blank");
        }
        Ok(())
    }
}
