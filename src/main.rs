mod catalog;
mod config;
mod engine;
mod error;
mod playlist;
mod presentation;
mod scheduler;
mod slot;
#[cfg(test)]
mod testing;
mod timer;
mod video;

use crate::config::{Backend, EngineSettings, Settings};
use crate::engine::simulated::SimulatedEngine;
use crate::engine::PlaybackEngine;
use crate::presentation::LogPresentation;
use crate::scheduler::{Scheduler, SchedulerHandle, SessionEvent};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ambient_viewer=info")),
        )
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let settings = Settings::load(config_path.as_deref())?;
    tracing::debug!("Settings: {:?}", settings);

    let engines = build_engines(&settings.engine)?;
    let (tx, rx) = scheduler::channel();
    let (reports_tx, reports_rx) = mpsc::unbounded_channel();

    let scheduler = Scheduler::new(
        settings.rotation.clone(),
        engines,
        Box::new(LogPresentation::new()),
        tx,
        reports_tx,
    );
    let handle = scheduler.handle();

    tokio::spawn(log_reports(reports_rx));
    catalog::spawn_fetch(settings.catalog.clone(), handle.clone());
    let rotation = tokio::spawn(scheduler.run(rx));
    spawn_skip_listener(handle.clone())?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutting down");
    handle.stop();
    rotation.await.context("Rotation task panicked")?;

    Ok(())
}

fn build_engines(settings: &EngineSettings) -> Result<[Box<dyn PlaybackEngine>; 2]> {
    match settings.backend {
        Backend::Simulated => {
            let ready = Duration::from_millis(settings.simulated_ready_ms);
            let clip = Duration::from_millis(settings.simulated_clip_ms);
            tracing::info!("Using simulated playback ({:?} clips)", clip);
            let rate = settings.simulated_failure_rate;
            let engines: [Box<dyn PlaybackEngine>; 2] = [
                Box::new(SimulatedEngine::new("slot-a", ready, clip).with_failure_rate(rate)),
                Box::new(SimulatedEngine::new("slot-b", ready, clip).with_failure_rate(rate)),
            ];
            Ok(engines)
        }
        #[cfg(feature = "gstreamer")]
        Backend::Gstreamer => {
            use crate::engine::gst::GstEngine;
            GstEngine::init()?;
            let engines: [Box<dyn PlaybackEngine>; 2] = [
                Box::new(GstEngine::new("slot-a", settings.muted)),
                Box::new(GstEngine::new("slot-b", settings.muted)),
            ];
            Ok(engines)
        }
        #[cfg(not(feature = "gstreamer"))]
        Backend::Gstreamer => {
            anyhow::bail!("GStreamer backend requested but built without the `gstreamer` feature")
        }
    }
}

/// `kill -USR1 <pid>` advances to the next clip.
#[cfg(unix)]
fn spawn_skip_listener(handle: SchedulerHandle) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut skips =
        signal(SignalKind::user_defined1()).context("Failed to listen for SIGUSR1")?;
    tokio::spawn(async move {
        while skips.recv().await.is_some() {
            tracing::info!("Skip requested");
            handle.skip();
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn spawn_skip_listener(_handle: SchedulerHandle) -> Result<()> {
    tracing::warn!("Manual skip is only available on Unix (SIGUSR1)");
    Ok(())
}

async fn log_reports(mut reports: mpsc::UnboundedReceiver<SessionEvent>) {
    while let Some(event) = reports.recv().await {
        match event {
            SessionEvent::NowPlaying { slot, label } => {
                tracing::info!("Now playing '{}' (slot {})", label, slot);
            }
            SessionEvent::TransitionStarted { from, to, next } => {
                tracing::debug!("Cross-fading {} -> {} into '{}'", from, to, next);
            }
            SessionEvent::CatalogEmpty => {
                tracing::warn!("No videos available; check the catalog settings");
            }
            SessionEvent::Unrecoverable { label, error } => {
                tracing::error!("Unrecoverable playback failure on '{}': {}", label, error);
            }
        }
    }
}
