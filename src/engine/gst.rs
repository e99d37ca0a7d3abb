//! GStreamer-based playback engine.
//!
//! Each load builds a `playbin` and prerolls it to PAUSED. A bus-polling
//! thread turns pipeline messages into engine signals.

use super::{PlaybackEngine, SignalSink};
use crate::error::PlaybackError;
use crate::video::Locator;
use anyhow::{Context, Result};
use gstreamer as gst;
use gstreamer::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How long the watcher blocks on the bus before re-checking for shutdown.
const BUS_POLL: Duration = Duration::from_millis(100);

/// Stops its bus thread when dropped.
struct BusWatch {
    shutdown: Arc<AtomicBool>,
}

impl Drop for BusWatch {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

pub struct GstEngine {
    name: String,
    muted: bool,
    pipeline: Option<gst::Element>,
    watch: Option<BusWatch>,
}

impl GstEngine {
    /// Initialize GStreamer (call once at startup).
    pub fn init() -> Result<()> {
        gst::init().context("Failed to initialize GStreamer")?;
        tracing::info!("GStreamer initialized: {}", gst::version_string());
        Ok(())
    }

    pub fn new(name: impl Into<String>, muted: bool) -> Self {
        Self {
            name: name.into(),
            muted,
            pipeline: None,
            watch: None,
        }
    }

    fn build(&self, locator: &Locator) -> Result<gst::Element> {
        let playbin = gst::ElementFactory::make("playbin")
            .name(format!("{}-playbin", self.name))
            .property("uri", locator.as_str())
            .property("mute", self.muted)
            .build()
            .context("Failed to create playbin")?;

        playbin
            .set_state(gst::State::Paused)
            .context("Failed to preroll pipeline")?;

        Ok(playbin)
    }

    fn teardown(&mut self) {
        self.watch = None;
        if let Some(pipeline) = self.pipeline.take() {
            if let Err(e) = pipeline.set_state(gst::State::Null) {
                tracing::warn!("[{}] Failed to shut down pipeline: {}", self.name, e);
            }
        }
    }
}

fn watch_bus(bus: gst::Bus, signals: SignalSink, shutdown: Arc<AtomicBool>, locator: String) {
    let timeout = gst::ClockTime::from_mseconds(BUS_POLL.as_millis() as u64);
    let mut prerolled = false;

    while !shutdown.load(Ordering::SeqCst) {
        let Some(msg) = bus.timed_pop(timeout) else {
            continue;
        };
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        match msg.view() {
            gst::MessageView::AsyncDone(_) if !prerolled => {
                prerolled = true;
                signals.ready();
            }
            gst::MessageView::Eos(_) => {
                signals.near_end();
                break;
            }
            gst::MessageView::Error(err) => {
                let reason = format!("{} ({:?})", err.error(), err.debug());
                tracing::error!("GStreamer error on {}: {}", locator, reason);
                let error = if prerolled {
                    PlaybackError::playback(reason)
                } else {
                    PlaybackError::load(locator.as_str(), reason)
                };
                signals.failed(error);
                break;
            }
            _ => {}
        }
    }
}

impl PlaybackEngine for GstEngine {
    fn load(&mut self, locator: &Locator, signals: SignalSink) {
        self.teardown();
        tracing::debug!("[{}] Loading {}", self.name, locator);

        let pipeline = match self.build(locator) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                signals.failed(PlaybackError::load(locator.as_str(), format!("{:#}", e)));
                return;
            }
        };

        let Some(bus) = pipeline.bus() else {
            signals.failed(PlaybackError::load(locator.as_str(), "pipeline has no bus"));
            let _ = pipeline.set_state(gst::State::Null);
            return;
        };

        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();
        let uri = locator.to_string();
        let spawned = std::thread::Builder::new()
            .name(format!("{}-bus", self.name))
            .spawn(move || watch_bus(bus, signals, flag, uri));
        if let Err(e) = spawned {
            tracing::error!("[{}] Failed to spawn bus watcher: {}", self.name, e);
        }

        self.pipeline = Some(pipeline);
        self.watch = Some(BusWatch { shutdown });
    }

    fn start(&mut self) {
        if let Some(pipeline) = &self.pipeline {
            if let Err(e) = pipeline.set_state(gst::State::Playing) {
                tracing::warn!("[{}] Failed to start playback: {}", self.name, e);
            }
        }
    }

    fn stop(&mut self) {
        self.teardown();
    }

    fn release(&mut self) {
        self.teardown();
    }

    fn duration(&self) -> Option<Duration> {
        self.pipeline
            .as_ref()?
            .query_duration::<gst::ClockTime>()
            .map(|d| Duration::from_millis(d.mseconds()))
    }

    fn position(&self) -> Option<Duration> {
        self.pipeline
            .as_ref()?
            .query_position::<gst::ClockTime>()
            .map(|p| Duration::from_millis(p.mseconds()))
    }
}

impl Drop for GstEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}
