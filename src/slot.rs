//! The two persistent playback channels.

use crate::engine::{PlaybackEngine, SignalSink};
use crate::scheduler::EventSender;
use crate::video::{Locator, Video};
use std::fmt;

/// Physical identity of a slot. Never changes for the life of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotId {
    A,
    B,
}

impl SlotId {
    pub fn other(self) -> Self {
        match self {
            SlotId::A => SlotId::B,
            SlotId::B => SlotId::A,
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotId::A => f.write_str("A"),
            SlotId::B => f.write_str("B"),
        }
    }
}

/// Front is visible/active; Back buffers the next clip off-screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Front,
    Back,
}

/// A playback channel wrapping one engine instance.
///
/// Swapping front and back relabels `role`; engines never move between
/// slots.
pub struct Slot {
    id: SlotId,
    role: Role,
    engine: Box<dyn PlaybackEngine>,
    video: Option<Video>,
    locator: Option<Locator>,
    /// Bumped on every load and on release; signals stamped with an older
    /// value belong to a superseded load.
    generation: u64,
    ready: bool,
    started: bool,
    released: bool,
}

impl Slot {
    pub fn new(id: SlotId, role: Role, engine: Box<dyn PlaybackEngine>) -> Self {
        Self {
            id,
            role,
            engine,
            video: None,
            locator: None,
            generation: 0,
            ready: false,
            started: false,
            released: false,
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn set_role(&mut self, role: Role) {
        self.role = role;
    }

    pub fn video(&self) -> Option<&Video> {
        self.video.as_ref()
    }

    pub fn label(&self) -> &str {
        self.video.as_ref().map(Video::label).unwrap_or("")
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn mark_ready(&mut self) {
        self.ready = true;
    }

    /// Hand a video to the engine; supersedes any load in flight.
    pub fn load(&mut self, video: Video, locator: Locator, tx: &EventSender) {
        self.generation += 1;
        self.ready = false;
        self.started = false;
        tracing::debug!(
            "Slot {} loading '{}' ({}), generation {}",
            self.id,
            video.label(),
            locator,
            self.generation
        );
        let sink = SignalSink::new(self.id, self.generation, tx.clone());
        self.engine.load(&locator, sink);
        self.video = Some(video);
        self.locator = Some(locator);
    }

    /// Reload whatever this slot last loaded. Returns false if empty.
    pub fn reload(&mut self, tx: &EventSender) -> bool {
        match (self.video.clone(), self.locator.clone()) {
            (Some(video), Some(locator)) => {
                self.load(video, locator, tx);
                true
            }
            _ => false,
        }
    }

    /// Hold the blank sentinel without touching the engine.
    pub fn hold_blank(&mut self) {
        self.generation += 1;
        self.ready = false;
        self.started = false;
        self.video = Some(Video::blank());
        self.locator = None;
    }

    /// Start playback once per load.
    pub fn start(&mut self) {
        if !self.started {
            self.started = true;
            self.engine.start();
        }
    }

    /// Stop playback and forget the loaded clip, keeping the engine for reuse.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.ready = false;
        self.started = false;
        self.engine.stop();
        self.video = None;
        self.locator = None;
    }

    pub fn duration(&self) -> Option<std::time::Duration> {
        self.engine.duration()
    }

    pub fn position(&self) -> Option<std::time::Duration> {
        self.engine.position()
    }

    /// Release the engine. Idempotent.
    pub fn release(&mut self) {
        self.generation += 1;
        self.ready = false;
        self.started = false;
        if self.released {
            return;
        }
        self.released = true;
        self.engine.stop();
        self.engine.release();
        tracing::debug!("Slot {} released", self.id);
    }
}
