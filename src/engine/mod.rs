//! Playback engine boundary.
//!
//! Engines decode and render on their own threads. Everything they report
//! goes through a [`SignalSink`], which posts onto the scheduler's event
//! channel instead of calling back into scheduler state.

#[cfg(feature = "gstreamer")]
pub mod gst;
pub mod simulated;

use crate::error::PlaybackError;
use crate::scheduler::{EventSender, SchedulerEvent};
use crate::slot::SlotId;
use crate::video::Locator;
use std::time::Duration;

/// Asynchronous signals an engine delivers for a load.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineSignal {
    /// Decodable and safe to reveal/start.
    Ready,
    /// The clip is about to end.
    NearEnd,
    /// Load or playback error.
    Failed(PlaybackError),
}

/// Control surface consumed from a playback engine.
///
/// Calls are fire-and-forget; results arrive later through the sink handed
/// to [`PlaybackEngine::load`].
pub trait PlaybackEngine: Send {
    /// Load a locator. A second call supersedes the first: the engine must
    /// drop any in-flight load for the stale locator.
    fn load(&mut self, locator: &Locator, signals: SignalSink);

    fn start(&mut self);

    fn stop(&mut self);

    /// Free decoder resources. Must be safe to call repeatedly.
    fn release(&mut self);

    /// Clip duration, known once the engine has signalled ready.
    fn duration(&self) -> Option<Duration>;

    fn position(&self) -> Option<Duration>;
}

/// Posts engine signals for one particular load onto the scheduler context.
///
/// Each sink is stamped with the slot and load generation it was created
/// for, so signals from a superseded load are recognisable as stale.
#[derive(Clone, Debug)]
pub struct SignalSink {
    slot: SlotId,
    generation: u64,
    tx: EventSender,
}

impl SignalSink {
    pub(crate) fn new(slot: SlotId, generation: u64, tx: EventSender) -> Self {
        Self {
            slot,
            generation,
            tx,
        }
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn ready(&self) {
        self.send(EngineSignal::Ready);
    }

    pub fn near_end(&self) {
        self.send(EngineSignal::NearEnd);
    }

    pub fn failed(&self, error: PlaybackError) {
        self.send(EngineSignal::Failed(error));
    }

    fn send(&self, signal: EngineSignal) {
        // The scheduler may already be gone; nothing left to notify then.
        let _ = self.tx.send(SchedulerEvent::Engine {
            slot: self.slot,
            generation: self.generation,
            signal,
        });
    }
}
