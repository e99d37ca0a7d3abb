//! Rotation scheduler.
//!
//! Coordinates the two slots: decides what plays next, when the back slot
//! starts loading, when the cross-fade begins and how failures are retried.
//! All transitions run on a single task; engines, the presentation layer,
//! timers and the catalog only ever post [`SchedulerEvent`]s into it.

use crate::config::RotationSettings;
use crate::engine::{EngineSignal, PlaybackEngine};
use crate::error::PlaybackError;
use crate::playlist::Playlist;
use crate::presentation::{FadeId, FadeTicket, Presentation};
use crate::slot::{Role, Slot, SlotId};
use crate::timer::{Timer, TimerKind};
use crate::video::{Locator, Video};
use tokio::sync::mpsc;

pub type EventSender = mpsc::UnboundedSender<SchedulerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SchedulerEvent>;

/// Channel carrying every input of the scheduler.
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Inputs marshaled onto the scheduler's task.
#[derive(Debug)]
pub enum SchedulerEvent {
    /// One-shot catalog delivery.
    CatalogFetched(Vec<Video>),
    Engine {
        slot: SlotId,
        generation: u64,
        signal: EngineSignal,
    },
    FadeComplete(FadeId),
    TimerElapsed { kind: TimerKind, id: u64 },
    /// Viewer asked for the next clip now.
    Skip,
    Stop,
}

/// Session notices surfaced to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    NowPlaying { slot: SlotId, label: String },
    TransitionStarted { from: SlotId, to: SlotId, next: String },
    /// Nothing playable; the display stays blank.
    CatalogEmpty,
    /// Retries exhausted; the rotation restarts with a fresh selection.
    Unrecoverable { label: String, error: PlaybackError },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Constructed, or waiting for a catalog / holding the blank video.
    Idle,
    /// A locator was handed to the target slot; awaiting ready.
    Loading,
    /// Front slot visible and advancing.
    Playing,
    /// Cross-fade in progress while the back slot loads.
    Transitioning,
    /// A load or playback failed; back-off timer pending.
    Recovering,
    Stopped,
}

/// Cloneable handle for driving a running scheduler from other tasks.
#[derive(Clone, Debug)]
pub struct SchedulerHandle {
    tx: EventSender,
}

impl SchedulerHandle {
    pub fn deliver_catalog(&self, videos: Vec<Video>) {
        let _ = self.tx.send(SchedulerEvent::CatalogFetched(videos));
    }

    pub fn skip(&self) {
        let _ = self.tx.send(SchedulerEvent::Skip);
    }

    pub fn stop(&self) {
        let _ = self.tx.send(SchedulerEvent::Stop);
    }
}

fn index(id: SlotId) -> usize {
    match id {
        SlotId::A => 0,
        SlotId::B => 1,
    }
}

pub struct Scheduler {
    settings: RotationSettings,
    playlist: Option<Playlist>,
    slots: [Slot; 2],
    presentation: Box<dyn Presentation>,
    phase: Phase,
    /// Selected during a transition, loading into the back slot.
    pending: Option<Video>,
    retry_count: u32,
    /// Cleared while a transition or recovery is in flight.
    can_transition: bool,
    /// Slot awaited while `Loading`, or to retry while `Recovering`.
    target: SlotId,
    front: SlotId,
    fade: Option<FadeId>,
    next_fade: u64,
    prefinish: Timer,
    backoff: Timer,
    tx: EventSender,
    reports: mpsc::UnboundedSender<SessionEvent>,
}

impl Scheduler {
    pub fn new(
        settings: RotationSettings,
        engines: [Box<dyn PlaybackEngine>; 2],
        presentation: Box<dyn Presentation>,
        tx: EventSender,
        reports: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let [engine_a, engine_b] = engines;
        Self {
            settings,
            playlist: None,
            slots: [
                Slot::new(SlotId::A, Role::Front, engine_a),
                Slot::new(SlotId::B, Role::Back, engine_b),
            ],
            presentation,
            phase: Phase::Idle,
            pending: None,
            retry_count: 0,
            can_transition: false,
            target: SlotId::A,
            front: SlotId::A,
            fade: None,
            next_fade: 0,
            prefinish: Timer::new(TimerKind::PreFinish),
            backoff: Timer::new(TimerKind::Backoff),
            tx,
            reports,
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            tx: self.tx.clone(),
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[cfg(test)]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    #[cfg(test)]
    pub fn can_transition(&self) -> bool {
        self.can_transition
    }

    #[cfg(test)]
    pub fn pending(&self) -> Option<&Video> {
        self.pending.as_ref()
    }

    pub fn slot(&self, id: SlotId) -> &Slot {
        &self.slots[index(id)]
    }

    pub fn front(&self) -> SlotId {
        debug_assert_eq!(self.slot(self.front).role(), Role::Front);
        self.front
    }

    pub fn back(&self) -> SlotId {
        self.front().other()
    }

    /// Relabel both slots so `id` is in front.
    fn set_front(&mut self, id: SlotId) {
        self.slots[index(id)].set_role(Role::Front);
        self.slots[index(id.other())].set_role(Role::Back);
        self.front = id;
        tracing::debug!("Slot {} is now in front", self.slots[index(id)].id());
    }

    /// Process events until stopped.
    pub async fn run(mut self, mut rx: EventReceiver) {
        while let Some(event) = rx.recv().await {
            self.dispatch(event);
            if self.phase == Phase::Stopped {
                break;
            }
        }
        self.stop();
    }

    /// Apply one event. Never fails; every error ends in a retry, a restart
    /// or a degraded-but-running state.
    pub fn dispatch(&mut self, event: SchedulerEvent) {
        if self.phase == Phase::Stopped {
            tracing::debug!("Dropping {:?} after stop", event);
            return;
        }

        match event {
            SchedulerEvent::CatalogFetched(videos) => self.on_catalog(videos),
            SchedulerEvent::Engine {
                slot,
                generation,
                signal,
            } => {
                let current = self.slot(slot).generation();
                if generation != current {
                    tracing::debug!(
                        "Dropping stale {:?} from slot {} (generation {}, current {})",
                        signal,
                        slot,
                        generation,
                        current
                    );
                    return;
                }
                match signal {
                    EngineSignal::Ready => self.on_ready(slot),
                    EngineSignal::NearEnd => self.on_near_end(slot),
                    EngineSignal::Failed(error) => self.on_failed(slot, error),
                }
            }
            SchedulerEvent::FadeComplete(id) => self.on_fade_complete(id),
            SchedulerEvent::TimerElapsed { kind, id } => match kind {
                TimerKind::PreFinish => {
                    if self.prefinish.accept(id) {
                        self.on_prefinish();
                    }
                }
                TimerKind::Backoff => {
                    if self.backoff.accept(id) {
                        self.on_backoff();
                    }
                }
            },
            SchedulerEvent::Skip => self.skip(),
            SchedulerEvent::Stop => self.stop(),
        }
    }

    /// Install the playlist. A second delivery in one session is ignored.
    pub fn install(&mut self, playlist: Playlist) {
        if self.playlist.is_some() {
            tracing::warn!("Ignoring second catalog delivery");
            return;
        }
        tracing::info!("Playlist ready with {} videos", playlist.len());
        if playlist.is_empty() {
            tracing::warn!("Catalog is empty; display will stay blank");
            self.report(SessionEvent::CatalogEmpty);
        }
        self.playlist = Some(playlist);
        self.start();
    }

    fn on_catalog(&mut self, videos: Vec<Video>) {
        self.install(Playlist::new(videos));
    }

    /// `Idle -> Loading` with a fresh selection in the front slot.
    pub fn start(&mut self) {
        if self.phase != Phase::Idle {
            tracing::debug!("Start ignored in {:?}", self.phase);
            return;
        }
        if self.playlist.is_none() {
            tracing::debug!("Start deferred until the catalog arrives");
            return;
        }
        let front = self.front();
        self.load_fresh(front);
    }

    /// Request the next clip now, if a transition may begin.
    pub fn skip(&mut self) {
        if self.phase == Phase::Playing && self.can_transition {
            tracing::info!("Skipping '{}'", self.slot(self.front()).label());
            self.begin_transition();
        } else {
            tracing::debug!("Skip ignored in {:?}", self.phase);
        }
    }

    /// Cancel all timers and release both engines. Safe from any state.
    pub fn stop(&mut self) {
        if self.phase == Phase::Stopped {
            return;
        }
        if self.backoff.is_armed() {
            tracing::debug!("Dropping pending retry of slot {}", self.target);
        }
        self.prefinish.cancel();
        self.backoff.cancel();
        self.fade = None;
        self.pending = None;
        self.can_transition = false;
        for slot in &mut self.slots {
            slot.release();
        }
        self.phase = Phase::Stopped;
        tracing::info!("Rotation stopped");
    }

    fn select_next(&mut self) -> Option<(Video, Locator)> {
        let filter = self.settings.filter_time_of_day;
        let quality = &self.settings.quality;
        self.playlist.as_mut()?.next_playable(filter, quality)
    }

    fn load_fresh(&mut self, target: SlotId) {
        match self.select_next() {
            Some((video, locator)) => {
                tracing::info!("Loading '{}' into slot {}", video.label(), target);
                self.target = target;
                self.slots[index(target)].load(video, locator, &self.tx);
                self.phase = Phase::Loading;
            }
            None => {
                tracing::warn!(
                    "{} for '{}'; holding blank display",
                    PlaybackError::EmptyCatalog,
                    self.settings.quality
                );
                self.slots[index(target)].hold_blank();
                self.phase = Phase::Idle;
                // An empty playlist was already reported on install.
                if self.playlist.as_ref().is_some_and(|p| !p.is_empty()) {
                    self.report(SessionEvent::CatalogEmpty);
                }
            }
        }
    }

    fn on_ready(&mut self, slot: SlotId) {
        self.slots[index(slot)].mark_ready();
        self.retry_count = 0;

        match self.phase {
            Phase::Loading if slot == self.target => self.begin_playing(slot, true),
            Phase::Transitioning if slot == self.back() => {
                tracing::debug!("Next clip ready in slot {} under the fade", slot);
                self.slots[index(slot)].start();
            }
            phase => tracing::debug!("Ready from slot {} ignored in {:?}", slot, phase),
        }
    }

    /// Make `slot` the visible front clip and arm the pre-finish timer.
    fn begin_playing(&mut self, slot: SlotId, reveal: bool) {
        let other = slot.other();
        if self.front != slot {
            self.set_front(slot);
        }
        if self.slots[index(other)].video().is_some() {
            self.slots[index(other)].clear();
        }

        if reveal {
            self.presentation.reveal(slot);
        }
        self.slots[index(slot)].start();

        self.phase = Phase::Playing;
        self.pending = None;
        self.can_transition = true;
        self.arm_prefinish();

        let label = self.slot(slot).label().to_string();
        tracing::info!("Playing '{}' on slot {}", label, slot);
        self.report(SessionEvent::NowPlaying { slot, label });
    }

    fn arm_prefinish(&mut self) {
        let front = &self.slots[index(self.front())];
        let Some(duration) = front.duration() else {
            tracing::warn!(
                "Duration of '{}' unknown; waiting for the engine's near-end signal",
                front.label()
            );
            self.prefinish.cancel();
            return;
        };
        let position = front.position().unwrap_or_default();
        let delay = duration
            .saturating_sub(position)
            .saturating_sub(self.settings.lead_time());
        self.prefinish.arm(delay, &self.tx);
    }

    fn on_prefinish(&mut self) {
        if self.phase == Phase::Playing {
            self.begin_transition();
        }
    }

    fn on_near_end(&mut self, slot: SlotId) {
        if self.phase == Phase::Playing && slot == self.front() {
            self.begin_transition();
        } else {
            tracing::debug!("Near-end from slot {} ignored in {:?}", slot, self.phase);
        }
    }

    /// `Playing -> Transitioning`: load the next clip into the back slot and
    /// start the fade. Roles swap only when the fade completes.
    fn begin_transition(&mut self) {
        if !self.can_transition {
            return;
        }
        let Some((video, locator)) = self.select_next().or_else(|| self.repeat_front()) else {
            tracing::warn!("No next video available; waiting for the clip to end");
            self.prefinish.cancel();
            return;
        };

        self.prefinish.cancel();
        self.can_transition = false;

        let front = self.front();
        let back = self.back();
        if let Some(position) = self.slot(front).position() {
            tracing::debug!("Leaving '{}' at {:?}", self.slot(front).label(), position);
        }
        tracing::info!(
            "Transitioning {} -> {}: next '{}'",
            front,
            back,
            video.label()
        );

        let next = video.label().to_string();
        self.pending = Some(video.clone());
        self.slots[index(back)].load(video, locator, &self.tx);

        self.next_fade += 1;
        let id = FadeId(self.next_fade);
        self.fade = Some(id);
        self.presentation.begin_fade(
            front,
            back,
            self.settings.fade_duration(),
            FadeTicket::new(id, self.tx.clone()),
        );
        self.phase = Phase::Transitioning;
        self.report(SessionEvent::TransitionStarted {
            from: front,
            to: back,
            next,
        });
    }

    /// The front clip again, for when nothing else can be selected.
    fn repeat_front(&self) -> Option<(Video, Locator)> {
        let video = self.slot(self.front()).video()?.clone();
        let locator = video.resolve(&self.settings.quality)?;
        tracing::debug!("Repeating '{}'", video.label());
        Some((video, locator))
    }

    /// `Transitioning -> Playing`: swap roles and re-arm against the new
    /// front clip.
    fn on_fade_complete(&mut self, id: FadeId) {
        if self.phase != Phase::Transitioning || self.fade != Some(id) {
            tracing::debug!("Ignoring completion of abandoned fade {:?}", id);
            return;
        }
        self.fade = None;

        let old_front = self.front();
        let new_front = old_front.other();
        self.set_front(new_front);
        self.slots[index(old_front)].clear();

        if self.slot(new_front).is_ready() {
            self.begin_playing(new_front, false);
        } else {
            tracing::debug!("Fade done before slot {} was ready", new_front);
            self.target = new_front;
            self.phase = Phase::Loading;
        }
    }

    /// Slot whose failure interrupts the rotation in the current phase.
    fn active_slot(&self) -> Option<SlotId> {
        match self.phase {
            Phase::Playing => Some(self.front()),
            Phase::Transitioning => Some(self.back()),
            Phase::Loading | Phase::Recovering => Some(self.target),
            Phase::Idle | Phase::Stopped => None,
        }
    }

    fn on_failed(&mut self, slot: SlotId, error: PlaybackError) {
        let label = self.slot(slot).label().to_string();

        if self.active_slot() != Some(slot) {
            tracing::warn!("Outgoing clip '{}' on slot {} failed: {}", label, slot, error);
            self.slots[index(slot)].clear();
            return;
        }

        tracing::warn!("Slot {} failed on '{}': {}", slot, label, error);
        self.prefinish.cancel();
        self.backoff.cancel();
        if self.fade.take().is_some() {
            tracing::debug!("Abandoning fade into slot {}", slot);
        }
        self.pending = None;
        self.can_transition = false;
        self.target = slot;
        self.retry_count += 1;

        if self.retry_count >= self.settings.max_retries {
            tracing::error!(
                "Giving up on '{}' after {} attempts: {}",
                label,
                self.retry_count,
                error
            );
            self.report(SessionEvent::Unrecoverable { label, error });
            self.retry_count = 0;
            self.phase = Phase::Idle;
            self.load_fresh(slot);
        } else {
            self.phase = Phase::Recovering;
            self.backoff.arm(self.settings.retry_backoff(), &self.tx);
        }
    }

    /// `Recovering -> Loading` with the same video.
    fn on_backoff(&mut self) {
        if self.phase != Phase::Recovering {
            return;
        }
        let target = self.target;
        tracing::info!(
            "Retrying '{}' on slot {} (attempt {} of {})",
            self.slot(target).label(),
            target,
            self.retry_count + 1,
            self.settings.max_retries
        );
        if self.slots[index(target)].reload(&self.tx) {
            self.phase = Phase::Loading;
        } else {
            self.phase = Phase::Idle;
            self.load_fresh(target);
        }
    }

    fn report(&self, event: SessionEvent) {
        let _ = self.reports.send(event);
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
