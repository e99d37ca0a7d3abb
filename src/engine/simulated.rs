//! Headless engine for running the rotation without a decoder.
//!
//! Every locator "loads" after a fixed delay, lasts a fixed duration and
//! reports near-end when it runs out. A configurable share of loads fails
//! instead, so recovery can be exercised without real media.

use super::{PlaybackEngine, SignalSink};
use crate::error::PlaybackError;
use crate::video::Locator;
use rand::Rng;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub struct SimulatedEngine {
    name: String,
    ready_delay: Duration,
    clip_length: Duration,
    failure_rate: f64,
    signals: Option<SignalSink>,
    pending: Option<JoinHandle<()>>,
    playback: Option<JoinHandle<()>>,
    loaded: bool,
    started_at: Option<Instant>,
}

impl SimulatedEngine {
    pub fn new(name: impl Into<String>, ready_delay: Duration, clip_length: Duration) -> Self {
        Self {
            name: name.into(),
            ready_delay,
            clip_length,
            failure_rate: 0.0,
            signals: None,
            pending: None,
            playback: None,
            loaded: false,
            started_at: None,
        }
    }

    /// Fail this share of loads (0.0 to 1.0).
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    fn cancel_tasks(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        if let Some(handle) = self.playback.take() {
            handle.abort();
        }
    }
}

impl PlaybackEngine for SimulatedEngine {
    fn load(&mut self, locator: &Locator, signals: SignalSink) {
        self.cancel_tasks();
        self.loaded = true;
        self.started_at = None;
        tracing::debug!(
            "[{}] Simulating load of {} for slot {} (generation {})",
            self.name,
            locator,
            signals.slot(),
            signals.generation()
        );

        let fails = self.failure_rate > 0.0 && rand::thread_rng().gen::<f64>() < self.failure_rate;
        let delay = self.ready_delay;
        let sink = signals.clone();
        let uri = locator.as_str().to_string();
        self.signals = Some(signals);
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if fails {
                sink.failed(PlaybackError::load(uri, "simulated decode failure"));
            } else {
                sink.ready();
            }
        }));
    }

    fn start(&mut self) {
        self.started_at = Some(Instant::now());
        let Some(signals) = self.signals.clone() else {
            return;
        };
        let remaining = self.clip_length;
        if let Some(handle) = self.playback.take() {
            handle.abort();
        }
        self.playback = Some(tokio::spawn(async move {
            tokio::time::sleep(remaining).await;
            signals.near_end();
        }));
    }

    fn stop(&mut self) {
        self.cancel_tasks();
        self.signals = None;
        self.loaded = false;
        self.started_at = None;
    }

    fn release(&mut self) {
        self.stop();
    }

    fn duration(&self) -> Option<Duration> {
        self.loaded.then_some(self.clip_length)
    }

    fn position(&self) -> Option<Duration> {
        self.started_at
            .map(|start| start.elapsed().min(self.clip_length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineSignal;
    use crate::scheduler::SchedulerEvent;
    use crate::slot::SlotId;
    use tokio::sync::mpsc;

    fn signals(rx: &mut mpsc::UnboundedReceiver<SchedulerEvent>) -> Vec<(u64, EngineSignal)> {
        let mut out = Vec::new();
        while let Ok(SchedulerEvent::Engine {
            generation, signal, ..
        }) = rx.try_recv()
        {
            out.push((generation, signal));
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_load_never_signals() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut engine =
            SimulatedEngine::new("test", Duration::from_millis(100), Duration::from_secs(30));

        engine.load(&Locator::new("first"), SignalSink::new(SlotId::A, 1, tx.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        engine.load(&Locator::new("second"), SignalSink::new(SlotId::A, 2, tx));
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(signals(&mut rx), vec![(2, EngineSignal::Ready)]);
        assert_eq!(engine.duration(), Some(Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn position_tracks_elapsed_time() {
        let mut engine =
            SimulatedEngine::new("test", Duration::ZERO, Duration::from_secs(10));
        assert_eq!(engine.position(), None);
        engine.start();
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(engine.position(), Some(Duration::from_secs(4)));
        engine.stop();
        assert_eq!(engine.duration(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn started_clip_reports_near_end_when_it_runs_out() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut engine =
            SimulatedEngine::new("test", Duration::from_millis(100), Duration::from_secs(5));
        engine.load(&Locator::new("clip"), SignalSink::new(SlotId::B, 7, tx));
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(signals(&mut rx), vec![(7, EngineSignal::Ready)]);

        engine.start();
        tokio::time::sleep(Duration::from_millis(4_999)).await;
        assert!(signals(&mut rx).is_empty());
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(signals(&mut rx), vec![(7, EngineSignal::NearEnd)]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_silences_running_clip() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut engine = SimulatedEngine::new("test", Duration::ZERO, Duration::from_secs(5));
        engine.load(&Locator::new("clip"), SignalSink::new(SlotId::A, 1, tx));
        tokio::time::sleep(Duration::from_millis(1)).await;
        engine.start();
        engine.stop();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(signals(&mut rx), vec![(1, EngineSignal::Ready)]);
    }

    #[tokio::test(start_paused = true)]
    async fn certain_failure_rate_fails_every_load() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut engine =
            SimulatedEngine::new("test", Duration::from_millis(10), Duration::from_secs(5))
                .with_failure_rate(1.0);
        engine.load(&Locator::new("file:///clips/a.mov"), SignalSink::new(SlotId::A, 3, tx));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(
            signals(&mut rx),
            vec![(
                3,
                EngineSignal::Failed(PlaybackError::load(
                    "file:///clips/a.mov",
                    "simulated decode failure"
                ))
            )]
        );
    }
}
