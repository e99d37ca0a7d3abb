//! Recording doubles for the engine and presentation boundaries.

use crate::engine::{PlaybackEngine, SignalSink};
use crate::presentation::{FadeId, FadeTicket, Presentation};
use crate::slot::SlotId;
use crate::video::Locator;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Load(String),
    Start,
    Stop,
    Release,
}

#[derive(Default)]
struct EngineState {
    calls: Vec<EngineCall>,
    sinks: Vec<SignalSink>,
    duration: Option<Duration>,
    position: Option<Duration>,
}

/// Engine that records calls; the test decides when signals fire.
pub struct MockEngine {
    state: Arc<Mutex<EngineState>>,
}

/// Test-side view of a [`MockEngine`].
#[derive(Clone)]
pub struct EngineProbe {
    state: Arc<Mutex<EngineState>>,
}

pub fn mock_engine(duration: Option<Duration>) -> (MockEngine, EngineProbe) {
    let state = Arc::new(Mutex::new(EngineState {
        duration,
        ..EngineState::default()
    }));
    (
        MockEngine {
            state: state.clone(),
        },
        EngineProbe { state },
    )
}

impl PlaybackEngine for MockEngine {
    fn load(&mut self, locator: &Locator, signals: SignalSink) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(EngineCall::Load(locator.to_string()));
        state.sinks.push(signals);
    }

    fn start(&mut self) {
        self.state.lock().unwrap().calls.push(EngineCall::Start);
    }

    fn stop(&mut self) {
        self.state.lock().unwrap().calls.push(EngineCall::Stop);
    }

    fn release(&mut self) {
        self.state.lock().unwrap().calls.push(EngineCall::Release);
    }

    fn duration(&self) -> Option<Duration> {
        self.state.lock().unwrap().duration
    }

    fn position(&self) -> Option<Duration> {
        self.state.lock().unwrap().position
    }
}

impl EngineProbe {
    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn loads(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Load(locator) => Some(locator),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &EngineCall) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    /// Sink of the most recent load.
    pub fn sink(&self) -> SignalSink {
        let last = self.state.lock().unwrap().sinks.len() - 1;
        self.sink_at(last)
    }

    pub fn sink_at(&self, index: usize) -> SignalSink {
        self.state.lock().unwrap().sinks[index].clone()
    }

    pub fn set_duration(&self, duration: Option<Duration>) {
        self.state.lock().unwrap().duration = duration;
    }

    pub fn set_position(&self, position: Option<Duration>) {
        self.state.lock().unwrap().position = position;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PresentationCall {
    Reveal(SlotId),
    Fade {
        from: SlotId,
        to: SlotId,
        duration: Duration,
        id: FadeId,
    },
}

#[derive(Default)]
struct PresentationState {
    calls: Vec<PresentationCall>,
    tickets: Vec<FadeTicket>,
}

/// Presentation that holds fade tickets until the test completes them.
pub struct MockPresentation {
    state: Arc<Mutex<PresentationState>>,
}

#[derive(Clone)]
pub struct PresentationProbe {
    state: Arc<Mutex<PresentationState>>,
}

pub fn mock_presentation() -> (MockPresentation, PresentationProbe) {
    let state = Arc::new(Mutex::new(PresentationState::default()));
    (
        MockPresentation {
            state: state.clone(),
        },
        PresentationProbe { state },
    )
}

impl Presentation for MockPresentation {
    fn reveal(&mut self, slot: SlotId) {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(PresentationCall::Reveal(slot));
    }

    fn begin_fade(&mut self, from: SlotId, to: SlotId, duration: Duration, ticket: FadeTicket) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(PresentationCall::Fade {
            from,
            to,
            duration,
            id: ticket.id(),
        });
        state.tickets.push(ticket);
    }
}

impl PresentationProbe {
    pub fn calls(&self) -> Vec<PresentationCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn fades(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, PresentationCall::Fade { .. }))
            .count()
    }

    /// Complete the oldest outstanding fade.
    pub fn complete_fade(&self) {
        let ticket = self.state.lock().unwrap().tickets.remove(0);
        ticket.complete();
    }
}
