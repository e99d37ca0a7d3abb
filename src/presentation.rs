//! Presentation boundary: two overlapping surfaces, one per slot.

use crate::scheduler::{EventSender, SchedulerEvent};
use crate::slot::SlotId;
use std::time::Duration;

/// Identifies one fade so a late completion of an abandoned fade is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeId(pub u64);

/// Reports completion of a single fade back onto the scheduler context.
#[derive(Debug)]
pub struct FadeTicket {
    id: FadeId,
    tx: EventSender,
}

impl FadeTicket {
    pub(crate) fn new(id: FadeId, tx: EventSender) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> FadeId {
        self.id
    }

    pub fn complete(self) {
        let _ = self.tx.send(SchedulerEvent::FadeComplete(self.id));
    }
}

/// Surfaces the scheduler drives. Fire-and-forget.
pub trait Presentation: Send {
    /// Show a slot's surface at full opacity with no fade.
    fn reveal(&mut self, slot: SlotId);

    /// Cross-fade from one surface to the other, then call
    /// [`FadeTicket::complete`].
    fn begin_fade(&mut self, from: SlotId, to: SlotId, duration: Duration, ticket: FadeTicket);
}

/// Presentation for headless runs: logs commands and completes each fade
/// after its duration.
pub struct LogPresentation {
    visible: Option<SlotId>,
}

impl LogPresentation {
    pub fn new() -> Self {
        Self { visible: None }
    }
}

impl Presentation for LogPresentation {
    fn reveal(&mut self, slot: SlotId) {
        tracing::info!("Revealing surface {}", slot);
        self.visible = Some(slot);
    }

    fn begin_fade(&mut self, from: SlotId, to: SlotId, duration: Duration, ticket: FadeTicket) {
        tracing::info!("Fading {} -> {} over {:?} ({:?})", from, to, duration, ticket.id());
        self.visible = Some(to);
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            ticket.complete();
        });
    }
}
