//! Single-live delayed timers.

use crate::scheduler::{EventSender, SchedulerEvent};
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Fires `lead time` before the front clip ends.
    PreFinish,
    /// Delay before retrying a failed load.
    Backoff,
}

/// At most one pending firing; arming replaces the previous one.
///
/// Aborting the task is not enough on its own: the firing may already sit in
/// the event channel. Each firing carries the id it was armed with and
/// [`Timer::accept`] only honours the current one.
pub struct Timer {
    kind: TimerKind,
    armed: u64,
    handle: Option<JoinHandle<()>>,
}

impl Timer {
    pub fn new(kind: TimerKind) -> Self {
        Self {
            kind,
            armed: 0,
            handle: None,
        }
    }

    pub fn arm(&mut self, delay: Duration, tx: &EventSender) {
        self.cancel();
        self.armed += 1;
        let id = self.armed;
        let kind = self.kind;
        let tx = tx.clone();
        tracing::debug!("Arming {:?} timer #{} for {:?}", kind, id, delay);
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(SchedulerEvent::TimerElapsed { kind, id });
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            self.armed += 1;
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    /// Consume a firing. False for stale or cancelled timers.
    pub fn accept(&mut self, id: u64) -> bool {
        if self.handle.is_some() && id == self.armed {
            self.handle = None;
            true
        } else {
            false
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn fired(rx: &mut mpsc::UnboundedReceiver<SchedulerEvent>) -> Vec<u64> {
        let mut ids = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let SchedulerEvent::TimerElapsed { id, .. } = event {
                ids.push(id);
            }
        }
        ids
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = Timer::new(TimerKind::PreFinish);
        timer.arm(Duration::from_millis(500), &tx);

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert!(fired(&mut rx).is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        let ids = fired(&mut rx);
        assert_eq!(ids.len(), 1);
        assert!(timer.accept(ids[0]));
        assert!(!timer.accept(ids[0]));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(fired(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_replaces_previous() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = Timer::new(TimerKind::PreFinish);
        timer.arm(Duration::from_millis(100), &tx);
        timer.arm(Duration::from_millis(300), &tx);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(fired(&mut rx).is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        let ids = fired(&mut rx);
        assert_eq!(ids.len(), 1);
        assert!(timer.accept(ids[0]));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_rejects_queued_firing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = Timer::new(TimerKind::Backoff);
        timer.arm(Duration::from_millis(10), &tx);

        tokio::time::sleep(Duration::from_millis(20)).await;
        timer.cancel();
        let ids = fired(&mut rx);
        assert_eq!(ids.len(), 1);
        assert!(!timer.accept(ids[0]));
        assert!(!timer.is_armed());
    }
}
