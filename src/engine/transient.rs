use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::state::TransientSlot;

/// A timer firing for one arming of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Expiry {
    slot: TransientSlot,
    generation: u64,
}

impl Expiry {
    pub(crate) fn slot(&self) -> TransientSlot {
        self.slot
    }
}

#[derive(Default)]
struct TransientTimer {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl TransientTimer {
    fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// One cancellable single-shot timer per transient slot.
///
/// Re-arming a slot aborts its pending timer. An expiry that was already in
/// flight carries a stale generation and is rejected by [`accept`](Self::accept).
pub(crate) struct TransientTimers {
    tx: mpsc::UnboundedSender<Expiry>,
    rx: mpsc::UnboundedReceiver<Expiry>,
    section_complete: TransientTimer,
    error: TransientTimer,
}

impl TransientTimers {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            section_complete: TransientTimer::default(),
            error: TransientTimer::default(),
        }
    }

    fn timer_mut(&mut self, slot: TransientSlot) -> &mut TransientTimer {
        match slot {
            TransientSlot::SectionComplete => &mut self.section_complete,
            TransientSlot::Error => &mut self.error,
        }
    }

    pub(crate) fn arm(&mut self, slot: TransientSlot, ttl: Duration) {
        let tx = self.tx.clone();
        let timer = self.timer_mut(slot);
        timer.cancel();
        timer.generation += 1;

        let expiry = Expiry {
            slot,
            generation: timer.generation,
        };
        timer.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let _ = tx.send(expiry);
        }));
        tracing::trace!("armed {:?} for {:?}", slot, ttl);
    }

    pub(crate) fn cancel_all(&mut self) {
        self.section_complete.cancel();
        self.error.cancel();
    }

    /// Waits for the next timer to fire.
    pub(crate) async fn next(&mut self) -> Option<Expiry> {
        self.rx.recv().await
    }

    /// Whether the expiry belongs to the current arming of its slot.
    pub(crate) fn accept(&mut self, expiry: Expiry) -> bool {
        let timer = self.timer_mut(expiry.slot);
        if timer.handle.is_none() || timer.generation != expiry.generation {
            tracing::trace!("ignoring stale expiry {:?}", expiry);
            return false;
        }
        timer.handle = None;
        true
    }
}

impl Drop for TransientTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
