//! Signal emitter: fire-and-forget delivery onto a multi-slot channel.
//!
//! Each emitting thread sticks to one slot so concurrent emitters rarely
//! touch the same queue. There is no ordering across slots; the
//! `SignalStream` interleaves them round-robin.

use std::future::poll_fn;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

use connscale_core::SignalRecord;

static NEXT_SLOT: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static SLOT_HINT: usize = NEXT_SLOT.fetch_add(1, Ordering::Relaxed);
}

/// Create an emitter and its consuming stream.
///
/// `slots` and `capacity` are clamped to at least 1.
pub fn signal_channel(slots: usize, capacity: usize) -> (SignalEmitter, SignalStream) {
    let (senders, receivers): (Vec<_>, Vec<_>) = (0..slots.max(1))
        .map(|_| mpsc::channel::<SignalRecord>(capacity.max(1)))
        .unzip();
    (
        SignalEmitter { slots: senders },
        SignalStream {
            slots: receivers,
            next: 0,
        },
    )
}

pub struct SignalEmitter {
    slots: Vec<mpsc::Sender<SignalRecord>>,
}

impl SignalEmitter {
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Try to enqueue `record` on this thread's slot. Never blocks.
    ///
    /// Returns `false` when the slot is full or the consumer is gone; the
    /// record is dropped and not retried.
    pub fn emit(&self, record: SignalRecord) -> bool {
        let slot = SLOT_HINT.with(|hint| *hint) % self.slots.len();
        match self.slots[slot].try_send(record) {
            Ok(()) => true,
            Err(TrySendError::Full(record)) => {
                warn!(
                    key = %record.key,
                    direction = %record.direction,
                    slot,
                    "signal slot full, signal dropped"
                );
                false
            }
            Err(TrySendError::Closed(record)) => {
                warn!(
                    key = %record.key,
                    direction = %record.direction,
                    slot,
                    "signal consumer gone, signal dropped"
                );
                false
            }
        }
    }
}

/// Merged view over every slot of the output channel.
pub struct SignalStream {
    slots: Vec<mpsc::Receiver<SignalRecord>>,
    /// Slot polled first on the next call, for fairness.
    next: usize,
}

impl SignalStream {
    /// Wait for the next signal from any slot.
    ///
    /// Returns `None` once every slot is closed and drained.
    pub async fn recv(&mut self) -> Option<SignalRecord> {
        poll_fn(|cx| self.poll_recv(cx)).await
    }

    pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<SignalRecord>> {
        let n = self.slots.len();
        let mut closed = 0;
        for offset in 0..n {
            let idx = (self.next + offset) % n;
            match self.slots[idx].poll_recv(cx) {
                Poll::Ready(Some(record)) => {
                    self.next = (idx + 1) % n;
                    return Poll::Ready(Some(record));
                }
                Poll::Ready(None) => closed += 1,
                Poll::Pending => {}
            }
        }
        if closed == n {
            Poll::Ready(None)
        } else {
            Poll::Pending
        }
    }

    /// Take a signal if one is ready, without waiting.
    pub fn try_recv(&mut self) -> Option<SignalRecord> {
        let n = self.slots.len();
        for offset in 0..n {
            let idx = (self.next + offset) % n;
            if let Ok(record) = self.slots[idx].try_recv() {
                self.next = (idx + 1) % n;
                return Some(record);
            }
        }
        None
    }

    /// Drain everything currently queued.
    pub fn drain(&mut self) -> Vec<SignalRecord> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
