//! Two-state flush scheduler for incoming events

use std::time::Duration;

/// Whether a flush timer is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatcherState {
    /// No flush scheduled
    Idle,
    /// A single flush timer is armed
    FlushScheduled,
}

/// What the caller must do after [`Batcher::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Arm the flush timer for this interval
    Arm(Duration),
    /// A timer is already armed (or nothing was queued)
    AlreadyScheduled,
}

/// Accumulates events between flushes.
///
/// At most one flush is outstanding at a time: only the `Idle -> FlushScheduled`
/// transition asks the caller to arm a timer. [`take_pending`] swaps the queue
/// for an empty one, so events arriving while a flush is processed land in the
/// next batch.
///
/// [`take_pending`]: Batcher::take_pending
#[derive(Debug)]
pub struct Batcher<T> {
    pending: Vec<T>,
    state: BatcherState,
    interval: Duration,
}

impl<T> Batcher<T> {
    pub fn new(interval: Duration) -> Self {
        Self { pending: Vec::new(), state: BatcherState::Idle, interval }
    }

    /// Queue a batch in arrival order.
    pub fn enqueue(&mut self, items: impl IntoIterator<Item = T>) -> Schedule {
        let before = self.pending.len();
        self.pending.extend(items);
        if self.pending.len() == before || self.state == BatcherState::FlushScheduled {
            return Schedule::AlreadyScheduled;
        }
        self.state = BatcherState::FlushScheduled;
        Schedule::Arm(self.interval)
    }

    /// Timer fired: take everything queued so far and return to `Idle`.
    pub fn take_pending(&mut self) -> Vec<T> {
        self.state = BatcherState::Idle;
        std::mem::take(&mut self.pending)
    }

    /// Capture stopped: take the non-empty tail, if any.
    pub fn drain_final(&mut self) -> Option<Vec<T>> {
        let tail = self.take_pending();
        (!tail.is_empty()).then_some(tail)
    }

    pub fn state(&self) -> BatcherState {
        self.state
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Change the cadence used for the next armed timer.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }
}
