//! Handle resolution and cancellation
//!
//! An [`EventId`] packs a slot index with the slot generation at the time
//! the event was posted. Freeing a slot bumps its generation, so ids of
//! fired or cancelled events stop resolving even after the slot is reused.

use evq_core::{Duration, EventId, Tick};
use evq_mem::{SlotHandle, SlotPool};

use crate::lifecycle::QueueState;
use crate::queue::{EventRecord, EventState};

/// Map `id` to the slot of the live event it was issued for
pub fn resolve<T, const N: usize>(pool: &SlotPool<T, N>, id: EventId) -> Option<u16> {
    if !id.is_valid() {
        return None;
    }
    let handle = SlotHandle::from_id(id);
    pool.get(handle).map(|_| handle.index())
}

/// Outcome of a cancel request
pub(crate) enum Cancellation<const W: usize> {
    /// Unlinked and freed; the record is dropped outside the critical section
    Removed(EventRecord<W>),
    /// Executing periodic event that will not be re-armed
    Stopped,
    /// Nothing to cancel
    Unchanged,
}

impl<const N: usize, const W: usize> QueueState<N, W> {
    pub(crate) fn cancel(&mut self, id: EventId) -> Cancellation<W> {
        let Some(index) = resolve(&self.pool, id) else {
            return Cancellation::Unchanged;
        };
        let Some(record) = self.pool.get_index_mut(index) else {
            return Cancellation::Unchanged;
        };
        let periodic = record.period.is_some();
        let state = record.state;

        match state {
            EventState::Queued => {
                self.pending.remove(&mut self.pool, index);
            }
            EventState::Batched => {
                self.batch.remove(&mut self.pool, index);
            }
            EventState::Running { cancelled: false } if periodic => {
                record.state = EventState::Running { cancelled: true };
                return Cancellation::Stopped;
            }
            // A one-shot in flight is freed by the dispatcher anyway
            EventState::Running { .. } => return Cancellation::Unchanged,
        }

        match self.pool.free(index) {
            Some(record) => Cancellation::Removed(record),
            None => Cancellation::Unchanged,
        }
    }

    pub(crate) fn time_left(&self, id: EventId, now: Tick) -> Option<Duration> {
        let record = self.pool.get_index(resolve(&self.pool, id)?)?;
        match record.state {
            EventState::Queued | EventState::Batched => Some(record.deadline.saturating_until(now)),
            EventState::Running { cancelled: false } => Some(Duration::ZERO),
            EventState::Running { cancelled: true } => None,
        }
    }
}
