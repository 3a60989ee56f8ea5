//! Deadline-ordered event lists
//!
//! Events live in a [`SlotPool`]; lists only thread slot indices through
//! the [`Link`] stored inside each record. The same list type serves as
//! the deadline-sorted pending queue and as the FIFO dispatch batch.

use evq_core::{Duration, Tick};
use evq_mem::{Callback, SlotPool};

/// Where a live event currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventState {
    /// Waiting in the pending list for its deadline
    Queued,
    /// Found due and waiting in the dispatch batch
    Batched,
    /// Callback taken out and executing
    Running {
        /// Cancelled while executing; the event is not re-armed
        cancelled: bool,
    },
}

/// Intrusive list link
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Link {
    prev: Option<u16>,
    next: Option<u16>,
    linked: bool,
}

impl Link {
    /// Check if the owning record is on a list
    pub const fn is_linked(&self) -> bool {
        self.linked
    }
}

/// Records that can be threaded on a [`DeadlineList`]
pub trait Linked {
    /// Absolute tick the record is ordered by
    fn deadline(&self) -> Tick;

    /// Link of the record
    fn link(&self) -> &Link;

    /// Mutable link of the record
    fn link_mut(&mut self) -> &mut Link;
}

/// One scheduled unit of deferred work
pub struct EventRecord<const W: usize> {
    /// Work to run; null while the callback is executing
    pub callback: Callback<W>,
    /// Absolute tick of the next firing
    pub deadline: Tick,
    /// Re-arm interval, `None` for one-shot events
    pub period: Option<Duration>,
    /// Lifecycle state
    pub state: EventState,
    link: Link,
}

impl<const W: usize> EventRecord<W> {
    /// Create a queued record
    pub fn new(callback: Callback<W>, deadline: Tick, period: Option<Duration>) -> Self {
        Self {
            callback,
            deadline,
            period,
            state: EventState::Queued,
            link: Link::default(),
        }
    }
}

impl<const W: usize> Linked for EventRecord<W> {
    fn deadline(&self) -> Tick {
        self.deadline
    }

    fn link(&self) -> &Link {
        &self.link
    }

    fn link_mut(&mut self) -> &mut Link {
        &mut self.link
    }
}

/// Doubly-linked list of slot indices
///
/// [`insert`](Self::insert) keeps the list sorted by wrap-aware deadline,
/// placing a record after every record with the same deadline.
/// [`push_back`](Self::push_back) ignores deadlines. A record is on at
/// most one list at a time; callers track which one.
#[derive(Debug, Default)]
pub struct DeadlineList {
    head: Option<u16>,
    tail: Option<u16>,
    len: usize,
}

impl DeadlineList {
    /// Create an empty list
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Number of linked records
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if no record is linked
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Index of the first record
    pub fn head(&self) -> Option<u16> {
        self.head
    }

    /// Link `index` in deadline order
    ///
    /// Returns `true` if the record became the new head.
    pub fn insert<T: Linked, const N: usize>(
        &mut self,
        pool: &mut SlotPool<T, N>,
        index: u16,
    ) -> bool {
        let Some(deadline) = pool.get_index(index).map(Linked::deadline) else {
            return false;
        };

        // Walk back from the tail: appends are the common case
        let mut after = self.tail;
        while let Some(candidate) = after {
            match pool.get_index(candidate) {
                Some(node) if node.deadline().is_after(deadline) => after = node.link().prev,
                _ => break,
            }
        }

        self.link_after(pool, index, after)
    }

    /// Link `index` at the tail regardless of its deadline
    pub fn push_back<T: Linked, const N: usize>(&mut self, pool: &mut SlotPool<T, N>, index: u16) {
        let tail = self.tail;
        self.link_after(pool, index, tail);
    }

    fn link_after<T: Linked, const N: usize>(
        &mut self,
        pool: &mut SlotPool<T, N>,
        index: u16,
        prev: Option<u16>,
    ) -> bool {
        let next = match prev {
            Some(prev) => pool.get_index(prev).and_then(|node| node.link().next),
            None => self.head,
        };

        match pool.get_index_mut(index) {
            Some(node) if !node.link().linked => {
                *node.link_mut() = Link {
                    prev,
                    next,
                    linked: true,
                };
            }
            _ => return false,
        }

        match prev.and_then(|prev| pool.get_index_mut(prev)) {
            Some(node) => node.link_mut().next = Some(index),
            None => self.head = Some(index),
        }
        match next.and_then(|next| pool.get_index_mut(next)) {
            Some(node) => node.link_mut().prev = Some(index),
            None => self.tail = Some(index),
        }

        self.len += 1;
        prev.is_none()
    }

    /// Unlink `index`; a record that is not linked is left alone
    pub fn remove<T: Linked, const N: usize>(
        &mut self,
        pool: &mut SlotPool<T, N>,
        index: u16,
    ) -> bool {
        let link = match pool.get_index_mut(index) {
            Some(node) if node.link().linked => core::mem::take(node.link_mut()),
            _ => return false,
        };

        match link.prev.and_then(|prev| pool.get_index_mut(prev)) {
            Some(node) => node.link_mut().next = link.next,
            None => self.head = link.next,
        }
        match link.next.and_then(|next| pool.get_index_mut(next)) {
            Some(node) => node.link_mut().prev = link.prev,
            None => self.tail = link.prev,
        }

        self.len -= 1;
        true
    }

    /// Deadline of the first record
    pub fn peek_earliest<T: Linked, const N: usize>(&self, pool: &SlotPool<T, N>) -> Option<Tick> {
        self.head
            .and_then(|head| pool.get_index(head))
            .map(Linked::deadline)
    }

    /// Unlink and return the first record
    pub fn pop_front<T: Linked, const N: usize>(&mut self, pool: &mut SlotPool<T, N>) -> Option<u16> {
        let head = self.head?;
        self.remove(pool, head);
        Some(head)
    }

    /// Unlink and return the first record if it is due at `now`
    pub fn pop_if_due<T: Linked, const N: usize>(
        &mut self,
        pool: &mut SlotPool<T, N>,
        now: Tick,
    ) -> Option<u16> {
        if self.peek_earliest(pool)?.is_due(now) {
            self.pop_front(pool)
        } else {
            None
        }
    }
}
