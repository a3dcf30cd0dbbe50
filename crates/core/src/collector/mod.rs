//! Per-subject cursors over a chronologically ordered event list.

use std::{sync::Arc, time::Duration};

use crate::sequence::Timed;

/// Cursor over an immutable, time-ordered list of events.
///
/// The event list is shared (`Arc<[Timed<T>]>`) and never mutated; the only
/// state is `index`, which points at the next unfired event. While playback
/// time increases the index only grows. After a seek the index is rebuilt by
/// binary search in [`EventCollector::reset`].
#[derive(Debug, Clone)]
pub struct EventCollector<T> {
    events: Arc<[Timed<T>]>,
    index: usize,
}

impl<T> EventCollector<T> {
    /// Builds a collector. `events` must already be ordered by time; ties keep
    /// the order they are given in.
    pub fn new(events: impl Into<Arc<[Timed<T>]>>) -> Self {
        let events = events.into();
        debug_assert!(
            events.windows(2).all(|pair| pair[0].time <= pair[1].time),
            "collector events must be ordered by time"
        );
        Self { events, index: 0 }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Moves the cursor past every event whose time is `<= time` and returns
    /// the events passed by this call, in list order.
    pub fn advance_to(&mut self, time: Duration) -> &[Timed<T>] {
        let start = self.index;
        let remaining = &self.events[start..];
        let fired = remaining.partition_point(|event| event.time <= time);
        self.index = start + fired;
        &self.events[start..self.index]
    }

    /// Like [`Self::advance_to`], but only returns the latest event passed.
    pub fn advance_one(&mut self, time: Duration) -> Option<&Timed<T>> {
        self.advance_to(time).last()
    }

    /// Next unfired event.
    pub fn peek(&self) -> Option<&Timed<T>> {
        self.events.get(self.index)
    }

    /// Most recently fired event.
    pub fn prev(&self) -> Option<&Timed<T>> {
        self.index.checked_sub(1).and_then(|index| self.events.get(index))
    }

    /// Repositions the cursor at the first event at or after `time`. Used after
    /// a seek in either direction.
    pub fn reset(&mut self, time: Duration) {
        self.index = self.events.partition_point(|event| event.time < time);
    }

    /// Number of events fired so far.
    pub fn position(&self) -> usize {
        self.index
    }

    pub fn events(&self) -> &[Timed<T>] {
        &self.events
    }

    pub fn is_exhausted(&self) -> bool {
        self.index >= self.events.len()
    }

    /// Time until the next event, or `None` when nothing is left (an
    /// unbounded gap).
    pub fn time_until_next(&self, time: Duration) -> Option<Duration> {
        self.peek().map(|next| next.time.saturating_sub(time))
    }

    /// Time since the last fired event.
    pub fn time_since_prev(&self, time: Duration) -> Option<Duration> {
        self.prev().map(|prev| time.saturating_sub(prev.time))
    }
}

impl<T> Default for EventCollector<T> {
    fn default() -> Self {
        Self::empty()
    }
}
