//! Single-threaded timer queue driven by a virtual clock.
//!
//! Nothing here reads wall-clock time. The owner advances the clock
//! explicitly, draining due events one at a time with [`TimerQueue::pop_due`]
//! and finishing with [`TimerQueue::settle`]. While an event is being handled
//! the clock sits at that event's due time, so anything scheduled from the
//! handler is relative to when the event fired rather than to the end of the
//! advance window.

use std::{
    cmp::Reverse,
    collections::{
        BinaryHeap,
        HashMap,
    },
};

/// Milliseconds of virtual time.
pub type Millis = u64;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Entry<E> {
    event: E,
    period: Option<Millis>,
}

#[derive(Debug)]
pub struct TimerQueue<E> {
    now: Millis,
    next_id: u64,
    next_seq: u64,
    // (due, insertion sequence, timer id); cancelled ids are skipped lazily
    due: BinaryHeap<Reverse<(Millis, u64, u64)>>,
    entries: HashMap<u64, Entry<E>>,
}

impl<E> Default for TimerQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> TimerQueue<E> {
    pub fn new() -> Self {
        Self {
            now: 0,
            next_id: 0,
            next_seq: 0,
            due: BinaryHeap::new(),
            entries: HashMap::new(),
        }
    }

    pub fn now(&self) -> Millis {
        self.now
    }

    /// Number of live (not yet fired or cancelled) timers.
    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn schedule_once(&mut self, delay: Millis, event: E) -> TimerId {
        self.insert(delay, event, None)
    }

    /// Fires every `period` ms, first at `now + period`, until cancelled.
    pub fn schedule_every(&mut self, period: Millis, event: E) -> TimerId {
        let period = period.max(1);
        self.insert(period, event, Some(period))
    }

    /// Returns true if the timer was still live.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.entries.remove(&id.0).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.due.clear();
    }

    /// Moves the clock forward to `until` once every due event has been drained.
    pub fn settle(&mut self, until: Millis) {
        self.now = self.now.max(until);
    }

    fn insert(&mut self, delay: Millis, event: E, period: Option<Millis>) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, Entry { event, period });
        self.push(self.now.saturating_add(delay), id);
        TimerId(id)
    }

    fn push(&mut self, at: Millis, id: u64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.due.push(Reverse((at, seq, id)));
    }
}

impl<E: Clone> TimerQueue<E> {
    /// Pops the earliest event due at or before `until`, moving the clock to
    /// its due time. Periodic timers are re-armed before being returned.
    pub fn pop_due(&mut self, until: Millis) -> Option<(TimerId, E)> {
        loop {
            let &Reverse((at, _, id)) = self.due.peek()?;
            if at > until {
                return None;
            }
            self.due.pop();
            let Some(period) = self.entries.get(&id).map(|entry| entry.period) else {
                continue;
            };
            self.now = self.now.max(at);
            let event = match period {
                Some(period) => {
                    self.push(at.saturating_add(period), id);
                    self.entries.get(&id).map(|entry| entry.event.clone())
                }
                None => self.entries.remove(&id).map(|entry| entry.event),
            };
            if let Some(event) = event {
                return Some((TimerId(id), event));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    fn drain(queue: &mut TimerQueue<&'static str>, until: Millis) -> Vec<(Millis, &'static str)> {
        let mut fired = Vec::new();
        while let Some((_, event)) = queue.pop_due(until) {
            fired.push((queue.now(), event));
        }
        queue.settle(until);
        fired
    }

    #[test]
    fn sut__when_advancing_then_events_fire_in_due_then_insertion_order() {
        // given
        let mut queue = TimerQueue::new();
        queue.schedule_once(300, "late");
        queue.schedule_once(100, "first");
        queue.schedule_once(100, "second");

        // when
        let fired = drain(&mut queue, 1_000);

        // then
        assert_eq!(fired, vec![(100, "first"), (100, "second"), (300, "late")]);
        assert_eq!(queue.now(), 1_000);
        assert!(queue.is_empty());
    }

    #[test]
    fn sut__when_periodic_timer_runs_then_it_rearms_until_cancelled() {
        // given
        let mut queue = TimerQueue::new();
        let tick = queue.schedule_every(100, "tick");
        queue.schedule_once(250, "deadline");

        // when
        let fired = drain(&mut queue, 250);
        queue.cancel(tick);
        let after_cancel = drain(&mut queue, 1_000);

        // then
        assert_eq!(fired, vec![(100, "tick"), (200, "tick"), (250, "deadline")]);
        assert!(after_cancel.is_empty());
    }

    #[test]
    fn sut__when_event_not_yet_due_then_clock_stops_at_window_end() {
        // given
        let mut queue = TimerQueue::new();
        queue.schedule_once(500, "later");

        // when
        let fired = drain(&mut queue, 499);

        // then
        assert!(fired.is_empty());
        assert_eq!(queue.now(), 499);
        assert_eq!(drain(&mut queue, 500), vec![(500, "later")]);
    }

    #[test]
    fn sut__when_cleared_then_nothing_fires() {
        // given
        let mut queue = TimerQueue::new();
        queue.schedule_every(10, "tick");
        queue.schedule_once(20, "once");

        // when
        queue.clear();

        // then
        assert!(drain(&mut queue, 10_000).is_empty());
        assert_eq!(queue.pending(), 0);
    }
}
