#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deadline heap of one-shot timers with cancellation tokens.
//!
//! Owners schedule a payload for a future [`Timestamp`] and receive a
//! [`TimerToken`]. Cancelling the token guarantees the payload is never
//! delivered; rescheduling is expressed as cancel followed by a new schedule.

use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap},
};

use defence_in_depth_core::Timestamp;

/// Handle identifying a scheduled timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

/// Collection of pending one-shot timers ordered by deadline.
///
/// Timers sharing a deadline fire in the order they were scheduled.
#[derive(Debug)]
pub struct Scheduler<T> {
    heap: BinaryHeap<Reverse<(Timestamp, u64)>>,
    pending: HashMap<u64, Pending<T>>,
    next_sequence: u64,
}

#[derive(Debug)]
struct Pending<T> {
    due: Timestamp,
    payload: T,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            pending: HashMap::new(),
            next_sequence: 0,
        }
    }
}

impl<T> Scheduler<T> {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `payload` to become due at `due`.
    pub fn schedule(&mut self, due: Timestamp, payload: T) -> TimerToken {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.heap.push(Reverse((due, sequence)));
        let _ = self.pending.insert(sequence, Pending { due, payload });
        TimerToken(sequence)
    }

    /// Revokes a pending timer, returning its payload if it had not fired.
    pub fn cancel(&mut self, token: TimerToken) -> Option<T> {
        self.pending.remove(&token.0).map(|pending| pending.payload)
    }

    /// Reports whether the timer is still waiting to fire.
    #[must_use]
    pub fn is_pending(&self, token: TimerToken) -> bool {
        self.pending.contains_key(&token.0)
    }

    /// Deadline of a pending timer.
    #[must_use]
    pub fn due_at(&self, token: TimerToken) -> Option<Timestamp> {
        self.pending.get(&token.0).map(|pending| pending.due)
    }

    /// Earliest deadline among pending timers.
    #[must_use]
    pub fn next_due(&self) -> Option<Timestamp> {
        self.pending.values().map(|pending| pending.due).min()
    }

    /// Number of timers still pending.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Reports whether no timers are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Removes and returns the earliest timer whose deadline is at or before `now`.
    pub fn pop_due(&mut self, now: Timestamp) -> Option<(TimerToken, T)> {
        while let Some(Reverse((due, sequence))) = self.heap.peek().copied() {
            if due > now {
                return None;
            }
            let _ = self.heap.pop();
            if let Some(pending) = self.pending.remove(&sequence) {
                return Some((TimerToken(sequence), pending.payload));
            }
        }
        None
    }

    /// Moves every timer due at or before `now` into `out`, in firing order.
    pub fn drain_due(&mut self, now: Timestamp, out: &mut Vec<(TimerToken, T)>) {
        while let Some(fired) = self.pop_due(now) {
            out.push(fired);
        }
    }

    /// Cancels every pending timer.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_deadline_then_schedule_order() {
        let mut scheduler = Scheduler::new();
        let _ = scheduler.schedule(Timestamp::from_secs(5), "late");
        let _ = scheduler.schedule(Timestamp::from_secs(2), "first");
        let _ = scheduler.schedule(Timestamp::from_secs(2), "second");

        let mut fired = Vec::new();
        scheduler.drain_due(Timestamp::from_secs(3), &mut fired);
        let payloads: Vec<_> = fired.into_iter().map(|(_, payload)| payload).collect();
        assert_eq!(payloads, vec!["first", "second"]);
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.next_due(), Some(Timestamp::from_secs(5)));
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut scheduler = Scheduler::new();
        let token = scheduler.schedule(Timestamp::from_secs(1), 7_u32);
        assert!(scheduler.is_pending(token));
        assert_eq!(scheduler.cancel(token), Some(7));
        assert_eq!(scheduler.cancel(token), None);
        assert!(scheduler.pop_due(Timestamp::from_secs(100)).is_none());
        assert!(scheduler.is_empty());
    }

    #[test]
    fn rescheduling_moves_the_deadline() {
        let mut scheduler = Scheduler::new();
        let token = scheduler.schedule(Timestamp::from_secs(10), ());
        let _ = scheduler.cancel(token);
        let moved = scheduler.schedule(Timestamp::from_secs(25), ());

        assert!(scheduler.pop_due(Timestamp::from_secs(10)).is_none());
        assert_eq!(scheduler.due_at(moved), Some(Timestamp::from_secs(25)));
        let (fired, ()) = scheduler
            .pop_due(Timestamp::from_secs(25))
            .expect("rescheduled timer fires");
        assert_eq!(fired, moved);
    }

    #[test]
    fn clear_drops_everything() {
        let mut scheduler = Scheduler::new();
        let token = scheduler.schedule(Timestamp::ZERO, ());
        scheduler.clear();
        assert!(!scheduler.is_pending(token));
        assert!(scheduler.pop_due(Timestamp::from_secs(1)).is_none());
    }
}
