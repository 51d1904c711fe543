//! Min-heap scheduler for delayed transitions.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

/// A pending timer addressing a transition by index.
///
/// Ordering is `(due_at, seq)` so simultaneous expirations pop in the order
/// they were armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Timer {
    due_at: Instant,
    seq: u64,
    transition: usize,
}

/// Manages timers for delayed transitions.
///
/// Invariant maintained by the automaton: the heap never holds a timer whose
/// transition's source state differs from the active state, except
/// transiently while a firing step runs.
#[derive(Debug, Default)]
pub struct Scheduler {
    timers: BinaryHeap<Reverse<Timer>>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms `transition` to fire after `delay`.
    pub fn arm(&mut self, transition: usize, delay: Duration) {
        let timer = Timer {
            due_at: Instant::now() + delay,
            seq: self.next_seq,
            transition,
        };
        self.next_seq += 1;
        self.timers.push(Reverse(timer));
    }

    /// Time until the earliest timer expires; zero when already past due,
    /// `None` when no timer is pending.
    pub fn next_timeout(&self) -> Option<Duration> {
        let now = Instant::now();
        self.timers
            .peek()
            .map(|Reverse(timer)| timer.due_at.saturating_duration_since(now))
    }

    /// Pops every timer due at or before `now`, in due-time order.
    pub fn pop_expired(&mut self, now: Instant) -> Vec<usize> {
        let mut expired = Vec::new();
        while let Some(&Reverse(top)) = self.timers.peek() {
            if top.due_at > now {
                break;
            }
            self.timers.pop();
            expired.push(top.transition);
        }
        expired
    }

    /// Drops every timer whose transition does not originate from the
    /// active state. Runs at every state entry.
    ///
    /// The heap has no ordered iteration, so this extracts everything,
    /// filters, and re-pushes the keepers.
    pub fn purge_for_state(&mut self, active: usize, src_of: impl Fn(usize) -> usize) {
        let kept: Vec<Reverse<Timer>> = self
            .timers
            .drain()
            .filter(|Reverse(timer)| src_of(timer.transition) == active)
            .collect();
        self.timers = kept.into();
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}
