//! Delayed tasks for a run loop.
//!
//! The loop has no timeout primitive of its own; callers that need a deadline
//! post a delayed task and race it against their watch. Tasks are kept as
//! (deadline, task) pairs and fired by the loop once their deadline passes.

use std::time::{Duration, Instant};

pub(crate) type LocalTask = Box<dyn FnOnce()>;

/// Pending delayed tasks, fired in deadline order.
pub(crate) struct TimerQueue {
    // (deadline, sequence, task); the sequence keeps equal deadlines FIFO.
    timers: Vec<(Instant, u64, LocalTask)>,
    next_sequence: u64,
}

impl TimerQueue {
    pub(crate) fn new() -> Self {
        Self {
            timers: Vec::new(),
            next_sequence: 0,
        }
    }

    /// Registers `task` to run once `deadline` is reached.
    pub(crate) fn register(&mut self, deadline: Instant, task: LocalTask) {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);

        self.timers.push((deadline, sequence, task));
    }

    /// Removes and returns every task whose deadline has passed, earliest
    /// first.
    pub(crate) fn take_expired(&mut self, now: Instant) -> Vec<LocalTask> {
        let mut expired = Vec::new();
        let mut index = 0;

        while index < self.timers.len() {
            if self.timers[index].0 <= now {
                expired.push(self.timers.swap_remove(index));
            } else {
                index += 1;
            }
        }

        expired.sort_by_key(|(deadline, sequence, _)| (*deadline, *sequence));
        expired.into_iter().map(|(_, _, task)| task).collect()
    }

    /// Time left until the earliest deadline, if any task is pending.
    pub(crate) fn next_remaining(&self, now: Instant) -> Option<Duration> {
        self.timers
            .iter()
            .map(|(deadline, _, _)| deadline.saturating_duration_since(now))
            .min()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.timers.clear();
    }
}
