//! Cancellable timer arena keyed by purpose.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every delayed callback in the session (reconnect delay, status resync
//! follow-up, capture countdown tick, command timeouts, frame-rate sampling)
//! is armed here instead of with a free-standing timeout. Drivers ask for
//! `next_deadline()`, sleep until then, and feed `due(now)` back into the
//! session.
//!
//! DESIGN
//! ======
//! At most one timer exists per [`TimerPurpose`]. Arming a purpose again
//! supersedes the previous timer, and the old [`TimerHandle`] goes stale: it
//! can no longer cancel anything and will never be returned from `due`.
//! Handles carry a generation so consumers can tell a live timer from a stale
//! one that was superseded between arming and firing.
//!
//! Time is caller-supplied integer milliseconds; the arena never reads a
//! clock.

#[cfg(test)]
#[path = "timers_test.rs"]
mod timers_test;

use std::collections::HashMap;

use crate::net::gate::CommandKind;

/// What a timer is for. One live timer per purpose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerPurpose {
    Reconnect,
    StatusResync,
    CaptureTick,
    CommandTimeout(CommandKind),
    FpsSample,
}

/// Identifies one arming of a timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerHandle {
    pub purpose: TimerPurpose,
    generation: u64,
}

impl TimerHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Clone, Copy, Debug)]
struct Armed {
    generation: u64,
    deadline: u64,
    period: Option<u64>,
}

#[derive(Debug, Default)]
pub struct TimerArena {
    next_generation: u64,
    armed: HashMap<TimerPurpose, Armed>,
}

impl TimerArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a one-shot timer firing at `now + delay_ms`, superseding any timer
    /// with the same purpose.
    pub fn schedule(&mut self, purpose: TimerPurpose, now: u64, delay_ms: u64) -> TimerHandle {
        self.arm(purpose, now.saturating_add(delay_ms), None)
    }

    /// Arm a repeating timer firing every `period_ms`, first at `now + period_ms`.
    pub fn schedule_repeating(&mut self, purpose: TimerPurpose, now: u64, period_ms: u64) -> TimerHandle {
        let period_ms = period_ms.max(1);
        self.arm(purpose, now.saturating_add(period_ms), Some(period_ms))
    }

    fn arm(&mut self, purpose: TimerPurpose, deadline: u64, period: Option<u64>) -> TimerHandle {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.armed.insert(purpose, Armed { generation, deadline, period });
        TimerHandle { purpose, generation }
    }

    /// Cancel whatever timer is armed for `purpose`.
    pub fn cancel(&mut self, purpose: TimerPurpose) -> bool {
        self.armed.remove(&purpose).is_some()
    }

    /// Cancel the timer only if `handle` is still its current arming.
    pub fn cancel_handle(&mut self, handle: TimerHandle) -> bool {
        if !self.is_live(handle) {
            return false;
        }
        self.armed.remove(&handle.purpose).is_some()
    }

    pub fn is_armed(&self, purpose: TimerPurpose) -> bool {
        self.armed.contains_key(&purpose)
    }

    /// True while `handle` has been neither fired (one-shot), cancelled nor superseded.
    pub fn is_live(&self, handle: TimerHandle) -> bool {
        self.armed
            .get(&handle.purpose)
            .is_some_and(|armed| armed.generation == handle.generation)
    }

    pub fn deadline(&self, purpose: TimerPurpose) -> Option<u64> {
        self.armed.get(&purpose).map(|armed| armed.deadline)
    }

    /// Earliest deadline across all armed timers.
    pub fn next_deadline(&self) -> Option<u64> {
        self.armed.values().map(|armed| armed.deadline).min()
    }

    pub fn len(&self) -> usize {
        self.armed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }

    /// Collect every timer whose deadline is at or before `now`, earliest first.
    ///
    /// One-shot timers are disarmed; repeating timers advance by one period
    /// (so a late caller sees each missed period on successive calls).
    pub fn due(&mut self, now: u64) -> Vec<TimerHandle> {
        let mut fired: Vec<(u64, TimerHandle)> = Vec::new();
        for (purpose, armed) in &mut self.armed {
            if armed.deadline > now {
                continue;
            }
            fired.push((armed.deadline, TimerHandle { purpose: *purpose, generation: armed.generation }));
            if let Some(period) = armed.period {
                armed.deadline = armed.deadline.saturating_add(period);
            }
        }
        self.armed
            .retain(|_, armed| armed.period.is_some() || armed.deadline > now);

        fired.sort_by_key(|(deadline, handle)| (*deadline, handle.generation));
        fired.into_iter().map(|(_, handle)| handle).collect()
    }
}
