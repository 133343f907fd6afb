//! Timer service abstraction.
//!
//! The core never touches a wall clock or OS timer API directly: it schedules and cancels
//! [`TimerHandle`](TimerHandle)s against a [`TimerWheel`](TimerWheel), and the caller's event
//! loop drives time forward by calling [`TimerWheel::poll`](TimerWheel::poll) and replaying
//! fired handles back into the controller. This mirrors the slot-keyed timer wheel pattern
//! (schedule/cancel/poll-for-fired, one slot per owner+kind) rather than raw callback pointers,
//! so cancelling a handle can never race with a pointer that outlived its lchan.
//!
//! ## Available Types
//! - [`TimerHandle`](TimerHandle) - owner + kind, the cancellation key.
//! - [`TimerWheel`](TimerWheel) - the scheduler itself.

use std::collections::HashMap;

pub use embassy_time::{Duration, Instant};

/// What an lchan (or BTS, for paging) owns the timer on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerOwner {
    Lchan { trx_nr: u8, ts_nr: u8, idx: u8 },
    Bts(u8),
}

/// Which guard timer this is. Activation and deactivation share the same 4-second watchdog
/// duration but are tracked as distinct slots so invariant 3 (at most one activation timer and
/// one release timer per lchan) is a property of the key space, not of caller discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerKind {
    Activation,
    Deactivation,
    T3101,
    T3109,
    T3111,
    Error,
    PagingPace,
}

/// Opaque, copyable scheduling key. Carries its owner rather than a raw pointer, so a handle
/// captured before a `BROKEN` transition is still safe to hold (and to ignore) afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerHandle {
    pub owner: TimerOwner,
    pub kind: TimerKind,
}

impl TimerHandle {
    pub fn lchan(trx_nr: u8, ts_nr: u8, idx: u8, kind: TimerKind) -> Self {
        TimerHandle {
            owner: TimerOwner::Lchan { trx_nr, ts_nr, idx },
            kind,
        }
    }

    pub fn bts(bts_nr: u8, kind: TimerKind) -> Self {
        TimerHandle {
            owner: TimerOwner::Bts(bts_nr),
            kind,
        }
    }
}

/// Scheduled one-shot callbacks with cancel. Scheduling a handle that is already pending
/// replaces its deadline (this is how "scheduling either cancels any prior same-kind timer"
/// is implemented, not as a separate cancel-then-schedule call at every use site).
#[derive(Debug, Default)]
pub struct TimerWheel {
    deadlines: HashMap<TimerHandle, Instant>,
}

impl TimerWheel {
    pub fn new() -> Self {
        TimerWheel::default()
    }

    /// Arm `handle` to fire at `now + delay`, replacing any existing deadline for the same
    /// handle.
    pub fn schedule(&mut self, handle: TimerHandle, now: Instant, delay: Duration) {
        self.deadlines.insert(handle, now + delay);
    }

    pub fn cancel(&mut self, handle: TimerHandle) {
        self.deadlines.remove(&handle);
    }

    pub fn pending(&self, handle: TimerHandle) -> bool {
        self.deadlines.contains_key(&handle)
    }

    /// Remove and return every handle whose deadline is at or before `now`. The caller is
    /// expected to replay each into the controller; firing never happens "mid-message" per the
    /// concurrency model, only between deliveries.
    pub fn poll(&mut self, now: Instant) -> Vec<TimerHandle> {
        let fired: Vec<TimerHandle> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(handle, _)| *handle)
            .collect();
        for handle in &fired {
            self.deadlines.remove(handle);
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(idx: u8, kind: TimerKind) -> TimerHandle {
        TimerHandle::lchan(0, 0, idx, kind)
    }

    #[test]
    fn schedule_then_poll_fires_once() {
        let mut wheel = TimerWheel::new();
        let t0 = Instant::from_secs(0);
        wheel.schedule(h(0, TimerKind::Activation), t0, Duration::from_secs(4));
        assert!(wheel.pending(h(0, TimerKind::Activation)));
        assert!(wheel.poll(t0 + Duration::from_secs(3)).is_empty());
        let fired = wheel.poll(t0 + Duration::from_secs(4));
        assert_eq!(fired, vec![h(0, TimerKind::Activation)]);
        assert!(!wheel.pending(h(0, TimerKind::Activation)));
    }

    #[test]
    fn rescheduling_same_handle_replaces_deadline() {
        let mut wheel = TimerWheel::new();
        let t0 = Instant::from_secs(0);
        wheel.schedule(h(0, TimerKind::T3109), t0, Duration::from_secs(5));
        wheel.schedule(h(0, TimerKind::T3109), t0, Duration::from_secs(9));
        assert!(wheel.poll(t0 + Duration::from_secs(5)).is_empty());
        assert_eq!(wheel.poll(t0 + Duration::from_secs(9)).len(), 1);
    }

    #[test]
    fn cancel_removes_pending_timer() {
        let mut wheel = TimerWheel::new();
        let t0 = Instant::from_secs(0);
        wheel.schedule(h(1, TimerKind::T3111), t0, Duration::from_secs(2));
        wheel.cancel(h(1, TimerKind::T3111));
        assert!(!wheel.pending(h(1, TimerKind::T3111)));
        assert!(wheel.poll(t0 + Duration::from_secs(2)).is_empty());
    }

    #[test]
    fn distinct_kinds_on_same_owner_are_independent() {
        let mut wheel = TimerWheel::new();
        let t0 = Instant::from_secs(0);
        wheel.schedule(h(0, TimerKind::Activation), t0, Duration::from_secs(4));
        wheel.schedule(h(0, TimerKind::T3101), t0, Duration::from_secs(10));
        wheel.cancel(h(0, TimerKind::Activation));
        assert!(!wheel.pending(h(0, TimerKind::Activation)));
        assert!(wheel.pending(h(0, TimerKind::T3101)));
    }
}
