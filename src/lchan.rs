//! lchan state machine. States `NONE -> ACT_REQ -> ACTIVE -> REL_REQ -> NONE` with the
//! `REL_ERR` and `BROKEN` side branches, grounded in `rsl_lchan_set_state`, `do_lchan_free`,
//! `lchan_act_tmr_cb`, `lchan_deact_tmr_cb`, `error_timeout_cb`, `t3101_expired`,
//! `t3111_expired` and `t3109_expired`.
//!
//! ## Available Functions
//! - [`set_state`](set_state) - the single, idempotent state setter every transition below
//!   goes through.
//! - [`on_chan_activ_ack`](on_chan_activ_ack), [`on_chan_activ_nack`](on_chan_activ_nack) -
//!   `ACT_REQ` exits.
//! - [`on_rf_chan_rel`](on_rf_chan_rel), [`on_rf_chan_rel_ack`](on_rf_chan_rel_ack) - release
//!   entry/exit.
//! - the `*_expired` functions - watchdog and guard-timer callbacks.

use crate::chan_request::immediate_assign_cmd;
use crate::config::{ACT_DEACT_WATCHDOG_SECS, BtsTimers, ERROR_TIMER_EXTRA_SECS};
use crate::model::{Lchan, LchanState};
use crate::release::{self, ReleaseMode};
use crate::signal::{Event, EventSink};
use crate::timer::{Duration, Instant, TimerHandle, TimerKind, TimerWheel};
use crate::vendor::VendorProfile;

/// CHAN ACTIV NACK cause meaning "resource already active and allocated" — the one NACK cause
/// that routes to `REL_REQ` instead of `BROKEN`.
pub const ALR_ACTV_ALLOC: u8 = 0x01;

fn handle(lchan: &Lchan, kind: TimerKind) -> TimerHandle {
    TimerHandle::lchan(lchan.trx_nr, lchan.ts_nr, lchan.idx, kind)
}

/// Set `lchan.state`, logging the transition. Applying the same state twice is a no-op beyond
/// the (idempotent) log line, satisfying testable property 8.
pub fn set_state(lchan: &mut Lchan, state: LchanState) {
    if lchan.state == state {
        log::debug!("{} state {:?} -> {:?} (no-op)", lchan.name(), lchan.state, state);
        return;
    }
    log::debug!("{} state {:?} -> {:?}", lchan.name(), lchan.state, state);
    lchan.state = state;
}

/// Transition into `ACT_REQ` and arm the activation watchdog. Invariant 3 (at most one
/// activation timer at a time) holds because scheduling the same handle replaces its deadline.
pub fn enter_act_req(lchan: &mut Lchan, wheel: &mut TimerWheel, now: Instant) {
    set_state(lchan, LchanState::ActReq);
    let act = handle(lchan, TimerKind::Activation);
    wheel.schedule(act, now, Duration::from_secs(ACT_DEACT_WATCHDOG_SECS as u64));
    lchan.act_timer = Some(act);
}

/// `CHAN ACTIV ACK`: cancel the activation watchdog, become `ACTIVE`, and if a RACH request is
/// still pending, emit exactly one `IMMEDIATE ASSIGN` and clear `rqd_ref` (testable property
/// 4). Returns the outbound messages to enqueue (zero or one).
pub fn on_chan_activ_ack(
    lchan: &mut Lchan,
    wheel: &mut TimerWheel,
    now: Instant,
    timers: &BtsTimers,
    vendor: &VendorProfile,
    sink: &mut dyn EventSink,
) -> Vec<Vec<u8>> {
    wheel.cancel(handle(lchan, TimerKind::Activation));
    lchan.act_timer = None;
    set_state(lchan, LchanState::Active);
    sink.notify(Event::LchanActivateAck {
        trx_nr: lchan.trx_nr,
        ts_nr: lchan.ts_nr,
        idx: lchan.idx,
    });

    let mut out = Vec::new();
    if let Some(pending) = lchan.pending.take() {
        out.push(immediate_assign_cmd(lchan, &pending, vendor));
        let t3101 = handle(lchan, TimerKind::T3101);
        wheel.schedule(t3101, now, Duration::from_secs(timers.t3101_secs as u64));
        lchan.t3101 = Some(t3101);
    }
    out
}

/// `CHAN ACTIV NACK`: `ALR_ACTV_ALLOC` routes to `REL_REQ` (the caller should follow up with
/// the release flow); any other cause marks the lchan `BROKEN`.
pub fn on_chan_activ_nack(
    lchan: &mut Lchan,
    wheel: &mut TimerWheel,
    cause: u8,
    sink: &mut dyn EventSink,
) {
    wheel.cancel(handle(lchan, TimerKind::Activation));
    lchan.act_timer = None;
    lchan.error_cause = Some(cause);
    sink.notify(Event::LchanActivateNack {
        trx_nr: lchan.trx_nr,
        ts_nr: lchan.ts_nr,
        idx: lchan.idx,
        cause,
    });
    if cause == ALR_ACTV_ALLOC {
        set_state(lchan, LchanState::RelReq);
    } else {
        set_state(lchan, LchanState::Broken);
    }
}

pub fn on_activation_watchdog_expired(lchan: &mut Lchan) {
    log::error!("{} activation watchdog expired", lchan.name());
    set_state(lchan, LchanState::Broken);
}

pub fn on_deactivation_watchdog_expired(lchan: &mut Lchan) {
    log::error!("{} deactivation watchdog expired", lchan.name());
    set_state(lchan, LchanState::Broken);
}

/// Result of entering the release flow: messages to send plus whether the lchan ended up in
/// the error branch.
pub struct ReleaseOutcome {
    pub messages: Vec<Vec<u8>>,
}

/// `RF CHAN REL` entry actions. `error == true` is the CONN FAIL / T200 / T3109 path: cancel
/// T3109, optionally deactivate SACCH, sweep every SAPI with `LOCAL_END`, enter `REL_ERR`, and
/// arm the error timer at `T3111 + 2s` plus the deactivation watchdog. `error == false` only
/// arms the deactivation watchdog (the normal path has already driven SAPIs to `Unused` and
/// started T3111 itself, see [`crate::release`]).
pub fn on_rf_chan_rel(
    lchan: &mut Lchan,
    wheel: &mut TimerWheel,
    now: Instant,
    timers: &BtsTimers,
    error: bool,
) -> ReleaseOutcome {
    let mut messages = Vec::new();
    if error {
        wheel.cancel(handle(lchan, TimerKind::T3109));
        lchan.t3109 = None;
        if lchan.sacch_deactivate_pending {
            messages.push(release::deactivate_sacch(lchan));
            lchan.sacch_deactivate_pending = false;
        }
        let (release_msgs, _any_active) =
            release::release_sapis_from(lchan, 0, ReleaseMode::LocalEnd);
        messages.extend(release_msgs);
        set_state(lchan, LchanState::RelErr);

        let err_timer = handle(lchan, TimerKind::Error);
        let dur = Duration::from_secs((timers.t3111_secs + ERROR_TIMER_EXTRA_SECS) as u64);
        wheel.schedule(err_timer, now, dur);
        lchan.error_timer = Some(err_timer);
    }

    let deact = handle(lchan, TimerKind::Deactivation);
    wheel.schedule(deact, now, Duration::from_secs(ACT_DEACT_WATCHDOG_SECS as u64));

    messages.push(release::rf_chan_rel(lchan, error));
    ReleaseOutcome { messages }
}

/// `RF CHAN REL ACK`: cancel the activation watchdog and T3111; a `BROKEN` lchan stays
/// `BROKEN` (logged, no transition — late ACKs are recognised, not acted on). Otherwise
/// transition to `NONE`; the caller is responsible for returning the lchan to the allocator.
pub fn on_rf_chan_rel_ack(lchan: &mut Lchan, wheel: &mut TimerWheel) {
    wheel.cancel(handle(lchan, TimerKind::Activation));
    wheel.cancel(handle(lchan, TimerKind::T3111));
    lchan.act_timer = None;
    lchan.t3111 = None;
    if lchan.state == LchanState::Broken {
        log::warn!("{} RF CHAN REL ACK received while BROKEN; ignoring", lchan.name());
        return;
    }
    set_state(lchan, LchanState::None);
}

pub fn on_t3101_expired(lchan: &mut Lchan, wheel: &mut TimerWheel, now: Instant, timers: &BtsTimers) -> ReleaseOutcome {
    lchan.t3101 = None;
    lchan.sacch_deactivate_pending = true;
    on_rf_chan_rel(lchan, wheel, now, timers, true)
}

pub fn on_t3109_expired(lchan: &mut Lchan, wheel: &mut TimerWheel, now: Instant, timers: &BtsTimers) -> ReleaseOutcome {
    lchan.t3109 = None;
    on_rf_chan_rel(lchan, wheel, now, timers, true)
}

/// Fires when the last SAPI has become `Unused` while `REL_REQ` and T3111 has elapsed: emit
/// the (non-error) `RF CHAN REL`.
pub fn on_t3111_expired(lchan: &mut Lchan) -> Vec<u8> {
    lchan.t3111 = None;
    release::rf_chan_rel(lchan, false)
}

pub fn on_error_timer_expired(lchan: &mut Lchan) {
    lchan.error_timer = None;
    set_state(lchan, LchanState::None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LchanType, PendingAssignment, RequestReference};
    use crate::signal::RecordingSink;
    use crate::vendor::BtsType;

    fn timers() -> BtsTimers {
        BtsTimers::default()
    }

    #[test]
    fn set_state_is_idempotent() {
        let mut lchan = Lchan::new(0, 0, 0, LchanType::Sdcch);
        set_state(&mut lchan, LchanState::Active);
        let after_first = lchan.state;
        set_state(&mut lchan, LchanState::Active);
        assert_eq!(lchan.state, after_first);
    }

    #[test]
    fn activation_ack_emits_exactly_one_imm_assign_and_clears_pending() {
        let mut lchan = Lchan::new(0, 0, 0, LchanType::Sdcch);
        let mut wheel = TimerWheel::new();
        let now = Instant::from_secs(0);
        enter_act_req(&mut lchan, &mut wheel, now);
        lchan.pending = Some(PendingAssignment {
            rqd_ref: RequestReference { ra: 0x88, frame_number: 123 },
            rqd_ta: 5,
            mobile_allocation: Vec::new(),
        });
        let vendor = VendorProfile::for_type(BtsType::Generic);
        let mut sink = RecordingSink::default();
        let out = on_chan_activ_ack(&mut lchan, &mut wheel, now, &timers(), &vendor, &mut sink);
        assert_eq!(out.len(), 1);
        assert!(lchan.pending.is_none());
        assert_eq!(lchan.state, LchanState::Active);
        assert!(!wheel.pending(handle(&lchan, TimerKind::Activation)));
        assert!(wheel.pending(handle(&lchan, TimerKind::T3101)));
    }

    #[test]
    fn nack_with_alr_actv_alloc_goes_to_rel_req_not_broken() {
        let mut lchan = Lchan::new(0, 0, 0, LchanType::Sdcch);
        let mut wheel = TimerWheel::new();
        enter_act_req(&mut lchan, &mut wheel, Instant::from_secs(0));
        let mut sink = RecordingSink::default();
        on_chan_activ_nack(&mut lchan, &mut wheel, ALR_ACTV_ALLOC, &mut sink);
        assert_eq!(lchan.state, LchanState::RelReq);
    }

    #[test]
    fn nack_with_other_cause_goes_broken() {
        let mut lchan = Lchan::new(0, 0, 0, LchanType::Sdcch);
        let mut wheel = TimerWheel::new();
        enter_act_req(&mut lchan, &mut wheel, Instant::from_secs(0));
        let mut sink = RecordingSink::default();
        on_chan_activ_nack(&mut lchan, &mut wheel, 0x99, &mut sink);
        assert_eq!(lchan.state, LchanState::Broken);
    }

    #[test]
    fn broken_lchan_ignores_late_rf_chan_rel_ack() {
        let mut lchan = Lchan::new(0, 0, 0, LchanType::Sdcch);
        let mut wheel = TimerWheel::new();
        set_state(&mut lchan, LchanState::Broken);
        on_rf_chan_rel_ack(&mut lchan, &mut wheel);
        assert_eq!(lchan.state, LchanState::Broken);
    }

    #[test]
    fn error_release_sweeps_sapis_and_arms_error_timer_at_t3111_plus_2s() {
        use crate::model::SapiState;
        let mut lchan = Lchan::new(0, 0, 0, LchanType::Sdcch);
        lchan.sapis[0] = SapiState::Ms;
        let mut wheel = TimerWheel::new();
        let now = Instant::from_secs(0);
        let outcome = on_rf_chan_rel(&mut lchan, &mut wheel, now, &timers(), true);
        assert_eq!(lchan.state, LchanState::RelErr);
        assert!(lchan.sapis.iter().all(|s| *s == SapiState::Unused));
        assert!(!messages_empty(&outcome));
        assert!(wheel.pending(handle(&lchan, TimerKind::Error)));
        assert!(wheel.pending(handle(&lchan, TimerKind::Deactivation)));
    }

    fn messages_empty(outcome: &ReleaseOutcome) -> bool {
        outcome.messages.is_empty()
    }
}
