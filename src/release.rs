//! Release orchestration: SAPI release sweep, SACCH deactivation, T3109/T3111 sequencing and
//! the error-path local-end release. Grounded in `rsl_release_sapis_from`, `rsl_start_t3109`,
//! `rsl_direct_rf_release`, `rsl_rf_chan_release` and `rsl_rx_rf_chan_rel_ack`.
//!
//! ## Available Functions
//! - [`release_sapis_from`](release_sapis_from) - sweep SAPIs, building one RLL RELEASE
//!   REQUEST per active entry.
//! - [`start_t3109`](start_t3109) - arm the SACCH deactivation watchdog.
//! - [`rf_chan_rel`](rf_chan_rel) - build the `RF CHAN REL` message.
//! - [`deactivate_sacch`](deactivate_sacch) - build `DEACTIVATE SACCH`.

use crate::codec::{self, link_id, put_tv, CommonHeader, DchanHeader, RllHeader};
use crate::config::BtsTimers;
use crate::model::{Lchan, LchanType, SapiState};
use crate::msgtype;
use crate::registry::chan_nr_of;
use crate::timer::Duration;

/// Release mode carried on an RLL RELEASE REQUEST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReleaseMode {
    Normal,
    LocalEnd,
}

pub const IE_REL_MODE: u8 = 0x12;
pub const IE_CAUSE: u8 = 0x18;

fn rll_release_req(lchan: &Lchan, sapi: u8, mode: ReleaseMode) -> Vec<u8> {
    let sacch = matches!(lchan.lchan_type, LchanType::TchF | LchanType::TchH);
    let mut buf = Vec::new();
    RllHeader {
        common: CommonHeader {
            msg_discr: codec::mdisc_by_msgtype(msgtype::REL_REQ).to_byte(),
            msg_type: msgtype::REL_REQ,
        },
        chan_nr: chan_nr_of(lchan),
        link_id: link_id(sapi, sacch),
    }
    .encode(&mut buf);
    put_tv(
        &mut buf,
        IE_REL_MODE,
        match mode {
            ReleaseMode::Normal => 0x00,
            ReleaseMode::LocalEnd => 0x01,
        },
    );
    buf
}

/// Send RLL RELEASE REQ for every SAPI at index `>= start` that is not `Unused`, clearing it to
/// `Unused` as we go (the BTS's REL IND/REL CONF will confirm it, but the local bookkeeping
/// treats the request as the point of release per the original's own local-end semantics for
/// the error path). Returns the built messages and whether any SAPI was active.
pub fn release_sapis_from(
    lchan: &mut Lchan,
    start: usize,
    mode: ReleaseMode,
) -> (Vec<Vec<u8>>, bool) {
    let mut messages = Vec::new();
    let mut any_active = false;
    for sapi in start..lchan.sapis.len() {
        if lchan.sapis[sapi] != SapiState::Unused {
            any_active = true;
            messages.push(rll_release_req(lchan, sapi as u8, mode));
            lchan.sapis[sapi] = SapiState::Unused;
        }
    }
    (messages, any_active)
}

/// Arm T3109. Returns `false` (and schedules nothing) when the network has T3109 disabled
/// (`t3109_secs == 0`).
pub fn start_t3109(
    lchan: &mut Lchan,
    timers: &BtsTimers,
    wheel: &mut crate::timer::TimerWheel,
    now: crate::timer::Instant,
) -> bool {
    if timers.t3109_secs == 0 {
        return false;
    }
    let handle = crate::timer::TimerHandle::lchan(
        lchan.trx_nr,
        lchan.ts_nr,
        lchan.idx,
        crate::timer::TimerKind::T3109,
    );
    wheel.schedule(handle, now, Duration::from_secs(timers.t3109_secs as u64));
    lchan.t3109 = Some(handle);
    true
}

/// `RF CHAN REL`: the dedicated-channel release request sent to the BTS. `error` selects
/// whether this is the error path (cause byte present) or the normal post-T3111 release.
pub fn rf_chan_rel(lchan: &Lchan, error: bool) -> Vec<u8> {
    let mut buf = Vec::new();
    DchanHeader {
        common: CommonHeader {
            msg_discr: codec::mdisc_by_msgtype(msgtype::RF_CHAN_REL).to_byte(),
            msg_type: msgtype::RF_CHAN_REL,
        },
        chan_nr: chan_nr_of(lchan),
    }
    .encode(&mut buf);
    if error {
        put_tv(&mut buf, IE_CAUSE, 0x01);
    }
    buf
}

/// `DEACTIVATE SACCH`.
pub fn deactivate_sacch(lchan: &Lchan) -> Vec<u8> {
    let mut buf = Vec::new();
    DchanHeader {
        common: CommonHeader {
            msg_discr: codec::mdisc_by_msgtype(msgtype::DEACTIVATE_SACCH).to_byte(),
            msg_type: msgtype::DEACTIVATE_SACCH,
        },
        chan_nr: chan_nr_of(lchan),
    }
    .encode(&mut buf);
    buf
}

/// When no SAPI has ever been used (activation failed before any L3 establishment), skip the
/// SAPI sweep entirely and release the radio resource directly. Logs loudly (does not panic)
/// if any SAPI turns out to be non-`Unused` — that would mean a caller invoked this instead of
/// [`release_sapis_from`] by mistake.
pub fn direct_rf_release(lchan: &Lchan) -> Vec<u8> {
    if lchan.any_sapi_active() {
        log::error!(
            "direct_rf_release called on {} with an active SAPI; should have swept first",
            lchan.name()
        );
    }
    rf_chan_rel(lchan, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LchanType;

    #[test]
    fn release_sapis_from_zero_clears_all_active_and_builds_one_message_each() {
        let mut lchan = Lchan::new(0, 0, 0, LchanType::Sdcch);
        lchan.sapis[0] = SapiState::Ms;
        lchan.sapis[3] = SapiState::Net;
        let (messages, any_active) = release_sapis_from(&mut lchan, 0, ReleaseMode::Normal);
        assert!(any_active);
        assert_eq!(messages.len(), 2);
        assert!(lchan.sapis.iter().all(|s| *s == SapiState::Unused));
    }

    #[test]
    fn release_sapis_from_with_nothing_active_reports_false() {
        let mut lchan = Lchan::new(0, 0, 0, LchanType::Sdcch);
        let (messages, any_active) = release_sapis_from(&mut lchan, 0, ReleaseMode::LocalEnd);
        assert!(!any_active);
        assert!(messages.is_empty());
    }

    #[test]
    fn t3109_disabled_when_network_timer_is_zero() {
        let mut lchan = Lchan::new(0, 0, 0, LchanType::TchF);
        let mut wheel = crate::timer::TimerWheel::new();
        let timers = BtsTimers {
            t3109_secs: 0,
            ..Default::default()
        };
        let armed = start_t3109(&mut lchan, &timers, &mut wheel, crate::timer::Instant::from_secs(0));
        assert!(!armed);
        assert!(lchan.t3109.is_none());
    }

    #[test]
    fn sapi_link_id_sets_sacch_bit_only_for_traffic_channels() {
        let sdcch = Lchan::new(0, 0, 0, LchanType::Sdcch);
        let bytes = rll_release_req(&sdcch, 0, ReleaseMode::Normal);
        // RLL header: discr, msg_type, IE_CHAN_NR tag, chan_nr, IE_LINK_IDENT tag, link_id
        assert_eq!(bytes[5] & 0x40, 0);

        let tchf = Lchan::new(0, 1, 0, LchanType::TchF);
        let bytes = rll_release_req(&tchf, 0, ReleaseMode::Normal);
        assert_eq!(bytes[5] & 0x40, 0x40);
    }
}
