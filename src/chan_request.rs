//! Channel request and immediate assignment: `CHAN RQD` ingestion through `CHAN ACTIV`
//! emission, plus `IMMEDIATE ASSIGN`/`IMMEDIATE ASSIGN REJECT` construction. Grounded in
//! `rsl_rx_chan_rqd`, `rsl_chan_activate_lchan`, `rsl_send_imm_assignment` and
//! `rsl_send_imm_ass_rej`.
//!
//! ## Available Functions
//! - [`chreq_reason`](chreq_reason), [`chreq_lchan_type`](chreq_lchan_type) - classify the RACH
//!   `RA` byte.
//! - [`Allocator`](Allocator) - the external channel-allocator boundary.
//! - [`on_chan_rqd`](on_chan_rqd) - the full handler, mandatory-IE parse through outbound
//!   message(s).
//! - [`immediate_assign_cmd`](immediate_assign_cmd) - builds `IMMEDIATE ASSIGN`, called from
//!   [`crate::lchan::on_chan_activ_ack`].
//! - [`imm_ass_reject`](imm_ass_reject) - builds `IMMEDIATE ASSIGN REJECT`.

use crate::chan_mode::channel_mode_from_lchan;
use crate::codec::{self, l2_plen, pad_macblock, put_tlv, put_tv, CommonHeader, DchanHeader, MACBLOCK_LEN};
use crate::config::BtsTimers;
use crate::error::{Result, RslError};
use crate::model::{
    Bts, Encryption, Hopping, Lchan, LchanType, PendingAssignment, PowerLevels, RequestReference,
    RslCmode, TchMode,
};
use crate::msgtype;
use crate::registry::chan_nr_of;
use crate::timer::{Instant, TimerWheel};
use crate::vendor::{ImmAssignPacking, VendorProfile};

pub const IE_REQ_REFERENCE: u8 = 0x13;
pub const IE_ACCESS_DELAY: u8 = 0x11;
pub const IE_TIMING_ADVANCE: u8 = 0x18;
pub const IE_CHAN_IDENT: u8 = 0x05;
pub const IE_ENCR_INFO: u8 = 0x07;
pub const IE_BS_POWER: u8 = 0x04;
pub const IE_MS_POWER: u8 = 0x0d;
pub const IE_CHAN_MODE: u8 = 0x06;
pub const IE_IMM_ASS_INFO: u8 = 0x22;
pub const IE_FULL_IMM_ASS_INFO: u8 = 0x23;

/// `A5/0`, the "no ciphering" algorithm id a freshly requested lchan starts with.
pub const RSL_ENC_ALG_A5_0: u8 = 0x00;

/// GSM 04.08 RR message types carried inside `IMMEDIATE ASSIGN`/`IMMEDIATE ASSIGN REJECT`.
const GSM48_PDISC_RR: u8 = 0x06;
const GSM48_MT_RR_IMM_ASS: u8 = 0x3f;
const GSM48_MT_RR_IMM_ASS_REJ: u8 = 0x3a;
const GSM48_PM_SAME: u8 = 0x00;

/// Establishment cause derived from the RACH `RA` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChreqReason {
    Emergency,
    Call,
    LocationUpdate,
    Other,
}

/// Classify the establishment cause carried in the RACH reference byte. This crate's own table:
/// the retrieval pack carried `abis_rsl.c`'s call into `get_ctype_by_chreq`/`get_reason_by_chreq`
/// but not the header defining them, so the RA -> cause mapping below is this crate's own,
/// built from the general TS 04.08 RA-byte establishment-cause classes rather than copied from
/// an unavailable source. See `DESIGN.md`.
pub fn chreq_reason(ra: u8) -> ChreqReason {
    match ra >> 5 {
        0b101 => ChreqReason::Emergency,
        0b100 => ChreqReason::Call,
        0b000 | 0b001 => ChreqReason::LocationUpdate,
        _ => ChreqReason::Other,
    }
}

/// Channel type to request from the allocator for a given cause. Emergency calls and answers to
/// paging go straight to a full-rate TCH; everything else starts on an SDCCH (location updates'
/// TCH/F retry is handled one layer up, in [`on_chan_rqd`]).
pub fn chreq_lchan_type(reason: ChreqReason) -> LchanType {
    match reason {
        ChreqReason::Emergency | ChreqReason::Call => LchanType::TchF,
        ChreqReason::LocationUpdate | ChreqReason::Other => LchanType::Sdcch,
    }
}

/// External channel allocator. Allocation policy is out of scope here; this crate only depends
/// on the trait. `prefer_alt` carries the location-update hint so the allocator can itself
/// substitute a TCH/F when no SDCCH is free, the way the original's `lchan_alloc(..., is_lu)`
/// does internally.
pub trait Allocator {
    fn acquire(&mut self, bts: &mut Bts, lchan_type: LchanType, prefer_alt: bool) -> Option<(u8, u8, u8)>;
    fn release(&mut self, bts: &mut Bts, trx_nr: u8, ts_nr: u8, idx: u8);
}

fn encode_chan_desc(lchan: &Lchan, trx_arfcn: u16, hopping: &Hopping) -> Vec<u8> {
    let mut buf = vec![chan_nr_of(lchan)];
    if hopping.enabled {
        buf.push(0x01);
        buf.extend_from_slice(&hopping.mobile_allocation);
    } else {
        buf.push(0x00);
        buf.extend_from_slice(&trx_arfcn.to_be_bytes());
    }
    buf
}

/// `CHAN ACTIV`: channel mode, channel identification, optional encryption info and power/TA.
pub fn chan_activ_cmd(
    lchan: &Lchan,
    trx_arfcn: u16,
    hopping: &Hopping,
    vendor: &VendorProfile,
    dtx_enabled: bool,
) -> Result<Vec<u8>> {
    let cm = channel_mode_from_lchan(lchan, dtx_enabled)?;

    let mut buf = Vec::new();
    DchanHeader {
        common: CommonHeader {
            msg_discr: codec::mdisc_by_msgtype(msgtype::CHAN_ACTIV).to_byte(),
            msg_type: msgtype::CHAN_ACTIV,
        },
        chan_nr: chan_nr_of(lchan),
    }
    .encode(&mut buf);
    put_tlv(&mut buf, IE_CHAN_MODE, &cm.encode());
    put_tlv(&mut buf, IE_CHAN_IDENT, &encode_chan_desc(lchan, trx_arfcn, hopping));
    if lchan.encryption.algorithm_id != RSL_ENC_ALG_A5_0 {
        let info = codec::pack_encryption_info(lchan.encryption.algorithm_id, &lchan.encryption.key);
        put_tlv(&mut buf, IE_ENCR_INFO, &info);
    }
    put_tv(&mut buf, IE_BS_POWER, lchan.power.bs_power);
    put_tv(&mut buf, IE_MS_POWER, lchan.power.ms_power);
    let rqd_ta = lchan.pending.as_ref().map(|p| p.rqd_ta).unwrap_or(0);
    put_tv(&mut buf, IE_TIMING_ADVANCE, vendor.encode_ta(rqd_ta));
    Ok(buf)
}

/// `CHAN RQD` handler: parse `REQ_REFERENCE`/`ACCESS_DELAY`, classify the request, acquire an
/// lchan (with the location-update and 0x3x-nibble retries), and either reject or activate.
/// Returns the outbound message(s): zero (no channel, `T3122 == 0`), one `IMMEDIATE ASSIGN
/// REJECT`, or one `CHAN ACTIV`.
pub fn on_chan_rqd(
    bts: &mut Bts,
    alloc: &mut dyn Allocator,
    wheel: &mut TimerWheel,
    now: Instant,
    dtx_enabled: bool,
    data: &[u8],
) -> Result<Vec<Vec<u8>>> {
    if data.len() < 6 {
        return Err(RslError::Truncated);
    }
    if data[0] != IE_REQ_REFERENCE {
        return Err(RslError::MissingIe(IE_REQ_REFERENCE));
    }
    let ra = data[1];
    let frame_number = ((data[2] as u32) << 8) | data[3] as u32;
    if data[4] != IE_ACCESS_DELAY {
        return Err(RslError::MissingIe(IE_ACCESS_DELAY));
    }
    let rqd_ta = data[5];

    bts.stats.total += 1;

    let reason = chreq_reason(ra);
    let is_lu = reason == ChreqReason::LocationUpdate;
    let mut lchan_type = chreq_lchan_type(reason);
    let mut acquired = alloc.acquire(bts, lchan_type, is_lu);
    if acquired.is_none() && (ra & 0xf0) == 0x30 {
        lchan_type = LchanType::TchF;
        acquired = alloc.acquire(bts, lchan_type, is_lu);
    }

    let req_ref = RequestReference { ra, frame_number };

    let Some((trx_nr, ts_nr, idx)) = acquired else {
        bts.stats.no_channel += 1;
        if bts.timers.t3122_secs > 0 {
            let wait_ind = (bts.timers.t3122_secs & 0xff) as u8;
            // CCCH cbits (0x10) and the timeslot number alone identify the paging channel; this
            // must not index into `lchans`, which is empty for a PDCH/unconfigured timeslot 0.
            let c0_chan_nr = (0x10u8 << 3) | (bts.c0().timeslots[0].nr & 0x07);
            return Ok(vec![imm_ass_reject(c0_chan_nr, req_ref, wait_ind)]);
        }
        return Ok(Vec::new());
    };

    let vendor = bts.vendor_profile();
    let trx = &mut bts.trxs[trx_nr as usize];
    let arfcn = trx.arfcn;
    let ts = &mut trx.timeslots[ts_nr as usize];
    let hopping = ts.hopping.clone();
    let lchan = &mut ts.lchans[idx as usize];

    lchan.pending = Some(PendingAssignment {
        rqd_ref: req_ref,
        rqd_ta,
        mobile_allocation: hopping.mobile_allocation.clone(),
    });
    lchan.power = PowerLevels::default();
    lchan.encryption = Encryption { algorithm_id: RSL_ENC_ALG_A5_0, key: Vec::new() };
    lchan.rsl_cmode = RslCmode::Signalling;
    lchan.tch_mode = TchMode::Sign;

    crate::lchan::enter_act_req(lchan, wheel, now);

    let msg = chan_activ_cmd(lchan, arfcn, &hopping, &vendor, dtx_enabled)?;
    Ok(vec![msg])
}

/// `IMMEDIATE ASSIGN REJECT`: replicate the single captured reference into all four
/// request-reference slots (there is never more than one RACH request behind a `CHAN RQD` in
/// this model), each paired with the same wait indication.
pub fn imm_ass_reject(c0_chan_nr: u8, req_ref: RequestReference, wait_indication: u8) -> Vec<u8> {
    let mut ia = Vec::new();
    ia.push(0); // l2_plen, patched below
    ia.push(GSM48_PDISC_RR);
    ia.push(GSM48_MT_RR_IMM_ASS_REJ);
    ia.push(GSM48_PM_SAME);
    for _ in 0..4 {
        ia.push(req_ref.ra);
        ia.push((req_ref.frame_number >> 8) as u8);
        ia.push(req_ref.frame_number as u8);
        ia.push(wait_indication);
    }
    let plen = l2_plen(ia.len() - 1);
    ia[0] = plen;

    let mut buf = Vec::new();
    DchanHeader {
        common: CommonHeader {
            msg_discr: codec::mdisc_by_msgtype(msgtype::IMMEDIATE_ASSIGN_REJECT).to_byte(),
            msg_type: msgtype::IMMEDIATE_ASSIGN_REJECT,
        },
        chan_nr: c0_chan_nr,
    }
    .encode(&mut buf);
    put_tlv(&mut buf, IE_FULL_IMM_ASS_INFO, &pad_macblock(&ia, MACBLOCK_LEN));
    buf
}

/// `IMMEDIATE ASSIGN`: built from the lchan and its captured [`PendingAssignment`] alone, since
/// that is all [`crate::lchan::on_chan_activ_ack`] has on hand. The channel description's ARFCN
/// is therefore left zero-length here; a controller wanting the exact ARFCN in the air message
/// would need to thread that through the lchan layer, which this crate's state machine does not
/// do. The hopping mobile-allocation, captured on `CHAN RQD`, is carried through and emitted per
/// §4.5 so a hopping MS can follow the cell's hopping sequence.
pub fn immediate_assign_cmd(lchan: &Lchan, pending: &PendingAssignment, vendor: &VendorProfile) -> Vec<u8> {
    let mut ia = Vec::new();
    ia.push(0); // l2_plen, patched below
    ia.push(GSM48_PDISC_RR);
    ia.push(GSM48_MT_RR_IMM_ASS);
    ia.push(GSM48_PM_SAME);
    ia.push(chan_nr_of(lchan));
    ia.push(0);
    ia.push(0);
    ia.push(pending.rqd_ref.ra);
    ia.push((pending.rqd_ref.frame_number >> 8) as u8);
    ia.push(pending.rqd_ref.frame_number as u8);
    ia.push(vendor.encode_ta(pending.rqd_ta));
    ia.push(pending.mobile_allocation.len() as u8);
    ia.extend_from_slice(&pending.mobile_allocation);
    let plen = l2_plen(ia.len() - 1);
    ia[0] = plen;

    let mut buf = Vec::new();
    DchanHeader {
        common: CommonHeader {
            msg_discr: codec::mdisc_by_msgtype(msgtype::IMMEDIATE_ASSIGN_CMD).to_byte(),
            msg_type: msgtype::IMMEDIATE_ASSIGN_CMD,
        },
        chan_nr: chan_nr_of(lchan),
    }
    .encode(&mut buf);
    match vendor.imm_assign_packing {
        ImmAssignPacking::Info => put_tlv(&mut buf, IE_IMM_ASS_INFO, &ia),
        ImmAssignPacking::FullInfo => {
            put_tlv(&mut buf, IE_FULL_IMM_ASS_INFO, &pad_macblock(&ia, MACBLOCK_LEN))
        }
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Band, Bts, LchanType, Trx};
    use crate::timer::TimerWheel;
    use crate::vendor::BtsType;

    fn test_trx() -> Trx {
        let mut trx = Trx {
            nr: 0,
            arfcn: 42,
            timeslots: (0..8)
                .map(|n| crate::model::Timeslot::new(0, n, crate::model::PchanKind::None))
                .collect(),
            link: crate::dispatch::TransportLink::default(),
        };
        trx.timeslots[0] = crate::model::Timeslot::new(0, 0, crate::model::PchanKind::CcchSdcch4);
        trx.timeslots[1] = crate::model::Timeslot::new(0, 1, crate::model::PchanKind::TchF);
        trx
    }

    fn test_bts() -> Bts {
        Bts {
            nr: 0,
            bts_type: BtsType::Generic,
            band: Band::Gsm900,
            ms_max_power: 15,
            neci: true,
            timers: BtsTimers::default(),
            bs_pa_mfrms: 5,
            bs_ag_blks_res: 1,
            trxs: vec![test_trx()],
            stats: Default::default(),
        }
    }

    struct FirstFreeAllocator;

    impl Allocator for FirstFreeAllocator {
        fn acquire(&mut self, bts: &mut Bts, lchan_type: LchanType, _prefer_alt: bool) -> Option<(u8, u8, u8)> {
            for trx in &bts.trxs {
                for ts in &trx.timeslots {
                    for lchan in &ts.lchans {
                        if lchan.lchan_type == lchan_type && lchan.state == crate::model::LchanState::None {
                            return Some((trx.nr, ts.nr, lchan.idx));
                        }
                    }
                }
            }
            None
        }

        fn release(&mut self, _bts: &mut Bts, _trx_nr: u8, _ts_nr: u8, _idx: u8) {}
    }

    struct NoneAllocator;

    impl Allocator for NoneAllocator {
        fn acquire(&mut self, _bts: &mut Bts, _lchan_type: LchanType, _prefer_alt: bool) -> Option<(u8, u8, u8)> {
            None
        }
        fn release(&mut self, _bts: &mut Bts, _trx_nr: u8, _ts_nr: u8, _idx: u8) {}
    }

    #[test]
    fn chreq_reason_classifies_location_update_from_top_bits() {
        assert_eq!(chreq_reason(0x10), ChreqReason::LocationUpdate);
        assert_eq!(chreq_reason(0xA5), ChreqReason::Emergency);
    }

    #[test]
    fn successful_request_emits_one_chan_activ_and_enters_act_req() {
        let mut bts = test_bts();
        let mut wheel = TimerWheel::new();
        let now = Instant::from_secs(0);
        let data = [IE_REQ_REFERENCE, 0x88, 0x07, 0xab, IE_ACCESS_DELAY, 0x05];
        let out = on_chan_rqd(&mut bts, &mut FirstFreeAllocator, &mut wheel, now, false, &data).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(bts.stats.total, 1);
        let lchan = &bts.trxs[0].timeslots[0].lchans[0];
        assert_eq!(lchan.state, crate::model::LchanState::ActReq);
        assert!(lchan.pending.is_some());
    }

    #[test]
    fn no_channel_with_t3122_zero_emits_nothing() {
        let mut bts = test_bts();
        bts.timers.t3122_secs = 0;
        let mut wheel = TimerWheel::new();
        let data = [IE_REQ_REFERENCE, 0x88, 0x00, 0x00, IE_ACCESS_DELAY, 0x05];
        let out = on_chan_rqd(&mut bts, &mut NoneAllocator, &mut wheel, Instant::from_secs(0), false, &data).unwrap();
        assert!(out.is_empty());
        assert_eq!(bts.stats.no_channel, 1);
    }

    #[test]
    fn no_channel_with_t3122_set_emits_imm_ass_reject() {
        let mut bts = test_bts();
        bts.timers.t3122_secs = 10;
        let mut wheel = TimerWheel::new();
        let data = [IE_REQ_REFERENCE, 0x88, 0x00, 0x00, IE_ACCESS_DELAY, 0x05];
        let out = on_chan_rqd(&mut bts, &mut NoneAllocator, &mut wheel, Instant::from_secs(0), false, &data).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0][1], msgtype::IMMEDIATE_ASSIGN_REJECT);
    }

    #[test]
    fn no_channel_reject_does_not_panic_when_c0_timeslot0_has_no_lchans() {
        let mut bts = test_bts();
        bts.trxs[0].timeslots[0] = crate::model::Timeslot::new(0, 0, crate::model::PchanKind::None);
        bts.timers.t3122_secs = 10;
        let mut wheel = TimerWheel::new();
        let data = [IE_REQ_REFERENCE, 0x88, 0x00, 0x00, IE_ACCESS_DELAY, 0x05];
        let out = on_chan_rqd(&mut bts, &mut NoneAllocator, &mut wheel, Instant::from_secs(0), false, &data).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0][1], msgtype::IMMEDIATE_ASSIGN_REJECT);
    }

    #[test]
    fn on_chan_rqd_carries_hopping_mobile_allocation_into_pending() {
        let mut bts = test_bts();
        // ra = 0x88 classifies as `Call`, which allocates a TCH/F -- timeslot 1 in `test_trx`.
        bts.trxs[0].timeslots[1].hopping = crate::model::Hopping {
            enabled: true,
            mobile_allocation: vec![0xaa, 0xbb],
        };
        let mut wheel = TimerWheel::new();
        let now = Instant::from_secs(0);
        let data = [IE_REQ_REFERENCE, 0x88, 0x07, 0xab, IE_ACCESS_DELAY, 0x05];
        on_chan_rqd(&mut bts, &mut FirstFreeAllocator, &mut wheel, now, false, &data).unwrap();
        let lchan = &bts.trxs[0].timeslots[1].lchans[0];
        assert_eq!(lchan.pending.as_ref().unwrap().mobile_allocation, vec![0xaa, 0xbb]);
    }

    #[test]
    fn immediate_assign_cmd_emits_mobile_allocation_bytes() {
        let lchan = Lchan::new(0, 0, 0, LchanType::Sdcch);
        let pending = PendingAssignment {
            rqd_ref: RequestReference { ra: 0x88, frame_number: 0x07ab },
            rqd_ta: 5,
            mobile_allocation: vec![0xaa, 0xbb, 0xcc],
        };
        let vendor = VendorProfile::for_type(BtsType::Bs11);
        let bytes = immediate_assign_cmd(&lchan, &pending, &vendor);
        assert!(bytes.windows(3).any(|w| w == [0xaa, 0xbb, 0xcc]));
    }

    #[test]
    fn immediate_assign_pads_to_23_bytes_for_full_info_vendors() {
        let lchan = Lchan::new(0, 0, 0, LchanType::Sdcch);
        let pending = PendingAssignment {
            rqd_ref: RequestReference { ra: 0x88, frame_number: 0x07ab },
            rqd_ta: 5,
            mobile_allocation: Vec::new(),
        };
        let vendor = VendorProfile::for_type(BtsType::Generic);
        let bytes = immediate_assign_cmd(&lchan, &pending, &vendor);
        // header (4) + tag/len (2) + 23-byte macroblock.
        assert_eq!(bytes.len(), 4 + 2 + MACBLOCK_LEN);
    }

    #[test]
    fn immediate_assign_sends_raw_info_for_bs11() {
        let lchan = Lchan::new(0, 0, 0, LchanType::Sdcch);
        let pending = PendingAssignment {
            rqd_ref: RequestReference { ra: 0x88, frame_number: 0x07ab },
            rqd_ta: 5,
            mobile_allocation: Vec::new(),
        };
        let vendor = VendorProfile::for_type(BtsType::Bs11);
        let bytes = immediate_assign_cmd(&lchan, &pending, &vendor);
        assert_ne!(bytes.len(), 4 + 2 + MACBLOCK_LEN);
    }
}
