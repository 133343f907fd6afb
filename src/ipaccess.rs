//! ip.access RTP-binding sub-protocol: CRCX/MDCX/DLCX over the `IPACCESS` discriminator, plus
//! the PDCH activation toggle. Grounded in `rsl_ipacc_crcx`, `rsl_ipacc_mdcx`, `rsl_ipacc_dlcx`,
//! `abis_rsl_rx_ipacc_crcx_ack`/`mdcx_ack`/`dlcx_ind` and `rsl_ipacc_pdch_activate`.
//!
//! ## Available Functions
//! - [`speech_mode_for_lchan`](speech_mode_for_lchan), [`rtp_payload_for_lchan`](rtp_payload_for_lchan)
//!   - `(tch_mode, type)` lookup tables.
//! - [`crcx_cmd`](crcx_cmd), [`mdcx_cmd`](mdcx_cmd), [`dlcx_cmd`](dlcx_cmd) - outbound builders.
//! - [`on_crcx_ack`](on_crcx_ack), [`on_mdcx_ack`](on_mdcx_ack), [`on_dlcx_ind`](on_dlcx_ind) -
//!   inbound handlers.
//! - [`pdch_activate_cmd`](pdch_activate_cmd), [`pdch_deactivate_cmd`](pdch_deactivate_cmd) -
//!   the PDCH activation toggle.

use crate::codec::{self, put_tlv, put_tv, CommonHeader, DchanHeader};
use crate::error::{Result, RslError};
use crate::model::{IpaRtpRecord, Lchan, LchanType, TchMode, Timeslot, TimeslotFlags};
use crate::msgtype;
use crate::registry::chan_nr_of;
use crate::signal::{Event, EventSink};

pub const IE_CONN_ID: u8 = 0x7b;
pub const IE_LOCAL_IP: u8 = 0x7c;
pub const IE_LOCAL_PORT: u8 = 0x7d;
pub const IE_SPEECH_MODE: u8 = 0x7e;
pub const IE_RTP_PAYLOAD: u8 = 0x7f;
pub const IE_RTP_PAYLOAD2: u8 = 0x80;
pub const IE_REMOTE_IP: u8 = 0x95;
pub const IE_REMOTE_PORT: u8 = 0x96;

/// Speech-mode nibble high bits: receive-only (CRCX) vs bidirectional (MDCX).
pub const SPEECH_MODE_RECEIVE_ONLY: u8 = 0x10;
pub const SPEECH_MODE_BIDIRECTIONAL: u8 = 0x00;

/// RTP payload type codes carried in `rtp_payload`/`rtp_payload2`.
pub const RTP_PT_GSM_FULL: u8 = 0x00;
pub const RTP_PT_GSM_EFR: u8 = 0x01;
pub const RTP_PT_GSM_HALF: u8 = 0x02;
pub const RTP_PT_AMR: u8 = 0x03;

/// `(tch_mode, lchan_type) -> speech-mode low nibble`. Implemented as a total, non-fall-through
/// match — unlike `original_source`'s `ipa_smod_s_for_lchan`, which has a missing `break` that
/// lets `SPEECH_EFR` fall into `SPEECH_AMR`'s TCH/H case. That bug is not reproduced here; only
/// the two bugs named as open questions in the governing spec are preserved literally.
pub fn speech_mode_for_lchan(tch_mode: TchMode, lchan_type: LchanType) -> Result<u8> {
    match (tch_mode, lchan_type) {
        (TchMode::SpeechV1, LchanType::TchF) => Ok(0x00),
        (TchMode::SpeechV1, LchanType::TchH) => Ok(0x03),
        (TchMode::SpeechEfr, LchanType::TchF) => Ok(0x01),
        (TchMode::SpeechAmr, LchanType::TchF) => Ok(0x02),
        (TchMode::SpeechAmr, LchanType::TchH) => Ok(0x05),
        _ => Err(RslError::ConfigurationError),
    }
}

/// `(tch_mode, lchan_type) -> RTP payload type`, same domain as [`speech_mode_for_lchan`].
pub fn rtp_payload_for_lchan(tch_mode: TchMode, lchan_type: LchanType) -> Result<u8> {
    match (tch_mode, lchan_type) {
        (TchMode::SpeechV1, LchanType::TchF) => Ok(RTP_PT_GSM_FULL),
        (TchMode::SpeechV1, LchanType::TchH) => Ok(RTP_PT_GSM_HALF),
        (TchMode::SpeechEfr, LchanType::TchF) => Ok(RTP_PT_GSM_EFR),
        (TchMode::SpeechAmr, _) => Ok(RTP_PT_AMR),
        _ => Err(RslError::ConfigurationError),
    }
}

fn ipaccess_header(msg_type: u8, chan_nr: u8) -> DchanHeader {
    DchanHeader {
        common: CommonHeader {
            msg_discr: codec::DISCR_IPACCESS,
            msg_type,
        },
        chan_nr,
    }
}

/// `CRCX`: request a receive-only RTP endpoint. Speech mode's high nibble is
/// [`SPEECH_MODE_RECEIVE_ONLY`].
pub fn crcx_cmd(lchan: &Lchan) -> Result<Vec<u8>> {
    let smod = speech_mode_for_lchan(lchan.tch_mode, lchan.lchan_type)?;
    let rtp_pt = rtp_payload_for_lchan(lchan.tch_mode, lchan.lchan_type)?;
    let mut buf = Vec::new();
    ipaccess_header(msgtype::IPAC_CRCX, chan_nr_of(lchan)).encode(&mut buf);
    put_tv(&mut buf, IE_SPEECH_MODE, SPEECH_MODE_RECEIVE_ONLY | smod);
    put_tv(&mut buf, IE_RTP_PAYLOAD, rtp_pt);
    Ok(buf)
}

/// `MDCX`: switch the endpoint bidirectional and give it the remote peer's address. Packs
/// `CONN_ID` (u16 BE), remote IP (u32 BE), remote port (u16 BE), speech_mode, rtp_payload, and
/// — if non-zero — rtp_payload2.
pub fn mdcx_cmd(lchan: &Lchan, conn_id: u16, remote_ip: u32, remote_port: u16) -> Result<Vec<u8>> {
    let smod = speech_mode_for_lchan(lchan.tch_mode, lchan.lchan_type)?;
    let rtp_pt = rtp_payload_for_lchan(lchan.tch_mode, lchan.lchan_type)?;
    let mut buf = Vec::new();
    ipaccess_header(msgtype::IPAC_MDCX, chan_nr_of(lchan)).encode(&mut buf);
    put_tlv(&mut buf, IE_CONN_ID, &conn_id.to_be_bytes());
    put_tlv(&mut buf, IE_REMOTE_IP, &remote_ip.to_be_bytes());
    put_tlv(&mut buf, IE_REMOTE_PORT, &remote_port.to_be_bytes());
    put_tv(&mut buf, IE_SPEECH_MODE, SPEECH_MODE_BIDIRECTIONAL | smod);
    put_tv(&mut buf, IE_RTP_PAYLOAD, rtp_pt);
    if lchan.abis_ip.rtp_payload2 != 0 {
        put_tv(&mut buf, IE_RTP_PAYLOAD2, lchan.abis_ip.rtp_payload2);
    }
    Ok(buf)
}

/// `DLCX`: tear down the RTP endpoint, carrying only the connection id.
pub fn dlcx_cmd(lchan: &Lchan) -> Vec<u8> {
    let mut buf = Vec::new();
    ipaccess_header(msgtype::IPAC_DLCX, chan_nr_of(lchan)).encode(&mut buf);
    put_tlv(&mut buf, IE_CONN_ID, &lchan.abis_ip.conn_id.to_be_bytes());
    buf
}

fn u32_be(bytes: &[u8]) -> Option<u32> {
    Some(u32::from_be_bytes(bytes.try_into().ok()?))
}

fn u16_be(bytes: &[u8]) -> Option<u16> {
    Some(u16::from_be_bytes(bytes.try_into().ok()?))
}

/// `CRCX ACK`: parse the bound local endpoint back into `lchan.abis_ip` and raise
/// [`Event::AbisipCrcxAck`] exactly once.
pub fn on_crcx_ack(lchan: &mut Lchan, sink: &mut dyn EventSink, data: &[u8]) -> Result<()> {
    let map = codec::parse_tlv(data)?;
    if let Some(v) = map.get(&IE_CONN_ID) {
        lchan.abis_ip.conn_id = u16_be(v).ok_or(RslError::Truncated)?;
    }
    if let Some(v) = map.get(&IE_LOCAL_IP) {
        lchan.abis_ip.bound_ip = u32_be(v).ok_or(RslError::Truncated)?;
    }
    if let Some(v) = map.get(&IE_LOCAL_PORT) {
        lchan.abis_ip.bound_port = u16_be(v).ok_or(RslError::Truncated)?;
    }
    sink.notify(Event::AbisipCrcxAck {
        trx_nr: lchan.trx_nr,
        ts_nr: lchan.ts_nr,
        idx: lchan.idx,
    });
    Ok(())
}

/// `MDCX ACK`: parse the confirmed remote endpoint back into `lchan.abis_ip` and raise
/// [`Event::AbisipMdcxAck`].
pub fn on_mdcx_ack(lchan: &mut Lchan, sink: &mut dyn EventSink, data: &[u8]) -> Result<()> {
    let map = codec::parse_tlv(data)?;
    if let Some(v) = map.get(&IE_REMOTE_IP) {
        lchan.abis_ip.connect_ip = u32_be(v).ok_or(RslError::Truncated)?;
    }
    if let Some(v) = map.get(&IE_REMOTE_PORT) {
        lchan.abis_ip.connect_port = u16_be(v).ok_or(RslError::Truncated)?;
    }
    sink.notify(Event::AbisipMdcxAck {
        trx_nr: lchan.trx_nr,
        ts_nr: lchan.ts_nr,
        idx: lchan.idx,
    });
    Ok(())
}

/// `DLCX IND`: clear the lchan's ip.access record and raise [`Event::AbisipDlcxInd`]. No
/// state-machine transition; the lchan's call may still be `ACTIVE`.
pub fn on_dlcx_ind(lchan: &mut Lchan, sink: &mut dyn EventSink) {
    lchan.abis_ip = IpaRtpRecord::default();
    sink.notify(Event::AbisipDlcxInd {
        trx_nr: lchan.trx_nr,
        ts_nr: lchan.ts_nr,
        idx: lchan.idx,
    });
}

/// PDCH activation toggle against a timeslot already configured for PDCH: flip
/// `TimeslotFlags::PDCH_ACTIVE` and emit the corresponding `CHAN ACTIV`/`RF CHAN REL`-style
/// ip.access message. GPRS payload handling itself is out of scope; only the toggle is built.
pub fn pdch_activate_cmd(ts: &mut Timeslot, trx_nr: u8) -> Vec<u8> {
    ts.flags.insert(TimeslotFlags::PDCH_ACTIVE);
    let chan_nr = (0x10u8 << 3) | (ts.nr & 0x07);
    let mut buf = Vec::new();
    ipaccess_header(msgtype::IPAC_PDCH_ACT, chan_nr).encode(&mut buf);
    let _ = trx_nr;
    buf
}

pub fn pdch_deactivate_cmd(ts: &mut Timeslot) -> Vec<u8> {
    ts.flags.remove(TimeslotFlags::PDCH_ACTIVE);
    let chan_nr = (0x10u8 << 3) | (ts.nr & 0x07);
    let mut buf = Vec::new();
    ipaccess_header(msgtype::IPAC_PDCH_DEACT, chan_nr).encode(&mut buf);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PchanKind;
    use crate::signal::RecordingSink;

    fn amr_tch_f() -> Lchan {
        let mut lchan = Lchan::new(0, 1, 0, LchanType::TchF);
        lchan.tch_mode = TchMode::SpeechAmr;
        lchan
    }

    #[test]
    fn crcx_sets_receive_only_speech_mode_and_amr_payload() {
        let lchan = amr_tch_f();
        let bytes = crcx_cmd(&lchan).unwrap();
        let map = codec::parse_tlv(&bytes[4..]).unwrap();
        assert_eq!(map.get(&IE_SPEECH_MODE), Some(&&[0x12u8][..]));
        assert_eq!(map.get(&IE_RTP_PAYLOAD), Some(&&[RTP_PT_AMR][..]));
    }

    #[test]
    fn mdcx_sets_bidirectional_speech_mode_and_packs_endpoint() {
        let lchan = amr_tch_f();
        let bytes = mdcx_cmd(&lchan, 7, 0xC0A80101, 16384).unwrap();
        let map = codec::parse_tlv(&bytes[4..]).unwrap();
        assert_eq!(map.get(&IE_SPEECH_MODE), Some(&&[0x02u8][..]));
        assert_eq!(map.get(&IE_CONN_ID), Some(&&7u16.to_be_bytes()[..]));
        assert_eq!(map.get(&IE_REMOTE_IP), Some(&&0xC0A80101u32.to_be_bytes()[..]));
    }

    #[test]
    fn crcx_ack_parses_bound_endpoint_and_fires_once() {
        let mut lchan = amr_tch_f();
        let mut sink = RecordingSink::default();
        let mut data = Vec::new();
        put_tlv(&mut data, IE_CONN_ID, &7u16.to_be_bytes());
        put_tlv(&mut data, IE_LOCAL_IP, &0xC0A80101u32.to_be_bytes());
        put_tlv(&mut data, IE_LOCAL_PORT, &16384u16.to_be_bytes());
        on_crcx_ack(&mut lchan, &mut sink, &data).unwrap();
        assert_eq!(lchan.abis_ip.bound_ip, 0xC0A80101);
        assert_eq!(lchan.abis_ip.bound_port, 16384);
        assert_eq!(lchan.abis_ip.conn_id, 7);
        assert_eq!(sink.events.len(), 1);
    }

    #[test]
    fn dlcx_ind_clears_abis_ip_record() {
        let mut lchan = amr_tch_f();
        lchan.abis_ip.conn_id = 7;
        let mut sink = RecordingSink::default();
        on_dlcx_ind(&mut lchan, &mut sink);
        assert_eq!(lchan.abis_ip.conn_id, 0);
        assert_eq!(sink.events.len(), 1);
    }

    #[test]
    fn pdch_activate_flips_flag() {
        let mut ts = Timeslot::new(0, 3, PchanKind::Pdch);
        pdch_activate_cmd(&mut ts, 0);
        assert!(ts.flags.contains(TimeslotFlags::PDCH_ACTIVE));
        pdch_deactivate_cmd(&mut ts);
        assert!(!ts.flags.contains(TimeslotFlags::PDCH_ACTIVE));
    }
}
