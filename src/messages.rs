//! Common-channel and dedicated-channel outbound builders that don't belong to one of the
//! bigger flows (channel request, release, measurement, ip.access). Grounded in
//! `abis_rsl.c`'s `rsl_bcch_info`, `rsl_sacch_filling`, `rsl_sacch_info_modify`,
//! `rsl_sms_cb_command`, `rsl_chan_bs_power_ctrl`, `rsl_chan_ms_power_ctrl`,
//! `rsl_chan_mode_modify_req` and `rsl_encryption_cmd`.
//!
//! ## Available Functions
//! - [`bcch_info`](bcch_info), [`sacch_filling`](sacch_filling),
//!   [`sacch_info_modify`](sacch_info_modify) - system-information distribution.
//! - [`sms_cb_command`](sms_cb_command) - SMS cell broadcast.
//! - [`chan_bs_power_ctrl`](chan_bs_power_ctrl), [`chan_ms_power_ctrl`](chan_ms_power_ctrl) -
//!   power control.
//! - [`chan_mode_modify_req`](chan_mode_modify_req) - in-call mode change.
//! - [`encryption_cmd`](encryption_cmd) - assembled back-to-front via [`TwoEndedBuffer`].
//! - [`siemens_mrpci`](siemens_mrpci) - vendor-specific outbound-only message, grounded in
//!   `rsl_siemens_mrpci`.

use crate::chan_mode::channel_mode_from_lchan;
use crate::codec::{
    self, link_id, put_tl16v, put_tlv, put_tv, CommonHeader, DchanHeader, TwoEndedBuffer,
};
use crate::error::Result;
use crate::model::Lchan;
use crate::msgtype;
use crate::registry::chan_nr_of;

pub const IE_SYSINFO_TYPE: u8 = 0x1e;
pub const IE_FULL_BCCH_INFO: u8 = 0x27;
pub const IE_SACCH_INFO: u8 = 0x2d;
pub const IE_CB_CMD_TYPE: u8 = 0x29;
pub const IE_SMSCB_MESS: u8 = 0x2a;
pub const IE_BS_POWER: u8 = 0x04;
pub const IE_MS_POWER: u8 = 0x0d;
pub const IE_CHAN_MODE: u8 = 0x06;
pub const IE_ENCR_INFO: u8 = 0x07;
pub const IE_L3_INFO: u8 = 0x0b;
pub const IE_SIEMENS_MRPCI: u8 = 0x40;

fn dchan(msg_type: u8, chan_nr: u8) -> DchanHeader {
    DchanHeader {
        common: CommonHeader {
            msg_discr: codec::mdisc_by_msgtype(msg_type).to_byte(),
            msg_type,
        },
        chan_nr,
    }
}

/// `BCCH INFO`: broadcasts one system-information block on the BCCH.
pub fn bcch_info(bts_c0_chan_nr: u8, sysinfo_type: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    dchan(msgtype::BCCH_INFO, bts_c0_chan_nr).encode(&mut buf);
    put_tv(&mut buf, IE_SYSINFO_TYPE, sysinfo_type);
    put_tlv(&mut buf, IE_FULL_BCCH_INFO, payload);
    buf
}

/// `SACCH FILLING`: same shape as BCCH INFO, but for idle-mode SACCH filling per TRX.
pub fn sacch_filling(bts_c0_chan_nr: u8, sysinfo_type: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    dchan(msgtype::SACCH_FILLING, bts_c0_chan_nr).encode(&mut buf);
    put_tv(&mut buf, IE_SYSINFO_TYPE, sysinfo_type);
    put_tlv(&mut buf, IE_FULL_BCCH_INFO, payload);
    buf
}

/// `SACCH INFO MODIFY`: per-lchan override of one SACCH system-information block.
pub fn sacch_info_modify(lchan: &Lchan, sysinfo_type: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    dchan(msgtype::SACCH_INFO_MODIFY, chan_nr_of(lchan)).encode(&mut buf);
    put_tv(&mut buf, IE_SYSINFO_TYPE, sysinfo_type);
    put_tlv(&mut buf, IE_SACCH_INFO, payload);
    buf
}

/// `SMS BC COMMAND`: one cell-broadcast block, always 23 bytes per TS 04.12.
pub fn sms_cb_command(bts_c0_chan_nr: u8, last_block: bool, payload: &[u8; 23]) -> Vec<u8> {
    let mut buf = Vec::new();
    dchan(msgtype::SMS_BC_CMD, bts_c0_chan_nr).encode(&mut buf);
    put_tv(&mut buf, IE_CB_CMD_TYPE, if last_block { 0x01 } else { 0x00 });
    put_tlv(&mut buf, IE_SMSCB_MESS, payload);
    buf
}

/// `BS POWER CONTROL`: instruct the BTS to change its downlink transmit power for an lchan.
pub fn chan_bs_power_ctrl(lchan: &Lchan) -> Vec<u8> {
    let mut buf = Vec::new();
    dchan(msgtype::BS_POWER_CONTROL, chan_nr_of(lchan)).encode(&mut buf);
    put_tv(&mut buf, IE_BS_POWER, lchan.power.bs_power);
    buf
}

/// `MS POWER CONTROL`: instruct the BTS to relay a new MS transmit power setting.
pub fn chan_ms_power_ctrl(lchan: &Lchan) -> Vec<u8> {
    let mut buf = Vec::new();
    dchan(msgtype::MS_POWER_CONTROL, chan_nr_of(lchan)).encode(&mut buf);
    put_tv(&mut buf, IE_MS_POWER, lchan.power.ms_power);
    buf
}

/// `CHANNEL MODE MODIFY REQUEST`: change an already-active lchan's mode in place.
pub fn chan_mode_modify_req(lchan: &Lchan, dtx_enabled_on_network: bool) -> Result<Vec<u8>> {
    let cm = channel_mode_from_lchan(lchan, dtx_enabled_on_network)?;
    let mut buf = Vec::new();
    dchan(msgtype::MODE_MODIFY_REQ, chan_nr_of(lchan)).encode(&mut buf);
    put_tlv(&mut buf, IE_CHAN_MODE, &cm.encode());
    Ok(buf)
}

/// `ENCRYPTION COMMAND`: assembled back-to-front with [`TwoEndedBuffer`] exactly like the
/// original's `rsl_encryption_cmd` — the L3 payload (already encoded by the caller) is pushed
/// first, then the encryption-info IE and the link IE are pushed in front of it, then finally
/// the header goes in front of everything.
pub fn encryption_cmd(lchan: &Lchan, sapi: u8, l3_payload: &[u8]) -> Vec<u8> {
    let mut l3_info = Vec::new();
    put_tl16v(&mut l3_info, IE_L3_INFO, l3_payload);

    let mut buf = TwoEndedBuffer::new();
    buf.push_back(&l3_info);

    let encr_info =
        codec::pack_encryption_info(lchan.encryption.algorithm_id, &lchan.encryption.key);
    let mut encr_ie = Vec::new();
    put_tlv(&mut encr_ie, IE_ENCR_INFO, &encr_info);
    buf.push_front(&encr_ie);

    buf.push_front(&[codec::IE_LINK_IDENT, link_id(sapi, false)]);
    buf.push_front(&[codec::IE_CHAN_NR, chan_nr_of(lchan)]);
    buf.push_front(&[
        codec::mdisc_by_msgtype(msgtype::ENCR_CMD).to_byte(),
        msgtype::ENCR_CMD,
    ]);

    buf.into_vec()
}

/// Siemens BS specific: `MS RF Power Capability Indication`. The payload is a single byte the
/// caller has already derived from an inbound measurement sample; this function only wraps it
/// in the DCHAN header and `IE_SIEMENS_MRPCI` tag.
pub fn siemens_mrpci(lchan: &Lchan, mrpci: u8) -> Vec<u8> {
    let mut buf = Vec::new();
    dchan(msgtype::SIEMENS_MRPCI, chan_nr_of(lchan)).encode(&mut buf);
    put_tv(&mut buf, IE_SIEMENS_MRPCI, mrpci);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LchanType;

    #[test]
    fn bcch_info_carries_sysinfo_type_and_payload() {
        let bytes = bcch_info(0x10, 0x01, &[0xAA; 18]);
        assert_eq!(bytes[0], codec::mdisc_by_msgtype(msgtype::BCCH_INFO).to_byte());
        assert_eq!(bytes[1], msgtype::BCCH_INFO);
    }

    #[test]
    fn encryption_cmd_prepends_in_reverse_order() {
        let mut lchan = Lchan::new(0, 0, 0, LchanType::Sdcch);
        lchan.encryption.algorithm_id = 1;
        let bytes = encryption_cmd(&lchan, 0, &[0xde, 0xad]);
        assert_eq!(bytes[1], msgtype::ENCR_CMD);
    }

    #[test]
    fn siemens_mrpci_carries_single_byte_payload() {
        let lchan = Lchan::new(0, 0, 0, LchanType::TchF);
        let bytes = siemens_mrpci(&lchan, 0x07);
        assert_eq!(bytes[1], msgtype::SIEMENS_MRPCI);
        assert_eq!(bytes[bytes.len() - 2], IE_SIEMENS_MRPCI);
        assert_eq!(bytes[bytes.len() - 1], 0x07);
    }
}
