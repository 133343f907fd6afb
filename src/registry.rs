//! Channel registry: `chan_nr` <-> lchan lookup.
//!
//! ## Available Functions
//! - [`decode_chan_nr`](decode_chan_nr) - `chan_nr` byte to `(PchanKind, lch_idx, ts_nr)`.
//! - [`lookup`](lookup) - resolve a `(trx, chan_nr)` pair to an lchan.
//! - [`chan_nr_of`](chan_nr_of) - the exact inverse, used to re-derive `chan_nr` for logging
//!   and for the round-trip testable property.

use crate::model::{Lchan, LchanType, PchanKind, Trx};

/// Decoded shape of a `chan_nr` byte, independent of whether a physical timeslot actually
/// backs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChanNrShape {
    pub ts_nr: u8,
    pub lch_idx: u8,
    pub expected_pchan: &'static [PchanKind],
    pub lchan_type: LchanType,
}

/// Decode the channel-kind/subchannel bits of a `chan_nr` byte. Returns `None` for
/// combinations the table does not recognise (callers log and drop).
pub fn decode_chan_nr(chan_nr: u8) -> Option<ChanNrShape> {
    let ts_nr = chan_nr & 0x07;
    let cbits = chan_nr >> 3;
    if cbits == 0x01 {
        Some(ChanNrShape {
            ts_nr,
            lch_idx: 0,
            expected_pchan: &[PchanKind::TchF, PchanKind::Pdch, PchanKind::TchFPdch],
            lchan_type: LchanType::TchF,
        })
    } else if cbits & 0x1E == 0x02 {
        Some(ChanNrShape {
            ts_nr,
            lch_idx: cbits & 0x01,
            expected_pchan: &[PchanKind::TchH],
            lchan_type: LchanType::TchH,
        })
    } else if cbits & 0x1C == 0x04 {
        Some(ChanNrShape {
            ts_nr,
            lch_idx: cbits & 0x03,
            expected_pchan: &[PchanKind::CcchSdcch4],
            lchan_type: LchanType::Sdcch,
        })
    } else if cbits & 0x18 == 0x08 {
        Some(ChanNrShape {
            ts_nr,
            lch_idx: cbits & 0x07,
            expected_pchan: &[PchanKind::Sdcch8],
            lchan_type: LchanType::Sdcch,
        })
    } else if matches!(cbits, 0x10 | 0x11 | 0x12) {
        Some(ChanNrShape {
            ts_nr,
            lch_idx: 0,
            expected_pchan: &[PchanKind::Ccch, PchanKind::CcchSdcch4],
            lchan_type: LchanType::None,
        })
    } else {
        None
    }
}

/// Look up the lchan addressed by `chan_nr` on `trx`. A mismatch between the decoded kind and
/// the timeslot's configured `pchan` is logged but not fatal — the BTS's own framing is
/// authoritative and the lchan is still returned.
pub fn lookup(trx: &Trx, chan_nr: u8) -> Option<&Lchan> {
    let shape = decode_chan_nr(chan_nr)?;
    let ts = trx.timeslots.get(shape.ts_nr as usize)?;
    if !shape.expected_pchan.contains(&ts.pchan) {
        log::warn!(
            "chan_nr 0x{:02x} decodes to {:?} but ts{} is configured as {:?}",
            chan_nr,
            shape.lchan_type,
            shape.ts_nr,
            ts.pchan
        );
    }
    ts.lchans.get(shape.lch_idx as usize)
}

pub fn lookup_mut(trx: &mut Trx, chan_nr: u8) -> Option<&mut Lchan> {
    let shape = decode_chan_nr(chan_nr)?;
    let ts = trx.timeslots.get_mut(shape.ts_nr as usize)?;
    ts.lchans.get_mut(shape.lch_idx as usize)
}

/// Human-readable lchan name for logs: `(trx,ts,idx)`.
pub fn lchan_name(lchan: &Lchan) -> String {
    lchan.name()
}

/// Re-derive the `chan_nr` byte for an lchan. Exact inverse of [`decode_chan_nr`]; used by the
/// round-trip testable property and by log lines that want the wire byte rather than the
/// struct fields.
pub fn chan_nr_of(lchan: &Lchan) -> u8 {
    let cbits: u8 = match lchan.lchan_type {
        LchanType::TchF => 0x01,
        LchanType::TchH => 0x02 | (lchan.idx & 0x01),
        // Sub-channel cbits depend on the *timeslot's* physical configuration, not on the
        // sub-channel index: an SDCCH/8+SACCH8C timeslot uses 0x08|idx for every idx 0-7,
        // while an SDCCH/4+SACCH4C (CCCH combined) timeslot uses 0x04|idx for idx 0-3.
        LchanType::Sdcch if lchan.pchan == PchanKind::CcchSdcch4 => 0x04 | (lchan.idx & 0x03),
        LchanType::Sdcch => 0x08 | (lchan.idx & 0x07),
        LchanType::None => 0x10,
    };
    (cbits << 3) | (lchan.ts_nr & 0x07)
}
