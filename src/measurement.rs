//! Measurement and handover-detect ingest: `MEAS RES` and `HANDO DET`. Grounded in
//! `rsl_rx_meas_res` and `rsl_rx_hando_det`.
//!
//! ## Available Functions
//! - [`on_meas_res`](on_meas_res) - parses `MEAS RES`, raises [`Event::LchanMeasRep`].
//! - [`on_hando_det`](on_hando_det) - parses `HANDO DET`, raises
//!   [`Event::LchanHandoverDetect`].
//!
//! Both are dropped (debug log) unless the lchan is `ACTIVE` — a stale report for an lchan
//! already torn down carries no useful signal.

use crate::codec::parse_tlv;
use crate::error::{Result, RslError};
use crate::model::{Lchan, LchanState, MeasurementReport};
use crate::signal::{Event, EventSink};
use crate::vendor::VendorProfile;

pub const IE_UPLINK_MEAS: u8 = 0x19;
pub const IE_MEAS_RES_NR: u8 = 0x1b;
pub const IE_BS_POWER: u8 = 0x04;
pub const IE_MS_TIMING_OFFSET: u8 = 0x1d;
pub const IE_L1_INFO: u8 = 0x0a;
pub const IE_L3_INFO: u8 = 0x0b;
pub const IE_ACCESS_DELAY: u8 = 0x11;

/// Not-valid sentinel for the neighbour-cell count in the `L3_INFO` measurement report.
pub const NUM_CELL_NOT_VALID: u8 = 7;

/// `num_cell == 7` is "not valid"; otherwise up to six `(bsic, rx_lev)` pairs follow.
fn parse_neighbours(data: &[u8]) -> (bool, Vec<(u8, u8)>) {
    let Some(&num_cell) = data.first() else {
        return (false, Vec::new());
    };
    if num_cell == NUM_CELL_NOT_VALID {
        return (false, Vec::new());
    }
    let mut neighbours = Vec::new();
    let mut rest = &data[1..];
    for _ in 0..num_cell.min(6) {
        if rest.len() < 2 {
            break;
        }
        neighbours.push((rest[0], rest[1]));
        rest = &rest[2..];
    }
    (true, neighbours)
}

/// `MEAS RES`: mandatory `MEAS_RES_NR`/`UPLINK_MEAS`/`BS_POWER`, optional
/// `MS_TIMING_OFFSET`/`L1_INFO`/`L3_INFO`. Raises [`Event::LchanMeasRep`] only while `ACTIVE`.
///
/// Returns the uplink RSSI sample (`ul_rxlev_full`) so vendor quirks that echo measurement
/// samples back out (Siemens MRPCI) don't have to re-parse the report.
pub fn on_meas_res(lchan: &Lchan, vendor: &VendorProfile, sink: &mut dyn EventSink, data: &[u8]) -> Result<Option<u8>> {
    if lchan.state != LchanState::Active {
        log::debug!("{} MEAS RES dropped, not ACTIVE", lchan.name());
        return Ok(None);
    }

    let map = parse_tlv(data)?;
    let seq_nr = *map
        .get(&IE_MEAS_RES_NR)
        .and_then(|v| v.first())
        .ok_or(RslError::MissingIe(IE_MEAS_RES_NR))?;
    let uplink = map.get(&IE_UPLINK_MEAS).ok_or(RslError::MissingIe(IE_UPLINK_MEAS))?;
    if uplink.len() < 3 {
        return Err(RslError::Truncated);
    }
    let bs_power = *map.get(&IE_BS_POWER).and_then(|v| v.first()).ok_or(RslError::MissingIe(IE_BS_POWER))?;

    let dl_dtx = uplink[0] & 0x40 != 0;
    let ul_rxlev_full = uplink[0] & 0x3f;
    let ul_rxlev_sub = uplink[1] & 0x3f;
    let ul_rxqual_full = (uplink[2] >> 3) & 0x07;
    let ul_rxqual_sub = uplink[2] & 0x07;

    let ms_timing_offset = map.get(&IE_MS_TIMING_OFFSET).and_then(|v| v.first()).copied();

    let (ms_power, timing_advance) = match map.get(&IE_L1_INFO) {
        Some(l1) if l1.len() >= 2 => (Some(l1[0]), Some(vendor.decode_ta(l1[1]))),
        _ => (None, None),
    };

    let (neighbours_valid, neighbours) = match map.get(&IE_L3_INFO) {
        Some(l3) => parse_neighbours(l3),
        None => (false, Vec::new()),
    };

    let report = MeasurementReport {
        seq_nr,
        ul_rxlev_full,
        ul_rxlev_sub,
        ul_rxqual_full,
        ul_rxqual_sub,
        bs_power,
        dl_dtx,
        ms_timing_offset,
        ms_power,
        fpc: false,
        timing_advance,
        neighbours_valid,
        neighbours,
    };

    let rssi = report.ul_rxlev_full;
    sink.notify(Event::LchanMeasRep {
        trx_nr: lchan.trx_nr,
        ts_nr: lchan.ts_nr,
        idx: lchan.idx,
        report,
    });
    Ok(Some(rssi))
}

/// `HANDO DET`: optional `ACCESS_DELAY`, no state transition. Raises
/// [`Event::LchanHandoverDetect`] only while `ACTIVE`.
pub fn on_hando_det(lchan: &Lchan, sink: &mut dyn EventSink, data: &[u8]) -> Result<()> {
    if lchan.state != LchanState::Active {
        log::debug!("{} HANDO DET dropped, not ACTIVE", lchan.name());
        return Ok(());
    }
    let map = parse_tlv(data)?;
    let access_delay = map.get(&IE_ACCESS_DELAY).and_then(|v| v.first()).copied();
    sink.notify(Event::LchanHandoverDetect {
        trx_nr: lchan.trx_nr,
        ts_nr: lchan.ts_nr,
        idx: lchan.idx,
        access_delay,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::put_tlv;
    use crate::model::LchanType;
    use crate::signal::RecordingSink;
    use crate::vendor::BtsType;

    fn active_lchan() -> Lchan {
        let mut lchan = Lchan::new(0, 1, 0, LchanType::TchF);
        lchan.state = LchanState::Active;
        lchan
    }

    #[test]
    fn meas_res_dropped_when_not_active() {
        let lchan = Lchan::new(0, 1, 0, LchanType::TchF);
        let vendor = VendorProfile::for_type(BtsType::Generic);
        let mut sink = RecordingSink::default();
        let mut data = Vec::new();
        put_tlv(&mut data, IE_MEAS_RES_NR, &[0]);
        put_tlv(&mut data, IE_UPLINK_MEAS, &[0, 0, 0]);
        put_tlv(&mut data, IE_BS_POWER, &[5]);
        on_meas_res(&lchan, &vendor, &mut sink, &data).unwrap();
        assert!(sink.events.is_empty());
    }

    #[test]
    fn meas_res_decodes_dl_dtx_and_rxqual_bits() {
        let lchan = active_lchan();
        let vendor = VendorProfile::for_type(BtsType::Generic);
        let mut sink = RecordingSink::default();
        let mut data = Vec::new();
        put_tlv(&mut data, IE_MEAS_RES_NR, &[3]);
        put_tlv(&mut data, IE_UPLINK_MEAS, &[0x40 | 20, 15, (5 << 3) | 2]);
        put_tlv(&mut data, IE_BS_POWER, &[7]);
        let rssi = on_meas_res(&lchan, &vendor, &mut sink, &data).unwrap();
        assert_eq!(rssi, Some(20));
        match &sink.events[0] {
            Event::LchanMeasRep { report, .. } => {
                assert!(report.dl_dtx);
                assert_eq!(report.ul_rxlev_full, 20);
                assert_eq!(report.ul_rxqual_full, 5);
                assert_eq!(report.ul_rxqual_sub, 2);
            }
            _ => panic!("wrong event"),
        }
    }

    #[test]
    fn meas_res_shifts_ta_right_for_bs11() {
        let lchan = active_lchan();
        let vendor = VendorProfile::for_type(BtsType::Bs11);
        let mut sink = RecordingSink::default();
        let mut data = Vec::new();
        put_tlv(&mut data, IE_MEAS_RES_NR, &[0]);
        put_tlv(&mut data, IE_UPLINK_MEAS, &[0, 0, 0]);
        put_tlv(&mut data, IE_BS_POWER, &[0]);
        put_tlv(&mut data, IE_L1_INFO, &[10, 20]);
        on_meas_res(&lchan, &vendor, &mut sink, &data).unwrap();
        match &sink.events[0] {
            Event::LchanMeasRep { report, .. } => assert_eq!(report.timing_advance, Some(5)),
            _ => panic!("wrong event"),
        }
    }

    #[test]
    fn num_cell_seven_marks_neighbours_not_valid() {
        let lchan = active_lchan();
        let vendor = VendorProfile::for_type(BtsType::Generic);
        let mut sink = RecordingSink::default();
        let mut data = Vec::new();
        put_tlv(&mut data, IE_MEAS_RES_NR, &[0]);
        put_tlv(&mut data, IE_UPLINK_MEAS, &[0, 0, 0]);
        put_tlv(&mut data, IE_BS_POWER, &[0]);
        put_tlv(&mut data, IE_L3_INFO, &[7]);
        on_meas_res(&lchan, &vendor, &mut sink, &data).unwrap();
        match &sink.events[0] {
            Event::LchanMeasRep { report, .. } => {
                assert!(!report.neighbours_valid);
                assert!(report.neighbours.is_empty());
            }
            _ => panic!("wrong event"),
        }
    }

    #[test]
    fn hando_det_carries_optional_access_delay() {
        let lchan = active_lchan();
        let mut sink = RecordingSink::default();
        let mut data = Vec::new();
        put_tlv(&mut data, IE_ACCESS_DELAY, &[9]);
        on_hando_det(&lchan, &mut sink, &data).unwrap();
        match &sink.events[0] {
            Event::LchanHandoverDetect { access_delay, .. } => assert_eq!(*access_delay, Some(9)),
            _ => panic!("wrong event"),
        }
    }

    #[test]
    fn hando_det_dropped_when_not_active() {
        let lchan = Lchan::new(0, 1, 0, LchanType::TchF);
        let mut sink = RecordingSink::default();
        on_hando_det(&lchan, &mut sink, &[]).unwrap();
        assert!(sink.events.is_empty());
    }
}
