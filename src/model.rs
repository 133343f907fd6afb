//! Data model: BTS / TRX / timeslot / lchan and the records that travel between them.
//!
//! ## Available Types
//! - [`Bts`](Bts), [`Trx`](Trx), [`Timeslot`](Timeslot), [`Lchan`](Lchan) - the cell topology,
//!   leaves last.
//! - [`MeasurementReport`](MeasurementReport) - parsed `MEAS RES` payload.
//! - [`PagingRequest`](PagingRequest) - one pending page.

use crate::config::BtsTimers;
use crate::timer::TimerHandle;
use crate::vendor::{BtsType, VendorProfile};

/// Minimal ad-hoc bitflags, local to this crate so we don't pull in the `bitflags` crate for a
/// single one-bit field.
macro_rules! bitflags_like {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $ty:ty {
            $(const $variant:ident = $val:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub struct $name($ty);

        impl $name {
            $(pub const $variant: $name = $name($val);)*

            pub const fn empty() -> Self {
                $name(0)
            }

            pub fn contains(&self, other: $name) -> bool {
                (self.0 & other.0) == other.0
            }

            pub fn insert(&mut self, other: $name) {
                self.0 |= other.0;
            }

            pub fn remove(&mut self, other: $name) {
                self.0 &= !other.0;
            }
        }
    };
}

/// Frequency band a BTS operates in. Only used for logging/info; not interpreted by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Band {
    Gsm900,
    Dcs1800,
    Pcs1900,
    Gsm850,
}

/// Physical-channel configuration of a timeslot (`pchan` in the original).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PchanKind {
    None,
    CcchSdcch4,
    TchF,
    TchH,
    Sdcch8,
    Ccch,
    Pdch,
    TchFPdch,
}

/// Hopping descriptor attached to a timeslot.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Hopping {
    pub enabled: bool,
    pub mobile_allocation: Vec<u8>,
}

bitflags_like! {
    /// Per-timeslot flags.
    pub struct TimeslotFlags: u8 {
        const PDCH_ACTIVE = 0x01;
    }
}

/// Logical type of an lchan, independent of its current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LchanType {
    None,
    Sdcch,
    TchF,
    TchH,
}

/// `rsl_cmode`: the coarse RSL channel mode (signalling vs. speech vs. data).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RslCmode {
    Signalling,
    Speech,
    Data,
}

/// `tch_mode`: what a traffic channel actually carries once activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TchMode {
    Sign,
    SpeechV1,
    SpeechEfr,
    SpeechAmr,
    Data,
}

/// CSD (circuit-switched data) sub-mode, only meaningful when `tch_mode == Data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CsdMode {
    NtRlp14k5,
    NtRlp12k0,
    NtRlp6k0,
    TrSpeed600,
    TrSpeed1200,
    TrSpeed2400,
    TrSpeed4800,
    TrSpeed9600,
    TrSpeed14400,
    TrSpeed32000,
}

/// Per-lchan ciphering record.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Encryption {
    pub algorithm_id: u8,
    pub key: Vec<u8>,
}

/// One of the up to eight SAPI entries on an lchan's RLL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SapiState {
    Unused,
    Ms,
    Net,
}

/// Power control settings for an lchan.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerLevels {
    pub bs_power: u8,
    pub ms_power: u8,
}

/// Captured RACH reference, held while an IMMEDIATE ASSIGN is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RequestReference {
    pub ra: u8,
    pub frame_number: u32,
}

/// Pending RACH request captured on CHAN RQD, consumed exactly once by IMMEDIATE ASSIGN.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PendingAssignment {
    pub rqd_ref: RequestReference,
    pub rqd_ta: u8,
    /// Hopping mobile-allocation bytes copied from the timeslot at `CHAN RQD` time, carried
    /// through so `IMMEDIATE ASSIGN` can echo them back to the MS per §4.5.
    pub mobile_allocation: Vec<u8>,
}

/// ip.access vendor RTP endpoint record attached to an lchan.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IpaRtpRecord {
    pub conn_id: u16,
    pub bound_ip: u32,
    pub bound_port: u16,
    pub connect_ip: u32,
    pub connect_port: u16,
    pub speech_mode: u8,
    pub rtp_payload: u8,
    pub rtp_payload2: u8,
}

/// lchan lifecycle state. See the state machine in the RSL controller design for transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LchanState {
    None,
    ActReq,
    Active,
    RelReq,
    RelErr,
    Broken,
}

/// A single logical channel: back-pointer to its timeslot, current mode/state, timers and
/// the vendor-facing RTP record. Lchans are never created or destroyed at runtime; only their
/// fields mutate across a session (CHAN RQD ingestion through RF CHAN REL ACK or BROKEN).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Lchan {
    pub trx_nr: u8,
    pub ts_nr: u8,
    pub idx: u8,
    pub lchan_type: LchanType,
    /// Physical-channel configuration of the owning timeslot, carried onto the lchan itself so
    /// [`crate::registry::chan_nr_of`] can tell SDCCH/4 from SDCCH/8 sub-channel numbering
    /// without needing the `Timeslot` back.
    pub pchan: PchanKind,
    pub state: LchanState,
    pub rsl_cmode: RslCmode,
    pub tch_mode: TchMode,
    pub csd_mode: Option<CsdMode>,
    pub encryption: Encryption,
    pub power: PowerLevels,
    pub sapis: [SapiState; 8],
    pub pending: Option<PendingAssignment>,
    pub act_timer: Option<TimerHandle>,
    pub t3101: Option<TimerHandle>,
    pub t3109: Option<TimerHandle>,
    pub t3111: Option<TimerHandle>,
    pub error_timer: Option<TimerHandle>,
    pub abis_ip: IpaRtpRecord,
    pub sacch_deactivate_pending: bool,
    pub error_cause: Option<u8>,
}

impl Lchan {
    pub fn new(trx_nr: u8, ts_nr: u8, idx: u8, lchan_type: LchanType) -> Self {
        let pchan = match lchan_type {
            LchanType::Sdcch => PchanKind::Sdcch8,
            LchanType::TchF => PchanKind::TchF,
            LchanType::TchH => PchanKind::TchH,
            LchanType::None => PchanKind::None,
        };
        Lchan {
            trx_nr,
            ts_nr,
            idx,
            lchan_type,
            pchan,
            state: LchanState::None,
            rsl_cmode: RslCmode::Signalling,
            tch_mode: TchMode::Sign,
            csd_mode: None,
            encryption: Encryption::default(),
            power: PowerLevels::default(),
            sapis: [SapiState::Unused; 8],
            pending: None,
            act_timer: None,
            t3101: None,
            t3109: None,
            t3111: None,
            error_timer: None,
            abis_ip: IpaRtpRecord::default(),
            sacch_deactivate_pending: false,
            error_cause: None,
        }
    }

    /// Name used in log lines: `(trx,ts,idx)`.
    pub fn name(&self) -> String {
        format!(
            "(trx={},ts={},ss={})",
            self.trx_nr, self.ts_nr, self.idx
        )
    }

    pub fn any_sapi_active(&self) -> bool {
        self.sapis.iter().any(|s| *s != SapiState::Unused)
    }
}

/// A timeslot holds up to eight lchans depending on `pchan`.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timeslot {
    pub nr: u8,
    pub pchan: PchanKind,
    pub hopping: Hopping,
    pub flags: TimeslotFlags,
    pub lchans: Vec<Lchan>,
}

impl Timeslot {
    pub fn new(trx_nr: u8, nr: u8, pchan: PchanKind) -> Self {
        let count = match pchan {
            PchanKind::None => 0,
            PchanKind::CcchSdcch4 => 4,
            PchanKind::Sdcch8 => 8,
            PchanKind::Ccch => 1,
            PchanKind::TchF | PchanKind::TchFPdch => 1,
            PchanKind::TchH => 2,
            PchanKind::Pdch => 0,
        };
        let lchan_type = match pchan {
            PchanKind::CcchSdcch4 | PchanKind::Sdcch8 => LchanType::Sdcch,
            PchanKind::TchF | PchanKind::TchFPdch => LchanType::TchF,
            PchanKind::TchH => LchanType::TchH,
            _ => LchanType::None,
        };
        let lchans = (0..count)
            .map(|i| {
                let mut lchan = Lchan::new(trx_nr, nr, i as u8, lchan_type);
                lchan.pchan = pchan;
                lchan
            })
            .collect();
        Timeslot {
            nr,
            pchan,
            hopping: Hopping::default(),
            flags: TimeslotFlags::empty(),
            lchans,
        }
    }
}

/// A TRX belongs to a BTS and exposes eight timeslots plus its signalling link handle.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Trx {
    pub nr: u8,
    pub arfcn: u16,
    pub timeslots: Vec<Timeslot>,
    pub link: crate::dispatch::TransportLink,
}

impl Trx {
    pub fn new(nr: u8, arfcn: u16, link: crate::dispatch::TransportLink) -> Self {
        let timeslots = (0..8).map(|n| Timeslot::new(nr, n, PchanKind::None)).collect();
        Trx { nr, arfcn, timeslots, link }
    }
}

/// Channel-request counters, mirroring `bts->network->stats.chreq.*`.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChreqStats {
    pub total: u32,
    pub no_channel: u32,
}

/// A cell. Owns its TRXes, its per-network timer constants and its vendor profile.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Bts {
    pub nr: u8,
    pub bts_type: BtsType,
    pub band: Band,
    pub ms_max_power: u8,
    pub neci: bool,
    pub timers: BtsTimers,
    pub bs_pa_mfrms: u8,
    pub bs_ag_blks_res: u8,
    pub trxs: Vec<Trx>,
    pub stats: ChreqStats,
}

impl Bts {
    pub fn vendor_profile(&self) -> VendorProfile {
        VendorProfile::for_type(self.bts_type)
    }

    pub fn c0(&self) -> &Trx {
        &self.trxs[0]
    }

    /// Number of CCCH-capable physical channels across the cell, derived from timeslot
    /// configuration rather than carried as a separate counter (`get_paging_group`'s
    /// `bs_cc_chans` input, per §4.10).
    pub fn bs_cc_chans(&self) -> u8 {
        self.trxs
            .iter()
            .flat_map(|trx| trx.timeslots.iter())
            .filter(|ts| matches!(ts.pchan, PchanKind::Ccch | PchanKind::CcchSdcch4))
            .count() as u8
    }
}

/// Parsed `MEAS RES` body.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MeasurementReport {
    pub seq_nr: u8,
    pub ul_rxlev_full: u8,
    pub ul_rxlev_sub: u8,
    pub ul_rxqual_full: u8,
    pub ul_rxqual_sub: u8,
    pub bs_power: u8,
    pub dl_dtx: bool,
    pub ms_timing_offset: Option<u8>,
    pub ms_power: Option<u8>,
    pub fpc: bool,
    pub timing_advance: Option<u8>,
    pub neighbours_valid: bool,
    pub neighbours: Vec<(u8, u8)>,
}

/// One pending page. `retry_count` is bumped on every PAGING CMD sent for it and the request
/// is evicted once it exceeds `MAX_PAGING_REQUEST`.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PagingRequest {
    pub imsi: String,
    pub tmsi: Option<u32>,
    pub chan_needed: u8,
    pub retry_count: u32,
}

pub const MAX_PAGING_REQUEST: u32 = 750;

impl PagingRequest {
    pub fn new(imsi: impl Into<String>, tmsi: Option<u32>, chan_needed: u8) -> Self {
        PagingRequest {
            imsi: imsi.into(),
            tmsi,
            chan_needed,
            retry_count: 0,
        }
    }

    pub fn subscriber_key(&self) -> &str {
        &self.imsi
    }
}
