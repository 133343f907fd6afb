//! Dispatch loop: the single ingress entry point for inbound RSL bytes, and the transport /
//! L3 boundary types the rest of the crate is parameterised over. Grounded in `abis_rsl.c`'s
//! `abis_rsl_rcvmsg` top-level `msg_discr` switch and the per-discriminator sub-switches on
//! `msg_type`.
//!
//! ## Available Types
//! - [`TransportLink`](TransportLink) - opaque per-RSL-link handle.
//! - [`Transport`](Transport) - the `enqueue(link, bytes)` egress boundary.
//! - [`L3Sink`](L3Sink) - the `L3.receive(lchan, link_id, bytes)` boundary for RLL data/
//!   establish indications, out of scope beyond this interface.
//! - [`RslController`](RslController) - owns the BTS list, the paging registry and one
//!   [`TimerWheel`](crate::timer::TimerWheel) per BTS; [`RslController::deliver`] is
//!   `Transport.deliver(bytes) -> into RSL`.
//!
//! ## Available Functions
//! - [`RslController::deliver`](RslController::deliver) - route one inbound frame.
//! - [`RslController::poll_timers`](RslController::poll_timers) - replay fired timer handles.

use std::collections::HashMap;

use crate::chan_request::{self, Allocator};
use crate::codec::{self, parse_tlv, DchanHeader, Discriminator, RllHeader};
use crate::config::NetworkConfig;
use crate::error::{Result, RslError};
use crate::ipaccess;
use crate::lchan;
use crate::measurement;
use crate::model::{Bts, LchanState};
use crate::msgtype;
use crate::paging::PagingRegistry;
use crate::registry;
use crate::release::IE_CAUSE;
use crate::signal::EventSink;
use crate::timer::{Instant, TimerKind, TimerOwner, TimerWheel};

/// Opaque per-RSL-link handle. The core never interprets this beyond equality; the caller's
/// transport layer owns the mapping to a real socket/file descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransportLink(pub u32);

/// `Transport.send(link, bytes)`: the only egress primitive. Out of scope for this crate
/// beyond the interface — framing, retransmission and the physical A-bis carrier live outside
/// the RSL core.
pub trait Transport {
    fn enqueue(&mut self, link: TransportLink, bytes: Vec<u8>);
}

/// `L3.receive(lchan, link_id, bytes)`: the layer-3 (GSM 04.08) mobility/call-control boundary
/// that consumes RLL DATA/UNIT DATA/EST indications. Out of scope beyond this interface.
pub trait L3Sink {
    fn receive(&mut self, trx_nr: u8, ts_nr: u8, idx: u8, link_id: u8, data: &[u8]);
}

/// An [`L3Sink`] that discards everything, for callers/tests that don't exercise layer 3.
#[derive(Debug, Default)]
pub struct NullL3Sink;

impl L3Sink for NullL3Sink {
    fn receive(&mut self, _trx_nr: u8, _ts_nr: u8, _idx: u8, _link_id: u8, _data: &[u8]) {}
}

/// A [`Transport`] that records every enqueue, for tests.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub sent: Vec<(TransportLink, Vec<u8>)>,
}

impl Transport for RecordingTransport {
    fn enqueue(&mut self, link: TransportLink, bytes: Vec<u8>) {
        self.sent.push((link, bytes));
    }
}

/// RLL cause "T200 expired (N200+1 retransmissions)". As with [`crate::msgtype`], the
/// retrieval pack carries the call site (`rsl_rx_rll_err_ind`'s cause switch) but not the
/// header defining the numeric cause space, so this is this crate's own placeholder value for
/// the one cause this crate's control flow branches on; every other cause is passed to L3
/// unexamined, matching §7's propagation policy. See `DESIGN.md`.
pub const RLL_CAUSE_T200_EXPIRED: u8 = 0x01;

/// The RSL controller: owns the BTS list, one [`TimerWheel`] per BTS and the paging registry.
/// Collaborators that cross the crate boundary (the allocator, the transport, the event sink,
/// the L3 receiver) are passed into [`deliver`](RslController::deliver) and
/// [`poll_timers`](RslController::poll_timers) rather than stored, the same way
/// [`chan_request::on_chan_rqd`] takes its [`Allocator`] by reference: this crate holds no
/// opinion on their lifetimes or concrete types.
#[derive(Debug, Default)]
pub struct RslController {
    pub bts_list: Vec<Bts>,
    pub paging: PagingRegistry,
    pub network: NetworkConfig,
    timers: HashMap<u8, TimerWheel>,
}

impl RslController {
    pub fn new(network: NetworkConfig) -> Self {
        RslController {
            bts_list: Vec::new(),
            paging: PagingRegistry::new(),
            network,
            timers: HashMap::new(),
        }
    }

    /// Register a BTS and give it its own timer wheel. BTSes are never removed at runtime.
    pub fn add_bts(&mut self, bts: Bts) {
        self.timers.entry(bts.nr).or_insert_with(TimerWheel::new);
        self.bts_list.push(bts);
    }

    fn bts_mut(&mut self, bts_nr: u8) -> Option<&mut Bts> {
        self.bts_list.iter_mut().find(|b| b.nr == bts_nr)
    }

    /// Position in `bts_list`, used when a function also needs a disjoint mutable borrow of
    /// `self.timers`: going through [`bts_mut`](Self::bts_mut) would hold all of `self`
    /// borrowed for as long as the returned `&mut Bts` lives, which is incompatible with a
    /// later `self.timers.get_mut(...)` in the same scope.
    fn bts_pos(&self, bts_nr: u8) -> Option<usize> {
        self.bts_list.iter().position(|b| b.nr == bts_nr)
    }

    fn bts(&self, bts_nr: u8) -> Option<&Bts> {
        self.bts_list.iter().find(|b| b.nr == bts_nr)
    }

    fn find_trx(&self, link: TransportLink) -> Option<(u8, u8)> {
        for bts in &self.bts_list {
            for trx in &bts.trxs {
                if trx.link == link {
                    return Some((bts.nr, trx.nr));
                }
            }
        }
        None
    }

    /// `Transport.deliver(bytes) -> into RSL`: the single ingress entry point. Routes by
    /// `msg_discr & 0xFE` to one of {RLL, DCHAN, CCHAN, TRX, IPACCESS, LOCATION}; LOCATION is
    /// recognised but not implemented (logged at notice level). Frames shorter than the common
    /// header are dropped with a debug log, not an error, per §4.11.
    #[allow(clippy::too_many_arguments)]
    pub fn deliver(
        &mut self,
        alloc: &mut dyn Allocator,
        transport: &mut dyn Transport,
        sink: &mut dyn EventSink,
        l3: &mut dyn L3Sink,
        link: TransportLink,
        now: Instant,
        data: &[u8],
    ) -> Result<()> {
        if data.len() < 2 {
            log::debug!("RSL frame shorter than common header, dropped");
            return Ok(());
        }
        let Some((bts_nr, trx_nr)) = self.find_trx(link) else {
            log::warn!("RSL frame on unknown transport link, dropped");
            return Ok(());
        };
        let Some(discr) = Discriminator::from_byte(data[0]) else {
            return Err(RslError::UnknownDiscriminator(data[0]));
        };

        match discr {
            Discriminator::Rll => self.dispatch_rll(bts_nr, trx_nr, transport, l3, now, data),
            Discriminator::DedicatedChannel => {
                self.dispatch_dchan(bts_nr, trx_nr, alloc, transport, sink, now, data)
            }
            Discriminator::CommonChannel => {
                self.dispatch_cchan(bts_nr, trx_nr, alloc, transport, sink, now, data)
            }
            Discriminator::Trx => {
                log::info!("TRX discriminator recognised but not implemented (msg_type=0x{:02x})", data[1]);
                Ok(())
            }
            Discriminator::IpAccess => self.dispatch_ipaccess(bts_nr, trx_nr, sink, data),
            Discriminator::Location => {
                log::info!("LOCATION discriminator recognised but not implemented (msg_type=0x{:02x})", data[1]);
                Ok(())
            }
        }
    }

    fn dispatch_rll(
        &mut self,
        bts_nr: u8,
        trx_nr: u8,
        transport: &mut dyn Transport,
        l3: &mut dyn L3Sink,
        now: Instant,
        data: &[u8],
    ) -> Result<()> {
        let (hdr, body) = RllHeader::decode(data)?;
        let pos = self.bts_pos(bts_nr).ok_or(RslError::UnknownChannel(hdr.chan_nr))?;
        let bts = &mut self.bts_list[pos];
        let link = bts.trxs[trx_nr as usize].link;
        let timers = bts.timers;
        let trx = &mut bts.trxs[trx_nr as usize];
        let Some(lchan) = registry::lookup_mut(trx, hdr.chan_nr) else {
            return Err(RslError::UnknownChannel(hdr.chan_nr));
        };
        let sapi = codec::sapi_of(hdr.link_id);

        match hdr.common.msg_type {
            msgtype::DATA_IND | msgtype::UNIT_DATA_IND => {
                l3.receive(lchan.trx_nr, lchan.ts_nr, lchan.idx, hdr.link_id, body);
            }
            msgtype::EST_IND => {
                lchan.sapis[sapi as usize] = crate::model::SapiState::Ms;
                l3.receive(lchan.trx_nr, lchan.ts_nr, lchan.idx, hdr.link_id, body);
            }
            msgtype::EST_CONF => {
                lchan.sapis[sapi as usize] = crate::model::SapiState::Net;
            }
            msgtype::REL_IND | msgtype::REL_CONF => {
                lchan.sapis[sapi as usize] = crate::model::SapiState::Unused;
                if lchan.state == LchanState::RelReq && !lchan.any_sapi_active() {
                    let wheel = self.timers.get_mut(&bts_nr).expect("bts timer wheel");
                    wheel.cancel(crate::timer::TimerHandle::lchan(
                        lchan.trx_nr,
                        lchan.ts_nr,
                        lchan.idx,
                        TimerKind::T3109,
                    ));
                    lchan.t3109 = None;
                    let t3111 = crate::timer::TimerHandle::lchan(
                        lchan.trx_nr,
                        lchan.ts_nr,
                        lchan.idx,
                        TimerKind::T3111,
                    );
                    wheel.schedule(t3111, now, crate::timer::Duration::from_secs(timers.t3111_secs as u64));
                    lchan.t3111 = Some(t3111);
                }
            }
            msgtype::ERROR_IND => {
                let cause = body.first().copied().unwrap_or(0);
                if cause == RLL_CAUSE_T200_EXPIRED {
                    lchan.sacch_deactivate_pending = lchan.lchan_type != crate::model::LchanType::Sdcch;
                    let outcome = lchan::on_rf_chan_rel(lchan, self.timers.get_mut(&bts_nr).expect("wheel"), now, &timers, true);
                    for msg in outcome.messages {
                        transport.enqueue(link, msg);
                    }
                } else {
                    log::warn!("{} RLL ERROR IND cause 0x{:02x}, passed to L3", lchan.name(), cause);
                    l3.receive(lchan.trx_nr, lchan.ts_nr, lchan.idx, hdr.link_id, body);
                }
            }
            _ => {
                log::info!("unhandled RLL msg_type 0x{:02x}", hdr.common.msg_type);
            }
        }
        Ok(())
    }

    fn dispatch_dchan(
        &mut self,
        bts_nr: u8,
        trx_nr: u8,
        alloc: &mut dyn Allocator,
        transport: &mut dyn Transport,
        sink: &mut dyn EventSink,
        now: Instant,
        data: &[u8],
    ) -> Result<()> {
        let (hdr, body) = DchanHeader::decode(data)?;
        let pos = self.bts_pos(bts_nr).ok_or(RslError::UnknownChannel(hdr.chan_nr))?;
        let bts = &mut self.bts_list[pos];
        let link = bts.trxs[trx_nr as usize].link;
        let timers = bts.timers;
        let vendor = bts.vendor_profile();
        let trx = &mut bts.trxs[trx_nr as usize];
        let Some(lchan) = registry::lookup_mut(trx, hdr.chan_nr) else {
            return Err(RslError::UnknownChannel(hdr.chan_nr));
        };

        match hdr.common.msg_type {
            msgtype::CHAN_ACTIV_ACK => {
                let wheel = self.timers.get_mut(&bts_nr).expect("wheel");
                let msgs = lchan::on_chan_activ_ack(lchan, wheel, now, &timers, &vendor, sink);
                for msg in msgs {
                    transport.enqueue(link, msg);
                }
            }
            msgtype::CHAN_ACTIV_NACK => {
                let map = parse_tlv(body)?;
                let cause = map.get(&IE_CAUSE).and_then(|v| v.first()).copied().unwrap_or(0xff);
                let wheel = self.timers.get_mut(&bts_nr).expect("wheel");
                lchan::on_chan_activ_nack(lchan, wheel, cause, sink);
                if lchan.state == LchanState::RelReq {
                    let msg = crate::release::direct_rf_release(lchan);
                    transport.enqueue(link, msg);
                }
            }
            msgtype::CONN_FAIL => {
                lchan.sacch_deactivate_pending = true;
                let wheel = self.timers.get_mut(&bts_nr).expect("wheel");
                let outcome = lchan::on_rf_chan_rel(lchan, wheel, now, &timers, true);
                for msg in outcome.messages {
                    transport.enqueue(link, msg);
                }
            }
            msgtype::RF_CHAN_REL_ACK => {
                let (trx_idx, ts_idx, lchan_idx) = (lchan.trx_nr, lchan.ts_nr, lchan.idx);
                let was_broken = lchan.state == LchanState::Broken;
                let wheel = self.timers.get_mut(&bts_nr).expect("wheel");
                lchan::on_rf_chan_rel_ack(lchan, wheel);
                if !was_broken {
                    alloc.release(&mut self.bts_list[pos], trx_idx, ts_idx, lchan_idx);
                }
            }
            msgtype::MEAS_RES => {
                if let Some(rssi) = measurement::on_meas_res(lchan, &vendor, sink, body)? {
                    if vendor.sends_siemens_mrpci {
                        transport.enqueue(link, crate::messages::siemens_mrpci(lchan, rssi));
                    }
                }
            }
            msgtype::HANDO_DET => {
                measurement::on_hando_det(lchan, sink, body)?;
            }
            msgtype::MODE_MODIFY_ACK | msgtype::MODE_MODIFY_NACK => {
                log::info!("{} mode modify response, msg_type 0x{:02x}", lchan.name(), hdr.common.msg_type);
            }
            _ => {
                log::info!("unhandled DCHAN msg_type 0x{:02x}", hdr.common.msg_type);
            }
        }
        Ok(())
    }

    fn dispatch_cchan(
        &mut self,
        bts_nr: u8,
        trx_nr: u8,
        alloc: &mut dyn Allocator,
        transport: &mut dyn Transport,
        sink: &mut dyn EventSink,
        now: Instant,
        data: &[u8],
    ) -> Result<()> {
        let (hdr, body) = DchanHeader::decode(data)?;
        let _ = trx_nr;
        match hdr.common.msg_type {
            msgtype::CHAN_RQD => {
                let pos = self.bts_pos(bts_nr).ok_or(RslError::UnknownChannel(hdr.chan_nr))?;
                let bts = &mut self.bts_list[pos];
                let link = bts.c0().link;
                let dtx_enabled = self.network.dtx_enabled;
                let wheel = self.timers.get_mut(&bts_nr).expect("wheel");
                let msgs = chan_request::on_chan_rqd(bts, alloc, wheel, now, dtx_enabled, body)?;
                for msg in msgs {
                    transport.enqueue(link, msg);
                }
            }
            msgtype::CCCH_LOAD_IND => {
                self.rx_ccch_load(bts_nr, sink, body)?;
            }
            _ => {
                log::info!("unhandled CCHAN msg_type 0x{:02x}", hdr.common.msg_type);
            }
        }
        Ok(())
    }

    /// `rsl_rx_ccch_load`: leading byte selects PCH (1-byte load) or RACH (2-byte slot count +
    /// 1-byte busy percent) sub-type. Per the Open Question this governs, the RACH arm
    /// requires `data_len >= 8` (the original's `data_len >= 7` guard reads `data[7]`, one
    /// byte past what it checked for).
    fn rx_ccch_load(&mut self, bts_nr: u8, sink: &mut dyn EventSink, data: &[u8]) -> Result<()> {
        let Some(&sub_type) = data.first() else {
            return Err(RslError::Truncated);
        };
        match sub_type {
            msgtype::CCCH_LOAD_IND_PCH => {
                if data.len() < 2 {
                    return Err(RslError::Truncated);
                }
                let mut load = data[1] as u16;
                if load == 0xffff {
                    let vendor = self.bts(bts_nr).map(|b| b.vendor_profile());
                    if let Some(over) = vendor.and_then(|v| v.ccch_paging_load_sentinel_override) {
                        load = over;
                    }
                }
                sink.notify(crate::signal::Event::CcchPagingLoad { bts_nr, load });
            }
            msgtype::CCCH_LOAD_IND_RACH => {
                if data.len() < 8 {
                    return Err(RslError::Truncated);
                }
                let slot_count = ((data[5] as u16) << 8) | data[6] as u16;
                let busy_percent = data[7];
                sink.notify(crate::signal::Event::CcchRachLoad { bts_nr, slot_count, busy_percent });
            }
            other => {
                log::info!("unhandled CCCH LOAD IND sub-type 0x{:02x}", other);
            }
        }
        Ok(())
    }

    fn dispatch_ipaccess(
        &mut self,
        bts_nr: u8,
        trx_nr: u8,
        sink: &mut dyn EventSink,
        data: &[u8],
    ) -> Result<()> {
        let (hdr, body) = DchanHeader::decode(data)?;
        let bts = self.bts_mut(bts_nr).ok_or(RslError::UnknownChannel(hdr.chan_nr))?;
        let trx = &mut bts.trxs[trx_nr as usize];
        let Some(lchan) = registry::lookup_mut(trx, hdr.chan_nr) else {
            return Err(RslError::UnknownChannel(hdr.chan_nr));
        };

        match hdr.common.msg_type {
            msgtype::IPAC_CRCX_ACK => ipaccess::on_crcx_ack(lchan, sink, body)?,
            msgtype::IPAC_MDCX_ACK => ipaccess::on_mdcx_ack(lchan, sink, body)?,
            msgtype::IPAC_DLCX_IND => ipaccess::on_dlcx_ind(lchan, sink),
            msgtype::IPAC_CRCX_NACK | msgtype::IPAC_MDCX_NACK => {
                log::warn!("{} ip.access NACK, msg_type 0x{:02x}", lchan.name(), hdr.common.msg_type);
            }
            _ => {
                log::info!("unhandled IPACCESS msg_type 0x{:02x}", hdr.common.msg_type);
            }
        }
        Ok(())
    }

    /// Replay every timer handle that has fired at or before `now`, one BTS at a time.
    /// Matches §5: "Timer callbacks happen between message deliveries, never mid-message" —
    /// this is meant to be called between [`deliver`](Self::deliver) calls, not from within
    /// one.
    pub fn poll_timers(&mut self, alloc: &mut dyn Allocator, transport: &mut dyn Transport, now: Instant) {
        let bts_nrs: Vec<u8> = self.timers.keys().copied().collect();
        for bts_nr in bts_nrs {
            let fired = {
                let wheel = self.timers.get_mut(&bts_nr).expect("wheel");
                wheel.poll(now)
            };
            for handle in fired {
                self.fire_timer(bts_nr, handle.owner, handle.kind, alloc, transport, now);
            }
        }
    }

    fn fire_timer(
        &mut self,
        bts_nr: u8,
        owner: TimerOwner,
        kind: TimerKind,
        alloc: &mut dyn Allocator,
        transport: &mut dyn Transport,
        now: Instant,
    ) {
        match owner {
            TimerOwner::Bts(_) => {
                if kind != TimerKind::PagingPace {
                    return;
                }
                let Some(bts) = self.bts(bts_nr) else { return };
                let link = bts.c0().link;
                let bs_cc_chans = bts.bs_cc_chans();
                let bs_pa_mfrms = bts.bs_pa_mfrms;
                let wheel = self.timers.get_mut(&bts_nr).expect("wheel");
                let ctx = self.paging.ctx_mut(bts_nr);
                if let Some(msg) = ctx.on_pace_fire(bs_cc_chans, bs_pa_mfrms, wheel, now) {
                    transport.enqueue(link, msg);
                }
            }
            TimerOwner::Lchan { trx_nr, ts_nr, idx } => {
                let Some(pos) = self.bts_pos(bts_nr) else { return };
                let bts = &mut self.bts_list[pos];
                let timers = bts.timers;
                let link = bts.trxs.get(trx_nr as usize).map(|t| t.link);
                let Some(link) = link else { return };
                let Some(lchan) = bts
                    .trxs
                    .get_mut(trx_nr as usize)
                    .and_then(|t| t.timeslots.get_mut(ts_nr as usize))
                    .and_then(|ts| ts.lchans.get_mut(idx as usize))
                else {
                    return;
                };
                let wheel = self.timers.get_mut(&bts_nr).expect("wheel");
                match kind {
                    TimerKind::Activation => lchan::on_activation_watchdog_expired(lchan),
                    TimerKind::Deactivation => lchan::on_deactivation_watchdog_expired(lchan),
                    TimerKind::T3101 => {
                        let outcome = lchan::on_t3101_expired(lchan, wheel, now, &timers);
                        for msg in outcome.messages {
                            transport.enqueue(link, msg);
                        }
                    }
                    TimerKind::T3109 => {
                        let outcome = lchan::on_t3109_expired(lchan, wheel, now, &timers);
                        for msg in outcome.messages {
                            transport.enqueue(link, msg);
                        }
                    }
                    TimerKind::T3111 => {
                        let msg = lchan::on_t3111_expired(lchan);
                        transport.enqueue(link, msg);
                    }
                    TimerKind::Error => {
                        lchan::on_error_timer_expired(lchan);
                        alloc.release(&mut self.bts_list[pos], trx_nr, ts_nr, idx);
                    }
                    TimerKind::PagingPace => {}
                }
            }
        }
    }
}
