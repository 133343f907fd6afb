//! Per-BTS paging scheduler: FIFO submission, de-duplication by subscriber, round-robin
//! pacing at 1.075 s, and a 750-attempt retry budget. Grounded in `paging.c`'s
//! `paging_request`/`paging_pending_request`/`page_ms`/`paging_give_free` and the
//! process-wide `managed_bts` list it walks, replaced here by an explicit [`PagingRegistry`]
//! (§9 design note).
//!
//! ## Available Types
//! - [`PagingBtsCtx`](PagingBtsCtx) - one BTS's FIFO, cursor and pacing timer.
//! - [`PagingRegistry`](PagingRegistry) - owns one [`PagingBtsCtx`] per BTS.
//!
//! ## Available Functions
//! - [`PagingBtsCtx::submit`](PagingBtsCtx::submit) - de-duplicated enqueue.
//! - [`PagingBtsCtx::on_pace_fire`](PagingBtsCtx::on_pace_fire) - one pacing-timer tick.
//! - [`paging_group`](paging_group) - `get_paging_group` equivalent.
//! - [`mobile_identity_bytes`](mobile_identity_bytes) - TMSI/IMSI to GSM 04.08 MI encoding.

use std::collections::HashMap;

use crate::codec::{put_tlv, put_tv, CommonHeader, DchanHeader};
use crate::config::PAGING_PACE_MILLIS;
use crate::model::{PagingRequest, MAX_PAGING_REQUEST};
use crate::msgtype;
use crate::timer::{Duration, Instant, TimerHandle, TimerKind, TimerWheel};

pub const IE_PAGING_GROUP: u8 = 0x0e;
pub const IE_MS_IDENTITY: u8 = 0x0c;
pub const IE_CHAN_NEEDED: u8 = 0x24;

/// `get_paging_group(imsi, bs_cc_chans, bs_pa_mfrms)`: hash the subscriber onto one of the
/// cell's paging groups. `bs_cc_chans` is the number of CCCH physical channels; `bs_pa_mfrms`
/// the number of 51-multiframes per paging group cycle (already `+2` applied by the caller per
/// the governing spec).
pub fn paging_group(imsi: &str, bs_cc_chans: u8, bs_pa_mfrms: u8) -> u32 {
    let imsi_tail: u64 = imsi
        .bytes()
        .rev()
        .take(3)
        .fold(0u64, |acc, b| acc * 10 + (b as u64).saturating_sub('0' as u64));
    let denom = (bs_cc_chans.max(1) as u64) * (bs_pa_mfrms.max(1) as u64);
    (imsi_tail % denom.max(1)) as u32
}

/// GSM 04.08 mobile-identity bytes for a TMSI (type tag `0b100`, always 5 bytes) or an IMSI
/// (BCD-packed, type tag `0b001`).
pub fn mobile_identity_bytes(imsi: &str, tmsi: Option<u32>) -> Vec<u8> {
    if let Some(tmsi) = tmsi {
        let mut out = vec![0xf4u8];
        out.extend_from_slice(&tmsi.to_be_bytes());
        return out;
    }
    let digits: Vec<u8> = imsi.bytes().filter(|b| b.is_ascii_digit()).map(|b| b - b'0').collect();
    let mut out = Vec::with_capacity(1 + digits.len().div_ceil(2));
    let first = 0x01 | ((digits.first().copied().unwrap_or(0)) << 4) | 0x08;
    out.push(first);
    let mut it = digits.iter().skip(1);
    loop {
        let lo = match it.next() {
            Some(d) => *d,
            None => break,
        };
        let hi = it.next().copied().unwrap_or(0x0f);
        out.push(lo | (hi << 4));
    }
    out
}

fn paging_cmd(bts_nr: u8, group: u32, mi: &[u8], chan_needed: u8) -> Vec<u8> {
    let mut buf = Vec::new();
    DchanHeader {
        common: CommonHeader {
            msg_discr: crate::codec::mdisc_by_msgtype(msgtype::PAGING_CMD).to_byte(),
            msg_type: msgtype::PAGING_CMD,
        },
        chan_nr: bts_nr,
    }
    .encode(&mut buf);
    put_tv(&mut buf, IE_PAGING_GROUP, (group & 0xff) as u8);
    put_tlv(&mut buf, IE_MS_IDENTITY, mi);
    put_tv(&mut buf, IE_CHAN_NEEDED, chan_needed);
    buf
}

/// One BTS's paging state: FIFO order preserved in `queue`, `cursor` walks it round-robin.
#[derive(Debug, Default)]
pub struct PagingBtsCtx {
    pub bts_nr: u8,
    queue: Vec<PagingRequest>,
    cursor: usize,
}

impl PagingBtsCtx {
    pub fn new(bts_nr: u8) -> Self {
        PagingBtsCtx { bts_nr, queue: Vec::new(), cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn pacing_handle(&self) -> TimerHandle {
        TimerHandle::bts(self.bts_nr, TimerKind::PagingPace)
    }

    /// De-duplicated enqueue: a request already pending for the same subscriber is dropped
    /// silently (debug log). Otherwise append and make sure the pacing timer is running.
    pub fn submit(&mut self, req: PagingRequest, wheel: &mut TimerWheel, now: Instant) {
        if self.queue.iter().any(|p| p.subscriber_key() == req.subscriber_key()) {
            log::debug!("paging: duplicate submission for {} on bts {} dropped", req.subscriber_key(), self.bts_nr);
            return;
        }
        self.queue.push(req);
        if !wheel.pending(self.pacing_handle()) {
            wheel.schedule(self.pacing_handle(), now, Duration::from_millis(PAGING_PACE_MILLIS));
        }
    }

    /// One pacing-timer tick: pick the cursor request, emit its `PAGING CMD`, bump its retry
    /// count (evicting past [`MAX_PAGING_REQUEST`]), advance the cursor, and reschedule if the
    /// queue is still non-empty.
    pub fn on_pace_fire(
        &mut self,
        bs_cc_chans: u8,
        bs_pa_mfrms: u8,
        wheel: &mut TimerWheel,
        now: Instant,
    ) -> Option<Vec<u8>> {
        if self.queue.is_empty() {
            return None;
        }
        if self.cursor >= self.queue.len() {
            self.cursor = 0;
        }
        let idx = self.cursor;
        let group = paging_group(&self.queue[idx].imsi, bs_cc_chans, bs_pa_mfrms + 2);
        let mi = mobile_identity_bytes(&self.queue[idx].imsi, self.queue[idx].tmsi);
        let chan_needed = self.queue[idx].chan_needed;
        let msg = paging_cmd(self.bts_nr, group, &mi, chan_needed);

        self.queue[idx].retry_count += 1;
        if self.queue[idx].retry_count > MAX_PAGING_REQUEST {
            log::debug!("paging: evicting {} after {} attempts", self.queue[idx].subscriber_key(), self.queue[idx].retry_count);
            self.queue.remove(idx);
            if self.cursor >= self.queue.len() {
                self.cursor = 0;
            }
        } else {
            self.cursor = (self.cursor + 1) % self.queue.len().max(1);
        }

        if !self.queue.is_empty() {
            wheel.schedule(self.pacing_handle(), now, Duration::from_millis(PAGING_PACE_MILLIS));
        }
        Some(msg)
    }
}

/// Replaces the original's process-wide `managed_bts` list with an explicit registry the
/// controller owns, mapping BTS number to its [`PagingBtsCtx`].
#[derive(Debug, Default)]
pub struct PagingRegistry {
    contexts: HashMap<u8, PagingBtsCtx>,
}

impl PagingRegistry {
    pub fn new() -> Self {
        PagingRegistry { contexts: HashMap::new() }
    }

    pub fn ctx_mut(&mut self, bts_nr: u8) -> &mut PagingBtsCtx {
        self.contexts.entry(bts_nr).or_insert_with(|| PagingBtsCtx::new(bts_nr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_submission_for_same_subscriber_is_dropped() {
        let mut ctx = PagingBtsCtx::new(0);
        let mut wheel = TimerWheel::new();
        let now = Instant::from_secs(0);
        ctx.submit(PagingRequest::new("111", None, 1), &mut wheel, now);
        ctx.submit(PagingRequest::new("111", None, 1), &mut wheel, now);
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn pacing_fires_round_robin_across_two_subscribers() {
        let mut ctx = PagingBtsCtx::new(0);
        let mut wheel = TimerWheel::new();
        let now = Instant::from_secs(0);
        ctx.submit(PagingRequest::new("111", None, 1), &mut wheel, now);
        ctx.submit(PagingRequest::new("222", None, 1), &mut wheel, now);
        let first = ctx.on_pace_fire(8, 5, &mut wheel, now);
        let second = ctx.on_pace_fire(8, 5, &mut wheel, now);
        assert!(first.is_some());
        assert!(second.is_some());
        assert_ne!(first, second);
    }

    #[test]
    fn request_is_evicted_after_750_attempts() {
        let mut ctx = PagingBtsCtx::new(0);
        let mut wheel = TimerWheel::new();
        let now = Instant::from_secs(0);
        ctx.submit(PagingRequest::new("111", None, 1), &mut wheel, now);
        for _ in 0..MAX_PAGING_REQUEST {
            ctx.on_pace_fire(8, 5, &mut wheel, now);
        }
        assert_eq!(ctx.len(), 1);
        ctx.on_pace_fire(8, 5, &mut wheel, now);
        assert_eq!(ctx.len(), 0);
    }

    #[test]
    fn mobile_identity_bytes_tmsi_is_five_bytes_with_type_tag() {
        let mi = mobile_identity_bytes("ignored", Some(0xAABBCCDD));
        assert_eq!(mi.len(), 5);
        assert_eq!(mi[0], 0xf4);
    }
}
