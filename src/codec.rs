//! RSL wire codec: common/DCHAN/RLL headers, TLV primitives, macroblock padding and the
//! two-ended buffer used to assemble messages back-to-front.
//!
//! ## Available Types
//! - [`Discriminator`](Discriminator) - routing class derived from `msg_discr & 0xFE`.
//! - [`CommonHeader`](CommonHeader), [`DchanHeader`](DchanHeader), [`RllHeader`](RllHeader) -
//!   the three header shapes on the wire.
//! - [`TwoEndedBuffer`](TwoEndedBuffer) - push-front/push-back message assembly.
//! - [`TlvMap`](TlvMap) - tag -> (length, value) produced by [`parse_tlv`](parse_tlv).

use std::collections::HashMap;

use crate::error::{Result, RslError};

/// Low bit of the discriminator byte is reserved/transparent; routing masks it off.
pub const DISCR_MASK: u8 = 0xFE;

pub const DISCR_RLL: u8 = 0x02;
pub const DISCR_TRX: u8 = 0x04;
pub const DISCR_COMMON_CHANNEL: u8 = 0x06;
pub const DISCR_DEDICATED_CHANNEL: u8 = 0x08;
pub const DISCR_LOCATION: u8 = 0x0a;
pub const DISCR_IPACCESS: u8 = 0x7e;

/// Routing class of an inbound message, after masking the transparent low bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Discriminator {
    Rll,
    Trx,
    CommonChannel,
    DedicatedChannel,
    Location,
    IpAccess,
}

impl Discriminator {
    pub fn from_byte(discr: u8) -> Option<Self> {
        match discr & DISCR_MASK {
            DISCR_RLL => Some(Discriminator::Rll),
            DISCR_TRX => Some(Discriminator::Trx),
            DISCR_COMMON_CHANNEL => Some(Discriminator::CommonChannel),
            DISCR_DEDICATED_CHANNEL => Some(Discriminator::DedicatedChannel),
            DISCR_LOCATION => Some(Discriminator::Location),
            DISCR_IPACCESS => Some(Discriminator::IpAccess),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Discriminator::Rll => DISCR_RLL,
            Discriminator::Trx => DISCR_TRX,
            Discriminator::CommonChannel => DISCR_COMMON_CHANNEL,
            Discriminator::DedicatedChannel => DISCR_DEDICATED_CHANNEL,
            Discriminator::Location => DISCR_LOCATION,
            Discriminator::IpAccess => DISCR_IPACCESS,
        }
    }
}

/// Derive the discriminator to use when *emitting* a message of a given type, per the closed
/// `msg_type` range table. Inbound routing instead reads the discriminator off the wire
/// directly (see [`Discriminator::from_byte`]).
pub fn mdisc_by_msgtype(msg_type: u8) -> Discriminator {
    if (0x00..=0x0F).contains(&msg_type) {
        Discriminator::Rll
    } else if (0x10..=0x18).contains(&msg_type) {
        Discriminator::CommonChannel
    } else if (0x19..=0x1F).contains(&msg_type) {
        Discriminator::Trx
    } else if (0x20..=0x3F).contains(&msg_type) {
        Discriminator::DedicatedChannel
    } else {
        Discriminator::Location
    }
}

/// The 2-byte common header every RSL frame starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommonHeader {
    pub msg_discr: u8,
    pub msg_type: u8,
}

pub const IE_CHAN_NR: u8 = 0x01;
pub const IE_LINK_IDENT: u8 = 0x02;

/// DCHAN header: common header + `ie_chan` tag + `chan_nr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DchanHeader {
    pub common: CommonHeader,
    pub chan_nr: u8,
}

impl DchanHeader {
    pub fn encode(self, buf: &mut Vec<u8>) {
        buf.push(self.common.msg_discr);
        buf.push(self.common.msg_type);
        buf.push(IE_CHAN_NR);
        buf.push(self.chan_nr);
    }

    pub fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        if data.len() < 4 {
            return Err(RslError::Truncated);
        }
        if data[2] != IE_CHAN_NR {
            return Err(RslError::WrongIeTag {
                expected: IE_CHAN_NR,
                got: data[2],
            });
        }
        let hdr = DchanHeader {
            common: CommonHeader {
                msg_discr: data[0],
                msg_type: data[1],
            },
            chan_nr: data[3],
        };
        Ok((hdr, &data[4..]))
    }
}

/// RLL header: DCHAN header + `link_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RllHeader {
    pub common: CommonHeader,
    pub chan_nr: u8,
    pub link_id: u8,
}

impl RllHeader {
    pub fn encode(self, buf: &mut Vec<u8>) {
        buf.push(self.common.msg_discr);
        buf.push(self.common.msg_type);
        buf.push(IE_CHAN_NR);
        buf.push(self.chan_nr);
        buf.push(IE_LINK_IDENT);
        buf.push(self.link_id);
    }

    pub fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        let (dchan, rest) = DchanHeader::decode(data)?;
        if rest.len() < 2 {
            return Err(RslError::Truncated);
        }
        if rest[0] != IE_LINK_IDENT {
            return Err(RslError::WrongIeTag {
                expected: IE_LINK_IDENT,
                got: rest[0],
            });
        }
        Ok((
            RllHeader {
                common: dchan.common,
                chan_nr: dchan.chan_nr,
                link_id: rest[1],
            },
            &rest[2..],
        ))
    }
}

/// `link_id` byte: low 3 bits SAPI, bit 6 (0x40) SACCH association, bit 7 reserved.
pub const LINK_ID_SACCH: u8 = 0x40;

pub fn link_id(sapi: u8, sacch: bool) -> u8 {
    (sapi & 0x07) | if sacch { LINK_ID_SACCH } else { 0 }
}

pub fn sapi_of(link_id: u8) -> u8 {
    link_id & 0x07
}

// --- TLV primitives -------------------------------------------------------

pub fn put_t(buf: &mut Vec<u8>, tag: u8) {
    buf.push(tag);
}

pub fn put_tv(buf: &mut Vec<u8>, tag: u8, val: u8) {
    buf.push(tag);
    buf.push(val);
}

pub fn put_tv_fixed(buf: &mut Vec<u8>, tag: u8, val: &[u8]) {
    buf.push(tag);
    buf.extend_from_slice(val);
}

pub fn put_tlv(buf: &mut Vec<u8>, tag: u8, val: &[u8]) {
    buf.push(tag);
    buf.push(val.len() as u8);
    buf.extend_from_slice(val);
}

pub fn put_tl16v(buf: &mut Vec<u8>, tag: u8, val: &[u8]) {
    buf.push(tag);
    buf.extend_from_slice(&(val.len() as u16).to_be_bytes());
    buf.extend_from_slice(val);
}

/// `tag -> (length, value-slice)`, built by scanning a header's trailing bytes. Only TLV
/// (1-byte length) entries are parsed generically; TV/fixed-length IEs are read positionally
/// by their own handler, matching how the original walks a fixed IE sequence per message type.
pub type TlvMap<'a> = HashMap<u8, &'a [u8]>;

pub fn parse_tlv(mut data: &[u8]) -> Result<TlvMap<'_>> {
    let mut map = HashMap::new();
    while !data.is_empty() {
        if data.len() < 2 {
            return Err(RslError::Truncated);
        }
        let tag = data[0];
        let len = data[1] as usize;
        if data.len() < 2 + len {
            return Err(RslError::Truncated);
        }
        map.insert(tag, &data[2..2 + len]);
        data = &data[2 + len..];
    }
    Ok(map)
}

/// Pad `data` with `0x2B` up to `len` bytes. Used for the FULL IMMEDIATE ASSIGN INFO
/// macroblock, always 23 bytes.
pub const MACBLOCK_PAD: u8 = 0x2b;
pub const MACBLOCK_LEN: usize = 23;

pub fn pad_macblock(data: &[u8], len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let take = data.len().min(len);
    out.extend_from_slice(&data[..take]);
    out.resize(len, MACBLOCK_PAD);
    out
}

/// Encryption-info IE body: `algorithm_id` followed by `key_len` key bytes.
pub fn pack_encryption_info(algorithm_id: u8, key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + key.len());
    out.push(algorithm_id);
    out.extend_from_slice(key);
    out
}

pub fn parse_encryption_info(data: &[u8]) -> Result<(u8, &[u8])> {
    if data.is_empty() {
        return Err(RslError::Truncated);
    }
    Ok((data[0], &data[1..]))
}

/// `l2_plen` encoding: `(payload_bytes << 2) | 1`.
pub fn l2_plen(payload_bytes: usize) -> u8 {
    (((payload_bytes as u32) << 2) | 1) as u8
}

/// A bounded, two-ended buffer supporting push-front and push-back, so a message can be
/// assembled in a different order than it appears on the wire (the encryption command is
/// built by prepending IEs onto an already-assembled L3 payload). Headroom and capacity are
/// advisory bounds matching the per-send allocation the transport boundary documents; they are
/// enforced with an assertion rather than a fallible return because exceeding them means a
/// programming error in a builder, not a runtime condition callers can recover from.
#[derive(Debug)]
pub struct TwoEndedBuffer {
    data: std::collections::VecDeque<u8>,
    front_pushed: usize,
}

impl TwoEndedBuffer {
    pub const HEADROOM: usize = 128;
    pub const CAPACITY: usize = 1024;

    pub fn new() -> Self {
        TwoEndedBuffer {
            data: std::collections::VecDeque::with_capacity(Self::CAPACITY),
            front_pushed: 0,
        }
    }

    /// Prepend bytes; the slice's own byte order is preserved at the front of the message.
    pub fn push_front(&mut self, bytes: &[u8]) {
        self.front_pushed += bytes.len();
        assert!(
            self.front_pushed <= Self::HEADROOM,
            "TwoEndedBuffer headroom exceeded"
        );
        for &b in bytes.iter().rev() {
            self.data.push_front(b);
        }
    }

    pub fn push_back(&mut self, bytes: &[u8]) {
        assert!(
            self.data.len() + bytes.len() <= Self::CAPACITY,
            "TwoEndedBuffer capacity exceeded"
        );
        self.data.extend(bytes.iter().copied());
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data.into_iter().collect()
    }
}

impl Default for TwoEndedBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminator_routes_by_masked_byte() {
        assert_eq!(Discriminator::from_byte(0x06), Some(Discriminator::CommonChannel));
        assert_eq!(Discriminator::from_byte(0x07), Some(Discriminator::CommonChannel));
        assert_eq!(Discriminator::from_byte(0xff), None);
    }

    #[test]
    fn mdisc_by_msgtype_matches_ranges() {
        assert_eq!(mdisc_by_msgtype(0x02), Discriminator::Rll);
        assert_eq!(mdisc_by_msgtype(0x12), Discriminator::CommonChannel);
        assert_eq!(mdisc_by_msgtype(0x19), Discriminator::Trx);
        assert_eq!(mdisc_by_msgtype(0x21), Discriminator::DedicatedChannel);
        assert_eq!(mdisc_by_msgtype(0x50), Discriminator::Location);
    }

    #[test]
    fn dchan_header_round_trips() {
        let hdr = DchanHeader {
            common: CommonHeader {
                msg_discr: 0x08,
                msg_type: 0x21,
            },
            chan_nr: 0x88,
        };
        let mut buf = Vec::new();
        hdr.encode(&mut buf);
        let (decoded, rest) = DchanHeader::decode(&buf).unwrap();
        assert_eq!(decoded, hdr);
        assert!(rest.is_empty());
    }

    #[test]
    fn tlv_round_trips() {
        let mut buf = Vec::new();
        put_tlv(&mut buf, 0x11, &[0x07, 0xab, 0xcd]);
        put_tv(&mut buf, 0x12, 0x05);
        let map = parse_tlv(&buf).unwrap();
        assert_eq!(map.get(&0x11), Some(&&[0x07u8, 0xab, 0xcd][..]));
    }

    #[test]
    fn macroblock_padding_is_exactly_23_bytes_of_0x2b() {
        let padded = pad_macblock(&[1, 2, 3], MACBLOCK_LEN);
        assert_eq!(padded.len(), MACBLOCK_LEN);
        assert!(padded[3..].iter().all(|b| *b == MACBLOCK_PAD));
    }

    #[test]
    fn two_ended_buffer_prepend_then_append() {
        let mut buf = TwoEndedBuffer::new();
        buf.push_back(b"WORLD");
        buf.push_front(b"HELLO ");
        assert_eq!(buf.into_vec(), b"HELLO WORLD");
    }
}
