//! RSL (Radio Signalling Link) controller for a GSM BSC, per 3GPP TS 08.58.
//!
//! This crate owns the BSC-side state for one or more BTS: the lchan activation/release state
//! machine, the wire codec for the RSL framing and its IEs, channel-request handling, paging,
//! measurement ingest, the ip.access RTP-binding sub-protocol and the vendor quirks that vary
//! across BTS implementations. It has no socket or serial-port code of its own — the caller
//! supplies inbound bytes to [`dispatch::RslController::deliver`] and implements
//! [`dispatch::Transport`], [`dispatch::L3Sink`], [`chan_request::Allocator`] and
//! [`signal::EventSink`] for the boundaries the core does not own.
//!
//! ## Module map
//! - [`codec`] - wire primitives: headers, TLV/TV/TL16V, macroblock padding.
//! - [`msgtype`] - `msg_type` constants.
//! - [`model`] - BTS/TRX/timeslot/lchan topology and the records that travel between them.
//! - [`config`] - network-configured timers and constants.
//! - [`vendor`] - per-BTS capability record replacing inline vendor dispatch.
//! - [`timer`] - the timer wheel lchans and the release/activation watchdogs run on.
//! - [`signal`] - the [`signal::Event`]/[`signal::EventSink`] observer interface.
//! - [`error`] - [`error::RslError`] and the crate's `Result` alias.
//! - [`registry`] - `chan_nr`/`link_id` encode/decode and BTS/TRX/timeslot/lchan lookup.
//! - [`chan_mode`] - RSL `Channel Mode` IE encoding from an lchan's type and codec.
//! - [`messages`] - common-channel and dedicated-channel outbound builders.
//! - [`lchan`] - the activation/release state machine and its guard timers.
//! - [`release`] - release orchestration (normal SAPI sweep vs. immediate error release).
//! - [`chan_request`] - `CHAN RQD` handling and the external [`chan_request::Allocator`].
//! - [`measurement`] - `MEAS RES` / `HANDO DET` ingest.
//! - [`ipaccess`] - the ip.access CRCX/MDCX/DLCX RTP-binding sub-protocol.
//! - [`paging`] - the per-BTS paging scheduler.
//! - [`dispatch`] - the inbound entry point and the [`dispatch::Transport`]/[`dispatch::L3Sink`]
//!   boundary traits.

pub mod chan_mode;
pub mod chan_request;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod ipaccess;
pub mod lchan;
pub mod measurement;
pub mod messages;
pub mod model;
pub mod msgtype;
pub mod paging;
pub mod registry;
pub mod release;
pub mod signal;
pub mod timer;
pub mod vendor;

pub use dispatch::{L3Sink, RslController, Transport, TransportLink};
pub use error::{Result, RslError};
pub use signal::{Event, EventSink};
