//! Typed event interface, replacing the process-wide signal/observer bus of the original
//! implementation. The controller raises [`Event`](Event)s synchronously, in loop order, into
//! whatever [`EventSink`](EventSink) the caller supplied — there is no global dispatch table to
//! register against.
//!
//! ## Available Types
//! - [`Event`](Event) - sum type covering every named signal in the external interface.
//! - [`EventSink`](EventSink) - the trait a caller implements to observe them.

use crate::model::MeasurementReport;

/// One lchan-scoped or BTS-scoped occurrence the core wants to tell the caller about.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    LchanActivateAck { trx_nr: u8, ts_nr: u8, idx: u8 },
    LchanActivateNack { trx_nr: u8, ts_nr: u8, idx: u8, cause: u8 },
    LchanMeasRep { trx_nr: u8, ts_nr: u8, idx: u8, report: MeasurementReport },
    LchanHandoverDetect { trx_nr: u8, ts_nr: u8, idx: u8, access_delay: Option<u8> },
    CcchPagingLoad { bts_nr: u8, load: u16 },
    CcchRachLoad { bts_nr: u8, slot_count: u16, busy_percent: u8 },
    AbisipCrcxAck { trx_nr: u8, ts_nr: u8, idx: u8 },
    AbisipMdcxAck { trx_nr: u8, ts_nr: u8, idx: u8 },
    AbisipDlcxInd { trx_nr: u8, ts_nr: u8, idx: u8 },
}

/// Implemented by callers that want to observe [`Event`]s as the controller raises them.
/// Delivery is synchronous: `notify` runs to completion before the controller's handler
/// returns, matching the single-threaded event loop's "no suspension points" rule.
pub trait EventSink {
    fn notify(&mut self, event: Event);
}

/// An [`EventSink`] that records everything it sees, for tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<Event>,
}

impl EventSink for RecordingSink {
    fn notify(&mut self, event: Event) {
        self.events.push(event);
    }
}

/// An [`EventSink`] that discards every event, for callers that don't care.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn notify(&mut self, _event: Event) {}
}
