//! Error types surfaced by the RSL core.
//!
//! ## Available Types
//! - [`RslError`](RslError) - everything the core can fail with, one variant per kind in the
//!   error handling design.

use core::fmt;

/// Cause of an RSL-layer failure.
///
/// Recoverable kinds ([`ProtocolError`](RslError::ProtocolError),
/// [`UnknownChannel`](RslError::UnknownChannel)) are absorbed by the caller: the offending
/// message is dropped and lchan state is left unchanged. The others describe state
/// transitions that already happened (`BROKEN`, `REL_ERR`) and are returned so the caller can
/// log or surface them, not so the caller can roll anything back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RslError {
    /// Frame shorter than the common header, or shorter than a mandatory IE requires.
    Truncated,
    /// `msg_discr & 0xFE` did not match any known discriminator.
    UnknownDiscriminator(u8),
    /// A mandatory IE tag was absent.
    MissingIe(u8),
    /// `ie_chan` tag byte did not match the expected `0x01`.
    WrongIeTag { expected: u8, got: u8 },
    /// `chan_nr` did not decode to any known channel kind/subchannel combination.
    UnknownChannel(u8),
    /// CHAN ACTIV NACK with the given cause.
    ActivationRejected(u8),
    /// RLL ERROR IND with the given cause.
    LinkLayerFailure(u8),
    /// Activation watchdog fired before CHAN ACTIV ACK arrived.
    ActivationTimeout,
    /// Deactivation watchdog fired before RF CHAN REL ACK arrived.
    DeactivationTimeout,
    /// The requested channel-mode / TCH-mode / CSD-mode combination has no RSL encoding.
    ConfigurationError,
}

impl fmt::Display for RslError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RslError::Truncated => write!(f, "frame shorter than required"),
            RslError::UnknownDiscriminator(d) => write!(f, "unknown msg discriminator 0x{d:02x}"),
            RslError::MissingIe(tag) => write!(f, "missing mandatory IE 0x{tag:02x}"),
            RslError::WrongIeTag { expected, got } => {
                write!(f, "expected IE tag 0x{expected:02x}, got 0x{got:02x}")
            }
            RslError::UnknownChannel(chan_nr) => write!(f, "unknown chan_nr 0x{chan_nr:02x}"),
            RslError::ActivationRejected(cause) => {
                write!(f, "CHAN ACTIV NACK, cause 0x{cause:02x}")
            }
            RslError::LinkLayerFailure(cause) => write!(f, "RLL ERROR IND, cause 0x{cause:02x}"),
            RslError::ActivationTimeout => write!(f, "activation watchdog expired"),
            RslError::DeactivationTimeout => write!(f, "deactivation watchdog expired"),
            RslError::ConfigurationError => write!(f, "unsupported channel mode combination"),
        }
    }
}

impl std::error::Error for RslError {}

pub type Result<T> = core::result::Result<T, RslError>;
