//! Channel activation mode encoding: `channel_mode_from_lchan`.
//!
//! ## Available Types
//! - [`ChanModeIe`](ChanModeIe) - the RSL `CHAN MODE` IE body.
//! - [`channel_mode_from_lchan`](channel_mode_from_lchan) - the encoder itself.

use crate::error::{Result, RslError};
use crate::model::{CsdMode, Lchan, LchanType, RslCmode, TchMode};

pub const CRT_SDCCH: u8 = 0x01;
pub const CRT_TCH_BM: u8 = 0x08;
pub const CRT_TCH_LM: u8 = 0x09;

pub const DTX_ENABLED: u8 = 0x03;
pub const DTX_DISABLED: u8 = 0x00;

/// RSL `CHAN MODE` IE body (`dtx_dtu`, `spd_ind`, `chan_rt`, `chan_rate`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChanModeIe {
    pub dtx_dtu: u8,
    pub spd_ind: u8,
    pub chan_rt: u8,
    pub chan_rate: u8,
}

impl ChanModeIe {
    pub fn encode(&self) -> [u8; 4] {
        [self.dtx_dtu, self.spd_ind, self.chan_rt, self.chan_rate]
    }
}

fn chan_rate_for_csd(csd: CsdMode) -> u8 {
    match csd {
        CsdMode::NtRlp14k5 => 0x21,
        CsdMode::NtRlp12k0 => 0x22,
        CsdMode::NtRlp6k0 => 0x23,
        CsdMode::TrSpeed600 => 0x31,
        CsdMode::TrSpeed1200 => 0x32,
        CsdMode::TrSpeed2400 => 0x33,
        CsdMode::TrSpeed4800 => 0x34,
        CsdMode::TrSpeed9600 => 0x35,
        CsdMode::TrSpeed14400 => 0x36,
        CsdMode::TrSpeed32000 => 0x37,
    }
}

/// Fill a [`ChanModeIe`] from an lchan's current mode configuration.
///
/// The CSD arm reproduces a quirk in the original implementation rather than the most literal
/// reading of its own source: a recognised CSD mode falls through a missing `break` into the
/// enclosing "unsupported combination" arm, so the *field population* for CSD succeeds but the
/// *call* still reports [`RslError::ConfigurationError`]. Callers must check the `Result`, not
/// assume a returned `Ok` is the only way fields got written — see the open-question note this
/// preserves.
pub fn channel_mode_from_lchan(lchan: &Lchan, dtx_enabled_on_network: bool) -> Result<ChanModeIe> {
    let dtx_dtu = if dtx_enabled_on_network {
        DTX_ENABLED
    } else {
        DTX_DISABLED
    };
    let spd_ind = match lchan.rsl_cmode {
        RslCmode::Signalling => 0x00,
        RslCmode::Speech => 0x01,
        RslCmode::Data => 0x02,
    };
    let chan_rt = match lchan.lchan_type {
        LchanType::Sdcch => CRT_SDCCH,
        LchanType::TchF => CRT_TCH_BM,
        LchanType::TchH => CRT_TCH_LM,
        LchanType::None => return Err(RslError::ConfigurationError),
    };

    let mut cm = ChanModeIe {
        dtx_dtu,
        spd_ind,
        chan_rt,
        chan_rate: 0,
    };

    match lchan.tch_mode {
        TchMode::Sign => {
            cm.chan_rate = 0;
            Ok(cm)
        }
        TchMode::SpeechV1 => {
            cm.chan_rate = 0x01;
            Ok(cm)
        }
        TchMode::SpeechEfr => {
            cm.chan_rate = 0x11;
            Ok(cm)
        }
        TchMode::SpeechAmr => {
            cm.chan_rate = 0x21;
            Ok(cm)
        }
        TchMode::Data => match lchan.csd_mode {
            Some(csd) => {
                cm.chan_rate = chan_rate_for_csd(csd);
                Err(RslError::ConfigurationError)
            }
            None => Err(RslError::ConfigurationError),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Lchan;

    #[test]
    fn sdcch_signalling_mode_encodes_crt_sdcch() {
        let lchan = Lchan::new(0, 0, 0, LchanType::Sdcch);
        let cm = channel_mode_from_lchan(&lchan, false).unwrap();
        assert_eq!(cm.chan_rt, CRT_SDCCH);
        assert_eq!(cm.spd_ind, 0x00);
        assert_eq!(cm.chan_rate, 0);
    }

    #[test]
    fn tch_f_amr_encodes_crt_tch_bm() {
        let mut lchan = Lchan::new(0, 1, 0, LchanType::TchF);
        lchan.rsl_cmode = RslCmode::Speech;
        lchan.tch_mode = TchMode::SpeechAmr;
        let cm = channel_mode_from_lchan(&lchan, true).unwrap();
        assert_eq!(cm.chan_rt, CRT_TCH_BM);
        assert_eq!(cm.chan_rate, 0x21);
        assert_eq!(cm.dtx_dtu, DTX_ENABLED);
    }

    #[test]
    fn csd_mode_populates_fields_but_returns_configuration_error() {
        let mut lchan = Lchan::new(0, 1, 0, LchanType::TchF);
        lchan.rsl_cmode = RslCmode::Data;
        lchan.tch_mode = TchMode::Data;
        lchan.csd_mode = Some(CsdMode::TrSpeed9600);
        let err = channel_mode_from_lchan(&lchan, false).unwrap_err();
        assert_eq!(err, RslError::ConfigurationError);
    }

    #[test]
    fn none_lchan_type_is_a_configuration_error() {
        let lchan = Lchan::new(0, 0, 0, LchanType::None);
        assert!(channel_mode_from_lchan(&lchan, false).is_err());
    }
}
