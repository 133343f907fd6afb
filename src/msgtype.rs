//! RSL `msg_type` constants, grouped by the discriminator range they fall into (§4.1). These
//! values are this crate's own consistent numbering — the original implementation refers to
//! them only by symbolic name from a header this pack does not carry — chosen to land in the
//! correct discriminator bucket per [`crate::codec::mdisc_by_msgtype`] rather than copied from
//! an unavailable reference. See `DESIGN.md` for the allocation note.

// --- RLL (0x00-0x0F) -------------------------------------------------------
pub const DATA_REQ: u8 = 0x01;
pub const DATA_IND: u8 = 0x02;
pub const ERROR_IND: u8 = 0x03;
pub const EST_REQ: u8 = 0x04;
pub const EST_CONF: u8 = 0x05;
pub const EST_IND: u8 = 0x06;
pub const REL_REQ: u8 = 0x07;
pub const REL_CONF: u8 = 0x08;
pub const REL_IND: u8 = 0x09;
pub const UNIT_DATA_REQ: u8 = 0x0a;
pub const UNIT_DATA_IND: u8 = 0x0b;
pub const SUSP_REQ: u8 = 0x0c;
pub const RES_REQ: u8 = 0x0d;
pub const RECON_REQ: u8 = 0x0e;

// --- COMMON-CHANNEL (0x10-0x18) --------------------------------------------
pub const BCCH_INFO: u8 = 0x10;
pub const CCCH_LOAD_IND: u8 = 0x11;
pub const CHAN_RQD: u8 = 0x12;
pub const DELETE_IND: u8 = 0x13;
pub const PAGING_CMD: u8 = 0x14;
pub const IMMEDIATE_ASSIGN_CMD: u8 = 0x15;
pub const SMS_BC_REQ: u8 = 0x16;
pub const SMS_BC_CMD: u8 = 0x17;
pub const IMMEDIATE_ASSIGN_REJECT: u8 = 0x18;

// --- TRX (0x19-0x1F) --------------------------------------------------------
pub const RF_RES_IND: u8 = 0x19;
pub const SACCH_FILLING: u8 = 0x1a;
pub const OVERLOAD: u8 = 0x1b;
pub const ERROR_REPORT: u8 = 0x1c;

// --- DEDICATED-CHANNEL (0x20-0x3F) -----------------------------------------
pub const CHAN_ACTIV: u8 = 0x20;
pub const CHAN_ACTIV_ACK: u8 = 0x21;
pub const CHAN_ACTIV_NACK: u8 = 0x22;
pub const CONN_FAIL: u8 = 0x23;
pub const DEACTIVATE_SACCH: u8 = 0x24;
pub const ENCR_CMD: u8 = 0x25;
pub const MEAS_RES: u8 = 0x26;
pub const RF_CHAN_REL: u8 = 0x27;
pub const MODE_MODIFY_REQ: u8 = 0x28;
pub const MODE_MODIFY_ACK: u8 = 0x29;
pub const MODE_MODIFY_NACK: u8 = 0x2a;
pub const RF_CHAN_REL_ACK: u8 = 0x2b;
pub const SACCH_INFO_MODIFY: u8 = 0x2c;
pub const HANDO_DET: u8 = 0x2d;
pub const BS_POWER_CONTROL: u8 = 0x2e;
pub const MS_POWER_CONTROL: u8 = 0x2f;
/// Siemens-specific "MS RF Power Capability Indication", outbound only.
pub const SIEMENS_MRPCI: u8 = 0x30;

// --- IPACCESS (vendor discriminator) ---------------------------------------
pub const IPAC_CRCX: u8 = 0x70;
pub const IPAC_CRCX_ACK: u8 = 0x71;
pub const IPAC_CRCX_NACK: u8 = 0x72;
pub const IPAC_MDCX: u8 = 0x73;
pub const IPAC_MDCX_ACK: u8 = 0x74;
pub const IPAC_MDCX_NACK: u8 = 0x75;
pub const IPAC_DLCX_IND: u8 = 0x76;
pub const IPAC_DLCX: u8 = 0x77;
pub const IPAC_DLCX_ACK: u8 = 0x78;
pub const IPAC_PDCH_ACT: u8 = 0x48;
pub const IPAC_PDCH_ACT_ACK: u8 = 0x49;
pub const IPAC_PDCH_DEACT: u8 = 0x4a;

// --- CCCH LOAD IND sub-types (leading byte of the payload) -----------------
pub const CCCH_LOAD_IND_PCH: u8 = 0x00;
pub const CCCH_LOAD_IND_RACH: u8 = 0x01;
