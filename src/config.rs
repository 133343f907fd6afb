//! Network-configured constants injected into the core, replacing the compiled-in globals of
//! the original implementation.
//!
//! ## Available Types
//! - [`BtsTimers`](BtsTimers) - T3101/T3109/T3111/T3122 for one BTS.
//! - [`NetworkConfig`](NetworkConfig) - everything the core needs that isn't per-message.

/// Guard timers T3101, T3109, T3111, T3122, all in whole seconds. `T3122 == 0` or
/// `T3109 == 0` disables that timer (see the release orchestrator and channel-request
/// handling).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BtsTimers {
    pub t3101_secs: u32,
    pub t3109_secs: u32,
    pub t3111_secs: u32,
    pub t3122_secs: u32,
}

impl Default for BtsTimers {
    fn default() -> Self {
        BtsTimers {
            t3101_secs: 10,
            t3109_secs: 5,
            t3111_secs: 2,
            t3122_secs: 0,
        }
    }
}

/// Fixed 4-second activation and deactivation watchdogs. Not configurable in the original;
/// kept as a named constant here rather than a magic number at each call site.
pub const ACT_DEACT_WATCHDOG_SECS: u32 = 4;

/// Additional hold-down added to T3111 when entering `REL_ERR` (see the lchan state machine).
pub const ERROR_TIMER_EXTRA_SECS: u32 = 2;

/// Paging pacing period: 1 second + 75 milliseconds.
pub const PAGING_PACE_MILLIS: u64 = 1075;

/// Network-wide parameters not specific to a single BTS.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NetworkConfig {
    /// Default timer set handed to newly configured BTSes.
    pub default_timers: BtsTimers,
    /// `[ADD]` "DTX enabled on network", per §4.6 — a network-wide switch, not a per-BTS one;
    /// the governing spec's wording ("if DTX enabled on network") is the reason this lives
    /// here rather than on [`crate::model::Bts`].
    pub dtx_enabled: bool,
}
