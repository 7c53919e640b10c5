//! Session timing configuration.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every delay the coordination core waits on lives here so drivers and tests
//! can shorten them without touching component code. Values are integer
//! milliseconds unless the name says otherwise.
//!
//! DESIGN
//! ======
//! `SessionConfig::default()` is the device's stock timing. `from_env()` reads
//! `CAMCAL_*` overrides for the native console; in the browser the process
//! environment is empty and the defaults apply.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use crate::net::gate::{CommandClass, CommandKind};

pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5_000;
pub const DEFAULT_RESYNC_FOLLOW_UP_MS: u64 = 500;
pub const DEFAULT_TOGGLE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_LIGHT_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_LOAD_TIMEOUT_MS: u64 = 3_000;
pub const DEFAULT_CAPTURE_TICK_MS: u64 = 100;
pub const DEFAULT_CAPTURE_DURATION_S: u32 = 10;
pub const DEFAULT_CAPTURE_INTERVAL_MS: u32 = 500;
pub const DEFAULT_FPS_SAMPLE_MS: u64 = 1_000;
pub const DEFAULT_NOTICE_CAPACITY: usize = 50;

/// Timing and sizing knobs for one [`crate::session::Session`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Fixed delay between a close and the next connect attempt.
    pub reconnect_delay_ms: u64,
    /// Delay of the second status request after the connection opens.
    pub resync_follow_up_ms: u64,
    /// Timeout for mode toggles and heavy computations.
    pub toggle_timeout_ms: u64,
    /// Timeout for single-image capture, saves and point edits.
    pub light_timeout_ms: u64,
    /// Timeout for loads and small settings changes.
    pub load_timeout_ms: u64,
    /// Countdown resolution while auto-capture runs.
    pub capture_tick_ms: u64,
    pub default_capture_duration_s: u32,
    pub default_capture_interval_ms: u32,
    /// Frame-rate sampling window.
    pub fps_sample_ms: u64,
    /// Maximum notices retained in the affordance layer.
    pub notice_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            resync_follow_up_ms: DEFAULT_RESYNC_FOLLOW_UP_MS,
            toggle_timeout_ms: DEFAULT_TOGGLE_TIMEOUT_MS,
            light_timeout_ms: DEFAULT_LIGHT_TIMEOUT_MS,
            load_timeout_ms: DEFAULT_LOAD_TIMEOUT_MS,
            capture_tick_ms: DEFAULT_CAPTURE_TICK_MS,
            default_capture_duration_s: DEFAULT_CAPTURE_DURATION_S,
            default_capture_interval_ms: DEFAULT_CAPTURE_INTERVAL_MS,
            fps_sample_ms: DEFAULT_FPS_SAMPLE_MS,
            notice_capacity: DEFAULT_NOTICE_CAPACITY,
        }
    }
}

impl SessionConfig {
    /// Build a config from `CAMCAL_*` environment variables, falling back to
    /// the defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        Self {
            reconnect_delay_ms: env_parse("CAMCAL_RECONNECT_DELAY_MS", DEFAULT_RECONNECT_DELAY_MS),
            resync_follow_up_ms: env_parse("CAMCAL_RESYNC_FOLLOW_UP_MS", DEFAULT_RESYNC_FOLLOW_UP_MS),
            toggle_timeout_ms: env_parse("CAMCAL_TOGGLE_TIMEOUT_MS", DEFAULT_TOGGLE_TIMEOUT_MS),
            light_timeout_ms: env_parse("CAMCAL_LIGHT_TIMEOUT_MS", DEFAULT_LIGHT_TIMEOUT_MS),
            load_timeout_ms: env_parse("CAMCAL_LOAD_TIMEOUT_MS", DEFAULT_LOAD_TIMEOUT_MS),
            capture_tick_ms: env_parse("CAMCAL_CAPTURE_TICK_MS", DEFAULT_CAPTURE_TICK_MS).max(1),
            default_capture_duration_s: env_parse("CAMCAL_CAPTURE_DURATION_S", DEFAULT_CAPTURE_DURATION_S),
            default_capture_interval_ms: env_parse("CAMCAL_CAPTURE_INTERVAL_MS", DEFAULT_CAPTURE_INTERVAL_MS),
            fps_sample_ms: env_parse("CAMCAL_FPS_SAMPLE_MS", DEFAULT_FPS_SAMPLE_MS).max(1),
            notice_capacity: env_parse("CAMCAL_NOTICE_CAPACITY", DEFAULT_NOTICE_CAPACITY),
        }
    }

    /// Recovery timeout armed by the command gate for `kind`.
    pub fn timeout_for(&self, kind: CommandKind) -> u64 {
        match kind.class() {
            CommandClass::Heavy => self.toggle_timeout_ms,
            CommandClass::Light => self.light_timeout_ms,
            CommandClass::Load => self.load_timeout_ms,
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
