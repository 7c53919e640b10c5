//! Connection manager: one logical link to the device, reopened forever.
//!
//! SYSTEM CONTEXT
//! ==============
//! The manager owns `ConnectionState` and nothing else. It does not hold a
//! socket; drivers (browser or native) open the real transport when the
//! session emits `Effect::Connect` and report back through `on_open` and
//! `on_close`.
//!
//! DESIGN
//! ======
//! Reconnection uses a fixed delay with no growth and no retry ceiling; the
//! device is expected to come back. Every transition is logged with the
//! attempt number so flapping links are easy to spot in the console.

#[cfg(test)]
#[path = "connection_test.rs"]
mod connection_test;

use std::fmt;

use crate::util::timers::{TimerArena, TimerPurpose};

/// Connection lifecycle state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport handshake in progress.
    Connecting,
    /// Transport open; commands may be sent.
    Open,
    /// No transport. A reconnect is scheduled unless the session shut down.
    #[default]
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("connection is {0}, command not sent")]
    NotOpen(ConnectionState),
}

#[derive(Debug)]
pub struct ConnectionManager {
    state: ConnectionState,
    attempt: u64,
    shut_down: bool,
    reconnect_delay_ms: u64,
    resync_follow_up_ms: u64,
}

impl ConnectionManager {
    pub fn new(reconnect_delay_ms: u64, resync_follow_up_ms: u64) -> Self {
        Self { state: ConnectionState::Closed, attempt: 0, shut_down: false, reconnect_delay_ms, resync_follow_up_ms }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Number of connect attempts made so far.
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    pub fn is_live(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Begin a connect attempt. Returns the attempt number, or `None` after
    /// shutdown or while an attempt is already in progress.
    pub fn open(&mut self, timers: &mut TimerArena) -> Option<u64> {
        if self.shut_down || self.state != ConnectionState::Closed {
            return None;
        }
        timers.cancel(TimerPurpose::Reconnect);
        self.state = ConnectionState::Connecting;
        self.attempt += 1;
        log::info!("connect attempt {}", self.attempt);
        Some(self.attempt)
    }

    /// Transport reported open. Arms the resync follow-up; the caller sends
    /// the immediate status request.
    pub fn on_open(&mut self, now: u64, timers: &mut TimerArena) {
        self.state = ConnectionState::Open;
        timers.schedule(TimerPurpose::StatusResync, now, self.resync_follow_up_ms);
        log::info!("connection open (attempt {})", self.attempt);
    }

    /// Transport closed or failed. Returns `true` when this call scheduled a
    /// reconnect; repeated close reports for the same attempt are ignored.
    pub fn on_close(&mut self, now: u64, timers: &mut TimerArena) -> bool {
        if self.state == ConnectionState::Closed {
            return false;
        }
        self.state = ConnectionState::Closed;
        timers.cancel(TimerPurpose::StatusResync);
        if self.shut_down {
            log::info!("connection closed (attempt {}), shut down", self.attempt);
            return false;
        }
        timers.schedule(TimerPurpose::Reconnect, now, self.reconnect_delay_ms);
        log::warn!(
            "connection closed (attempt {}), reconnecting in {} ms",
            self.attempt,
            self.reconnect_delay_ms
        );
        true
    }

    /// Send precondition.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::NotOpen`] unless the state is `Open`.
    pub fn ensure_open(&self) -> Result<(), ConnectionError> {
        if self.is_live() { Ok(()) } else { Err(ConnectionError::NotOpen(self.state)) }
    }

    /// Stop reconnecting. The current transport, if any, is left to the driver.
    pub fn shutdown(&mut self, timers: &mut TimerArena) {
        self.shut_down = true;
        timers.cancel(TimerPurpose::Reconnect);
        timers.cancel(TimerPurpose::StatusResync);
    }
}

/// Derive the device websocket endpoint from the page URL: `wss://host/ws`
/// for https pages, `ws://host/ws` otherwise.
pub fn endpoint_url(page_url: &str) -> String {
    let (scheme, rest) = match page_url.split_once("://") {
        Some(("https", rest)) => ("wss", rest),
        Some((_, rest)) => ("ws", rest),
        None => ("ws", page_url),
    };
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host = if host.is_empty() { "localhost" } else { host };
    format!("{scheme}://{host}/ws")
}
