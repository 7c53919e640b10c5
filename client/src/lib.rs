//! Control client for a remote camera-calibration device.
//!
//! SYSTEM CONTEXT
//! ==============
//! The device streams video and performs the calibration math. This crate
//! coordinates the operator workflow against it over one websocket:
//!
//! | Module | Role |
//! |---|---|
//! | `net::connection` | connection lifecycle and fixed-delay reconnect |
//! | `net::router` | inbound classification and `type` dispatch |
//! | `net::gate` | one in-flight command per kind, with timeouts |
//! | `state` | authoritative snapshot, capture countdown, affordances |
//! | `session` | ties the above together behind an effect-based API |
//! | `util` | timer arena and click scaling |
//!
//! Everything except `net::browser` is plain Rust with no browser or socket
//! dependency. The `hydrate` feature adds the in-page driver.

pub mod config;
pub mod net;
pub mod session;
pub mod state;
pub mod util;

/// WASM entry point: install logging and start the session against the
/// page's own host.
#[cfg(feature = "hydrate")]
#[wasm_bindgen::prelude::wasm_bindgen]
pub fn hydrate() {
    console_error_panic_hook::set_once();
    if let Err(err) = console_log::init_with_level(log::Level::Debug) {
        leptos::logging::warn!("console logger unavailable: {err}");
    }
    net::browser::spawn_session(config::SessionConfig::default());
    leptos::logging::log!("camera calibration client started");
}
