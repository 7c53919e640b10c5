//! Networking modules for the device websocket.
//!
//! SYSTEM CONTEXT
//! ==============
//! `connection` tracks the transport lifecycle, `gate` admits at most one
//! in-flight command per kind, and `router` turns inbound units into
//! snapshot reactions. `browser` is the gloo-net driver that wires them to a
//! real socket inside the page.

#[cfg(feature = "hydrate")]
pub mod browser;
pub mod connection;
pub mod gate;
pub mod router;
