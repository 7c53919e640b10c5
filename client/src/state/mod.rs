//! Session state models.
//!
//! SYSTEM CONTEXT
//! ==============
//! `snapshot` is the authoritative mirror written only by router handlers,
//! `capture` is the countdown owned by the capture scheduler, and `ui` is the
//! optimistic affordance layer. `calibration` holds the value types shared by
//! all three.

pub mod calibration;
pub mod capture;
pub mod snapshot;
pub mod ui;
