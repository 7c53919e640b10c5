//! Utility helpers shared across session components.
//!
//! SYSTEM CONTEXT
//! ==============
//! `timers` is the single cancellable-timer abstraction every component arms
//! its delays through; `coords` converts operator clicks into image pixels.

pub mod coords;
pub mod timers;
