//! Message router: classify inbound units and dispatch events by `type`.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every unit the driver receives comes through `route`. Binary units are
//! video frames and pass straight through. Text units are decoded into an
//! envelope and handed to the handler registered for their `type`.
//!
//! DESIGN
//! ======
//! Handlers are plain functions `(context, event) -> Reaction`. They read
//! the current snapshot and return a complete replacement plus a list of
//! side-effect descriptors (resolve a pending command, notify the operator,
//! resync the capture countdown). Handlers never touch timers, the gate or
//! the transport, so each can be tested with a literal JSON event and a
//! default snapshot.
//!
//! The table is an open set: an unknown `type` is logged at debug level and
//! dropped, so the device can add event types without breaking the client.
//! Handlers are idempotent under duplicate delivery: a repeated status event
//! writes the same values again, and confirmations that consume a pending
//! operation find nothing pending the second time.
//!
//! ERROR HANDLING
//! ==============
//! Malformed JSON and wrongly-shaped payloads are logged at warn level and
//! discarded. Nothing here is fatal.

#[path = "router_aruco.rs"]
mod router_aruco;
#[path = "router_camera.rs"]
mod router_camera;
#[path = "router_capture.rs"]
mod router_capture;
#[path = "router_homography.rs"]
mod router_homography;
#[path = "router_status.rs"]
mod router_status;

#[cfg(test)]
#[path = "router_test.rs"]
mod router_test;

use std::collections::{BTreeSet, HashMap};

use messages::{CodecError, Envelope, Inbound};

use crate::net::gate::CommandKind;
use crate::state::calibration::CalibrationPoint;
use crate::state::snapshot::SessionSnapshot;
use crate::state::ui::Notice;

/// Read-only view handlers decide from.
#[derive(Clone, Copy, Debug)]
pub struct RouteContext<'a> {
    pub snapshot: &'a SessionSnapshot,
    /// Point sent with `add_calibration_point`, not yet confirmed.
    pub pending_point: Option<&'a CalibrationPoint>,
    /// Command kinds awaiting confirmation.
    pub awaiting: &'a BTreeSet<CommandKind>,
    pub capture_active: bool,
}

impl RouteContext<'_> {
    pub fn is_awaiting(&self, kind: CommandKind) -> bool {
        self.awaiting.contains(&kind)
    }
}

/// Side effect requested by a handler, applied by the session.
#[derive(Clone, Debug, PartialEq)]
pub enum SideEffect {
    /// Release the command gate for this kind.
    Resolve(CommandKind),
    Notify(Notice),
    LastOperation(String),
    /// The device started capture and no local countdown exists yet.
    CaptureStarted { duration_s: u32, interval_ms: u32 },
    /// The device stopped capture (or refused to start it).
    CaptureStopped,
    /// The device captured a new image while the countdown runs.
    CaptureResync,
    /// The pending calibration point was consumed or abandoned.
    ClearPendingPoint,
}

/// Handler output: the replacement snapshot and the side effects to apply.
#[derive(Clone, Debug, PartialEq)]
pub struct Reaction {
    pub snapshot: SessionSnapshot,
    pub effects: Vec<SideEffect>,
}

impl Reaction {
    pub fn new(snapshot: SessionSnapshot) -> Self {
        Self { snapshot, effects: Vec::new() }
    }

    /// A reaction that changes nothing.
    pub fn unchanged(ctx: &RouteContext<'_>) -> Self {
        Self::new(ctx.snapshot.clone())
    }

    pub fn push(&mut self, effect: SideEffect) {
        self.effects.push(effect);
    }

    pub fn resolve(&mut self, kind: CommandKind) {
        self.push(SideEffect::Resolve(kind));
    }

    pub fn notify(&mut self, notice: Notice) {
        self.push(SideEffect::Notify(notice));
    }

    pub fn last_operation(&mut self, text: impl Into<String>) {
        self.push(SideEffect::LastOperation(text.into()));
    }
}

pub type Handler = fn(&RouteContext<'_>, &Envelope) -> Result<Reaction, CodecError>;

/// Outcome of routing one inbound unit.
#[derive(Debug)]
pub enum Routed {
    /// Binary unit for the display pipeline.
    Frame(Vec<u8>),
    Handled(Reaction),
    /// No handler for this `type`; dropped.
    Unknown(String),
    /// Undecodable text or payload; dropped.
    Malformed(CodecError),
}

pub struct Router {
    table: HashMap<&'static str, Handler>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Router with every built-in handler registered.
    pub fn new() -> Self {
        let mut router = Self::empty();
        router_camera::register(&mut router);
        router_capture::register(&mut router);
        router_homography::register(&mut router);
        router_aruco::register(&mut router);
        router_status::register(&mut router);
        router
    }

    pub fn empty() -> Self {
        Self { table: HashMap::new() }
    }

    /// Register `handler` for `kind`, returning any handler it replaces.
    pub fn register(&mut self, kind: &'static str, handler: Handler) -> Option<Handler> {
        self.table.insert(kind, handler)
    }

    pub fn handles(&self, kind: &str) -> bool {
        self.table.contains_key(kind)
    }

    /// Registered event kinds, sorted.
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.table.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn route(&self, ctx: &RouteContext<'_>, inbound: Inbound) -> Routed {
        match inbound {
            Inbound::Frame(bytes) => Routed::Frame(bytes),
            Inbound::Event(envelope) => self.dispatch(ctx, &envelope),
        }
    }

    /// Decode and route a text unit.
    pub fn route_text(&self, ctx: &RouteContext<'_>, text: &str) -> Routed {
        match messages::classify_text(text) {
            Ok(inbound) => self.route(ctx, inbound),
            Err(err) => {
                log::warn!("discarding malformed message: {err}");
                Routed::Malformed(err)
            }
        }
    }

    fn dispatch(&self, ctx: &RouteContext<'_>, envelope: &Envelope) -> Routed {
        let Some(handler) = self.table.get(envelope.kind.as_str()) else {
            log::debug!("ignoring unrecognized event type `{}`", envelope.kind);
            return Routed::Unknown(envelope.kind.clone());
        };
        match handler(ctx, envelope) {
            Ok(reaction) => Routed::Handled(reaction),
            Err(err) => {
                log::warn!("discarding `{}` event: {err}", envelope.kind);
                Routed::Malformed(err)
            }
        }
    }
}

/// Whether an acknowledgement reports success. Some firmware omits `success`
/// on success, so an absent flag with no error counts as success.
pub(super) fn succeeded(success: Option<bool>, error: Option<&str>) -> bool {
    success.unwrap_or(error.is_none())
}

/// Server error text verbatim, or `fallback` when the device sent none.
pub(super) fn failure_text(error: Option<&str>, fallback: &str) -> String {
    match error {
        Some(text) if !text.trim().is_empty() => text.to_owned(),
        _ => fallback.to_owned(),
    }
}
