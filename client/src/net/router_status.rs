//! Server status and failure events.
//!
//! `error` events are surfaced verbatim and resolve nothing: the device does
//! not say which command failed, so pending commands fall back to their own
//! timeouts.

#[cfg(test)]
#[path = "router_status_test.rs"]
mod router_status_test;

use messages::{CodecError, Envelope, ErrorNotification, ServerStatus};

use super::{Reaction, RouteContext, Router};
use crate::state::ui::{Notice, Severity};

pub(super) fn register(router: &mut Router) {
    router.register("status", handle_status);
    router.register("error", handle_error);
    router.register("error_notification", handle_error_notification);
}

fn handle_status(ctx: &RouteContext<'_>, envelope: &Envelope) -> Result<Reaction, CodecError> {
    let status: ServerStatus = envelope.payload_as()?;
    let mut reaction = Reaction::unchanged(ctx);
    let severity = status_severity(status.status.as_deref());
    if let Some(text) = status.message.or(status.status) {
        reaction.notify(Notice::new(severity, text));
    }
    Ok(reaction)
}

fn handle_error(ctx: &RouteContext<'_>, envelope: &Envelope) -> Result<Reaction, CodecError> {
    let status: ServerStatus = envelope.payload_as()?;
    let mut reaction = Reaction::unchanged(ctx);
    let message = status.message.unwrap_or_else(|| "unknown device error".to_owned());
    log::warn!("device error: {message}");
    reaction.last_operation(format!("Error: {message}"));
    reaction.notify(Notice::error(message));
    Ok(reaction)
}

fn handle_error_notification(ctx: &RouteContext<'_>, envelope: &Envelope) -> Result<Reaction, CodecError> {
    let notification: ErrorNotification = envelope.payload_as()?;
    let mut reaction = Reaction::unchanged(ctx);
    let severity = notification_severity(notification.error_type.as_deref());
    if let Some(message) = notification.message {
        reaction.notify(Notice::new(severity, message));
    }
    Ok(reaction)
}

pub(super) fn notification_severity(error_type: Option<&str>) -> Severity {
    match error_type {
        Some("camera_warning") => Severity::Warning,
        Some("camera_critical" | "camera_recovery_failed") => Severity::Error,
        Some("camera_recovery_success") => Severity::Success,
        _ => Severity::Info,
    }
}

fn status_severity(status: Option<&str>) -> Severity {
    match status {
        Some("error") => Severity::Error,
        Some("warning") => Severity::Warning,
        Some("success" | "connected" | "streaming") => Severity::Success,
        _ => Severity::Info,
    }
}
