//! Auto-capture event handlers.
//!
//! The countdown itself belongs to the capture scheduler; handlers here only
//! ask for it to be started, stopped or resynchronized.

#[cfg(test)]
#[path = "router_capture_test.rs"]
mod router_capture_test;

use messages::{AutoCaptureCompleted, AutoCaptureStatus, ChessboardDetected, CodecError, Envelope};

use super::{Reaction, RouteContext, Router, SideEffect, failure_text};
use crate::state::ui::Notice;

pub(super) fn register(router: &mut Router) {
    router.register("auto_capture_status", handle_capture_status);
    router.register("auto_capture_started", handle_capture_started);
    router.register("auto_capture_stopped", handle_capture_stopped);
    router.register("auto_capture_completed", handle_capture_completed);
    router.register("chessboard_detected", handle_chessboard_detected);
}

fn handle_capture_status(ctx: &RouteContext<'_>, envelope: &Envelope) -> Result<Reaction, CodecError> {
    let status: AutoCaptureStatus = envelope.payload_as()?;
    let mut reaction = Reaction::unchanged(ctx);

    match status.started {
        Some(true) => apply_started(ctx, &status, &mut reaction),
        Some(false) => {
            reaction.push(SideEffect::CaptureStopped);
            reaction.notify(Notice::error(failure_text(status.message.as_deref(), "Failed to start auto capture")));
        }
        None => {}
    }
    if status.stopped == Some(true) {
        apply_stopped(&mut reaction);
    }
    Ok(reaction)
}

fn handle_capture_started(ctx: &RouteContext<'_>, envelope: &Envelope) -> Result<Reaction, CodecError> {
    let status: AutoCaptureStatus = envelope.payload_as()?;
    let mut reaction = Reaction::unchanged(ctx);
    apply_started(ctx, &status, &mut reaction);
    Ok(reaction)
}

fn handle_capture_stopped(ctx: &RouteContext<'_>, _envelope: &Envelope) -> Result<Reaction, CodecError> {
    let mut reaction = Reaction::unchanged(ctx);
    apply_stopped(&mut reaction);
    Ok(reaction)
}

/// Completion reports the final count. It does not end the local countdown,
/// which runs to its own end time; a count increase restarts the "next
/// capture" window.
fn handle_capture_completed(ctx: &RouteContext<'_>, envelope: &Envelope) -> Result<Reaction, CodecError> {
    let completed: AutoCaptureCompleted = envelope.payload_as()?;
    let mut reaction = Reaction::unchanged(ctx);
    if let Some(count) = completed.image_count {
        reaction.snapshot.session_image_count = count;
    }
    resync_on_increase(ctx, &mut reaction);

    let text = format!(
        "Auto capture completed: {} successful out of {} attempts",
        completed.success_count.unwrap_or(0),
        completed.attempt_count.unwrap_or(0)
    );
    reaction.notify(Notice::success(text.clone()));
    reaction.last_operation(text);
    Ok(reaction)
}

fn handle_chessboard_detected(ctx: &RouteContext<'_>, envelope: &Envelope) -> Result<Reaction, CodecError> {
    let detected: ChessboardDetected = envelope.payload_as()?;
    let mut reaction = Reaction::unchanged(ctx);
    if let Some(count) = detected.current_session_count.or(detected.image_count) {
        reaction.snapshot.session_image_count = count;
    }
    resync_on_increase(ctx, &mut reaction);
    Ok(reaction)
}

fn apply_started(ctx: &RouteContext<'_>, status: &AutoCaptureStatus, reaction: &mut Reaction) {
    reaction.notify(Notice::success("Auto capture started"));
    if ctx.capture_active {
        return;
    }
    if let (Some(duration_s), Some(interval_ms)) = (status.duration, status.interval) {
        reaction.push(SideEffect::CaptureStarted { duration_s, interval_ms });
    }
}

fn apply_stopped(reaction: &mut Reaction) {
    reaction.push(SideEffect::CaptureStopped);
    reaction.notify(Notice::success("Auto capture stopped"));
}

fn resync_on_increase(ctx: &RouteContext<'_>, reaction: &mut Reaction) {
    if ctx.capture_active && reaction.snapshot.session_image_count > ctx.snapshot.session_image_count {
        reaction.push(SideEffect::CaptureResync);
    }
}
