//! Marker-mode (ArUco) event handlers.

#[cfg(test)]
#[path = "router_aruco_test.rs"]
mod router_aruco_test;

use messages::{Acknowledgement, ArucoDetectionUpdate, ArucoModeStatus, CodecError, Envelope, MarkerCoordinatesSet};

use super::{Reaction, RouteContext, Router, failure_text, succeeded};
use crate::net::gate::CommandKind;
use crate::state::calibration::GroundPoint;
use crate::state::ui::Notice;

pub(super) fn register(router: &mut Router) {
    router.register("aruco_mode_status", handle_mode_status);
    router.register("aruco_detection_update", handle_detection_update);
    router.register("marker_coordinates_set", handle_marker_set);
    router.register("marker_coordinates_saved", handle_markers_saved);
    router.register("marker_coordinates_loaded", handle_markers_loaded);
    router.register("aruco_params_reset", handle_params_reset);
}

fn handle_mode_status(ctx: &RouteContext<'_>, envelope: &Envelope) -> Result<Reaction, CodecError> {
    let status: ArucoModeStatus = envelope.payload_as()?;
    let mut reaction = Reaction::unchanged(ctx);
    if let Some(loaded) = status.homography_loaded {
        reaction.snapshot.homography_loaded = loaded;
    }
    if let Some(count) = status.detected_markers {
        reaction.snapshot.detected_markers = count;
    }
    let Some(enabled) = status.mode() else {
        return Ok(reaction);
    };
    reaction.snapshot.aruco_mode = enabled;
    reaction.resolve(CommandKind::ToggleMarkerMode);
    let text = match (enabled, reaction.snapshot.homography_loaded) {
        (true, true) => "Marker mode enabled, homography loaded",
        (true, false) => "Marker mode enabled, no homography loaded",
        (false, _) => "Marker mode disabled",
    };
    reaction.notify(Notice::info(text));
    Ok(reaction)
}

/// High-frequency detector telemetry; updates the snapshot silently.
fn handle_detection_update(ctx: &RouteContext<'_>, envelope: &Envelope) -> Result<Reaction, CodecError> {
    let update: ArucoDetectionUpdate = envelope.payload_as()?;
    let mut reaction = Reaction::unchanged(ctx);
    if let Some(count) = update.detected_markers {
        reaction.snapshot.detected_markers = count;
    }
    if let Some(status) = update.matrix_status {
        reaction.snapshot.matrix_status = Some(status);
    }
    if let Some(loaded) = update.homography_loaded {
        reaction.snapshot.homography_loaded = loaded;
    }
    Ok(reaction)
}

fn handle_marker_set(ctx: &RouteContext<'_>, envelope: &Envelope) -> Result<Reaction, CodecError> {
    let set: MarkerCoordinatesSet = envelope.payload_as()?;
    let mut reaction = Reaction::unchanged(ctx);
    reaction.resolve(CommandKind::SetMarker);
    if !succeeded(set.success, set.error.as_deref()) {
        reaction.notify(Notice::error(failure_text(set.error.as_deref(), "Failed to set marker coordinates")));
        return Ok(reaction);
    }
    if let (Some(id), Some(x), Some(y)) = (set.marker_id, set.x, set.y) {
        reaction.snapshot.markers.insert(id, GroundPoint { x, y });
    }
    reaction.notify(Notice::success("Marker coordinates set"));
    Ok(reaction)
}

fn handle_markers_saved(ctx: &RouteContext<'_>, envelope: &Envelope) -> Result<Reaction, CodecError> {
    acknowledge(ctx, envelope, CommandKind::SaveMarkers, "Marker coordinates saved", "Failed to save marker coordinates")
}

fn handle_markers_loaded(ctx: &RouteContext<'_>, envelope: &Envelope) -> Result<Reaction, CodecError> {
    acknowledge(ctx, envelope, CommandKind::LoadMarkers, "Marker coordinates loaded", "Failed to load marker coordinates")
}

fn handle_params_reset(ctx: &RouteContext<'_>, _envelope: &Envelope) -> Result<Reaction, CodecError> {
    let mut reaction = Reaction::unchanged(ctx);
    reaction.notify(Notice::info("Marker detection parameters reset"));
    Ok(reaction)
}

fn acknowledge(
    ctx: &RouteContext<'_>,
    envelope: &Envelope,
    kind: CommandKind,
    ok_text: &str,
    failed_text: &str,
) -> Result<Reaction, CodecError> {
    let ack: Acknowledgement = envelope.payload_as()?;
    let mut reaction = Reaction::unchanged(ctx);
    reaction.resolve(kind);
    if succeeded(ack.success, ack.error.as_deref()) {
        reaction.notify(Notice::success(ok_text));
    } else {
        reaction.notify(Notice::error(failure_text(ack.error.as_deref(), failed_text)));
    }
    Ok(reaction)
}
