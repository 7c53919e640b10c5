//! Coordinate-calibration (homography) event handlers.
//!
//! Point confirmations carry no payload, so `calibration_point_added` moves
//! the locally pending point into the confirmed list, and
//! `calibration_point_removed` pops only while a removal is awaited. A
//! duplicate confirmation finds nothing pending and changes nothing.

#[cfg(test)]
#[path = "router_homography_test.rs"]
mod router_homography_test;

use messages::{CalibrationModeChanged, CodecError, Envelope, GroundCoordinates, HomographyResult};

use super::{Reaction, RouteContext, Router, SideEffect, failure_text, succeeded};
use crate::net::gate::CommandKind;
use crate::state::calibration::{CalibrationPoint, GroundPoint};
use crate::state::ui::Notice;

pub(super) fn register(router: &mut Router) {
    router.register("calibration_mode_changed", handle_mode_changed);
    router.register("calibration_point_added", handle_point_added);
    router.register("calibration_point_removed", handle_point_removed);
    router.register("calibration_points_cleared", handle_points_cleared);
    router.register("calibration_result", handle_calibration_result);
    router.register("homography_computed", handle_homography_computed);
    router.register("homography_saved", handle_homography_saved);
    router.register("homography_loaded", handle_homography_loaded);
    router.register("ground_coordinates", handle_ground_coordinates);
}

fn handle_mode_changed(ctx: &RouteContext<'_>, envelope: &Envelope) -> Result<Reaction, CodecError> {
    let changed: CalibrationModeChanged = envelope.payload_as()?;
    let mut reaction = Reaction::unchanged(ctx);
    let Some(enabled) = changed.enabled else {
        return Ok(reaction);
    };
    reaction.snapshot.coordinate_calibration_mode = enabled;
    reaction.resolve(CommandKind::ToggleCoordinateMode);
    if enabled {
        reaction.notify(Notice::info("Coordinate calibration mode enabled"));
    } else {
        reaction.push(SideEffect::ClearPendingPoint);
        reaction.notify(Notice::info("Coordinate calibration mode disabled"));
    }
    Ok(reaction)
}

fn handle_point_added(ctx: &RouteContext<'_>, _envelope: &Envelope) -> Result<Reaction, CodecError> {
    let mut reaction = Reaction::unchanged(ctx);
    let Some(point) = ctx.pending_point else {
        return Ok(reaction);
    };
    reaction.snapshot.calibration_points.push(*point);
    reaction.push(SideEffect::ClearPendingPoint);
    reaction.resolve(CommandKind::AddPoint);
    reaction.notify(Notice::success(format!(
        "Calibration point {} added",
        reaction.snapshot.calibration_points.len()
    )));
    Ok(reaction)
}

fn handle_point_removed(ctx: &RouteContext<'_>, _envelope: &Envelope) -> Result<Reaction, CodecError> {
    let mut reaction = Reaction::unchanged(ctx);
    if !ctx.is_awaiting(CommandKind::RemovePoint) {
        return Ok(reaction);
    }
    reaction.snapshot.calibration_points.pop();
    reaction.resolve(CommandKind::RemovePoint);
    reaction.notify(Notice::success("Calibration point removed"));
    Ok(reaction)
}

fn handle_points_cleared(ctx: &RouteContext<'_>, _envelope: &Envelope) -> Result<Reaction, CodecError> {
    let mut reaction = Reaction::unchanged(ctx);
    reaction.snapshot.calibration_points.clear();
    reaction.resolve(CommandKind::ClearPoints);
    reaction.notify(Notice::success("All calibration points cleared"));
    Ok(reaction)
}

/// `calibration_result` covers both solvers; `source` says which one.
fn handle_calibration_result(ctx: &RouteContext<'_>, envelope: &Envelope) -> Result<Reaction, CodecError> {
    let result: HomographyResult = envelope.payload_as()?;
    let kind = if result.source.as_deref() == Some("aruco") {
        CommandKind::CalibrateFromMarkers
    } else {
        CommandKind::ComputeHomography
    };
    Ok(apply_solve(ctx, &result, kind))
}

fn handle_homography_computed(ctx: &RouteContext<'_>, envelope: &Envelope) -> Result<Reaction, CodecError> {
    let result: HomographyResult = envelope.payload_as()?;
    Ok(apply_solve(ctx, &result, CommandKind::ComputeHomography))
}

fn apply_solve(ctx: &RouteContext<'_>, result: &HomographyResult, kind: CommandKind) -> Reaction {
    let mut reaction = Reaction::unchanged(ctx);
    reaction.resolve(kind);
    if succeeded(result.success, result.error.as_deref()) {
        reaction.snapshot.coordinate_calibrated = true;
        if let Some(matrix) = result.homography_matrix {
            reaction.snapshot.homography = Some(matrix);
        }
        reaction.notify(Notice::success("Homography computed"));
        reaction.last_operation("Calibration successful, homography matrix updated");
    } else {
        reaction.notify(Notice::error(failure_text(result.error.as_deref(), "Homography computation failed")));
        reaction.last_operation("Homography computation failed");
    }
    reaction
}

fn handle_homography_saved(ctx: &RouteContext<'_>, envelope: &Envelope) -> Result<Reaction, CodecError> {
    let result: HomographyResult = envelope.payload_as()?;
    let mut reaction = Reaction::unchanged(ctx);
    reaction.resolve(CommandKind::SaveHomography);
    if succeeded(result.success, result.error.as_deref()) {
        reaction.notify(Notice::success("Calibration result saved"));
        reaction.last_operation("Calibration result saved");
    } else {
        reaction.notify(Notice::error(failure_text(result.error.as_deref(), "Failed to save calibration result")));
    }
    Ok(reaction)
}

/// A load replaces the matrix and, when the file carried them, the points.
fn handle_homography_loaded(ctx: &RouteContext<'_>, envelope: &Envelope) -> Result<Reaction, CodecError> {
    let result: HomographyResult = envelope.payload_as()?;
    let mut reaction = Reaction::unchanged(ctx);
    reaction.resolve(CommandKind::LoadHomography);
    if !succeeded(result.success, result.error.as_deref()) {
        reaction.notify(Notice::error(failure_text(result.error.as_deref(), "Failed to load calibration result")));
        return Ok(reaction);
    }

    let snapshot = &mut reaction.snapshot;
    snapshot.coordinate_calibrated = true;
    snapshot.homography_loaded = true;
    if let Some(matrix) = result.homography_matrix {
        snapshot.homography = Some(matrix);
    }
    if let Some(points) = &result.calibration_points {
        snapshot.calibration_points = points.iter().map(CalibrationPoint::from).collect();
    }
    reaction.notify(Notice::success("Calibration result loaded"));
    reaction.last_operation("Calibration result loaded");
    Ok(reaction)
}

fn handle_ground_coordinates(ctx: &RouteContext<'_>, envelope: &Envelope) -> Result<Reaction, CodecError> {
    let coords: GroundCoordinates = envelope.payload_as()?;
    let mut reaction = Reaction::unchanged(ctx);
    reaction.resolve(CommandKind::ImageToGround);
    if let (Some(x), Some(y)) = (coords.x, coords.y) {
        reaction.snapshot.last_ground_point = Some(GroundPoint { x, y });
        reaction.notify(Notice::info(format!("Ground position ({x:.3}, {y:.3})")));
    }
    Ok(reaction)
}
