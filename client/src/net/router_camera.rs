//! Camera-intrinsics event handlers.

#[cfg(test)]
#[path = "router_camera_test.rs"]
mod router_camera_test;

use messages::{CameraCalibrationResult, CameraCalibrationStatus, CameraInfo, CodecError, CorrectionToggled, Envelope, Resolution};

use super::{Reaction, RouteContext, Router, SideEffect, failure_text, succeeded};
use crate::net::gate::CommandKind;
use crate::state::calibration::CalibrationQuality;
use crate::state::snapshot::{FrameSize, SessionSnapshot};
use crate::state::ui::Notice;

pub(super) fn register(router: &mut Router) {
    router.register("camera_calibration_status", handle_calibration_status);
    router.register("camera_calibration_saved", handle_calibration_saved);
    router.register("camera_calibration_loaded", handle_calibration_loaded);
    router.register("camera_calibration_cleared", handle_calibration_cleared);
    router.register("camera_correction_toggled", handle_correction_toggled);
    router.register("camera_info", handle_camera_info);
    router.register("frame_info", handle_frame_info);
    router.register("resolution_changed", handle_resolution_changed);
}

/// `camera_calibration_status` arrives in several shapes: mode flags on a
/// toggle or resync, counts on capture, `{success, image_count}` after a
/// single add, `{success, calibrated, error}` after a solve and
/// `{save_success}` after a save. Each present field is applied.
fn handle_calibration_status(ctx: &RouteContext<'_>, envelope: &Envelope) -> Result<Reaction, CodecError> {
    let status: CameraCalibrationStatus = envelope.payload_as()?;
    let mut reaction = Reaction::unchanged(ctx);
    let snapshot = &mut reaction.snapshot;
    let mut effects = Vec::new();

    if let Some(mode) = status.calibration_mode {
        snapshot.camera_calibration_mode = mode;
        effects.push(SideEffect::Resolve(CommandKind::ToggleCameraMode));
    }
    if status.calibrated == Some(true) {
        snapshot.camera_calibrated = true;
    }
    if let Some(count) = status.current_session_count.or(status.image_count) {
        snapshot.session_image_count = count;
    }
    if let Some(saved) = status.saved_count {
        snapshot.saved_image_count = saved;
    }
    apply_board(snapshot, status.width, status.height, status.square_size);

    if let Some(success) = status.success {
        if status.calibrated.is_some() || status.error.is_some() {
            effects.push(SideEffect::Resolve(CommandKind::PerformCalibration));
            let reprojection = status.error.as_ref().and_then(messages::ErrorField::reprojection);
            if success {
                snapshot.reprojection_error = reprojection.or(snapshot.reprojection_error);
                effects.push(SideEffect::Notify(Notice::success(solve_summary(reprojection))));
                effects.push(SideEffect::LastOperation("Camera calibration complete".to_owned()));
            } else {
                let message = status.error.as_ref().and_then(messages::ErrorField::message);
                effects.push(SideEffect::Notify(Notice::error(failure_text(message, "Camera calibration failed"))));
            }
        } else if status.image_count.is_some() || status.current_session_count.is_some() {
            effects.push(SideEffect::Resolve(CommandKind::AddCalibrationImage));
            if success {
                effects.push(SideEffect::Notify(Notice::success(format!(
                    "Calibration image added ({} this session)",
                    snapshot.session_image_count
                ))));
            } else {
                effects.push(SideEffect::Notify(Notice::warning("No chessboard detected, image rejected")));
            }
        }
    }

    if let Some(saved) = status.save_success {
        effects.push(SideEffect::Resolve(CommandKind::SaveCalibration));
        effects.push(SideEffect::Notify(if saved {
            Notice::success("Camera calibration saved")
        } else {
            Notice::error("Failed to save camera calibration")
        }));
    }
    if let Some(message) = status.session_message.filter(|m| !m.is_empty()) {
        effects.push(SideEffect::Notify(Notice::info(message)));
    }
    if status.auto_capture_progress == Some(true) {
        effects.push(SideEffect::Notify(Notice::success(format!(
            "Captured {} images",
            snapshot.session_image_count
        ))));
    }
    if ctx.capture_active && snapshot.session_image_count > ctx.snapshot.session_image_count {
        effects.push(SideEffect::CaptureResync);
    }

    reaction.effects = effects;
    Ok(reaction)
}

fn handle_calibration_saved(ctx: &RouteContext<'_>, envelope: &Envelope) -> Result<Reaction, CodecError> {
    let result: CameraCalibrationResult = envelope.payload_as()?;
    let mut reaction = Reaction::unchanged(ctx);
    reaction.resolve(CommandKind::SaveCalibration);

    let message = result.error.as_ref().and_then(messages::ErrorField::message);
    if succeeded(result.success, message) {
        if let Some(error) = result.error.as_ref().and_then(messages::ErrorField::reprojection) {
            reaction.snapshot.reprojection_error = Some(error);
        }
        let text = match result.filepath.as_deref() {
            Some(path) => format!("Camera calibration saved to {path}"),
            None => "Camera calibration saved".to_owned(),
        };
        reaction.notify(Notice::success(text.clone()));
        reaction.last_operation(text);
    } else {
        reaction.notify(Notice::error(failure_text(message, "Failed to save camera calibration")));
    }
    Ok(reaction)
}

fn handle_calibration_loaded(ctx: &RouteContext<'_>, envelope: &Envelope) -> Result<Reaction, CodecError> {
    let result: CameraCalibrationResult = envelope.payload_as()?;
    let mut reaction = Reaction::unchanged(ctx);
    reaction.resolve(CommandKind::LoadCalibration);

    let message = result.error.as_ref().and_then(messages::ErrorField::message);
    if succeeded(result.success, message) {
        let snapshot = &mut reaction.snapshot;
        snapshot.camera_calibrated = true;
        if let Some(error) = result.error.as_ref().and_then(messages::ErrorField::reprojection) {
            snapshot.reprojection_error = Some(error);
        }
        reaction.notify(Notice::success("Camera calibration loaded"));
        reaction.last_operation("Camera calibration loaded");
    } else {
        reaction.notify(Notice::error(failure_text(message, "Failed to load camera calibration")));
    }
    Ok(reaction)
}

/// The only event that lowers `camera_calibrated`.
fn handle_calibration_cleared(ctx: &RouteContext<'_>, _envelope: &Envelope) -> Result<Reaction, CodecError> {
    let mut reaction = Reaction::unchanged(ctx);
    reaction.snapshot.camera_calibrated = false;
    reaction.snapshot.reprojection_error = None;
    reaction.snapshot.camera_correction_enabled = false;
    reaction.notify(Notice::info("Camera calibration cleared"));
    Ok(reaction)
}

fn handle_correction_toggled(ctx: &RouteContext<'_>, envelope: &Envelope) -> Result<Reaction, CodecError> {
    let toggled: CorrectionToggled = envelope.payload_as()?;
    let mut reaction = Reaction::unchanged(ctx);
    reaction.resolve(CommandKind::ToggleCorrection);

    if toggled.success.unwrap_or(true) {
        let enabled = toggled.enabled.unwrap_or(!ctx.snapshot.camera_correction_enabled);
        reaction.snapshot.camera_correction_enabled = enabled;
        reaction.notify(Notice::info(if enabled {
            "Camera correction enabled"
        } else {
            "Camera correction disabled"
        }));
    } else {
        reaction.notify(Notice::error("Failed to toggle camera correction"));
    }
    Ok(reaction)
}

fn handle_camera_info(ctx: &RouteContext<'_>, envelope: &Envelope) -> Result<Reaction, CodecError> {
    let info: CameraInfo = envelope.payload_as()?;
    let mut reaction = Reaction::unchanged(ctx);
    apply_board(&mut reaction.snapshot, info.board_width, info.board_height, info.square_size);
    if let Some(size) = frame_size(info.current_width, info.current_height) {
        reaction.snapshot.resolution = Some(size);
    }
    Ok(reaction)
}

fn handle_frame_info(ctx: &RouteContext<'_>, envelope: &Envelope) -> Result<Reaction, CodecError> {
    let resolution: Resolution = envelope.payload_as()?;
    let mut reaction = Reaction::unchanged(ctx);
    if let Some(size) = frame_size(resolution.width, resolution.height) {
        reaction.snapshot.resolution = Some(size);
    }
    Ok(reaction)
}

fn handle_resolution_changed(ctx: &RouteContext<'_>, envelope: &Envelope) -> Result<Reaction, CodecError> {
    let resolution: Resolution = envelope.payload_as()?;
    let mut reaction = Reaction::unchanged(ctx);
    reaction.resolve(CommandKind::SetResolution);
    if let Some(size) = frame_size(resolution.width, resolution.height) {
        reaction.snapshot.resolution = Some(size);
        reaction.notify(Notice::success(format!("Resolution set to {}x{}", size.width, size.height)));
    }
    Ok(reaction)
}

fn apply_board(snapshot: &mut SessionSnapshot, width: Option<u32>, height: Option<u32>, square_size: Option<f64>) {
    if let Some(width) = width.filter(|w| *w > 0) {
        snapshot.board.width = Some(width);
    }
    if let Some(height) = height.filter(|h| *h > 0) {
        snapshot.board.height = Some(height);
    }
    if let Some(square_size) = square_size.filter(|s| *s > 0.0) {
        snapshot.board.square_size = Some(square_size);
    }
}

fn frame_size(width: Option<u32>, height: Option<u32>) -> Option<FrameSize> {
    match (width, height) {
        (Some(width), Some(height)) if width > 0 && height > 0 => Some(FrameSize { width, height }),
        _ => None,
    }
}

fn solve_summary(reprojection: Option<f64>) -> String {
    match reprojection {
        Some(error) => format!(
            "Camera calibration complete, reprojection error {error:.3} px ({})",
            CalibrationQuality::from_reprojection_error(error).label()
        ),
        None => "Camera calibration complete".to_owned(),
    }
}
