//! Authoritative mirror of the device's session state.
//!
//! SYSTEM CONTEXT
//! ==============
//! `SessionSnapshot` is the client's best-known copy of remote truth. Only
//! message-router handlers produce new snapshots, and only in response to
//! events from the device. Operator actions never write here; they send a
//! command and mark an affordance busy (see `state::ui`).

#[cfg(test)]
#[path = "snapshot_test.rs"]
mod snapshot_test;

use std::collections::BTreeMap;

use messages::HomographyMatrix;

use crate::state::calibration::{self, CalibrationPoint, CalibrationQuality, GroundPoint};

/// Decoded frame size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

/// Chessboard geometry as last reported by the device.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoardParams {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Meters.
    pub square_size: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionSnapshot {
    // --- Camera intrinsics ---
    pub camera_calibration_mode: bool,
    /// Latches true; cleared only by an explicit calibration-cleared event.
    pub camera_calibrated: bool,
    /// Images captured in the current calibration attempt.
    pub session_image_count: u32,
    /// Images persisted on the device.
    pub saved_image_count: u32,
    /// RMS reprojection error of the last intrinsics solve.
    pub reprojection_error: Option<f64>,
    pub camera_correction_enabled: bool,
    pub board: BoardParams,
    pub resolution: Option<FrameSize>,

    // --- Coordinate / homography ---
    pub coordinate_calibration_mode: bool,
    pub coordinate_calibrated: bool,
    /// Device-confirmed correspondences, in insertion order.
    pub calibration_points: Vec<CalibrationPoint>,
    pub homography: Option<HomographyMatrix>,
    /// Result of the last image-to-ground lookup.
    pub last_ground_point: Option<GroundPoint>,

    // --- Marker mode ---
    pub aruco_mode: bool,
    /// Marker id → ground position; last write wins.
    pub markers: BTreeMap<i32, GroundPoint>,
    pub homography_loaded: bool,
    pub detected_markers: u32,
    pub matrix_status: Option<String>,
}

impl SessionSnapshot {
    pub fn quality(&self) -> Option<CalibrationQuality> {
        self.reprojection_error.map(CalibrationQuality::from_reprojection_error)
    }

    pub fn can_compute_homography(&self) -> bool {
        calibration::can_compute_homography(&self.calibration_points)
    }
}
