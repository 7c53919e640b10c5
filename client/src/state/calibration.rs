//! Calibration value types: point correspondences, marker coordinates and
//! homography presentation helpers.

#[cfg(test)]
#[path = "calibration_test.rs"]
mod calibration_test;

use messages::{HomographyMatrix, WirePoint};
use serde::{Deserialize, Serialize};

/// Fewest correspondences the device can solve a homography from.
pub const MIN_HOMOGRAPHY_POINTS: usize = 4;

/// Pixel position in the natural (decoded) frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ImagePoint {
    pub x: f64,
    pub y: f64,
}

/// Position on the ground plane, in the operator's world units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundPoint {
    pub x: f64,
    pub y: f64,
}

/// One image↔ground correspondence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub image: ImagePoint,
    pub ground: GroundPoint,
}

impl From<&WirePoint> for CalibrationPoint {
    fn from(point: &WirePoint) -> Self {
        Self {
            image: ImagePoint { x: point.image_x, y: point.image_y },
            ground: GroundPoint { x: point.ground_x, y: point.ground_y },
        }
    }
}

pub fn can_compute_homography(points: &[CalibrationPoint]) -> bool {
    points.len() >= MIN_HOMOGRAPHY_POINTS
}

/// Intrinsics quality bucket from RMS reprojection error (pixels).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalibrationQuality {
    Excellent,
    Good,
    Poor,
}

impl CalibrationQuality {
    pub fn from_reprojection_error(error: f64) -> Self {
        if error < 1.0 {
            Self::Excellent
        } else if error < 2.0 {
            Self::Good
        } else {
            Self::Poor
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Poor => "poor",
        }
    }
}

/// Render a matrix as three lines of 4-decimal entries.
pub fn format_matrix(matrix: &HomographyMatrix) -> String {
    matrix
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|value| format!("{value:.4}"))
                .collect::<Vec<_>>()
                .join("  ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Downloadable homography record.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HomographyExport {
    pub timestamp: String,
    pub description: String,
    pub homography_matrix: HomographyMatrix,
    pub formatted_matrix: String,
}

impl HomographyExport {
    /// `timestamp` is supplied by the caller (the core has no clock).
    pub fn new(matrix: HomographyMatrix, timestamp: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            description: "Image-to-ground homography matrix".to_owned(),
            homography_matrix: matrix,
            formatted_matrix: format_matrix(&matrix),
        }
    }

    /// Pretty-printed JSON for download.
    ///
    /// # Errors
    ///
    /// Propagates serializer failures.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
