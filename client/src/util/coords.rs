//! Click-to-image coordinate scaling.
//!
//! The video element is usually drawn at a different size than the frame the
//! device decoded. Point correspondences must be sent in natural image pixels,
//! so clicks are scaled from displayed size to natural size before use.

#[cfg(test)]
#[path = "coords_test.rs"]
mod coords_test;

use crate::state::calibration::ImagePoint;

/// Width/height pair in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Extent {
    pub width: f64,
    pub height: f64,
}

impl Extent {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Scale a click (relative to the displayed element's top-left corner) into
/// natural image coordinates.
///
/// A zero natural size means the frame has not loaded yet; the display size is
/// used instead, which leaves the click unscaled. A zero display size also
/// leaves the click unscaled.
pub fn scale_click_to_image(click: ImagePoint, display: Extent, natural: Extent) -> ImagePoint {
    let natural_width = if natural.width > 0.0 { natural.width } else { display.width };
    let natural_height = if natural.height > 0.0 { natural.height } else { display.height };
    let scale_x = if display.width > 0.0 { natural_width / display.width } else { 1.0 };
    let scale_y = if display.height > 0.0 { natural_height / display.height } else { 1.0 };
    ImagePoint { x: click.x * scale_x, y: click.y * scale_y }
}
