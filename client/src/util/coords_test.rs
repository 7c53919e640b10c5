use super::*;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn click_scales_from_display_to_natural_size() {
    let scaled = scale_click_to_image(
        ImagePoint { x: 320.0, y: 180.0 },
        Extent::new(640.0, 360.0),
        Extent::new(1920.0, 1080.0),
    );
    assert!(approx(scaled.x, 960.0));
    assert!(approx(scaled.y, 540.0));
}

#[test]
fn unloaded_frame_falls_back_to_display_size() {
    let scaled = scale_click_to_image(ImagePoint { x: 12.5, y: 40.0 }, Extent::new(640.0, 480.0), Extent::default());
    assert!(approx(scaled.x, 12.5));
    assert!(approx(scaled.y, 40.0));
}

#[test]
fn zero_display_size_leaves_click_unscaled() {
    let scaled = scale_click_to_image(ImagePoint { x: 5.0, y: 6.0 }, Extent::default(), Extent::new(1280.0, 720.0));
    assert!(approx(scaled.x, 5.0));
    assert!(approx(scaled.y, 6.0));
}

#[test]
fn axes_scale_independently() {
    let scaled = scale_click_to_image(ImagePoint { x: 100.0, y: 100.0 }, Extent::new(200.0, 400.0), Extent::new(400.0, 400.0));
    assert!(approx(scaled.x, 200.0));
    assert!(approx(scaled.y, 100.0));
}
