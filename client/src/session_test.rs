use super::*;
use crate::state::ui::Severity;

fn connected_session() -> Session {
    let mut session = Session::new(SessionConfig::default());
    session.start(0);
    session.on_open(0);
    session.drain_effects();
    session
}

fn sent(effects: &[Effect]) -> Vec<&Command> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Send(command) => Some(command),
            _ => None,
        })
        .collect()
}

fn timeout_notices(session: &Session) -> usize {
    session
        .ui()
        .notices
        .iter()
        .filter(|notice| notice.text.ends_with("timed out, please retry"))
        .count()
}

fn enter_coordinate_mode(session: &mut Session) {
    session.on_text(0, r#"{"type":"calibration_mode_changed","enabled":true}"#);
}

fn confirm_point(session: &mut Session, now: u64, ix: f64, iy: f64) {
    session
        .add_point(now, ImagePoint { x: ix, y: iy }, GroundPoint { x: ix / 100.0, y: iy / 100.0 })
        .expect("point sent");
    session.on_text(now, r#"{"type":"calibration_point_added"}"#);
}

// =============================================================
// connection lifecycle
// =============================================================

#[test]
fn start_requests_first_connect() {
    let mut session = Session::new(SessionConfig::default());
    session.start(0);
    assert_eq!(session.drain_effects(), vec![Effect::Connect { attempt: 1 }]);
    assert_eq!(session.connection_state(), ConnectionState::Connecting);
}

#[test]
fn open_requests_status_immediately_and_again_after_500ms() {
    let mut session = Session::new(SessionConfig::default());
    session.start(0);
    session.drain_effects();

    session.on_open(0);
    assert_eq!(sent(&session.drain_effects()), vec![&Command::GetCalibrationStatus]);

    session.advance(499);
    assert!(sent(&session.drain_effects()).is_empty());
    session.advance(500);
    assert_eq!(sent(&session.drain_effects()), vec![&Command::GetCalibrationStatus]);
}

#[test]
fn close_reconnects_every_5000ms_while_device_is_down() {
    let mut session = connected_session();
    session.on_close(0);

    let mut attempts = Vec::new();
    for now in (0..=12_000).step_by(100) {
        session.advance(now);
        for effect in session.drain_effects() {
            if let Effect::Connect { attempt } = effect {
                attempts.push((now, attempt));
                assert_eq!(session.connection_state(), ConnectionState::Connecting);
                session.on_close(now);
            }
        }
    }

    assert_eq!(attempts, vec![(5_000, 2), (10_000, 3)]);
    assert_eq!(session.connection_state(), ConnectionState::Closed);
}

#[test]
fn reconnect_success_resyncs_status() {
    let mut session = connected_session();
    session.on_close(0);
    session.advance(5_000);
    assert!(session.drain_effects().contains(&Effect::Connect { attempt: 2 }));

    session.on_open(5_050);
    assert!(sent(&session.drain_effects()).contains(&&Command::GetCalibrationStatus));
    assert_eq!(session.connection_state(), ConnectionState::Open);
}

#[test]
fn shutdown_stops_reconnecting() {
    let mut session = connected_session();
    session.shutdown();
    session.on_close(0);
    session.advance(20_000);
    assert!(!session.drain_effects().iter().any(|e| matches!(e, Effect::Connect { .. })));
}

#[test]
fn commands_are_refused_while_disconnected() {
    let mut session = Session::new(SessionConfig::default());
    session.start(0);
    session.drain_effects();

    let err = session.toggle_camera_mode(0).expect_err("not open");
    assert_eq!(err, ActionError::NotConnected(ConnectionState::Connecting));
    assert!(sent(&session.drain_effects()).is_empty());
    assert!(!session.ui().is_busy(CommandKind::ToggleCameraMode));
}

#[test]
fn handshake_failure_before_open_never_admits_commands() {
    let mut session = Session::new(SessionConfig::default());
    session.start(0);
    session.drain_effects();

    session.on_close(40);
    assert_eq!(session.connection_state(), ConnectionState::Closed);
    assert!(sent(&session.drain_effects()).is_empty());
    assert_eq!(
        session.request_status(),
        Err(ActionError::NotConnected(ConnectionState::Closed))
    );

    session.advance(5_040);
    assert!(session.drain_effects().contains(&Effect::Connect { attempt: 2 }));
}

// =============================================================
// camera mode toggle
// =============================================================

#[test]
fn toggle_confirmed_by_status_updates_snapshot_and_clears_busy() {
    let mut session = connected_session();
    session.toggle_camera_mode(0).expect("toggle sent");
    assert_eq!(sent(&session.drain_effects()), vec![&Command::ToggleCameraCalibrationMode]);
    assert!(session.ui().is_busy(CommandKind::ToggleCameraMode));

    session.on_text(
        120,
        r#"{"type":"camera_calibration_status","calibration_mode":true,"calibrated":false,"current_session_count":0,"saved_count":3}"#,
    );

    let snapshot = session.snapshot();
    assert!(snapshot.camera_calibration_mode);
    assert!(!snapshot.camera_calibrated);
    assert_eq!(snapshot.session_image_count, 0);
    assert_eq!(snapshot.saved_image_count, 3);
    assert!(!session.ui().is_busy(CommandKind::ToggleCameraMode));

    session.advance(10_000);
    assert_eq!(timeout_notices(&session), 0);
}

#[test]
fn second_toggle_while_pending_is_rejected() {
    let mut session = connected_session();
    session.toggle_camera_mode(0).expect("first toggle");
    session.drain_effects();

    let err = session.toggle_camera_mode(10).expect_err("second toggle");
    assert_eq!(err, ActionError::Busy(CommandKind::ToggleCameraMode));
    assert!(sent(&session.drain_effects()).is_empty());
    assert_eq!(session.ui().latest_notice().map(|n| n.severity), Some(Severity::Warning));
}

#[test]
fn unconfirmed_toggle_recovers_once_at_timeout() {
    let mut session = connected_session();
    session.toggle_camera_mode(0).expect("toggle sent");

    session.advance(4_999);
    assert!(session.ui().is_busy(CommandKind::ToggleCameraMode));
    assert_eq!(timeout_notices(&session), 0);

    session.advance(5_000);
    assert!(!session.ui().is_busy(CommandKind::ToggleCameraMode));
    assert_eq!(timeout_notices(&session), 1);
    assert!(!session.snapshot().camera_calibration_mode);

    session.advance(15_000);
    assert_eq!(timeout_notices(&session), 1);
    session.toggle_camera_mode(15_000).expect("retry admitted after timeout");
}

#[test]
fn late_confirmation_after_timeout_still_updates_snapshot() {
    let mut session = connected_session();
    session.toggle_camera_mode(0).expect("toggle sent");
    session.advance(5_000);
    session.on_text(6_000, r#"{"type":"camera_calibration_status","calibration_mode":true}"#);
    assert!(session.snapshot().camera_calibration_mode);
}

#[test]
fn light_commands_time_out_after_2000ms() {
    let mut session = connected_session();
    session.save_calibration(0).expect("save sent");
    session.advance(2_000);
    assert!(!session.ui().is_busy(CommandKind::SaveCalibration));
}

// =============================================================
// image counts
// =============================================================

#[test]
fn add_image_does_not_increment_counts_locally() {
    let mut session = connected_session();
    session.add_calibration_image(0).expect("add sent");
    assert_eq!(session.snapshot().session_image_count, 0);
    assert_eq!(session.snapshot().saved_image_count, 0);

    session.on_text(50, r#"{"type":"camera_calibration_status","success":true,"image_count":1}"#);
    assert_eq!(session.snapshot().session_image_count, 1);
    assert!(!session.ui().is_busy(CommandKind::AddCalibrationImage));
}

// =============================================================
// auto capture
// =============================================================

#[test]
fn capture_countdown_tears_down_at_end_without_server_events() {
    let mut session = connected_session();
    session.start_capture(0, Some("10"), Some("500")).expect("capture started");
    assert_eq!(
        sent(&session.drain_effects()),
        vec![&Command::StartAutoCalibrationCapture { duration: 10, interval: 500 }]
    );

    let mut last_remaining = u64::MAX;
    for now in (100..10_000).step_by(100) {
        session.advance(now);
        let readout = session.capture_readout().expect("countdown running");
        assert!(readout.remaining_ms <= last_remaining);
        last_remaining = readout.remaining_ms;
        session.drain_effects();
    }
    assert!(session.is_capturing());

    session.advance(10_000);
    assert!(!session.is_capturing());
    assert_eq!(session.capture_readout(), None);
    assert!(sent(&session.drain_effects()).is_empty());
}

#[test]
fn start_capture_while_running_is_rejected() {
    let mut session = connected_session();
    session.start_capture(0, None, None).expect("first start");
    session.drain_effects();
    assert_eq!(session.start_capture(100, None, None), Err(ActionError::CaptureActive));
    assert!(sent(&session.drain_effects()).is_empty());
}

#[test]
fn invalid_capture_inputs_use_defaults() {
    let mut session = connected_session();
    session.start_capture(0, Some("abc"), Some("0")).expect("start");
    assert_eq!(
        sent(&session.drain_effects()),
        vec![&Command::StartAutoCalibrationCapture { duration: 10, interval: 500 }]
    );
}

#[test]
fn stop_capture_tears_down_even_when_disconnected() {
    let mut session = connected_session();
    session.start_capture(0, None, None).expect("start");
    session.on_close(200);

    assert!(session.stop_capture().is_err());
    assert!(!session.is_capturing());
}

#[test]
fn new_image_during_capture_resets_next_capture_window() {
    let mut session = connected_session();
    session.start_capture(0, Some("10"), Some("500")).expect("start");
    session.advance(400);

    session.on_text(400, r#"{"type":"chessboard_detected","current_session_count":1}"#);
    let readout = session.capture_readout().expect("running");
    assert_eq!(readout.until_next_capture_ms, 500);
}

#[test]
fn device_started_capture_arms_local_countdown() {
    let mut session = connected_session();
    session.on_text(0, r#"{"type":"auto_capture_started","duration":5,"interval":250}"#);
    assert!(session.is_capturing());

    session.on_text(1_000, r#"{"type":"auto_capture_stopped"}"#);
    assert!(!session.is_capturing());
}

// =============================================================
// coordinate calibration
// =============================================================

#[test]
fn homography_with_too_few_points_sends_nothing() {
    let mut session = connected_session();
    enter_coordinate_mode(&mut session);
    for i in 0..3 {
        confirm_point(&mut session, 0, f64::from(i) * 10.0, 5.0);
    }
    session.drain_effects();

    assert_eq!(session.compute_homography(0), Err(ActionError::TooFewPoints { have: 3 }));
    assert!(sent(&session.drain_effects()).is_empty());

    confirm_point(&mut session, 0, 40.0, 5.0);
    session.drain_effects();
    session.compute_homography(0).expect("four points accepted");
    assert_eq!(sent(&session.drain_effects()), vec![&Command::ComputeHomography]);
}

#[test]
fn add_point_requires_coordinate_mode() {
    let mut session = connected_session();
    let result = session.add_point(0, ImagePoint { x: 1.0, y: 1.0 }, GroundPoint::default());
    assert_eq!(result, Err(ActionError::CoordinateModeInactive));
}

#[test]
fn unconfirmed_point_is_abandoned_on_timeout() {
    let mut session = connected_session();
    enter_coordinate_mode(&mut session);
    session
        .add_point(0, ImagePoint { x: 1.0, y: 2.0 }, GroundPoint { x: 0.1, y: 0.2 })
        .expect("sent");
    assert!(session.ui().pending_point.is_some());

    session.advance(2_000);
    assert!(session.ui().pending_point.is_none());
    assert!(session.snapshot().calibration_points.is_empty());
}

#[test]
fn click_is_scaled_to_natural_image_size() {
    let mut session = connected_session();
    enter_coordinate_mode(&mut session);
    session.drain_effects();

    session
        .add_point_from_click(
            0,
            ImagePoint { x: 320.0, y: 240.0 },
            Extent::new(640.0, 480.0),
            Extent::new(1280.0, 960.0),
            GroundPoint { x: 1.0, y: 2.0 },
        )
        .expect("sent");

    assert_eq!(
        sent(&session.drain_effects()),
        vec![&Command::AddCalibrationPoint { image_x: 640.0, image_y: 480.0, ground_x: 1.0, ground_y: 2.0 }]
    );
}

#[test]
fn export_requires_a_homography() {
    let mut session = connected_session();
    assert!(session.export_homography("2026-01-01T00:00:00Z").is_none());

    session.on_text(
        0,
        r#"{"type":"homography_computed","success":true,"homography_matrix":[1,0,0,0,1,0,0,0,1]}"#,
    );
    let export = session.export_homography("2026-01-01T00:00:00Z").expect("export");
    assert_eq!(export.timestamp, "2026-01-01T00:00:00Z");
}

// =============================================================
// marker mode / misc
// =============================================================

#[test]
fn aruco_params_reject_inverted_window() {
    let mut session = connected_session();
    let params = ArucoDetectionParams {
        adaptive_thresh_win_size_min: 40,
        adaptive_thresh_win_size_max: 35,
        ..ArucoDetectionParams::default()
    };
    assert_eq!(session.set_aruco_params(params), Err(ActionError::InvalidMarkerWindow { min: 40, max: 35 }));
    assert!(sent(&session.drain_effects()).is_empty());
}

#[test]
fn text_units_never_become_display_frames() {
    let mut session = connected_session();
    session.on_text(0, r#"{"type":"frame_info","fps":30}"#);
    session.on_text(0, "not json");
    session.on_text(0, r#"{"type":"no_such_event"}"#);
    assert!(!session.drain_effects().iter().any(|e| matches!(e, Effect::DisplayFrame(_))));
    assert_eq!(session.ui().frames.frames_total, 0);
}

#[test]
fn binary_units_become_display_frames() {
    let mut session = connected_session();
    session.on_binary(0, vec![1, 2, 3]);
    session.on_binary(10, vec![4]);
    assert_eq!(
        session.drain_effects(),
        vec![Effect::DisplayFrame(vec![1, 2, 3]), Effect::DisplayFrame(vec![4])]
    );
    session.advance(1_000);
    assert_eq!(session.ui().frames.fps, 2);
}

#[test]
fn controls_are_disabled_while_disconnected() {
    let session = Session::new(SessionConfig::default());
    assert_eq!(session.controls(), ControlStates::default());
}
