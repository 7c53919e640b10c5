use super::*;

#[test]
fn default_config_matches_device_timing() {
    let config = SessionConfig::default();
    assert_eq!(config.reconnect_delay_ms, 5_000);
    assert_eq!(config.resync_follow_up_ms, 500);
    assert_eq!(config.capture_tick_ms, 100);
    assert_eq!(config.default_capture_duration_s, 10);
    assert_eq!(config.default_capture_interval_ms, 500);
}

#[test]
fn timeout_for_follows_command_class() {
    let config = SessionConfig::default();
    assert_eq!(config.timeout_for(CommandKind::ToggleCameraMode), 5_000);
    assert_eq!(config.timeout_for(CommandKind::ComputeHomography), 5_000);
    assert_eq!(config.timeout_for(CommandKind::AddCalibrationImage), 2_000);
    assert_eq!(config.timeout_for(CommandKind::SaveCalibration), 2_000);
    assert_eq!(config.timeout_for(CommandKind::LoadCalibration), 3_000);
}

// =============================================================
// env_parse
// =============================================================

#[test]
fn env_parse_missing_returns_default() {
    let val: u64 = env_parse("__CAMCAL_TEST_MISSING_KEY__", 42);
    assert_eq!(val, 42);
}

#[test]
fn env_parse_present_valid() {
    unsafe { std::env::set_var("__CAMCAL_TEST_VALID__", " 250 ") };
    let val: u64 = env_parse("__CAMCAL_TEST_VALID__", 0);
    assert_eq!(val, 250);
    unsafe { std::env::remove_var("__CAMCAL_TEST_VALID__") };
}

#[test]
fn env_parse_present_invalid_returns_default() {
    unsafe { std::env::set_var("__CAMCAL_TEST_INVALID__", "soon") };
    let val: u64 = env_parse("__CAMCAL_TEST_INVALID__", 7);
    assert_eq!(val, 7);
    unsafe { std::env::remove_var("__CAMCAL_TEST_INVALID__") };
}
