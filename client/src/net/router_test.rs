use super::*;

fn context<'a>(snapshot: &'a SessionSnapshot, awaiting: &'a BTreeSet<CommandKind>) -> RouteContext<'a> {
    RouteContext { snapshot, pending_point: None, awaiting, capture_active: false }
}

fn echo_handler(ctx: &RouteContext<'_>, _envelope: &Envelope) -> Result<Reaction, CodecError> {
    let mut reaction = Reaction::unchanged(ctx);
    reaction.last_operation("echo");
    Ok(reaction)
}

// =============================================================
// classification
// =============================================================

#[test]
fn binary_units_pass_through_as_frames() {
    let snapshot = SessionSnapshot::default();
    let awaiting = BTreeSet::new();
    let routed = Router::new().route(&context(&snapshot, &awaiting), Inbound::Frame(vec![0xFF, 0xD8, 0xFF]));
    assert!(matches!(routed, Routed::Frame(bytes) if bytes == vec![0xFF, 0xD8, 0xFF]));
}

#[test]
fn unknown_type_is_dropped_without_change() {
    let snapshot = SessionSnapshot::default();
    let awaiting = BTreeSet::new();
    let routed = Router::new().route_text(&context(&snapshot, &awaiting), r#"{"type":"firmware_banner","v":2}"#);
    assert!(matches!(routed, Routed::Unknown(kind) if kind == "firmware_banner"));
}

#[test]
fn malformed_json_is_reported_not_fatal() {
    let snapshot = SessionSnapshot::default();
    let awaiting = BTreeSet::new();
    let routed = Router::new().route_text(&context(&snapshot, &awaiting), "{not json");
    assert!(matches!(routed, Routed::Malformed(CodecError::Json(_))));
}

#[test]
fn missing_type_is_malformed() {
    let snapshot = SessionSnapshot::default();
    let awaiting = BTreeSet::new();
    let routed = Router::new().route_text(&context(&snapshot, &awaiting), r#"{"calibrated":true}"#);
    assert!(matches!(routed, Routed::Malformed(CodecError::MissingType)));
}

#[test]
fn wrongly_shaped_payload_is_malformed() {
    let snapshot = SessionSnapshot::default();
    let awaiting = BTreeSet::new();
    let routed = Router::new().route_text(
        &context(&snapshot, &awaiting),
        r#"{"type":"camera_calibration_status","calibration_mode":"yes"}"#,
    );
    assert!(matches!(routed, Routed::Malformed(CodecError::Payload { .. })));
}

// =============================================================
// registration
// =============================================================

#[test]
fn default_router_covers_every_event_area() {
    let router = Router::new();
    for kind in [
        "camera_calibration_status",
        "auto_capture_status",
        "calibration_point_added",
        "homography_loaded",
        "marker_coordinates_set",
        "error",
        "error_notification",
    ] {
        assert!(router.handles(kind), "{kind} not registered");
    }
    assert!(!router.handles("unknown"));
}

#[test]
fn kinds_are_sorted() {
    let kinds = Router::new().kinds();
    let mut sorted = kinds.clone();
    sorted.sort_unstable();
    assert_eq!(kinds, sorted);
}

#[test]
fn register_replaces_existing_handler() {
    let mut router = Router::empty();
    assert!(router.register("ping", echo_handler).is_none());
    assert!(router.register("ping", echo_handler).is_some());

    let snapshot = SessionSnapshot::default();
    let awaiting = BTreeSet::new();
    let Routed::Handled(reaction) = router.route_text(&context(&snapshot, &awaiting), r#"{"type":"ping"}"#) else {
        panic!("ping should be handled");
    };
    assert_eq!(reaction.effects, vec![SideEffect::LastOperation("echo".to_owned())]);
}

// =============================================================
// helpers
// =============================================================

#[test]
fn absent_success_counts_as_success_without_error() {
    assert!(succeeded(None, None));
    assert!(!succeeded(None, Some("boom")));
    assert!(!succeeded(Some(false), None));
}

#[test]
fn failure_text_falls_back_on_blank_error() {
    assert_eq!(failure_text(Some("  "), "fallback"), "fallback");
    assert_eq!(failure_text(Some("disk full"), "fallback"), "disk full");
}
