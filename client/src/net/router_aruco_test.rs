use super::*;
use crate::net::router::{Routed, SideEffect};
use crate::state::snapshot::SessionSnapshot;
use std::collections::BTreeSet;

fn route(snapshot: &SessionSnapshot, json: &str) -> Reaction {
    let awaiting = BTreeSet::new();
    let ctx = RouteContext { snapshot, pending_point: None, awaiting: &awaiting, capture_active: false };
    match Router::new().route_text(&ctx, json) {
        Routed::Handled(reaction) => reaction,
        other => panic!("expected handled reaction, got {other:?}"),
    }
}

#[test]
fn mode_status_accepts_either_flag_spelling() {
    let enabled = route(&SessionSnapshot::default(), r#"{"type":"aruco_mode_status","enabled":true}"#);
    let legacy = route(&SessionSnapshot::default(), r#"{"type":"aruco_mode_status","aruco_mode":true}"#);
    assert!(enabled.snapshot.aruco_mode);
    assert!(legacy.snapshot.aruco_mode);
    assert!(enabled.effects.contains(&SideEffect::Resolve(CommandKind::ToggleMarkerMode)));
}

#[test]
fn mode_status_without_flag_does_not_resolve_toggle() {
    let reaction = route(&SessionSnapshot::default(), r#"{"type":"aruco_mode_status","detected_markers":3}"#);
    assert_eq!(reaction.snapshot.detected_markers, 3);
    assert!(reaction.effects.is_empty());
}

#[test]
fn detection_update_is_silent() {
    let reaction = route(
        &SessionSnapshot::default(),
        r#"{"type":"aruco_detection_update","detected_markers":4,"matrix_status":"stable","homography_loaded":true}"#,
    );
    assert_eq!(reaction.snapshot.detected_markers, 4);
    assert_eq!(reaction.snapshot.matrix_status.as_deref(), Some("stable"));
    assert!(reaction.snapshot.homography_loaded);
    assert!(reaction.effects.is_empty());
}

#[test]
fn marker_set_last_write_wins() {
    let first = route(
        &SessionSnapshot::default(),
        r#"{"type":"marker_coordinates_set","success":true,"marker_id":7,"x":1.0,"y":2.0}"#,
    );
    let second = route(
        &first.snapshot,
        r#"{"type":"marker_coordinates_set","success":true,"marker_id":7,"x":3.0,"y":4.0}"#,
    );
    assert_eq!(second.snapshot.markers.len(), 1);
    assert_eq!(second.snapshot.markers.get(&7), Some(&GroundPoint { x: 3.0, y: 4.0 }));
    assert!(second.effects.contains(&SideEffect::Resolve(CommandKind::SetMarker)));
}

#[test]
fn failed_marker_set_leaves_table_alone() {
    let reaction = route(
        &SessionSnapshot::default(),
        r#"{"type":"marker_coordinates_set","success":false,"marker_id":7,"x":1.0,"y":2.0,"error":"invalid id"}"#,
    );
    assert!(reaction.snapshot.markers.is_empty());
    assert!(reaction.effects.contains(&SideEffect::Notify(Notice::error("invalid id"))));
}

#[test]
fn saved_and_loaded_resolve_their_commands() {
    let saved = route(&SessionSnapshot::default(), r#"{"type":"marker_coordinates_saved","success":true}"#);
    let loaded = route(&SessionSnapshot::default(), r#"{"type":"marker_coordinates_loaded","success":false}"#);
    assert!(saved.effects.contains(&SideEffect::Resolve(CommandKind::SaveMarkers)));
    assert!(loaded.effects.contains(&SideEffect::Resolve(CommandKind::LoadMarkers)));
    assert!(loaded.effects.contains(&SideEffect::Notify(Notice::error("Failed to load marker coordinates"))));
}
