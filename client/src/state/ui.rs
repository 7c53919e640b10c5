//! Optimistic UI-affordance layer (busy markers, notices, readouts).
//!
//! DESIGN
//! ======
//! Everything here may be wrong for a while and is always reconciled later:
//! a busy marker set when a command is sent, a pending point waiting for the
//! device to confirm it, a countdown that started before the device agreed.
//! Nothing in this layer ever flows back into `SessionSnapshot`.
//!
//! Control enablement is derived, not stored. `derive_controls` reads the
//! snapshot, this layer and the connection flag and says which controls an
//! operator may use right now. Coordinate mode and marker mode suppress each
//! other's controls here; the device remains the arbiter of legality.

#[cfg(test)]
#[path = "ui_test.rs"]
mod ui_test;

use std::collections::{BTreeSet, VecDeque};

use crate::net::gate::CommandKind;
use crate::state::calibration::CalibrationPoint;
use crate::state::capture::CaptureReadout;
use crate::state::snapshot::SessionSnapshot;

/// How loudly a notice should be presented.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// One operator-facing status message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub text: String,
}

impl Notice {
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self { severity, text: text.into() }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(Severity::Info, text)
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(Severity::Success, text)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(Severity::Warning, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(Severity::Error, text)
    }
}

/// Video frame counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames_total: u64,
    /// Frames in the most recent completed sampling window.
    pub fps: u32,
    window: u32,
}

impl FrameStats {
    pub fn record_frame(&mut self) {
        self.frames_total += 1;
        self.window = self.window.saturating_add(1);
    }

    /// Close the current sampling window (called once per second).
    pub fn sample(&mut self) -> u32 {
        self.fps = self.window;
        self.window = 0;
        self.fps
    }
}

#[derive(Clone, Debug)]
pub struct UiAffordances {
    /// Command kinds sent but not yet confirmed or timed out.
    pub busy: BTreeSet<CommandKind>,
    /// Point sent with `add_calibration_point`, awaiting confirmation.
    pub pending_point: Option<CalibrationPoint>,
    /// Most recent notices, oldest first.
    pub notices: VecDeque<Notice>,
    pub last_operation: Option<String>,
    /// Countdown readout while auto-capture runs.
    pub capture: Option<CaptureReadout>,
    pub frames: FrameStats,
    notice_capacity: usize,
}

impl Default for UiAffordances {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_NOTICE_CAPACITY)
    }
}

impl UiAffordances {
    pub fn new(notice_capacity: usize) -> Self {
        Self {
            busy: BTreeSet::new(),
            pending_point: None,
            notices: VecDeque::new(),
            last_operation: None,
            capture: None,
            frames: FrameStats::default(),
            notice_capacity: notice_capacity.max(1),
        }
    }

    pub fn is_busy(&self, kind: CommandKind) -> bool {
        self.busy.contains(&kind)
    }

    pub fn push_notice(&mut self, notice: Notice) {
        while self.notices.len() >= self.notice_capacity {
            self.notices.pop_front();
        }
        self.notices.push_back(notice);
    }

    pub fn latest_notice(&self) -> Option<&Notice> {
        self.notices.back()
    }
}

/// Which operator controls are usable right now.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ControlStates {
    pub toggle_camera_mode: bool,
    pub add_image: bool,
    pub perform_calibration: bool,
    pub save_calibration: bool,
    pub load_calibration: bool,
    pub toggle_correction: bool,
    pub start_capture: bool,
    pub stop_capture: bool,
    pub toggle_coordinate_mode: bool,
    pub add_point: bool,
    pub remove_point: bool,
    pub clear_points: bool,
    pub compute_homography: bool,
    pub save_homography: bool,
    pub toggle_marker_mode: bool,
    pub marker_controls: bool,
}

pub fn derive_controls(
    snapshot: &SessionSnapshot,
    ui: &UiAffordances,
    connected: bool,
    capture_active: bool,
) -> ControlStates {
    if !connected {
        return ControlStates::default();
    }
    let idle = |kind| !ui.is_busy(kind);
    let camera = snapshot.camera_calibration_mode;
    let coordinate = snapshot.coordinate_calibration_mode;
    let marker = snapshot.aruco_mode;
    let has_points = !snapshot.calibration_points.is_empty();

    ControlStates {
        toggle_camera_mode: idle(CommandKind::ToggleCameraMode),
        add_image: camera && !capture_active && idle(CommandKind::AddCalibrationImage),
        perform_calibration: camera
            && !capture_active
            && snapshot.session_image_count > 0
            && idle(CommandKind::PerformCalibration),
        save_calibration: snapshot.camera_calibrated && idle(CommandKind::SaveCalibration),
        load_calibration: idle(CommandKind::LoadCalibration),
        toggle_correction: snapshot.camera_calibrated && idle(CommandKind::ToggleCorrection),
        start_capture: camera && !capture_active,
        stop_capture: capture_active,
        toggle_coordinate_mode: !marker && idle(CommandKind::ToggleCoordinateMode),
        add_point: coordinate && !marker && ui.pending_point.is_none() && idle(CommandKind::AddPoint),
        remove_point: coordinate && has_points && idle(CommandKind::RemovePoint),
        clear_points: coordinate && has_points && idle(CommandKind::ClearPoints),
        compute_homography: coordinate && snapshot.can_compute_homography() && idle(CommandKind::ComputeHomography),
        save_homography: snapshot.coordinate_calibrated && idle(CommandKind::SaveHomography),
        toggle_marker_mode: !coordinate && idle(CommandKind::ToggleMarkerMode),
        marker_controls: marker && !coordinate,
    }
}
