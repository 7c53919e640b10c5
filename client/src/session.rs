//! Session coordinator: the five components behind one event-driven facade.
//!
//! SYSTEM CONTEXT
//! ==============
//! Drivers (the browser page, the native console) own the socket and the
//! clock. They feed transport events and operator actions into `Session`
//! with the current time in milliseconds, call `advance` when the next timer
//! deadline passes, and drain the resulting `Effect`s.
//!
//! DESIGN
//! ======
//! Writers are fixed: router reactions replace `SessionSnapshot`, the capture
//! scheduler owns the countdown, and operator actions touch only the
//! affordance layer and the gate. Every delay is a purpose-keyed timer in one
//! `TimerArena`, so superseding an operation cancels its timer instead of
//! leaving a stale callback behind.
//!
//! ERROR HANDLING
//! ==============
//! Operator actions return `ActionError` for local rejections and also push a
//! warning notice. Transport loss leaves pending commands in place; they are
//! released by their own timeouts.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use messages::{ArucoDetectionParams, BoardSize, Command};

use crate::config::SessionConfig;
use crate::net::connection::{ConnectionError, ConnectionManager, ConnectionState};
use crate::net::gate::{CommandGate, CommandKind, GateError};
use crate::net::router::{Reaction, RouteContext, Routed, Router, SideEffect};
use crate::state::calibration::{CalibrationPoint, GroundPoint, HomographyExport, ImagePoint};
use crate::state::capture::{CaptureReadout, CaptureScheduler, TickOutcome, parse_capture_inputs};
use crate::state::snapshot::SessionSnapshot;
use crate::state::ui::{ControlStates, Notice, UiAffordances, derive_controls};
use crate::util::coords::{Extent, scale_click_to_image};
use crate::util::timers::{TimerArena, TimerHandle, TimerPurpose};

/// Output for the driver.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Open a new transport; report the outcome with `on_open` or `on_close`.
    Connect { attempt: u64 },
    Send(Command),
    /// Next video frame for the display pipeline.
    DisplayFrame(Vec<u8>),
    Notify(Notice),
}

/// Why an operator action was not sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("{0} busy, ignored")]
    Busy(CommandKind),
    #[error("not connected ({0})")]
    NotConnected(ConnectionState),
    #[error("homography needs at least 4 calibration points, have {have}")]
    TooFewPoints { have: usize },
    #[error("coordinate calibration mode is not active")]
    CoordinateModeInactive,
    #[error("auto capture is already running")]
    CaptureActive,
    #[error("marker window minimum {min} must be below maximum {max}")]
    InvalidMarkerWindow { min: u32, max: u32 },
}

impl From<ConnectionError> for ActionError {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::NotOpen(state) => Self::NotConnected(state),
        }
    }
}

impl From<GateError> for ActionError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Busy(kind) => Self::Busy(kind),
            GateError::Send(err) => err.into(),
        }
    }
}

/// Restores a kind-specific affordance when a command times out.
pub type Recovery = Box<dyn FnOnce(&mut UiAffordances)>;

fn no_recovery() -> Recovery {
    Box::new(|_| {})
}

pub struct Session {
    config: SessionConfig,
    timers: TimerArena,
    connection: ConnectionManager,
    router: Router,
    gate: CommandGate<Recovery>,
    capture: CaptureScheduler,
    snapshot: SessionSnapshot,
    ui: UiAffordances,
    effects: Vec<Effect>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            connection: ConnectionManager::new(config.reconnect_delay_ms, config.resync_follow_up_ms),
            ui: UiAffordances::new(config.notice_capacity),
            config,
            timers: TimerArena::new(),
            router: Router::new(),
            gate: CommandGate::new(),
            capture: CaptureScheduler::new(),
            snapshot: SessionSnapshot::default(),
            effects: Vec::new(),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Begin the first connect attempt and start frame-rate sampling.
    pub fn start(&mut self, now: u64) {
        self.timers
            .schedule_repeating(TimerPurpose::FpsSample, now, self.config.fps_sample_ms);
        self.connect();
    }

    /// The transport opened: request authoritative state now; the follow-up
    /// request is armed by the connection manager.
    pub fn on_open(&mut self, now: u64) {
        self.connection.on_open(now, &mut self.timers);
        self.resync();
    }

    /// The transport closed or failed to open.
    pub fn on_close(&mut self, now: u64) {
        if self.connection.on_close(now, &mut self.timers) {
            self.notify(Notice::warning("Connection lost, reconnecting"));
        }
    }

    pub fn on_text(&mut self, now: u64, text: &str) {
        let routed = {
            let ctx = RouteContext {
                snapshot: &self.snapshot,
                pending_point: self.ui.pending_point.as_ref(),
                awaiting: &self.ui.busy,
                capture_active: self.capture.is_active(),
            };
            self.router.route_text(&ctx, text)
        };
        match routed {
            Routed::Handled(reaction) => self.apply(now, reaction),
            // Text units never classify as frames; unknown and malformed ones are logged by the router.
            Routed::Frame(_) | Routed::Unknown(_) | Routed::Malformed(_) => {}
        }
    }

    pub fn on_binary(&mut self, _now: u64, bytes: Vec<u8>) {
        self.ui.frames.record_frame();
        self.effects.push(Effect::DisplayFrame(bytes));
    }

    /// Fire every timer due at `now`, in deadline order.
    pub fn advance(&mut self, now: u64) {
        loop {
            let due = self.timers.due(now);
            if due.is_empty() {
                break;
            }
            for handle in due {
                self.fire(now, handle);
            }
        }
    }

    pub fn drain_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    /// When the driver should next call `advance`.
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    /// Operator exit: stop reconnecting and drop the countdown.
    pub fn shutdown(&mut self) {
        self.connection.shutdown(&mut self.timers);
        self.capture.stop(&mut self.timers);
        self.ui.capture = None;
        self.timers.cancel(TimerPurpose::FpsSample);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn snapshot(&self) -> &SessionSnapshot {
        &self.snapshot
    }

    pub fn ui(&self) -> &UiAffordances {
        &self.ui
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn connect_attempts(&self) -> u64 {
        self.connection.attempt()
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_active()
    }

    pub fn capture_readout(&self) -> Option<CaptureReadout> {
        self.ui.capture
    }

    pub fn controls(&self) -> ControlStates {
        derive_controls(&self.snapshot, &self.ui, self.connection.is_live(), self.capture.is_active())
    }

    /// The current homography as a downloadable document, if one exists.
    pub fn export_homography(&self, timestamp: &str) -> Option<HomographyExport> {
        self.snapshot
            .homography
            .map(|matrix| HomographyExport::new(matrix, timestamp))
    }

    // =========================================================================
    // Session actions (ungated)
    // =========================================================================

    /// Ask the device for its authoritative state.
    ///
    /// # Errors
    ///
    /// [`ActionError::NotConnected`] when the transport is not open.
    pub fn request_status(&mut self) -> Result<(), ActionError> {
        self.send(Command::GetCalibrationStatus)
    }

    /// # Errors
    ///
    /// [`ActionError::NotConnected`] when the transport is not open.
    pub fn set_streaming(&mut self, on: bool) -> Result<(), ActionError> {
        self.send(if on { Command::StartStream } else { Command::StopStream })
    }

    /// # Errors
    ///
    /// [`ActionError::NotConnected`] when the transport is not open.
    pub fn set_board_size(&mut self, board: BoardSize) -> Result<(), ActionError> {
        self.send(Command::SetBoardSize(board))
    }

    /// # Errors
    ///
    /// [`ActionError::NotConnected`] when the transport is not open.
    pub fn cleanup_images(&mut self, cleanup_type: &str) -> Result<(), ActionError> {
        self.send(Command::CleanupCalibrationImages { cleanup_type: cleanup_type.to_owned() })
    }

    /// # Errors
    ///
    /// [`ActionError::InvalidMarkerWindow`] unless the window minimum is below
    /// the maximum; [`ActionError::NotConnected`] when the transport is not open.
    pub fn set_aruco_params(&mut self, params: ArucoDetectionParams) -> Result<(), ActionError> {
        let (min, max) = (params.adaptive_thresh_win_size_min, params.adaptive_thresh_win_size_max);
        if min >= max {
            return self.reject(ActionError::InvalidMarkerWindow { min, max });
        }
        self.send(Command::SetArucoDetectionParameters(params))
    }

    // =========================================================================
    // Camera intrinsics
    // =========================================================================

    /// # Errors
    ///
    /// [`ActionError::Busy`] or [`ActionError::NotConnected`].
    pub fn set_resolution(&mut self, now: u64, width: u32, height: u32) -> Result<(), ActionError> {
        self.issue(now, CommandKind::SetResolution, Command::SetResolution { width, height }, no_recovery())
    }

    /// # Errors
    ///
    /// [`ActionError::Busy`] or [`ActionError::NotConnected`].
    pub fn toggle_camera_mode(&mut self, now: u64) -> Result<(), ActionError> {
        self.issue(now, CommandKind::ToggleCameraMode, Command::ToggleCameraCalibrationMode, no_recovery())
    }

    /// # Errors
    ///
    /// [`ActionError::Busy`] or [`ActionError::NotConnected`].
    pub fn add_calibration_image(&mut self, now: u64) -> Result<(), ActionError> {
        self.issue(now, CommandKind::AddCalibrationImage, Command::AddCalibrationImage, no_recovery())
    }

    /// # Errors
    ///
    /// [`ActionError::Busy`] or [`ActionError::NotConnected`].
    pub fn perform_calibration(&mut self, now: u64) -> Result<(), ActionError> {
        self.issue(now, CommandKind::PerformCalibration, Command::PerformCameraCalibration, no_recovery())
    }

    /// # Errors
    ///
    /// [`ActionError::Busy`] or [`ActionError::NotConnected`].
    pub fn save_calibration(&mut self, now: u64) -> Result<(), ActionError> {
        self.issue(now, CommandKind::SaveCalibration, Command::SaveCameraCalibration, no_recovery())
    }

    /// # Errors
    ///
    /// [`ActionError::Busy`] or [`ActionError::NotConnected`].
    pub fn load_calibration(&mut self, now: u64) -> Result<(), ActionError> {
        self.issue(now, CommandKind::LoadCalibration, Command::LoadCameraCalibration, no_recovery())
    }

    /// Ask for the opposite of the mirrored correction flag.
    ///
    /// # Errors
    ///
    /// [`ActionError::Busy`] or [`ActionError::NotConnected`].
    pub fn toggle_correction(&mut self, now: u64) -> Result<(), ActionError> {
        self.set_correction(now, !self.snapshot.camera_correction_enabled)
    }

    /// # Errors
    ///
    /// [`ActionError::Busy`] or [`ActionError::NotConnected`].
    pub fn set_correction(&mut self, now: u64, enabled: bool) -> Result<(), ActionError> {
        self.issue(now, CommandKind::ToggleCorrection, Command::ToggleCameraCorrection { enabled }, no_recovery())
    }

    // =========================================================================
    // Auto capture
    // =========================================================================

    /// Send the start command and arm the countdown without waiting for the
    /// device. Absent or invalid inputs fall back to the configured defaults.
    ///
    /// # Errors
    ///
    /// [`ActionError::CaptureActive`] while a countdown runs;
    /// [`ActionError::NotConnected`] when the transport is not open.
    pub fn start_capture(&mut self, now: u64, duration: Option<&str>, interval: Option<&str>) -> Result<(), ActionError> {
        if self.capture.is_active() {
            return self.reject(ActionError::CaptureActive);
        }
        let (duration_s, interval_ms) = parse_capture_inputs(
            duration,
            interval,
            self.config.default_capture_duration_s,
            self.config.default_capture_interval_ms,
        );
        self.send(Command::StartAutoCalibrationCapture { duration: duration_s, interval: interval_ms })?;
        self.arm_capture(now, duration_s, interval_ms);
        Ok(())
    }

    /// Send the stop command and tear the countdown down whether or not the
    /// send went out.
    ///
    /// # Errors
    ///
    /// [`ActionError::NotConnected`] when the stop command could not be sent.
    pub fn stop_capture(&mut self) -> Result<(), ActionError> {
        let sent = self.send(Command::StopAutoCalibrationCapture);
        self.teardown_capture();
        sent
    }

    // =========================================================================
    // Coordinate calibration
    // =========================================================================

    /// # Errors
    ///
    /// [`ActionError::Busy`] or [`ActionError::NotConnected`].
    pub fn toggle_coordinate_mode(&mut self, now: u64) -> Result<(), ActionError> {
        self.issue(now, CommandKind::ToggleCoordinateMode, Command::ToggleCalibrationMode, no_recovery())
    }

    /// Send one correspondence. It joins the point list only when the device
    /// confirms it.
    ///
    /// # Errors
    ///
    /// [`ActionError::CoordinateModeInactive`] outside coordinate mode;
    /// otherwise [`ActionError::Busy`] or [`ActionError::NotConnected`].
    pub fn add_point(&mut self, now: u64, image: ImagePoint, ground: GroundPoint) -> Result<(), ActionError> {
        if !self.snapshot.coordinate_calibration_mode {
            return self.reject(ActionError::CoordinateModeInactive);
        }
        let command = Command::AddCalibrationPoint {
            image_x: image.x,
            image_y: image.y,
            ground_x: ground.x,
            ground_y: ground.y,
        };
        let recovery: Recovery = Box::new(|ui| ui.pending_point = None);
        self.issue(now, CommandKind::AddPoint, command, recovery)?;
        self.ui.pending_point = Some(CalibrationPoint { image, ground });
        Ok(())
    }

    /// Add a point from a click on the displayed video, scaling the click to
    /// natural image pixels first.
    ///
    /// # Errors
    ///
    /// As [`Session::add_point`].
    pub fn add_point_from_click(
        &mut self,
        now: u64,
        click: ImagePoint,
        display: Extent,
        natural: Extent,
        ground: GroundPoint,
    ) -> Result<(), ActionError> {
        self.add_point(now, scale_click_to_image(click, display, natural), ground)
    }

    /// # Errors
    ///
    /// [`ActionError::Busy`] or [`ActionError::NotConnected`].
    pub fn remove_last_point(&mut self, now: u64) -> Result<(), ActionError> {
        self.issue(now, CommandKind::RemovePoint, Command::RemoveLastCalibrationPoint, no_recovery())
    }

    /// # Errors
    ///
    /// [`ActionError::Busy`] or [`ActionError::NotConnected`].
    pub fn clear_points(&mut self, now: u64) -> Result<(), ActionError> {
        self.issue(now, CommandKind::ClearPoints, Command::ClearCalibrationPoints, no_recovery())
    }

    /// # Errors
    ///
    /// [`ActionError::TooFewPoints`] below four confirmed points, checked
    /// before anything is sent; otherwise [`ActionError::Busy`] or
    /// [`ActionError::NotConnected`].
    pub fn compute_homography(&mut self, now: u64) -> Result<(), ActionError> {
        if !self.snapshot.can_compute_homography() {
            let have = self.snapshot.calibration_points.len();
            return self.reject(ActionError::TooFewPoints { have });
        }
        self.issue(now, CommandKind::ComputeHomography, Command::ComputeHomography, no_recovery())
    }

    /// # Errors
    ///
    /// [`ActionError::Busy`] or [`ActionError::NotConnected`].
    pub fn save_homography(&mut self, now: u64, filename: Option<String>) -> Result<(), ActionError> {
        self.issue(now, CommandKind::SaveHomography, Command::SaveHomography { filename }, no_recovery())
    }

    /// # Errors
    ///
    /// [`ActionError::Busy`] or [`ActionError::NotConnected`].
    pub fn load_homography(&mut self, now: u64, filename: Option<String>) -> Result<(), ActionError> {
        self.issue(now, CommandKind::LoadHomography, Command::LoadHomography { filename }, no_recovery())
    }

    /// Ask the device to project an image point onto the ground plane.
    ///
    /// # Errors
    ///
    /// [`ActionError::Busy`] or [`ActionError::NotConnected`].
    pub fn image_to_ground(&mut self, now: u64, point: ImagePoint) -> Result<(), ActionError> {
        self.issue(now, CommandKind::ImageToGround, Command::ImageToGround { x: point.x, y: point.y }, no_recovery())
    }

    // =========================================================================
    // Marker mode
    // =========================================================================

    /// # Errors
    ///
    /// [`ActionError::Busy`] or [`ActionError::NotConnected`].
    pub fn toggle_marker_mode(&mut self, now: u64) -> Result<(), ActionError> {
        self.issue(now, CommandKind::ToggleMarkerMode, Command::ToggleArucoMode, no_recovery())
    }

    /// # Errors
    ///
    /// [`ActionError::Busy`] or [`ActionError::NotConnected`].
    pub fn calibrate_from_markers(&mut self, now: u64) -> Result<(), ActionError> {
        self.issue(now, CommandKind::CalibrateFromMarkers, Command::CalibrateFromArucoMarkers, no_recovery())
    }

    /// # Errors
    ///
    /// [`ActionError::Busy`] or [`ActionError::NotConnected`].
    pub fn set_marker(&mut self, now: u64, marker_id: i32, ground: GroundPoint) -> Result<(), ActionError> {
        let command = Command::SetMarkerCoordinates { marker_id, x: ground.x, y: ground.y };
        self.issue(now, CommandKind::SetMarker, command, no_recovery())
    }

    /// # Errors
    ///
    /// [`ActionError::Busy`] or [`ActionError::NotConnected`].
    pub fn save_markers(&mut self, now: u64) -> Result<(), ActionError> {
        self.issue(now, CommandKind::SaveMarkers, Command::SaveMarkerCoordinates, no_recovery())
    }

    /// # Errors
    ///
    /// [`ActionError::Busy`] or [`ActionError::NotConnected`].
    pub fn load_markers(&mut self, now: u64) -> Result<(), ActionError> {
        self.issue(now, CommandKind::LoadMarkers, Command::LoadMarkerCoordinates, no_recovery())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn connect(&mut self) {
        if let Some(attempt) = self.connection.open(&mut self.timers) {
            self.effects.push(Effect::Connect { attempt });
        }
    }

    fn resync(&mut self) {
        if let Err(err) = self.send(Command::GetCalibrationStatus) {
            log::warn!("status resync skipped: {err}");
        }
    }

    fn fire(&mut self, now: u64, handle: TimerHandle) {
        match handle.purpose {
            TimerPurpose::Reconnect => self.connect(),
            TimerPurpose::StatusResync => self.resync(),
            TimerPurpose::CaptureTick => self.capture_tick(now),
            TimerPurpose::CommandTimeout(kind) => self.command_timed_out(kind, handle),
            TimerPurpose::FpsSample => {
                self.ui.frames.sample();
            }
        }
    }

    fn command_timed_out(&mut self, kind: CommandKind, handle: TimerHandle) {
        let Some(recovery) = self.gate.expire(handle) else {
            return;
        };
        self.ui.busy.remove(&kind);
        recovery(&mut self.ui);
        log::warn!("{kind} timed out");
        self.notify(Notice::warning(format!("{kind} timed out, please retry")));
    }

    fn capture_tick(&mut self, now: u64) {
        match self.capture.tick(now, &mut self.timers) {
            Some(TickOutcome::Running(readout)) => self.ui.capture = Some(readout),
            Some(TickOutcome::Completed(_)) => {
                self.ui.capture = None;
                self.notify(Notice::info("Auto capture countdown finished"));
            }
            None => {}
        }
    }

    fn arm_capture(&mut self, now: u64, duration_s: u32, interval_ms: u32) {
        match self
            .capture
            .start(now, duration_s, interval_ms, self.config.capture_tick_ms, &mut self.timers)
        {
            Ok(readout) => {
                self.ui.capture = Some(readout);
                self.ui.last_operation = Some(format!("Auto capture: {duration_s} s every {interval_ms} ms"));
            }
            Err(err) => log::warn!("capture countdown not armed: {err}"),
        }
    }

    fn teardown_capture(&mut self) {
        self.capture.stop(&mut self.timers);
        self.ui.capture = None;
    }

    /// Replace the snapshot and apply the reaction's side effects in order.
    fn apply(&mut self, now: u64, reaction: Reaction) {
        self.snapshot = reaction.snapshot;
        for effect in reaction.effects {
            match effect {
                SideEffect::Resolve(kind) => {
                    self.gate.resolve(kind, &mut self.timers);
                    self.ui.busy.remove(&kind);
                }
                SideEffect::Notify(notice) => self.notify(notice),
                SideEffect::LastOperation(text) => self.ui.last_operation = Some(text),
                SideEffect::CaptureStarted { duration_s, interval_ms } => {
                    if !self.capture.is_active() {
                        self.arm_capture(now, duration_s, interval_ms);
                    }
                }
                SideEffect::CaptureStopped => self.teardown_capture(),
                SideEffect::CaptureResync => {
                    if self.capture.resync(now) {
                        self.ui.capture = self.capture.readout(now);
                    }
                }
                SideEffect::ClearPendingPoint => self.ui.pending_point = None,
            }
        }
    }

    /// Gate, time-box and send one confirmed command.
    fn issue(&mut self, now: u64, kind: CommandKind, command: Command, recovery: Recovery) -> Result<(), ActionError> {
        let timeout_ms = self.config.timeout_for(kind);
        let connection = &self.connection;
        let effects = &mut self.effects;
        let issued = self.gate.issue(kind, now, timeout_ms, &mut self.timers, recovery, || {
            connection.ensure_open()?;
            effects.push(Effect::Send(command));
            Ok(())
        });
        match issued {
            Ok(()) => {
                self.ui.busy.insert(kind);
                Ok(())
            }
            Err(err) => self.reject(err.into()),
        }
    }

    /// Send a command that waits for no confirmation.
    fn send(&mut self, command: Command) -> Result<(), ActionError> {
        if let Err(err) = self.connection.ensure_open() {
            return self.reject(err.into());
        }
        self.effects.push(Effect::Send(command));
        Ok(())
    }

    fn reject(&mut self, err: ActionError) -> Result<(), ActionError> {
        log::warn!("action rejected: {err}");
        self.notify(Notice::warning(err.to_string()));
        Err(err)
    }

    fn notify(&mut self, notice: Notice) {
        self.ui.push_notice(notice.clone());
        self.effects.push(Effect::Notify(notice));
    }
}
