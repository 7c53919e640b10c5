//! Command gate: at most one in-flight command per kind.
//!
//! SYSTEM CONTEXT
//! ==============
//! Operator actions pass through here before reaching the connection. The
//! gate refuses a second command of a kind that is still awaiting its
//! confirmation, and arms a recovery timeout so a lost reply cannot leave an
//! affordance busy forever.
//!
//! DESIGN
//! ======
//! The gate knows command kinds only as keys. It does not know which event
//! confirms which kind; router handlers call `resolve` for that. The recovery
//! value `R` is opaque and handed back exactly once from `expire` when the
//! timeout wins the race.
//!
//! ERROR HANDLING
//! ==============
//! A send failure releases the kind immediately (nothing went out, so there
//! is nothing to wait for) and cancels the timeout it had just armed.

#[cfg(test)]
#[path = "gate_test.rs"]
mod gate_test;

use std::collections::HashMap;
use std::fmt;

use crate::net::connection::ConnectionError;
use crate::util::timers::{TimerArena, TimerHandle, TimerPurpose};

/// Commands that wait for a confirming event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommandKind {
    ToggleCameraMode,
    AddCalibrationImage,
    PerformCalibration,
    SaveCalibration,
    LoadCalibration,
    ToggleCorrection,
    SetResolution,
    ToggleCoordinateMode,
    AddPoint,
    RemovePoint,
    ClearPoints,
    ComputeHomography,
    SaveHomography,
    LoadHomography,
    ImageToGround,
    ToggleMarkerMode,
    CalibrateFromMarkers,
    SetMarker,
    SaveMarkers,
    LoadMarkers,
}

/// Timeout class of a command kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandClass {
    /// Mode toggles and server-side computations.
    Heavy,
    /// Single-image capture, saves and point edits.
    Light,
    /// Loads and small settings changes.
    Load,
}

impl CommandKind {
    pub fn class(self) -> CommandClass {
        match self {
            Self::ToggleCameraMode
            | Self::PerformCalibration
            | Self::ToggleCoordinateMode
            | Self::ComputeHomography
            | Self::ToggleMarkerMode
            | Self::CalibrateFromMarkers => CommandClass::Heavy,
            Self::AddCalibrationImage
            | Self::SaveCalibration
            | Self::AddPoint
            | Self::RemovePoint
            | Self::ClearPoints
            | Self::SaveHomography
            | Self::SetMarker
            | Self::SaveMarkers => CommandClass::Light,
            Self::LoadCalibration
            | Self::ToggleCorrection
            | Self::SetResolution
            | Self::LoadHomography
            | Self::ImageToGround
            | Self::LoadMarkers => CommandClass::Load,
        }
    }

    /// Operator-facing name.
    pub fn label(self) -> &'static str {
        match self {
            Self::ToggleCameraMode => "camera calibration mode toggle",
            Self::AddCalibrationImage => "add calibration image",
            Self::PerformCalibration => "camera calibration",
            Self::SaveCalibration => "save camera calibration",
            Self::LoadCalibration => "load camera calibration",
            Self::ToggleCorrection => "camera correction toggle",
            Self::SetResolution => "resolution change",
            Self::ToggleCoordinateMode => "coordinate calibration mode toggle",
            Self::AddPoint => "add calibration point",
            Self::RemovePoint => "remove calibration point",
            Self::ClearPoints => "clear calibration points",
            Self::ComputeHomography => "homography computation",
            Self::SaveHomography => "save homography",
            Self::LoadHomography => "load homography",
            Self::ImageToGround => "image-to-ground lookup",
            Self::ToggleMarkerMode => "marker mode toggle",
            Self::CalibrateFromMarkers => "marker calibration",
            Self::SetMarker => "set marker coordinates",
            Self::SaveMarkers => "save marker coordinates",
            Self::LoadMarkers => "load marker coordinates",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// A command of this kind is still awaiting confirmation.
    #[error("{0} busy, ignored")]
    Busy(CommandKind),
    #[error(transparent)]
    Send(#[from] ConnectionError),
}

/// One outstanding command.
#[derive(Debug)]
pub struct PendingCommand<R> {
    pub kind: CommandKind,
    pub issued_at: u64,
    pub timeout: TimerHandle,
    recovery: R,
}

#[derive(Debug)]
pub struct CommandGate<R> {
    pending: HashMap<CommandKind, PendingCommand<R>>,
}

impl<R> Default for CommandGate<R> {
    fn default() -> Self {
        Self { pending: HashMap::new() }
    }
}

impl<R> CommandGate<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `kind` if nothing of that kind is outstanding, arm its timeout,
    /// then run `send`.
    ///
    /// # Errors
    ///
    /// [`GateError::Busy`] when the kind is already pending; [`GateError::Send`]
    /// when `send` fails, in which case the kind is released again.
    pub fn issue<F>(
        &mut self,
        kind: CommandKind,
        now: u64,
        timeout_ms: u64,
        timers: &mut TimerArena,
        recovery: R,
        send: F,
    ) -> Result<(), GateError>
    where
        F: FnOnce() -> Result<(), ConnectionError>,
    {
        if self.pending.contains_key(&kind) {
            return Err(GateError::Busy(kind));
        }
        let timeout = timers.schedule(TimerPurpose::CommandTimeout(kind), now, timeout_ms);
        self.pending
            .insert(kind, PendingCommand { kind, issued_at: now, timeout, recovery });

        if let Err(err) = send() {
            self.pending.remove(&kind);
            timers.cancel_handle(timeout);
            return Err(GateError::Send(err));
        }
        Ok(())
    }

    /// Confirmation arrived: cancel the timeout and release the kind.
    ///
    /// Returns `false` when nothing of that kind was pending (duplicate or
    /// late confirmation).
    pub fn resolve(&mut self, kind: CommandKind, timers: &mut TimerArena) -> bool {
        match self.pending.remove(&kind) {
            Some(pending) => {
                timers.cancel_handle(pending.timeout);
                true
            }
            None => false,
        }
    }

    /// A command timeout fired. Releases the kind and returns its recovery if
    /// `handle` is the live timeout for a pending command.
    pub fn expire(&mut self, handle: TimerHandle) -> Option<R> {
        let TimerPurpose::CommandTimeout(kind) = handle.purpose else {
            return None;
        };
        if self.pending.get(&kind).is_none_or(|pending| pending.timeout != handle) {
            return None;
        }
        self.pending.remove(&kind).map(|pending| pending.recovery)
    }

    pub fn is_pending(&self, kind: CommandKind) -> bool {
        self.pending.contains_key(&kind)
    }

    pub fn get(&self, kind: CommandKind) -> Option<&PendingCommand<R>> {
        self.pending.get(&kind)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
