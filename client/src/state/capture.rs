//! Auto-capture countdown.
//!
//! SYSTEM CONTEXT
//! ==============
//! The device captures calibration images on its own interval; this side
//! only runs a countdown so the operator sees remaining time, time until the
//! next capture and overall progress. The countdown is armed optimistically
//! when the start command is sent and re-synchronized whenever the device
//! reports a new image.
//!
//! DESIGN
//! ======
//! `CaptureScheduler` is the only writer of `CaptureSchedule`. Ticks come
//! from the shared timer arena at a fixed resolution; a tick that observes
//! `remaining == 0` disarms itself and clears the schedule. Natural
//! completion sends nothing: the device reports its own completion.

#[cfg(test)]
#[path = "capture_test.rs"]
mod capture_test;

use crate::util::timers::{TimerArena, TimerHandle, TimerPurpose};

/// Live countdown state. Exists only while auto-capture is active.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureSchedule {
    pub start_ms: u64,
    pub end_ms: u64,
    pub last_capture_ms: u64,
    pub interval_ms: u64,
    pub tick: TimerHandle,
}

/// What the countdown display shows at one instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptureReadout {
    pub remaining_ms: u64,
    pub until_next_capture_ms: u64,
    /// Fraction elapsed, clamped to `0.0..=1.0`.
    pub progress: f64,
}

impl CaptureSchedule {
    pub fn readout(&self, now: u64) -> CaptureReadout {
        let remaining_ms = self.end_ms.saturating_sub(now);
        let since_capture = now.saturating_sub(self.last_capture_ms);
        let until_next_capture_ms = self.interval_ms.saturating_sub(since_capture);
        let span = self.end_ms.saturating_sub(self.start_ms);
        let progress = if span == 0 {
            1.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let ratio = now.saturating_sub(self.start_ms) as f64 / span as f64;
            ratio.clamp(0.0, 1.0)
        };
        CaptureReadout { remaining_ms, until_next_capture_ms, progress }
    }
}

/// Result of one countdown tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickOutcome {
    Running(CaptureReadout),
    /// Remaining reached zero; the schedule has been torn down.
    Completed(CaptureReadout),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("auto-capture is already running")]
    AlreadyActive,
}

#[derive(Debug, Default)]
pub struct CaptureScheduler {
    schedule: Option<CaptureSchedule>,
}

impl CaptureScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.schedule.is_some()
    }

    pub fn schedule(&self) -> Option<&CaptureSchedule> {
        self.schedule.as_ref()
    }

    pub fn readout(&self, now: u64) -> Option<CaptureReadout> {
        self.schedule.as_ref().map(|schedule| schedule.readout(now))
    }

    /// Arm a countdown of `duration_s` seconds with the given capture interval.
    ///
    /// # Errors
    ///
    /// [`CaptureError::AlreadyActive`] if a countdown is already running.
    pub fn start(
        &mut self,
        now: u64,
        duration_s: u32,
        interval_ms: u32,
        tick_ms: u64,
        timers: &mut TimerArena,
    ) -> Result<CaptureReadout, CaptureError> {
        if self.schedule.is_some() {
            return Err(CaptureError::AlreadyActive);
        }
        let tick = timers.schedule_repeating(TimerPurpose::CaptureTick, now, tick_ms);
        let schedule = CaptureSchedule {
            start_ms: now,
            end_ms: now.saturating_add(u64::from(duration_s) * 1_000),
            last_capture_ms: now,
            interval_ms: u64::from(interval_ms),
            tick,
        };
        self.schedule = Some(schedule);
        Ok(schedule.readout(now))
    }

    /// Advance the countdown. Returns `None` when no schedule is active.
    pub fn tick(&mut self, now: u64, timers: &mut TimerArena) -> Option<TickOutcome> {
        let schedule = self.schedule?;
        let readout = schedule.readout(now);
        if readout.remaining_ms > 0 {
            return Some(TickOutcome::Running(readout));
        }
        timers.cancel_handle(schedule.tick);
        self.schedule = None;
        Some(TickOutcome::Completed(readout))
    }

    /// The device reported a new image: restart the "next capture" window.
    pub fn resync(&mut self, now: u64) -> bool {
        match self.schedule.as_mut() {
            Some(schedule) => {
                schedule.last_capture_ms = now.min(schedule.end_ms);
                true
            }
            None => false,
        }
    }

    /// Tear the countdown down and cancel its tick.
    pub fn stop(&mut self, timers: &mut TimerArena) -> bool {
        match self.schedule.take() {
            Some(schedule) => {
                timers.cancel_handle(schedule.tick);
                true
            }
            None => false,
        }
    }
}

/// Parse operator-entered duration (seconds) and interval (ms), falling back
/// to the defaults for absent, non-numeric or zero values.
pub fn parse_capture_inputs(
    duration: Option<&str>,
    interval: Option<&str>,
    default_duration_s: u32,
    default_interval_ms: u32,
) -> (u32, u32) {
    (parse_positive(duration, default_duration_s), parse_positive(interval, default_interval_ms))
}

fn parse_positive(raw: Option<&str>, default: u32) -> u32 {
    match raw.map(str::trim).map(str::parse::<u32>) {
        Some(Ok(value)) if value > 0 => value,
        _ => default,
    }
}
