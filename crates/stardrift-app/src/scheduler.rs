//! Redraw-driven frame scheduler.
//!
//! Turns the platform's redraw notifications into variable-timestep ticks.
//! The first tick after [`start`](FrameScheduler::start) reports `dt = 0`;
//! later ticks report the wall-clock time since the previous tick, clamped to
//! [`MAX_FRAME_TIME`]. After [`stop`](FrameScheduler::stop) every tick is
//! ignored, so a redraw that was already queued cannot touch released state.

use std::time::Instant;
use tracing::{debug, warn};

/// Maximum frame time in seconds. Longer gaps (a hidden window, a debugger
/// pause) are clamped so the simulation does not jump.
pub const MAX_FRAME_TIME: f32 = 0.25;

/// Lifecycle of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Never started.
    Idle,
    Running,
    /// Stopped for good; pending frames are dropped.
    Stopped,
}

/// Variable-timestep scheduler for one mounted backdrop.
pub struct FrameScheduler {
    state: SchedulerState,
    previous_time: Option<Instant>,
    frame_count: u64,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self {
            state: SchedulerState::Idle,
            previous_time: None,
            frame_count: 0,
        }
    }

    /// Begin ticking. The next frame reports `dt = 0`.
    pub fn start(&mut self) {
        self.state = SchedulerState::Running;
        self.previous_time = None;
        debug!("Frame scheduler started");
    }

    /// Ignore every later tick, including a redraw that is already queued.
    pub fn stop(&mut self) {
        if self.state == SchedulerState::Running {
            debug!("Frame scheduler stopped after {} frames", self.frame_count);
        }
        self.state = SchedulerState::Stopped;
    }

    /// Whether the host should ask the platform for another redraw.
    pub fn request_frame(&self) -> bool {
        self.state == SchedulerState::Running
    }

    /// Run one tick measured against the current time.
    pub fn on_frame(&mut self, tick: impl FnOnce(f32)) -> bool {
        self.on_frame_at(Instant::now(), tick)
    }

    /// Run one tick as if it happened at `now`.
    ///
    /// Returns `false` without calling `tick` when the scheduler is not
    /// running.
    pub fn on_frame_at(&mut self, now: Instant, tick: impl FnOnce(f32)) -> bool {
        if self.state != SchedulerState::Running {
            return false;
        }

        let mut dt = match self.previous_time {
            Some(previous) => now.saturating_duration_since(previous).as_secs_f32(),
            None => 0.0,
        };
        self.previous_time = Some(now);

        if dt > MAX_FRAME_TIME {
            warn!(
                "Frame time {:.1}ms exceeds maximum, clamping to {:.1}ms",
                dt * 1000.0,
                MAX_FRAME_TIME * 1000.0
            );
            dt = MAX_FRAME_TIME;
        }

        tick(dt);
        self.frame_count += 1;
        true
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SchedulerState::Running
    }

    /// Total number of ticks run.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}
