//! Flow-direction controller.
//!
//! ```text
//!   start ──► DOWNSTREAM ── tick > settle_ticks ──► arm FlowSettle
//!                 ▲                                     │ upstream_delay
//!                 │ upstream_dwell                      ▼
//!                 └──────────── FlowDwell ◄──────── UPSTREAM
//! ```
//!
//! Only the phase label changes; the downstream generator keeps its own
//! cadence throughout.

use gpon_core::{Action, FlowPhase, LogRecord, TimerId};
use std::time::Duration;
use tracing::debug;

/// Settle/dwell timing for the breathing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowTiming {
    pub settle_ticks: u64,
    pub upstream_delay: Duration,
    pub upstream_dwell: Duration,
}

#[derive(Debug, Clone)]
pub struct FlowController {
    timing: FlowTiming,
    phase: FlowPhase,
    settle_armed: bool,
}

impl FlowController {
    pub fn new(timing: FlowTiming) -> Self {
        Self {
            timing,
            phase: FlowPhase::Uninitialized,
            settle_armed: false,
        }
    }

    pub fn phase(&self) -> FlowPhase {
        self.phase
    }

    pub fn start(&mut self) -> Vec<Action> {
        self.phase = FlowPhase::Downstream;
        self.settle_armed = false;
        debug!(phase = %self.phase, "Flow initialised");
        Vec::new()
    }

    /// Reset to uninitialised and cancel pending flips.
    pub fn stop(&mut self) -> Vec<Action> {
        self.phase = FlowPhase::Uninitialized;
        self.settle_armed = false;
        vec![
            Action::CancelTimer {
                id: TimerId::FlowSettle,
            },
            Action::CancelTimer {
                id: TimerId::FlowDwell,
            },
        ]
    }

    /// Called at the start of every tick with the tick counter.
    pub fn on_tick(&mut self, tick: u64) -> Vec<Action> {
        if self.phase != FlowPhase::Downstream || self.settle_armed || tick <= self.timing.settle_ticks {
            return Vec::new();
        }
        self.settle_armed = true;
        vec![Action::set_timer(TimerId::FlowSettle, self.timing.upstream_delay)]
    }

    pub fn on_settled(&mut self) -> Vec<Action> {
        if self.phase != FlowPhase::Downstream {
            return Vec::new();
        }
        self.phase = FlowPhase::Upstream;
        vec![
            Action::Log(LogRecord::info("Upstream phase started")),
            Action::set_timer(TimerId::FlowDwell, self.timing.upstream_dwell),
        ]
    }

    pub fn on_dwell_elapsed(&mut self) -> Vec<Action> {
        if self.phase != FlowPhase::Upstream {
            return Vec::new();
        }
        self.phase = FlowPhase::Downstream;
        self.settle_armed = false;
        vec![Action::Log(LogRecord::info(
            "Back to downstream phase for continuous flow",
        ))]
    }
}
