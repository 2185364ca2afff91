//! Core vocabulary shared by the simulator's state machines and its runner.
//!
//! State machines (the flow-direction controller, the attack engine) never
//! touch the clock or the event queue directly. They return [`Action`]s and
//! the runner turns those into scheduled [`Event`]s, which keeps every
//! component synchronous and deterministic.

mod action;
mod event;
mod flow;
mod timer;

pub use action::Action;
pub use event::{Event, EventPriority};
pub use flow::{CongestionState, FlowPhase};
pub use timer::{AttackJob, TimerId, TimerOwner};

// Re-export the packet vocabulary most callers need alongside actions.
pub use gpon_types::{AttackKind, Direction, LogLevel, LogRecord, Packet, PacketId};
