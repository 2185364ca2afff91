//! Deterministic GPON simulation runner.
//!
//! This crate owns the virtual clock and every piece of mutable simulation
//! state. Given the same seed and the same command sequence, it produces
//! identical results every run.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  SimulationRunner                       │
//! │                                                         │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     Event Queue (BTreeMap<EventKey, Event>)        │ │
//! │  │     Ordered by: time, priority, sequence           │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │            ┌──────────────┼───────────────┐             │
//! │            ▼              ▼               ▼             │
//! │   ┌──────────────┐ ┌─────────────┐ ┌──────────────┐     │
//! │   │ Tick:        │ │ Generators  │ │ AttackEngine │     │
//! │   │ deliver,     │ │ down / up   │ │ timer steps  │     │
//! │   │ dispatch,    │ │ (flow-gated)│ │              │     │
//! │   │ re-enqueue   │ │             │ │              │     │
//! │   └──────┬───────┘ └──────┬──────┘ └──────┬───────┘     │
//! │          └────────────────┼───────────────┘             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     Actions → timers, packets, log entries         │ │
//! │  └────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Packets move one hop per segment: an outbound copy is held in flight for
//! one segment, lands in the next device's inbox, and is dispatched on the
//! following tick.

mod config;
mod delivery;
mod error;
mod event_queue;
mod flow;
mod runner;
mod snapshot;
mod stats;

pub use config::SimulationConfig;
pub use delivery::{Delivery, DeliveryTracker};
pub use error::SimulationError;
pub use flow::{FlowController, FlowTiming};
pub use runner::SimulationRunner;
pub use snapshot::SimulationSnapshot;
pub use stats::SimulationStats;
