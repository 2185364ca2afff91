//! Attack injection for the GPON simulator.
//!
//! Each attack is a small state machine driven by timers:
//!
//! ```text
//!   start ──► setup (graft devices) ──► SetTimer(job)
//!                                            │
//!             ┌──────────────────────────────┘
//!             ▼
//!   on_timer: validate attacker path ──✗──► log once, teardown
//!             │ ✓
//!             ▼
//!   step ──► Continue(actions, re-armed timers)
//!        └─► Finish(actions) ──► teardown
//! ```
//!
//! Teardown is the only cleanup path: it cancels the attack's timers, purges
//! its packets, removes injected devices (newest first), restores any link a
//! tap splitter replaced, and clears the compromise flags it set.
//!
//! | Attack            | Attacker device        | Loop                          |
//! |-------------------|------------------------|-------------------------------|
//! | EAVESDROP         | sniffer ONU + PC       | crack codes, capture traffic  |
//! | BRUTEFORCE_ID     | rogue ONU              | guess the victim's ONU ID     |
//! | UNAUTHORIZED_ONT  | rogue ONU              | guess any ONU ID              |
//! | DDOS              | flood ONU              | flood the OLT                 |
//! | ROGUE_ONU         | malicious ONT + PC     | register with spoofed serials |
//! | ONT_SPOOF         | substitute ONT + PC    | brute-force code, take over   |

mod common;
mod config;
mod ddos;
mod eavesdrop;
mod engine;
mod error;
mod graft;
mod guessing;
mod rogue;
mod spoof;
mod state;

pub use common::AttackContext;
pub use config::{
    AttackConfig, DdosConfig, EavesdropConfig, GuessingConfig, OntSpoofConfig, RogueOnuConfig,
};
pub use engine::AttackEngine;
pub use error::AttackError;
pub use graft::Graft;
pub use state::{
    ActiveAttack, Anchor, AttackProgress, CrackState, CrackedCode, SpoofPhase,
};
