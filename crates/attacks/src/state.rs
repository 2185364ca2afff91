//! Per-attack state.

use gpon_types::{AttackKind, DeviceId, LinkSnapshot, OnuId, PacketId, ShortCode};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// What an attack's attacker must stay connected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Anchor {
    /// Whichever OLT is primary at validation time.
    PrimaryOlt,
    /// A specific device (usually the victim).
    Device(DeviceId),
}

/// A short code recovered by an attacker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CrackedCode {
    pub device: DeviceId,
    pub code: ShortCode,
}

/// Cracking progress against one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CrackState {
    pub next_candidate: u8,
    pub attempts: u32,
    pub done: bool,
}

/// Phase of an ONT spoof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpoofPhase {
    /// Substitute sits beside the victim, brute-forcing its code.
    BruteForcing,
    /// Substitute took over the victim's line.
    TakenOver,
}

/// Attack-specific progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AttackProgress {
    Eavesdrop {
        sniffer: DeviceId,
        cracking: BTreeMap<DeviceId, CrackState>,
        cracked: Vec<CrackedCode>,
        captured: u64,
    },
    Guessing {
        rogue: DeviceId,
        /// Victim whose ID is being guessed (Bruteforce-ID only).
        victim: Option<DeviceId>,
        next_candidate: OnuId,
        attempts: u32,
        adopted: Option<OnuId>,
    },
    Flood {
        source: DeviceId,
        congestion_node: DeviceId,
        sent: u64,
        burst: u32,
        last_arrival: Option<Duration>,
        overloaded_olt: Option<DeviceId>,
    },
    Registration {
        rogue: DeviceId,
        /// PC behind the rogue that talks to the OLT once registered.
        endpoint: DeviceId,
        attempts: u32,
        registered: Option<OnuId>,
    },
    Spoof {
        victim: DeviceId,
        parent: DeviceId,
        substitute: DeviceId,
        /// PC behind the substitute that sends forged traffic after takeover.
        endpoint: DeviceId,
        victim_code: ShortCode,
        current_key: Option<ShortCode>,
        matched: Option<ShortCode>,
        forced: bool,
        phase: SpoofPhase,
    },
}

impl AttackProgress {
    /// One-line description for reports.
    pub fn summary(&self) -> String {
        match self {
            AttackProgress::Eavesdrop {
                cracked, captured, ..
            } => format!("{} codes cracked, {captured} packets captured", cracked.len()),
            AttackProgress::Guessing {
                attempts, adopted, ..
            } => match adopted {
                Some(id) => format!("adopted {id} after {attempts} guesses"),
                None => format!("{attempts} guesses"),
            },
            AttackProgress::Flood {
                sent,
                overloaded_olt,
                ..
            } => format!(
                "{sent} flood packets, OLT {}",
                if overloaded_olt.is_some() { "overloaded" } else { "healthy" }
            ),
            AttackProgress::Registration {
                attempts,
                registered,
                ..
            } => match registered {
                Some(id) => format!("registered as {id} after {attempts} attempts"),
                None => format!("{attempts} registration attempts"),
            },
            AttackProgress::Spoof {
                current_key,
                matched,
                forced,
                phase,
                ..
            } => match (phase, matched) {
                (SpoofPhase::TakenOver, Some(code)) if *forced => {
                    format!("line taken over (forced at {code})")
                }
                (SpoofPhase::TakenOver, Some(code)) => format!("line taken over (code {code})"),
                _ => format!(
                    "brute-forcing, key {}",
                    current_key.map_or_else(|| "--".to_string(), |k| k.to_string())
                ),
            },
        }
    }
}

/// A running attack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveAttack {
    pub kind: AttackKind,
    pub active: bool,
    pub target: Option<DeviceId>,
    /// Device whose connectivity is revalidated before every emission.
    pub attacker: DeviceId,
    pub anchor: Anchor,
    /// Devices this attack inserted, in insertion order.
    pub injected: Vec<DeviceId>,
    /// Link removed to make room for an injected splitter.
    pub replaced_link: Option<LinkSnapshot>,
    /// ONU IDs this attack's registrations added to allow-lists.
    pub allow_listed: Vec<OnuId>,
    /// Legitimate devices whose compromise flags this attack set.
    pub flagged: Vec<DeviceId>,
    /// Packets this attack emitted that have not yet expired.
    pub packets: BTreeSet<PacketId>,
    pub started_at: Duration,
    pub progress: AttackProgress,
}
