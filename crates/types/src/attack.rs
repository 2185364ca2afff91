//! Attack catalogue shared by the engine, the runner and snapshots.

use crate::LogLevel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Attack type key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttackKind {
    /// Passive tap plus short-code cracking.
    Eavesdrop,
    /// Guess a specific victim's ONU ID.
    BruteforceId,
    /// Guess any ONU ID the OLT will accept.
    UnauthorizedOnt,
    /// Upstream flood that overloads the OLT.
    Ddos,
    /// Spoofed registration of an attacker ONU.
    RogueOnu,
    /// Substitute ONT that takes over a victim's line.
    OntSpoof,
}

impl AttackKind {
    pub const ALL: [AttackKind; 6] = [
        AttackKind::Eavesdrop,
        AttackKind::BruteforceId,
        AttackKind::UnauthorizedOnt,
        AttackKind::Ddos,
        AttackKind::RogueOnu,
        AttackKind::OntSpoof,
    ];

    /// Log level used when the attack reaches its goal.
    pub fn severity(self) -> LogLevel {
        match self {
            AttackKind::Ddos | AttackKind::OntSpoof => LogLevel::Critical,
            AttackKind::Eavesdrop
            | AttackKind::BruteforceId
            | AttackKind::UnauthorizedOnt
            | AttackKind::RogueOnu => LogLevel::Error,
        }
    }

    /// Whether a target device must be supplied at start.
    pub fn requires_target(self) -> bool {
        matches!(
            self,
            AttackKind::Eavesdrop | AttackKind::BruteforceId | AttackKind::Ddos | AttackKind::OntSpoof
        )
    }
}

impl fmt::Display for AttackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttackKind::Eavesdrop => "EAVESDROP",
            AttackKind::BruteforceId => "BRUTEFORCE_ID",
            AttackKind::UnauthorizedOnt => "UNAUTHORIZED_ONT",
            AttackKind::Ddos => "DDOS",
            AttackKind::RogueOnu => "ROGUE_ONU",
            AttackKind::OntSpoof => "ONT_SPOOF",
        };
        f.write_str(s)
    }
}

/// Error parsing an attack name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown attack type: {0}")]
pub struct UnknownAttack(pub String);

impl FromStr for AttackKind {
    type Err = UnknownAttack;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_uppercase().replace('-', "_");
        match key.as_str() {
            "EAVESDROP" => Ok(AttackKind::Eavesdrop),
            "BRUTEFORCE_ID" | "BRUTEFORCE" => Ok(AttackKind::BruteforceId),
            "UNAUTHORIZED_ONT" => Ok(AttackKind::UnauthorizedOnt),
            "DDOS" => Ok(AttackKind::Ddos),
            "ROGUE_ONU" | "UNAUTHORIZED_ACCESS" => Ok(AttackKind::RogueOnu),
            "ONT_SPOOF" => Ok(AttackKind::OntSpoof),
            _ => Err(UnknownAttack(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attack_names() {
        assert_eq!("ont-spoof".parse::<AttackKind>(), Ok(AttackKind::OntSpoof));
        assert_eq!("ddos".parse::<AttackKind>(), Ok(AttackKind::Ddos));
        assert_eq!(
            "unauthorized_access".parse::<AttackKind>(),
            Ok(AttackKind::RogueOnu)
        );
        assert!("ping".parse::<AttackKind>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for kind in AttackKind::ALL {
            assert_eq!(kind.to_string().parse::<AttackKind>(), Ok(kind));
        }
    }
}
