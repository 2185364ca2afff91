//! Domain-specific identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Device identifier.
///
/// Allocated by the [`Network`](crate::Network) store and never reused for
/// the lifetime of that store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub u64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Device({})", self.0)
    }
}

/// Link (connection) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(pub u64);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Link({})", self.0)
    }
}

/// Packet identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PacketId(pub u64);

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Packet({})", self.0)
    }
}

/// Sequential packet id source shared by every packet emitter.
#[derive(Debug, Clone, Default)]
pub struct PacketIdAllocator {
    last: u64,
}

impl PacketIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> PacketId {
        self.last += 1;
        PacketId(self.last)
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.last
    }
}

/// Port number on a device, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortNumber(pub u16);

impl fmt::Display for PortNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Port({})", self.0)
    }
}

/// Numeric ONU identifier assigned by the OLT at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OnuId(pub u16);

impl OnuId {
    /// Allocation ID derived from this ONU ID.
    pub fn alloc_id(self) -> u16 {
        1024 + self.0
    }

    /// GEM port derived from this ONU ID.
    pub fn gem_port(self) -> u16 {
        1280 + self.0
    }

    /// Get the next ONU ID.
    pub fn next(self) -> Self {
        OnuId(self.0 + 1)
    }
}

impl fmt::Display for OnuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ONU-{}", self.0)
    }
}

/// Two-digit short code ("01".."99") an attacker can brute-force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ShortCode(u8);

impl ShortCode {
    /// Smallest valid code.
    pub const MIN: Self = ShortCode(1);
    /// Largest valid code.
    pub const MAX: Self = ShortCode(99);

    /// Create a code, returning `None` outside `1..=99`.
    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN.0..=Self::MAX.0)
            .contains(&value)
            .then_some(ShortCode(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Get the next code (returns None past 99).
    pub fn next(self) -> Option<Self> {
        Self::new(self.0 + 1)
    }
}

/// A stored short code outside `01..99`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("short code {0} outside 01..99")]
pub struct InvalidShortCode(pub u8);

impl TryFrom<u8> for ShortCode {
    type Error = InvalidShortCode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidShortCode(value))
    }
}

impl From<ShortCode> for u8 {
    fn from(code: ShortCode) -> Self {
        code.0
    }
}

impl fmt::Display for ShortCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_onu_derived_fields() {
        let id = OnuId(3);
        assert_eq!(id.alloc_id(), 1027);
        assert_eq!(id.gem_port(), 1283);
        assert_eq!(id.next(), OnuId(4));
    }

    #[test]
    fn test_packet_ids_are_sequential() {
        let mut ids = PacketIdAllocator::new();
        assert_eq!(ids.next_id(), PacketId(1));
        assert_eq!(ids.next_id(), PacketId(2));
        assert_eq!(ids.issued(), 2);
    }

    #[test]
    fn test_short_code_bounds() {
        assert_eq!(ShortCode::new(7).map(|c| c.to_string()), Some("07".to_string()));
        assert!(ShortCode::new(100).is_none());
        assert!(ShortCode::new(0).is_none());
        assert_eq!(ShortCode::MIN.to_string(), "01");
        assert!(ShortCode::MAX.next().is_none());
        assert!(serde_json::from_str::<ShortCode>("0").is_err());
        assert_eq!(serde_json::from_str::<ShortCode>("42").ok(), ShortCode::new(42));
    }
}
