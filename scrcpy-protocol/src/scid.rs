//! Session connection identifiers.
//!
//! Each mirroring session is tagged with an SCID: a random 31-bit integer
//! rendered as 8 lowercase hex digits. The SCID names the device-side
//! abstract socket the server listens on and tags the server process so a
//! stale instance can be killed by pattern. A fresh SCID is generated for
//! every connect attempt, including reconnects.

use std::fmt;
use std::str::FromStr;

/// A session connection id (31-bit, non-negative).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scid(u32);

impl Scid {
    /// Generate a fresh random SCID in `[0, 0x7FFF_FFFF)`.
    pub fn generate() -> Self {
        Self(rand::random::<u32>() % 0x7FFF_FFFF)
    }

    /// Wrap a raw value, rejecting anything with the sign bit set.
    pub fn from_raw(raw: u32) -> Option<Self> {
        (raw < 0x8000_0000).then_some(Self(raw))
    }

    /// The raw 31-bit value.
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// The device-side abstract socket name the forward tunnels to.
    pub fn socket_name(&self) -> String {
        format!("scrcpy_{self}")
    }

    /// Shell pattern matching the server process launched with this SCID,
    /// for kill-by-pattern cleanup.
    pub fn kill_pattern(&self) -> String {
        format!("scrcpy.*scid={self}")
    }
}

impl fmt::Display for Scid {
    /// Renders as exactly 8 lowercase hex digits.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Error parsing an SCID from its hex rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseScidError;

impl fmt::Display for ParseScidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid scid: expected 8 hex digits below 80000000")
    }
}

impl std::error::Error for ParseScidError {}

impl FromStr for Scid {
    type Err = ParseScidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = u32::from_str_radix(s, 16).map_err(|_| ParseScidError)?;
        Self::from_raw(raw).ok_or(ParseScidError)
    }
}
