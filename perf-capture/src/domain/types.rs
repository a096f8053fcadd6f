//! Domain types providing compile-time safety and self-documentation

use std::fmt;

/// Interning key: the 64-bit fingerprint of an interned payload
///
/// The same value is used as the cache lookup key and as the wire-level
/// reference carried by events whose payload was interned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Key(pub u64);

impl Key {
    pub fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key:{:#018x}", self.0)
    }
}

/// Absolute instruction address in the traced process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub u64);

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

/// Lifecycle of a capture session
///
/// A session starts `Active` and moves to `Stopped` exactly once; it never
/// becomes active again (a new session is created instead).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Active,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Active => write!(f, "active"),
            SessionState::Stopped => write!(f, "stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display_is_fixed_width_hex() {
        assert_eq!(Key(0x2a).to_string(), "key:0x000000000000002a");
        assert_eq!(Key(7).as_raw(), 7);
    }

    #[test]
    fn test_address_display() {
        assert_eq!(Address(0x7f00_1234).to_string(), "0x000000007f001234");
    }
}
