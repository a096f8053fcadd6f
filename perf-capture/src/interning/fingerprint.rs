//! Fingerprints used as interning keys
//!
//! | Payload            | Algorithm                                        |
//! |--------------------|--------------------------------------------------|
//! | Callstack          | `key = 31 * key + pc`, seed 17, wrapping `u64`   |
//! | String             | `DefaultHasher::new()` (SipHash-1-3, fixed keys) |
//! | Tracepoint info    | string fingerprint of `"{category}:{name}"`      |
//!
//! `DefaultHasher::new()` always starts from the same keys, so fingerprints
//! are stable within a build. They are not guaranteed stable across Rust
//! releases, which is fine because keys only live for one session.

use std::hash::{DefaultHasher, Hash, Hasher};

use perf_capture_common::{Callstack, TracepointInfo};

use crate::domain::Key;

const CALLSTACK_SEED: u64 = 17;
const CALLSTACK_MULTIPLIER: u64 = 31;

/// Polynomial rolling hash over the program counters
#[must_use]
pub fn callstack_key(callstack: &Callstack) -> Key {
    Key(callstack_key_of_pcs(&callstack.pcs))
}

fn callstack_key_of_pcs(pcs: &[u64]) -> u64 {
    pcs.iter().fold(CALLSTACK_SEED, |key, &pc| {
        key.wrapping_mul(CALLSTACK_MULTIPLIER).wrapping_add(pc)
    })
}

#[must_use]
pub fn string_key(value: &str) -> Key {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    Key(hasher.finish())
}

#[must_use]
pub fn tracepoint_key(info: &TracepointInfo) -> Key {
    string_key(&format!("{}:{}", info.category, info.name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack(pcs: &[u64]) -> Callstack {
        Callstack { pcs: pcs.to_vec() }
    }

    #[test]
    fn test_empty_callstack_is_seed() {
        assert_eq!(callstack_key(&stack(&[])), Key(17));
    }

    #[test]
    fn test_callstack_key_polynomial() {
        assert_eq!(callstack_key(&stack(&[1])), Key(17 * 31 + 1));
        assert_eq!(callstack_key(&stack(&[1, 2])), Key((17 * 31 + 1) * 31 + 2));
    }

    #[test]
    fn test_callstack_key_depends_on_order() {
        assert_eq!(callstack_key(&stack(&[0x10, 0x20])), callstack_key(&stack(&[0x10, 0x20])));
        assert_ne!(callstack_key(&stack(&[0x10, 0x20])), callstack_key(&stack(&[0x20, 0x10])));
    }

    #[test]
    fn test_callstack_key_wraps_instead_of_overflowing() {
        let pcs = [u64::MAX; 8];
        // Must not panic in debug builds
        let _ = callstack_key(&stack(&pcs));
    }

    #[test]
    fn test_string_key_is_deterministic() {
        assert_eq!(string_key("libc.so.6"), string_key("libc.so.6"));
        assert_ne!(string_key("libc.so.6"), string_key("libm.so.6"));
    }

    #[test]
    fn test_tracepoint_key_uses_category_colon_name() {
        let info = TracepointInfo { category: "sched".to_string(), name: "sched_switch".to_string() };
        assert_eq!(tracepoint_key(&info), string_key("sched:sched_switch"));
    }

    #[test]
    fn test_tracepoint_key_separates_category_from_name() {
        let a = TracepointInfo { category: "ab".to_string(), name: "c".to_string() };
        let b = TracepointInfo { category: "a".to_string(), name: "bc".to_string() };
        assert_ne!(tracepoint_key(&a), tracepoint_key(&b));
    }
}
