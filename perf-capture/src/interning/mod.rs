//! # Interning and Address Deduplication
//!
//! Large payloads that repeat throughout a capture (callstacks, strings,
//! tracepoint descriptors) are sent once as an `Interned*` event and then
//! referenced by a 64-bit [`Key`](crate::domain::Key).
//!
//! ## Components
//!
//! - [`fingerprint`]: deterministic key computation per payload type
//! - [`InternCache`]: set of keys already sent in the current session
//! - [`AddressDedupFilter`]: set of addresses whose symbols were already sent
//!
//! ## Collisions
//!
//! Keys are non-cryptographic 64-bit hashes and a cache hit is never checked
//! against the payload. Two different payloads with the same key make the
//! second one resolve to the first one's definition downstream. Changing this
//! changes the wire contract, so it is kept as is.

pub mod address_filter;
pub mod cache;
pub mod fingerprint;

pub use address_filter::AddressDedupFilter;
pub use cache::{InternCache, Interned};
