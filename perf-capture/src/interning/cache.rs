//! Session-scoped set of interning keys already sent downstream

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::Key;

/// Outcome of [`InternCache::intern_if_necessary`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interned {
    /// First occurrence: the definition was emitted by this call
    First(Key),
    /// The key was already sent earlier in the session
    AlreadySent(Key),
}

impl Interned {
    pub fn key(self) -> Key {
        match self {
            Interned::First(key) | Interned::AlreadySent(key) => key,
        }
    }

    pub fn is_first(self) -> bool {
        matches!(self, Interned::First(_))
    }
}

/// Keys already sent in the current session
///
/// Grows monotonically and is dropped with the session; there is no eviction.
pub struct InternCache {
    name: &'static str,
    sent: Mutex<HashSet<Key>>,
}

impl InternCache {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self { name, sent: Mutex::new(HashSet::new()) }
    }

    /// Record `key` as sent, calling `define` on its first occurrence
    ///
    /// `define` runs while the cache lock is held. It is expected to append
    /// the `Interned*` event to the event buffer: any other producer that
    /// interns the same key meanwhile blocks until the definition is
    /// buffered, so no reference can overtake its definition.
    pub fn intern_if_necessary<F>(&self, key: Key, define: F) -> Interned
    where
        F: FnOnce(Key),
    {
        let mut sent = self.lock();
        if !sent.insert(key) {
            return Interned::AlreadySent(key);
        }
        define(key);
        Interned::First(key)
    }

    #[cfg(test)]
    fn contains(&self, key: Key) -> bool {
        self.lock().contains(&key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<Key>> {
        // A panic under this lock cannot leave the set half-updated
        self.sent.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
