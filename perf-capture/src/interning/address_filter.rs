//! Filter ensuring symbol information is sent once per address

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use crate::domain::Address;

/// Addresses whose `AddressInfo` was already processed this session
#[derive(Default)]
pub struct AddressDedupFilter {
    seen: Mutex<HashSet<Address>>,
}

impl AddressDedupFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time `address` is seen, recording it
    pub fn should_process(&self, address: Address) -> bool {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).insert(address)
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
