//! Per-client in-flight job caps.
//!
//! # Design
//! - A hard gate with no refill: a slot frees only when its job finishes.
//! - Entries exist only while non-zero, so clients seen once leave nothing behind.
//! - [`ConcurrencyPermit`] releases on drop, which covers error returns, panics,
//!   and clients that disconnect mid-transfer.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex};

use tracing::debug;
use viddl_core::ClientKey;

use super::lock;

/// Counter table capping simultaneous jobs per client.
#[derive(Debug)]
pub struct ConcurrencyAdmission {
    max_per_client: u32,
    slots: Mutex<HashMap<ClientKey, u32>>,
}

impl ConcurrencyAdmission {
    /// Gate admitting at most `max_per_client` jobs per client.
    #[must_use]
    pub fn new(max_per_client: u32) -> Self {
        Self {
            max_per_client,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Configured cap.
    #[must_use]
    pub const fn max_per_client(&self) -> u32 {
        self.max_per_client
    }

    /// Take a slot for `key` if one is free. Pair every `true` with one
    /// [`ConcurrencyAdmission::release`], or use [`ConcurrencyAdmission::try_acquire`].
    #[must_use]
    pub fn acquire(&self, key: &ClientKey) -> bool {
        let mut slots = lock(&self.slots);
        let current = slots.get(key).copied().unwrap_or(0);
        if current >= self.max_per_client {
            return false;
        }
        slots.insert(key.clone(), current + 1);
        true
    }

    /// Return a slot taken by [`ConcurrencyAdmission::acquire`].
    pub fn release(&self, key: &ClientKey) {
        let mut slots = lock(&self.slots);
        match slots.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                if *entry.get() <= 1 {
                    entry.remove();
                } else {
                    *entry.get_mut() -= 1;
                }
            }
            Entry::Vacant(_) => {
                drop(slots);
                debug!(client = %key, "release without a held slot ignored");
            }
        }
    }

    /// Take a slot that is released when the returned permit drops.
    #[must_use]
    pub fn try_acquire(self: &Arc<Self>, key: ClientKey) -> Option<ConcurrencyPermit> {
        self.acquire(&key).then(|| ConcurrencyPermit {
            gate: Arc::clone(self),
            key,
        })
    }

    /// Jobs currently admitted for `key`.
    #[must_use]
    pub fn in_flight(&self, key: &ClientKey) -> u32 {
        lock(&self.slots).get(key).copied().unwrap_or(0)
    }

    /// Number of clients holding at least one slot.
    #[must_use]
    pub fn tracked(&self) -> usize {
        lock(&self.slots).len()
    }
}

/// Held slot; dropping it releases the slot exactly once.
#[derive(Debug)]
pub struct ConcurrencyPermit {
    gate: Arc<ConcurrencyAdmission>,
    key: ClientKey,
}

impl ConcurrencyPermit {
    /// Client holding the slot.
    #[must_use]
    pub const fn client(&self) -> &ClientKey {
        &self.key
    }
}

impl Drop for ConcurrencyPermit {
    fn drop(&mut self) {
        self.gate.release(&self.key);
    }
}
