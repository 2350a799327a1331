//! Per-ride serialization locks.
//!
//! Capacity-affecting operations on a pool (seat locks, check-ins, booking
//! transitions, cancellation) are serialized per ride so concurrent requests
//! cannot oversell seats between the capacity check and the write.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Registry of per-ride async mutexes, created on first use.
#[derive(Default)]
pub struct RideLockRegistry {
    locks: RwLock<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl RideLockRegistry {
    pub fn new() -> Self {
        Self {
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the lock for the given ride.
    ///
    /// The caller holds the returned mutex for the duration of the critical
    /// section; the registry entry itself is never removed, which keeps the
    /// lock identity stable for a ride's lifetime.
    pub fn for_ride(&self, ride_id: Uuid) -> Arc<Mutex<()>> {
        {
            let locks = self.locks.read().unwrap();
            if let Some(lock) = locks.get(&ride_id) {
                return lock.clone();
            }
        }

        let mut locks = self.locks.write().unwrap();

        // Double-check in case another thread created it
        if let Some(lock) = locks.get(&ride_id) {
            return lock.clone();
        }

        let lock = Arc::new(Mutex::new(()));
        locks.insert(ride_id, lock.clone());
        lock
    }
}

impl std::fmt::Debug for RideLockRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RideLockRegistry")
            .field("active_locks", &self.locks.read().unwrap().len())
            .finish()
    }
}
