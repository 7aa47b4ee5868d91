//! Per-target serialization
//!
//! At most one patch-and-stabilize operation may be in flight per target
//! identity; concurrent requests against the same identity queue behind an
//! async mutex. Operations on distinct identities are independent.

use caravel_types::TargetIdentity;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Arena of lock tokens keyed by target identity.
///
/// Tokens are created on first use and kept for the life of the arena. The
/// returned guard releases the token on drop, on every exit path.
pub struct IdentityLockArena {
    locks: DashMap<TargetIdentity, Arc<Mutex<()>>>,
}

impl IdentityLockArena {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Acquire the lock token for an identity, waiting behind any operation
    /// already in flight for it.
    pub async fn acquire(&self, identity: &TargetIdentity) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(identity.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Number of identities seen so far.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Default for IdentityLockArena {
    fn default() -> Self {
        Self::new()
    }
}
