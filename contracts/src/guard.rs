//! # Reentrancy Guard
//!
//! One flag for the whole vault, not one per deposit. The hazard is a
//! token hook or a receiving contract calling back into the vault while an
//! entry point is still on the stack, so a nested entry must fail at once
//! rather than wait.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

use crate::error::VaultError;

/// The vault-wide non-reentrant lock.
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    locked: AtomicBool,
}

impl ReentrancyGuard {
    /// Creates an unlocked guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the lock for the lifetime of the returned [`GuardLock`].
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::ReentrantCall`] if the lock is already held.
    pub fn enter(&self) -> Result<GuardLock<'_>, VaultError> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map_err(|_| {
                warn!("nested vault entry rejected");
                VaultError::ReentrantCall
            })?;
        Ok(GuardLock { guard: self })
    }

    /// Returns `true` while an entry point is running.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }
}

/// Proof that the guard is held. Releases it when dropped, on every exit
/// path including early returns and unwinding.
#[must_use = "the guard is released as soon as the lock is dropped"]
#[derive(Debug)]
pub struct GuardLock<'a> {
    guard: &'a ReentrancyGuard,
}

impl Drop for GuardLock<'_> {
    fn drop(&mut self) {
        self.guard.locked.store(false, Ordering::Release);
    }
}
