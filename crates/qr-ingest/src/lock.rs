//! One-way session lock.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::Notify;

/// Flag set when a session has produced its payload.
///
/// Only the first [`LockFlag::try_lock`] succeeds, which is what makes
/// delivery at-most-once when several paths race to completion.
#[derive(Clone)]
pub struct LockFlag {
    locked: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl LockFlag {
    /// Create a new flag in the unlocked state.
    pub fn new() -> Self {
        Self {
            locked: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Returns `true` once the session is locked.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Lock and wake any waiters. Returns `true` only for the caller that
    /// performed the transition.
    pub fn try_lock(&self) -> bool {
        let won = self
            .locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.notify.notify_waiters();
        }
        won
    }

    /// Await until the session is locked.
    pub async fn locked(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before checking so a concurrent lock cannot be missed
        notified.as_mut().enable();
        if self.is_locked() {
            return;
        }
        notified.await;
    }
}

impl Default for LockFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LockFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockFlag")
            .field("locked", &self.is_locked())
            .finish()
    }
}
