//! Per-tenant background jobs: the periodic backup loop and the one-shot
//! restore task, each owned by its manager's registry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

pub mod backup;
pub mod restore;

pub use backup::{BackupJobInfo, BackupStatus, TenantBackupManager};
pub use restore::{RestoreJobInfo, RestoreStatus, TenantRestoreManager};

/// Cooperative cancellation handle shared between a job's control surface
/// and its background task. Checked at loop-iteration boundaries and
/// immediately before network I/O; cancelling stops further progress, it
/// never rolls anything back.
#[derive(Debug, Default)]
pub struct CancelHandle {
    flag: AtomicBool,
    wake: Notify,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.wake.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, returning early when cancelled.
    pub async fn sleep(&self, duration: Duration) {
        let notified = self.wake.notified();
        tokio::pin!(notified);
        // Register interest before re-checking the flag so a concurrent
        // cancel between the check and the await is not missed.
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = &mut notified => {}
        }
    }
}
